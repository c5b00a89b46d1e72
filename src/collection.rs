//! In-memory collection: documents in insertion order plus secondary indexes.
mod core;
mod index_admin;
mod ops;

pub use self::core::Collection;
