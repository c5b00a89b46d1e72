pub mod book;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod index;
pub mod logger;
pub mod query;
pub mod report;
pub mod runner;
pub mod script;
pub mod seed;
pub mod store;
pub mod types;
pub mod utils;

use crate::collection::Collection;
use crate::config::Settings;
use crate::engine::{Engine, EngineOptions};
use crate::errors::DbError;
use crate::runner::QueryRunner;
use std::sync::Arc;

/// An open bookstore database: the engine plus the name of the books collection.
#[derive(Debug)]
pub struct Database {
    engine: Engine,
    collection: String,
}

impl Database {
    /// Open the store described by `settings`.
    ///
    /// # Errors
    /// `StoreUnavailable` when the data directory cannot be opened.
    pub fn open(settings: &Settings) -> Result<Self, DbError> {
        Self::open_with(settings.engine_options(), &settings.collection)
    }

    /// # Errors
    /// `StoreUnavailable` when the data directory cannot be opened.
    pub fn open_with(options: EngineOptions, collection: &str) -> Result<Self, DbError> {
        let engine = Engine::open(options)?;
        Ok(Self { engine, collection: collection.to_string() })
    }

    /// A database that never touches the filesystem.
    #[must_use]
    pub fn in_memory(database: &str, collection: &str) -> Self {
        Self { engine: Engine::in_memory(database), collection: collection.to_string() }
    }

    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The books collection, created empty on first use.
    ///
    /// # Errors
    /// `InvalidArgument` for an unusable collection name.
    pub fn books(&self) -> Result<Arc<Collection>, DbError> {
        self.engine.create_collection(&self.collection)
    }

    /// # Errors
    /// See [`Database::books`].
    pub fn runner(&self) -> Result<QueryRunner<Arc<Collection>>, DbError> {
        Ok(QueryRunner::new(self.books()?))
    }

    /// Write everything back and release the store.
    ///
    /// # Errors
    /// `Io` when a snapshot cannot be written.
    pub fn close(self) -> Result<(), DbError> {
        self.engine.close()
    }
}
