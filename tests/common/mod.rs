#![allow(dead_code)]

use plp_bookstore::book::Book;
use plp_bookstore::collection::Collection;
use plp_bookstore::engine::Engine;
use plp_bookstore::runner::QueryRunner;
use plp_bookstore::seed::{default_books, seed_collection};
use std::sync::Arc;

/// An in-memory `books` collection holding the bundled twelve books.
pub fn seeded_collection() -> Arc<Collection> {
    let engine = Engine::in_memory("plp_bookstore");
    let col = engine.create_collection("books").unwrap();
    seed_collection(&col, &default_books().unwrap(), false).unwrap();
    col
}

pub fn seeded_runner() -> QueryRunner<Arc<Collection>> {
    QueryRunner::new(seeded_collection())
}

pub fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().map(|b| b.title.as_str()).collect()
}
