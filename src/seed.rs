//! Loading book datasets into a collection.

use crate::book::Book;
use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use serde::Serialize;
use std::path::Path;

const BUNDLED_BOOKS: &str = include_str!("../data/books.json");

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    /// Documents removed first because `reset` was requested.
    pub cleared: usize,
    /// Seeding was skipped because the collection already had documents.
    pub skipped: bool,
}

/// The twelve classic books shipped with the crate.
///
/// # Errors
/// Only if the bundled file is malformed.
pub fn default_books() -> Result<Vec<Book>, DbError> {
    parse_books(BUNDLED_BOOKS)
}

/// Read a JSON array or NDJSON file of books.
///
/// # Errors
/// `Io` when the file cannot be read, `Json` when a record does not parse.
pub fn load_books(path: impl AsRef<Path>) -> Result<Vec<Book>, DbError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| DbError::Io(format!("cannot read {}: {e}", path.display())))?;
    let books = parse_books(&text)?;
    log::info!("read {} books from {}", books.len(), path.display());
    Ok(books)
}

/// Parse either a JSON array of books or one book per line.
///
/// # Errors
/// `Json` for a malformed record.
pub fn parse_books(text: &str) -> Result<Vec<Book>, DbError> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Book>(l).map_err(DbError::from))
        .collect()
}

/// Insert `books` into `col`. A non-empty collection is left alone unless `reset` is set, in
/// which case its documents are removed first (index definitions are kept).
///
/// # Errors
/// `InvalidArgument` when a book fails validation; nothing is inserted in that case.
pub fn seed_collection(col: &Collection, books: &[Book], reset: bool) -> Result<SeedReport, DbError> {
    for book in books {
        book.validate()?;
    }
    let mut report = SeedReport::default();
    if reset {
        report.cleared = col.len();
        col.clear();
    } else if !col.is_empty() {
        log::info!("collection {} already has {} documents, not seeding", col.name_str(), col.len());
        report.skipped = true;
        return Ok(report);
    }
    for book in books {
        col.insert_document(Document::new(book.to_document()));
        report.inserted += 1;
    }
    log::info!(
        "seeded {} books into {} (cleared {})",
        report.inserted,
        col.name_str(),
        report.cleared
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_dataset_has_twelve_valid_books() {
        let books = default_books().unwrap();
        assert_eq!(books.len(), 12);
        assert!(books.iter().all(|b| b.validate().is_ok() && b.id.is_none()));
        assert!(books.iter().any(|b| b.author == "Emily Brontë"));
    }

    #[test]
    fn ndjson_input_is_accepted() {
        let text = concat!(
            r#"{"title":"A","author":"x","genre":"g","published_year":2001,"price":1.5,"in_stock":true,"pages":10}"#,
            "\n\n",
            r#"{"title":"B","author":"y","genre":"g","published_year":2002,"price":2,"in_stock":false,"pages":20}"#,
            "\n"
        );
        let books = parse_books(text).unwrap();
        assert_eq!(books.len(), 2);
        assert!((books[1].price - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn seeding_skips_populated_collections_unless_reset() {
        let col = Collection::new("books".into());
        let books = default_books().unwrap();
        assert_eq!(seed_collection(&col, &books, false).unwrap().inserted, 12);
        let again = seed_collection(&col, &books, false).unwrap();
        assert!(again.skipped);
        assert_eq!(col.len(), 12);
        let reset = seed_collection(&col, &books[..3], true).unwrap();
        assert_eq!((reset.cleared, reset.inserted), (12, 3));
        assert_eq!(col.len(), 3);
    }
}
