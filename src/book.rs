//! Typed views of the documents in the `books` collection.
//!
//! Store documents are untyped bson; every read goes through one of the `from_document`
//! constructors below, which fail with [`DbError::Schema`] when a field is missing or has
//! the wrong type.

use crate::errors::DbError;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
    pub pages: i32,
}

impl Book {
    /// Store representation; the identifier is kept by the store, not in the body.
    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        doc! {
            "title": self.title.as_str(),
            "author": self.author.as_str(),
            "genre": self.genre.as_str(),
            "published_year": self.published_year,
            "price": self.price,
            "in_stock": self.in_stock,
            "pages": self.pages,
        }
    }

    /// # Errors
    /// `Schema` when a field is missing or mistyped.
    pub fn from_document(id: Option<&DocumentId>, doc: &BsonDocument) -> Result<Self, DbError> {
        Ok(Self {
            id: id.map(ToString::to_string),
            title: req_str(doc, "title")?,
            author: req_str(doc, "author")?,
            genre: req_str(doc, "genre")?,
            published_year: req_i32(doc, "published_year")?,
            price: req_f64(doc, "price")?,
            in_stock: req_bool(doc, "in_stock")?,
            pages: req_i32(doc, "pages")?,
        })
    }

    /// Checks applied before a book is written to the store.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty title, a negative or non-finite price, or negative pages.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.title.trim().is_empty() {
            return Err(DbError::InvalidArgument("book title is empty".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DbError::InvalidArgument(format!(
                "price of '{}' must be a non-negative number, got {}",
                self.title, self.price
            )));
        }
        if self.pages < 0 {
            return Err(DbError::InvalidArgument(format!("'{}' has negative pages", self.title)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleAuthorPrice {
    pub title: String,
    pub author: String,
    pub price: f64,
}

impl TitleAuthorPrice {
    /// # Errors
    /// `Schema` when a projected field is missing.
    pub fn from_document(doc: &BsonDocument) -> Result<Self, DbError> {
        Ok(Self {
            title: req_str(doc, "title")?,
            author: req_str(doc, "author")?,
            price: req_f64(doc, "price")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenrePriceSummary {
    pub genre: String,
    pub average_price: f64,
    pub total_books: u64,
}

impl GenrePriceSummary {
    /// # Errors
    /// `Schema` when the row does not have the expected shape.
    pub fn from_document(doc: &BsonDocument) -> Result<Self, DbError> {
        Ok(Self {
            genre: req_str(doc, "genre")?,
            average_price: req_f64(doc, "averagePrice")?,
            total_books: req_count(doc, "totalBooks")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBookCount {
    pub author: String,
    pub book_count: u64,
}

impl AuthorBookCount {
    /// # Errors
    /// `Schema` when the row does not have the expected shape.
    pub fn from_document(doc: &BsonDocument) -> Result<Self, DbError> {
        Ok(Self { author: req_str(doc, "author")?, book_count: req_count(doc, "bookCount")? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecadeCount {
    /// `"1950s"`.
    pub decade: String,
    pub book_count: u64,
    pub sample_books: Vec<String>,
}

impl DecadeCount {
    /// # Errors
    /// `Schema` when the row does not have the expected shape.
    pub fn from_document(doc: &BsonDocument) -> Result<Self, DbError> {
        let sample_books = match doc.get("sampleBooks") {
            Some(Bson::Array(items)) => items
                .iter()
                .map(|b| match b {
                    Bson::String(s) => Ok(s.clone()),
                    other => Err(DbError::Schema(format!("sample title is not a string: {other}"))),
                })
                .collect::<Result<_, _>>()?,
            other => return Err(mistyped("sampleBooks", "array", other)),
        };
        Ok(Self {
            decade: req_str(doc, "decade")?,
            book_count: req_count(doc, "bookCount")?,
            sample_books,
        })
    }
}

fn mistyped(field: &str, expected: &str, got: Option<&Bson>) -> DbError {
    match got {
        None => DbError::Schema(format!("missing field '{field}'")),
        Some(v) => DbError::Schema(format!("field '{field}' should be {expected}, found {v}")),
    }
}

fn req_str(doc: &BsonDocument, field: &str) -> Result<String, DbError> {
    match doc.get(field) {
        Some(Bson::String(s)) => Ok(s.clone()),
        other => Err(mistyped(field, "a string", other)),
    }
}

fn req_bool(doc: &BsonDocument, field: &str) -> Result<bool, DbError> {
    match doc.get(field) {
        Some(Bson::Boolean(b)) => Ok(*b),
        other => Err(mistyped(field, "a boolean", other)),
    }
}

fn req_i32(doc: &BsonDocument, field: &str) -> Result<i32, DbError> {
    match doc.get(field) {
        Some(Bson::Int32(i)) => Ok(*i),
        Some(Bson::Int64(i)) => i32::try_from(*i)
            .map_err(|_| DbError::Schema(format!("field '{field}' out of range: {i}"))),
        other => Err(mistyped(field, "an integer", other)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn req_f64(doc: &BsonDocument, field: &str) -> Result<f64, DbError> {
    match doc.get(field) {
        Some(Bson::Double(f)) => Ok(*f),
        Some(Bson::Int32(i)) => Ok(f64::from(*i)),
        Some(Bson::Int64(i)) => Ok(*i as f64),
        other => Err(mistyped(field, "a number", other)),
    }
}

fn req_count(doc: &BsonDocument, field: &str) -> Result<u64, DbError> {
    let n = match doc.get(field) {
        Some(Bson::Int32(i)) => i64::from(*i),
        Some(Bson::Int64(i)) => *i,
        other => return Err(mistyped(field, "a count", other)),
    };
    u64::try_from(n).map_err(|_| DbError::Schema(format!("field '{field}' is negative: {n}")))
}
