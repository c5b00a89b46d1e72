//! One method per report operation over an explicitly passed store handle.
//!
//! Every method issues its request synchronously, validates its arguments before touching
//! the store, decodes the reply into typed values and never retries.

use crate::book::{AuthorBookCount, Book, DecadeCount, GenrePriceSummary, TitleAuthorPrice};
use crate::errors::DbError;
use crate::index::{IndexAck, IndexDescriptor, IndexSpec};
use crate::query::{
    Accumulator, CmpOp, DeleteReport, ExplainReport, Expr, Filter, FindOptions, Order, Pipeline,
    SortSpec, Stage, UpdateDoc, UpdateReport,
};
use crate::store::DocumentStore;

/// Sample titles kept per decade.
pub const DECADE_SAMPLE_SIZE: usize = 3;

#[derive(Debug)]
pub struct QueryRunner<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> QueryRunner<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    fn find_books(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<Book>, DbError> {
        self.store
            .find(filter, opts)?
            .iter()
            .map(|d| Book::from_document(Some(&d.id), &d.data))
            .collect()
    }

    fn aggregate_rows<T>(
        &self,
        pipeline: &Pipeline,
        decode: fn(&bson::Document) -> Result<T, DbError>,
    ) -> Result<Vec<T>, DbError> {
        self.store.aggregate(pipeline)?.iter().map(decode).collect()
    }

    // --- basic reads ---

    /// # Errors
    /// Store errors, or `Schema` for a malformed stored book.
    pub fn find_by_genre(&self, genre: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::eq("genre", genre), &FindOptions::default())
    }

    /// Books with `published_year > year`.
    ///
    /// # Errors
    /// Store errors, or `Schema` for a malformed stored book.
    pub fn find_published_after(&self, year: i32) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::cmp("published_year", CmpOp::Gt, year), &FindOptions::default())
    }

    /// # Errors
    /// Store errors, or `Schema` for a malformed stored book.
    pub fn find_by_author(&self, author: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::eq("author", author), &FindOptions::default())
    }

    /// # Errors
    /// Store errors, or `Schema` for a malformed stored book.
    pub fn find_by_title(&self, title: &str) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::eq("title", title), &FindOptions::default())
    }

    /// # Errors
    /// Store errors.
    pub fn count_documents(&self) -> Result<u64, DbError> {
        self.store.count(&Filter::True)
    }

    // --- writes ---

    /// Set the price of the first book with `title`. A missing title reports 0/0.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative or non-finite price.
    pub fn update_price(&self, title: &str, new_price: f64) -> Result<UpdateReport, DbError> {
        if !new_price.is_finite() || new_price < 0.0 {
            return Err(DbError::InvalidArgument(format!(
                "price must be a non-negative number, got {new_price}"
            )));
        }
        let update = UpdateDoc { set: vec![("price".to_string(), new_price.into())] };
        let report = self.store.update_one(&Filter::eq("title", title), &update)?;
        log::info!(
            "update_price title={title:?} price={new_price} matched={} modified={}",
            report.matched,
            report.modified
        );
        Ok(report)
    }

    /// Delete the first book with `title`. A missing title reports 0.
    ///
    /// # Errors
    /// Store errors.
    pub fn delete_by_title(&self, title: &str) -> Result<DeleteReport, DbError> {
        let report = self.store.delete_one(&Filter::eq("title", title))?;
        log::info!("delete_by_title title={title:?} deleted={}", report.deleted);
        Ok(report)
    }

    // --- advanced reads ---

    /// # Errors
    /// Store errors, or `Schema` for a malformed stored book.
    pub fn find_in_stock_after_year(&self, year: i32) -> Result<Vec<Book>, DbError> {
        let filter = Filter::And(vec![
            Filter::eq("in_stock", true),
            Filter::cmp("published_year", CmpOp::Gt, year),
        ]);
        self.find_books(&filter, &FindOptions::default())
    }

    /// # Errors
    /// Store errors, or `Schema` when a row lacks one of the projected fields.
    pub fn project_title_author_price(&self) -> Result<Vec<TitleAuthorPrice>, DbError> {
        let opts = FindOptions {
            projection: Some(vec!["title".into(), "author".into(), "price".into()]),
            ..FindOptions::default()
        };
        self.store
            .find(&Filter::True, &opts)?
            .iter()
            .map(|d| TitleAuthorPrice::from_document(&d.data))
            .collect()
    }

    /// # Errors
    /// Store errors, or `Schema` for a malformed stored book.
    pub fn sort_by_price(&self, order: Order) -> Result<Vec<Book>, DbError> {
        let opts =
            FindOptions { sort: Some(vec![SortSpec::new("price", order)]), ..FindOptions::default() };
        self.find_books(&Filter::True, &opts)
    }

    /// `page_size` books ordered by title, skipping `page_index * page_size`.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero page size or an offset that overflows.
    pub fn paginate(&self, page_size: usize, page_index: usize) -> Result<Vec<Book>, DbError> {
        if page_size == 0 {
            return Err(DbError::InvalidArgument("page size must be greater than zero".into()));
        }
        let skip = page_index
            .checked_mul(page_size)
            .ok_or_else(|| DbError::InvalidArgument(format!("page {page_index} is out of range")))?;
        let opts = FindOptions {
            sort: Some(vec![SortSpec::new("title", Order::Asc)]),
            limit: Some(page_size),
            skip: Some(skip),
            ..FindOptions::default()
        };
        self.find_books(&Filter::True, &opts)
    }

    /// The `limit` books with the highest (`Desc`) or lowest (`Asc`) `field`.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero limit or an empty field.
    pub fn top_by(&self, field: &str, order: Order, limit: usize) -> Result<Vec<Book>, DbError> {
        if limit == 0 {
            return Err(DbError::InvalidArgument("limit must be greater than zero".into()));
        }
        if field.trim().is_empty() {
            return Err(DbError::InvalidArgument("sort field is empty".into()));
        }
        let opts = FindOptions {
            sort: Some(vec![SortSpec::new(field, order)]),
            limit: Some(limit),
            ..FindOptions::default()
        };
        self.find_books(&Filter::True, &opts)
    }

    /// # Errors
    /// Store errors, or `Schema` for a malformed stored book.
    pub fn find_out_of_stock(&self) -> Result<Vec<Book>, DbError> {
        self.find_books(&Filter::eq("in_stock", false), &FindOptions::default())
    }

    /// Books with `from <= published_year <= to`.
    ///
    /// # Errors
    /// `InvalidArgument` when `from > to`.
    pub fn find_published_between(&self, from: i32, to: i32) -> Result<Vec<Book>, DbError> {
        if from > to {
            return Err(DbError::InvalidArgument(format!("empty year range {from}..={to}")));
        }
        let filter = Filter::And(vec![
            Filter::cmp("published_year", CmpOp::Gte, from),
            Filter::cmp("published_year", CmpOp::Lte, to),
        ]);
        self.find_books(&filter, &FindOptions::default())
    }

    // --- aggregations ---

    /// Average price and book count per genre, highest average first.
    ///
    /// # Errors
    /// `Query` when a price is not numeric, `Schema` for a malformed row.
    pub fn average_price_by_genre(&self) -> Result<Vec<GenrePriceSummary>, DbError> {
        let pipeline = Pipeline::new(vec![
            Stage::Group {
                id: Expr::field("genre"),
                fields: vec![
                    ("averagePrice".into(), Accumulator::Avg(Expr::field("price"))),
                    ("totalBooks".into(), Accumulator::Sum(Expr::lit(1))),
                ],
            },
            Stage::Sort(vec![SortSpec::new("averagePrice", Order::Desc)]),
            Stage::Project(vec![
                ("genre".into(), Expr::field("_id")),
                ("averagePrice".into(), Expr::Round(Box::new(Expr::field("averagePrice")), 2)),
                ("totalBooks".into(), Expr::field("totalBooks")),
            ]),
        ]);
        self.aggregate_rows(&pipeline, GenrePriceSummary::from_document)
    }

    /// # Errors
    /// `InvalidArgument` for a zero limit, `Schema` for a malformed row.
    pub fn top_authors_by_book_count(&self, limit: usize) -> Result<Vec<AuthorBookCount>, DbError> {
        if limit == 0 {
            return Err(DbError::InvalidArgument("limit must be greater than zero".into()));
        }
        let pipeline = Pipeline::new(vec![
            Stage::Group {
                id: Expr::field("author"),
                fields: vec![("bookCount".into(), Accumulator::Sum(Expr::lit(1)))],
            },
            Stage::Sort(vec![SortSpec::new("bookCount", Order::Desc)]),
            Stage::Limit(limit),
            Stage::Project(vec![
                ("author".into(), Expr::field("_id")),
                ("bookCount".into(), Expr::field("bookCount")),
            ]),
        ]);
        self.aggregate_rows(&pipeline, AuthorBookCount::from_document)
    }

    /// Books per decade (`"1950s"`), earliest decade first, with up to three sample titles.
    ///
    /// # Errors
    /// `Query` when a year is not numeric, `Schema` for a malformed row.
    pub fn count_by_decade(&self) -> Result<Vec<DecadeCount>, DbError> {
        let year = || Box::new(Expr::field("published_year"));
        // grouped and sorted on the numeric decade; the "1950s" label is built last
        let pipeline = Pipeline::new(vec![
            Stage::Project(vec![
                ("title".into(), Expr::field("title")),
                (
                    "decade".into(),
                    Expr::Subtract(year(), Box::new(Expr::Mod(year(), Box::new(Expr::lit(10))))),
                ),
            ]),
            Stage::Group {
                id: Expr::field("decade"),
                fields: vec![
                    ("bookCount".into(), Accumulator::Sum(Expr::lit(1))),
                    ("books".into(), Accumulator::Push(Expr::field("title"))),
                ],
            },
            Stage::Sort(vec![SortSpec::new("_id", Order::Asc)]),
            Stage::Project(vec![
                (
                    "decade".into(),
                    Expr::Concat(vec![Expr::ToString(Box::new(Expr::field("_id"))), Expr::lit("s")]),
                ),
                ("bookCount".into(), Expr::field("bookCount")),
                ("sampleBooks".into(), Expr::Slice(Box::new(Expr::field("books")), DECADE_SAMPLE_SIZE)),
            ]),
        ]);
        self.aggregate_rows(&pipeline, DecadeCount::from_document)
    }

    // --- indexes and plans ---

    /// Create each index in order. Already existing identical indexes report `created: false`.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty list or malformed spec; `IndexConflict` is surfaced
    /// as-is and stops at the failing spec.
    pub fn ensure_indexes(&self, specs: &[IndexSpec]) -> Result<Vec<IndexAck>, DbError> {
        if specs.is_empty() {
            return Err(DbError::InvalidArgument("no index specs given".into()));
        }
        specs.iter().map(|spec| self.store.create_index(spec)).collect()
    }

    /// # Errors
    /// Store errors.
    pub fn list_indexes(&self) -> Result<Vec<IndexDescriptor>, DbError> {
        self.store.list_indexes()
    }

    /// # Errors
    /// Store errors.
    pub fn explain_find(&self, filter: &Filter) -> Result<ExplainReport, DbError> {
        self.store.explain_find(filter)
    }
}
