//! The ordered battery of report steps and its executor.

use crate::book::{AuthorBookCount, Book, DecadeCount, GenrePriceSummary, TitleAuthorPrice};
use crate::errors::DbError;
use crate::index::{IndexAck, IndexDescriptor, IndexSpec};
use crate::query::{CmpOp, DeleteReport, ExplainReport, Filter, Order, UpdateReport};
use crate::report::{ReportHeader, ReportSink, RunSummary, Section};
use crate::runner::QueryRunner;
use crate::store::DocumentStore;
use serde::Serialize;

/// One request the runner knows how to make.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    FindByGenre(String),
    FindPublishedAfter(i32),
    FindByAuthor(String),
    FindByTitle(String),
    /// Update, then read the book back.
    UpdatePrice { title: String, price: f64 },
    /// Delete, then count what is left.
    DeleteByTitle(String),
    FindInStockAfterYear(i32),
    ProjectTitleAuthorPrice,
    SortByPrice(Order),
    Paginate { page_size: usize, page_index: usize },
    AveragePriceByGenre,
    TopAuthorsByBookCount(usize),
    CountByDecade,
    EnsureIndexes(Vec<IndexSpec>),
    ListIndexes,
    ExplainFind(Filter),
    TopBy { field: String, order: Order, limit: usize },
    FindOutOfStock,
    FindPublishedBetween { from: i32, to: i32 },
    CountDocuments,
}

/// The typed result of one [`Operation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Outcome {
    Books(Vec<Book>),
    Updated { report: UpdateReport, books: Vec<Book> },
    Deleted { report: DeleteReport, remaining: u64 },
    Projection(Vec<TitleAuthorPrice>),
    GenreAverages(Vec<GenrePriceSummary>),
    AuthorCounts(Vec<AuthorBookCount>),
    DecadeCounts(Vec<DecadeCount>),
    IndexesEnsured(Vec<IndexAck>),
    Indexes(Vec<IndexDescriptor>),
    Plan(ExplainReport),
    Count(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub title: String,
    pub op: Operation,
}

impl Step {
    #[must_use]
    pub fn new(title: &str, op: Operation) -> Self {
        Self { title: title.to_string(), op }
    }
}

impl<S: DocumentStore> QueryRunner<S> {
    /// # Errors
    /// Whatever the underlying operation returns.
    pub fn execute(&self, op: &Operation) -> Result<Outcome, DbError> {
        Ok(match op {
            Operation::FindByGenre(genre) => Outcome::Books(self.find_by_genre(genre)?),
            Operation::FindPublishedAfter(year) => Outcome::Books(self.find_published_after(*year)?),
            Operation::FindByAuthor(author) => Outcome::Books(self.find_by_author(author)?),
            Operation::FindByTitle(title) => Outcome::Books(self.find_by_title(title)?),
            Operation::UpdatePrice { title, price } => {
                let report = self.update_price(title, *price)?;
                Outcome::Updated { report, books: self.find_by_title(title)? }
            }
            Operation::DeleteByTitle(title) => {
                let report = self.delete_by_title(title)?;
                Outcome::Deleted { report, remaining: self.count_documents()? }
            }
            Operation::FindInStockAfterYear(year) => {
                Outcome::Books(self.find_in_stock_after_year(*year)?)
            }
            Operation::ProjectTitleAuthorPrice => {
                Outcome::Projection(self.project_title_author_price()?)
            }
            Operation::SortByPrice(order) => Outcome::Books(self.sort_by_price(*order)?),
            Operation::Paginate { page_size, page_index } => {
                Outcome::Books(self.paginate(*page_size, *page_index)?)
            }
            Operation::AveragePriceByGenre => Outcome::GenreAverages(self.average_price_by_genre()?),
            Operation::TopAuthorsByBookCount(limit) => {
                Outcome::AuthorCounts(self.top_authors_by_book_count(*limit)?)
            }
            Operation::CountByDecade => Outcome::DecadeCounts(self.count_by_decade()?),
            Operation::EnsureIndexes(specs) => Outcome::IndexesEnsured(self.ensure_indexes(specs)?),
            Operation::ListIndexes => Outcome::Indexes(self.list_indexes()?),
            Operation::ExplainFind(filter) => Outcome::Plan(self.explain_find(filter)?),
            Operation::TopBy { field, order, limit } => {
                Outcome::Books(self.top_by(field, *order, *limit)?)
            }
            Operation::FindOutOfStock => Outcome::Books(self.find_out_of_stock()?),
            Operation::FindPublishedBetween { from, to } => {
                Outcome::Books(self.find_published_between(*from, *to)?)
            }
            Operation::CountDocuments => Outcome::Count(self.count_documents()?),
        })
    }
}

/// The bookstore report, in order.
#[must_use]
pub fn bookstore_battery() -> Vec<Step> {
    use Operation as Op;
    let mut steps = vec![
        Step::new("All Fiction books", Op::FindByGenre("Fiction".into())),
        Step::new("Books published after 1950", Op::FindPublishedAfter(1950)),
        Step::new("Books by George Orwell", Op::FindByAuthor("George Orwell".into())),
        Step::new(
            "Updating price of 'The Great Gatsby' to $14.99",
            Op::UpdatePrice { title: "The Great Gatsby".into(), price: 14.99 },
        ),
        Step::new("Deleting 'The Alchemist'", Op::DeleteByTitle("The Alchemist".into())),
        Step::new("In-stock books published after 2010", Op::FindInStockAfterYear(2010)),
        Step::new("Books with projection (title, author, price only)", Op::ProjectTitleAuthorPrice),
        Step::new("Books sorted by price (ascending)", Op::SortByPrice(Order::Asc)),
        Step::new("Books sorted by price (descending)", Op::SortByPrice(Order::Desc)),
    ];
    for (page_index, label) in ["Page 1 (books 1-5)", "Page 2 (books 6-10)", "Page 3 (books 11+)"]
        .into_iter()
        .enumerate()
    {
        steps.push(Step::new(label, Op::Paginate { page_size: 5, page_index }));
    }
    steps.extend([
        Step::new("Average price by genre", Op::AveragePriceByGenre),
        Step::new("Author with most books", Op::TopAuthorsByBookCount(3)),
        Step::new("Books count by publication decade", Op::CountByDecade),
        Step::new(
            "Creating indexes",
            Op::EnsureIndexes(vec![
                IndexSpec::single("title", Order::Asc),
                IndexSpec::compound(&[("author", Order::Asc), ("published_year", Order::Desc)]),
                IndexSpec::single("genre", Order::Asc),
                IndexSpec::single("in_stock", Order::Asc),
                IndexSpec::single("published_year", Order::Desc),
            ]),
        ),
        Step::new("Current indexes on books collection", Op::ListIndexes),
        Step::new(
            "Query without specific index (genre search)",
            Op::ExplainFind(Filter::eq("genre", "Fantasy")),
        ),
        Step::new("Query with title index", Op::ExplainFind(Filter::eq("title", "1984"))),
        Step::new(
            "Query with compound index (author + published_year)",
            Op::ExplainFind(Filter::And(vec![
                Filter::eq("author", "George Orwell"),
                Filter::cmp("published_year", CmpOp::Gt, 1940),
            ])),
        ),
        Step::new(
            "Most expensive book",
            Op::TopBy { field: "price".into(), order: Order::Desc, limit: 1 },
        ),
        Step::new("Cheapest book", Op::TopBy { field: "price".into(), order: Order::Asc, limit: 1 }),
        Step::new(
            "Longest books (by page count)",
            Op::TopBy { field: "pages".into(), order: Order::Desc, limit: 3 },
        ),
        Step::new("Out of stock books", Op::FindOutOfStock),
        Step::new(
            "Books from 20th century (1900-1999)",
            Op::FindPublishedBetween { from: 1900, to: 1999 },
        ),
        Step::new("Total books in collection", Op::CountDocuments),
    ]);
    steps
}

/// Execute `steps` strictly in order, handing each section to `sink` as soon as it is
/// ready. The first failing step aborts the run.
///
/// # Errors
/// The failing step's error, or `Io` when the sink cannot write.
pub fn run_battery<S: DocumentStore>(
    runner: &QueryRunner<S>,
    steps: &[Step],
    sink: &mut dyn ReportSink,
) -> Result<RunSummary, DbError> {
    let started = std::time::Instant::now();
    sink.begin(&ReportHeader::new(runner.store().name(), steps.len()))?;
    for (i, step) in steps.iter().enumerate() {
        let outcome = runner.execute(&step.op).map_err(|e| {
            log::error!("step {} '{}' failed: {e}", i + 1, step.title);
            e
        })?;
        log::debug!("step {} '{}' done", i + 1, step.title);
        sink.write_section(i + 1, &Section { title: step.title.clone(), outcome })?;
    }
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let summary = RunSummary { steps: steps.len(), elapsed_ms };
    sink.finish(&summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_mutates_before_it_reads_advanced_queries() {
        let steps = bookstore_battery();
        let update = steps.iter().position(|s| matches!(s.op, Operation::UpdatePrice { .. }));
        let delete = steps.iter().position(|s| matches!(s.op, Operation::DeleteByTitle(_)));
        let paginate = steps.iter().position(|s| matches!(s.op, Operation::Paginate { .. }));
        assert!(update < delete && delete < paginate);
        assert!(matches!(steps.last().map(|s| &s.op), Some(Operation::CountDocuments)));
    }

    #[test]
    fn outcome_serializes_kind_and_data() {
        let v = serde_json::to_value(Outcome::Count(11)).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "count", "data": 11}));
        let v = serde_json::to_value(Outcome::Deleted {
            report: DeleteReport { deleted: 1 },
            remaining: 11,
        })
        .unwrap();
        assert_eq!(v["kind"], "deleted");
        assert_eq!(v["data"]["report"]["deleted"], 1);
    }
}
