use crate::collection::Collection;
use serde::Serialize;

use super::exec::execute_find;
use super::types::{Filter, FindOptions};

/// Label reported when a query scans the whole collection.
pub const NO_INDEX: &str = "COLLSCAN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanStage {
    Ixscan,
    Collscan,
}

/// Execution statistics for one find, in the shape of an `executionStats` explain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainReport {
    pub stage: PlanStage,
    pub index_name: Option<String>,
    pub execution_time_ms: u64,
    pub total_docs_examined: u64,
    pub total_keys_examined: u64,
    pub n_returned: u64,
}

impl ExplainReport {
    /// The chosen index, or `COLLSCAN`.
    #[must_use]
    pub fn index_label(&self) -> &str {
        self.index_name.as_deref().unwrap_or(NO_INDEX)
    }
}

/// Run `filter` and report how it was executed.
#[must_use]
pub fn explain_find(col: &Collection, filter: &Filter) -> ExplainReport {
    let start = std::time::Instant::now();
    let (docs, stats) = execute_find(col, filter, &FindOptions::default());
    let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let report = ExplainReport {
        stage: if stats.index_name.is_some() { PlanStage::Ixscan } else { PlanStage::Collscan },
        index_name: stats.index_name,
        execution_time_ms: elapsed,
        total_docs_examined: stats.docs_examined,
        total_keys_examined: stats.keys_examined,
        n_returned: docs.len() as u64,
    };
    log::debug!(
        target: "plp_bookstore::query",
        "op=explain collection={} filter={filter:?} index={} examined={} returned={}",
        col.name_str(),
        report.index_label(),
        report.total_docs_examined,
        report.n_returned
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::index::IndexSpec;
    use crate::query::Order;
    use bson::doc;

    #[test]
    fn collscan_examines_every_document() {
        let col = Collection::new("e".into());
        for i in 0..4 {
            col.insert_document(Document::new(doc! {"n": i}));
        }
        let r = explain_find(&col, &Filter::eq("n", 2));
        assert_eq!(r.stage, PlanStage::Collscan);
        assert_eq!(r.index_label(), NO_INDEX);
        assert_eq!(r.total_docs_examined, 4);
        assert_eq!(r.n_returned, 1);

        col.create_index(&IndexSpec::single("n", Order::Asc)).unwrap();
        let r = explain_find(&col, &Filter::eq("n", 2));
        assert_eq!(r.stage, PlanStage::Ixscan);
        assert_eq!(r.index_label(), "n_1");
        assert_eq!(r.total_docs_examined, 1);
        assert_eq!(r.total_keys_examined, 1);
    }
}
