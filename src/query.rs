//! Filters, find options and the query executor over a [`Collection`](crate::collection::Collection).

mod aggregate;
mod eval;
mod exec;
mod explain;
mod parse;
mod types;

pub use aggregate::{Accumulator, Expr, Pipeline, Stage, aggregate, eval_expr, round_to, run_pipeline};
pub use eval::{as_number, compare_bson, compare_docs, eval_filter, get_path};
pub use exec::{apply_update, count_docs, delete_one, find_docs, update_one};
pub use explain::{ExplainReport, NO_INDEX, PlanStage, explain_find};
pub use parse::parse_filter_json;
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, Order, SortSpec, UpdateDoc, UpdateReport,
};
