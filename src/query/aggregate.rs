//! Aggregation pipeline: the stages and expression operators the bookstore reports use.
//!
//! Documents flow through the stages in order. Grouping keeps groups in the order their
//! first member was seen and sorting is stable, so ties always resolve to natural order.

use crate::collection::Collection;
use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use std::collections::HashMap;

use super::eval::{as_number, compare_docs, eval_filter, get_path};
use super::types::{Filter, SortSpec};

/// An expression evaluated against one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Value at a (dotted) field path; `"$price"` in Mongo syntax.
    Field(String),
    Literal(Bson),
    Subtract(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    ToString(Box<Expr>),
    Concat(Vec<Expr>),
    /// Round to the given number of decimal places, exact halves to even.
    Round(Box<Expr>, u32),
    /// First `n` elements of an array.
    Slice(Box<Expr>, usize),
}

impl Expr {
    #[must_use]
    pub fn field(path: &str) -> Self {
        Self::Field(path.to_string())
    }

    pub fn lit(value: impl Into<Bson>) -> Self {
        Self::Literal(value.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Expr),
    Avg(Expr),
    Push(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// Output only the listed fields; a field whose expression is missing is omitted.
    Project(Vec<(String, Expr)>),
    Group { id: Expr, fields: Vec<(String, Accumulator)> },
    Sort(Vec<SortSpec>),
    Skip(usize),
    Limit(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    #[must_use]
    pub const fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

/// Round to `places` decimals, an exact half going to the even digit:
/// `round_to(12.125, 2)` is `12.12`, `round_to(12.375, 2)` is `12.38`.
#[must_use]
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(i32::try_from(places).unwrap_or(i32::MAX));
    if !factor.is_finite() {
        return value;
    }
    (value * factor).round_ties_even() / factor
}

/// Run `pipeline` over the documents of `col` in natural order.
///
/// # Errors
/// Propagates expression errors from [`run_pipeline`].
pub fn aggregate(col: &Collection, pipeline: &Pipeline) -> Result<Vec<BsonDocument>, DbError> {
    let start = std::time::Instant::now();
    let input: Vec<BsonDocument> = col.get_all_documents().into_iter().map(|d| d.data).collect();
    let examined = input.len();
    let out = run_pipeline(input, pipeline)?;
    log::debug!(
        target: "plp_bookstore::query",
        "op=aggregate collection={} stages={} duration_ms={} docs_examined={examined} result_count={}",
        col.name_str(),
        pipeline.stages.len(),
        start.elapsed().as_millis(),
        out.len()
    );
    Ok(out)
}

/// # Errors
/// `Query` when arithmetic meets a non-numeric operand, `Mod` divides by zero, `Concat`
/// meets a non-string or `Slice` meets a non-array.
pub fn run_pipeline(
    mut docs: Vec<BsonDocument>,
    pipeline: &Pipeline,
) -> Result<Vec<BsonDocument>, DbError> {
    for stage in &pipeline.stages {
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| eval_filter(d, filter)).collect(),
            Stage::Project(fields) => {
                docs.iter().map(|d| project(d, fields)).collect::<Result<_, _>>()?
            }
            Stage::Group { id, fields } => group(&docs, id, fields)?,
            Stage::Sort(sort) => {
                docs.sort_by(|a, b| compare_docs(a, b, sort));
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
            Stage::Limit(n) => docs.into_iter().take(*n).collect(),
        };
    }
    Ok(docs)
}

fn project(doc: &BsonDocument, fields: &[(String, Expr)]) -> Result<BsonDocument, DbError> {
    let mut out = BsonDocument::new();
    for (name, expr) in fields {
        if let Some(v) = eval_expr(doc, expr)? {
            out.insert(name.clone(), v);
        }
    }
    Ok(out)
}

enum AccState {
    Sum { int: i64, float: f64, all_int: bool },
    Avg { total: f64, count: u64 },
    Push(Vec<Bson>),
}

impl AccState {
    const fn for_acc(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => Self::Sum { int: 0, float: 0.0, all_int: true },
            Accumulator::Avg(_) => Self::Avg { total: 0.0, count: 0 },
            Accumulator::Push(_) => Self::Push(Vec::new()),
        }
    }

    fn feed(&mut self, value: Option<Bson>) {
        match self {
            // non-numeric values are ignored by sum and avg
            Self::Sum { int, float, all_int } => match value {
                Some(Bson::Int32(i)) => *int = int.saturating_add(i64::from(i)),
                Some(Bson::Int64(i)) => *int = int.saturating_add(i),
                Some(Bson::Double(f)) => {
                    *all_int = false;
                    *float += f;
                }
                _ => {}
            },
            Self::Avg { total, count } => {
                if let Some(n) = value.as_ref().and_then(as_number) {
                    *total += n;
                    *count += 1;
                }
            }
            Self::Push(items) => items.extend(value),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self) -> Bson {
        match self {
            Self::Sum { int, all_int: true, .. } => {
                i32::try_from(int).map_or(Bson::Int64(int), Bson::Int32)
            }
            Self::Sum { int, float, .. } => Bson::Double(int as f64 + float),
            Self::Avg { count: 0, .. } => Bson::Null,
            Self::Avg { total, count } => Bson::Double(total / count as f64),
            Self::Push(items) => Bson::Array(items),
        }
    }
}

fn acc_expr(acc: &Accumulator) -> &Expr {
    match acc {
        Accumulator::Sum(e) | Accumulator::Avg(e) | Accumulator::Push(e) => e,
    }
}

fn group(
    docs: &[BsonDocument],
    id: &Expr,
    fields: &[(String, Accumulator)],
) -> Result<Vec<BsonDocument>, DbError> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for doc in docs {
        let key = eval_expr(doc, id)?.unwrap_or(Bson::Null);
        let slot = *slots.entry(key.to_string()).or_insert_with(|| {
            groups.push((key.clone(), fields.iter().map(|(_, a)| AccState::for_acc(a)).collect()));
            groups.len() - 1
        });
        for ((_, acc), state) in fields.iter().zip(groups[slot].1.iter_mut()) {
            state.feed(eval_expr(doc, acc_expr(acc))?);
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", key);
            for ((name, _), state) in fields.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}

/// Evaluate `expr`; `Ok(None)` means the value is missing.
///
/// # Errors
/// See [`run_pipeline`].
pub fn eval_expr(doc: &BsonDocument, expr: &Expr) -> Result<Option<Bson>, DbError> {
    Ok(match expr {
        Expr::Field(path) => get_path(doc, path).cloned(),
        Expr::Literal(v) => Some(v.clone()),
        Expr::Subtract(a, b) => Some(arith("$subtract", eval_expr(doc, a)?, eval_expr(doc, b)?)?),
        Expr::Mod(a, b) => Some(arith("$mod", eval_expr(doc, a)?, eval_expr(doc, b)?)?),
        Expr::ToString(e) => Some(match eval_expr(doc, e)? {
            None | Some(Bson::Null) => Bson::Null,
            Some(Bson::String(s)) => Bson::String(s),
            Some(Bson::Double(f)) => Bson::String(f.to_string()),
            Some(other) => Bson::String(other.to_string()),
        }),
        Expr::Concat(parts) => {
            let mut out = String::new();
            for part in parts {
                match eval_expr(doc, part)? {
                    None | Some(Bson::Null) => return Ok(Some(Bson::Null)),
                    Some(Bson::String(s)) => out.push_str(&s),
                    Some(other) => {
                        return Err(DbError::Query(format!(
                            "$concat only supports strings, not {other}"
                        )));
                    }
                }
            }
            Some(Bson::String(out))
        }
        Expr::Round(e, places) => match eval_expr(doc, e)? {
            None => None,
            Some(Bson::Null) => Some(Bson::Null),
            Some(Bson::Double(f)) => Some(Bson::Double(round_to(f, *places))),
            Some(v @ (Bson::Int32(_) | Bson::Int64(_))) => Some(v),
            Some(other) => {
                return Err(DbError::Query(format!("$round only supports numbers, not {other}")));
            }
        },
        Expr::Slice(e, n) => match eval_expr(doc, e)? {
            None => None,
            Some(Bson::Null) => Some(Bson::Null),
            Some(Bson::Array(items)) => Some(Bson::Array(items.into_iter().take(*n).collect())),
            Some(other) => {
                return Err(DbError::Query(format!("$slice needs an array, not {other}")));
            }
        },
    })
}

fn as_int(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

fn arith(op: &str, a: Option<Bson>, b: Option<Bson>) -> Result<Bson, DbError> {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) if a != Bson::Null && b != Bson::Null => (a, b),
        _ => return Ok(Bson::Null),
    };
    let narrow = matches!((&a, &b), (Bson::Int32(_), Bson::Int32(_)));
    if let (Some(x), Some(y)) = (as_int(&a), as_int(&b)) {
        let r = if op == "$mod" {
            if y == 0 {
                return Err(DbError::Query("$mod by zero".into()));
            }
            x.wrapping_rem(y)
        } else {
            x.wrapping_sub(y)
        };
        return Ok(match i32::try_from(r) {
            Ok(small) if narrow => Bson::Int32(small),
            _ => Bson::Int64(r),
        });
    }
    match (as_number(&a), as_number(&b)) {
        (Some(_), Some(y)) if op == "$mod" && y == 0.0 => Err(DbError::Query("$mod by zero".into())),
        (Some(x), Some(y)) if op == "$mod" => Ok(Bson::Double(x % y)),
        (Some(x), Some(y)) => Ok(Bson::Double(x - y)),
        _ => Err(DbError::Query(format!("{op} only supports numeric types, not {a} and {b}"))),
    }
}
