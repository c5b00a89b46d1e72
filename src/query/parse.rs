use crate::errors::DbError;
use crate::utils::json::json_to_bson;
use serde_json::{Map, Value};

use super::types::{CmpOp, Filter, MAX_IN_SET};

/// Parse a Mongo-style JSON filter such as
/// `{"author": "George Orwell", "published_year": {"$gt": 1940}}`.
///
/// Supported: implicit equality, `$eq`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`,
/// `$exists`, `$not` (per field) and top-level `$and` / `$or`. Several top-level keys, or
/// several operators on one field, are combined with an implicit AND.
///
/// # Errors
/// `Json` if the text is not JSON, `InvalidArgument` for an unknown operator or a
/// malformed operand.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    let val: Value = serde_json::from_str(json)?;
    let obj = val
        .as_object()
        .ok_or_else(|| DbError::InvalidArgument("filter must be a JSON object".into()))?;
    parse_object(obj)
}

fn parse_object(obj: &Map<String, Value>) -> Result<Filter, DbError> {
    let mut parts = Vec::with_capacity(obj.len());
    for (key, val) in obj {
        parts.push(match key.as_str() {
            "$and" => Filter::And(parse_list(key, val)?),
            "$or" => Filter::Or(parse_list(key, val)?),
            op if op.starts_with('$') => {
                return Err(DbError::InvalidArgument(format!("unsupported top-level operator {op}")));
            }
            field => parse_field(field, val)?,
        });
    }
    Ok(conjoin(parts))
}

fn parse_list(op: &str, val: &Value) -> Result<Vec<Filter>, DbError> {
    let items = val
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| DbError::InvalidArgument(format!("{op} needs a non-empty array")))?;
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| DbError::InvalidArgument(format!("{op} entries must be objects")))
                .and_then(parse_object)
        })
        .collect()
}

fn parse_field(field: &str, val: &Value) -> Result<Filter, DbError> {
    if field.is_empty() {
        return Err(DbError::InvalidArgument("empty field name in filter".into()));
    }
    let Some(ops) = val.as_object().filter(|m| m.keys().any(|k| k.starts_with('$'))) else {
        return Ok(Filter::eq(field, json_to_bson(val)));
    };
    let mut parts = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let cmp = |op: CmpOp| Filter::cmp(field, op, json_to_bson(operand));
        parts.push(match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$ne" => Filter::Not(Box::new(cmp(CmpOp::Eq))),
            "$in" => Filter::In { path: field.to_string(), values: value_set(op, operand)? },
            "$nin" => Filter::Nin { path: field.to_string(), values: value_set(op, operand)? },
            "$exists" => Filter::Exists {
                path: field.to_string(),
                exists: operand
                    .as_bool()
                    .ok_or_else(|| DbError::InvalidArgument("$exists takes a boolean".into()))?,
            },
            "$not" => Filter::Not(Box::new(parse_field(field, operand)?)),
            other => {
                return Err(DbError::InvalidArgument(format!(
                    "unsupported operator {other} on field '{field}'"
                )));
            }
        });
    }
    Ok(conjoin(parts))
}

fn value_set(op: &str, operand: &Value) -> Result<Vec<bson::Bson>, DbError> {
    let items = operand
        .as_array()
        .ok_or_else(|| DbError::InvalidArgument(format!("{op} takes an array")))?;
    if items.len() > MAX_IN_SET {
        return Err(DbError::InvalidArgument(format!("{op} set larger than {MAX_IN_SET}")));
    }
    Ok(items.iter().map(json_to_bson).collect())
}

fn conjoin(mut parts: Vec<Filter>) -> Filter {
    match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn empty_object_matches_everything() {
        assert_eq!(parse_filter_json("{}").unwrap(), Filter::True);
    }

    #[test]
    fn implicit_and_of_equality_and_range() {
        let f = parse_filter_json(r#"{"author":"George Orwell","published_year":{"$gt":1940}}"#)
            .unwrap();
        assert_eq!(
            f,
            Filter::And(vec![
                Filter::eq("author", "George Orwell"),
                Filter::cmp("published_year", CmpOp::Gt, 1940),
            ])
        );
    }

    #[test]
    fn range_pair_on_one_field() {
        let f = parse_filter_json(r#"{"published_year":{"$gte":1900,"$lte":1999}}"#).unwrap();
        let Filter::And(parts) = f else { panic!("expected And") };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], Filter::cmp("published_year", CmpOp::Lte, 1999));
    }

    #[test]
    fn set_and_logical_operators() {
        let f = parse_filter_json(
            r#"{"$or":[{"genre":{"$in":["Fantasy","Fiction"]}},{"in_stock":{"$exists":false}}]}"#,
        )
        .unwrap();
        let Filter::Or(parts) = f else { panic!("expected Or") };
        assert_eq!(
            parts[0],
            Filter::In {
                path: "genre".into(),
                values: vec![Bson::String("Fantasy".into()), Bson::String("Fiction".into())]
            }
        );
        assert_eq!(parts[1], Filter::Exists { path: "in_stock".into(), exists: false });
    }

    #[test]
    fn malformed_filters_are_invalid_arguments() {
        for bad in [
            "[1]",
            r#"{"$where":"x"}"#,
            r#"{"price":{"$regex":"a"}}"#,
            r#"{"genre":{"$in":"Fiction"}}"#,
            r#"{"$and":[]}"#,
        ] {
            assert!(matches!(parse_filter_json(bad), Err(DbError::InvalidArgument(_))), "{bad}");
        }
        assert!(matches!(parse_filter_json("{"), Err(DbError::Json(_))));
    }
}
