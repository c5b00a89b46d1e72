use bson::{Bson, Document as BsonDocument};
use serde_json::{Map, Number, Value};

use crate::errors::DbError;

/// Convert a JSON value into bson. Integers that fit in 32 bits become `Int32`,
/// larger ones `Int64`, everything else numeric `Double`.
#[must_use]
pub fn json_to_bson(val: &Value) -> Bson {
    match val {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(object_to_document(map)),
    }
}

fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        return i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32);
    }
    Bson::Double(n.as_f64().unwrap_or(f64::NAN))
}

#[must_use]
pub fn object_to_document(map: &Map<String, Value>) -> BsonDocument {
    let mut doc = BsonDocument::new();
    for (k, v) in map {
        doc.insert(k.clone(), json_to_bson(v));
    }
    doc
}

/// Parse a JSON string that must be a top-level object.
///
/// # Errors
/// `Json` for malformed input, `InvalidArgument` when the value is not an object.
pub fn parse_json_document(json: &str) -> Result<BsonDocument, DbError> {
    let val: Value = serde_json::from_str(json)?;
    val.as_object()
        .map(object_to_document)
        .ok_or_else(|| DbError::InvalidArgument("expected a JSON object".into()))
}

/// Relaxed JSON view of a bson value, as printed in reports.
#[must_use]
pub fn bson_to_json(val: &Bson) -> Value {
    match val {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(d) => document_to_json(d),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        other => Value::String(other.to_string()),
    }
}

#[must_use]
pub fn document_to_json(doc: &BsonDocument) -> Value {
    Value::Object(doc.iter().map(|(k, v)| (k.clone(), bson_to_json(v))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numbers_pick_the_narrowest_width() {
        assert_eq!(json_to_bson(&serde_json::json!(1949)), Bson::Int32(1949));
        assert_eq!(json_to_bson(&serde_json::json!(5_000_000_000_i64)), Bson::Int64(5_000_000_000));
        assert_eq!(json_to_bson(&serde_json::json!(12.99)), Bson::Double(12.99));
    }

    #[test]
    fn parse_rejects_non_objects() {
        let d = parse_json_document(r#"{"a":1,"b":"x"}"#).unwrap();
        assert_eq!(d.get_i32("a").unwrap(), 1);
        assert!(matches!(parse_json_document("[1,2,3]"), Err(DbError::InvalidArgument(_))));
        assert!(matches!(parse_json_document("{"), Err(DbError::Json(_))));
    }

    #[test]
    fn nested_documents_render_as_objects() {
        let d = doc! {"title": "1984", "meta": {"pages": 328, "price": 10.99}, "tags": ["a"]};
        let v = document_to_json(&d);
        assert_eq!(v["meta"]["pages"], 328);
        assert_eq!(v["meta"]["price"], 10.99);
        assert_eq!(v["tags"][0], "a");
    }
}
