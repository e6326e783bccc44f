//! Turning raw inputs into canonical entities.
//!
//! Edge validation is lenient about representation (numbers, numeric
//! strings, legacy `v_from`/`v_to` names) and silent about failure: a bad
//! edge becomes `None` and the import moves on.

use serde_json::{Map, Value};
use tracing::debug;

use bulkingest_shared::{Document, Edge, ID_FIELD, RawInput};

const FROM_FIELDS: [&str; 2] = ["from_id", "v_from"];
const TO_FIELDS: [&str; 2] = ["to_id", "v_to"];
const EDGE_ID_FIELDS: [&str; 2] = ["id", ID_FIELD];

/// Validate a raw input as an edge. Returns `None` when an endpoint is
/// missing or non-numeric, or when a weight is present but non-numeric.
pub fn validate_edge(raw: RawInput) -> Option<Edge> {
    match raw {
        RawInput::Scalar(id) => {
            debug!(%id, "scalar input cannot be an edge, dropped");
            None
        }
        RawInput::Mapping(fields) => edge_from_fields(&fields),
        RawInput::Structured(value) => edge_from_fields(&value.as_fields()),
    }
}

/// Validate a raw input as a document. Never fails; a missing `_id` is
/// caught by the store when the document is written.
pub fn validate_doc(raw: RawInput) -> Document {
    match raw {
        RawInput::Scalar(id) => {
            let mut doc = Document::new();
            doc.insert(ID_FIELD, id.to_value());
            doc
        }
        RawInput::Mapping(fields) => Document::from(fields),
        RawInput::Structured(value) => Document::from(value.as_fields()),
    }
}

fn edge_from_fields(fields: &Map<String, Value>) -> Option<Edge> {
    let from_id = first_present(fields, &FROM_FIELDS).and_then(as_node_id);
    let to_id = first_present(fields, &TO_FIELDS).and_then(as_node_id);
    let (Some(from_id), Some(to_id)) = (from_id, to_id) else {
        debug!(?fields, "edge dropped: missing or non-numeric endpoint");
        return None;
    };

    let weight = match fields.get("weight") {
        None | Some(Value::Null) => 1.0,
        Some(value) => match as_weight(value) {
            Some(weight) => weight,
            None => {
                debug!(?fields, "edge dropped: non-numeric weight");
                return None;
            }
        },
    };

    Some(Edge {
        from_id,
        to_id,
        weight,
        id: first_present(fields, &EDGE_ID_FIELDS).and_then(as_node_id),
    })
}

fn first_present<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|value| !value.is_null())
}

fn as_node_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_weight(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|w| w.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkingest_shared::{LogicalRecord, RecordId, TEXT_FIELD};
    use serde_json::json;

    fn mapping(value: Value) -> RawInput {
        match value {
            Value::Object(map) => RawInput::Mapping(map),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn edge_from_mapping_defaults_weight() {
        let edge = validate_edge(mapping(json!({"from_id": 1, "to_id": 2}))).unwrap();
        assert_eq!(edge, Edge::new(1, 2));
    }

    #[test]
    fn edge_from_strings_and_legacy_names() {
        let edge =
            validate_edge(mapping(json!({"v_from": "10", "v_to": " 11 ", "weight": "0.25"})))
                .unwrap();
        assert_eq!((edge.from_id, edge.to_id, edge.weight), (10, 11, 0.25));
    }

    #[test]
    fn edge_missing_endpoint_is_dropped() {
        assert!(validate_edge(mapping(json!({"from_id": 1}))).is_none());
        assert!(validate_edge(mapping(json!({"from_id": 1, "to_id": null}))).is_none());
    }

    #[test]
    fn edge_non_numeric_endpoint_is_dropped() {
        assert!(validate_edge(mapping(json!({"from_id": "a", "to_id": 2}))).is_none());
        assert!(validate_edge(mapping(json!({"from_id": 1.5, "to_id": 2}))).is_none());
        assert!(validate_edge(mapping(json!({"from_id": [1], "to_id": 2}))).is_none());
    }

    #[test]
    fn edge_integral_float_endpoint_is_accepted() {
        let edge = validate_edge(mapping(json!({"from_id": 3.0, "to_id": 4}))).unwrap();
        assert_eq!(edge.from_id, 3);
    }

    #[test]
    fn edge_bad_weight_is_dropped() {
        assert!(validate_edge(mapping(json!({"from_id": 1, "to_id": 2, "weight": "heavy"}))).is_none());
    }

    #[test]
    fn edge_from_structured_value() {
        let raw = RawInput::structured(Edge::new(5, 6).with_weight(2.5).with_id(9));
        let edge = validate_edge(raw).unwrap();
        assert_eq!(edge, Edge::new(5, 6).with_weight(2.5).with_id(9));
    }

    #[test]
    fn scalar_is_never_an_edge() {
        assert!(validate_edge(RawInput::Scalar(RecordId::Int(1))).is_none());
    }

    #[test]
    fn doc_from_scalar() {
        let doc = validate_doc(RawInput::Scalar(RecordId::from("k")));
        assert_eq!(doc.id(), Some(RecordId::from("k")));
        assert_eq!(doc.fields().len(), 1);
    }

    #[test]
    fn doc_from_mapping_keeps_fields() {
        let doc = validate_doc(mapping(json!({"_id": 2, "title": "t", "tags": ["a"]})));
        assert_eq!(doc.id(), Some(RecordId::Int(2)));
        assert_eq!(doc.get("tags"), Some(&json!(["a"])));
    }

    #[test]
    fn doc_from_record() {
        let doc = validate_doc(RawInput::from(LogicalRecord::new(7, "body")));
        assert_eq!(doc.id(), Some(RecordId::Int(7)));
        assert_eq!(doc.get(TEXT_FIELD), Some(&json!("body")));
    }

    #[test]
    fn doc_without_id_is_still_a_document() {
        let doc = validate_doc(mapping(json!({"title": "untitled"})));
        assert_eq!(doc.id(), None);
    }
}
