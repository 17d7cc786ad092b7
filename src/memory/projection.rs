//! Inclusion projections

use serde_json::{Map, Value};

use crate::driver::Document;

const ID_FIELD: &str = "_id";

/// Applies an inclusion projection.
///
/// `_id` is kept unless explicitly set to a falsy value. Other fields are
/// copied when their flag is truthy; dotted paths rebuild nested objects and
/// descend into arrays element by element, keeping the array shape.
pub(crate) fn apply(doc: &Document, projection: &Document) -> Document {
    let mut out = Map::new();

    let keep_id = projection.get(ID_FIELD).map_or(true, is_truthy);
    if keep_id {
        if let Some(id) = doc.get(ID_FIELD) {
            out.insert(ID_FIELD.to_string(), id.clone());
        }
    }

    for (path, flag) in projection {
        if path == ID_FIELD || !is_truthy(flag) {
            continue;
        }
        let segments: Vec<&str> = path.split('.').collect();
        include(doc, &mut out, &segments);
    }
    out
}

fn is_truthy(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Null => false,
        _ => true,
    }
}

/// Copies the value at `segments` from `source` into `out`
fn include(source: &Document, out: &mut Document, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = source.get(*head) else {
        return;
    };
    if rest.is_empty() {
        out.insert(head.to_string(), value.clone());
        return;
    }

    match value {
        Value::Object(child) => {
            let entry = out
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(target) = entry {
                include(child, target, rest);
            }
        }
        Value::Array(items) => {
            let entry = out
                .entry(head.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            include_in_array(items, entry, rest);
        }
        // a scalar has no sub-fields
        _ => {}
    }
}

/// Projects `segments` out of every object (or nested array) in `items`.
/// Scalars are dropped, so element positions line up across paths.
fn include_in_array(items: &[Value], target: &mut Value, segments: &[&str]) {
    if !target.is_array() {
        *target = Value::Array(Vec::new());
    }
    let Value::Array(out) = target else {
        return;
    };

    let kept = items.iter().filter(|item| item.is_object() || item.is_array());
    for (index, item) in kept.enumerate() {
        if out.len() <= index {
            out.push(match item {
                Value::Array(_) => Value::Array(Vec::new()),
                _ => Value::Object(Map::new()),
            });
        }
        match item {
            Value::Object(child) => {
                if !out[index].is_object() {
                    out[index] = Value::Object(Map::new());
                }
                if let Value::Object(slot) = &mut out[index] {
                    include(child, slot, segments);
                }
            }
            Value::Array(nested) => include_in_array(nested, &mut out[index], segments),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_keeps_listed_fields_and_id() {
        let source = doc(json!({"_id": 7, "lang": "es", "text": "hola", "n": 1}));
        let projected = apply(&source, &doc(json!({"lang": 1, "n": 1})));
        assert_eq!(Value::Object(projected), json!({"_id": 7, "lang": "es", "n": 1}));
    }

    #[test]
    fn test_suppress_id() {
        let source = doc(json!({"_id": 7, "lang": "es"}));
        let projected = apply(&source, &doc(json!({"_id": 0, "lang": 1})));
        assert_eq!(Value::Object(projected), json!({"lang": "es"}));
    }

    #[test]
    fn test_nested_paths() {
        let source = doc(json!({"place": {"country": "Spain", "country_code": "ES"}, "x": 1}));
        let projected = apply(&source, &doc(json!({"place.country_code": 1})));
        assert_eq!(Value::Object(projected), json!({"place": {"country_code": "ES"}}));
    }

    #[test]
    fn test_missing_fields_skipped() {
        let source = doc(json!({"a": 1}));
        let projected = apply(&source, &doc(json!({"b": 1})));
        assert!(projected.is_empty());
    }

    #[test]
    fn test_array_paths_keep_every_element() {
        let source = doc(json!({
            "_id": 1,
            "tags": [{"t": "a", "n": 1}, {"t": "b", "n": 2}, "loose"]
        }));
        let projected = apply(&source, &doc(json!({"tags.t": 1})));
        assert_eq!(
            Value::Object(projected),
            json!({"_id": 1, "tags": [{"t": "a"}, {"t": "b"}]})
        );
    }

    #[test]
    fn test_array_paths_merge_per_element() {
        let source = doc(json!({
            "entities": {"urls": [{"url": "u1", "idx": 0, "x": true}, {"url": "u2", "idx": 4}]}
        }));
        let projected = apply(&source, &doc(json!({"_id": 0, "entities.urls.url": 1, "entities.urls.idx": 1})));
        assert_eq!(
            Value::Object(projected),
            json!({"entities": {"urls": [{"url": "u1", "idx": 0}, {"url": "u2", "idx": 4}]}})
        );
    }
}
