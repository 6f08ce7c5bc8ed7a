//! Dot-delimited access into nested records.
//!
//! `a.b.0.c` walks mapping keys `a` and `b`, element `0` of a sequence, then
//! key `c`. Segments are taken literally, so `x.` addresses the empty key under
//! `x`.

use serde_json::{Map, Value};

/// Path separator.
pub const SEPARATOR: char = '.';

/// Borrow the value at `path`, or `None` when any segment does not resolve.
pub fn get_ref<'a>(structure: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(SEPARATOR).try_fold(structure, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Value at `path`, or `default` when the path does not resolve.
pub fn get_from_key(structure: &Value, path: &str, default: Value) -> Value {
    get_ref(structure, path).cloned().unwrap_or(default)
}

/// Write `value` at `path`, creating intermediate mappings as needed.
///
/// Never fails: an intermediate scalar is replaced by a fresh mapping and a
/// scalar root becomes one. A sequence grows by one when the segment is its
/// length; any other segment turns it into a mapping keyed by element index,
/// so existing elements are kept.
pub fn set_from_key(structure: &mut Value, path: &str, value: Value) {
    let mut segments = path.split(SEPARATOR).peekable();
    let mut node = structure;

    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        node = match descend(node, segment) {
            Slot::Index(items, index) => {
                if last {
                    items[index] = value;
                    return;
                }
                &mut items[index]
            }
            Slot::Key(map) => {
                if last {
                    map.insert(segment.to_string(), value);
                    return;
                }
                let child = map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !child.is_object() && !child.is_array() {
                    *child = Value::Object(Map::new());
                }
                child
            }
        };
    }
}

enum Slot<'a> {
    Key(&'a mut Map<String, Value>),
    Index(&'a mut Vec<Value>, usize),
}

fn descend<'a>(node: &'a mut Value, segment: &str) -> Slot<'a> {
    let index = segment.parse::<usize>().ok();
    let replacement = match &mut *node {
        Value::Array(items) => match index {
            Some(i) if i < items.len() => None,
            Some(i) if i == items.len() => {
                items.push(Value::Null);
                None
            }
            _ => Some(
                std::mem::take(items)
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), item))
                    .collect(),
            ),
        },
        Value::Object(_) => None,
        _ => Some(Map::new()),
    };
    if let Some(map) = replacement {
        *node = Value::Object(map);
    }

    match (node, index) {
        (Value::Array(items), Some(i)) => Slot::Index(items, i),
        (Value::Object(map), _) => Slot::Key(map),
        _ => unreachable!("node is an indexable sequence or a mapping"),
    }
}

/// Text form of a value for templates and keys.
///
/// Strings verbatim, null as empty, numbers and booleans in JSON notation,
/// nested structures as compact JSON.
pub fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested() {
        let data = json!({"order": {"lines": [{"sku": "A1"}, {"sku": "B2"}]}});
        assert_eq!(get_from_key(&data, "order.lines.1.sku", json!("")), json!("B2"));
        assert_eq!(get_ref(&data, "order.lines"), data["order"].get("lines"));
    }

    #[test]
    fn test_get_miss_returns_default() {
        let data = json!({"a": {"b": 1}});
        assert_eq!(get_from_key(&data, "a.c", json!("")), json!(""));
        assert_eq!(get_from_key(&data, "a.b.c", json!(null)), json!(null));
        assert_eq!(get_from_key(&data, "missing", json!(7)), json!(7));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut data = json!({});
        set_from_key(&mut data, "sales.FR.2024", json!(4048));
        assert_eq!(data, json!({"sales": {"FR": {"2024": 4048}}}));

        set_from_key(&mut data, "sales.DE.2024", json!(1));
        assert_eq!(data["sales"]["FR"]["2024"], 4048);
        assert_eq!(data["sales"]["DE"]["2024"], 1);
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let mut data = json!({"a": "scalar"});
        set_from_key(&mut data, "a.b", json!(true));
        assert_eq!(data, json!({"a": {"b": true}}));

        let mut root = json!(3);
        set_from_key(&mut root, "k", json!("v"));
        assert_eq!(root, json!({"k": "v"}));
    }

    #[test]
    fn test_set_into_sequence_element() {
        let mut data = json!({"lines": [{"qty": 1}, {"qty": 2}]});
        set_from_key(&mut data, "lines.1.qty", json!(5));
        assert_eq!(data["lines"][1]["qty"], 5);
    }

    #[test]
    fn test_set_keeps_existing_sequence_elements() {
        let mut data = json!({"tags": ["a", "b"]});
        set_from_key(&mut data, "tags.2", json!("c"));
        assert_eq!(data, json!({"tags": ["a", "b", "c"]}));

        let mut data = json!({"tags": ["a", "b"]});
        set_from_key(&mut data, "tags.5", json!("z"));
        assert_eq!(data, json!({"tags": {"0": "a", "1": "b", "5": "z"}}));

        let mut data = json!({"tags": ["a", "b"]});
        set_from_key(&mut data, "tags.extra.n", json!(1));
        assert_eq!(data["tags"]["0"], "a");
        assert_eq!(data["tags"]["1"], "b");
        assert_eq!(data["tags"]["extra"]["n"], 1);
    }

    #[test]
    fn test_set_empty_trailing_segment() {
        let mut data = json!({});
        set_from_key(&mut data, "x.", json!(1));
        assert_eq!(data, json!({"x": {"": 1}}));
    }

    #[test]
    fn test_value_to_key() {
        assert_eq!(value_to_key(&json!("FR")), "FR");
        assert_eq!(value_to_key(&json!(2024)), "2024");
        assert_eq!(value_to_key(&json!(false)), "false");
        assert_eq!(value_to_key(&json!(null)), "");
        assert_eq!(value_to_key(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
