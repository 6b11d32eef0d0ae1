//! # Variable Binder
//!
//! Discovers `{{namespace.path}}` tokens in a rendered document and resolves
//! them against arbitrarily nested JSON data.
//!
//! Resolution is fail-soft: a token whose path is absent (or `null`, the JSON
//! stand-in for "undefined") is left literally in the output so partial data
//! still produces a usable preview. `missing` reports exactly those tokens.
//! Arrays are leaves: they are neither flattened nor indexed by path.

use crate::render::sanitize::escape_html;
use common::model::variable::{VariableBinding, GENERAL_NAMESPACE};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("token pattern is valid"));

/// Unique token paths in discovery order.
pub fn detect_tokens(document: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TOKEN_RE
        .captures_iter(document)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Replaces every token whose path resolves to a renderable value.
///
/// Strings are HTML-escaped, numbers and booleans use their JSON text and
/// arrays are joined with `", "`. Anything else keeps the literal token.
pub fn resolve(document: &str, data: &Value) -> String {
    TOKEN_RE
        .replace_all(document, |caps: &Captures| {
            lookup(data, &caps[1])
                .and_then(display_value)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Flattens nested objects into dot-path keys. Arrays are kept as leaf values
/// and `null` leaves are omitted.
pub fn flatten(data: &Value) -> HashMap<String, Value> {
    let mut flat = HashMap::new();
    if let Value::Object(map) = data {
        flatten_into(map, None, &mut flat);
    }
    flat
}

fn flatten_into(map: &Map<String, Value>, prefix: Option<&str>, flat: &mut HashMap<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten_into(inner, Some(&path), flat),
            Value::Null => {}
            leaf => {
                flat.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuilds a nested object from dot-path keys. Later keys win on conflicts.
pub fn unflatten<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut root = Map::new();
    for (path, value) in entries {
        let segments: Vec<&str> = path.as_ref().split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };
        let mut cursor = &mut root;
        for segment in parents {
            let slot = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            cursor = match slot {
                Value::Object(map) => map,
                _ => unreachable!("slot was just made an object"),
            };
        }
        cursor.insert(last.to_string(), value);
    }
    Value::Object(root)
}

/// Groups tokens by their first path segment; dot-less tokens go to `general`.
pub fn group_by_namespace<S: AsRef<str>>(tokens: &[S]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for token in tokens {
        let token = token.as_ref();
        let namespace = match token.split_once('.') {
            Some((namespace, _)) => namespace,
            None => GENERAL_NAMESPACE,
        };
        groups
            .entry(namespace.to_string())
            .or_default()
            .push(token.to_string());
    }
    groups
}

/// Tokens with no entry in the flattened data, in token order.
pub fn missing<S: AsRef<str>>(tokens: &[S], flattened: &HashMap<String, Value>) -> Vec<String> {
    tokens
        .iter()
        .map(AsRef::as_ref)
        .filter(|token| !flattened.contains_key(*token))
        .map(str::to_string)
        .collect()
}

/// Detects, groups and checks tokens of `document` against `data`.
pub fn bind(document: &str, data: &Value) -> VariableBinding {
    let tokens = detect_tokens(document);
    let flattened = flatten(data);
    VariableBinding {
        groups: group_by_namespace(&tokens),
        missing: missing(&tokens, &flattened),
        tokens,
    }
}

fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, segment| current.as_object()?.get(segment))
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(escape_html(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(display_value)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_unique_tokens_in_order() {
        let doc = "{{b.x}} {{ a }} {{b.x}} {{c.d.e}} {{not valid}} {{a}}";
        assert_eq!(detect_tokens(doc), vec!["b.x", "a", "c.d.e"]);
    }

    #[test]
    fn tokens_are_case_sensitive() {
        let doc = "{{Name}} {{name}}";
        assert_eq!(detect_tokens(doc), vec!["Name", "name"]);
    }

    #[test]
    fn resolves_nested_paths_and_keeps_unknown_literal() {
        let doc = "<p>{{recipient.name}} / {{recipient.age}} / {{course.title}}</p>";
        let data = json!({"recipient": {"name": "Ada", "age": 36}});
        assert_eq!(
            resolve(doc, &data),
            "<p>Ada / 36 / {{course.title}}</p>"
        );
    }

    #[test]
    fn resolve_escapes_string_values() {
        let data = json!({"recipient": {"name": "<b>Ada</b>"}});
        assert_eq!(resolve("{{recipient.name}}", &data), "&lt;b&gt;Ada&lt;&#x2F;b&gt;");
    }

    #[test]
    fn null_and_object_values_stay_literal() {
        let data = json!({"a": null, "b": {"c": 1}});
        assert_eq!(resolve("{{a}}|{{b}}|{{b.c}}", &data), "{{a}}|{{b}}|1");
    }

    #[test]
    fn resolve_through_scalar_is_missing() {
        let data = json!({"a": "text"});
        assert_eq!(resolve("{{a.b}}", &data), "{{a.b}}");
    }

    #[test]
    fn empty_string_is_present() {
        let data = json!({"recipient": {"name": ""}});
        assert_eq!(resolve("[{{recipient.name}}]", &data), "[]");
        let binding = bind("{{recipient.name}}", &data);
        assert!(binding.missing.is_empty());
    }

    #[test]
    fn null_counts_as_missing() {
        let binding = bind("{{recipient.name}}", &json!({"recipient": {"name": null}}));
        assert_eq!(binding.missing, vec!["recipient.name"]);
    }

    #[test]
    fn arrays_are_leaves() {
        let data = json!({"tags": ["a", "b"], "n": {"list": [1, 2]}});
        assert_eq!(resolve("{{tags}} {{n.list}}", &data), "a, b 1, 2");
        let flat = flatten(&data);
        assert_eq!(flat.get("tags"), Some(&json!(["a", "b"])));
        assert!(!flat.contains_key("tags.0"));
    }

    #[test]
    fn non_object_root_flattens_to_nothing() {
        assert!(flatten(&json!([1, 2, 3])).is_empty());
        assert!(flatten(&json!("x")).is_empty());
    }

    #[test]
    fn general_namespace_for_dotless_tokens() {
        let groups = group_by_namespace(&["fecha", "firma_1.nombre"]);
        assert_eq!(groups[GENERAL_NAMESPACE], vec!["fecha"]);
        assert_eq!(groups["firma_1"], vec!["firma_1.nombre"]);
    }

    #[test]
    fn unflatten_rebuilds_nesting() {
        let value = unflatten(vec![
            ("recipient.name", json!("Ada")),
            ("recipient.email", json!("ada@example.com")),
            ("course", json!("Rust")),
        ]);
        assert_eq!(
            value,
            json!({"recipient": {"name": "Ada", "email": "ada@example.com"}, "course": "Rust"})
        );
        assert_eq!(flatten(&value).len(), 3);
    }

    #[test]
    fn bind_reports_everything() {
        let doc = "{{recipient.name}} {{firma_1.nombre}} {{firma_1.puesto}} {{fecha}}";
        let binding = bind(doc, &json!({"firma_1": {"nombre": "Grace"}, "fecha": "hoy"}));
        assert_eq!(binding.tokens.len(), 4);
        assert_eq!(binding.groups.len(), 3);
        assert_eq!(binding.missing, vec!["recipient.name", "firma_1.puesto"]);
        assert!(!binding.is_complete());
    }
}
