//! Query-string handling for signed paths.
//!
//! Parameters keep their first-seen order so the signed path and the path
//! on the wire are the same string.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Ordered query parameters. A key may carry several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, Vec<String>)>,
}

impl Query {
    /// Parse `a=1&b=x%20y&a=2`. Repeated keys collect their values.
    pub fn parse(query: &str) -> Self {
        let mut parsed = Query::default();
        for part in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            let key = decode(key);
            let value = decode(value);
            match parsed.pairs.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => parsed.pairs.push((key, vec![value])),
            }
        }
        parsed
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.iter().all(|(_, values)| values.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Replace the values of `key`, keeping its position if it exists.
    pub fn set(&mut self, key: &str, values: Vec<String>) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = values,
            None => self.pairs.push((key.to_string(), values)),
        }
    }

    /// Merge a JSON object in. Object keys overwrite same-named parameters.
    pub fn merge_json(&mut self, object: &Map<String, Value>) {
        for (key, value) in object {
            self.set(key, json_values(value));
        }
    }

    /// Encode back to `a=1&b=x%20y`.
    pub fn encode(&self) -> String {
        let mut out = Vec::new();
        for (key, values) in &self.pairs {
            let key = urlencoding::encode(key);
            for value in values {
                out.push(format!("{key}={}", urlencoding::encode(value)));
            }
        }
        out.join("&")
    }
}

/// Split a path into the part before `?` and the query after it.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((pathname, query)) => (pathname, Some(query)),
        None => (path, None),
    }
}

/// Fold the fields of a JSON object into the path's query string.
///
/// Non-object bodies contribute nothing. A path without any parameters
/// afterwards is returned without a trailing `?`.
pub fn merge_into_path(path: &str, body: &Value) -> String {
    let (pathname, query) = split_path(path);
    let mut params = Query::parse(query.unwrap_or_default());
    if let Some(object) = body.as_object() {
        params.merge_json(object);
    }
    if params.is_empty() {
        pathname.to_string()
    } else {
        format!("{pathname}?{}", params.encode())
    }
}

/// Append `key=value`, using `&` when the path already has a query.
///
/// `value` is appended as-is.
pub fn append_param(path: &str, key: &str, value: &str) -> String {
    let separator = match split_path(path) {
        (_, None) => "?",
        (_, Some("")) => "",
        (_, Some(q)) if q.ends_with('&') => "",
        (_, Some(_)) => "&",
    };
    format!("{path}{separator}{key}={value}")
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| spaced.clone())
}

fn json_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar).collect(),
        other => vec![scalar(other)],
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}
