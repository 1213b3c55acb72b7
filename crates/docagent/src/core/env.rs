//! Environment variable interpolation for configuration values.
//!
//! Every `${NAME}` token inside a string leaf of the configuration tree is replaced by the
//! value of the environment variable `NAME`. Unset variables leave the token in place so a
//! partially configured document remains diagnosable; interpolation never fails.
//!
//! A leaf that consists of exactly one resolved token is re-read as a YAML scalar, so
//! `timeout_secs: ${TIMEOUT}` with `TIMEOUT=30` yields the integer `30` and `"true"` yields a
//! boolean. Mixed strings such as `http://${HOST}` always stay strings.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

/// Matches `${NAME}` where `NAME` is any run of characters other than `}`.
static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Interpolate `${VAR}` tokens in a value tree using the process environment.
pub fn interpolate(value: &Value) -> Value {
    substitute_value(value, &|name| std::env::var(name).ok())
}

/// Interpolate `${VAR}` tokens using an explicit variable map.
pub fn interpolate_with(value: &Value, env: &HashMap<String, String>) -> Value {
    substitute_value(value, &|name| env.get(name).cloned())
}

fn substitute_value(value: &Value, lookup: &dyn Fn(&str) -> Option<String>) -> Value {
    match value {
        Value::String(s) => match sole_token(s).and_then(|name| lookup(name)) {
            Some(resolved) => typed_scalar(resolved),
            None => Value::String(substitute_string(s, lookup)),
        },
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, lookup)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, lookup)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Name of the variable when `s` is a single `${NAME}` token and nothing else.
fn sole_token(s: &str) -> Option<&str> {
    let caps = ENV_VAR_PATTERN.captures(s)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != s.len() {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

fn typed_scalar(resolved: String) -> Value {
    match serde_yaml_ng::from_str::<Value>(&resolved) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(resolved),
    }
}

fn substitute_string(s: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    if !s.contains("${") {
        return s.to_string();
    }

    ENV_VAR_PATTERN
        .replace_all(s, |caps: &Captures| match lookup(&caps[1]) {
            Some(resolved) => resolved,
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Collect all variable names referenced anywhere in a value tree, sorted and deduplicated.
///
/// Run this on an interpolated tree to find the tokens that were left unresolved.
pub fn referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in ENV_VAR_PATTERN.captures_iter(s) {
                out.push(caps[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_vars(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars(v, out)),
        _ => {}
    }
}
