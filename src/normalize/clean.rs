//! Per-value cleaning rules. Every cleaner maps unparsable input to `None`.

use super::literal::parse_literal;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::LazyLock;

static NON_PRICE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.]").expect("hardcoded regex pattern is valid"));

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\.?[0-9]*").expect("hardcoded regex pattern is valid"));

/// Text values that stand for "no value"
const NULL_TOKENS: [&str; 5] = ["undefined", "null", "None", "NaN", "nan"];

const TRUE_TOKENS: [&str; 4] = ["true", "1", "yes", "نعم"];
const FALSE_TOKENS: [&str; 4] = ["false", "0", "no", "لا"];

fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => {
            let text = text.trim();
            text.is_empty() || NULL_TOKENS.contains(&text)
        }
        _ => false,
    }
}

/// Fold Arabic-Indic and Eastern Arabic-Indic digits to ASCII.
pub fn fold_digits(text: &str) -> Cow<'_, str> {
    let arabic_digit = |c: char| match c {
        '\u{0660}'..='\u{0669}' => Some(c as u32 - 0x0660),
        '\u{06F0}'..='\u{06F9}' => Some(c as u32 - 0x06F0),
        _ => None,
    };
    if !text.chars().any(|c| arabic_digit(c).is_some()) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| {
                arabic_digit(c)
                    .and_then(|d| char::from_digit(d, 10))
                    .unwrap_or(c)
            })
            .collect(),
    )
}

fn bool_as_number(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Money amounts: thousands separators and currency text are dropped.
pub fn clean_price(value: &Value) -> Option<f64> {
    if is_null_like(value) {
        return None;
    }
    let amount: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(flag) => Some(bool_as_number(*flag)),
        Value::String(text) => {
            let text = fold_digits(text);
            let digits = NON_PRICE_CHARS.replace_all(text.trim(), "");
            if digits.is_empty() {
                return None;
            }
            digits.parse().ok()
        }
        _ => None,
    };
    amount.filter(|n| n.is_finite())
}

/// Counts and measures: the first number embedded in the text.
pub fn clean_numeric(value: &Value) -> Option<f64> {
    if is_null_like(value) {
        return None;
    }
    let number: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(flag) => Some(bool_as_number(*flag)),
        Value::String(text) => {
            let text = fold_digits(text);
            FIRST_NUMBER.find(&text)?.as_str().parse().ok()
        }
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Tri-state flags. Unrecognized text is `None`, not `false`.
pub fn clean_bool(value: &Value) -> Option<bool> {
    if is_null_like(value) {
        return None;
    }
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(text) => {
            let token = text.trim().to_lowercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                Some(true)
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Free text: trimmed, inner whitespace runs collapsed to one space.
pub fn clean_text(value: &Value) -> Option<String> {
    if is_null_like(value) {
        return None;
    }
    let text = match value {
        Value::String(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Value::Number(n) => n.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Epoch timestamps, coerced to a number without unit conversion.
pub fn clean_timestamp(value: &Value) -> Option<f64> {
    if is_null_like(value) {
        return None;
    }
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(flag) => Some(bool_as_number(*flag)),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Lists, given either structurally or as a list literal. Empty lists are `None`.
pub fn clean_list(value: &Value) -> Option<Vec<Value>> {
    if is_null_like(value) {
        return None;
    }
    let items = match value {
        Value::Array(items) => items.clone(),
        Value::String(text) => {
            let text = text.trim();
            if !(text.starts_with('[') && text.ends_with(']')) {
                return None;
            }
            match parse_literal(text)? {
                Value::Array(items) => items,
                _ => return None,
            }
        }
        _ => return None,
    };
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Nested objects, given either structurally or as a map literal. Empty maps are `None`.
pub fn clean_object(value: &Value) -> Option<Map<String, Value>> {
    if is_null_like(value) {
        return None;
    }
    let entries = match value {
        Value::Object(entries) => entries.clone(),
        Value::String(text) => {
            let text = text.trim();
            if !(text.starts_with('{') && text.ends_with('}')) {
                return None;
            }
            match parse_literal(text)? {
                Value::Object(entries) => entries,
                _ => return None,
            }
        }
        _ => return None,
    };
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}
