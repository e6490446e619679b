//! Strict parser for list/map literals found in text columns.
//!
//! Accepts JSON plus the repr subset older exports contain: single-quoted strings and the
//! `None`/`True`/`False` constants. Anything else, including trailing input, is rejected.

use serde_json::{Map, Number, Value};
use std::iter::Peekable;
use std::str::Chars;

const MAX_DEPTH: usize = 64;

/// Parse a literal, or `None` when the text is not exactly one well-formed literal.
pub fn parse_literal(text: &str) -> Option<Value> {
    let mut parser = Parser {
        chars: text.chars().peekable(),
    };
    let value = parser.value(0)?;
    parser.skip_whitespace();
    match parser.chars.next() {
        None => Some(value),
        Some(_) => None,
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn value(&mut self, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return None;
        }
        self.skip_whitespace();
        match *self.chars.peek()? {
            '[' => self.list(depth),
            '{' => self.map(depth),
            '"' | '\'' => self.string().map(Value::String),
            c if c == '-' || c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() => self.constant(),
            _ => None,
        }
    }

    fn list(&mut self, depth: usize) -> Option<Value> {
        self.chars.next();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.chars.next_if_eq(&']').is_some() {
                return Some(Value::Array(items));
            }
            items.push(self.value(depth + 1)?);
            self.skip_whitespace();
            match self.chars.next()? {
                ',' => continue,
                ']' => return Some(Value::Array(items)),
                _ => return None,
            }
        }
    }

    fn map(&mut self, depth: usize) -> Option<Value> {
        self.chars.next();
        let mut entries = Map::new();
        loop {
            self.skip_whitespace();
            if self.chars.next_if_eq(&'}').is_some() {
                return Some(Value::Object(entries));
            }
            let key = match self.value(depth + 1)? {
                Value::String(key) => key,
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            self.skip_whitespace();
            if self.chars.next()? != ':' {
                return None;
            }
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
            self.skip_whitespace();
            match self.chars.next()? {
                ',' => continue,
                '}' => return Some(Value::Object(entries)),
                _ => return None,
            }
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.chars.next()?;
        let mut out = String::new();
        loop {
            match self.chars.next()? {
                c if c == quote => return Some(out),
                '\\' => out.push(self.escape()?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Option<char> {
        let c = match self.chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            'u' => {
                let hex: String = (0..4).map(|_| self.chars.next()).collect::<Option<_>>()?;
                char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?
            }
            c @ ('"' | '\'' | '\\' | '/') => c,
            _ => return None,
        };
        Some(c)
    }

    fn number(&mut self) -> Option<Value> {
        let mut raw = String::new();
        while let Some(c) = self
            .chars
            .next_if(|c| c.is_ascii_digit() || matches!(*c, '-' | '+' | '.' | 'e' | 'E'))
        {
            raw.push(c);
        }
        if let Ok(int) = raw.parse::<i64>() {
            return Some(Value::Number(int.into()));
        }
        let float: f64 = raw.parse().ok()?;
        Number::from_f64(float).map(Value::Number)
    }

    fn constant(&mut self) -> Option<Value> {
        let mut word = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
            word.push(c);
        }
        match word.as_str() {
            "None" | "null" => Some(Value::Null),
            "True" | "true" => Some(Value::Bool(true)),
            "False" | "false" => Some(Value::Bool(false)),
            _ => None,
        }
    }
}
