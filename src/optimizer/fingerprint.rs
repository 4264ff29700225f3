//! Query fingerprints
//!
//! A fingerprint identifies a (query text, arguments) pair. The query text is
//! normalized by collapsing whitespace between tokens. Each argument is encoded with a type
//! tag followed by a length-prefixed payload before hashing, so values that
//! print the same but differ in type (`"5"` and `5`) never collide.
//!
//! Object keys are encoded in sorted order, making the encoding independent
//! of in-memory map layout.

use std::fmt;

use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

use super::query::lex;

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_STRING: u8 = 0x05;
const TAG_ARRAY: u8 = 0x06;
const TAG_OBJECT: u8 = 0x07;

/// Domain separators so query fingerprints and plan fingerprints never share a space
const DOMAIN_RESULT: &[u8] = b"planopt/result/v1";
const DOMAIN_PLAN: &[u8] = b"planopt/plan/v1";

/// Stable identifier for a query and its arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    /// Fingerprint of a query with positional arguments (result cache key)
    pub fn new(query: &str, args: &[Value]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_RESULT);
        write_str(&mut hasher, &normalize_query(query));
        hasher.update((args.len() as u64).to_be_bytes());
        for arg in args {
            encode_value(&mut hasher, arg);
        }
        Self::from_digest(hasher)
    }

    /// Fingerprint of a query and its referenced tables (plan key)
    pub fn for_plan(query: &str, tables: &[String]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_PLAN);
        write_str(&mut hasher, &normalize_query(query));
        hasher.update((tables.len() as u64).to_be_bytes());
        for table in tables {
            write_str(&mut hasher, table);
        }
        Self::from_digest(hasher)
    }

    fn from_digest(hasher: Sha256) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Collapse runs of whitespace between tokens and trim.
///
/// Literals, quoted names and comments are copied byte for byte. Text that
/// does not tokenize is only trimmed.
pub fn normalize_query(query: &str) -> String {
    let Ok(lexemes) = lex(query) else {
        return query.trim().to_string();
    };

    let mut out = String::with_capacity(query.len());
    let mut pending_space = false;
    for lexeme in &lexemes {
        if lexeme.is_blank() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push_str(&query[lexeme.start..lexeme.end]);
    }
    out
}

fn write_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_be_bytes());
    hasher.update(s.as_bytes());
}

fn encode_number(hasher: &mut Sha256, n: &Number) {
    if let Some(i) = n.as_i64() {
        hasher.update([TAG_INT]);
        hasher.update((i as i128).to_be_bytes());
    } else if let Some(u) = n.as_u64() {
        hasher.update([TAG_INT]);
        hasher.update((u as i128).to_be_bytes());
    } else {
        let f = n.as_f64().unwrap_or(f64::NAN);
        hasher.update([TAG_FLOAT]);
        hasher.update(f.to_bits().to_be_bytes());
    }
}

fn encode_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([TAG_NULL]),
        Value::Bool(false) => hasher.update([TAG_FALSE]),
        Value::Bool(true) => hasher.update([TAG_TRUE]),
        Value::Number(n) => encode_number(hasher, n),
        Value::String(s) => {
            hasher.update([TAG_STRING]);
            write_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update([TAG_ARRAY]);
            hasher.update((items.len() as u64).to_be_bytes());
            for item in items {
                encode_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update([TAG_OBJECT]);
            hasher.update((map.len() as u64).to_be_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                write_str(hasher, key);
                encode_value(hasher, &map[key.as_str()]);
            }
        }
    }
}
