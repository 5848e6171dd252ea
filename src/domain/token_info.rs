//! Usage: Introspection result (empty mapping = invalid/unknown token).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenInfo(BTreeMap<String, Value>);

impl TokenInfo {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn scopes(&self) -> Vec<&str> {
        self.0
            .get("scope")
            .and_then(Value::as_str)
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Remaining lifetime in seconds; the endpoint may send a number or a numeric string.
    pub fn expires_in(&self) -> Option<i64> {
        self.0.get("expires_in").and_then(parse_i64_lossy)
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

impl From<BTreeMap<String, Value>> for TokenInfo {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self(value)
    }
}

pub(crate) fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
