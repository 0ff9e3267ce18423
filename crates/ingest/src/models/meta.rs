//! Typed metadata values for open metadata maps.
//!
//! Replaces bag-of-any maps with a tagged variant plus an explicit escape
//! hatch for structured values, and typed accessors for the well-known keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scalar-or-raw metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Other(serde_json::Value),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Scalar rendering for payload envelopes; `None` for structured values.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::Other(_) => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<serde_json::Value> for MetaValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            other => Self::Other(other),
        }
    }
}

/// Open metadata map, ordered for deterministic serialization.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Well-known metadata keys.
pub mod keys {
    pub const EMBEDDED_MESSAGE: &str = "embedded_message";
    pub const MESSAGE: &str = "message";
    pub const VISIBLE_PIXEL_HASH: &str = "visible_pixel_hash";
    pub const CONTRACT_ID: &str = "contract_id";
    pub const INGESTION_ID: &str = "ingestion_id";
    pub const STEGO_CONTRACT_ID: &str = "stego_contract_id";
    pub const STEGO_IMAGE_CID: &str = "stego_image_cid";
    pub const PAYLOAD_CID: &str = "payload_cid";
    pub const MANIFEST_CREATED_AT: &str = "manifest_created_at";
    pub const REQUEST_ID: &str = "request_id";
    pub const STEGO_METHOD: &str = "stego_method";
}

/// Typed accessors over a metadata map.
pub trait MetadataExt {
    fn str_value(&self, key: &str) -> Option<&str>;
    fn embedded_message(&self) -> Option<&str>;
    fn visible_pixel_hash(&self) -> Option<&str>;
}

impl MetadataExt for Metadata {
    fn str_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    fn embedded_message(&self) -> Option<&str> {
        self.str_value(keys::EMBEDDED_MESSAGE)
            .or_else(|| self.str_value(keys::MESSAGE))
    }

    fn visible_pixel_hash(&self) -> Option<&str> {
        self.str_value(keys::VISIBLE_PIXEL_HASH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_round_trip() {
        let mut m = Metadata::new();
        m.insert("a".into(), MetaValue::Int(7));
        m.insert("b".into(), MetaValue::Str("hi".into()));
        m.insert("c".into(), MetaValue::Bool(true));
        m.insert("d".into(), MetaValue::Other(serde_json::json!({"k": [1, 2]})));

        let json = serde_json::to_string(&m).unwrap();
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_from_json_value_scalars() {
        assert_eq!(MetaValue::from(serde_json::json!(3)), MetaValue::Int(3));
        assert_eq!(
            MetaValue::from(serde_json::json!("x")),
            MetaValue::Str("x".into())
        );
        assert_eq!(
            MetaValue::from(serde_json::json!(true)),
            MetaValue::Bool(true)
        );
        assert!(matches!(
            MetaValue::from(serde_json::json!([1])),
            MetaValue::Other(_)
        ));
    }

    #[test]
    fn test_embedded_message_falls_back_to_message_key() {
        let mut m = Metadata::new();
        m.insert(keys::MESSAGE.into(), "wish text".into());
        assert_eq!(m.embedded_message(), Some("wish text"));

        m.insert(keys::EMBEDDED_MESSAGE.into(), "embedded".into());
        assert_eq!(m.embedded_message(), Some("embedded"));
    }

    #[test]
    fn test_scalar_string_excludes_structured() {
        assert_eq!(MetaValue::Int(5).to_scalar_string().unwrap(), "5");
        assert!(MetaValue::Other(serde_json::json!({}))
            .to_scalar_string()
            .is_none());
    }
}
