//! Purpose: Value types delivered through scan/query streams.
//! Exports: `Key`, `RecordMeta`, `Record`, `Bins`.
//! Role: Plain data; encoding and decoding belong to the transport.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Bins = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub namespace: String,
    pub set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Vec<u8>>,
}

impl Key {
    pub fn new(namespace: impl Into<String>, set: Option<&str>, user_key: impl Into<Value>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.map(str::to_string),
            user_key: Some(user_key.into()),
            digest: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub generation: u32,
    /// Seconds until expiry; `None` means the record never expires.
    pub ttl: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Option<Key>,
    #[serde(default)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub bins: Bins,
}

impl Record {
    pub fn new(key: Option<Key>, bins: Bins) -> Self {
        Self {
            key,
            meta: RecordMeta::default(),
            bins,
        }
    }

    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }
}
