//! Purpose: Client-wide defaults for polling, pagination, and per-request policy.
//! Exports: `ClientConfig`, `QueryPolicy`.
//! Role: Deserialized from JSON by embedders; every field is optional.
//! Invariants: A zero or missing poll interval resolves to the one-second default.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::poll::PollOptions;
use serde::{Deserialize, Serialize};

/// Settings re-sent with every request of a query, including every page.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPolicy {
    pub total_timeout_ms: u32,
    pub max_retries: u32,
    /// Expiry applied to records touched by a background write.
    pub ttl: Option<u32>,
    pub records_per_second: u32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub poll_interval_ms: u64,
    pub max_records_per_page: Option<u32>,
    pub query_policy: QueryPolicy,
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: ClientConfig = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid client config")
                .with_source(err)
        })?;
        if config.max_records_per_page == Some(0) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("max_records_per_page must be greater than zero"));
        }
        Ok(config)
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::from_interval_ms(self.poll_interval_ms)
    }
}
