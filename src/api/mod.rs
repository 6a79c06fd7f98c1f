//! Purpose: Define the stable public Rust API boundary for the client core.
//! Exports: Client, job handles, queries, streams, cursors, and the cluster seam.
//! Role: Public, additive-only surface; hides internal protocol modules.
//! Invariants: This module is the only public path to core types.

mod client;
mod cluster;
mod config;
mod job;
mod query;
mod record;

pub use crate::core::cursor::{Page, PageRequest, PageSource, PaginatedCursor, QueryState};
pub use crate::core::error::{Error, ErrorKind, status};
pub use crate::core::info::{InfoMap, parse_kv, parse_list, response_body};
pub use crate::core::poll::{
    CancelToken, DEFAULT_POLL_INTERVAL, PollOptions, StatusProbe, poll_until_done,
};
pub use crate::core::stream::{AbortHandle, Delivery, RecordStream, StreamEvent, StreamIntake};
pub use client::{
    ApiResult, Client, JobIdSource, MAX_SAFE_JOB_ID, RandomJobIds, SequentialJobIds,
};
pub use cluster::{
    BackgroundAction, BackgroundRequest, Cluster, IndexDatatype, IndexSpec, IndexType, JobInfo,
    JobModule, JobStatus, NodeInfo, StreamRequest,
};
pub use config::{ClientConfig, QueryPolicy};
pub use job::{Job, JobKind, UdfCommand};
pub use query::{PagedQuery, Query, QuerySpec, UdfCall};
pub use record::{Bins, Key, Record, RecordMeta};
