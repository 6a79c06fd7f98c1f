//! Purpose: Declare what the client core needs from the native transport.
//! Exports: `Cluster`, `NodeInfo`, `JobInfo`, `JobStatus`, `JobModule`, `IndexSpec`,
//! `IndexType`, `IndexDatatype`, `StreamRequest`, `BackgroundRequest`, `BackgroundAction`.
//! Role: Seam between completion tracking/streaming and connection, wire, and tending code.
//! Invariants: `info_all` fans one command out to every known node and reports per-node replies.
//! Invariants: `stream` pushes into the intake and honours its `false` return by stopping.
use super::config::QueryPolicy;
use super::query::{QuerySpec, UdfCall};
use super::record::Record;
use crate::core::cursor::PageRequest;
use crate::core::error::Error;
use crate::core::stream::StreamIntake;
use serde_json::Value;
use std::fmt;
use std::future::Future;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeInfo {
    pub node: String,
    /// Raw reply text, possibly prefixed with the echoed command and a tab.
    pub response: String,
}

impl NodeInfo {
    pub fn new(node: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            response: response.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobStatus {
    Undefined,
    InProgress,
    Completed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JobInfo {
    pub progress_pct: u32,
    pub records_read: u64,
    pub status: JobStatus,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum JobModule {
    Scan,
    Query,
}

impl JobModule {
    pub fn as_str(self) -> &'static str {
        match self {
            JobModule::Scan => "scan",
            JobModule::Query => "query",
        }
    }
}

impl fmt::Display for JobModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexType {
    Default,
    List,
    MapKeys,
    MapValues,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexDatatype {
    Numeric,
    String,
    Geo2dSphere,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexSpec {
    pub namespace: String,
    pub set: Option<String>,
    pub bin: String,
    pub index_name: String,
    pub index_type: IndexType,
    pub datatype: IndexDatatype,
}

impl IndexSpec {
    pub fn new(
        namespace: impl Into<String>,
        set: Option<&str>,
        bin: impl Into<String>,
        index_name: impl Into<String>,
        datatype: IndexDatatype,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.map(str::to_string),
            bin: bin.into(),
            index_name: index_name.into(),
            index_type: IndexType::Default,
            datatype,
        }
    }

    pub fn with_index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }
}

/// One foreground scan/query run, or one page of a paginated run.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    pub query: QuerySpec,
    pub policy: QueryPolicy,
    pub page: Option<PageRequest>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BackgroundAction {
    Udf(UdfCall),
    Operations(Vec<Value>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundRequest {
    pub query: QuerySpec,
    pub policy: QueryPolicy,
    pub job_id: u64,
    pub action: BackgroundAction,
}

pub trait Cluster: Send + Sync + 'static {
    fn info_all(&self, command: &str) -> impl Future<Output = Result<Vec<NodeInfo>, Error>> + Send;

    fn job_info(
        &self,
        job_id: u64,
        module: JobModule,
    ) -> impl Future<Output = Result<JobInfo, Error>> + Send;

    fn create_index(&self, spec: &IndexSpec) -> impl Future<Output = Result<(), Error>> + Send;

    fn remove_index(
        &self,
        namespace: &str,
        index_name: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn register_udf(
        &self,
        module: &str,
        content: &[u8],
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn remove_udf(&self, module: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn stream(
        &self,
        request: StreamRequest,
        intake: StreamIntake<Record>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Accepts the job and returns the id the cluster tracks it under.
    fn submit_background(
        &self,
        request: BackgroundRequest,
    ) -> impl Future<Output = Result<u64, Error>> + Send;
}
