//! Purpose: Describe scans/queries and run them as streams, pages, or background jobs.
//! Exports: `Query`, `QuerySpec`, `UdfCall`, `PagedQuery`.
//! Role: Builder over the cluster's streaming and background-job primitives.
//! Invariants: Pagination and stream-UDF aggregation are rejected together before any request.
//! Invariants: The query policy is re-sent unchanged with every page request.
//! Invariants: Foreground streams need a Tokio runtime; the producer runs on a spawned task.
#![allow(clippy::result_large_err)]

use super::client::JobIdSource;
use super::cluster::{BackgroundAction, BackgroundRequest, Cluster, JobModule, StreamRequest};
use super::config::QueryPolicy;
use super::job::{Job, JobKind};
use super::record::Record;
use crate::core::cursor::{Page, PageRequest, PageSource, PaginatedCursor, QueryState};
use crate::core::error::{Error, ErrorKind};
use crate::core::poll::PollOptions;
use crate::core::stream::{RecordStream, StreamIntake};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct UdfCall {
    pub module: String,
    pub function: String,
    pub args: Vec<Value>,
}

impl UdfCall {
    pub fn new(module: impl Into<String>, function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            args,
        }
    }
}

/// Everything the transport needs to know about what to read.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    pub module: JobModule,
    pub namespace: String,
    pub set: Option<String>,
    pub bins: Vec<String>,
    /// Stream UDF applied to the result set (aggregation).
    pub udf: Option<UdfCall>,
}

impl QuerySpec {
    fn scope(&self) -> String {
        format!(
            "{}:{}:{}",
            self.module,
            self.namespace,
            self.set.as_deref().unwrap_or("")
        )
    }
}

pub struct Query<C: Cluster> {
    cluster: Arc<C>,
    job_ids: Arc<dyn JobIdSource>,
    poll: PollOptions,
    spec: QuerySpec,
    policy: QueryPolicy,
    paginate: bool,
    max_records: Option<u32>,
    job_id: Option<u64>,
    state: Option<QueryState>,
    cursor: Option<PaginatedCursor<PagedQuery<C>>>,
}

impl<C: Cluster> Query<C> {
    pub(crate) fn new(
        cluster: Arc<C>,
        job_ids: Arc<dyn JobIdSource>,
        poll: PollOptions,
        module: JobModule,
        namespace: &str,
        set: Option<&str>,
    ) -> Self {
        Self {
            cluster,
            job_ids,
            poll,
            spec: QuerySpec {
                module,
                namespace: namespace.to_string(),
                set: set.map(str::to_string),
                bins: Vec::new(),
                udf: None,
            },
            policy: QueryPolicy::default(),
            paginate: false,
            max_records: None,
            job_id: None,
            state: None,
            cursor: None,
        }
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn select<I, S>(mut self, bins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.bins = bins.into_iter().map(Into::into).collect();
        self
    }

    /// Aggregate results through a stream UDF.
    pub fn apply(mut self, udf: UdfCall) -> Self {
        self.spec.udf = Some(udf);
        self
    }

    pub fn with_policy(mut self, policy: QueryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn paginate(mut self, paginate: bool) -> Self {
        self.paginate = paginate;
        self
    }

    pub fn max_records(mut self, max_records: u32) -> Self {
        self.max_records = Some(max_records);
        self
    }

    /// Fixed id for the next background job instead of a generated one.
    pub fn job_id(mut self, job_id: u64) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Resume a paginated query from a previously saved state.
    pub fn query_state(mut self, state: QueryState) -> Self {
        self.state = Some(state);
        self
    }

    /// State to save for resuming after the most recent page, if more remain.
    pub fn saved_state(&self) -> Option<&QueryState> {
        match &self.cursor {
            Some(cursor) => cursor.query_state(),
            None => self.state.as_ref(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.paginate && self.spec.udf.is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("stream UDF aggregation cannot be combined with pagination")
                .with_hint("drop apply() or disable paginate()"));
        }
        if self.paginate && self.max_records.unwrap_or(0) == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("paginated queries need max_records greater than zero"));
        }
        Ok(())
    }

    /// Stream every matching record. Must be called from within a Tokio runtime.
    pub fn foreach(&self) -> Result<RecordStream<Record>, Error> {
        self.validate()?;
        if self.paginate {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("paginated queries are read page by page")
                .with_hint("use next_page(), results() or cursor()"));
        }
        let request = StreamRequest {
            query: self.spec.clone(),
            policy: self.policy.clone(),
            page: self.max_records.map(|max_records| PageRequest {
                max_records,
                bookmark: None,
            }),
        };
        let (stream, intake) = RecordStream::channel();
        let cluster = Arc::clone(&self.cluster);
        debug!(scope = %self.spec.scope(), "starting record stream");
        tokio::spawn(async move {
            let fallback = intake.clone();
            if let Err(err) = cluster.stream(request, intake).await {
                fallback.error(err);
                fallback.end();
            }
        });
        Ok(stream)
    }

    /// All records, or the next page when the query is paginated.
    pub async fn results(&mut self) -> Result<Vec<Record>, Error> {
        if self.paginate {
            return Ok(self.next_page().await?.items);
        }
        self.foreach()?.collect_records().await
    }

    pub async fn next_page(&mut self) -> Result<Page<Record>, Error> {
        let cursor = match self.cursor.take() {
            Some(cursor) => cursor,
            None => self.cursor()?,
        };
        self.cursor.insert(cursor).next_page().await
    }

    pub fn has_next_page(&self) -> bool {
        match &self.cursor {
            Some(cursor) => cursor.has_next_page(),
            None => self.paginate,
        }
    }

    /// A standalone cursor over this query, starting at the saved state if one was given.
    pub fn cursor(&self) -> Result<PaginatedCursor<PagedQuery<C>>, Error> {
        if self.spec.udf.is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("stream UDF aggregation cannot be combined with pagination"));
        }
        let max_records = self.max_records.unwrap_or(0);
        let source = PagedQuery {
            cluster: Arc::clone(&self.cluster),
            scope: self.spec.scope(),
            spec: self.spec.clone(),
            policy: self.policy.clone(),
        };
        let cursor = PaginatedCursor::new(source, max_records)?;
        match &self.state {
            Some(state) => cursor.with_state(state.clone()),
            None => Ok(cursor),
        }
    }

    /// Run a record UDF against every match on the server.
    pub async fn background(&self, udf: UdfCall) -> Result<Job<C>, Error> {
        self.submit(BackgroundAction::Udf(udf)).await
    }

    /// Apply write operations to every match on the server.
    pub async fn operate(&self, operations: Vec<Value>) -> Result<Job<C>, Error> {
        self.submit(BackgroundAction::Operations(operations)).await
    }

    async fn submit(&self, action: BackgroundAction) -> Result<Job<C>, Error> {
        if self.spec.udf.is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("background jobs cannot also aggregate with a stream UDF"));
        }
        let job_id = match self.job_id {
            Some(job_id) => job_id,
            None => self.job_ids.next_job_id()?,
        };
        let request = BackgroundRequest {
            query: self.spec.clone(),
            policy: self.policy.clone(),
            job_id,
            action,
        };
        let accepted = self.cluster.submit_background(request).await?;
        debug!(job_id = accepted, module = %self.spec.module, "background job accepted");
        Ok(Job::new(
            Arc::clone(&self.cluster),
            JobKind::Background {
                job_id: accepted,
                module: self.spec.module,
            },
            self.poll.clone(),
        ))
    }
}

/// One query bound to a cluster, fetched a page at a time.
pub struct PagedQuery<C: Cluster> {
    cluster: Arc<C>,
    scope: String,
    spec: QuerySpec,
    policy: QueryPolicy,
}

impl<C: Cluster> PageSource for PagedQuery<C> {
    type Item = Record;

    fn scope(&self) -> &str {
        &self.scope
    }

    async fn fetch_page(
        &self,
        request: PageRequest,
        intake: StreamIntake<Record>,
    ) -> Result<(), Error> {
        let request = StreamRequest {
            query: self.spec.clone(),
            policy: self.policy.clone(),
            page: Some(request),
        };
        self.cluster.stream(request, intake).await
    }
}
