//! Purpose: Define the caller-facing client over a native cluster transport.
//! Exports: `Client`, `JobIdSource`, `RandomJobIds`, `SequentialJobIds`, `ApiResult`, `MAX_SAFE_JOB_ID`.
//! Role: Starts cluster-side work and hands back job handles, queries, and scans.
//! Invariants: Every job-producing call returns only after the cluster accepted the request.
//! Invariants: Generated job ids are uniform over `[0, MAX_SAFE_JOB_ID]`.
#![allow(clippy::result_large_err)]

use super::cluster::{Cluster, IndexSpec, JobModule};
use super::config::ClientConfig;
use super::job::{Job, JobKind, UdfCommand};
use super::query::Query;
use crate::core::error::{Error, ErrorKind};
use getrandom::fill as fill_random;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub type ApiResult<T> = Result<T, Error>;

/// Largest id every binding can represent exactly (2^53 - 1).
pub const MAX_SAFE_JOB_ID: u64 = (1 << 53) - 1;

pub trait JobIdSource: Send + Sync {
    fn next_job_id(&self) -> ApiResult<u64>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RandomJobIds;

impl JobIdSource for RandomJobIds {
    fn next_job_id(&self) -> ApiResult<u64> {
        let mut bytes = [0u8; 8];
        fill_random(&mut bytes).map_err(|err| {
            Error::new(ErrorKind::Internal).with_message(format!("failed to draw a job id: {err}"))
        })?;
        Ok(u64::from_le_bytes(bytes) & MAX_SAFE_JOB_ID)
    }
}

/// Deterministic ids, for tests and replay.
#[derive(Debug)]
pub struct SequentialJobIds {
    next: AtomicU64,
}

impl SequentialJobIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl JobIdSource for SequentialJobIds {
    fn next_job_id(&self) -> ApiResult<u64> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct Client<C: Cluster> {
    cluster: Arc<C>,
    config: ClientConfig,
    job_ids: Arc<dyn JobIdSource>,
}

impl<C: Cluster> Client<C> {
    pub fn new(cluster: C) -> Self {
        Self {
            cluster: Arc::new(cluster),
            config: ClientConfig::default(),
            job_ids: Arc::new(RandomJobIds),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_job_ids(mut self, source: impl JobIdSource + 'static) -> Self {
        self.job_ids = Arc::new(source);
        self
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn create_index(&self, spec: IndexSpec) -> ApiResult<Job<C>> {
        ensure_name("index name", &spec.index_name)?;
        ensure_name("namespace", &spec.namespace)?;
        self.cluster.create_index(&spec).await?;
        debug!(namespace = %spec.namespace, index = %spec.index_name, "index creation accepted");
        Ok(self.job_handle(JobKind::Index {
            namespace: spec.namespace,
            index_name: spec.index_name,
        }))
    }

    pub async fn remove_index(&self, namespace: &str, index_name: &str) -> ApiResult<()> {
        ensure_name("index name", index_name)?;
        self.cluster.remove_index(namespace, index_name).await
    }

    /// `module` is the file name nodes list the module under, e.g. `agg.lua`.
    pub async fn udf_register(&self, module: &str, content: &[u8]) -> ApiResult<Job<C>> {
        ensure_name("udf module", module)?;
        self.cluster.register_udf(module, content).await?;
        Ok(self.job_handle(JobKind::Udf {
            module: module.to_string(),
            command: UdfCommand::Register,
        }))
    }

    pub async fn udf_remove(&self, module: &str) -> ApiResult<Job<C>> {
        ensure_name("udf module", module)?;
        self.cluster.remove_udf(module).await?;
        Ok(self.job_handle(JobKind::Udf {
            module: module.to_string(),
            command: UdfCommand::Unregister,
        }))
    }

    /// Re-attach to a background job started elsewhere.
    pub fn job(&self, job_id: u64, module: JobModule) -> Job<C> {
        self.job_handle(JobKind::Background { job_id, module })
    }

    pub fn query(&self, namespace: &str, set: Option<&str>) -> Query<C> {
        self.new_query(JobModule::Query, namespace, set)
    }

    pub fn scan(&self, namespace: &str, set: Option<&str>) -> Query<C> {
        self.new_query(JobModule::Scan, namespace, set)
    }

    fn new_query(&self, module: JobModule, namespace: &str, set: Option<&str>) -> Query<C> {
        let query = Query::new(
            Arc::clone(&self.cluster),
            Arc::clone(&self.job_ids),
            self.config.poll_options(),
            module,
            namespace,
            set,
        )
        .with_policy(self.config.query_policy.clone());
        match self.config.max_records_per_page {
            Some(max_records) => query.max_records(max_records),
            None => query,
        }
    }

    fn job_handle(&self, kind: JobKind) -> Job<C> {
        Job::new(Arc::clone(&self.cluster), kind, self.config.poll_options())
    }
}

fn ensure_name(what: &str, name: &str) -> ApiResult<()> {
    if name.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{what} must not be empty")));
    }
    Ok(())
}
