//! Purpose: Handles for server-side jobs that outlive the request that started them.
//! Exports: `Job`, `JobKind`, `UdfCommand`.
//! Role: Each job kind supplies a completion predicate; waiting is shared via `poll_until_done`.
//! Invariants: An index missing from a node counts as 0% loaded, never as an error.
//! Invariants: A job is done only when every reporting node agrees.
//! Invariants: Handles are immutable after creation; dropping one abandons its wait.
#![allow(clippy::result_large_err)]

use super::cluster::{Cluster, JobInfo, JobModule, JobStatus, NodeInfo};
use crate::core::error::{Error, ErrorKind};
use crate::core::info;
use crate::core::poll::{PollOptions, StatusProbe, poll_until_done};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UdfCommand {
    Register,
    Unregister,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JobKind {
    Index {
        namespace: String,
        index_name: String,
    },
    Udf {
        module: String,
        command: UdfCommand,
    },
    Background {
        job_id: u64,
        module: JobModule,
    },
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Index {
                namespace,
                index_name,
            } => write!(f, "index build {namespace}/{index_name}"),
            JobKind::Udf { module, command } => match command {
                UdfCommand::Register => write!(f, "udf register {module}"),
                UdfCommand::Unregister => write!(f, "udf unregister {module}"),
            },
            JobKind::Background { job_id, module } => write!(f, "{module} job {job_id}"),
        }
    }
}

pub struct Job<C: Cluster> {
    cluster: Arc<C>,
    kind: JobKind,
    poll: PollOptions,
}

impl<C: Cluster> Job<C> {
    pub(crate) fn new(cluster: Arc<C>, kind: JobKind, poll: PollOptions) -> Self {
        Self {
            cluster,
            kind,
            poll,
        }
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    pub fn job_id(&self) -> Option<u64> {
        match self.kind {
            JobKind::Background { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// One status check; `Ok(true)` once the job is complete cluster-wide.
    pub async fn check_status(&self) -> Result<bool, Error> {
        match &self.kind {
            JobKind::Index {
                namespace,
                index_name,
            } => index_loaded(self.cluster.as_ref(), namespace, index_name).await,
            JobKind::Udf { module, command } => {
                udf_settled(self.cluster.as_ref(), module, *command).await
            }
            JobKind::Background { job_id, module } => {
                let info = self.cluster.job_info(*job_id, *module).await?;
                Ok(info.status == JobStatus::Completed)
            }
        }
    }

    /// Wait using the interval configured on the client.
    pub async fn wait(&self) -> Result<(), Error> {
        self.wait_with(&self.poll).await
    }

    pub async fn wait_with(&self, options: &PollOptions) -> Result<(), Error> {
        debug!(job = %self.kind, "waiting for job");
        poll_until_done(self, options).await
    }

    /// Caller-side deadline around `wait_with`; the poll loop itself never times out.
    pub async fn wait_timeout(&self, options: &PollOptions, deadline: Duration) -> Result<(), Error> {
        match tokio::time::timeout(deadline, self.wait_with(options)).await {
            Ok(result) => result,
            Err(_) => Err(Error::new(ErrorKind::Timeout)
                .with_message(format!("{} did not finish in time", self.kind))
                .with_hint(format!("deadline was {} ms", deadline.as_millis()))),
        }
    }

    /// Progress of a background scan/query job.
    pub async fn info(&self) -> Result<JobInfo, Error> {
        match self.kind {
            JobKind::Background { job_id, module } => self.cluster.job_info(job_id, module).await,
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("{} has no job info", self.kind))),
        }
    }
}

impl<C: Cluster> StatusProbe for Job<C> {
    fn check(&self) -> impl Future<Output = Result<bool, Error>> + Send {
        self.check_status()
    }
}

async fn index_loaded<C: Cluster>(
    cluster: &C,
    namespace: &str,
    index_name: &str,
) -> Result<bool, Error> {
    let command = format!("sindex/{namespace}/{index_name}");
    let replies = match cluster.info_all(&command).await {
        Ok(replies) => replies,
        Err(err) if err.is_index_not_found() => {
            trace!(namespace, index_name, "index not yet visible to the cluster");
            return Ok(false);
        }
        Err(err) => return Err(err),
    };
    let loads = replies
        .iter()
        .map(node_load_pct)
        .collect::<Result<Vec<_>, _>>()?;
    trace!(namespace, index_name, ?loads, "index load per node");
    Ok(all_loaded(&loads))
}

fn node_load_pct(reply: &NodeInfo) -> Result<u32, Error> {
    match info::parse_kv(&reply.response) {
        Ok(stats) => match stats.get("load_pct") {
            Some(value) => value.parse::<u32>().map_err(|_| {
                Error::new(ErrorKind::Internal)
                    .with_message(format!("unparsable load_pct '{value}'"))
                    .with_node(reply.node.clone())
            }),
            None => Ok(0),
        },
        // The index may not have reached this node's info table yet.
        Err(err) if err.is_index_not_found() => Ok(0),
        Err(err) => Err(err.with_node(reply.node.clone())),
    }
}

fn all_loaded(loads: &[u32]) -> bool {
    !loads.is_empty() && loads.iter().all(|&pct| pct == 100)
}

async fn udf_settled<C: Cluster>(
    cluster: &C,
    module: &str,
    command: UdfCommand,
) -> Result<bool, Error> {
    let expected = command == UdfCommand::Register;
    let replies = cluster.info_all("udf-list").await?;
    for reply in &replies {
        if udf_listed(reply, module)? != expected {
            return Ok(false);
        }
    }
    Ok(true)
}

fn udf_listed(reply: &NodeInfo, module: &str) -> Result<bool, Error> {
    let entries =
        info::parse_list(&reply.response).map_err(|err| err.with_node(reply.node.clone()))?;
    Ok(entries
        .iter()
        .any(|entry| entry.get("filename").is_some_and(|name| name == module)))
}
