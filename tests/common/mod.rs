//! Purpose: In-memory cluster used by the integration tests.
//! Exports: `MemoryCluster`, `Reply`, `records`, `init_tracing`.
//! Role: Scripted info replies and job states, seeded records, and request recording.
//! Invariants: Scripted replies are consumed in order; the last one repeats.
//! Invariants: Page bookmarks are decimal record offsets; tests never build them by hand.
#![allow(dead_code)]

use bytes::Bytes;
use serde_json::{Map, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tessera::api::{
    BackgroundRequest, Cluster, Error, IndexSpec, JobInfo, JobModule, JobStatus, Key, NodeInfo,
    Record, StreamIntake, StreamRequest, status,
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|n| {
            let mut bins = Map::new();
            bins.insert("n".to_string(), json!(n));
            Record::new(Some(Key::new("test", Some("demo"), n as u64)), bins)
        })
        .collect()
}

#[derive(Clone, Debug)]
pub enum Reply {
    /// `(node, raw reply)` per node.
    Nodes(Vec<(&'static str, &'static str)>),
    Fail(i32),
}

impl Reply {
    fn into_result(self) -> Result<Vec<NodeInfo>, Error> {
        match self {
            Reply::Nodes(nodes) => Ok(nodes
                .into_iter()
                .map(|(node, response)| NodeInfo::new(node, response))
                .collect()),
            Reply::Fail(code) => Err(Error::server(code).with_message("info fan-out failed")),
        }
    }
}

#[derive(Default)]
pub struct MemoryCluster {
    records: Vec<Record>,
    info_script: Mutex<HashMap<String, VecDeque<Reply>>>,
    job_script: Mutex<VecDeque<JobStatus>>,
    stream_fault: Option<(usize, i32)>,
    dispatch_fault: Option<i32>,
    pub info_calls: AtomicUsize,
    pub job_info_calls: AtomicUsize,
    pub delivered: AtomicUsize,
    pub stream_requests: Mutex<Vec<StreamRequest>>,
    pub background_requests: Mutex<Vec<BackgroundRequest>>,
    pub created_indexes: Mutex<Vec<IndexSpec>>,
    pub registered_udfs: Mutex<Vec<String>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    pub fn script_info(self, command: &str, replies: Vec<Reply>) -> Self {
        self.info_script
            .lock()
            .expect("script")
            .insert(command.to_string(), replies.into());
        self
    }

    pub fn script_jobs(self, statuses: Vec<JobStatus>) -> Self {
        *self.job_script.lock().expect("jobs") = statuses.into();
        self
    }

    /// Report `code` on the stream just before delivering record `offset`.
    pub fn fail_stream_at(mut self, offset: usize, code: i32) -> Self {
        self.stream_fault = Some((offset, code));
        self
    }

    pub fn fail_dispatch(mut self, code: i32) -> Self {
        self.dispatch_fault = Some(code);
        self
    }

    pub fn stream_requests(&self) -> Vec<StreamRequest> {
        self.stream_requests.lock().expect("requests").clone()
    }

    fn next_reply(&self, command: &str) -> Reply {
        let mut script = self.info_script.lock().expect("script");
        let queue = script
            .get_mut(command)
            .unwrap_or_else(|| panic!("no scripted reply for {command}"));
        if queue.len() > 1 {
            queue.pop_front().expect("reply")
        } else {
            queue.front().cloned().expect("reply")
        }
    }
}

fn decode_offset(bookmark: &Bytes) -> usize {
    std::str::from_utf8(bookmark)
        .expect("utf8 bookmark")
        .parse()
        .expect("numeric bookmark")
}

impl Cluster for MemoryCluster {
    async fn info_all(&self, command: &str) -> Result<Vec<NodeInfo>, Error> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.next_reply(command).into_result()
    }

    async fn job_info(&self, _job_id: u64, _module: JobModule) -> Result<JobInfo, Error> {
        let calls = self.job_info_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let status = {
            let mut script = self.job_script.lock().expect("jobs");
            if script.len() > 1 {
                script.pop_front().expect("status")
            } else {
                script.front().copied().unwrap_or(JobStatus::Undefined)
            }
        };
        let progress_pct = if status == JobStatus::Completed {
            100
        } else {
            (calls as u32 * 10).min(99)
        };
        Ok(JobInfo {
            progress_pct,
            records_read: self.records.len() as u64,
            status,
        })
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), Error> {
        self.created_indexes.lock().expect("indexes").push(spec.clone());
        Ok(())
    }

    async fn remove_index(&self, _namespace: &str, _index_name: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn register_udf(&self, module: &str, _content: &[u8]) -> Result<(), Error> {
        self.registered_udfs
            .lock()
            .expect("udfs")
            .push(module.to_string());
        Ok(())
    }

    async fn remove_udf(&self, module: &str) -> Result<(), Error> {
        self.registered_udfs
            .lock()
            .expect("udfs")
            .retain(|name| name != module);
        Ok(())
    }

    async fn stream(
        &self,
        request: StreamRequest,
        intake: StreamIntake<Record>,
    ) -> Result<(), Error> {
        self.stream_requests
            .lock()
            .expect("requests")
            .push(request.clone());
        if let Some(code) = self.dispatch_fault {
            return Err(Error::server(code).with_message("could not reach any node"));
        }

        let page = request.page.as_ref();
        let start = page
            .and_then(|page| page.bookmark.as_ref())
            .map(decode_offset)
            .unwrap_or(0);
        let limit = page.map_or(usize::MAX, |page| page.max_records as usize);
        let end = start.saturating_add(limit).min(self.records.len());

        for (offset, record) in (start..end).zip(&self.records[start..end]) {
            if let Some((fault_at, code)) = self.stream_fault {
                if offset == fault_at {
                    intake.error(Error::server(code).with_message("record read failed"));
                }
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            if !intake.item(record.clone()) {
                return Ok(());
            }
            tokio::task::yield_now().await;
        }

        if page.is_some() {
            intake.end_with_bookmark(Bytes::from(end.to_string()));
        } else {
            intake.error(Error::server(status::NO_MORE_RECORDS));
        }
        Ok(())
    }

    async fn submit_background(&self, request: BackgroundRequest) -> Result<u64, Error> {
        let job_id = request.job_id;
        self.background_requests
            .lock()
            .expect("background")
            .push(request);
        Ok(job_id)
    }
}
