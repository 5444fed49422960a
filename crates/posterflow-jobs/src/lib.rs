//! Job queue abstraction.
//!
//! A generation runs as an asynchronous job on an external queue. The
//! [`JobService`] trait covers the two calls the queue exposes (submit and
//! status); [`poller::JobPoller`] drives a submitted job to a terminal state
//! and [`orchestrator::Orchestrator`] ties request building, polling, and
//! response normalization together.

use async_trait::async_trait;

use posterflow_core::types::{JobHandle, JobStatus};
use posterflow_core::Result;

pub mod orchestrator;
pub mod poller;
pub mod runpod;

pub use orchestrator::{Endpoints, Generation, Orchestrator};
pub use poller::{CompletedJob, JobPoller, PollSettings};
pub use runpod::RunpodClient;

/// Accepted submission, possibly already terminal.
#[derive(Debug, Clone)]
pub struct Submission {
    pub handle: JobHandle,
    pub status: JobStatus,
    pub payload: serde_json::Value,
}

/// One status check.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: JobStatus,
    pub payload: serde_json::Value,
}

/// The external job queue.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit `input` to `endpoint`. A non-success response is
    /// `PosterError::UpstreamSubmissionFailed`.
    async fn submit(&self, endpoint: &str, input: serde_json::Value) -> Result<Submission>;

    /// Fetch the current status of a job. Errors here are retried by the poller.
    async fn status(&self, handle: &JobHandle) -> Result<StatusReport>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use posterflow_core::PosterError;
    use serde_json::{Value, json};

    use super::*;

    /// Job service that replays a fixed status script.
    pub struct ScriptedService {
        initial: JobStatus,
        script: Mutex<VecDeque<Result<JobStatus>>>,
        completion: Value,
        pub status_calls: AtomicU32,
        pub submitted: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedService {
        pub fn new(initial: JobStatus, script: Vec<Result<JobStatus>>) -> Self {
            Self {
                initial,
                script: Mutex::new(script.into()),
                completion: json!({"output": {"result": "https://cdn.example/out.png"}}),
                status_calls: AtomicU32::new(0),
                submitted: Mutex::new(Vec::new()),
            }
        }

        pub fn with_completion(mut self, completion: Value) -> Self {
            self.completion = completion;
            self
        }

        pub fn calls(&self) -> u32 {
            self.status_calls.load(Ordering::SeqCst)
        }

        fn payload_for(&self, status: &JobStatus) -> Value {
            match status {
                JobStatus::Completed => {
                    let mut payload = self.completion.clone();
                    if let Some(obj) = payload.as_object_mut() {
                        obj.insert("status".into(), json!("COMPLETED"));
                    }
                    payload
                }
                other => json!({"id": "job-1", "status": other.as_str()}),
            }
        }
    }

    #[async_trait]
    impl JobService for ScriptedService {
        async fn submit(&self, endpoint: &str, input: Value) -> Result<Submission> {
            self.submitted
                .lock()
                .unwrap()
                .push((endpoint.to_string(), input));
            Ok(Submission {
                handle: JobHandle {
                    job_id: "job-1".into(),
                    status_endpoint: "https://api.example/v2/ep/status/job-1".into(),
                },
                status: self.initial.clone(),
                payload: self.payload_for(&self.initial),
            })
        }

        async fn status(&self, _handle: &JobHandle) -> Result<StatusReport> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(JobStatus::Queued));
            let status = next?;
            Ok(StatusReport {
                payload: self.payload_for(&status),
                status,
            })
        }
    }

    pub fn transport_error() -> Result<JobStatus> {
        Err(PosterError::Transport("connection reset".into()))
    }
}
