//! Fixed-interval job polling.
//!
//! A job moves from submitted through queued/running to one terminal outcome:
//! completed, failed, unknown status, or timed out after `max_attempts`
//! status checks. While it is queued or running the poller waits a fixed
//! interval before each check. A submission that is already terminal is
//! never polled.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use posterflow_core::types::JobStatus;
use posterflow_core::{PosterError, Result};

use crate::{JobService, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

impl From<&posterflow_core::config::JobServiceConfig> for PollSettings {
    fn from(config: &posterflow_core::config::JobServiceConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// A job that reached `COMPLETED`.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub job_id: String,
    /// Status response exactly as the queue returned it.
    pub payload: Value,
    /// Number of status checks performed (equals the number of waits).
    pub polls: u32,
}

pub struct JobPoller<'a> {
    service: &'a dyn JobService,
    settings: PollSettings,
}

impl<'a> JobPoller<'a> {
    pub fn new(service: &'a dyn JobService, settings: PollSettings) -> Self {
        Self { service, settings }
    }

    /// Drive `submission` to a terminal state.
    pub async fn run(&self, submission: Submission) -> Result<CompletedJob> {
        let Submission {
            handle,
            mut status,
            mut payload,
        } = submission;
        let mut polls = 0u32;

        loop {
            match status {
                JobStatus::Completed => {
                    info!(job_id = %handle.job_id, polls, "Job completed");
                    return Ok(CompletedJob {
                        job_id: handle.job_id,
                        payload,
                        polls,
                    });
                }
                JobStatus::Failed => {
                    warn!(job_id = %handle.job_id, polls, "Job failed");
                    return Err(PosterError::JobFailed {
                        job_id: handle.job_id,
                        payload,
                    });
                }
                JobStatus::Unknown(raw) => {
                    warn!(job_id = %handle.job_id, status = %raw, "Job reported unknown status");
                    return Err(PosterError::UnknownJobStatus {
                        job_id: handle.job_id,
                        status: raw,
                        payload,
                    });
                }
                JobStatus::Queued | JobStatus::Running => {
                    if polls >= self.settings.max_attempts {
                        warn!(job_id = %handle.job_id, attempts = polls, "Job polling timed out");
                        return Err(PosterError::JobTimeout {
                            job_id: handle.job_id,
                            attempts: polls,
                        });
                    }

                    tokio::time::sleep(self.settings.interval).await;
                    polls += 1;

                    match self.service.status(&handle).await {
                        Ok(report) => {
                            if report.status != status {
                                debug!(
                                    job_id = %handle.job_id,
                                    attempt = polls,
                                    from = status.as_str(),
                                    to = report.status.as_str(),
                                    "Job status changed"
                                );
                            }
                            status = report.status;
                            payload = report.payload;
                        }
                        Err(e) => {
                            warn!(job_id = %handle.job_id, attempt = polls, %e, "Status check failed, will retry");
                        }
                    }
                }
            }
        }
    }
}
