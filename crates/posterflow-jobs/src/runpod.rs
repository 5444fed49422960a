//! HTTP client for a RunPod-style serverless job queue.
//!
//! Submission is `POST {endpoint}` with `{ "input": ... }`; status checks are
//! `GET {endpoint without /run}/status/{id}`. Both carry a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use posterflow_core::PosterError;
use posterflow_core::Result;
use posterflow_core::types::{JobHandle, JobStatus};

use crate::{JobService, StatusReport, Submission};

pub struct RunpodClient {
    api_key: String,
    client: reqwest::Client,
}

impl RunpodClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PosterError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, api_key))
    }

    /// Reuse an existing connection pool.
    pub fn with_client(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client,
        }
    }
}

/// Status URL for a job submitted to `endpoint`.
pub fn status_url(endpoint: &str, job_id: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    let base = base.strip_suffix("/run").unwrap_or(base);
    format!("{base}/status/{job_id}")
}

fn read_status(body: &Value) -> JobStatus {
    body.get("status")
        .and_then(Value::as_str)
        .map(JobStatus::from_wire)
        .unwrap_or_else(|| JobStatus::Unknown("<missing>".into()))
}

#[async_trait]
impl JobService for RunpodClient {
    async fn submit(&self, endpoint: &str, input: Value) -> Result<Submission> {
        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": input }))
            .send()
            .await
            .map_err(|e| PosterError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PosterError::UpstreamSubmissionFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = serde_json::from_str(&text).map_err(|_| {
            PosterError::UpstreamSubmissionFailed {
                status: status.as_u16(),
                body: text.clone(),
            }
        })?;

        let job_status = read_status(&payload);
        let job_id = payload
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Synchronous endpoints answer terminal right away and may omit the id.
        if job_id.is_empty() && !job_status.is_terminal() {
            return Err(PosterError::UpstreamSubmissionFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        info!(job_id, status = job_status.as_str(), "Job submitted");
        Ok(Submission {
            handle: JobHandle {
                status_endpoint: status_url(endpoint, &job_id),
                job_id,
            },
            status: job_status,
            payload,
        })
    }

    async fn status(&self, handle: &JobHandle) -> Result<StatusReport> {
        let resp = self
            .client
            .get(&handle.status_endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PosterError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PosterError::Transport(format!(
                "status check returned {status}: {body}"
            )));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| PosterError::Transport(e.to_string()))?;
        let job_status = read_status(&payload);
        debug!(job_id = %handle.job_id, status = job_status.as_str(), "Status checked");

        Ok(StatusReport {
            status: job_status,
            payload,
        })
    }
}
