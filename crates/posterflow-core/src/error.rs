use thiserror::Error;

#[derive(Debug, Error)]
pub enum PosterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job service configuration missing: {}", .0.join(", "))]
    ConfigurationMissing(Vec<String>),

    #[error("Job submission failed with status {status}: {body}")]
    UpstreamSubmissionFailed { status: u16, body: String },

    #[error("Job {job_id} failed")]
    JobFailed {
        job_id: String,
        payload: serde_json::Value,
    },

    #[error("Job {job_id} reported unknown status '{status}'")]
    UnknownJobStatus {
        job_id: String,
        status: String,
        payload: serde_json::Value,
    },

    #[error("Job {job_id} did not finish after {attempts} status checks")]
    JobTimeout { job_id: String, attempts: u32 },

    #[error("Image asset error: {0}")]
    AssetLoad(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PosterError>;

impl PosterError {
    /// HTTP status the ingress endpoint answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::UpstreamSubmissionFailed { .. }
            | Self::JobFailed { .. }
            | Self::UnknownJobStatus { .. }
            | Self::JobTimeout { .. }
            | Self::Transport(_) => 502,
            _ => 500,
        }
    }

    /// Terminal poll failures share one caller-visible category.
    pub fn is_poll_failure(&self) -> bool {
        matches!(
            self,
            Self::JobFailed { .. } | Self::UnknownJobStatus { .. } | Self::JobTimeout { .. }
        )
    }

    /// Short machine-readable category used in error envelopes and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::UpstreamSubmissionFailed { .. } => "upstream_submission_failed",
            Self::JobFailed { .. } | Self::UnknownJobStatus { .. } | Self::JobTimeout { .. } => {
                "upstream_job_failed"
            }
            Self::AssetLoad(_) => "asset_load",
            Self::Transport(_) => "transport",
            _ => "internal",
        }
    }

    /// Raw detail for the caller: upstream body or payload excerpt.
    pub fn details(&self) -> Option<String> {
        match self {
            Self::UpstreamSubmissionFailed { body, .. } => Some(excerpt(body)),
            Self::JobFailed { payload, .. } | Self::UnknownJobStatus { payload, .. } => {
                Some(excerpt(&payload.to_string()))
            }
            Self::JobTimeout { .. } | Self::InvalidInput(_) | Self::ConfigurationMissing(_) => None,
            other => Some(other.to_string()),
        }
    }
}

const DETAIL_LIMIT: usize = 2000;

fn excerpt(text: &str) -> String {
    if text.len() <= DETAIL_LIMIT {
        return text.to_string();
    }
    let mut end = DETAIL_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
