//! Configuration loading, secret resolution, and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PosterError;

/// Top-level Posterflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_service: Option<JobServiceConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Connection settings for the external job queue.
///
/// Secrets and endpoints may be given directly or through an environment
/// variable; both are looked up again on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_endpoint: Option<String>,
    #[serde(default = "default_image_endpoint_env")]
    pub image_endpoint_env: String,

    /// Endpoint for text placement. Falls back to the image endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_endpoint: Option<String>,
    #[serde(default = "default_text_endpoint_env")]
    pub text_endpoint_env: String,

    /// Fixed wait between status checks (default: 2000ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of status checks before giving up (default: 60).
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Per-HTTP-request timeout (default: 30s).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            image_endpoint: None,
            image_endpoint_env: default_image_endpoint_env(),
            text_endpoint: None,
            text_endpoint_env: default_text_endpoint_env(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "RUNPOD_API_KEY".into()
}

fn default_image_endpoint_env() -> String {
    "RUNPOD_ENDPOINT_URL".into()
}

fn default_text_endpoint_env() -> String {
    "RUNPOD_TEXT_ENDPOINT_URL".into()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Job service settings with every secret and endpoint resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJobService {
    pub api_key: String,
    pub image_endpoint: String,
    pub text_endpoint: String,
}

impl JobServiceConfig {
    /// Resolve the API key and endpoints from direct values or the environment.
    ///
    /// Fails with every missing key named, before any network call is made.
    pub fn resolve(&self) -> crate::error::Result<ResolvedJobService> {
        let api_key = resolve_secret_field(&self.api_key, &Some(self.api_key_env.clone()));
        let image_endpoint =
            resolve_secret_field(&self.image_endpoint, &Some(self.image_endpoint_env.clone()));
        let text_endpoint =
            resolve_secret_field(&self.text_endpoint, &Some(self.text_endpoint_env.clone()));

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push(self.api_key_env.clone());
        }
        if image_endpoint.is_none() {
            missing.push(self.image_endpoint_env.clone());
        }

        match (api_key, image_endpoint) {
            (Some(api_key), Some(image_endpoint)) => Ok(ResolvedJobService {
                text_endpoint: text_endpoint.unwrap_or_else(|| image_endpoint.clone()),
                api_key,
                image_endpoint,
            }),
            _ => Err(PosterError::ConfigurationMissing(missing)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    18790
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Share of the viewport a placed image may occupy on each axis (default: 0.8).
    #[serde(default = "default_fit_ratio")]
    pub fit_ratio: f64,

    /// Bounded wait for fetching and decoding an image (default: 15s).
    #[serde(default = "default_image_load_timeout_secs")]
    pub image_load_timeout_secs: u64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            fit_ratio: default_fit_ratio(),
            image_load_timeout_secs: default_image_load_timeout_secs(),
        }
    }
}

impl CanvasConfig {
    pub fn image_load_timeout(&self) -> Duration {
        Duration::from_secs(self.image_load_timeout_secs)
    }
}

fn default_fit_ratio() -> f64 {
    0.8
}

fn default_image_load_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "posterflow_jobs=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.trim().is_empty() {
            return Some(val.trim().to_string());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config =
            json5::from_str(&substituted).map_err(|e| PosterError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Job service settings, defaults when the section is absent.
    pub fn job_service(&self) -> JobServiceConfig {
        self.job_service.clone().unwrap_or_default()
    }

    pub fn canvas(&self) -> CanvasConfig {
        self.canvas.clone().unwrap_or_default()
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway
            .as_ref()
            .map(|g| g.port)
            .unwrap_or_else(default_port)
    }

    /// Gateway bind address.
    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    /// Get a config value by dotted path (e.g. "gateway.port", "job_service.max_poll_attempts").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let jobs = self.job_service();
        if let Err(PosterError::ConfigurationMissing(keys)) = jobs.resolve() {
            warnings.push(format!(
                "Job service is not configured yet (missing: {})",
                keys.join(", ")
            ));
        }
        if jobs.poll_interval_ms == 0 {
            errors.push("job_service.poll_interval_ms cannot be 0".to_string());
        }
        if jobs.max_poll_attempts == 0 {
            errors.push("job_service.max_poll_attempts cannot be 0".to_string());
        }

        let canvas = self.canvas();
        if !(canvas.fit_ratio > 0.0 && canvas.fit_ratio <= 1.0) {
            errors.push(format!(
                "canvas.fit_ratio must be in (0, 1], got {}",
                canvas.fit_ratio
            ));
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
        }

        (warnings, errors)
    }

    /// Run [`Config::validate`] and fail on any error. Returns the warnings.
    pub fn ensure_valid(&self) -> crate::error::Result<Vec<String>> {
        let (warnings, errors) = self.validate();
        if !errors.is_empty() {
            return Err(PosterError::Config(errors.join("; ")));
        }
        Ok(warnings)
    }
}

/// Base directory for Posterflow data: `~/.posterflow/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".posterflow")
}
