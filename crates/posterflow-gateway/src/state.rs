//! Gateway shared state.

use std::sync::Arc;
use std::time::Instant;

use posterflow_canvas::{HttpImageLoader, ImageLoader, Reconciler};
use posterflow_core::Result;
use posterflow_core::config::Config;
use posterflow_core::PosterError;
use posterflow_jobs::{Endpoints, Orchestrator, PollSettings, RunpodClient};

use crate::sessions::SessionManager;

/// Shared gateway state accessible from all handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub loader: Arc<dyn ImageLoader>,
    pub sessions: SessionManager,
    pub started_at: Instant,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let job_service = config.job_service();
        let http = reqwest::Client::builder()
            .timeout(job_service.request_timeout())
            .build()
            .map_err(|e| PosterError::Transport(e.to_string()))?;
        let canvas = config.canvas();
        let loader = Arc::new(HttpImageLoader::new(http.clone(), canvas.image_load_timeout()));

        Ok(Self {
            config,
            http,
            loader,
            sessions: SessionManager::new(),
            started_at: Instant::now(),
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    /// Build an orchestrator from the current configuration.
    ///
    /// Credentials and endpoints are resolved on every call, so a missing
    /// value fails here before any request goes out.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let job_service = self.config.job_service();
        let resolved = job_service.resolve()?;
        let client = RunpodClient::with_client(self.http.clone(), resolved.api_key.clone());
        Ok(Orchestrator::new(
            Arc::new(client),
            Endpoints::from(&resolved),
            PollSettings::from(&job_service),
        ))
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.loader.clone()).with_fit_ratio(self.config.canvas().fit_ratio)
    }
}
