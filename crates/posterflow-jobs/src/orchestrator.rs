//! Generation request orchestration.
//!
//! Picks the generation mode, builds the mode-specific job input, submits it,
//! polls it to completion, and normalizes the result.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use posterflow_core::config::ResolvedJobService;
use posterflow_core::response::normalize;
use posterflow_core::types::{CanvasContext, GenerationMode, GenerationRequest, GenerationResult};
use posterflow_core::Result;

use crate::poller::{JobPoller, PollSettings};
use crate::JobService;

/// Prepended to every image prompt so the background stays free of lettering.
pub const NO_TEXT_TEMPLATE: &str = "Poster background artwork only. Do not render any text, letters, numbers, words, captions, logos or watermarks. Leave clean space for typography to be added later. Scene: ";

/// Canvas size token sent with image jobs.
pub const IMAGE_SIZE: &str = "1024*1024";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub image: String,
    pub text: String,
}

impl From<&ResolvedJobService> for Endpoints {
    fn from(resolved: &ResolvedJobService) -> Self {
        Self {
            image: resolved.image_endpoint.clone(),
            text: resolved.text_endpoint.clone(),
        }
    }
}

/// Uniform result of one orchestration call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub mode: GenerationMode,
    pub job_id: String,
    pub polls: u32,
    #[serde(flatten)]
    pub result: GenerationResult,
}

pub struct Orchestrator {
    service: Arc<dyn JobService>,
    endpoints: Endpoints,
    poll: PollSettings,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn JobService>, endpoints: Endpoints, poll: PollSettings) -> Self {
        Self {
            service,
            endpoints,
            poll,
        }
    }

    /// Validate, submit, poll, and normalize one generation request.
    pub async fn submit(
        &self,
        instruction: &str,
        canvas_context: Option<CanvasContext>,
    ) -> Result<Generation> {
        let request = GenerationRequest::new(instruction, canvas_context)?;
        let mode = request.mode();
        let endpoint = match mode {
            GenerationMode::ImageGeneration => &self.endpoints.image,
            GenerationMode::TextPlacement => &self.endpoints.text,
        };

        info!(mode = mode.as_str(), endpoint = %endpoint, "Submitting generation job");
        let submission = self.service.submit(endpoint, build_input(&request)).await?;

        let completed = JobPoller::new(self.service.as_ref(), self.poll)
            .run(submission)
            .await?;
        let result = normalize(&completed.payload);

        info!(
            job_id = %completed.job_id,
            mode = mode.as_str(),
            has_image = result.image_url.is_some(),
            elements = result.elements.len(),
            "Generation finished"
        );

        Ok(Generation {
            mode,
            job_id: completed.job_id,
            polls: completed.polls,
            result,
        })
    }
}

/// Job input for `request`'s mode.
pub fn build_input(request: &GenerationRequest) -> Value {
    match request.mode() {
        GenerationMode::ImageGeneration => json!({
            "prompt": format!("{NO_TEXT_TEMPLATE}{}", request.instruction()),
            "negative_prompt": "",
            "size": IMAGE_SIZE,
            "seed": -1,
            "enable_safety_checker": true,
        }),
        GenerationMode::TextPlacement => json!({
            "instruction": request.instruction(),
            "canvasContext": request.canvas_context(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;
    use posterflow_core::types::JobStatus;
    use posterflow_core::PosterError;

    fn endpoints() -> Endpoints {
        Endpoints {
            image: "https://api.example/v2/img/run".into(),
            text: "https://api.example/v2/txt/run".into(),
        }
    }

    fn orchestrator(service: Arc<ScriptedService>) -> Orchestrator {
        Orchestrator::new(service, endpoints(), PollSettings::default())
    }

    #[test]
    fn test_image_input_wraps_prompt() {
        let request = GenerationRequest::new("a neon skyline poster", None).unwrap();
        let input = build_input(&request);
        let prompt = input["prompt"].as_str().unwrap();
        assert!(prompt.starts_with(NO_TEXT_TEMPLATE));
        assert!(prompt.ends_with("a neon skyline poster"));
        assert_eq!(input["seed"], -1);
        assert_eq!(input["enable_safety_checker"], true);
        assert_eq!(input["negative_prompt"], "");
        assert_eq!(input["size"], IMAGE_SIZE);
    }

    #[test]
    fn test_text_input_forwards_context_verbatim() {
        let context: CanvasContext = serde_json::from_value(json!({
            "existingImageUrl": "https://cdn.example/bg.png",
            "existingElements": [{"type": "text", "content": "OLD"}],
            "viewport": {"w": 1000, "h": 800}
        }))
        .unwrap();
        let request = GenerationRequest::new("add a red title at the top", Some(context)).unwrap();
        let input = build_input(&request);
        assert_eq!(input["instruction"], "add a red title at the top");
        assert_eq!(
            input["canvasContext"],
            json!({
                "existingImageUrl": "https://cdn.example/bg.png",
                "existingElements": [{"type": "text", "content": "OLD"}],
                "viewport": {"w": 1000, "h": 800}
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_selects_endpoint() {
        let service = Arc::new(ScriptedService::new(JobStatus::Completed, vec![]));
        let orch = orchestrator(service.clone());

        let generation = orch.submit("a neon skyline poster", None).await.unwrap();
        assert_eq!(generation.mode, GenerationMode::ImageGeneration);
        assert_eq!(
            generation.result.image_url.as_deref(),
            Some("https://cdn.example/out.png")
        );

        let context = CanvasContext {
            existing_image_url: Some("https://cdn.example/bg.png".into()),
            ..Default::default()
        };
        let generation = orch.submit("add a title", Some(context)).await.unwrap();
        assert_eq!(generation.mode, GenerationMode::TextPlacement);

        let submitted = service.submitted.lock().unwrap();
        assert_eq!(submitted[0].0, "https://api.example/v2/img/run");
        assert_eq!(submitted[1].0, "https://api.example/v2/txt/run");
    }

    #[tokio::test]
    async fn test_blank_instruction_never_submits() {
        let service = Arc::new(ScriptedService::new(JobStatus::Completed, vec![]));
        let err = orchestrator(service.clone())
            .submit("   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PosterError::InvalidInput(_)));
        assert!(service.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_completion_is_not_an_error() {
        let service = Arc::new(
            ScriptedService::new(JobStatus::Completed, vec![])
                .with_completion(json!({"output": {"text": "I could not do that."}})),
        );
        let generation = orchestrator(service).submit("poster", None).await.unwrap();
        assert!(generation.result.is_empty());
        assert_eq!(
            generation.result.raw_text.as_deref(),
            Some("I could not do that.")
        );
    }

    #[test]
    fn test_generation_serializes_flat() {
        let generation = Generation {
            mode: GenerationMode::ImageGeneration,
            job_id: "j1".into(),
            polls: 3,
            result: GenerationResult {
                image_url: Some("https://cdn.example/a.png".into()),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&generation).unwrap();
        assert_eq!(value["mode"], "image_generation");
        assert_eq!(value["jobId"], "j1");
        assert_eq!(value["imageUrl"], "https://cdn.example/a.png");
        assert_eq!(value["elements"], json!([]));
    }
}
