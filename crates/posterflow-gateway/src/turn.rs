//! One chat turn against a poster session: generate, then apply to the
//! session's surface, then record the outcome in the session state.

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use posterflow_canvas::{ApplicationOutcome, MemorySurface, Reconciler, SurfaceEvent};
use posterflow_core::types::{ChatMessage, GenerationMode, INVALID_INSTRUCTION, Role};
use posterflow_core::{PosterError, Result};
use posterflow_jobs::Orchestrator;

use crate::error::user_message;
use crate::sessions::TurnGuard;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReport {
    pub mode: GenerationMode,
    pub job_id: String,
    pub polls: u32,
    pub outcome: ApplicationOutcome,
    /// Surface mutations made by this turn, in order.
    pub events: Vec<SurfaceEvent>,
    pub reply: ChatMessage,
}

/// Run one turn. The surface's current image and elements become the
/// request's canvas context, so a poster that already has a background gets
/// text placed on it instead of a new image.
pub async fn run_turn(
    guard: TurnGuard<'_>,
    orchestrator: &Orchestrator,
    reconciler: &Reconciler,
    surface: &Mutex<MemorySurface>,
    instruction: &str,
) -> Result<TurnReport> {
    if instruction.trim().is_empty() {
        return Err(PosterError::InvalidInput(INVALID_INSTRUCTION.into()));
    }
    let session = guard.session();
    session.set_instruction(instruction);
    session.add_message(Role::User, instruction, false);

    let context = surface.lock().await.canvas_context();
    let applied = async {
        let generation = orchestrator.submit(instruction, Some(context)).await?;
        let mut surface = surface.lock().await;
        let outcome = reconciler.apply(&mut *surface, &generation.result).await?;
        let events = surface.drain_events();
        Ok::<_, PosterError>((generation, outcome, events))
    }
    .await;

    match applied {
        Ok((generation, outcome, events)) => {
            if let Some(url) = &generation.result.image_url {
                session.set_background(url.clone(), instruction);
            }
            let element_count = match &outcome {
                ApplicationOutcome::Applied { elements, .. } => {
                    session.mark_changed();
                    elements.len()
                }
                ApplicationOutcome::Empty { .. } => 0,
            };
            let reply = session.add_message(
                Role::Assistant,
                outcome.summary(),
                outcome.is_notable(),
            );
            session.set_last_result(instruction, element_count);
            guard.disarm();

            info!(
                session_id = %session.session_id,
                job_id = %generation.job_id,
                elements = element_count,
                "Turn finished"
            );
            Ok(TurnReport {
                mode: generation.mode,
                job_id: generation.job_id,
                polls: generation.polls,
                outcome,
                events,
                reply,
            })
        }
        Err(err) => {
            let message = user_message(&err);
            session.add_message(Role::Assistant, message.clone(), true);
            session.set_error(message);
            guard.disarm();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use posterflow_canvas::{ImageLoader, LoadedImage, Viewport};
    use posterflow_core::session::PosterSession;
    use posterflow_core::types::{JobHandle, JobStatus};
    use posterflow_jobs::{Endpoints, JobService, PollSettings, StatusReport, Submission};
    use serde_json::{Value, json};

    /// Completes every job immediately with a fixed payload.
    struct InstantService {
        completion: Value,
        submitted: std::sync::Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl JobService for InstantService {
        async fn submit(&self, _endpoint: &str, input: Value) -> Result<Submission> {
            self.submitted.lock().unwrap().push(input);
            Ok(Submission {
                handle: JobHandle {
                    job_id: "job-1".into(),
                    status_endpoint: String::new(),
                },
                status: JobStatus::Completed,
                payload: self.completion.clone(),
            })
        }

        async fn status(&self, _handle: &JobHandle) -> Result<StatusReport> {
            unreachable!("completed jobs are never polled")
        }
    }

    struct SquareLoader(AtomicU32);

    #[async_trait]
    impl ImageLoader for SquareLoader {
        async fn load(&self, _url: &str) -> Result<LoadedImage> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(LoadedImage {
                width: 1024,
                height: 1024,
                mime_type: None,
            })
        }
    }

    fn orchestrator(service: Arc<InstantService>) -> Orchestrator {
        Orchestrator::new(
            service,
            Endpoints {
                image: "https://api.example/img/run".into(),
                text: "https://api.example/txt/run".into(),
            },
            PollSettings::default(),
        )
    }

    fn service(completion: Value) -> Arc<InstantService> {
        Arc::new(InstantService {
            completion,
            submitted: std::sync::Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_background_turn_updates_session() {
        let session = PosterSession::new("p1");
        let surface = Mutex::new(MemorySurface::new("p1", Viewport::new(1000.0, 800.0)));
        let service = service(json!({"output": {"result": "https://cdn.example/bg.png"}}));
        let reconciler = Reconciler::new(Arc::new(SquareLoader(AtomicU32::new(0))));

        let guard = TurnGuard::acquire(&session).unwrap();
        let report = run_turn(
            guard,
            &orchestrator(service.clone()),
            &reconciler,
            &surface,
            "a neon skyline poster",
        )
        .await
        .unwrap();

        assert_eq!(report.mode, GenerationMode::ImageGeneration);
        let state = session.snapshot();
        assert!(!state.ai.is_thinking);
        assert_eq!(state.ai.messages.len(), 2);
        assert_eq!(state.ai.messages[0].role, Role::User);
        assert_eq!(state.ai.messages[1].content, report.reply.content);
        assert_eq!(
            state.editor.background_url.as_deref(),
            Some("https://cdn.example/bg.png")
        );
        assert_eq!(state.editor.background_prompt, "a neon skyline poster");
        assert!(state.editor.has_unsaved_changes);
        assert!(state.ai.instruction.is_empty());

        assert!(matches!(report.events[0], SurfaceEvent::AssetCreated { .. }));
        assert_eq!(report.events.last(), Some(&SurfaceEvent::ZoomedToSelection));
        assert!(surface.lock().await.events.is_empty());
    }

    #[tokio::test]
    async fn test_second_turn_places_text_on_background() {
        let session = PosterSession::new("p1");
        let surface = Mutex::new(MemorySurface::new("p1", Viewport::new(1000.0, 800.0)));
        let reconciler = Reconciler::new(Arc::new(SquareLoader(AtomicU32::new(0))));

        let first = service(json!({"output": {"result": "https://cdn.example/bg.png"}}));
        run_turn(
            TurnGuard::acquire(&session).unwrap(),
            &orchestrator(first),
            &reconciler,
            &surface,
            "a neon skyline poster",
        )
        .await
        .unwrap();

        let second = service(json!({"output": {"elements": [{"content": "SALE"}]}}));
        let report = run_turn(
            TurnGuard::acquire(&session).unwrap(),
            &orchestrator(second.clone()),
            &reconciler,
            &surface,
            "add a title",
        )
        .await
        .unwrap();

        assert_eq!(report.mode, GenerationMode::TextPlacement);
        let submitted = second.submitted.lock().unwrap();
        assert_eq!(
            submitted[0]["canvasContext"]["existingImageUrl"],
            "https://cdn.example/bg.png"
        );
        assert_eq!(surface.lock().await.shapes.len(), 2);
        assert_eq!(session.snapshot().ai.last_element_count, Some(1));
    }

    #[tokio::test]
    async fn test_failed_turn_records_error() {
        struct FailingService;

        #[async_trait]
        impl JobService for FailingService {
            async fn submit(&self, _endpoint: &str, _input: Value) -> Result<Submission> {
                Err(PosterError::UpstreamSubmissionFailed {
                    status: 500,
                    body: "boom".into(),
                })
            }

            async fn status(&self, _handle: &JobHandle) -> Result<StatusReport> {
                unreachable!()
            }
        }

        let session = PosterSession::new("p1");
        let surface = Mutex::new(MemorySurface::new("p1", Viewport::default()));
        let orchestrator = Orchestrator::new(
            Arc::new(FailingService),
            Endpoints {
                image: "https://api.example/img/run".into(),
                text: "https://api.example/txt/run".into(),
            },
            PollSettings::default(),
        );
        let reconciler = Reconciler::new(Arc::new(SquareLoader(AtomicU32::new(0))));

        let err = run_turn(
            TurnGuard::acquire(&session).unwrap(),
            &orchestrator,
            &reconciler,
            &surface,
            "poster",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PosterError::UpstreamSubmissionFailed { .. }));

        let state = session.snapshot();
        assert!(!state.ai.is_thinking);
        assert_eq!(state.ai.last_error.as_deref(), Some("Job submission failed"));
        assert!(state.ai.messages.last().unwrap().error);
        assert!(surface.lock().await.shapes.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_turn_leaves_surface_alone() {
        struct StuckService;

        #[async_trait]
        impl JobService for StuckService {
            async fn submit(&self, _endpoint: &str, _input: Value) -> Result<Submission> {
                Ok(Submission {
                    handle: JobHandle {
                        job_id: "job-stuck".into(),
                        status_endpoint: String::new(),
                    },
                    status: JobStatus::Queued,
                    payload: json!({"status": "IN_QUEUE"}),
                })
            }

            async fn status(&self, _handle: &JobHandle) -> Result<StatusReport> {
                Ok(StatusReport {
                    status: JobStatus::Queued,
                    payload: json!({"status": "IN_QUEUE"}),
                })
            }
        }

        let session = PosterSession::new("p1");
        let surface = Mutex::new(MemorySurface::new("p1", Viewport::new(1000.0, 800.0)));
        let reconciler = Reconciler::new(Arc::new(SquareLoader(AtomicU32::new(0))));
        run_turn(
            TurnGuard::acquire(&session).unwrap(),
            &orchestrator(service(json!({"output": {"result": "https://cdn.example/bg.png"}}))),
            &reconciler,
            &surface,
            "a neon skyline poster",
        )
        .await
        .unwrap();
        let before = serde_json::to_value(&*surface.lock().await).unwrap();

        let stuck = Orchestrator::new(
            Arc::new(StuckService),
            Endpoints {
                image: "https://api.example/img/run".into(),
                text: "https://api.example/txt/run".into(),
            },
            PollSettings {
                interval: std::time::Duration::from_millis(1),
                max_attempts: 3,
            },
        );
        let err = run_turn(
            TurnGuard::acquire(&session).unwrap(),
            &stuck,
            &reconciler,
            &surface,
            "add a title",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PosterError::JobTimeout { attempts: 3, .. }));

        let surface = surface.lock().await;
        assert_eq!(serde_json::to_value(&*surface).unwrap(), before);
        assert!(surface.events.is_empty());
        assert_eq!(
            session.snapshot().ai.last_error.as_deref(),
            Some("Generation job did not complete")
        );
    }

    #[tokio::test]
    async fn test_blank_instruction_releases_session() {
        let session = PosterSession::new("p1");
        let surface = Mutex::new(MemorySurface::new("p1", Viewport::default()));
        let reconciler = Reconciler::new(Arc::new(SquareLoader(AtomicU32::new(0))));
        let err = run_turn(
            TurnGuard::acquire(&session).unwrap(),
            &orchestrator(service(json!({}))),
            &reconciler,
            &surface,
            "  ",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PosterError::InvalidInput(_)));
        assert!(!session.is_thinking());
        assert!(session.snapshot().ai.messages.is_empty());
    }
}
