use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PosterError, Result};

/// Snapshot of the poster the user is currently editing.
///
/// Only the two known fields are typed; everything else the presentation layer
/// sends is kept in `extra` and forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasContext {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "existing_image_url")]
    pub existing_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "existing_elements")]
    pub existing_elements: Option<Vec<serde_json::Value>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CanvasContext {
    /// True when the context carries an existing background image.
    pub fn has_image(&self) -> bool {
        self.existing_image_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty())
    }
}

pub const INVALID_INSTRUCTION: &str = "Missing or invalid 'instruction' in request body.";

/// One validated generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    instruction: String,
    canvas_context: Option<CanvasContext>,
}

impl GenerationRequest {
    pub fn new(instruction: impl Into<String>, canvas_context: Option<CanvasContext>) -> Result<Self> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(PosterError::InvalidInput(INVALID_INSTRUCTION.into()));
        }
        Ok(Self {
            instruction,
            canvas_context,
        })
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn canvas_context(&self) -> Option<&CanvasContext> {
        self.canvas_context.as_ref()
    }

    /// Text placement when the poster already has a background image.
    pub fn mode(&self) -> GenerationMode {
        if self.canvas_context.as_ref().is_some_and(CanvasContext::has_image) {
            GenerationMode::TextPlacement
        } else {
            GenerationMode::ImageGeneration
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    ImageGeneration,
    TextPlacement,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageGeneration => "image_generation",
            Self::TextPlacement => "text_placement",
        }
    }
}

/// A submitted job and where to ask about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub job_id: String,
    pub status_endpoint: String,
}

/// Job status as reported by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Unknown(String),
}

impl JobStatus {
    /// Map a wire status string onto the status vocabulary.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "IN_QUEUE" | "QUEUED" => Self::Queued,
            "IN_PROGRESS" | "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Unknown(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

/// Free-form style as produced upstream; see the canvas crate for normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "font_size")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "font_family")]
    pub font_family: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    #[serde(alias = "text")]
    pub content: String,
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectElement {
    #[serde(default)]
    pub position: Point,
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A single item to place on the drawing surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasElement {
    Text(TextElement),
    Rect(RectElement),
}

/// Normalized outcome of one completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub elements: Vec<CanvasElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl GenerationResult {
    /// Neither an image nor any element could be extracted.
    pub fn is_empty(&self) -> bool {
        self.image_url.is_none() && self.elements.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Chat log entry owned by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: bool,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, error: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            error,
        }
    }
}
