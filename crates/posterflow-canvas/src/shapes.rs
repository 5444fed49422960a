//! Shape, asset, and event types for the drawing surface.

use serde::{Deserialize, Serialize};

use crate::style::{ColorToken, FontClass, SizeClass};

pub type ShapeId = String;
pub type AssetId = String;

/// Visible area of the surface, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// A registered image source with its natural dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub src: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeKind {
    Image {
        asset_id: AssetId,
        w: f64,
        h: f64,
    },
    /// `w` is `None` for auto-sized text; otherwise text wraps at `w`.
    Text {
        text: String,
        size: SizeClass,
        color: ColorToken,
        font: FontClass,
        #[serde(skip_serializing_if = "Option::is_none")]
        w: Option<f64>,
    },
    Geo {
        w: f64,
        h: f64,
        color: ColorToken,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub kind: ShapeKind,
}

impl Shape {
    pub fn is_auto_size(&self) -> bool {
        matches!(self.kind, ShapeKind::Text { w: None, .. })
    }
}

/// Mutations applied to a surface, in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SurfaceEvent {
    AssetCreated { asset_id: AssetId },
    ShapeCreated { shape_id: ShapeId },
    Selected { shape_ids: Vec<ShapeId> },
    ZoomedToSelection,
    Reset,
}
