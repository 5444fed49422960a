//! Drawing surface abstraction and an in-memory implementation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use posterflow_core::types::CanvasContext;

use crate::shapes::{AssetId, ImageAsset, Shape, ShapeId, ShapeKind, SurfaceEvent, Viewport};

/// The editor-side operations the reconciler needs.
pub trait DrawingSurface: Send {
    fn viewport(&self) -> Viewport;

    fn create_asset(&mut self, asset: ImageAsset) -> AssetId;

    fn create_shape(&mut self, x: f64, y: f64, kind: ShapeKind) -> ShapeId;

    /// Replace the current selection.
    fn select(&mut self, ids: &[ShapeId]);

    fn zoom_to_selection(&mut self);
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAsset {
    pub id: AssetId,
    #[serde(flatten)]
    pub asset: ImageAsset,
}

/// A surface that keeps its document in memory. Used by the gateway to hold
/// one poster per session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySurface {
    pub session_id: String,
    pub viewport: Viewport,
    pub assets: Vec<StoredAsset>,
    pub shapes: Vec<Shape>,
    pub selection: Vec<ShapeId>,
    /// Set by `zoom_to_selection`; the shapes the camera was fit to.
    pub focus: Vec<ShapeId>,
    /// Mutations since the last [`MemorySurface::drain_events`].
    #[serde(skip)]
    pub events: Vec<SurfaceEvent>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(skip)]
    next_id: u64,
}

impl MemorySurface {
    pub fn new(session_id: impl Into<String>, viewport: Viewport) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            viewport,
            assets: Vec::new(),
            shapes: Vec::new(),
            selection: Vec::new(),
            focus: Vec::new(),
            events: Vec::new(),
            created_at: now,
            last_updated: now,
            next_id: 0,
        }
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn asset(&self, id: &str) -> Option<&ImageAsset> {
        self.assets.iter().find(|a| a.id == id).map(|a| &a.asset)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.touch();
    }

    /// Source URL of the most recently placed image.
    pub fn background_url(&self) -> Option<&str> {
        self.shapes.iter().rev().find_map(|shape| match &shape.kind {
            ShapeKind::Image { asset_id, .. } => self.asset(asset_id).map(|a| a.src.as_str()),
            _ => None,
        })
    }

    /// Describe the current document in the shape a text-placement job expects.
    pub fn canvas_context(&self) -> CanvasContext {
        let elements: Vec<_> = self
            .shapes
            .iter()
            .filter_map(|shape| match &shape.kind {
                ShapeKind::Text {
                    text, color, font, ..
                } => Some(json!({
                    "type": "text",
                    "content": text,
                    "position": {"x": shape.x, "y": shape.y},
                    "style": {"color": color, "fontFamily": font},
                })),
                ShapeKind::Geo { w, h, color } => Some(json!({
                    "type": "rect",
                    "position": {"x": shape.x, "y": shape.y},
                    "bounds": {"width": w, "height": h},
                    "color": color,
                })),
                ShapeKind::Image { .. } => None,
            })
            .collect();

        let mut context = CanvasContext {
            existing_image_url: self.background_url().map(str::to_string),
            existing_elements: (!elements.is_empty()).then_some(elements),
            ..Default::default()
        };
        context.extra.insert(
            "viewport".into(),
            json!({"width": self.viewport.width, "height": self.viewport.height}),
        );
        context
    }

    /// Take the events recorded so far, leaving the log empty.
    pub fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Clear the document. Pending events are dropped along with it.
    pub fn reset(&mut self) {
        self.assets.clear();
        self.shapes.clear();
        self.selection.clear();
        self.focus.clear();
        self.events.clear();
        self.events.push(SurfaceEvent::Reset);
        self.touch();
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}:{}", self.next_id)
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

impl DrawingSurface for MemorySurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_asset(&mut self, asset: ImageAsset) -> AssetId {
        let id = self.next_id("asset");
        self.assets.push(StoredAsset {
            id: id.clone(),
            asset,
        });
        self.events.push(SurfaceEvent::AssetCreated {
            asset_id: id.clone(),
        });
        self.touch();
        id
    }

    fn create_shape(&mut self, x: f64, y: f64, kind: ShapeKind) -> ShapeId {
        let id = self.next_id("shape");
        self.shapes.push(Shape {
            id: id.clone(),
            x,
            y,
            kind,
        });
        self.events.push(SurfaceEvent::ShapeCreated {
            shape_id: id.clone(),
        });
        self.touch();
        id
    }

    fn select(&mut self, ids: &[ShapeId]) {
        self.selection = ids
            .iter()
            .filter(|id| self.shapes.iter().any(|s| &s.id == *id))
            .cloned()
            .collect();
        self.events.push(SurfaceEvent::Selected {
            shape_ids: self.selection.clone(),
        });
    }

    fn zoom_to_selection(&mut self) {
        self.focus = self.selection.clone();
        self.events.push(SurfaceEvent::ZoomedToSelection);
    }
}
