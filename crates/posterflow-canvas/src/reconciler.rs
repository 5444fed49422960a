//! Applying a generation result to a drawing surface.
//!
//! The image (if any) is loaded before the surface is touched, so a failed
//! load leaves the document exactly as it was. After that the image node is
//! created, fit to the viewport, selected, and focused; then every element is
//! created on top and the new elements are selected as one batch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use posterflow_core::Result;
use posterflow_core::types::{CanvasElement, GenerationResult, RectElement, TextElement};

use crate::assets::{ImageLoader, LoadedImage};
use crate::shapes::{ImageAsset, ShapeId, ShapeKind, Viewport};
use crate::style::{color_token, to_canonical_style};
use crate::surface::DrawingSurface;

pub const DEFAULT_FIT_RATIO: f64 = 0.8;

/// What an application did to the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplicationOutcome {
    Applied {
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<ShapeId>,
        elements: Vec<ShapeId>,
        summary: String,
    },
    /// Nothing usable came back; the surface is unchanged.
    Empty {
        summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl ApplicationOutcome {
    pub fn summary(&self) -> &str {
        match self {
            Self::Applied { summary, .. } | Self::Empty { summary, .. } => summary,
        }
    }

    /// Empty outcomes should be shown to the user prominently.
    pub fn is_notable(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}

/// Placement of an image scaled to fit a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Scale `(width, height)` to fit within `fit_ratio` of the viewport without
/// upscaling, centered in the viewport.
pub fn fit_to_viewport(width: u32, height: u32, viewport: Viewport, fit_ratio: f64) -> Placement {
    let (width, height) = (f64::from(width), f64::from(height));
    let max_w = viewport.width * fit_ratio;
    let max_h = viewport.height * fit_ratio;
    let scale = (max_w / width).min(max_h / height).min(1.0);
    let (w, h) = (width * scale, height * scale);
    Placement {
        x: viewport.x + (viewport.width - w) / 2.0,
        y: viewport.y + (viewport.height - h) / 2.0,
        w,
        h,
    }
}

pub struct Reconciler {
    loader: Arc<dyn ImageLoader>,
    fit_ratio: f64,
}

impl Reconciler {
    pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
        Self {
            loader,
            fit_ratio: DEFAULT_FIT_RATIO,
        }
    }

    pub fn with_fit_ratio(mut self, fit_ratio: f64) -> Self {
        self.fit_ratio = fit_ratio;
        self
    }

    /// Apply `result` to `surface`. Fails only if the image cannot be
    /// loaded, in which case nothing has been written.
    pub async fn apply(
        &self,
        surface: &mut dyn DrawingSurface,
        result: &GenerationResult,
    ) -> Result<ApplicationOutcome> {
        if result.is_empty() {
            info!("Generation produced nothing to place");
            return Ok(ApplicationOutcome::Empty {
                summary: "The generator returned no image and no elements.".into(),
                detail: result.reasoning.clone().or_else(|| result.raw_text.clone()),
            });
        }

        let loaded = match &result.image_url {
            Some(url) => Some((url.as_str(), self.loader.load(url).await?)),
            None => None,
        };

        let image = match loaded {
            Some((url, loaded)) => Some(self.place_image(surface, url, loaded)),
            None => None,
        };

        let mut elements = Vec::with_capacity(result.elements.len());
        for element in &result.elements {
            let id = match element {
                CanvasElement::Text(text) => place_text(surface, text),
                CanvasElement::Rect(rect) => place_rect(surface, rect),
            };
            elements.push(id);
        }
        if !elements.is_empty() {
            surface.select(&elements);
        }

        let summary = summarize(image.is_some(), elements.len(), result.reasoning.as_deref());
        info!(
            image = image.is_some(),
            elements = elements.len(),
            "Generation applied to surface"
        );
        Ok(ApplicationOutcome::Applied {
            image,
            elements,
            summary,
        })
    }

    fn place_image(
        &self,
        surface: &mut dyn DrawingSurface,
        url: &str,
        loaded: LoadedImage,
    ) -> ShapeId {
        let placement = fit_to_viewport(loaded.width, loaded.height, surface.viewport(), self.fit_ratio);
        let asset_id = surface.create_asset(ImageAsset {
            src: url.to_string(),
            width: loaded.width,
            height: loaded.height,
            mime_type: loaded.mime_type,
        });
        let id = surface.create_shape(
            placement.x,
            placement.y,
            ShapeKind::Image {
                asset_id,
                w: placement.w,
                h: placement.h,
            },
        );
        debug!(shape = %id, w = placement.w, h = placement.h, "Image placed");
        surface.select(std::slice::from_ref(&id));
        surface.zoom_to_selection();
        id
    }
}

fn place_text(surface: &mut dyn DrawingSurface, text: &TextElement) -> ShapeId {
    let style = to_canonical_style(&text.style);
    let w = text
        .bounds
        .map(|b| b.width)
        .filter(|w| w.is_finite() && *w > 0.0);
    surface.create_shape(
        text.position.x,
        text.position.y,
        ShapeKind::Text {
            text: text.content.clone(),
            size: style.size,
            color: style.color,
            font: style.font,
            w,
        },
    )
}

fn place_rect(surface: &mut dyn DrawingSurface, rect: &RectElement) -> ShapeId {
    surface.create_shape(
        rect.position.x,
        rect.position.y,
        ShapeKind::Geo {
            w: rect.bounds.width,
            h: rect.bounds.height,
            color: color_token(rect.color.as_deref()),
        },
    )
}

fn summarize(image: bool, elements: usize, reasoning: Option<&str>) -> String {
    let noun = if elements == 1 { "element" } else { "elements" };
    let mut summary = match (image, elements) {
        (true, 0) => "Added a new background image to the poster.".to_string(),
        (true, n) => format!("Added a background image and {n} {noun}."),
        (false, n) => format!("Added {n} {noun} to the poster."),
    };
    if let Some(reasoning) = reasoning.map(str::trim).filter(|r| !r.is_empty()) {
        summary.push(' ');
        summary.push_str(reasoning);
    }
    summary
}
