//! Poster canvas: style normalization, the drawing surface, and the
//! reconciler that places generated images and text onto it.

pub mod assets;
pub mod reconciler;
pub mod shapes;
pub mod style;
pub mod surface;

pub use assets::{HttpImageLoader, ImageLoader, LoadedImage};
pub use reconciler::{ApplicationOutcome, Reconciler};
pub use shapes::{Shape, ShapeId, ShapeKind, SurfaceEvent, Viewport};
pub use style::{CanonicalStyle, ColorToken, FontClass, SizeClass, to_canonical_style};
pub use surface::{DrawingSurface, MemorySurface};
