//! Video overlays on tracked images

mod fade;
mod manager;
mod surface;

pub use fade::FadeIn;
pub use manager::{AddedOverlay, EndOfMediaSink, OverlayManager};
pub use surface::{OverlaySnapshot, SurfaceKey};
