//! Marker and media descriptors
//!
//! Provides the registry correlating recognized markers with their videos,
//! and the default loader decoding marker images from disk.

mod loader;
mod registry;

pub use loader::ImageFileLoader;
pub use registry::{marker_name, MediaAsset, MediaRegistry, ReferenceMarker};
