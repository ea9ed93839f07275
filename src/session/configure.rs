//! Building the detection configuration
//!
//! Decoding marker images is slow, so this runs on a blocking worker rather
//! than on the scene-update context.

use std::sync::Arc;

use crate::media::MediaRegistry;
use crate::platform::{DetectionImage, MarkerImageLoader, PlatformError, SessionConfiguration};

/// A configuration plus the markers that had to be left out
#[derive(Debug, Clone, Default)]
pub struct ConfigurationReport {
    pub configuration: SessionConfiguration,
    pub skipped: Vec<(String, PlatformError)>,
}

/// Decode every detectable marker and build a session configuration
///
/// Markers that fail to decode are logged and excluded. Their positions are
/// untouched, so media correlation for the remaining markers is unaffected.
pub fn build_configuration(
    registry: &MediaRegistry,
    loader: &dyn MarkerImageLoader,
    max_tracked_images: usize,
) -> ConfigurationReport {
    let mut report = ConfigurationReport::default();
    report.configuration.max_tracked_images = max_tracked_images;

    for marker in registry.detectable_markers() {
        match loader.decode(&marker.image_source) {
            Ok(pixels) => {
                tracing::debug!(
                    name = %marker.name,
                    index = marker.index,
                    width = pixels.width(),
                    height = pixels.height(),
                    "Prepared marker"
                );
                report.configuration.detection_images.push(DetectionImage {
                    name: marker.name.clone(),
                    source: marker.image_source.clone(),
                    physical_width: marker.physical_width,
                    pixels: Arc::new(pixels),
                });
            }
            Err(e) => {
                tracing::warn!(name = %marker.name, index = marker.index, "Skipping marker: {}", e);
                report.skipped.push((marker.name.clone(), e));
            }
        }
    }

    tracing::info!(
        active = report.configuration.detection_images.len(),
        skipped = report.skipped.len(),
        max_tracked = max_tracked_images,
        "Detection configuration built"
    );

    report
}
