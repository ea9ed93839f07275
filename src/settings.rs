//! Controller settings
//!
//! Deserializes the creation params handed over by the host view
//! (`referenceImageNames`, `referenceVideoNames`, `showLogo`) together with
//! the tunables of the recognition pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;

/// Default number of markers tracked at the same time
pub const DEFAULT_MAX_TRACKED_IMAGES: usize = 5;

/// Upper bound for concurrently tracked markers
pub const MAX_TRACKED_IMAGES_LIMIT: usize = 10;

/// Default physical width of a printed marker, in meters
pub const DEFAULT_PHYSICAL_WIDTH: f32 = 0.5;

/// Default minimum interval between automatic restarts
pub const DEFAULT_RESTART_COOLDOWN_MS: u64 = 5_000;

/// Default overlay fade-in duration
pub const DEFAULT_FADE_IN_MS: u64 = 500;

/// Explicit marker to video pairing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerMediaPair {
    /// Path to the reference image
    pub marker: PathBuf,
    /// Path to the video played on top of it
    pub video: PathBuf,
    /// Printed width in meters (falls back to `physicalWidth`)
    #[serde(default)]
    pub physical_width: Option<f32>,
}

/// Settings for a single recognition controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSettings {
    /// Ordered reference image paths
    #[serde(default)]
    pub reference_image_names: Vec<PathBuf>,

    /// Ordered video paths, paired by position with `reference_image_names`
    #[serde(default)]
    pub reference_video_names: Vec<PathBuf>,

    /// Whether overlays carry the watermark region
    #[serde(default = "default_show_logo")]
    pub show_logo: bool,

    /// Explicit pairing; takes precedence over the positional lists when set
    #[serde(default)]
    pub marker_media: Vec<MarkerMediaPair>,

    /// Printed marker width in meters
    #[serde(default = "default_physical_width")]
    pub physical_width: f32,

    /// Maximum number of markers tracked at once (clamped to 1..=10)
    #[serde(default = "default_max_tracked_images")]
    pub max_tracked_images: usize,

    /// Cooldown between interruption-driven restarts, in milliseconds
    #[serde(default = "default_restart_cooldown_ms")]
    pub restart_cooldown_ms: u64,

    /// Overlay fade-in duration, in milliseconds
    #[serde(default = "default_fade_in_ms")]
    pub fade_in_ms: u64,
}

fn default_show_logo() -> bool {
    true
}

fn default_physical_width() -> f32 {
    DEFAULT_PHYSICAL_WIDTH
}

fn default_max_tracked_images() -> usize {
    DEFAULT_MAX_TRACKED_IMAGES
}

fn default_restart_cooldown_ms() -> u64 {
    DEFAULT_RESTART_COOLDOWN_MS
}

fn default_fade_in_ms() -> u64 {
    DEFAULT_FADE_IN_MS
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            reference_image_names: Vec::new(),
            reference_video_names: Vec::new(),
            show_logo: default_show_logo(),
            marker_media: Vec::new(),
            physical_width: DEFAULT_PHYSICAL_WIDTH,
            max_tracked_images: DEFAULT_MAX_TRACKED_IMAGES,
            restart_cooldown_ms: DEFAULT_RESTART_COOLDOWN_MS,
            fade_in_ms: DEFAULT_FADE_IN_MS,
        }
    }
}

impl ControllerSettings {
    /// Create settings from positionally paired marker and video lists
    pub fn new(
        markers: impl IntoIterator<Item = impl Into<PathBuf>>,
        videos: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        Self {
            reference_image_names: markers.into_iter().map(Into::into).collect(),
            reference_video_names: videos.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parse creation params from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, OverlayError> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.validated())
    }

    /// Load creation params from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, OverlayError> {
        let contents = fs::read_to_string(path).map_err(|source| OverlayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Clamp tunables into their supported ranges
    pub fn validated(mut self) -> Self {
        let clamped = self.max_tracked_images.clamp(1, MAX_TRACKED_IMAGES_LIMIT);
        if clamped != self.max_tracked_images {
            tracing::warn!(
                requested = self.max_tracked_images,
                clamped,
                "maxTrackedImages out of range"
            );
            self.max_tracked_images = clamped;
        }

        if !(self.physical_width.is_finite() && self.physical_width > 0.0) {
            tracing::warn!(
                requested = self.physical_width,
                "physicalWidth must be positive, using default"
            );
            self.physical_width = DEFAULT_PHYSICAL_WIDTH;
        }

        if self.marker_media.is_empty()
            && self.reference_video_names.len() < self.reference_image_names.len()
        {
            tracing::warn!(
                markers = self.reference_image_names.len(),
                videos = self.reference_video_names.len(),
                "Fewer videos than markers, unpaired markers will not show overlays"
            );
        }

        self
    }

    /// Whether the explicit pairing list should be used
    pub fn uses_explicit_mapping(&self) -> bool {
        !self.marker_media.is_empty()
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_millis(self.restart_cooldown_ms)
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_params_defaults() {
        let settings = ControllerSettings::from_json_str(
            r#"{"referenceImageNames": ["a.png"], "referenceVideoNames": ["a.mp4"]}"#,
        )
        .unwrap();
        assert_eq!(settings.reference_image_names, vec![PathBuf::from("a.png")]);
        assert!(settings.show_logo);
        assert_eq!(settings.max_tracked_images, DEFAULT_MAX_TRACKED_IMAGES);
        assert_eq!(settings.restart_cooldown(), Duration::from_secs(5));
        assert_eq!(settings.fade_in(), Duration::from_millis(500));
        assert!(!settings.uses_explicit_mapping());
    }

    #[test]
    fn test_show_logo_false() {
        let settings = ControllerSettings::from_json_str(r#"{"showLogo": false}"#).unwrap();
        assert!(!settings.show_logo);
        assert!(settings.reference_image_names.is_empty());
    }

    #[test]
    fn test_max_tracked_images_clamped() {
        let settings = ControllerSettings::from_json_str(r#"{"maxTrackedImages": 50}"#).unwrap();
        assert_eq!(settings.max_tracked_images, MAX_TRACKED_IMAGES_LIMIT);

        let settings = ControllerSettings::from_json_str(r#"{"maxTrackedImages": 0}"#).unwrap();
        assert_eq!(settings.max_tracked_images, 1);
    }

    #[test]
    fn test_invalid_physical_width_replaced() {
        let settings = ControllerSettings::from_json_str(r#"{"physicalWidth": -1.0}"#).unwrap();
        assert_eq!(settings.physical_width, DEFAULT_PHYSICAL_WIDTH);
    }

    #[test]
    fn test_explicit_mapping() {
        let settings = ControllerSettings::from_json_str(
            r#"{"markerMedia": [{"marker": "b.png", "video": "b.mp4", "physicalWidth": 0.2}]}"#,
        )
        .unwrap();
        assert!(settings.uses_explicit_mapping());
        assert_eq!(settings.marker_media[0].physical_width, Some(0.2));
    }

    #[test]
    fn test_malformed_params_rejected() {
        let result = ControllerSettings::from_json_str(r#"{"referenceImageNames": 3}"#);
        assert!(matches!(result, Err(OverlayError::InvalidParams(_))));
    }
}
