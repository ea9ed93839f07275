//! Marker to media registry
//!
//! Built once from the host's lists and read-only afterwards. Correlation is
//! positional by default: the video at position `i` belongs to the marker at
//! position `i`. An explicit pairing list can be supplied instead, which
//! keeps markers and videos together when either list is reordered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::settings::{ControllerSettings, MarkerMediaPair};

/// A reference image registered for recognition
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMarker {
    /// Position in the host-supplied list
    pub index: usize,
    /// Derived name (basename of the source path)
    pub name: String,
    pub image_source: PathBuf,
    pub physical_width: f32,
}

/// The video shown on top of a marker
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    /// Position in the host-supplied list
    pub index: usize,
    pub video_source: PathBuf,
    pub watermark_enabled: bool,
}

/// Name under which a marker is reported by the tracking session
pub fn marker_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Immutable marker to media mapping
#[derive(Debug, Clone, Default)]
pub struct MediaRegistry {
    markers: Vec<ReferenceMarker>,
    media: Vec<MediaAsset>,
    /// Marker name to marker index; first occurrence wins
    by_name: HashMap<String, usize>,
}

impl MediaRegistry {
    /// Pair markers and videos by list position
    ///
    /// Lists may differ in length; markers past the end of the media list
    /// have no asset.
    pub fn positional(
        markers: &[PathBuf],
        videos: &[PathBuf],
        physical_width: f32,
        watermark_enabled: bool,
    ) -> Self {
        let markers = markers
            .iter()
            .enumerate()
            .map(|(index, path)| ReferenceMarker {
                index,
                name: marker_name(path),
                image_source: path.clone(),
                physical_width,
            })
            .collect();
        let media = videos
            .iter()
            .enumerate()
            .map(|(index, path)| MediaAsset {
                index,
                video_source: path.clone(),
                watermark_enabled,
            })
            .collect();
        Self::index(markers, media)
    }

    /// Build from an explicit marker/video pairing
    pub fn from_pairs(pairs: &[MarkerMediaPair], physical_width: f32, watermark_enabled: bool) -> Self {
        let markers = pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| ReferenceMarker {
                index,
                name: marker_name(&pair.marker),
                image_source: pair.marker.clone(),
                physical_width: pair
                    .physical_width
                    .filter(|w| w.is_finite() && *w > 0.0)
                    .unwrap_or(physical_width),
            })
            .collect();
        let media = pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| MediaAsset {
                index,
                video_source: pair.video.clone(),
                watermark_enabled,
            })
            .collect();
        Self::index(markers, media)
    }

    /// Build the registry described by controller settings
    pub fn from_settings(settings: &ControllerSettings) -> Self {
        if settings.uses_explicit_mapping() {
            Self::from_pairs(&settings.marker_media, settings.physical_width, settings.show_logo)
        } else {
            Self::positional(
                &settings.reference_image_names,
                &settings.reference_video_names,
                settings.physical_width,
                settings.show_logo,
            )
        }
    }

    fn index(markers: Vec<ReferenceMarker>, media: Vec<MediaAsset>) -> Self {
        let mut by_name = HashMap::with_capacity(markers.len());
        for marker in &markers {
            if by_name.contains_key(&marker.name) {
                tracing::warn!(
                    name = %marker.name,
                    index = marker.index,
                    "Duplicate marker name, only the first occurrence is used"
                );
                continue;
            }
            by_name.insert(marker.name.clone(), marker.index);
        }
        Self {
            markers,
            media,
            by_name,
        }
    }

    /// Media asset for a recognized marker, if it has one
    pub fn lookup(&self, marker_id: &str) -> Option<&MediaAsset> {
        let index = *self.by_name.get(marker_id)?;
        self.media.get(index)
    }

    /// Marker registered under a name
    pub fn marker(&self, marker_id: &str) -> Option<&ReferenceMarker> {
        self.by_name.get(marker_id).and_then(|&index| self.markers.get(index))
    }

    /// All markers in host order, duplicates included
    pub fn markers(&self) -> &[ReferenceMarker] {
        &self.markers
    }

    /// Markers eligible for detection: one per distinct name
    pub fn detectable_markers(&self) -> impl Iterator<Item = &ReferenceMarker> {
        self.markers
            .iter()
            .filter(|marker| self.by_name.get(&marker.name) == Some(&marker.index))
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
