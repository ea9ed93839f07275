//! Overlay lifecycle manager
//!
//! Owns every live overlay. Each recognized image anchor with a media asset
//! gets one surface: a looping player, an attached video plane and an
//! end-of-media subscription. Everything here runs on the scene-update
//! context, so creation and teardown for an anchor never overlap.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::fade::FadeIn;
use super::surface::{OverlaySnapshot, OverlaySurface, SurfaceKey};
use crate::media::MediaRegistry;
use crate::orientation::{self, Placement};
use crate::platform::{
    AnchorId, MediaBackend, NodeId, OverlayNode, PlatformError, SceneGraph, TrackedAnchor,
    VideoMetadata, WatermarkRegion,
};

/// Receives end-of-media notifications, possibly from a playback thread
pub type EndOfMediaSink = Arc<dyn Fn(SurfaceKey) + Send + Sync>;

/// A freshly created overlay
#[derive(Debug, Clone, PartialEq)]
pub struct AddedOverlay {
    pub key: SurfaceKey,
    /// Name of the recognized marker
    pub image_name: String,
    /// Video to probe for orientation metadata
    pub video_source: PathBuf,
}

pub struct OverlayManager {
    registry: Arc<MediaRegistry>,
    media: Arc<dyn MediaBackend>,
    scene: Box<dyn SceneGraph>,
    end_of_media: EndOfMediaSink,
    fade_in: Duration,
    surfaces: HashMap<AnchorId, OverlaySurface>,
    next_generation: u64,
}

impl OverlayManager {
    pub fn new(
        registry: Arc<MediaRegistry>,
        media: Arc<dyn MediaBackend>,
        scene: Box<dyn SceneGraph>,
        end_of_media: EndOfMediaSink,
        fade_in: Duration,
    ) -> Self {
        Self {
            registry,
            media,
            scene,
            end_of_media,
            fade_in,
            surfaces: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Create an overlay for a newly tracked image
    ///
    /// Returns `None` without side effects when the anchor already has an
    /// overlay or the marker has no media. Placement starts at the upright
    /// default until [`apply_metadata`](Self::apply_metadata) runs.
    pub fn on_anchor_added(&mut self, anchor: &TrackedAnchor, now: Instant) -> Option<AddedOverlay> {
        if self.surfaces.contains_key(&anchor.anchor_id) {
            tracing::debug!(anchor = %anchor.anchor_id, "Anchor already has an overlay");
            return None;
        }

        let Some(asset) = self.registry.lookup(&anchor.marker_id) else {
            tracing::debug!(marker = %anchor.marker_id, "No media for marker");
            return None;
        };
        let video_source = asset.video_source.clone();
        let watermark = asset.watermark_enabled;

        let mut player = match self.media.open(&video_source) {
            Ok(player) => player,
            Err(e) => {
                tracing::warn!(marker = %anchor.marker_id, "Failed to open overlay media: {}", e);
                return None;
            }
        };

        self.next_generation += 1;
        let key = SurfaceKey {
            anchor_id: anchor.anchor_id,
            generation: self.next_generation,
        };

        let fade = FadeIn::new(now, self.fade_in);
        let opacity = fade.opacity_at(now);

        let sink = Arc::clone(&self.end_of_media);
        let subscription = player.on_end_of_media(Box::new(move || sink(key)));

        let node = OverlayNode {
            anchor_id: anchor.anchor_id,
            size: anchor.physical_size,
            video_source: video_source.clone(),
            anchor_pose: anchor.pose,
            placement: Placement::fallback(),
            local_transform: Placement::fallback().local_transform(),
            opacity,
            watermark: watermark.then_some(WatermarkRegion::BOTTOM_RIGHT),
        };
        let node_id = match self.scene.attach(&node) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(marker = %anchor.marker_id, "Failed to attach overlay: {}", e);
                subscription.release();
                player.release();
                return None;
            }
        };

        player.play();

        self.surfaces.insert(
            anchor.anchor_id,
            OverlaySurface {
                key,
                marker: anchor.marker_id.clone(),
                video_source: video_source.clone(),
                size: anchor.physical_size,
                player,
                node: node_id,
                subscription,
                placement: Placement::fallback(),
                fade,
                opacity,
                watermark,
                paused: false,
            },
        );

        tracing::info!(
            anchor = %anchor.anchor_id,
            marker = %anchor.marker_id,
            video = %video_source.display(),
            "Overlay created"
        );

        Some(AddedOverlay {
            key,
            image_name: anchor.marker_id.clone(),
            video_source,
        })
    }

    /// Tear down the overlay on a removed anchor; returns whether one existed
    pub fn on_anchor_removed(&mut self, anchor_id: AnchorId) -> bool {
        match self.surfaces.remove(&anchor_id) {
            Some(surface) => {
                surface.teardown(self.scene.as_mut());
                true
            }
            None => false,
        }
    }

    /// Tear down every overlay; returns how many were live
    pub fn on_session_teardown(&mut self) -> usize {
        let count = self.surfaces.len();
        for (_, surface) in self.surfaces.drain() {
            surface.teardown(self.scene.as_mut());
        }
        if count > 0 {
            tracing::info!(count, "All overlays torn down");
        }
        count
    }

    /// Apply probed metadata to the overlay it was requested for
    ///
    /// Results for overlays that have since been removed or replaced are
    /// discarded. A failed probe keeps the upright default.
    pub fn apply_metadata(
        &mut self,
        key: SurfaceKey,
        metadata: Result<VideoMetadata, PlatformError>,
    ) -> bool {
        let Some(surface) = self.live_surface_mut(key) else {
            tracing::debug!(anchor = %key.anchor_id, "Discarding metadata for removed overlay");
            return false;
        };

        let placement = match metadata {
            Ok(metadata) => orientation::resolve(&metadata.transform, metadata.aspect(), surface.aspect()),
            Err(e) => {
                tracing::warn!(marker = %surface.marker, "Using default orientation: {}", e);
                Placement::fallback()
            }
        };

        surface.placement = placement;
        let node = surface.node;
        tracing::debug!(
            anchor = %key.anchor_id,
            rotation = placement.rotation.degrees(),
            mirror = placement.mirror.horizontal,
            "Overlay placement resolved"
        );
        self.scene.update_placement(node, &placement, placement.local_transform());
        true
    }

    /// Loop playback when a player reaches the end
    ///
    /// A paused overlay is rewound but stays paused.
    pub fn on_playback_ended(&mut self, key: SurfaceKey) -> bool {
        let Some(surface) = self.live_surface_mut(key) else {
            return false;
        };
        surface.player.seek_to_start();
        if surface.paused {
            tracing::trace!(anchor = %key.anchor_id, "Paused overlay rewound");
        } else {
            surface.player.play();
            tracing::trace!(anchor = %key.anchor_id, "Overlay looped");
        }
        true
    }

    /// Advance fade-ins and push opacity to the scene
    pub fn tick(&mut self, now: Instant) {
        for surface in self.surfaces.values_mut() {
            if let Some(opacity) = surface.fade.advance(now) {
                surface.opacity = opacity;
                self.scene.set_opacity(surface.node, opacity);
            }
        }
    }

    /// Pause every player, e.g. while the view is hidden
    pub fn pause_playback(&mut self) {
        for surface in self.surfaces.values_mut() {
            surface.player.pause();
            surface.paused = true;
        }
    }

    /// Marker of the first hit node that belongs to a live overlay
    pub fn image_for_hits(&self, hits: &[NodeId]) -> Option<&str> {
        hits.iter().find_map(|&node| {
            self.surfaces
                .values()
                .find(|surface| surface.node == node)
                .map(|surface| surface.marker.as_str())
        })
    }

    pub fn is_live(&self, anchor_id: AnchorId) -> bool {
        self.surfaces.contains_key(&anchor_id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn snapshot(&self) -> Vec<OverlaySnapshot> {
        let mut overlays: Vec<_> = self.surfaces.values().map(OverlaySurface::snapshot).collect();
        overlays.sort_by_key(|overlay| overlay.generation);
        overlays
    }

    fn live_surface_mut(&mut self, key: SurfaceKey) -> Option<&mut OverlaySurface> {
        self.surfaces
            .get_mut(&key.anchor_id)
            .filter(|surface| surface.key.generation == key.generation)
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        self.on_session_teardown();
    }
}
