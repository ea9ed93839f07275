//! Per-anchor overlay resources

use std::path::PathBuf;

use glam::Vec2;
use serde::Serialize;

use super::fade::FadeIn;
use crate::orientation::Placement;
use crate::platform::{AnchorId, NodeId, PlaybackHandle, SceneGraph, Subscription};

/// Identifies one overlay lifecycle
///
/// The generation distinguishes successive overlays on the same anchor, so
/// completions that outlive their overlay can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    pub anchor_id: AnchorId,
    pub generation: u64,
}

/// Video plane attached to a tracked anchor
pub(crate) struct OverlaySurface {
    pub key: SurfaceKey,
    pub marker: String,
    pub video_source: PathBuf,
    /// Physical size in meters
    pub size: Vec2,
    pub player: Box<dyn PlaybackHandle>,
    pub node: NodeId,
    pub subscription: Subscription,
    pub placement: Placement,
    pub fade: FadeIn,
    pub opacity: f32,
    pub watermark: bool,
    /// Playback held by a view pause; end-of-media must not restart it
    pub paused: bool,
}

impl OverlaySurface {
    /// Physical width / height of the surface
    pub fn aspect(&self) -> f32 {
        if self.size.y == 0.0 {
            0.0
        } else {
            self.size.x / self.size.y
        }
    }

    /// Stop playback and release everything this surface holds
    ///
    /// Consumes the surface, so each resource is released exactly once.
    pub fn teardown(self, scene: &mut dyn SceneGraph) {
        let OverlaySurface {
            key,
            mut player,
            node,
            subscription,
            ..
        } = self;
        player.pause();
        subscription.release();
        player.release();
        scene.detach(node);
        tracing::debug!(anchor = %key.anchor_id, generation = key.generation, "Overlay torn down");
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            anchor_id: self.key.anchor_id,
            generation: self.key.generation,
            marker: self.marker.clone(),
            video_source: self.video_source.clone(),
            node: self.node,
            placement: self.placement,
            opacity: self.opacity,
            watermark: self.watermark,
            paused: self.paused,
        }
    }
}

/// Read-only view of a live overlay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlaySnapshot {
    pub anchor_id: AnchorId,
    pub generation: u64,
    pub marker: String,
    pub video_source: PathBuf,
    pub node: NodeId,
    pub placement: Placement,
    pub opacity: f32,
    pub watermark: bool,
    pub paused: bool,
}
