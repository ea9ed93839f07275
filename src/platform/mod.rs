//! Platform collaborator interfaces
//!
//! The tracking session, video playback, scene graph, display and torch are
//! provided by the host platform. The pipeline only talks to them through the
//! traits in this module; [`simulated`] provides in-memory implementations.

pub mod simulated;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Vec2};
use image::GrayImage;
use thiserror::Error;
use uuid::Uuid;

use crate::orientation::{Placement, VideoTransform};

/// Identifier of a tracked anchor, assigned by the tracking subsystem
pub type AnchorId = Uuid;

/// Handle of a node attached to the scene graph
pub type NodeId = u64;

/// Errors reported by platform collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlatformError {
    #[error("Failed to decode marker image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to open media {path}: {reason}")]
    MediaOpen { path: PathBuf, reason: String },

    #[error("Failed to load metadata for {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("Tracking session failed: {0}")]
    Session(String),

    #[error("Scene graph rejected node: {0}")]
    Scene(String),

    #[error("Torch unavailable: {0}")]
    Torch(String),
}

// ============================================================================
// Tracking session
// ============================================================================

/// An image anchor: a recognized marker with its pose
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAnchor {
    pub anchor_id: AnchorId,
    /// Name of the reference image that was recognized
    pub marker_id: String,
    /// World transform of the marker center
    pub pose: Mat4,
    /// Physical size of the marker in meters
    pub physical_size: Vec2,
}

impl TrackedAnchor {
    pub fn new(marker_id: impl Into<String>, physical_size: Vec2) -> Self {
        Self {
            anchor_id: Uuid::new_v4(),
            marker_id: marker_id.into(),
            pose: Mat4::IDENTITY,
            physical_size,
        }
    }
}

/// Anchors delivered by the tracking subsystem
///
/// Only image anchors drive overlays; the other kinds are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAnchor {
    Image(TrackedAnchor),
    Plane { anchor_id: AnchorId },
    Other { anchor_id: AnchorId },
}

impl SessionAnchor {
    pub fn anchor_id(&self) -> AnchorId {
        match self {
            SessionAnchor::Image(anchor) => anchor.anchor_id,
            SessionAnchor::Plane { anchor_id } | SessionAnchor::Other { anchor_id } => *anchor_id,
        }
    }
}

/// A decoded marker registered for detection
#[derive(Debug, Clone)]
pub struct DetectionImage {
    /// Name reported back on anchors (basename of the source path)
    pub name: String,
    pub source: PathBuf,
    /// Printed width in meters
    pub physical_width: f32,
    pub pixels: Arc<GrayImage>,
}

impl DetectionImage {
    /// Printed height in meters, derived from the pixel aspect ratio
    pub fn physical_height(&self) -> f32 {
        let (width, height) = self.pixels.dimensions();
        if width == 0 {
            return 0.0;
        }
        self.physical_width * height as f32 / width as f32
    }

    pub fn physical_size(&self) -> Vec2 {
        Vec2::new(self.physical_width, self.physical_height())
    }
}

/// Configuration the session is (re)started with
#[derive(Debug, Clone, Default)]
pub struct SessionConfiguration {
    pub detection_images: Vec<DetectionImage>,
    pub max_tracked_images: usize,
}

/// Options for (re)starting the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub reset_tracking: bool,
    pub remove_existing_anchors: bool,
}

impl RunOptions {
    /// Reset the world origin and drop every anchor
    pub const RESET: Self = Self {
        reset_tracking: true,
        remove_existing_anchors: true,
    };
}

/// The underlying image-tracking session
pub trait ArSession: Send {
    fn run(&mut self, config: &SessionConfiguration, options: RunOptions) -> Result<(), PlatformError>;
    fn pause(&mut self);
}

/// Decodes marker images from their source paths
pub trait MarkerImageLoader: Send + Sync {
    fn decode(&self, path: &Path) -> Result<GrayImage, PlatformError>;
}

// ============================================================================
// Media playback
// ============================================================================

/// Metadata probed from a video asset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    /// Frame size as stored, before the transform is applied
    pub natural_size: Vec2,
    pub transform: VideoTransform,
}

impl VideoMetadata {
    /// Natural width / height
    pub fn aspect(&self) -> f32 {
        if self.natural_size.y == 0.0 {
            0.0
        } else {
            self.natural_size.x / self.natural_size.y
        }
    }
}

/// Callback fired when playback reaches the end of the media
pub type EndOfMediaCallback = Box<dyn Fn() + Send + Sync>;

/// A live player for one video asset
pub trait PlaybackHandle: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to_start(&mut self);
    /// Register for end-of-media notifications
    fn on_end_of_media(&mut self, callback: EndOfMediaCallback) -> Subscription;
    /// Release the player and its decoder resources
    fn release(self: Box<Self>);
}

/// Opens players and probes video metadata
pub trait MediaBackend: Send + Sync {
    fn open(&self, source: &Path) -> Result<Box<dyn PlaybackHandle>, PlatformError>;
    /// Blocking metadata probe; callers run it off the scene-update context
    fn probe(&self, source: &Path) -> Result<VideoMetadata, PlatformError>;
}

/// Registration that is cancelled exactly once
///
/// Cancelled by [`Subscription::release`], or on drop if it was never
/// released explicitly.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Whether the registration is still in place
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn release(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ============================================================================
// Scene graph
// ============================================================================

/// Watermark region composited into the corner of an overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkRegion {
    /// Lower-left corner in normalized surface coordinates
    pub origin: Vec2,
    /// Size in normalized surface coordinates
    pub size: Vec2,
}

impl WatermarkRegion {
    /// Fixed bottom-right badge
    pub const BOTTOM_RIGHT: Self = Self {
        origin: Vec2::new(0.72, 0.04),
        size: Vec2::new(0.24, 0.08),
    };
}

/// Description of a video plane to attach under an anchor
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayNode {
    pub anchor_id: AnchorId,
    /// Plane size in meters
    pub size: Vec2,
    pub video_source: PathBuf,
    /// World transform of the anchor the plane hangs under
    pub anchor_pose: Mat4,
    pub placement: Placement,
    /// Plane transform relative to the anchor, derived from `placement`
    pub local_transform: Mat4,
    pub opacity: f32,
    pub watermark: Option<WatermarkRegion>,
}

impl OverlayNode {
    pub fn world_transform(&self) -> Mat4 {
        self.anchor_pose * self.local_transform
    }
}

/// The host's node graph
pub trait SceneGraph: Send {
    fn attach(&mut self, node: &OverlayNode) -> Result<NodeId, PlatformError>;
    fn update_placement(&mut self, node: NodeId, placement: &Placement, local_transform: Mat4);
    fn set_opacity(&mut self, node: NodeId, opacity: f32);
    fn detach(&mut self, node: NodeId);
}

// ============================================================================
// Device capabilities and user prompts
// ============================================================================

pub trait DisplayControl: Send {
    fn set_idle_timer_disabled(&mut self, disabled: bool);
}

pub trait Torch: Send {
    fn set_torch(&mut self, on: bool) -> Result<(), PlatformError>;
}

/// Shows recoverable failures to the user
pub trait UserPrompt: Send {
    /// Present a dismissible message offering to restart recognition
    fn offer_restart(&mut self, message: &str);
}

/// Every collaborator a controller needs
pub struct Platform {
    pub session: Box<dyn ArSession>,
    pub loader: Arc<dyn MarkerImageLoader>,
    pub media: Arc<dyn MediaBackend>,
    pub scene: Box<dyn SceneGraph>,
    pub display: Box<dyn DisplayControl>,
    pub torch: Box<dyn Torch>,
    pub prompt: Box<dyn UserPrompt>,
}
