//! AR Video Overlay Library
//!
//! Recognizes printed reference images through a device tracking session and
//! plays a looping video anchored on top of each recognized image, reporting
//! recognition lifecycle and detection events to a host over a method channel.
//!
//! The tracking session, video playback and scene graph are platform
//! collaborators described by the traits in [`platform`]; [`ArController`]
//! wires them into one serialized scene-update loop.

pub mod bridge;
pub mod capability;
pub mod controller;
pub mod error;
pub mod media;
pub mod orientation;
pub mod overlay;
pub mod platform;
pub mod session;
pub mod settings;
pub mod telemetry;

pub use bridge::{CommandResponse, EventBridge, HostCommand, HostEvent, CHANNEL_NAME};
pub use controller::{ArController, ControllerSnapshot, SceneHandle};
pub use error::OverlayError;
pub use media::{MediaAsset, MediaRegistry, ReferenceMarker};
pub use orientation::{MirrorFlags, Placement, Rotation, VideoTransform};
pub use overlay::{OverlayManager, OverlaySnapshot};
pub use platform::{Platform, PlatformError, SessionAnchor, TrackedAnchor};
pub use session::{SessionState, TrackingSessionManager};
pub use settings::ControllerSettings;
