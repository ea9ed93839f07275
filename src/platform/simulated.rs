//! In-memory platform
//!
//! Every collaborator records what was asked of it and keeps live-resource
//! counts (players, subscriptions, attached nodes) so leaks are observable.
//! Used by the replay binary and by tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Vec2};
use image::GrayImage;
use parking_lot::Mutex;

use super::{
    ArSession, DisplayControl, EndOfMediaCallback, MarkerImageLoader, MediaBackend, NodeId,
    OverlayNode, Platform, PlatformError, PlaybackHandle, RunOptions, SceneGraph,
    SessionConfiguration, Subscription, Torch, UserPrompt, VideoMetadata,
};
use crate::media::marker_name;
use crate::orientation::{Placement, VideoTransform};

// ============================================================================
// Session
// ============================================================================

#[derive(Default)]
struct SessionLog {
    runs: usize,
    pauses: usize,
    last_options: Option<RunOptions>,
    active_markers: Vec<String>,
    max_tracked_images: usize,
    fail_next_run: Option<String>,
}

/// Session that records runs and pauses
#[derive(Clone, Default)]
pub struct SimulatedSession {
    log: Arc<Mutex<SessionLog>>,
}

impl SimulatedSession {
    pub fn run_count(&self) -> usize {
        self.log.lock().runs
    }

    pub fn pause_count(&self) -> usize {
        self.log.lock().pauses
    }

    pub fn last_options(&self) -> Option<RunOptions> {
        self.log.lock().last_options
    }

    /// Marker names of the most recent successful run
    pub fn active_markers(&self) -> Vec<String> {
        self.log.lock().active_markers.clone()
    }

    pub fn max_tracked_images(&self) -> usize {
        self.log.lock().max_tracked_images
    }

    /// Make the next `run` fail with a session error
    pub fn fail_next_run(&self, reason: impl Into<String>) {
        self.log.lock().fail_next_run = Some(reason.into());
    }
}

impl ArSession for SimulatedSession {
    fn run(&mut self, config: &SessionConfiguration, options: RunOptions) -> Result<(), PlatformError> {
        let mut log = self.log.lock();
        if let Some(reason) = log.fail_next_run.take() {
            return Err(PlatformError::Session(reason));
        }
        log.runs += 1;
        log.last_options = Some(options);
        log.active_markers = config
            .detection_images
            .iter()
            .map(|image| image.name.clone())
            .collect();
        log.max_tracked_images = config.max_tracked_images;
        Ok(())
    }

    fn pause(&mut self) {
        self.log.lock().pauses += 1;
    }
}

// ============================================================================
// Marker loader
// ============================================================================

/// Loader producing a blank 64x48 marker for every path
#[derive(Clone, Default)]
pub struct SimulatedLoader {
    undecodable: Arc<Mutex<HashSet<String>>>,
}

impl SimulatedLoader {
    /// Make decoding fail for a path or a basename
    pub fn mark_undecodable(&self, name: impl Into<String>) {
        self.undecodable.lock().insert(name.into());
    }
}

impl MarkerImageLoader for SimulatedLoader {
    fn decode(&self, path: &Path) -> Result<GrayImage, PlatformError> {
        let undecodable = self.undecodable.lock();
        if undecodable.contains(&marker_name(path))
            || undecodable.contains(path.to_string_lossy().as_ref())
        {
            return Err(PlatformError::Decode {
                path: path.to_path_buf(),
                reason: "simulated decode failure".to_string(),
            });
        }
        Ok(GrayImage::new(64, 48))
    }
}

// ============================================================================
// Media
// ============================================================================

type SharedCallback = Arc<dyn Fn() + Send + Sync>;

struct MediaState {
    next_id: u64,
    live_players: HashMap<u64, PathBuf>,
    subscriptions: HashMap<u64, (PathBuf, SharedCallback)>,
    opened: usize,
    plays: usize,
    pauses: usize,
    seeks: usize,
    probes: usize,
    metadata: HashMap<PathBuf, VideoMetadata>,
    failing_opens: HashSet<PathBuf>,
    failing_probes: HashSet<PathBuf>,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            next_id: 1,
            live_players: HashMap::new(),
            subscriptions: HashMap::new(),
            opened: 0,
            plays: 0,
            pauses: 0,
            seeks: 0,
            probes: 0,
            metadata: HashMap::new(),
            failing_opens: HashSet::new(),
            failing_probes: HashSet::new(),
        }
    }
}

/// Media backend with live player and subscription counts
#[derive(Clone, Default)]
pub struct SimulatedMedia {
    state: Arc<Mutex<MediaState>>,
}

impl SimulatedMedia {
    /// Landscape 1920x1080, upright
    pub const DEFAULT_METADATA: VideoMetadata = VideoMetadata {
        natural_size: Vec2::new(1920.0, 1080.0),
        transform: VideoTransform::IDENTITY,
    };

    pub fn set_metadata(&self, source: impl Into<PathBuf>, metadata: VideoMetadata) {
        self.state.lock().metadata.insert(source.into(), metadata);
    }

    pub fn fail_open(&self, source: impl Into<PathBuf>) {
        self.state.lock().failing_opens.insert(source.into());
    }

    pub fn fail_probe(&self, source: impl Into<PathBuf>) {
        self.state.lock().failing_probes.insert(source.into());
    }

    pub fn live_players(&self) -> usize {
        self.state.lock().live_players.len()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    pub fn plays(&self) -> usize {
        self.state.lock().plays
    }

    pub fn pauses(&self) -> usize {
        self.state.lock().pauses
    }

    pub fn seeks(&self) -> usize {
        self.state.lock().seeks
    }

    pub fn probes(&self) -> usize {
        self.state.lock().probes
    }

    /// Fire end-of-media for every subscription on `source`; returns how many fired
    pub fn finish_playback(&self, source: &Path) -> usize {
        let callbacks: Vec<SharedCallback> = self
            .state
            .lock()
            .subscriptions
            .values()
            .filter(|(path, _)| path == source)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        // Invoke without holding the lock; callbacks may call back into the backend
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }
}

impl MediaBackend for SimulatedMedia {
    fn open(&self, source: &Path) -> Result<Box<dyn PlaybackHandle>, PlatformError> {
        let mut state = self.state.lock();
        if state.failing_opens.contains(source) {
            return Err(PlatformError::MediaOpen {
                path: source.to_path_buf(),
                reason: "simulated open failure".to_string(),
            });
        }
        let id = state.next_id;
        state.next_id += 1;
        state.opened += 1;
        state.live_players.insert(id, source.to_path_buf());
        Ok(Box::new(SimulatedPlayer {
            id,
            source: source.to_path_buf(),
            state: Arc::clone(&self.state),
        }))
    }

    fn probe(&self, source: &Path) -> Result<VideoMetadata, PlatformError> {
        let mut state = self.state.lock();
        state.probes += 1;
        if state.failing_probes.contains(source) {
            return Err(PlatformError::Metadata {
                path: source.to_path_buf(),
                reason: "simulated probe failure".to_string(),
            });
        }
        Ok(state
            .metadata
            .get(source)
            .copied()
            .unwrap_or(Self::DEFAULT_METADATA))
    }
}

struct SimulatedPlayer {
    id: u64,
    source: PathBuf,
    state: Arc<Mutex<MediaState>>,
}

impl PlaybackHandle for SimulatedPlayer {
    fn play(&mut self) {
        self.state.lock().plays += 1;
    }

    fn pause(&mut self) {
        self.state.lock().pauses += 1;
    }

    fn seek_to_start(&mut self) {
        self.state.lock().seeks += 1;
    }

    fn on_end_of_media(&mut self, callback: EndOfMediaCallback) -> Subscription {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .subscriptions
            .insert(id, (self.source.clone(), Arc::from(callback)));

        let shared = Arc::clone(&self.state);
        Subscription::new(move || {
            shared.lock().subscriptions.remove(&id);
        })
    }

    fn release(self: Box<Self>) {
        self.state.lock().live_players.remove(&self.id);
    }
}

// ============================================================================
// Scene graph
// ============================================================================

#[derive(Default)]
struct SceneState {
    next_id: NodeId,
    nodes: HashMap<NodeId, OverlayNode>,
    attached: usize,
    detached: usize,
    reject_next: bool,
}

/// Scene graph keeping attached nodes in a map
#[derive(Clone, Default)]
pub struct SimulatedScene {
    state: Arc<Mutex<SceneState>>,
}

impl SimulatedScene {
    pub fn live_nodes(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn attached(&self) -> usize {
        self.state.lock().attached
    }

    pub fn detached(&self) -> usize {
        self.state.lock().detached
    }

    pub fn node(&self, id: NodeId) -> Option<OverlayNode> {
        self.state.lock().nodes.get(&id).cloned()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.state.lock().nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Make the next `attach` fail
    pub fn reject_next_attach(&self) {
        self.state.lock().reject_next = true;
    }
}

impl SceneGraph for SimulatedScene {
    fn attach(&mut self, node: &OverlayNode) -> Result<NodeId, PlatformError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.reject_next) {
            return Err(PlatformError::Scene("simulated attach failure".to_string()));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.attached += 1;
        state.nodes.insert(id, node.clone());
        Ok(id)
    }

    fn update_placement(&mut self, node: NodeId, placement: &Placement, local_transform: Mat4) {
        if let Some(entry) = self.state.lock().nodes.get_mut(&node) {
            entry.placement = *placement;
            entry.local_transform = local_transform;
        }
    }

    fn set_opacity(&mut self, node: NodeId, opacity: f32) {
        if let Some(entry) = self.state.lock().nodes.get_mut(&node) {
            entry.opacity = opacity;
        }
    }

    fn detach(&mut self, node: NodeId) {
        let mut state = self.state.lock();
        if state.nodes.remove(&node).is_some() {
            state.detached += 1;
        }
    }
}

// ============================================================================
// Device capabilities and prompts
// ============================================================================

#[derive(Clone, Default)]
pub struct SimulatedDisplay {
    idle_timer_disabled: Arc<Mutex<bool>>,
}

impl SimulatedDisplay {
    pub fn idle_timer_disabled(&self) -> bool {
        *self.idle_timer_disabled.lock()
    }
}

impl DisplayControl for SimulatedDisplay {
    fn set_idle_timer_disabled(&mut self, disabled: bool) {
        *self.idle_timer_disabled.lock() = disabled;
    }
}

#[derive(Default)]
struct TorchState {
    on: bool,
    unavailable: bool,
}

#[derive(Clone, Default)]
pub struct SimulatedTorch {
    state: Arc<Mutex<TorchState>>,
}

impl SimulatedTorch {
    pub fn is_on(&self) -> bool {
        self.state.lock().on
    }

    /// Simulate a device without a torch
    pub fn set_unavailable(&self) {
        self.state.lock().unavailable = true;
    }
}

impl Torch for SimulatedTorch {
    fn set_torch(&mut self, on: bool) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(PlatformError::Torch("no torch on this device".to_string()));
        }
        state.on = on;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SimulatedPrompt {
    messages: Arc<Mutex<Vec<String>>>,
}

impl SimulatedPrompt {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl UserPrompt for SimulatedPrompt {
    fn offer_restart(&mut self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Handles to every simulated collaborator
#[derive(Clone, Default)]
pub struct SimulatedPlatform {
    pub session: SimulatedSession,
    pub loader: SimulatedLoader,
    pub media: SimulatedMedia,
    pub scene: SimulatedScene,
    pub display: SimulatedDisplay,
    pub torch: SimulatedTorch,
    pub prompt: SimulatedPrompt,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborators sharing state with these handles
    pub fn platform(&self) -> Platform {
        Platform {
            session: Box::new(self.session.clone()),
            loader: Arc::new(self.loader.clone()),
            media: Arc::new(self.media.clone()),
            scene: Box::new(self.scene.clone()),
            display: Box::new(self.display.clone()),
            torch: Box::new(self.torch.clone()),
            prompt: Box::new(self.prompt.clone()),
        }
    }
}
