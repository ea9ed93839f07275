//! Recognition controller
//!
//! [`ArController`] is the host-facing handle. All session commands, anchor
//! callbacks and background completions are funneled into a single tokio task
//! (the scene-update loop), which is the only place the tracking session and
//! the overlay nodes are mutated.
//!
//! Background work (marker decoding, video metadata probes) runs on the
//! blocking pool and re-enters the loop as a [`SceneCommand`]. Background
//! tasks only hold weak senders, so they never keep a torn-down loop alive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::bridge::{CommandResponse, EventBridge, HostCommand, HostEvent};
use crate::capability::{IdleTimerLock, TorchControl};
use crate::error::OverlayError;
use crate::media::MediaRegistry;
use crate::overlay::{OverlayManager, OverlaySnapshot, SurfaceKey};
use crate::platform::{
    AnchorId, MarkerImageLoader, MediaBackend, NodeId, Platform, PlatformError, SessionAnchor,
    UserPrompt, VideoMetadata,
};
use crate::session::{
    build_configuration, ConfigurationReport, InterruptionOutcome, RecognitionEvent, ResetOutcome,
    ResetReason, ResetTicket, SessionState, TrackingSessionManager,
};
use crate::settings::ControllerSettings;

/// Message shown when the session fails
const SESSION_FAILED_MESSAGE: &str = "Image recognition stopped unexpectedly. Restart?";

/// Poll interval while waiting for a configuration pass to land
const SETTLE_POLL: Duration = Duration::from_millis(1);

/// Work executed on the scene-update loop
#[derive(Debug)]
pub enum SceneCommand {
    // Host lifecycle
    Start,
    ResetTracking,
    Pause,
    Command {
        method: String,
        arguments: Value,
        reply: oneshot::Sender<CommandResponse>,
    },
    Snapshot(oneshot::Sender<ControllerSnapshot>),
    Teardown(Option<oneshot::Sender<()>>),

    // Tracking subsystem callbacks
    Interruption,
    SessionFailed(PlatformError),
    AnchorAdded(SessionAnchor),
    AnchorRemoved(AnchorId),
    Tap(Vec<NodeId>),
    Tick(Instant),

    // Background completions
    ConfigurationReady {
        ticket: ResetTicket,
        report: ConfigurationReport,
    },
    MetadataReady {
        key: SurfaceKey,
        metadata: Result<VideoMetadata, PlatformError>,
    },
    PlaybackEnded(SurfaceKey),
    CooldownElapsed {
        epoch: u64,
    },
}

/// Diagnostic view of a controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSnapshot {
    pub state: SessionState,
    pub cooling_down: bool,
    pub idle_timer_disabled: bool,
    pub torch_on: bool,
    pub overlays: Vec<OverlaySnapshot>,
}

// ============================================================================
// Host handle
// ============================================================================

/// Controller for one recognition view
///
/// Dropping the controller tears the session down.
pub struct ArController {
    tx: mpsc::UnboundedSender<SceneCommand>,
    events: EventBridge,
    task: Option<JoinHandle<()>>,
}

impl ArController {
    /// Build the pipeline and start the scene-update loop
    ///
    /// Must be called from within a tokio runtime. Recognition does not start
    /// until [`start`](Self::start).
    pub fn spawn(settings: ControllerSettings, platform: Platform) -> Self {
        let settings = settings.validated();
        let (tx, rx) = mpsc::unbounded_channel();
        let events = EventBridge::new();
        let scene_loop = SceneLoop::new(&settings, platform, events.clone(), tx.downgrade());

        tracing::info!(
            markers = scene_loop.registry.len(),
            explicit_mapping = settings.uses_explicit_mapping(),
            max_tracked = settings.max_tracked_images,
            "Recognition controller created"
        );

        let task = tokio::spawn(scene_loop.run(rx));
        Self {
            tx,
            events,
            task: Some(task),
        }
    }

    /// Receive host events
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    /// Handle for renderer and session callbacks
    pub fn handle(&self) -> SceneHandle {
        SceneHandle {
            tx: self.tx.clone(),
        }
    }

    /// Start recognition when the view appears
    pub fn start(&self) -> Result<(), OverlayError> {
        self.send(SceneCommand::Start)
    }

    /// Rebuild the configuration and restart the session
    ///
    /// Ignored while a configuration pass is already in flight.
    pub fn reset_tracking(&self) -> Result<(), OverlayError> {
        self.send(SceneCommand::ResetTracking)
    }

    /// Stop recognition when the view disappears
    pub fn pause(&self) -> Result<(), OverlayError> {
        self.send(SceneCommand::Pause)
    }

    /// Execute a host method call
    pub async fn handle_command(
        &self,
        method: impl Into<String>,
        arguments: Value,
    ) -> Result<CommandResponse, OverlayError> {
        let (reply, response) = oneshot::channel();
        self.send(SceneCommand::Command {
            method: method.into(),
            arguments,
            reply,
        })?;
        response.await.map_err(|_| OverlayError::ContextClosed)
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot, OverlayError> {
        let (reply, response) = oneshot::channel();
        self.send(SceneCommand::Snapshot(reply))?;
        response.await.map_err(|_| OverlayError::ContextClosed)
    }

    /// Wait until no configuration pass is in flight
    pub async fn settled(&self) -> Result<ControllerSnapshot, OverlayError> {
        loop {
            let snapshot = self.snapshot().await?;
            if !snapshot.state.is_configuring() {
                return Ok(snapshot);
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    /// Tear everything down and wait for the loop to finish
    pub async fn teardown(mut self) -> Result<(), OverlayError> {
        let (reply, done) = oneshot::channel();
        self.send(SceneCommand::Teardown(Some(reply)))?;
        done.await.map_err(|_| OverlayError::ContextClosed)?;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Scene loop task failed: {}", e);
            }
        }
        Ok(())
    }

    fn send(&self, command: SceneCommand) -> Result<(), OverlayError> {
        self.tx.send(command).map_err(|_| OverlayError::ContextClosed)
    }
}

impl Drop for ArController {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.tx.send(SceneCommand::Teardown(None));
        }
    }
}

/// Clonable sender for callbacks from the tracking subsystem and renderer
#[derive(Debug, Clone)]
pub struct SceneHandle {
    tx: mpsc::UnboundedSender<SceneCommand>,
}

impl SceneHandle {
    pub fn anchor_added(&self, anchor: SessionAnchor) -> Result<(), OverlayError> {
        self.send(SceneCommand::AnchorAdded(anchor))
    }

    pub fn anchor_removed(&self, anchor_id: AnchorId) -> Result<(), OverlayError> {
        self.send(SceneCommand::AnchorRemoved(anchor_id))
    }

    /// The session was interrupted and should be restarted
    pub fn interrupted(&self) -> Result<(), OverlayError> {
        self.send(SceneCommand::Interruption)
    }

    pub fn session_failed(&self, error: PlatformError) -> Result<(), OverlayError> {
        self.send(SceneCommand::SessionFailed(error))
    }

    /// A tap hit these scene nodes, nearest first
    pub fn tap(&self, hits: Vec<NodeId>) -> Result<(), OverlayError> {
        self.send(SceneCommand::Tap(hits))
    }

    /// Per-frame update
    pub fn tick(&self, now: Instant) -> Result<(), OverlayError> {
        self.send(SceneCommand::Tick(now))
    }

    fn send(&self, command: SceneCommand) -> Result<(), OverlayError> {
        self.tx.send(command).map_err(|_| OverlayError::ContextClosed)
    }
}

// ============================================================================
// Scene-update loop
// ============================================================================

struct SceneLoop {
    session: TrackingSessionManager,
    overlays: OverlayManager,
    registry: Arc<MediaRegistry>,
    loader: Arc<dyn MarkerImageLoader>,
    media: Arc<dyn MediaBackend>,
    events: EventBridge,
    idle_timer: IdleTimerLock,
    torch: TorchControl,
    prompt: Box<dyn UserPrompt>,
    tx: mpsc::WeakUnboundedSender<SceneCommand>,
}

impl SceneLoop {
    fn new(
        settings: &ControllerSettings,
        platform: Platform,
        events: EventBridge,
        tx: mpsc::WeakUnboundedSender<SceneCommand>,
    ) -> Self {
        let Platform {
            session,
            loader,
            media,
            scene,
            display,
            torch,
            prompt,
        } = platform;

        let registry = Arc::new(MediaRegistry::from_settings(settings));

        let end_tx = tx.clone();
        let overlays = OverlayManager::new(
            Arc::clone(&registry),
            Arc::clone(&media),
            scene,
            Arc::new(move |key: SurfaceKey| {
                if let Some(tx) = end_tx.upgrade() {
                    let _ = tx.send(SceneCommand::PlaybackEnded(key));
                }
            }),
            settings.fade_in(),
        );

        Self {
            session: TrackingSessionManager::new(
                session,
                settings.max_tracked_images,
                settings.restart_cooldown(),
            ),
            overlays,
            registry,
            loader,
            media,
            events,
            idle_timer: IdleTimerLock::new(display),
            torch: TorchControl::new(torch),
            prompt,
            tx,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SceneCommand>) {
        while let Some(command) = rx.recv().await {
            if let SceneCommand::Teardown(reply) = command {
                self.teardown();
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                return;
            }
            self.dispatch(command);
        }
        // Every handle is gone
        self.teardown();
    }

    fn dispatch(&mut self, command: SceneCommand) {
        match command {
            SceneCommand::Start | SceneCommand::ResetTracking => {
                self.reset(ResetReason::Requested)
            }
            SceneCommand::Pause => self.pause(),
            SceneCommand::Command {
                method,
                arguments,
                reply,
            } => {
                let response = self.execute(&method, &arguments);
                let _ = reply.send(response);
            }
            SceneCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SceneCommand::Teardown(_) => {}
            SceneCommand::Interruption => self.interruption(),
            SceneCommand::SessionFailed(error) => {
                if self.session.state() == SessionState::Idle {
                    tracing::debug!("Ignoring session failure while idle: {}", error);
                } else {
                    self.session.handle_failure(&error);
                    self.fail(&error);
                }
            }
            SceneCommand::AnchorAdded(anchor) => self.anchor_added(anchor),
            SceneCommand::AnchorRemoved(anchor_id) => {
                self.overlays.on_anchor_removed(anchor_id);
            }
            SceneCommand::Tap(_) if self.session.state() != SessionState::Running => {
                tracing::debug!(state = %self.session.state(), "Ignoring tap outside a running session");
            }
            SceneCommand::Tap(hits) => {
                if let Some(image_name) = self.overlays.image_for_hits(&hits) {
                    let image_name = image_name.to_string();
                    self.events.emit(HostEvent::ImageTapped { image_name });
                }
            }
            SceneCommand::Tick(now) => self.overlays.tick(now),
            SceneCommand::ConfigurationReady { ticket, report } => {
                self.configuration_ready(ticket, report)
            }
            SceneCommand::MetadataReady { key, metadata } => {
                self.overlays.apply_metadata(key, metadata);
            }
            SceneCommand::PlaybackEnded(key) => {
                self.overlays.on_playback_ended(key);
            }
            SceneCommand::CooldownElapsed { epoch } => self.session.cooldown_elapsed(epoch),
        }
    }

    fn reset(&mut self, reason: ResetReason) {
        if let Some(ticket) = self.session.begin_reset(reason) {
            self.spawn_configuration(ticket);
        }
    }

    fn spawn_configuration(&self, ticket: ResetTicket) {
        let registry = Arc::clone(&self.registry);
        let loader = Arc::clone(&self.loader);
        let max_tracked_images = self.session.max_tracked_images();
        let tx = self.tx.clone();

        tokio::task::spawn_blocking(move || {
            let report = build_configuration(&registry, loader.as_ref(), max_tracked_images);
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SceneCommand::ConfigurationReady { ticket, report });
            }
        });
    }

    fn configuration_ready(&mut self, ticket: ResetTicket, report: ConfigurationReport) {
        match self.session.finish_reset(ticket, &report.configuration) {
            Ok(ResetOutcome::Stale) => {}
            Ok(ResetOutcome::Applied(event)) => {
                // The session was run with remove-existing-anchors
                self.overlays.on_session_teardown();
                self.idle_timer.acquire();
                if let Some(event) = event {
                    self.emit_recognition(event);
                }
            }
            Err(error) => self.fail(&error),
        }
    }

    fn pause(&mut self) {
        let event = self.session.pause();
        self.overlays.pause_playback();
        self.idle_timer.release();
        if let Some(event) = event {
            self.emit_recognition(event);
        }
    }

    fn interruption(&mut self) {
        match self.session.handle_interruption() {
            InterruptionOutcome::Restart {
                ticket,
                cooldown_epoch,
            } => {
                tracing::info!("Restarting interrupted session");
                self.spawn_cooldown(cooldown_epoch);
                self.spawn_configuration(ticket);
            }
            InterruptionOutcome::Suppressed | InterruptionOutcome::Ignored => {}
        }
    }

    fn spawn_cooldown(&self, epoch: u64) {
        let window = self.session.cooldown_window();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SceneCommand::CooldownElapsed { epoch });
            }
        });
    }

    /// Surface a session failure; restarting is left to the user
    fn fail(&mut self, error: &PlatformError) {
        self.overlays.on_session_teardown();
        self.idle_timer.release();
        tracing::warn!("Offering restart after session failure: {}", error);
        self.prompt.offer_restart(SESSION_FAILED_MESSAGE);
    }

    fn anchor_added(&mut self, anchor: SessionAnchor) {
        let anchor = match anchor {
            SessionAnchor::Image(anchor) => anchor,
            other => {
                tracing::trace!(anchor = %other.anchor_id(), "Ignoring non-image anchor");
                return;
            }
        };
        if self.session.state() != SessionState::Running {
            tracing::debug!(
                marker = %anchor.marker_id,
                state = %self.session.state(),
                "Ignoring detection outside a running session"
            );
            return;
        }

        let Some(added) = self.overlays.on_anchor_added(&anchor, Instant::now()) else {
            return;
        };
        self.events.emit(HostEvent::ImageDetected {
            image_name: added.image_name,
        });

        let media = Arc::clone(&self.media);
        let tx = self.tx.clone();
        let key = added.key;
        let source = added.video_source;
        tokio::task::spawn_blocking(move || {
            let metadata = media.probe(&source);
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SceneCommand::MetadataReady { key, metadata });
            }
        });
    }

    fn execute(&mut self, method: &str, arguments: &Value) -> CommandResponse {
        let command = match HostCommand::parse(method, arguments) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(method, "Rejected host command: {}", e);
                return e.into();
            }
        };

        match command {
            HostCommand::ToggleFlashlight { should_turn_on } => {
                match self.torch.set(should_turn_on) {
                    Ok(()) => CommandResponse::Ack,
                    Err(e) => {
                        tracing::warn!("Failed to toggle torch: {}", e);
                        CommandResponse::error("torch_unavailable", e.to_string())
                    }
                }
            }
        }
    }

    fn emit_recognition(&self, event: RecognitionEvent) {
        let event = match event {
            RecognitionEvent::Started => HostEvent::RecognitionStarted,
            RecognitionEvent::Paused => HostEvent::RecognitionPaused,
            RecognitionEvent::Resumed => HostEvent::RecognitionResumed,
        };
        self.events.emit(event);
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.session.state(),
            cooling_down: self.session.is_cooling_down(),
            idle_timer_disabled: self.idle_timer.is_held(),
            torch_on: self.torch.is_on(),
            overlays: self.overlays.snapshot(),
        }
    }

    fn teardown(&mut self) {
        self.session.teardown();
        self.overlays.on_session_teardown();
        self.idle_timer.release();
        self.torch.release();
        tracing::info!("Recognition controller torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::{Rotation, VideoTransform};
    use crate::platform::simulated::SimulatedPlatform;
    use crate::platform::TrackedAnchor;
    use glam::Vec2;
    use serde_json::json;
    use std::path::PathBuf;

    fn settings(markers: &[&str], videos: &[&str]) -> ControllerSettings {
        ControllerSettings::new(markers.iter().copied(), videos.iter().copied())
    }

    fn controller(markers: &[&str], videos: &[&str]) -> (ArController, SimulatedPlatform) {
        let sim = SimulatedPlatform::new();
        let controller = ArController::spawn(settings(markers, videos), sim.platform());
        (controller, sim)
    }

    fn drain(rx: &mut broadcast::Receiver<HostEvent>) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn image(marker: &str) -> TrackedAnchor {
        TrackedAnchor::new(marker, Vec2::new(0.5, 0.25))
    }

    /// Poll until `check` holds, yielding to background work in between
    async fn eventually(controller: &ArController, check: impl Fn(&ControllerSnapshot) -> bool) {
        for _ in 0..1000 {
            let snapshot = controller.snapshot().await.unwrap();
            if check(&snapshot) {
                return;
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn test_start_emits_started_once() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();

        controller.start().unwrap();
        let snapshot = controller.settled().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Running);
        assert!(snapshot.idle_timer_disabled);
        assert_eq!(sim.session.active_markers(), vec!["a.png".to_string()]);
        assert_eq!(sim.session.max_tracked_images(), 5);

        controller.reset_tracking().unwrap();
        controller.settled().await.unwrap();
        assert_eq!(sim.session.run_count(), 2);
        assert_eq!(drain(&mut rx), vec![HostEvent::RecognitionStarted]);
    }

    #[tokio::test]
    async fn test_rapid_resets_apply_once() {
        let (controller, sim) = controller(&["a.png", "b.png"], &["a.mp4", "b.mp4"]);
        controller.reset_tracking().unwrap();
        controller.reset_tracking().unwrap();
        controller.settled().await.unwrap();
        assert_eq!(sim.session.run_count(), 1);
    }

    #[tokio::test]
    async fn test_pause_and_resume_events() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();

        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.pause().unwrap();
        let paused = controller.settled().await.unwrap();
        assert_eq!(paused.state, SessionState::Idle);
        assert!(!paused.idle_timer_disabled);
        assert!(!sim.display.idle_timer_disabled());

        controller.reset_tracking().unwrap();
        controller.settled().await.unwrap();
        controller.reset_tracking().unwrap();
        controller.settled().await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                HostEvent::RecognitionStarted,
                HostEvent::RecognitionPaused,
                HostEvent::RecognitionResumed,
            ]
        );
    }

    #[tokio::test]
    async fn test_pause_before_start_is_silent() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();
        controller.pause().unwrap();
        controller.settled().await.unwrap();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(sim.session.pause_count(), 0);
    }

    #[tokio::test]
    async fn test_pause_during_configuration_discards_it() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.pause().unwrap();
        let snapshot = controller.settled().await.unwrap();
        // Give the configuration pass time to come back
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.snapshot().await.unwrap().state, SessionState::Idle);
        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(sim.session.run_count(), 0);
    }

    #[tokio::test]
    async fn test_detect_remove_detect() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();
        let scene = controller.handle();

        controller.start().unwrap();
        controller.settled().await.unwrap();

        let anchor = image("a.png");
        scene.anchor_added(SessionAnchor::Image(anchor.clone())).unwrap();
        let first = controller.snapshot().await.unwrap().overlays[0].generation;
        scene.anchor_removed(anchor.anchor_id).unwrap();
        scene.anchor_added(SessionAnchor::Image(anchor.clone())).unwrap();

        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.overlays.len(), 1);
        assert!(snapshot.overlays[0].generation > first);
        assert_eq!(sim.media.opened(), 2);
        assert_eq!(sim.media.live_players(), 1);
        assert_eq!(sim.media.live_subscriptions(), 1);

        let detected = HostEvent::ImageDetected {
            image_name: "a.png".into(),
        };
        assert_eq!(
            drain(&mut rx),
            vec![HostEvent::RecognitionStarted, detected.clone(), detected]
        );
    }

    #[tokio::test]
    async fn test_detection_without_media() {
        let (controller, sim) = controller(&["a.png", "b.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();
        let scene = controller.handle();

        controller.start().unwrap();
        controller.settled().await.unwrap();
        scene.anchor_added(SessionAnchor::Image(image("b.png"))).unwrap();

        let snapshot = controller.snapshot().await.unwrap();
        assert!(snapshot.overlays.is_empty());
        assert_eq!(sim.media.opened(), 0);
        assert_eq!(drain(&mut rx), vec![HostEvent::RecognitionStarted]);
    }

    #[tokio::test]
    async fn test_non_image_anchor_ignored() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller
            .handle()
            .anchor_added(SessionAnchor::Plane {
                anchor_id: uuid::Uuid::new_v4(),
            })
            .unwrap();
        assert!(controller.snapshot().await.unwrap().overlays.is_empty());
        assert_eq!(sim.scene.live_nodes(), 0);
    }

    #[tokio::test]
    async fn test_detection_before_start_ignored() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.handle().anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        assert!(controller.snapshot().await.unwrap().overlays.is_empty());
        assert_eq!(sim.media.opened(), 0);
    }

    #[tokio::test]
    async fn test_metadata_orients_overlay() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        sim.media.set_metadata(
            "a.mp4",
            VideoMetadata {
                natural_size: Vec2::new(1920.0, 1080.0),
                transform: VideoTransform::ROTATE_CCW_90,
            },
        );
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.handle().anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();

        eventually(&controller, |snapshot| {
            snapshot
                .overlays
                .first()
                .is_some_and(|overlay| overlay.placement.rotation == Rotation::CounterClockwise90)
        })
        .await;
        assert_eq!(sim.media.probes(), 1);
    }

    #[tokio::test]
    async fn test_playback_loops_through_scene_loop() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.handle().anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        controller.snapshot().await.unwrap();

        assert_eq!(sim.media.finish_playback(&PathBuf::from("a.mp4")), 1);
        controller.snapshot().await.unwrap();
        assert_eq!(sim.media.seeks(), 1);
        assert_eq!(sim.media.plays(), 2);
    }

    #[tokio::test]
    async fn test_paused_view_does_not_restart_looping_video() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.handle().anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        controller.pause().unwrap();
        let paused = controller.snapshot().await.unwrap();
        assert!(paused.overlays[0].paused);
        let plays = sim.media.plays();

        assert_eq!(sim.media.finish_playback(&PathBuf::from("a.mp4")), 1);
        controller.snapshot().await.unwrap();
        assert_eq!(sim.media.seeks(), 1);
        assert_eq!(sim.media.plays(), plays);
    }

    #[tokio::test]
    async fn test_tap_emits_image_name() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();
        let scene = controller.handle();
        controller.start().unwrap();
        controller.settled().await.unwrap();
        scene.anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        controller.snapshot().await.unwrap();

        let node = sim.scene.node_ids()[0];
        scene.tap(vec![node + 100]).unwrap();
        scene.tap(vec![node]).unwrap();
        controller.snapshot().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&HostEvent::ImageTapped {
                image_name: "a.png".into()
            })
        );
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_tap_while_paused_is_ignored() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();
        let scene = controller.handle();
        controller.start().unwrap();
        controller.settled().await.unwrap();
        scene.anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        controller.pause().unwrap();
        controller.snapshot().await.unwrap();

        let node = sim.scene.node_ids()[0];
        scene.tap(vec![node]).unwrap();
        controller.snapshot().await.unwrap();

        let detected = HostEvent::ImageDetected {
            image_name: "a.png".into(),
        };
        assert_eq!(
            drain(&mut rx),
            vec![
                HostEvent::RecognitionStarted,
                detected,
                HostEvent::RecognitionPaused
            ]
        );
    }

    #[tokio::test]
    async fn test_tick_fades_in() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.handle().anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        controller.snapshot().await.unwrap();

        controller.handle().tick(Instant::now() + Duration::from_secs(1)).unwrap();
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.overlays[0].opacity, 1.0);
        assert_eq!(sim.scene.node(sim.scene.node_ids()[0]).unwrap().opacity, 1.0);
    }

    #[tokio::test]
    async fn test_reset_clears_overlays() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.handle().anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        controller.pause().unwrap();
        assert_eq!(controller.snapshot().await.unwrap().overlays.len(), 1);
        assert_eq!(sim.media.pauses(), 1);

        controller.reset_tracking().unwrap();
        let snapshot = controller.settled().await.unwrap();
        assert!(snapshot.overlays.is_empty());
        assert_eq!(sim.media.live_players(), 0);
        assert_eq!(sim.scene.live_nodes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interruption_cooldown() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let scene = controller.handle();
        controller.start().unwrap();
        controller.settled().await.unwrap();

        scene.interrupted().unwrap();
        let snapshot = controller.settled().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Running);
        assert!(snapshot.cooling_down);
        assert_eq!(sim.session.run_count(), 2);

        scene.interrupted().unwrap();
        controller.settled().await.unwrap();
        assert_eq!(sim.session.run_count(), 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!controller.snapshot().await.unwrap().cooling_down);

        scene.interrupted().unwrap();
        controller.settled().await.unwrap();
        assert_eq!(sim.session.run_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_during_cooldown() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.handle().interrupted().unwrap();
        controller.settled().await.unwrap();

        controller.pause().unwrap();
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(snapshot.cooling_down);
        assert_eq!(sim.session.pause_count(), 1);
    }

    #[tokio::test]
    async fn test_session_failure_offers_restart() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();
        sim.session.fail_next_run("camera unavailable");

        controller.start().unwrap();
        let snapshot = controller.settled().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(sim.prompt.messages().len(), 1);
        assert!(drain(&mut rx).is_empty());

        controller.reset_tracking().unwrap();
        controller.settled().await.unwrap();
        assert_eq!(drain(&mut rx), vec![HostEvent::RecognitionStarted]);
    }

    #[tokio::test]
    async fn test_runtime_failure_tears_down_overlays() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let scene = controller.handle();
        controller.start().unwrap();
        controller.settled().await.unwrap();
        scene.anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();

        scene
            .session_failed(PlatformError::Session("sensor failure".into()))
            .unwrap();
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(snapshot.overlays.is_empty());
        assert_eq!(sim.media.live_players(), 0);
        assert_eq!(sim.prompt.messages().len(), 1);
        assert_eq!(sim.session.run_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_while_paused_is_silent() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        let mut rx = controller.subscribe();
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.pause().unwrap();
        controller.settled().await.unwrap();

        controller
            .handle()
            .session_failed(PlatformError::Session("late sensor failure".into()))
            .unwrap();
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(sim.prompt.messages().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![HostEvent::RecognitionStarted, HostEvent::RecognitionPaused]
        );
    }

    #[tokio::test]
    async fn test_commands() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);

        let response = controller
            .handle_command("toggleFlashlight", json!({ "shouldTurnOn": true }))
            .await
            .unwrap();
        assert_eq!(response, CommandResponse::Ack);
        assert!(sim.torch.is_on());
        assert!(controller.snapshot().await.unwrap().torch_on);

        let response = controller.handle_command("zoom", Value::Null).await.unwrap();
        assert_eq!(
            response,
            CommandResponse::NotImplemented {
                method: "zoom".into()
            }
        );
    }

    #[tokio::test]
    async fn test_torch_unavailable_reports_error() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        sim.torch.set_unavailable();
        let response = controller
            .handle_command("toggleFlashlight", json!({ "shouldTurnOn": true }))
            .await
            .unwrap();
        assert!(matches!(response, CommandResponse::Error { .. }));
    }

    #[tokio::test]
    async fn test_teardown_releases_everything() {
        let (controller, sim) = controller(&["a.png"], &["a.mp4"]);
        controller.start().unwrap();
        controller.settled().await.unwrap();
        controller.handle().anchor_added(SessionAnchor::Image(image("a.png"))).unwrap();
        controller
            .handle_command("toggleFlashlight", json!({ "shouldTurnOn": true }))
            .await
            .unwrap();

        let scene = controller.handle();
        controller.teardown().await.unwrap();

        assert_eq!(sim.media.live_players(), 0);
        assert_eq!(sim.media.live_subscriptions(), 0);
        assert_eq!(sim.scene.live_nodes(), 0);
        assert!(!sim.torch.is_on());
        assert!(!sim.display.idle_timer_disabled());
        assert_eq!(sim.session.pause_count(), 1);
        assert!(matches!(scene.tap(Vec::new()), Err(OverlayError::ContextClosed)));
    }
}
