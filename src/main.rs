//! AR Video Overlay - Replay Entry Point
//!
//! Runs a recognition controller over the simulated platform and replays a
//! scripted sequence of session and anchor events, printing every host event
//! as a JSON line.
//!
//! Usage: ar-video-overlay <params.json> [script.json]

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use ar_video_overlay::orientation::VideoTransform;
use ar_video_overlay::platform::simulated::SimulatedPlatform;
use ar_video_overlay::platform::{AnchorId, VideoMetadata};
use ar_video_overlay::telemetry::{init_logging, LogConfig};
use ar_video_overlay::{
    ArController, ControllerSettings, OverlayError, PlatformError, SessionAnchor, TrackedAnchor,
};
use glam::Vec2;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// One scripted step
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
enum Step {
    Start,
    Reset,
    Pause,
    Interrupt,
    Fail {
        reason: String,
    },
    /// Recognize a marker; `anchor` names the anchor for later steps
    Detect {
        marker: String,
        anchor: Option<String>,
        #[serde(default)]
        size: Option<[f32; 2]>,
    },
    Remove {
        anchor: String,
    },
    /// Tap the overlay showing `marker`
    Tap {
        marker: String,
    },
    /// Fire end-of-media for a video
    Finish {
        video: String,
    },
    /// Set the metadata a video reports when probed
    Metadata {
        video: String,
        width: f32,
        height: f32,
        transform: VideoTransform,
    },
    Command {
        method: String,
        #[serde(default)]
        arguments: Value,
    },
    Tick {
        ms: u64,
    },
    Wait {
        ms: u64,
    },
    Snapshot,
}

/// Played when no script is given
fn default_script(settings: &ControllerSettings) -> Vec<Step> {
    let mut steps = vec![Step::Start];
    let markers: Vec<String> = settings
        .reference_image_names
        .iter()
        .map(|path| ar_video_overlay::media::marker_name(path))
        .collect();
    for marker in &markers {
        steps.push(Step::Detect {
            marker: marker.clone(),
            anchor: None,
            size: None,
        });
    }
    steps.push(Step::Tick { ms: 1_000 });
    if let Some(marker) = markers.first() {
        steps.push(Step::Tap {
            marker: marker.clone(),
        });
    }
    steps.push(Step::Snapshot);
    steps.push(Step::Pause);
    steps
}

fn load_script(path: &Path) -> Result<Vec<Step>, OverlayError> {
    let contents = fs::read_to_string(path).map_err(|source| OverlayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}

async fn replay(settings: ControllerSettings, steps: Vec<Step>) -> Result<(), OverlayError> {
    let sim = SimulatedPlatform::new();
    let controller = ArController::spawn(settings, sim.platform());
    let scene = controller.handle();

    let mut events = controller.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_json(&event),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Event output lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let origin = Instant::now();
    let mut anchors: HashMap<String, AnchorId> = HashMap::new();

    for step in steps {
        tracing::debug!(?step, "Replaying step");
        match step {
            Step::Start => controller.start()?,
            Step::Reset => controller.reset_tracking()?,
            Step::Pause => controller.pause()?,
            Step::Interrupt => scene.interrupted()?,
            Step::Fail { reason } => scene.session_failed(PlatformError::Session(reason))?,
            Step::Detect {
                marker,
                anchor,
                size,
            } => {
                let label = anchor.unwrap_or_else(|| marker.clone());
                let anchor_id = *anchors.entry(label).or_insert_with(Uuid::new_v4);
                let [width, height] = size.unwrap_or([0.5, 0.5]);
                let mut tracked = TrackedAnchor::new(marker, Vec2::new(width, height));
                tracked.anchor_id = anchor_id;
                scene.anchor_added(SessionAnchor::Image(tracked))?;
            }
            Step::Remove { anchor } => match anchors.get(&anchor) {
                Some(anchor_id) => scene.anchor_removed(*anchor_id)?,
                None => tracing::warn!(anchor, "Unknown anchor in script"),
            },
            Step::Tap { marker } => {
                let snapshot = controller.snapshot().await?;
                let hits: Vec<_> = snapshot
                    .overlays
                    .iter()
                    .filter(|overlay| overlay.marker == marker)
                    .map(|overlay| overlay.node)
                    .collect();
                scene.tap(hits)?;
            }
            Step::Finish { video } => {
                sim.media.finish_playback(Path::new(&video));
            }
            Step::Metadata {
                video,
                width,
                height,
                transform,
            } => sim.media.set_metadata(
                video,
                VideoMetadata {
                    natural_size: Vec2::new(width, height),
                    transform,
                },
            ),
            Step::Command { method, arguments } => {
                let response = controller.handle_command(method, arguments).await?;
                print_json(&serde_json::json!({ "response": response }));
            }
            Step::Tick { ms } => scene.tick(origin + Duration::from_millis(ms))?,
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
            Step::Snapshot => {
                let snapshot = controller.settled().await?;
                print_json(&serde_json::json!({ "snapshot": snapshot }));
            }
        }
        // Let configuration passes land before the next step
        controller.settled().await?;
    }

    controller.teardown().await?;
    if let Err(e) = printer.await {
        tracing::error!("Event printer failed: {}", e);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let log_config = LogConfig::default();
    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <params.json> [script.json]", args[0]);
        std::process::exit(1);
    }

    let settings = match ControllerSettings::load_from_file(Path::new(&args[1])) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load creation params: {}", e);
            std::process::exit(1);
        }
    };

    let steps = match args.get(2) {
        Some(script) => match load_script(Path::new(script)) {
            Ok(steps) => steps,
            Err(e) => {
                eprintln!("Failed to load script: {}", e);
                std::process::exit(1);
            }
        },
        None => default_script(&settings),
    };

    tracing::info!(steps = steps.len(), "Replaying recognition script");

    if let Err(e) = replay(settings, steps).await {
        eprintln!("Replay failed: {}", e);
        std::process::exit(1);
    }
}
