//! Crate-level error type
//!
//! Pipeline failures (undecodable markers, missing media, metadata probes)
//! degrade in place and never surface here. This type covers the few things a
//! host can actually get wrong: creation params and a controller that has
//! already shut down.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    /// Reading a settings or script file failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Creation params were not valid JSON for the expected shape
    #[error("Invalid creation params: {0}")]
    InvalidParams(#[from] serde_json::Error),

    /// The scene-update context has stopped accepting work
    #[error("Scene context has shut down")]
    ContextClosed,
}
