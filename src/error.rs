// error.rs — 错误类型

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading or validating a tour description.
#[derive(Debug, Error)]
pub enum TourError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tour json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tour contains no scenes")]
    EmptyTour,

    #[error("duplicate scene id `{0}`")]
    DuplicateScene(String),

    #[error("scene id must not be empty (scene #{0})")]
    EmptySceneId(usize),
}

/// Failures reported by the platform collaborators (motion sensors,
/// fullscreen, orientation lock). None of these are fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("permission for {0} was denied")]
    Denied(&'static str),

    #[error("{0}")]
    Other(String),
}
