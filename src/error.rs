//! Error types for loading candidate lists

use std::path::PathBuf;
use thiserror::Error;

/// Failure to load the candidate list. Any of these aborts the run before
/// probing starts.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {} as a JSON proxy list: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
