use std::path::PathBuf;

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The gallery-dl executable is not on PATH
    #[error("gallery-dl not found. Install it with `pip install gallery-dl`.")]
    GalleryDlNotFound,

    /// Any other spawn-time failure
    #[error("failed to start gallery-dl: {reason}")]
    Spawn { reason: String },

    /// Cookie file could not be parsed
    #[error("invalid cookie JSON in {}: {source}", path.display())]
    CookieParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
