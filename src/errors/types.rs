//! Error type definitions for the memegen plugin.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level plugin error type.
///
/// Rolls up the per-component taxonomies so the orchestration layer can report
/// any pipeline failure to the requesting user with a single match.
#[derive(Error, Debug)]
pub enum PluginError {
    /// No avatar URL could be resolved for an identity
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Avatar download failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cache store operation failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Meme rendering failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Configuration error (fatal at startup)
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Avatar URL resolution failure.
///
/// Individual strategy failures are logged and non-fatal; this error is
/// produced only when every strategy has been exhausted.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("no avatar URL found for {identity}")]
    NotFound { identity: String },
}

/// Avatar download failure. The cache is left unchanged in every case.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport error or timeout; no partial file is left behind
    #[error("network error fetching avatar: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status from the avatar host
    #[error("avatar host returned HTTP {status}")]
    BadStatus { status: u16 },

    /// Downloaded payload too small to be a real image
    #[error("avatar payload invalid: {size} bytes")]
    InvalidPayload { size: usize },

    /// Committing the validated payload to the store failed
    #[error(transparent)]
    Store(#[from] CacheError),
}

/// Cache store failure.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Identity would escape the cache directory or is not a usable file name
    #[error("invalid identity {identity:?}: {reason}")]
    InvalidIdentity { identity: String, reason: String },

    #[error("failed to serialize metadata for {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Meme rendering failure. Reported to the user-facing layer, never dropped.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown meme type: {meme_type}")]
    UnknownMemeType { meme_type: String },

    #[error("rendering {meme_type} failed: {message}")]
    Failed { meme_type: String, message: String },
}

/// Configuration failure, fatal at startup.
///
/// The plugin constructs itself disabled rather than crashing the host.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },

    #[error("failed to read emoji config {path:?}: {source}")]
    EmojiRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse emoji config {path:?}: {source}")]
    EmojiParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl RenderError {
    pub fn failed<M: Into<String>>(meme_type: &str, message: M) -> Self {
        Self::Failed {
            meme_type: meme_type.to_string(),
            message: message.into(),
        }
    }
}
