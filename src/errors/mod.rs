//! Error types for the memegen plugin.
//!
//! Every collaborator call is wrapped: failures are logged and converted into
//! one of these typed outcomes rather than allowed to propagate as panics past
//! component boundaries. User-visible failures become plain-text replies.

mod types;

pub use types::{CacheError, ConfigError, FetchError, PluginError, RenderError, ResolutionError};

/// Result type for plugin-level operations.
pub type Result<T> = std::result::Result<T, PluginError>;
