//! # memegen
//!
//! Avatar-backed meme generation plugin for chat hosts.
//!
//! The crate watches incoming messages for configured trigger phrases. When a
//! trigger fires with one or two mentioned users, it resolves their avatar
//! URLs through the host transport, downloads and caches the images on disk,
//! and hands the cached files to a meme renderer. The resulting image goes
//! back out through the same transport.
//!
//! The disk cache keeps one image plus one JSON metadata sidecar per user and
//! is maintained by two retention paths: a scheduled sweep that drops stale,
//! rarely-used entries, and an admin-triggered clear that wipes everything
//! older than a short grace window.
//!
//! ## Basic usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use memegen::plugin::{IncomingMessage, MemeGenPlugin};
//! # async fn example(
//! #     transport: Arc<dyn memegen::transport::ChatTransport>,
//! #     factory: Arc<dyn memegen::meme::RenderHandleFactory>,
//! # ) -> anyhow::Result<()> {
//! let plugin = MemeGenPlugin::from_config_files(
//!     Path::new("config.toml"),
//!     Path::new("emoji.json"),
//!     transport,
//!     factory,
//!     "cache/avatars".into(),
//! )
//! .await?;
//! let _cleanup = plugin.spawn_cleanup_task();
//!
//! plugin
//!     .handle_message(&IncomingMessage {
//!         content: "举高高 @某人".into(),
//!         from: "group-1".into(),
//!         is_group: true,
//!         sender: "user-1".into(),
//!         mentions: vec!["user-2".into()],
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod avatar;
pub mod config;
pub mod emoji;
pub mod errors;
pub mod meme;
pub mod plugin;
pub mod transport;

pub use config::Config;
pub use errors::PluginError;
pub use plugin::{IncomingMessage, MemeGenPlugin};
