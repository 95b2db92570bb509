//! Meme rendering invocation.
//!
//! Rendering itself is an external collaborator; this module memoizes one
//! render handle per meme type for the process lifetime and normalizes
//! collaborator failures into [`RenderError`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::RenderError;

/// Fixed rendering options passed with every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Crop avatars to circles
    pub circle: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { circle: true }
    }
}

/// A render handle for one meme type. The collaborator may complete
/// synchronously or asynchronously; the async signature subsumes both.
#[async_trait]
pub trait MemeRender: Send + Sync {
    async fn render(
        &self,
        images: &[PathBuf],
        texts: &[String],
        options: RenderOptions,
    ) -> anyhow::Result<Vec<u8>>;
}

/// Creates render handles by meme type.
#[async_trait]
pub trait RenderHandleFactory: Send + Sync {
    async fn create(&self, meme_type: &str) -> Result<Arc<dyn MemeRender>, RenderError>;
}

/// Invokes meme rendering, caching one handle per meme type.
pub struct MemeInvoker {
    factory: Arc<dyn RenderHandleFactory>,
    handles: RwLock<HashMap<String, Arc<dyn MemeRender>>>,
}

impl MemeInvoker {
    pub fn new(factory: Arc<dyn RenderHandleFactory>) -> Self {
        Self {
            factory,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Render a meme from cached avatar file paths. Captions stay empty and
    /// avatars are circle-cropped.
    pub async fn render(
        &self,
        meme_type: &str,
        avatar_paths: &[PathBuf],
        two_person: bool,
    ) -> Result<Vec<u8>, RenderError> {
        let expected = if two_person { 2 } else { 1 };
        if avatar_paths.len() != expected {
            return Err(RenderError::failed(
                meme_type,
                format!("expected {expected} avatars, got {}", avatar_paths.len()),
            ));
        }

        let handle = self.handle_for(meme_type).await?;
        let buffer = handle
            .render(avatar_paths, &[], RenderOptions::default())
            .await
            .map_err(|e| RenderError::failed(meme_type, e.to_string()))?;
        debug!(meme_type, bytes = buffer.len(), "meme rendered");
        Ok(buffer)
    }

    async fn handle_for(&self, meme_type: &str) -> Result<Arc<dyn MemeRender>, RenderError> {
        if let Some(handle) = self.handles.read().await.get(meme_type) {
            return Ok(Arc::clone(handle));
        }
        let handle = self.factory.create(meme_type).await?;
        self.handles
            .write()
            .await
            .insert(meme_type.to_string(), Arc::clone(&handle));
        debug!(meme_type, "render handle created and memoized");
        Ok(handle)
    }
}
