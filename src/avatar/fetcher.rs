//! Bounded-timeout avatar download.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::store::AvatarCacheStore;
use crate::errors::FetchError;

/// Overall timeout for one avatar download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Payloads smaller than this are treated as corrupt, not avatars.
pub const MIN_AVATAR_BYTES: usize = 100;

/// Some avatar hosts reject unidentified clients; present a browser-like UA.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Downloads resolved avatar URLs and commits validated payloads to the
/// cache store. Validation happens before commit, so a rejected payload
/// leaves the store unchanged and no partial file behind.
pub struct AvatarFetcher {
    client: Client,
    store: AvatarCacheStore,
}

impl AvatarFetcher {
    pub fn new(store: AvatarCacheStore) -> Self {
        Self::with_timeout(store, FETCH_TIMEOUT)
    }

    /// Build with a non-default timeout. Tests shrink it to keep timeout
    /// scenarios fast.
    pub fn with_timeout(store: AvatarCacheStore, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, store }
    }

    /// Download `url` and cache it as the avatar for `identity`. A fetch
    /// exceeding the timeout is abandoned and reported; no retries.
    pub async fn fetch(&self, identity: &str, url: &Url) -> Result<PathBuf, FetchError> {
        debug!(identity, %url, "downloading avatar");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(identity, %url, "avatar download failed: {e}");
            FetchError::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(identity, %url, status = status.as_u16(), "avatar host returned error status");
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(FetchError::Network)?;
        if bytes.len() < MIN_AVATAR_BYTES {
            warn!(
                identity,
                %url,
                size = bytes.len(),
                "avatar payload below minimum size, discarding"
            );
            return Err(FetchError::InvalidPayload { size: bytes.len() });
        }

        let path = self.store.put(identity, &bytes).await?;
        debug!(identity, bytes = bytes.len(), "avatar cached: {}", path.display());
        Ok(path)
    }
}
