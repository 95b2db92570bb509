//! Avatar URL resolution with ordered fallback strategies.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::errors::ResolutionError;
use crate::transport::ChatTransport;

/// Field names probed, in order, when falling back to the generic profile
/// lookup. Each is a pure extraction over the profile mapping.
pub const PROFILE_URL_FIELDS: &[&str] = &["smallHeadImgUrl", "avatar", "avatarUrl", "headImgUrl"];

/// Extract the first usable URL from a generic profile mapping, probing the
/// given field names in order.
pub fn extract_profile_url(profile: &HashMap<String, String>, fields: &[&str]) -> Option<Url> {
    fields
        .iter()
        .filter_map(|field| profile.get(*field))
        .find_map(|value| parse_url(value))
}

fn parse_url(value: &str) -> Option<Url> {
    if value.is_empty() {
        return None;
    }
    match Url::parse(value) {
        Ok(url) => Some(url),
        Err(e) => {
            debug!("discarding unparseable avatar URL {value:?}: {e}");
            None
        }
    }
}

fn pick_url(big: Option<&String>, small: Option<&String>) -> Option<Url> {
    big.and_then(|u| parse_url(u))
        .or_else(|| small.and_then(|u| parse_url(u)))
}

/// Resolves an avatar URL for a user identity by trying ordered lookup
/// strategies against the chat transport. Each strategy failure is logged and
/// non-fatal; resolution proceeds to the next strategy.
pub struct AvatarResolver {
    transport: Arc<dyn ChatTransport>,
}

impl AvatarResolver {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }

    /// Resolve an avatar URL, trying in strict order: direct contact profile,
    /// group member list (when a group context is present), generic profile
    /// field probing. Stops at the first success.
    pub async fn resolve(
        &self,
        identity: &str,
        group: Option<&str>,
    ) -> Result<Url, ResolutionError> {
        if let Some(url) = self.from_contact_profile(identity).await {
            debug!(identity, %url, "resolved avatar via contact profile");
            return Ok(url);
        }

        if let Some(group_identity) = group
            && let Some(url) = self.from_group_members(identity, group_identity).await
        {
            debug!(identity, group_identity, %url, "resolved avatar via group member list");
            return Ok(url);
        }

        if let Some(url) = self.from_generic_profile(identity).await {
            debug!(identity, %url, "resolved avatar via generic profile");
            return Ok(url);
        }

        Err(ResolutionError::NotFound {
            identity: identity.to_string(),
        })
    }

    async fn from_contact_profile(&self, identity: &str) -> Option<Url> {
        match self.transport.get_contact_profile(identity).await {
            Ok(profile) => pick_url(
                profile.big_image_url.as_ref(),
                profile.small_image_url.as_ref(),
            ),
            Err(e) => {
                warn!(identity, "contact profile lookup failed: {e}");
                None
            }
        }
    }

    async fn from_group_members(&self, identity: &str, group_identity: &str) -> Option<Url> {
        let members = match self.transport.get_group_member_list(group_identity).await {
            Ok(members) => members,
            Err(e) => {
                warn!(identity, group_identity, "group member lookup failed: {e}");
                return None;
            }
        };
        members
            .iter()
            .find(|member| member.identity == identity)
            .and_then(|member| {
                pick_url(member.big_image_url.as_ref(), member.small_image_url.as_ref())
            })
    }

    async fn from_generic_profile(&self, identity: &str) -> Option<Url> {
        match self.transport.get_generic_profile(identity).await {
            Ok(profile) => extract_profile_url(&profile, PROFILE_URL_FIELDS),
            Err(e) => {
                warn!(identity, "generic profile lookup failed: {e}");
                None
            }
        }
    }
}
