//! Chat transport collaborator interface.
//!
//! The plugin never talks to the chat protocol directly; the host supplies an
//! implementation of [`ChatTransport`] and the plugin restricts itself to
//! these calls. Mirrors the contact/member-list/profile lookups and the two
//! outbound message operations consumed by the avatar pipeline.

use std::collections::HashMap;

use async_trait::async_trait;

/// Contact profile returned by a direct lookup.
#[derive(Debug, Clone, Default)]
pub struct ContactProfile {
    pub big_image_url: Option<String>,
    pub small_image_url: Option<String>,
}

/// One member of a group's member list.
#[derive(Debug, Clone)]
pub struct GroupMember {
    pub identity: String,
    pub big_image_url: Option<String>,
    pub small_image_url: Option<String>,
}

/// Errors from the host transport are opaque to the plugin; they are logged
/// and treated as a failed lookup strategy, never propagated raw.
pub type TransportError = anyhow::Error;

/// Host-provided chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Direct contact-profile lookup for an identity.
    async fn get_contact_profile(&self, identity: &str)
    -> Result<ContactProfile, TransportError>;

    /// Enumerate the members of a group.
    async fn get_group_member_list(
        &self,
        group_identity: &str,
    ) -> Result<Vec<GroupMember>, TransportError>;

    /// Generic profile lookup returning raw field-name -> value mappings.
    async fn get_generic_profile(
        &self,
        identity: &str,
    ) -> Result<HashMap<String, String>, TransportError>;

    /// Send a plain-text message to a user or group.
    async fn send_text_message(&self, destination: &str, text: &str)
    -> Result<(), TransportError>;

    /// Send an encoded image to a user or group.
    async fn send_image_message(
        &self,
        destination: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError>;
}
