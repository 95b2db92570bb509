//! Avatar acquisition and caching.
//!
//! Pipeline: [`AvatarResolver`] finds an image URL for a user identity,
//! [`AvatarFetcher`] downloads and validates it, [`AvatarCacheStore`] owns the
//! on-disk entries, and [`CacheCleaner`] evicts stale low-use entries on a
//! timer or on operator command.

pub mod cleanup;
pub mod entry;
pub mod fetcher;
pub mod resolver;
pub mod store;

pub use cleanup::{CacheCleaner, CleanupStats, MANUAL_CLEAR_AGE};
pub use entry::AvatarMetadata;
pub use fetcher::{AvatarFetcher, FETCH_TIMEOUT, MIN_AVATAR_BYTES};
pub use resolver::{AvatarResolver, PROFILE_URL_FIELDS, extract_profile_url};
pub use store::{AvatarCacheStore, RemoveOutcome};
