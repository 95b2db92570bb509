//! Default values for configuration sections.

/// Seconds a downloaded avatar is considered fresh before a re-fetch.
pub const DEFAULT_REAL_AVATAR_TTL_SECS: u64 = 86_400;

/// Seconds an entry without a metadata sidecar is considered fresh.
pub const DEFAULT_DEFAULT_AVATAR_TTL_SECS: u64 = 43_200;

/// Hours between scheduled cache cleanup scans.
pub const DEFAULT_CLEANUP_INTERVAL_HOURS: u64 = 24;

/// Entries used fewer times than this are eligible for scheduled cleanup.
pub const DEFAULT_CLEANUP_USE_THRESHOLD: u64 = 3;

/// Days an entry must go without refresh before scheduled cleanup removes it.
pub const DEFAULT_CLEANUP_EXPIRE_DAYS: u64 = 7;

/// Trigger phrase that lists the available memes.
pub const DEFAULT_LIST_COMMAND: &str = "表情列表";
