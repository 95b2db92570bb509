//! Meme trigger registry with an in-memory disabled-state overlay.
//!
//! Trigger mappings are loaded once from JSON configuration and are read-only
//! at runtime. The disabled overlay (global and per-group) is mutated by admin
//! commands and held only in memory; it resets on restart. That is an accepted
//! limitation of the design, not a persistence bug.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::ConfigError;

/// Scope of an enable/disable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableScope {
    Global,
    Group(String),
}

/// Trigger-phrase -> meme-type mappings, as loaded from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmojiTriggers {
    /// Single-subject memes
    #[serde(default)]
    pub single: HashMap<String, String>,
    /// Two-subject memes
    #[serde(default)]
    pub two_person: HashMap<String, String>,
}

impl EmojiTriggers {
    /// Read trigger mappings from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::EmojiRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::EmojiParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Registry of meme triggers plus the runtime disabled overlay.
///
/// Matching scans the trigger phrases longest-first (ties broken
/// lexicographically), so a message containing several phrases always picks
/// the most specific one and the pick is stable across runs.
pub struct EmojiRegistry {
    triggers: EmojiTriggers,
    single_ordered: Vec<(String, String)>,
    two_person_ordered: Vec<(String, String)>,
    globally_disabled: RwLock<HashSet<String>>,
    disabled_per_group: RwLock<HashMap<String, HashSet<String>>>,
}

fn ordered_pairs(map: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = map
        .iter()
        .map(|(trigger, meme_type)| (trigger.clone(), meme_type.clone()))
        .collect();
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    pairs
}

impl EmojiRegistry {
    pub fn new(triggers: EmojiTriggers) -> Self {
        info!(
            "emoji registry loaded: {} single, {} two-person triggers",
            triggers.single.len(),
            triggers.two_person.len()
        );
        let single_ordered = ordered_pairs(&triggers.single);
        let two_person_ordered = ordered_pairs(&triggers.two_person);
        Self {
            triggers,
            single_ordered,
            two_person_ordered,
            globally_disabled: RwLock::new(HashSet::new()),
            disabled_per_group: RwLock::new(HashMap::new()),
        }
    }

    /// Load trigger mappings from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Ok(Self::new(EmojiTriggers::load_from_file(path)?))
    }

    /// Find a single-subject trigger contained in the message content.
    pub fn match_single(&self, content: &str) -> Option<(&str, &str)> {
        self.single_ordered
            .iter()
            .find(|(trigger, _)| content.contains(trigger.as_str()))
            .map(|(trigger, meme_type)| (trigger.as_str(), meme_type.as_str()))
    }

    /// Find a two-subject trigger contained in the message content.
    pub fn match_two_person(&self, content: &str) -> Option<(&str, &str)> {
        self.two_person_ordered
            .iter()
            .find(|(trigger, _)| content.contains(trigger.as_str()))
            .map(|(trigger, meme_type)| (trigger.as_str(), meme_type.as_str()))
    }

    /// Look up the meme type for a trigger name in either mapping.
    pub fn meme_type_for(&self, trigger: &str) -> Option<&str> {
        self.triggers
            .single
            .get(trigger)
            .or_else(|| self.triggers.two_person.get(trigger))
            .map(String::as_str)
    }

    pub fn single_triggers(&self) -> Vec<&str> {
        self.triggers.single.keys().map(String::as_str).collect()
    }

    pub fn two_person_triggers(&self) -> Vec<&str> {
        self.triggers.two_person.keys().map(String::as_str).collect()
    }

    /// Whether a meme type is disabled globally or in the given group.
    pub async fn is_disabled(&self, meme_type: &str, group: Option<&str>) -> bool {
        if self.globally_disabled.read().await.contains(meme_type) {
            return true;
        }
        if let Some(group) = group {
            return self
                .disabled_per_group
                .read()
                .await
                .get(group)
                .is_some_and(|set| set.contains(meme_type));
        }
        false
    }

    /// Mark a meme type disabled in the given scope.
    pub async fn disable(&self, meme_type: &str, scope: DisableScope) {
        match scope {
            DisableScope::Global => {
                self.globally_disabled
                    .write()
                    .await
                    .insert(meme_type.to_string());
            }
            DisableScope::Group(group) => {
                self.disabled_per_group
                    .write()
                    .await
                    .entry(group)
                    .or_default()
                    .insert(meme_type.to_string());
            }
        }
    }

    /// Re-enable a meme type in the given scope.
    pub async fn enable(&self, meme_type: &str, scope: DisableScope) {
        match scope {
            DisableScope::Global => {
                self.globally_disabled.write().await.remove(meme_type);
            }
            DisableScope::Group(group) => {
                if let Some(set) = self.disabled_per_group.write().await.get_mut(&group) {
                    set.remove(meme_type);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> EmojiRegistry {
        let triggers: EmojiTriggers = serde_json::from_str(
            r#"{
                "single": {"摸": "petpet", "亲": "kiss_single"},
                "two_person": {"贴贴": "hug", "对决": "duel"}
            }"#,
        )
        .unwrap();
        EmojiRegistry::new(triggers)
    }

    #[test]
    fn matches_trigger_substring_in_content() {
        let registry = sample_registry();
        let (trigger, meme_type) = registry.match_single("@小明 摸摸头").unwrap();
        assert_eq!(trigger, "摸");
        assert_eq!(meme_type, "petpet");
        assert!(registry.match_single("没有触发词").is_none());
    }

    #[test]
    fn longest_trigger_wins_when_several_match() {
        let triggers: EmojiTriggers = serde_json::from_str(
            r#"{
                "single": {"摸": "petpet", "摸摸头": "headpat", "亲": "kiss_single"},
                "two_person": {}
            }"#,
        )
        .unwrap();
        let registry = EmojiRegistry::new(triggers);

        // "摸摸头" contains both "摸" and "摸摸头"; the longer phrase wins.
        let (trigger, meme_type) = registry.match_single("@小明 摸摸头").unwrap();
        assert_eq!(trigger, "摸摸头");
        assert_eq!(meme_type, "headpat");

        // Equal-length candidates resolve the same way every run.
        let (first, _) = registry.match_single("亲一下再摸一下").unwrap();
        let (second, _) = registry.match_single("亲一下再摸一下").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "亲"); // lexicographic tie-break
    }

    #[test]
    fn two_person_map_is_separate() {
        let registry = sample_registry();
        assert!(registry.match_two_person("@甲 贴贴 @乙").is_some());
        assert!(registry.match_two_person("摸").is_none());
    }

    #[test]
    fn meme_type_lookup_spans_both_maps() {
        let registry = sample_registry();
        assert_eq!(registry.meme_type_for("摸"), Some("petpet"));
        assert_eq!(registry.meme_type_for("对决"), Some("duel"));
        assert_eq!(registry.meme_type_for("不存在"), None);
    }

    #[tokio::test]
    async fn group_disable_is_scoped_to_that_group() {
        let registry = sample_registry();
        registry
            .disable("petpet", DisableScope::Group("g2".to_string()))
            .await;

        assert!(registry.is_disabled("petpet", Some("g2")).await);
        assert!(!registry.is_disabled("petpet", Some("g3")).await);
        assert!(!registry.is_disabled("petpet", None).await);
    }

    #[tokio::test]
    async fn global_disable_applies_everywhere_until_enabled() {
        let registry = sample_registry();
        registry.disable("hug", DisableScope::Global).await;
        assert!(registry.is_disabled("hug", Some("g1")).await);
        assert!(registry.is_disabled("hug", None).await);

        registry.enable("hug", DisableScope::Global).await;
        assert!(!registry.is_disabled("hug", Some("g1")).await);
    }

    #[tokio::test]
    async fn group_enable_reverses_group_disable() {
        let registry = sample_registry();
        let scope = DisableScope::Group("g1".to_string());
        registry.disable("duel", scope.clone()).await;
        registry.enable("duel", scope).await;
        assert!(!registry.is_disabled("duel", Some("g1")).await);
    }
}
