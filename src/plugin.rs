//! Plugin entry point: message handling, admin commands, and the
//! avatar-to-meme pipeline.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::avatar::{AvatarCacheStore, AvatarFetcher, AvatarResolver, CacheCleaner};
use crate::config::Config;
use crate::emoji::{DisableScope, EmojiRegistry, EmojiTriggers};
use crate::errors::PluginError;
use crate::meme::{MemeInvoker, RenderHandleFactory};
use crate::transport::ChatTransport;

/// Command prefixes that clear the avatar cache.
const CLEAR_CACHE_COMMANDS: &[&str] = &["清理表情缓存", "清除表情缓存"];

/// Grammar of the enable/disable admin commands.
static TOGGLE_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(全局)?(禁用|启用)表情\s+(.+)$").expect("valid toggle regex"));

/// One incoming chat message, already decoded by the host transport.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Message text
    pub content: String,
    /// Conversation the message arrived in (group id or peer id)
    pub from: String,
    /// Whether `from` is a group
    pub is_group: bool,
    /// Identity of the actual sender
    pub sender: String,
    /// Identities mentioned in the message, in mention order
    pub mentions: Vec<String>,
}

/// The meme-generator plugin.
///
/// Holds the avatar pipeline and the trigger registry. One call to
/// [`handle_message`](Self::handle_message) per incoming message; the host may
/// run many such calls concurrently.
pub struct MemeGenPlugin {
    enabled: bool,
    config: Config,
    transport: Arc<dyn ChatTransport>,
    registry: EmojiRegistry,
    store: AvatarCacheStore,
    resolver: AvatarResolver,
    fetcher: AvatarFetcher,
    cleaner: CacheCleaner,
    invoker: MemeInvoker,
    admins: HashSet<String>,
}

impl MemeGenPlugin {
    /// Assemble the plugin from already-loaded configuration.
    pub async fn new(
        config: Config,
        triggers: EmojiTriggers,
        transport: Arc<dyn ChatTransport>,
        render_factory: Arc<dyn RenderHandleFactory>,
        avatar_dir: PathBuf,
    ) -> Result<Self, PluginError> {
        let store = AvatarCacheStore::open(avatar_dir).await?;
        let resolver = AvatarResolver::new(Arc::clone(&transport));
        let fetcher = AvatarFetcher::new(store.clone());
        let cleaner = CacheCleaner::new(store.clone(), config.cache.clone());
        let invoker = MemeInvoker::new(render_factory);
        let admins = config.admin.admin_users.iter().cloned().collect();
        let enabled = config.basic.enable;

        info!(enabled, "memegen plugin initialized");
        Ok(Self {
            enabled,
            config,
            transport,
            registry: EmojiRegistry::new(triggers),
            store,
            resolver,
            fetcher,
            cleaner,
            invoker,
            admins,
        })
    }

    /// Load configuration files and assemble the plugin. A configuration
    /// failure disables the plugin instead of crashing the host.
    pub async fn from_config_files(
        config_path: &std::path::Path,
        emoji_path: &std::path::Path,
        transport: Arc<dyn ChatTransport>,
        render_factory: Arc<dyn RenderHandleFactory>,
        avatar_dir: PathBuf,
    ) -> Result<Self, PluginError> {
        let loaded = Config::load_from_file(config_path).and_then(|config| {
            let triggers = EmojiTriggers::load_from_file(emoji_path)?;
            Ok((config, triggers))
        });
        let (config, triggers, ok) = match loaded {
            Ok((config, triggers)) => (config, triggers, true),
            Err(e) => {
                error!("failed to load memegen configuration, plugin disabled: {e}");
                (Config::default(), EmojiTriggers::default(), false)
            }
        };

        let mut plugin = Self::new(config, triggers, transport, render_factory, avatar_dir).await?;
        if !ok {
            plugin.enabled = false;
        }
        Ok(plugin)
    }

    /// Merge the host's global admin list into the local one.
    pub fn with_global_admins<I, S>(mut self, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admins.extend(admins.into_iter().map(Into::into));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &AvatarCacheStore {
        &self.store
    }

    /// Start the background cache cleanup task.
    pub fn spawn_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        self.cleaner.spawn_scheduled_task()
    }

    /// Handle one incoming text message.
    pub async fn handle_message(&self, msg: &IncomingMessage) -> Result<()> {
        if !self.enabled {
            debug!("plugin disabled, ignoring message");
            return Ok(());
        }

        let content = msg.content.trim();
        debug!(from = %msg.from, sender = %msg.sender, "handling message: {content}");

        if self
            .config
            .commands
            .list_commands
            .iter()
            .any(|c| c.as_str() == content)
        {
            return self.send_trigger_list(&msg.from).await;
        }

        if CLEAR_CACHE_COMMANDS
            .iter()
            .any(|prefix| content.starts_with(prefix))
        {
            return self.handle_clear_command(msg, content).await;
        }

        if TOGGLE_COMMAND.is_match(content) {
            return self.handle_toggle_command(msg, content).await;
        }

        self.handle_meme_trigger(msg, content).await
    }

    async fn send_trigger_list(&self, destination: &str) -> Result<()> {
        let mut singles = self.registry.single_triggers();
        let mut twos = self.registry.two_person_triggers();
        singles.sort_unstable();
        twos.sort_unstable();

        let mut reply = String::from("【单人表情】");
        if singles.is_empty() {
            reply.push_str("没有单人表情触发词");
        } else {
            reply.push_str(&singles.join("、"));
        }
        reply.push_str("\n\n【双人表情】");
        if twos.is_empty() {
            reply.push_str("没有双人表情触发词");
        } else {
            reply.push_str(&twos.join("、"));
        }

        self.send_text(destination, &reply).await
    }

    async fn handle_clear_command(&self, msg: &IncomingMessage, content: &str) -> Result<()> {
        if !self.is_admin(&msg.sender) {
            return self.send_text(&msg.from, "只有管理员才能执行此操作！").await;
        }

        let target = content.split_whitespace().nth(1);
        let result = match target {
            Some(identity) => self
                .cleaner
                .clear_one(identity)
                .await
                .map(|files| format!("已清除用户 {identity} 的头像缓存，移除了 {files} 个文件")),
            None => self
                .cleaner
                .clear_all()
                .await
                .map(|files| format!("已清除头像缓存，共移除了 {files} 个文件")),
        };

        match result {
            Ok(reply) => self.send_text(&msg.from, &reply).await,
            Err(e) => {
                error!("cache clear command failed: {e}");
                self.send_text(&msg.from, &format!("清理缓存失败: {e}")).await
            }
        }
    }

    async fn handle_toggle_command(&self, msg: &IncomingMessage, content: &str) -> Result<()> {
        if !self.is_admin(&msg.sender) {
            return self.send_text(&msg.from, "只有管理员才能执行此操作！").await;
        }

        let Some(caps) = TOGGLE_COMMAND.captures(content) else {
            return Ok(());
        };
        let global = caps.get(1).is_some();
        let disabling = &caps[2] == "禁用";
        let trigger = caps[3].trim();

        let Some(meme_type) = self.registry.meme_type_for(trigger) else {
            return self.send_text(&msg.from, "未找到指定的表情！").await;
        };
        let meme_type = meme_type.to_string();

        let (scope, reply) = if global {
            let action = if disabling { "禁用" } else { "启用" };
            (
                DisableScope::Global,
                format!("已全局{action}表情：{trigger}"),
            )
        } else {
            if !msg.is_group {
                return self.send_text(&msg.from, "该命令只能在群聊中使用").await;
            }
            let action = if disabling { "禁用" } else { "启用" };
            (
                DisableScope::Group(msg.from.clone()),
                format!("已在当前群{action}表情：{trigger}"),
            )
        };

        if disabling {
            self.registry.disable(&meme_type, scope).await;
        } else {
            self.registry.enable(&meme_type, scope).await;
        }
        info!(trigger, meme_type, global, disabling, "toggled meme trigger");
        self.send_text(&msg.from, &reply).await
    }

    async fn handle_meme_trigger(&self, msg: &IncomingMessage, content: &str) -> Result<()> {
        if msg.mentions.is_empty() {
            return Ok(());
        }
        let group = msg.is_group.then_some(msg.from.as_str());

        if msg.mentions.len() >= 2
            && let Some((trigger, meme_type)) = self.registry.match_two_person(content)
        {
            let meme_type = meme_type.to_string();
            if self.registry.is_disabled(&meme_type, group).await {
                debug!(trigger, meme_type, "meme disabled, ignoring trigger");
                return Ok(());
            }
            let subjects = [msg.mentions[0].clone(), msg.mentions[1].clone()];
            return self.render_and_send(msg, &meme_type, &subjects, true).await;
        }

        if msg.mentions.len() == 1
            && let Some((trigger, meme_type)) = self.registry.match_single(content)
        {
            let meme_type = meme_type.to_string();
            if self.registry.is_disabled(&meme_type, group).await {
                debug!(trigger, meme_type, "meme disabled, ignoring trigger");
                return Ok(());
            }
            let subjects = [msg.mentions[0].clone()];
            return self.render_and_send(msg, &meme_type, &subjects, false).await;
        }

        debug!("no meme trigger matched");
        Ok(())
    }

    async fn render_and_send(
        &self,
        msg: &IncomingMessage,
        meme_type: &str,
        subjects: &[String],
        two_person: bool,
    ) -> Result<()> {
        let group = msg.is_group.then_some(msg.from.as_str());

        let mut avatar_paths = Vec::with_capacity(subjects.len());
        for identity in subjects {
            match self.ensure_avatar(identity, group).await {
                Ok(path) => avatar_paths.push(path),
                Err(e) => {
                    warn!(identity, "avatar unavailable: {e}");
                    return self
                        .send_text(&msg.from, &format!("无法获取用户 {identity} 的头像"))
                        .await;
                }
            }
        }

        match self.invoker.render(meme_type, &avatar_paths, two_person).await {
            Ok(buffer) => {
                self.transport
                    .send_image_message(&msg.from, &buffer)
                    .await
                    .context("sending rendered meme")?;
                info!(meme_type, subjects = subjects.len(), "meme sent");
                Ok(())
            }
            Err(e) => {
                error!(meme_type, "meme rendering failed: {e}");
                self.send_text(&msg.from, &format!("生成表情失败: {e}")).await
            }
        }
    }

    /// Return a cached avatar path for an identity, fetching over the network
    /// only when the cached entry is missing or stale.
    pub async fn ensure_avatar(
        &self,
        identity: &str,
        group: Option<&str>,
    ) -> Result<PathBuf, PluginError> {
        if let Some(path) = self.store.get(identity).await?
            && self.store.is_fresh(identity, &self.config.cache).await?
        {
            self.store.touch(identity).await?;
            debug!(identity, "avatar cache hit");
            return Ok(path);
        }

        let url = self.resolver.resolve(identity, group).await?;
        let path = self.fetcher.fetch(identity, &url).await?;
        Ok(path)
    }

    fn is_admin(&self, identity: &str) -> bool {
        self.admins.contains(identity)
    }

    async fn send_text(&self, destination: &str, text: &str) -> Result<()> {
        self.transport
            .send_text_message(destination, text)
            .await
            .context("sending text reply")
    }
}
