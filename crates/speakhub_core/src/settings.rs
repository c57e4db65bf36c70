//! Per-guild configuration.

use crate::{ChannelId, GuildId, PermissionTemplate, UserId};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use speakhub_error::ConfigError;
use std::time::Duration;

const USER_PLACEHOLDER: &str = "{user}";
const USER_ID_PLACEHOLDER: &str = "{user_id}";
const MAX_NAME_LEN: usize = 100;

/// What happens when the owner leaves a channel that still has occupants.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OwnerLeavePolicy {
    /// The departed member stays owner until the channel is deleted.
    #[default]
    Keep,
    /// Ownership passes to the longest-present occupant.
    Transfer,
}

/// Configuration for one guild, immutable for the process lifetime.
///
/// # Examples
///
/// ```
/// use speakhub_core::{ChannelId, GuildId, GuildSettingsBuilder, UserId};
///
/// let settings = GuildSettingsBuilder::default()
///     .guild_id(GuildId(1))
///     .join_channel_id(ChannelId(2))
///     .name_template("Room of {user}")
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.marker(), "Room of ");
/// assert_eq!(settings.render_name("Ada", UserId(7)), "Room of ada");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), build_fn(error = "speakhub_error::BuilderError"))]
pub struct GuildSettings {
    /// Guild these settings apply to
    guild_id: GuildId,
    /// The join-to-create channel
    join_channel_id: ChannelId,
    /// Category new channels are created under
    #[serde(default)]
    #[builder(default)]
    category_id: Option<ChannelId>,
    /// Channel name template
    #[serde(default = "default_name_template")]
    #[builder(default = "default_name_template()")]
    name_template: String,
    /// Overwrites applied to new channels
    #[serde(default)]
    #[builder(default)]
    permissions: PermissionTemplate,
    /// How long a channel may stay empty before deletion (seconds)
    #[serde(default = "default_grace_window_secs")]
    #[builder(default = "default_grace_window_secs()")]
    grace_window_secs: u64,
    /// Reconciliation sweep interval (seconds)
    #[serde(default = "default_reconcile_interval_secs")]
    #[builder(default = "default_reconcile_interval_secs()")]
    reconcile_interval_secs: u64,
    /// Minimum time between two creations for the same member (seconds)
    #[serde(default = "default_creation_cooldown_secs")]
    #[builder(default = "default_creation_cooldown_secs()")]
    creation_cooldown_secs: u64,
    /// Minimum time between identical invites (seconds)
    #[serde(default = "default_invite_cooldown_secs")]
    #[builder(default = "default_invite_cooldown_secs()")]
    invite_cooldown_secs: u64,
    /// Owner departure handling
    #[serde(default)]
    #[builder(default)]
    owner_leave_policy: OwnerLeavePolicy,
}

fn default_name_template() -> String {
    "🔊╏ {user}".to_string()
}

fn default_grace_window_secs() -> u64 {
    10
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_creation_cooldown_secs() -> u64 {
    5
}

fn default_invite_cooldown_secs() -> u64 {
    7200
}

impl GuildSettings {
    /// Render the channel name for a member.
    ///
    /// The result is truncated to the platform's 100 character limit.
    pub fn render_name(&self, display_name: &str, user: UserId) -> String {
        let rendered = self
            .name_template
            .replace(USER_ID_PLACEHOLDER, &user.to_string())
            .replace(USER_PLACEHOLDER, &display_name.to_lowercase());
        rendered.chars().take(MAX_NAME_LEN).collect()
    }

    /// Literal template prefix that identifies managed channels remotely.
    pub fn marker(&self) -> &str {
        let end = [USER_PLACEHOLDER, USER_ID_PLACEHOLDER]
            .iter()
            .filter_map(|p| self.name_template.find(p))
            .min()
            .unwrap_or(self.name_template.len());
        &self.name_template[..end]
    }

    /// True if a remote channel looks like one of ours.
    ///
    /// The name must start with the marker and, when a category is
    /// configured, the channel must sit inside it.
    pub fn is_managed_name(&self, name: &str, parent: Option<ChannelId>) -> bool {
        let in_category = self.category_id.is_none_or(|category| parent == Some(category));
        in_category && name.starts_with(self.marker())
    }

    /// Grace window as a duration.
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }

    /// Reconciliation interval as a duration.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Creation cooldown as a duration.
    pub fn creation_cooldown(&self) -> Duration {
        Duration::from_secs(self.creation_cooldown_secs)
    }

    /// Invite cooldown as a duration.
    pub fn invite_cooldown(&self) -> Duration {
        Duration::from_secs(self.invite_cooldown_secs)
    }

    /// Check the settings for values the orchestrator cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name_template.trim().is_empty() {
            return Err(ConfigError::new(format!(
                "guild {}: name_template must not be empty",
                self.guild_id
            )));
        }
        if self.marker().trim().is_empty() {
            return Err(ConfigError::new(format!(
                "guild {}: name_template must start with literal text before any placeholder",
                self.guild_id
            )));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(ConfigError::new(format!(
                "guild {}: reconcile_interval_secs must be positive",
                self.guild_id
            )));
        }
        if self.category_id == Some(self.join_channel_id) {
            return Err(ConfigError::new(format!(
                "guild {}: join_channel_id must not be the category",
                self.guild_id
            )));
        }
        Ok(())
    }
}
