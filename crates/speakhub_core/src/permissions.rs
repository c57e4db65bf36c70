//! Permission overwrites applied to managed channels.

use crate::UserId;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Channel-level permissions speakhub grants or denies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    /// See the channel in the channel list.
    ViewChannel,
    /// Join the voice channel.
    Connect,
    /// Speak in the voice channel.
    Speak,
    /// Rename, limit and otherwise edit the channel.
    ManageChannels,
    /// Move members between voice channels.
    MoveMembers,
    /// Server-mute members.
    MuteMembers,
    /// Server-deafen members.
    DeafenMembers,
}

/// Who a permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteTarget {
    /// A single member.
    Member(UserId),
    /// The guild's @everyone role.
    Everyone,
}

/// Explicit allow and deny sets for one overwrite target.
///
/// # Examples
///
/// ```
/// use speakhub_core::{Permission, PermissionOverwrite};
///
/// let blocked = PermissionOverwrite::deny_only([Permission::Connect]);
/// assert!(blocked.denies(Permission::Connect));
/// assert!(!blocked.allows(Permission::Connect));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PermissionOverwrite {
    /// Explicitly allowed permissions
    #[serde(default)]
    allow: BTreeSet<Permission>,
    /// Explicitly denied permissions
    #[serde(default)]
    deny: BTreeSet<Permission>,
}

impl PermissionOverwrite {
    /// Create an overwrite from allow and deny sets.
    pub fn new(
        allow: impl IntoIterator<Item = Permission>,
        deny: impl IntoIterator<Item = Permission>,
    ) -> Self {
        let allow: BTreeSet<_> = allow.into_iter().collect();
        let deny = deny.into_iter().filter(|p| !allow.contains(p)).collect();
        Self { allow, deny }
    }

    /// Overwrite that only allows the given permissions.
    pub fn allow_only(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self::new(permissions, [])
    }

    /// Overwrite that only denies the given permissions.
    pub fn deny_only(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self::new([], permissions)
    }

    /// True if the permission is explicitly allowed.
    pub fn allows(&self, permission: Permission) -> bool {
        self.allow.contains(&permission)
    }

    /// True if the permission is explicitly denied.
    pub fn denies(&self, permission: Permission) -> bool {
        self.deny.contains(&permission)
    }
}

/// Overwrites applied to every new managed channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PermissionTemplate {
    /// Overwrite granted to the channel owner
    #[serde(default = "default_owner")]
    owner: PermissionOverwrite,
    /// Overwrite applied to @everyone
    #[serde(default = "default_everyone")]
    everyone: PermissionOverwrite,
}

fn default_owner() -> PermissionOverwrite {
    PermissionOverwrite::allow_only([
        Permission::Connect,
        Permission::ManageChannels,
        Permission::MoveMembers,
        Permission::MuteMembers,
    ])
}

fn default_everyone() -> PermissionOverwrite {
    PermissionOverwrite::allow_only([Permission::Connect])
}

impl PermissionTemplate {
    /// Create a template from explicit owner and @everyone overwrites.
    pub fn new(owner: PermissionOverwrite, everyone: PermissionOverwrite) -> Self {
        Self { owner, everyone }
    }

    /// Overwrite left to a previous owner after an ownership transfer.
    pub fn former_owner(&self) -> PermissionOverwrite {
        PermissionOverwrite::allow_only([Permission::Connect])
    }
}

impl Default for PermissionTemplate {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            everyone: default_everyone(),
        }
    }
}
