//! Platform-facing types.
//!
//! Herald never talks to a chat platform directly. An adapter translates the
//! platform's objects into these plain values (opaque ids plus message text)
//! and answers the single permission question the dispatcher needs.

use serde::{Deserialize, Serialize};

/// Platform user id.
pub type UserId = u64;
/// Platform channel id.
pub type ChannelId = u64;
/// Platform guild (server) id.
pub type GuildId = u64;

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Id of the author.
    pub author_id: UserId,
    /// Whether the author is a bot account.
    #[serde(default)]
    pub author_is_bot: bool,
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// Guild the channel belongs to.
    pub guild_id: GuildId,
    /// Raw message text.
    pub content: String,
}

impl Message {
    /// Creates a message authored by a human user.
    pub fn new(
        author_id: UserId,
        channel_id: ChannelId,
        guild_id: GuildId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id,
            author_is_bot: false,
            channel_id,
            guild_id,
            content: content.into(),
        }
    }

    /// Marks the author as a bot account.
    pub fn from_bot(mut self) -> Self {
        self.author_is_bot = true;
        self
    }

    /// Returns the message text after the first whitespace-delimited token.
    ///
    /// Handlers use this to read their arguments; `"!echo hello world"`
    /// yields `"hello world"`.
    pub fn arguments(&self) -> &str {
        match self.content.trim_start().split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim_start(),
            None => "",
        }
    }
}

/// A guild, as seen by join/leave hooks and prefix resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guild {
    /// Guild id.
    pub id: GuildId,
}

impl Guild {
    /// Creates a guild handle.
    pub fn new(id: GuildId) -> Self {
        Self { id }
    }
}

/// Permission predicate delegated to the platform adapter.
///
/// Implementations must answer from live platform state: the dispatcher asks
/// on every message and never caches the answer.
pub trait PermissionSource: Send + Sync {
    /// Whether `user` may manage permissions in `channel`.
    fn has_manage_permissions(&self, user: UserId, channel: ChannelId) -> bool;
}

impl<F> PermissionSource for F
where
    F: Fn(UserId, ChannelId) -> bool + Send + Sync,
{
    fn has_manage_permissions(&self, user: UserId, channel: ChannelId) -> bool {
        self(user, channel)
    }
}

/// A permission source that grants nobody elevated rights.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissions;

impl PermissionSource for NoPermissions {
    fn has_manage_permissions(&self, _user: UserId, _channel: ChannelId) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_after_command() {
        let msg = Message::new(1, 2, 3, "!echo  hello world");
        assert_eq!(msg.arguments(), "hello world");

        let bare = Message::new(1, 2, 3, "!ping");
        assert_eq!(bare.arguments(), "");
    }

    #[test]
    fn test_closure_permission_source() {
        let admins = |user: UserId, _channel: ChannelId| user == 42;
        assert!(admins.has_manage_permissions(42, 1));
        assert!(!admins.has_manage_permissions(7, 1));
        assert!(!NoPermissions.has_manage_permissions(42, 1));
    }
}
