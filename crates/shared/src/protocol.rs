use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChannelId, MemberRole, MessageId, MessageType, UserId};

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPayload {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            banned: false,
            online: false,
            updated_at: None,
        }
    }
}

/// The signed-in user as the server describes them, including privacy and mute settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUserPayload {
    pub id: UserId,
    #[serde(default)]
    pub muted_user_ids: BTreeSet<UserId>,
    #[serde(default)]
    pub muted_channel_ids: BTreeSet<ChannelId>,
    #[serde(default = "enabled")]
    pub delivery_receipts_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "enabled")]
    pub read_events: bool,
    #[serde(default = "enabled")]
    pub delivery_events: bool,
    #[serde(default = "enabled")]
    pub typing_events: bool,
    #[serde(default = "enabled")]
    pub mutes: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_events: true,
            delivery_events: true,
            typing_events: true,
            mutes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub cid: ChannelId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Option<ChannelConfig>,
    /// `None` leaves the stored flag alone.
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub truncated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub member_count: Option<u32>,
    #[serde(default)]
    pub watcher_count: Option<u32>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    #[serde(default)]
    pub membership: Option<MemberPayload>,
    #[serde(default)]
    pub messages: Vec<MessagePayload>,
    #[serde(default)]
    pub reads: Vec<ChannelReadPayload>,
    #[serde(default)]
    pub watchers: Vec<UserPayload>,
}

impl ChannelPayload {
    pub fn new(cid: ChannelId) -> Self {
        Self {
            cid,
            name: None,
            config: None,
            hidden: None,
            truncated_at: None,
            deleted_at: None,
            created_at: None,
            updated_at: None,
            member_count: None,
            watcher_count: None,
            members: Vec::new(),
            membership: None,
            messages: Vec::new(),
            reads: Vec::new(),
            watchers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: MessageId,
    /// Some query responses omit the channel; events usually carry it at the top level.
    #[serde(default)]
    pub cid: Option<ChannelId>,
    pub user: UserPayload,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    #[serde(default)]
    pub show_reply_in_channel: bool,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub shadowed: bool,
    #[serde(default)]
    pub restricted_visibility: BTreeSet<UserId>,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub reaction_counts: BTreeMap<String, u32>,
    #[serde(default)]
    pub latest_reactions: Vec<ReactionPayload>,
}

impl MessagePayload {
    pub fn new(
        id: impl Into<MessageId>,
        user: impl Into<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            cid: None,
            user: UserPayload::new(user),
            text: String::new(),
            kind: MessageType::Regular,
            created_at,
            updated_at: None,
            deleted_at: None,
            parent_id: None,
            show_reply_in_channel: false,
            silent: false,
            shadowed: false,
            restricted_visibility: BTreeSet::new(),
            reply_count: 0,
            reaction_counts: BTreeMap::new(),
            latest_reactions: Vec::new(),
        }
    }

    /// A thread reply that is not also posted to the channel.
    pub fn is_thread_reply_hidden_from_channel(&self) -> bool {
        self.parent_id.is_some() && !self.show_reply_in_channel
    }

    /// An empty restriction set means everyone can see the message.
    pub fn is_visible_to(&self, user_id: &UserId) -> bool {
        self.restricted_visibility.is_empty() || self.restricted_visibility.contains(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPayload {
    pub user: UserPayload,
    #[serde(default)]
    pub role: MemberRole,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub shadow_banned: bool,
    #[serde(default)]
    pub ban_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub invited: bool,
    #[serde(default)]
    pub invite_accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub invite_rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemberPayload {
    pub fn new(user: impl Into<UserId>) -> Self {
        Self {
            user: UserPayload::new(user),
            role: MemberRole::Member,
            banned: false,
            shadow_banned: false,
            ban_expires: None,
            invited: false,
            invite_accepted_at: None,
            invite_rejected_at: None,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionPayload {
    pub message_id: MessageId,
    pub user: UserPayload,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_score")]
    pub score: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_score() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReadPayload {
    pub user: UserPayload,
    #[serde(default)]
    pub last_read: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_read_message_id: Option<MessageId>,
    #[serde(default)]
    pub unread_messages: u32,
    #[serde(default)]
    pub last_delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_delivered_message_id: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadReadPayload {
    pub user: UserPayload,
    #[serde(default)]
    pub last_read: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_read_message_id: Option<MessageId>,
    #[serde(default)]
    pub unread_messages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadPayload {
    pub parent_message_id: MessageId,
    pub cid: ChannelId,
    #[serde(default)]
    pub parent_message: Option<MessagePayload>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub participant_count: u32,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub latest_replies: Vec<MessagePayload>,
    #[serde(default)]
    pub read: Vec<ThreadReadPayload>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub message_id: MessageId,
    pub cid: ChannelId,
    /// `None` is a manual reminder with no due date.
    #[serde(default)]
    pub remind_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPayload {
    pub cid: ChannelId,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnreadCounts {
    #[serde(default)]
    pub channels: u32,
    #[serde(default)]
    pub messages: u32,
    #[serde(default)]
    pub threads: u32,
}
