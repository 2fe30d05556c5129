use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{ChannelId, MemberRole, MessageId, MessageType, UserId},
    protocol::{ChannelConfig, UnreadCounts},
};

/// The signed-in user of this replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub muted_user_ids: BTreeSet<UserId>,
    pub muted_channel_ids: BTreeSet<ChannelId>,
    pub delivery_receipts_enabled: bool,
    pub unread: UnreadCounts,
    pub last_received_event_at: Option<DateTime<Utc>>,
}

impl CurrentUser {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            muted_user_ids: BTreeSet::new(),
            muted_channel_ids: BTreeSet::new(),
            delivery_receipts_enabled: true,
            unread: UnreadCounts::default(),
            last_received_event_at: None,
        }
    }

    pub fn has_muted_user(&self, user_id: &UserId) -> bool {
        self.muted_user_ids.contains(user_id)
    }

    pub fn has_muted_channel(&self, cid: &ChannelId) -> bool {
        self.muted_channel_ids.contains(cid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    /// Global ban, set by bans without a channel.
    pub is_banned: bool,
    pub online: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub cid: ChannelId,
    pub name: Option<String>,
    pub config: ChannelConfig,
    pub is_hidden: bool,
    pub truncated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub member_count: u32,
    pub watcher_count: u32,
    pub members: BTreeSet<UserId>,
    pub watchers: BTreeSet<UserId>,
    /// Points at the current user's member record when they belong to the channel.
    pub membership: Option<UserId>,
    /// Materialized message list, oldest first.
    pub messages: Vec<MessageId>,
}

impl Channel {
    pub fn new(cid: ChannelId) -> Self {
        Self {
            cid,
            name: None,
            config: ChannelConfig::default(),
            is_hidden: false,
            truncated_at: None,
            deleted_at: None,
            created_at: None,
            updated_at: None,
            member_count: 0,
            watcher_count: 0,
            members: BTreeSet::new(),
            watchers: BTreeSet::new(),
            membership: None,
            messages: Vec::new(),
        }
    }

    pub fn is_materialized(&self, message_id: &MessageId) -> bool {
        self.messages.contains(message_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub cid: ChannelId,
    pub user_id: UserId,
    pub text: String,
    pub kind: MessageType,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub parent_id: Option<MessageId>,
    pub show_reply_in_channel: bool,
    pub is_silent: bool,
    pub is_shadowed: bool,
    pub restricted_visibility: BTreeSet<UserId>,
    /// Terminal. A hard-deleted message ignores every later write.
    pub is_hard_deleted: bool,
    /// Set when a visibility change pulled the message out of its channel list.
    pub visibility_suppressed: bool,
    pub reply_count: u32,
    pub reaction_counts: BTreeMap<String, u32>,
}

impl Message {
    pub fn is_thread_reply_hidden_from_channel(&self) -> bool {
        self.parent_id.is_some() && !self.show_reply_in_channel
    }

    pub fn is_visible_to(&self, user_id: &UserId) -> bool {
        self.restricted_visibility.is_empty() || self.restricted_visibility.contains(user_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.is_hard_deleted || self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelUserKey {
    pub cid: ChannelId,
    pub user_id: UserId,
}

impl ChannelUserKey {
    pub fn new(cid: &ChannelId, user_id: &UserId) -> Self {
        Self {
            cid: cid.clone(),
            user_id: user_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRead {
    pub cid: ChannelId,
    pub user_id: UserId,
    /// `None` means the user has no read cursor and the channel shows as unread.
    pub last_read_at: Option<DateTime<Utc>>,
    pub last_read_message_id: Option<MessageId>,
    pub unread_messages_count: u32,
    pub unread_silent_messages_count: u32,
    pub unread_thread_replies_count: u32,
    pub last_delivered_at: Option<DateTime<Utc>>,
    pub last_delivered_message_id: Option<MessageId>,
}

impl ChannelRead {
    pub fn new(cid: ChannelId, user_id: UserId) -> Self {
        Self {
            cid,
            user_id,
            last_read_at: None,
            last_read_message_id: None,
            unread_messages_count: 0,
            unread_silent_messages_count: 0,
            unread_thread_replies_count: 0,
            last_delivered_at: None,
            last_delivered_message_id: None,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.unread_messages_count > 0 || self.last_read_at.is_none()
    }

    pub fn mark_read(&mut self, at: DateTime<Utc>, message_id: Option<MessageId>) {
        self.last_read_at = Some(at);
        if message_id.is_some() {
            self.last_read_message_id = message_id;
        }
        self.unread_messages_count = 0;
        self.unread_silent_messages_count = 0;
        self.unread_thread_replies_count = 0;
    }

    pub fn clear_unread_counts(&mut self) {
        self.unread_messages_count = 0;
        self.unread_silent_messages_count = 0;
        self.unread_thread_replies_count = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub cid: ChannelId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub is_banned: bool,
    pub is_shadow_banned: bool,
    pub ban_expires_at: Option<DateTime<Utc>>,
    pub is_invited: bool,
    pub invite_accepted_at: Option<DateTime<Utc>>,
    pub invite_rejected_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(cid: ChannelId, user_id: UserId) -> Self {
        Self {
            cid,
            user_id,
            role: MemberRole::Member,
            is_banned: false,
            is_shadow_banned: false,
            ban_expires_at: None,
            is_invited: false,
            invite_accepted_at: None,
            invite_rejected_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn clear_ban(&mut self) {
        self.is_banned = false;
        self.is_shadow_banned = false;
        self.ban_expires_at = None;
    }
}

/// A member list a UI is currently observing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberListQuery {
    pub id: String,
    pub cid: ChannelId,
    pub members: BTreeSet<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReactionKey {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub kind: String,
    pub score: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Reaction {
    pub fn key(&self) -> ReactionKey {
        ReactionKey {
            message_id: self.message_id.clone(),
            user_id: self.user_id.clone(),
            kind: self.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRead {
    pub user_id: UserId,
    pub last_read_at: Option<DateTime<Utc>>,
    pub last_read_message_id: Option<MessageId>,
    pub unread_messages_count: u32,
}

impl ThreadRead {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            last_read_at: None,
            last_read_message_id: None,
            unread_messages_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub parent_message_id: MessageId,
    pub cid: ChannelId,
    pub title: Option<String>,
    pub participant_count: u32,
    pub reply_count: u32,
    /// Newest last.
    pub latest_replies: Vec<MessageId>,
    pub reads: BTreeMap<UserId, ThreadRead>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Thread {
    pub fn new(parent_message_id: MessageId, cid: ChannelId) -> Self {
        Self {
            parent_message_id,
            cid,
            title: None,
            participant_count: 0,
            reply_count: 0,
            latest_replies: Vec::new(),
            reads: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub message_id: MessageId,
    pub cid: ChannelId,
    pub remind_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DraftKey {
    pub cid: ChannelId,
    pub parent_id: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub cid: ChannelId,
    pub parent_id: Option<MessageId>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    pub fn key(&self) -> DraftKey {
        DraftKey {
            cid: self.cid.clone(),
            parent_id: self.parent_id.clone(),
        }
    }
}

/// Everything the client knows locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replica {
    pub current_user: Option<CurrentUser>,
    pub users: BTreeMap<UserId, User>,
    pub channels: BTreeMap<ChannelId, Channel>,
    pub messages: BTreeMap<MessageId, Message>,
    pub reads: BTreeMap<ChannelUserKey, ChannelRead>,
    pub members: BTreeMap<ChannelUserKey, Member>,
    pub member_queries: BTreeMap<String, MemberListQuery>,
    pub reactions: BTreeMap<ReactionKey, Reaction>,
    pub threads: BTreeMap<MessageId, Thread>,
    pub reminders: BTreeMap<MessageId, Reminder>,
    pub drafts: BTreeMap<DraftKey, Draft>,
}

impl Replica {
    pub fn with_current_user(user_id: UserId) -> Self {
        Self {
            current_user: Some(CurrentUser::new(user_id)),
            ..Self::default()
        }
    }

    pub fn current_user_id(&self) -> Option<&UserId> {
        self.current_user.as_ref().map(|user| &user.id)
    }

    pub fn channel(&self, cid: &ChannelId) -> Option<&Channel> {
        self.channels.get(cid)
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn channel_read(&self, cid: &ChannelId, user_id: &UserId) -> Option<&ChannelRead> {
        self.reads.get(&ChannelUserKey::new(cid, user_id))
    }

    pub fn member(&self, cid: &ChannelId, user_id: &UserId) -> Option<&Member> {
        self.members.get(&ChannelUserKey::new(cid, user_id))
    }

    /// Materialized messages of a channel, oldest first.
    pub fn channel_messages(&self, cid: &ChannelId) -> Vec<&Message> {
        self.channels
            .get(cid)
            .map(|channel| {
                channel
                    .messages
                    .iter()
                    .filter_map(|id| self.messages.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}
