use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{ChannelId, MessageId, UserId},
    error::DecodeError,
    protocol::{
        ChannelPayload, CurrentUserPayload, DraftPayload, MemberPayload, MessagePayload,
        ReactionPayload, ReminderPayload, ThreadPayload, UnreadCounts, UserPayload,
    },
};

/// Every event the replica understands. Anything else decodes into [`Event::Custom`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    #[serde(rename = "message.new")]
    MessageNew {
        cid: ChannelId,
        user: UserPayload,
        message: MessagePayload,
        #[serde(default)]
        channel: Option<ChannelPayload>,
        #[serde(default)]
        watcher_count: Option<u32>,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "message.updated")]
    MessageUpdated {
        cid: ChannelId,
        #[serde(default)]
        user: Option<UserPayload>,
        message: MessagePayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "message.deleted")]
    MessageDeleted {
        cid: ChannelId,
        #[serde(default)]
        user: Option<UserPayload>,
        message: MessagePayload,
        #[serde(default)]
        hard_delete: bool,
        created_at: DateTime<Utc>,
    },
    /// Channel read, or thread read when `parent_message_id` is set.
    #[serde(rename = "message.read")]
    MessageRead {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        parent_message_id: Option<MessageId>,
        #[serde(default)]
        last_read_message_id: Option<MessageId>,
        #[serde(default)]
        thread: Option<ThreadPayload>,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "message.delivered")]
    MessageDelivered {
        cid: ChannelId,
        user: UserPayload,
        last_delivered_message_id: MessageId,
        last_delivered_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.message_new")]
    NotificationMessageNew {
        cid: ChannelId,
        channel: ChannelPayload,
        message: MessagePayload,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.mark_read")]
    NotificationMarkRead {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        last_read_message_id: Option<MessageId>,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.mark_all_read")]
    NotificationMarkAllRead {
        user: UserPayload,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    /// Channel mark-unread, or thread mark-unread when `parent_message_id` is set.
    #[serde(rename = "notification.mark_unread")]
    NotificationMarkUnread {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        parent_message_id: Option<MessageId>,
        #[serde(default)]
        first_unread_message_id: Option<MessageId>,
        #[serde(default)]
        last_read_at: Option<DateTime<Utc>>,
        #[serde(default)]
        last_read_message_id: Option<MessageId>,
        #[serde(default)]
        unread_messages: u32,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "member.added")]
    MemberAdded {
        cid: ChannelId,
        user: UserPayload,
        member: MemberPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "member.updated")]
    MemberUpdated {
        cid: ChannelId,
        user: UserPayload,
        member: MemberPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "member.removed")]
    MemberRemoved {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        member: Option<MemberPayload>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.added_to_channel")]
    NotificationAddedToChannel {
        cid: ChannelId,
        channel: ChannelPayload,
        member: MemberPayload,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.removed_from_channel")]
    NotificationRemovedFromChannel {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        member: Option<MemberPayload>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.invited")]
    NotificationInvited {
        cid: ChannelId,
        #[serde(default)]
        channel: Option<ChannelPayload>,
        user: UserPayload,
        member: MemberPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.invite_accepted")]
    NotificationInviteAccepted {
        cid: ChannelId,
        #[serde(default)]
        channel: Option<ChannelPayload>,
        user: UserPayload,
        member: MemberPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.invite_rejected")]
    NotificationInviteRejected {
        cid: ChannelId,
        #[serde(default)]
        channel: Option<ChannelPayload>,
        user: UserPayload,
        member: MemberPayload,
        created_at: DateTime<Utc>,
    },
    /// Without a `cid` the ban is global.
    #[serde(rename = "user.banned")]
    UserBanned {
        #[serde(default)]
        cid: Option<ChannelId>,
        user: UserPayload,
        #[serde(default)]
        created_by: Option<UserPayload>,
        #[serde(default)]
        expiration: Option<DateTime<Utc>>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        shadow: bool,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "user.unbanned")]
    UserUnbanned {
        #[serde(default)]
        cid: Option<ChannelId>,
        user: UserPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "user.messages.deleted")]
    UserMessagesDeleted {
        #[serde(default)]
        cid: Option<ChannelId>,
        user: UserPayload,
        #[serde(default)]
        hard_delete: bool,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "user.updated")]
    UserUpdated {
        user: UserPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.mutes_updated")]
    NotificationMutesUpdated {
        me: CurrentUserPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "channel.updated")]
    ChannelUpdated {
        cid: ChannelId,
        channel: ChannelPayload,
        #[serde(default)]
        user: Option<UserPayload>,
        #[serde(default)]
        message: Option<MessagePayload>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "channel.deleted")]
    ChannelDeleted {
        cid: ChannelId,
        #[serde(default)]
        channel: Option<ChannelPayload>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "channel.truncated")]
    ChannelTruncated {
        cid: ChannelId,
        #[serde(default)]
        channel: Option<ChannelPayload>,
        #[serde(default)]
        user: Option<UserPayload>,
        #[serde(default)]
        message: Option<MessagePayload>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "channel.hidden")]
    ChannelHidden {
        cid: ChannelId,
        #[serde(default)]
        user: Option<UserPayload>,
        #[serde(default)]
        clear_history: bool,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "channel.visible")]
    ChannelVisible {
        cid: ChannelId,
        #[serde(default)]
        user: Option<UserPayload>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "typing.start")]
    TypingStart {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        parent_id: Option<MessageId>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "typing.stop")]
    TypingStop {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        parent_id: Option<MessageId>,
        created_at: DateTime<Utc>,
    },
    /// Synthesized locally when a typing indicator times out.
    #[serde(rename = "typing.clean_up")]
    TypingCleanUp {
        cid: ChannelId,
        user_id: UserId,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "reaction.new")]
    ReactionNew {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        message: Option<MessagePayload>,
        reaction: ReactionPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "reaction.updated")]
    ReactionUpdated {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        message: Option<MessagePayload>,
        reaction: ReactionPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "reaction.deleted")]
    ReactionDeleted {
        cid: ChannelId,
        user: UserPayload,
        #[serde(default)]
        message: Option<MessagePayload>,
        reaction: ReactionPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.thread_message_new")]
    ThreadMessageNew {
        cid: ChannelId,
        message: MessagePayload,
        #[serde(default)]
        channel: Option<ChannelPayload>,
        #[serde(default)]
        thread: Option<ThreadPayload>,
        #[serde(default)]
        unread: Option<UnreadCounts>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "thread.updated")]
    ThreadUpdated {
        cid: ChannelId,
        thread: ThreadPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "draft.updated")]
    DraftUpdated {
        cid: ChannelId,
        draft: DraftPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "draft.deleted")]
    DraftDeleted {
        cid: ChannelId,
        draft: DraftPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "reminder.created")]
    ReminderCreated {
        cid: ChannelId,
        message_id: MessageId,
        reminder: ReminderPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "reminder.updated")]
    ReminderUpdated {
        cid: ChannelId,
        message_id: MessageId,
        reminder: ReminderPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "notification.reminder_due")]
    ReminderDue {
        cid: ChannelId,
        message_id: MessageId,
        reminder: ReminderPayload,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "reminder.deleted")]
    ReminderDeleted {
        cid: ChannelId,
        message_id: MessageId,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "health.check")]
    HealthCheck {
        #[serde(default)]
        connection_id: Option<String>,
        #[serde(default)]
        me: Option<CurrentUserPayload>,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "custom")]
    Custom {
        event_type: String,
        #[serde(default)]
        cid: Option<ChannelId>,
        #[serde(default)]
        payload: Value,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
    },
}

/// Wire names of every typed variant; other `type` values become [`Event::Custom`].
pub const EVENT_TYPES: &[&str] = &[
    "message.new",
    "message.updated",
    "message.deleted",
    "message.read",
    "message.delivered",
    "notification.message_new",
    "notification.mark_read",
    "notification.mark_all_read",
    "notification.mark_unread",
    "member.added",
    "member.updated",
    "member.removed",
    "notification.added_to_channel",
    "notification.removed_from_channel",
    "notification.invited",
    "notification.invite_accepted",
    "notification.invite_rejected",
    "user.banned",
    "user.unbanned",
    "user.messages.deleted",
    "user.updated",
    "notification.mutes_updated",
    "channel.updated",
    "channel.deleted",
    "channel.truncated",
    "channel.hidden",
    "channel.visible",
    "typing.start",
    "typing.stop",
    "typing.clean_up",
    "reaction.new",
    "reaction.updated",
    "reaction.deleted",
    "notification.thread_message_new",
    "thread.updated",
    "draft.updated",
    "draft.deleted",
    "reminder.created",
    "reminder.updated",
    "notification.reminder_due",
    "reminder.deleted",
    "health.check",
    "custom",
];

/// Borrowed view of the entity payloads an event carries.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventPayloads<'a> {
    pub user: Option<&'a UserPayload>,
    pub current_user: Option<&'a CurrentUserPayload>,
    pub channel: Option<&'a ChannelPayload>,
    pub message: Option<&'a MessagePayload>,
    pub member: Option<&'a MemberPayload>,
    pub reaction: Option<&'a ReactionPayload>,
    pub thread: Option<&'a ThreadPayload>,
    pub unread: Option<UnreadCounts>,
}

impl Event {
    /// Decodes one wire event. Unknown `type` values are kept as [`Event::Custom`].
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(object) = &value else {
            return Err(DecodeError::NotAnObject);
        };
        let event_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();

        if EVENT_TYPES.contains(&event_type.as_str()) {
            return serde_json::from_value(value).map_err(|source| DecodeError::Malformed {
                event_type,
                source,
            });
        }

        let payload = object.get("payload").cloned().unwrap_or(Value::Null);
        let cid = payload
            .get("cid")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok());
        let created_at = payload
            .get("created_at")
            .cloned()
            .and_then(|raw| serde_json::from_value(raw).ok());
        Ok(Event::Custom {
            event_type,
            cid,
            payload,
            created_at,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::MessageNew { .. } => "message.new",
            Event::MessageUpdated { .. } => "message.updated",
            Event::MessageDeleted { .. } => "message.deleted",
            Event::MessageRead { .. } => "message.read",
            Event::MessageDelivered { .. } => "message.delivered",
            Event::NotificationMessageNew { .. } => "notification.message_new",
            Event::NotificationMarkRead { .. } => "notification.mark_read",
            Event::NotificationMarkAllRead { .. } => "notification.mark_all_read",
            Event::NotificationMarkUnread { .. } => "notification.mark_unread",
            Event::MemberAdded { .. } => "member.added",
            Event::MemberUpdated { .. } => "member.updated",
            Event::MemberRemoved { .. } => "member.removed",
            Event::NotificationAddedToChannel { .. } => "notification.added_to_channel",
            Event::NotificationRemovedFromChannel { .. } => "notification.removed_from_channel",
            Event::NotificationInvited { .. } => "notification.invited",
            Event::NotificationInviteAccepted { .. } => "notification.invite_accepted",
            Event::NotificationInviteRejected { .. } => "notification.invite_rejected",
            Event::UserBanned { .. } => "user.banned",
            Event::UserUnbanned { .. } => "user.unbanned",
            Event::UserMessagesDeleted { .. } => "user.messages.deleted",
            Event::UserUpdated { .. } => "user.updated",
            Event::NotificationMutesUpdated { .. } => "notification.mutes_updated",
            Event::ChannelUpdated { .. } => "channel.updated",
            Event::ChannelDeleted { .. } => "channel.deleted",
            Event::ChannelTruncated { .. } => "channel.truncated",
            Event::ChannelHidden { .. } => "channel.hidden",
            Event::ChannelVisible { .. } => "channel.visible",
            Event::TypingStart { .. } => "typing.start",
            Event::TypingStop { .. } => "typing.stop",
            Event::TypingCleanUp { .. } => "typing.clean_up",
            Event::ReactionNew { .. } => "reaction.new",
            Event::ReactionUpdated { .. } => "reaction.updated",
            Event::ReactionDeleted { .. } => "reaction.deleted",
            Event::ThreadMessageNew { .. } => "notification.thread_message_new",
            Event::ThreadUpdated { .. } => "thread.updated",
            Event::DraftUpdated { .. } => "draft.updated",
            Event::DraftDeleted { .. } => "draft.deleted",
            Event::ReminderCreated { .. } => "reminder.created",
            Event::ReminderUpdated { .. } => "reminder.updated",
            Event::ReminderDue { .. } => "notification.reminder_due",
            Event::ReminderDeleted { .. } => "reminder.deleted",
            Event::HealthCheck { .. } => "health.check",
            Event::Custom { .. } => "custom",
        }
    }

    pub fn cid(&self) -> Option<&ChannelId> {
        match self {
            Event::MessageNew { cid, .. }
            | Event::MessageUpdated { cid, .. }
            | Event::MessageDeleted { cid, .. }
            | Event::MessageRead { cid, .. }
            | Event::MessageDelivered { cid, .. }
            | Event::NotificationMessageNew { cid, .. }
            | Event::NotificationMarkRead { cid, .. }
            | Event::NotificationMarkUnread { cid, .. }
            | Event::MemberAdded { cid, .. }
            | Event::MemberUpdated { cid, .. }
            | Event::MemberRemoved { cid, .. }
            | Event::NotificationAddedToChannel { cid, .. }
            | Event::NotificationRemovedFromChannel { cid, .. }
            | Event::NotificationInvited { cid, .. }
            | Event::NotificationInviteAccepted { cid, .. }
            | Event::NotificationInviteRejected { cid, .. }
            | Event::ChannelUpdated { cid, .. }
            | Event::ChannelDeleted { cid, .. }
            | Event::ChannelTruncated { cid, .. }
            | Event::ChannelHidden { cid, .. }
            | Event::ChannelVisible { cid, .. }
            | Event::TypingStart { cid, .. }
            | Event::TypingStop { cid, .. }
            | Event::TypingCleanUp { cid, .. }
            | Event::ReactionNew { cid, .. }
            | Event::ReactionUpdated { cid, .. }
            | Event::ReactionDeleted { cid, .. }
            | Event::ThreadMessageNew { cid, .. }
            | Event::ThreadUpdated { cid, .. }
            | Event::DraftUpdated { cid, .. }
            | Event::DraftDeleted { cid, .. }
            | Event::ReminderCreated { cid, .. }
            | Event::ReminderUpdated { cid, .. }
            | Event::ReminderDue { cid, .. }
            | Event::ReminderDeleted { cid, .. } => Some(cid),
            Event::UserBanned { cid, .. }
            | Event::UserUnbanned { cid, .. }
            | Event::UserMessagesDeleted { cid, .. }
            | Event::Custom { cid, .. } => cid.as_ref(),
            Event::NotificationMarkAllRead { .. }
            | Event::UserUpdated { .. }
            | Event::NotificationMutesUpdated { .. }
            | Event::HealthCheck { .. } => None,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Event::Custom { created_at, .. } => *created_at,
            Event::MessageNew { created_at, .. }
            | Event::MessageUpdated { created_at, .. }
            | Event::MessageDeleted { created_at, .. }
            | Event::MessageRead { created_at, .. }
            | Event::MessageDelivered { created_at, .. }
            | Event::NotificationMessageNew { created_at, .. }
            | Event::NotificationMarkRead { created_at, .. }
            | Event::NotificationMarkAllRead { created_at, .. }
            | Event::NotificationMarkUnread { created_at, .. }
            | Event::MemberAdded { created_at, .. }
            | Event::MemberUpdated { created_at, .. }
            | Event::MemberRemoved { created_at, .. }
            | Event::NotificationAddedToChannel { created_at, .. }
            | Event::NotificationRemovedFromChannel { created_at, .. }
            | Event::NotificationInvited { created_at, .. }
            | Event::NotificationInviteAccepted { created_at, .. }
            | Event::NotificationInviteRejected { created_at, .. }
            | Event::UserBanned { created_at, .. }
            | Event::UserUnbanned { created_at, .. }
            | Event::UserMessagesDeleted { created_at, .. }
            | Event::UserUpdated { created_at, .. }
            | Event::NotificationMutesUpdated { created_at, .. }
            | Event::ChannelUpdated { created_at, .. }
            | Event::ChannelDeleted { created_at, .. }
            | Event::ChannelTruncated { created_at, .. }
            | Event::ChannelHidden { created_at, .. }
            | Event::ChannelVisible { created_at, .. }
            | Event::TypingStart { created_at, .. }
            | Event::TypingStop { created_at, .. }
            | Event::TypingCleanUp { created_at, .. }
            | Event::ReactionNew { created_at, .. }
            | Event::ReactionUpdated { created_at, .. }
            | Event::ReactionDeleted { created_at, .. }
            | Event::ThreadMessageNew { created_at, .. }
            | Event::ThreadUpdated { created_at, .. }
            | Event::DraftUpdated { created_at, .. }
            | Event::DraftDeleted { created_at, .. }
            | Event::ReminderCreated { created_at, .. }
            | Event::ReminderUpdated { created_at, .. }
            | Event::ReminderDue { created_at, .. }
            | Event::ReminderDeleted { created_at, .. }
            | Event::HealthCheck { created_at, .. } => Some(*created_at),
        }
    }

    /// Entity payloads the generic upsert layer writes. Drafts and reminders are
    /// owned by their own middlewares and are not listed here.
    pub fn payloads(&self) -> EventPayloads<'_> {
        let mut out = EventPayloads::default();
        match self {
            Event::MessageNew {
                user,
                message,
                channel,
                unread,
                ..
            } => {
                out.user = Some(user);
                out.message = Some(message);
                out.channel = channel.as_ref();
                out.unread = *unread;
            }
            Event::MessageUpdated { user, message, .. }
            | Event::MessageDeleted { user, message, .. } => {
                out.user = user.as_ref();
                out.message = Some(message);
            }
            Event::MessageRead {
                user,
                thread,
                unread,
                ..
            } => {
                out.user = Some(user);
                out.thread = thread.as_ref();
                out.unread = *unread;
            }
            Event::MessageDelivered { user, .. }
            | Event::MemberRemoved { user, .. }
            | Event::NotificationRemovedFromChannel { user, .. }
            | Event::UserBanned { user, .. }
            | Event::UserUnbanned { user, .. }
            | Event::UserMessagesDeleted { user, .. }
            | Event::UserUpdated { user, .. }
            | Event::TypingStart { user, .. }
            | Event::TypingStop { user, .. } => {
                out.user = Some(user);
            }
            Event::NotificationMessageNew {
                channel,
                message,
                unread,
                ..
            } => {
                out.channel = Some(channel);
                out.message = Some(message);
                out.unread = *unread;
            }
            Event::NotificationMarkRead { user, unread, .. }
            | Event::NotificationMarkAllRead { user, unread, .. }
            | Event::NotificationMarkUnread { user, unread, .. } => {
                out.user = Some(user);
                out.unread = *unread;
            }
            Event::MemberAdded { user, member, .. } | Event::MemberUpdated { user, member, .. } => {
                out.user = Some(user);
                out.member = Some(member);
            }
            Event::NotificationAddedToChannel {
                channel,
                member,
                unread,
                ..
            } => {
                out.channel = Some(channel);
                out.member = Some(member);
                out.unread = *unread;
            }
            Event::NotificationInvited {
                channel,
                user,
                member,
                ..
            }
            | Event::NotificationInviteAccepted {
                channel,
                user,
                member,
                ..
            }
            | Event::NotificationInviteRejected {
                channel,
                user,
                member,
                ..
            } => {
                out.channel = channel.as_ref();
                out.user = Some(user);
                out.member = Some(member);
            }
            Event::NotificationMutesUpdated { me, .. } => {
                out.current_user = Some(me);
            }
            Event::ChannelUpdated {
                channel,
                user,
                message,
                ..
            } => {
                out.channel = Some(channel);
                out.user = user.as_ref();
                out.message = message.as_ref();
            }
            Event::ChannelDeleted { channel, .. } => {
                out.channel = channel.as_ref();
            }
            Event::ChannelTruncated {
                channel,
                user,
                message,
                ..
            } => {
                out.channel = channel.as_ref();
                out.user = user.as_ref();
                out.message = message.as_ref();
            }
            Event::ChannelHidden { user, .. } | Event::ChannelVisible { user, .. } => {
                out.user = user.as_ref();
            }
            Event::ReactionNew {
                user,
                message,
                reaction,
                ..
            }
            | Event::ReactionUpdated {
                user,
                message,
                reaction,
                ..
            }
            | Event::ReactionDeleted {
                user,
                message,
                reaction,
                ..
            } => {
                out.user = Some(user);
                out.message = message.as_ref();
                out.reaction = Some(reaction);
            }
            Event::ThreadMessageNew {
                message,
                channel,
                thread,
                unread,
                ..
            } => {
                out.message = Some(message);
                out.channel = channel.as_ref();
                out.thread = thread.as_ref();
                out.unread = *unread;
            }
            Event::ThreadUpdated { thread, .. } => {
                out.thread = Some(thread);
            }
            Event::HealthCheck { me, .. } => {
                out.current_user = me.as_ref();
            }
            Event::TypingCleanUp { .. }
            | Event::DraftUpdated { .. }
            | Event::DraftDeleted { .. }
            | Event::ReminderCreated { .. }
            | Event::ReminderUpdated { .. }
            | Event::ReminderDue { .. }
            | Event::ReminderDeleted { .. }
            | Event::Custom { .. } => {}
        }
        out
    }

    /// The user the event is about, when it names one.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Event::TypingCleanUp { user_id, .. } => Some(user_id),
            _ => self.payloads().user.map(|user| &user.id),
        }
    }
}

#[cfg(test)]
#[path = "tests/events_tests.rs"]
mod tests;
