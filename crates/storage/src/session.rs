use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use shared::{
    domain::{ChannelId, MessageId, UserId},
    protocol::{
        ChannelPayload, ChannelReadPayload, CurrentUserPayload, DraftPayload, MemberPayload,
        MessagePayload, ReactionPayload, ReminderPayload, ThreadPayload, UnreadCounts,
        UserPayload,
    },
};

use crate::{
    error::StoreError,
    model::{
        Channel, ChannelRead, ChannelUserKey, CurrentUser, Draft, DraftKey, Member,
        MemberListQuery, Message, Reaction, ReactionKey, Reminder, Replica, Thread, ThreadRead,
        User,
    },
};

/// One write transaction over the replica.
///
/// Mutations land in a private working copy that the [`crate::Store`] swaps in on
/// commit. The replica as it stood when the transaction began stays readable
/// through [`Session::committed_message`], which is how redelivered events are
/// told apart from genuinely new ones.
pub struct Session<'a> {
    committed: &'a Replica,
    working: Replica,
    touched_messages: BTreeSet<MessageId>,
}

impl<'a> Session<'a> {
    // clones the replica once per event
    pub(crate) fn begin(committed: &'a Replica) -> Self {
        Self {
            committed,
            working: committed.clone(),
            touched_messages: BTreeSet::new(),
        }
    }

    pub(crate) fn into_replica(self) -> Replica {
        self.working
    }

    pub fn replica(&self) -> &Replica {
        &self.working
    }

    /// Runs `f` and undoes everything it wrote if it fails.
    ///
    /// Like opening the session, this snapshots the whole working replica, so its
    /// cost grows with the replica. An undo log of touched keys would be needed
    /// once replicas stop fitting a single client's working set.
    pub fn savepoint<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let replica = self.working.clone();
        let touched = self.touched_messages.clone();
        let result = f(self);
        if result.is_err() {
            self.working = replica;
            self.touched_messages = touched;
        }
        result
    }

    pub fn current_user_id(&self) -> Option<&UserId> {
        self.working.current_user_id()
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.working.current_user.as_ref()
    }

    pub fn current_user_mut(&mut self) -> Option<&mut CurrentUser> {
        self.working.current_user.as_mut()
    }

    pub fn is_current_user(&self, user_id: &UserId) -> bool {
        self.current_user_id() == Some(user_id)
    }

    /// Switches the replica to `user_id`, keeping the record if it already belongs to them.
    pub fn set_current_user(&mut self, user_id: &UserId) -> &mut CurrentUser {
        let current = &mut self.working.current_user;
        if current.as_ref().map(|user| &user.id) != Some(user_id) {
            *current = Some(CurrentUser::new(user_id.clone()));
        }
        current.get_or_insert_with(|| CurrentUser::new(user_id.clone()))
    }

    pub fn save_current_user(&mut self, payload: &CurrentUserPayload) -> &mut CurrentUser {
        let user = self.set_current_user(&payload.id);
        user.muted_user_ids = payload.muted_user_ids.clone();
        user.muted_channel_ids = payload.muted_channel_ids.clone();
        user.delivery_receipts_enabled = payload.delivery_receipts_enabled;
        user
    }

    pub fn update_unread_totals(&mut self, counts: UnreadCounts) {
        if let Some(user) = self.working.current_user.as_mut() {
            user.unread = counts;
        }
    }

    /// Advances the newest-event watermark; older timestamps are ignored.
    pub fn record_event_time(&mut self, at: DateTime<Utc>) {
        if let Some(user) = self.working.current_user.as_mut() {
            if user.last_received_event_at.map_or(true, |seen| at > seen) {
                user.last_received_event_at = Some(at);
            }
        }
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.working.users.get(id)
    }

    pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.working.users.get_mut(id)
    }

    pub fn save_user(&mut self, payload: &UserPayload) -> &mut User {
        let user = self
            .working
            .users
            .entry(payload.id.clone())
            .or_insert_with(|| User {
                id: payload.id.clone(),
                name: None,
                is_banned: false,
                online: false,
                updated_at: None,
            });
        if payload.name.is_some() {
            user.name = payload.name.clone();
        }
        if payload.updated_at.is_some() {
            user.updated_at = payload.updated_at;
        }
        user.is_banned = payload.banned;
        user.online = payload.online;
        user
    }

    pub fn channel(&self, cid: &ChannelId) -> Option<&Channel> {
        self.working.channels.get(cid)
    }

    pub fn channel_mut(&mut self, cid: &ChannelId) -> Option<&mut Channel> {
        self.working.channels.get_mut(cid)
    }

    /// Channels spring into existence the first time anything references them.
    pub fn ensure_channel(&mut self, cid: &ChannelId) -> &mut Channel {
        self.working
            .channels
            .entry(cid.clone())
            .or_insert_with(|| Channel::new(cid.clone()))
    }

    pub fn save_channel(&mut self, payload: &ChannelPayload) -> Result<(), StoreError> {
        let cid = &payload.cid;
        let channel = self.ensure_channel(cid);
        if payload.name.is_some() {
            channel.name = payload.name.clone();
        }
        if let Some(config) = &payload.config {
            channel.config = config.clone();
        }
        if let Some(hidden) = payload.hidden {
            channel.is_hidden = hidden;
        }
        if payload.deleted_at.is_some() {
            channel.deleted_at = payload.deleted_at;
        }
        if payload.created_at.is_some() {
            channel.created_at = payload.created_at;
        }
        if payload.updated_at.is_some() {
            channel.updated_at = payload.updated_at;
        }
        if let Some(count) = payload.member_count {
            channel.member_count = count;
        }
        if let Some(count) = payload.watcher_count {
            channel.watcher_count = count;
        }

        if let Some(truncated_at) = payload.truncated_at {
            self.truncate_channel(cid, truncated_at);
        }
        for member in &payload.members {
            self.save_member(cid, member);
        }
        if let Some(membership) = &payload.membership {
            self.save_member(cid, membership);
            self.ensure_channel(cid).membership = Some(membership.user.id.clone());
        }
        for watcher in &payload.watchers {
            self.save_user(watcher);
            self.ensure_channel(cid).watchers.insert(watcher.id.clone());
        }
        for message in &payload.messages {
            self.save_message(message, Some(cid))?;
        }
        for read in &payload.reads {
            self.save_channel_read(cid, read);
        }
        Ok(())
    }

    /// Stamps `truncated_at` and drops every materialized message created at or before it.
    pub fn truncate_channel(&mut self, cid: &ChannelId, at: DateTime<Utc>) {
        let Replica {
            channels, messages, ..
        } = &mut self.working;
        let channel = channels
            .entry(cid.clone())
            .or_insert_with(|| Channel::new(cid.clone()));
        channel.truncated_at = Some(at);
        channel.messages.retain(|id| {
            messages
                .get(id)
                .is_some_and(|message| message.created_at > at)
        });
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.working.messages.get(id)
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.working.messages.get_mut(id)
    }

    /// The message as it was when this transaction began.
    pub fn committed_message(&self, id: &MessageId) -> Option<&Message> {
        self.committed.messages.get(id)
    }

    pub fn is_newly_inserted(&self, id: &MessageId) -> bool {
        self.touched_messages.contains(id)
            && !self.committed.messages.contains_key(id)
            && self.working.messages.contains_key(id)
    }

    pub fn newly_inserted_message_ids(&self) -> BTreeSet<MessageId> {
        self.touched_messages
            .iter()
            .filter(|id| self.is_newly_inserted(id))
            .cloned()
            .collect()
    }

    /// Upserts a message and its author. `cid` is used when the payload carries none.
    ///
    /// A newly inserted message joins its channel's list when the current user can
    /// see it there. Hard-deleted messages are left untouched.
    pub fn save_message(
        &mut self,
        payload: &MessagePayload,
        cid: Option<&ChannelId>,
    ) -> Result<(), StoreError> {
        let Some(cid) = payload.cid.as_ref().or(cid).cloned() else {
            return Err(StoreError::MissingChannelReference(payload.id.clone()));
        };

        let previous = self.working.messages.get(&payload.id);
        if let Some(previous) = previous {
            if previous.cid != cid {
                return Err(StoreError::ChannelMismatch {
                    message_id: payload.id.clone(),
                    stored: previous.cid.clone(),
                    requested: cid,
                });
            }
            if previous.is_hard_deleted {
                return Ok(());
            }
        }

        let mut message = message_from_payload(payload, cid.clone());
        let inserted = match previous {
            Some(previous) => {
                message.deleted_at = message.deleted_at.or(previous.deleted_at);
                message.visibility_suppressed = previous.visibility_suppressed;
                false
            }
            None => true,
        };

        self.save_user(&payload.user);
        self.ensure_channel(&cid);
        self.working.messages.insert(payload.id.clone(), message);
        self.touched_messages.insert(payload.id.clone());

        for reaction in &payload.latest_reactions {
            self.save_reaction(reaction)?;
        }

        if inserted && self.belongs_in_channel_list(&payload.id) {
            self.materialize_message(&payload.id)?;
        }
        Ok(())
    }

    fn belongs_in_channel_list(&self, id: &MessageId) -> bool {
        let Some(message) = self.working.messages.get(id) else {
            return false;
        };
        let visible = match self.current_user_id() {
            Some(user_id) => message.is_visible_to(user_id),
            None => message.restricted_visibility.is_empty(),
        };
        let after_truncation = self
            .working
            .channels
            .get(&message.cid)
            .and_then(|channel| channel.truncated_at)
            .map_or(true, |truncated_at| message.created_at > truncated_at);
        visible
            && after_truncation
            && !message.is_hard_deleted
            && !message.is_thread_reply_hidden_from_channel()
    }

    /// Inserts the message into its channel list in `created_at` order.
    /// Returns `false` when it was already there.
    pub fn materialize_message(&mut self, id: &MessageId) -> Result<bool, StoreError> {
        let Replica {
            channels, messages, ..
        } = &mut self.working;
        let message = messages
            .get(id)
            .ok_or_else(|| StoreError::MessageMissing(id.clone()))?;
        let channel = channels
            .get_mut(&message.cid)
            .ok_or_else(|| StoreError::ChannelMissing(message.cid.clone()))?;
        if channel.messages.contains(id) {
            return Ok(false);
        }

        let created_at = message.created_at;
        let position = channel
            .messages
            .iter()
            .position(|other| {
                messages
                    .get(other)
                    .is_some_and(|other| other.created_at > created_at)
            })
            .unwrap_or(channel.messages.len());
        channel.messages.insert(position, id.clone());
        Ok(true)
    }

    /// Removes the message from its channel list. The record itself stays.
    pub fn dematerialize_message(&mut self, id: &MessageId) -> bool {
        let Some(cid) = self.working.messages.get(id).map(|message| message.cid.clone()) else {
            return false;
        };
        let Some(channel) = self.working.channels.get_mut(&cid) else {
            return false;
        };
        let before = channel.messages.len();
        channel.messages.retain(|other| other != id);
        channel.messages.len() != before
    }

    pub fn is_materialized(&self, id: &MessageId) -> bool {
        self.working
            .messages
            .get(id)
            .and_then(|message| self.working.channels.get(&message.cid))
            .is_some_and(|channel| channel.is_materialized(id))
    }

    pub fn mark_message_soft_deleted(&mut self, id: &MessageId, at: DateTime<Utc>) -> bool {
        match self.working.messages.get_mut(id) {
            Some(message) if !message.is_deleted() => {
                message.deleted_at = Some(at);
                true
            }
            _ => false,
        }
    }

    pub fn mark_message_hard_deleted(&mut self, id: &MessageId) -> bool {
        let changed = match self.working.messages.get_mut(id) {
            Some(message) if !message.is_hard_deleted => {
                message.is_hard_deleted = true;
                true
            }
            _ => false,
        };
        if changed {
            self.dematerialize_message(id);
        }
        changed
    }

    pub fn message_ids_by_author(
        &self,
        user_id: &UserId,
        cid: Option<&ChannelId>,
    ) -> Vec<MessageId> {
        self.working
            .messages
            .values()
            .filter(|message| &message.user_id == user_id)
            .filter(|message| cid.map_or(true, |cid| &message.cid == cid))
            .map(|message| message.id.clone())
            .collect()
    }

    pub fn channel_read(&self, cid: &ChannelId, user_id: &UserId) -> Option<&ChannelRead> {
        self.working.channel_read(cid, user_id)
    }

    pub fn channel_read_mut(
        &mut self,
        cid: &ChannelId,
        user_id: &UserId,
    ) -> Option<&mut ChannelRead> {
        self.working
            .reads
            .get_mut(&ChannelUserKey::new(cid, user_id))
    }

    pub fn ensure_channel_read(&mut self, cid: &ChannelId, user_id: &UserId) -> &mut ChannelRead {
        self.ensure_channel(cid);
        self.working
            .reads
            .entry(ChannelUserKey::new(cid, user_id))
            .or_insert_with(|| ChannelRead::new(cid.clone(), user_id.clone()))
    }

    pub fn save_channel_read(
        &mut self,
        cid: &ChannelId,
        payload: &ChannelReadPayload,
    ) -> &mut ChannelRead {
        self.save_user(&payload.user);
        let read = self.ensure_channel_read(cid, &payload.user.id);
        if payload.last_read.is_some() {
            read.last_read_at = payload.last_read;
        }
        if payload.last_read_message_id.is_some() {
            read.last_read_message_id = payload.last_read_message_id.clone();
        }
        read.unread_messages_count = payload.unread_messages;
        if payload.last_delivered_at.is_some() {
            read.last_delivered_at = payload.last_delivered_at;
            read.last_delivered_message_id = payload.last_delivered_message_id.clone();
        }
        read
    }

    pub fn channel_reads_for_user(&self, user_id: &UserId) -> Vec<ChannelId> {
        self.working
            .reads
            .values()
            .filter(|read| &read.user_id == user_id)
            .map(|read| read.cid.clone())
            .collect()
    }

    pub fn channel_reads_in_mut<'s>(
        &'s mut self,
        cid: &'s ChannelId,
    ) -> impl Iterator<Item = &'s mut ChannelRead> + 's {
        self.working
            .reads
            .values_mut()
            .filter(move |read| &read.cid == cid)
    }

    pub fn member(&self, cid: &ChannelId, user_id: &UserId) -> Option<&Member> {
        self.working.member(cid, user_id)
    }

    pub fn member_mut(&mut self, cid: &ChannelId, user_id: &UserId) -> Option<&mut Member> {
        self.working
            .members
            .get_mut(&ChannelUserKey::new(cid, user_id))
    }

    pub fn ensure_member(&mut self, cid: &ChannelId, user_id: &UserId) -> &mut Member {
        self.ensure_channel(cid).members.insert(user_id.clone());
        self.working
            .members
            .entry(ChannelUserKey::new(cid, user_id))
            .or_insert_with(|| Member::new(cid.clone(), user_id.clone()))
    }

    pub fn save_member(&mut self, cid: &ChannelId, payload: &MemberPayload) -> &mut Member {
        self.save_user(&payload.user);
        let member = self.ensure_member(cid, &payload.user.id);
        member.role = payload.role;
        member.is_banned = payload.banned;
        member.is_shadow_banned = payload.shadow_banned;
        member.ban_expires_at = payload.ban_expires;
        member.is_invited = payload.invited;
        if payload.invite_accepted_at.is_some() {
            member.invite_accepted_at = payload.invite_accepted_at;
        }
        if payload.invite_rejected_at.is_some() {
            member.invite_rejected_at = payload.invite_rejected_at;
        }
        if payload.created_at.is_some() {
            member.created_at = payload.created_at;
        }
        if payload.updated_at.is_some() {
            member.updated_at = payload.updated_at;
        }
        member
    }

    /// Deletes the member, unlinks it from the channel and from observed member lists.
    pub fn remove_member(&mut self, cid: &ChannelId, user_id: &UserId) -> Option<Member> {
        if let Some(channel) = self.working.channels.get_mut(cid) {
            channel.members.remove(user_id);
            if channel.membership.as_ref() == Some(user_id) {
                channel.membership = None;
            }
        }
        self.unlink_member_from_queries(cid, user_id);
        self.working
            .members
            .remove(&ChannelUserKey::new(cid, user_id))
    }

    pub fn member_list_query(&self, id: &str) -> Option<&MemberListQuery> {
        self.working.member_queries.get(id)
    }

    pub fn save_member_list_query(
        &mut self,
        id: &str,
        cid: &ChannelId,
    ) -> Result<&mut MemberListQuery, StoreError> {
        if !self.working.channels.contains_key(cid) {
            return Err(StoreError::ChannelMissing(cid.clone()));
        }
        Ok(self
            .working
            .member_queries
            .entry(id.to_string())
            .or_insert_with(|| MemberListQuery {
                id: id.to_string(),
                cid: cid.clone(),
                members: BTreeSet::new(),
            }))
    }

    pub fn link_member_to_query(&mut self, id: &str, user_id: &UserId) -> bool {
        self.working
            .member_queries
            .get_mut(id)
            .is_some_and(|query| query.members.insert(user_id.clone()))
    }

    pub fn unlink_member_from_queries(&mut self, cid: &ChannelId, user_id: &UserId) -> usize {
        let mut unlinked = 0;
        for query in self.working.member_queries.values_mut() {
            if &query.cid == cid && query.members.remove(user_id) {
                unlinked += 1;
            }
        }
        unlinked
    }

    pub fn reaction(&self, key: &ReactionKey) -> Option<&Reaction> {
        self.working.reactions.get(key)
    }

    /// Reactions attach to stored messages only.
    pub fn save_reaction(&mut self, payload: &ReactionPayload) -> Result<(), StoreError> {
        let Some(message) = self.working.messages.get(&payload.message_id) else {
            return Err(StoreError::MessageMissing(payload.message_id.clone()));
        };
        if message.is_hard_deleted {
            return Ok(());
        }

        self.save_user(&payload.user);
        let reaction = Reaction {
            message_id: payload.message_id.clone(),
            user_id: payload.user.id.clone(),
            kind: payload.kind.clone(),
            score: payload.score,
            created_at: payload.created_at,
            updated_at: payload.updated_at,
        };
        self.working.reactions.insert(reaction.key(), reaction);
        Ok(())
    }

    pub fn delete_reaction(&mut self, payload: &ReactionPayload) -> bool {
        let key = ReactionKey {
            message_id: payload.message_id.clone(),
            user_id: payload.user.id.clone(),
            kind: payload.kind.clone(),
        };
        self.working.reactions.remove(&key).is_some()
    }

    pub fn thread(&self, parent_message_id: &MessageId) -> Option<&Thread> {
        self.working.threads.get(parent_message_id)
    }

    pub fn thread_mut(&mut self, parent_message_id: &MessageId) -> Option<&mut Thread> {
        self.working.threads.get_mut(parent_message_id)
    }

    pub fn save_thread(&mut self, payload: &ThreadPayload) -> Result<(), StoreError> {
        if let Some(parent) = &payload.parent_message {
            self.save_message(parent, Some(&payload.cid))?;
        }
        let mut latest_replies = Vec::with_capacity(payload.latest_replies.len());
        for reply in &payload.latest_replies {
            self.save_message(reply, Some(&payload.cid))?;
            latest_replies.push(reply.id.clone());
        }
        for read in &payload.read {
            self.save_user(&read.user);
        }

        let thread = self
            .working
            .threads
            .entry(payload.parent_message_id.clone())
            .or_insert_with(|| Thread::new(payload.parent_message_id.clone(), payload.cid.clone()));
        if payload.title.is_some() {
            thread.title = payload.title.clone();
        }
        thread.participant_count = payload.participant_count;
        thread.reply_count = payload.reply_count;
        thread.latest_replies = latest_replies;
        if payload.created_at.is_some() {
            thread.created_at = payload.created_at;
        }
        if payload.updated_at.is_some() {
            thread.updated_at = payload.updated_at;
        }
        for read in &payload.read {
            let entry = thread
                .reads
                .entry(read.user.id.clone())
                .or_insert_with(|| ThreadRead::new(read.user.id.clone()));
            entry.last_read_at = read.last_read;
            entry.last_read_message_id = read.last_read_message_id.clone();
            entry.unread_messages_count = read.unread_messages;
        }
        Ok(())
    }

    /// Thread reads are only created for threads that are already stored.
    pub fn ensure_thread_read(
        &mut self,
        parent_message_id: &MessageId,
        user_id: &UserId,
    ) -> Option<&mut ThreadRead> {
        let thread = self.working.threads.get_mut(parent_message_id)?;
        Some(
            thread
                .reads
                .entry(user_id.clone())
                .or_insert_with(|| ThreadRead::new(user_id.clone())),
        )
    }

    pub fn delete_thread(&mut self, parent_message_id: &MessageId) -> Option<Thread> {
        self.working.threads.remove(parent_message_id)
    }

    pub fn delete_threads_in_channel(&mut self, cid: &ChannelId) -> usize {
        let before = self.working.threads.len();
        self.working.threads.retain(|_, thread| &thread.cid != cid);
        before - self.working.threads.len()
    }

    pub fn reminder(&self, message_id: &MessageId) -> Option<&Reminder> {
        self.working.reminders.get(message_id)
    }

    pub fn reminder_mut(&mut self, message_id: &MessageId) -> Option<&mut Reminder> {
        self.working.reminders.get_mut(message_id)
    }

    pub fn save_reminder(&mut self, payload: &ReminderPayload) -> &mut Reminder {
        self.ensure_channel(&payload.cid);
        let reminder = Reminder {
            message_id: payload.message_id.clone(),
            cid: payload.cid.clone(),
            remind_at: payload.remind_at,
            created_at: payload.created_at,
            updated_at: payload.updated_at,
        };
        let slot = self
            .working
            .reminders
            .entry(payload.message_id.clone())
            .or_insert_with(|| reminder.clone());
        *slot = reminder;
        slot
    }

    pub fn delete_reminder(&mut self, message_id: &MessageId) -> Option<Reminder> {
        self.working.reminders.remove(message_id)
    }

    pub fn draft(&self, cid: &ChannelId, parent_id: Option<&MessageId>) -> Option<&Draft> {
        self.working.drafts.get(&DraftKey {
            cid: cid.clone(),
            parent_id: parent_id.cloned(),
        })
    }

    pub fn save_draft(&mut self, payload: &DraftPayload) -> &mut Draft {
        self.ensure_channel(&payload.cid);
        let draft = Draft {
            cid: payload.cid.clone(),
            parent_id: payload.parent_id.clone(),
            text: payload.text.clone(),
            created_at: payload.created_at,
        };
        let slot = self
            .working
            .drafts
            .entry(draft.key())
            .or_insert_with(|| draft.clone());
        *slot = draft;
        slot
    }

    pub fn delete_draft(&mut self, cid: &ChannelId, parent_id: Option<&MessageId>) -> Option<Draft> {
        self.working.drafts.remove(&DraftKey {
            cid: cid.clone(),
            parent_id: parent_id.cloned(),
        })
    }
}

fn message_from_payload(payload: &MessagePayload, cid: ChannelId) -> Message {
    Message {
        id: payload.id.clone(),
        cid,
        user_id: payload.user.id.clone(),
        text: payload.text.clone(),
        kind: payload.kind,
        created_at: payload.created_at,
        updated_at: payload.updated_at,
        deleted_at: payload.deleted_at,
        parent_id: payload.parent_id.clone(),
        show_reply_in_channel: payload.show_reply_in_channel,
        is_silent: payload.silent,
        is_shadowed: payload.shadowed,
        restricted_visibility: payload.restricted_visibility.clone(),
        is_hard_deleted: false,
        visibility_suppressed: false,
        reply_count: payload.reply_count,
        reaction_counts: payload.reaction_counts.clone(),
    }
}
