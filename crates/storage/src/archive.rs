use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use crate::model::{
    Channel, ChannelRead, ChannelUserKey, Draft, Member, MemberListQuery, Message, Reaction,
    Reminder, Replica, Thread, User,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://./data/replica.db";

/// Persists committed replicas to SQLite as one JSON row per record.
#[derive(Clone)]
pub struct ReplicaArchive {
    pool: Pool<Sqlite>,
}

impl ReplicaArchive {
    pub async fn open(database_url: &str) -> Result<Self> {
        let database_url = prepare_database_url(database_url)?;
        let in_memory = database_url.starts_with("sqlite::memory:");

        let connect_options =
            SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            // every in-memory connection is its own database
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open replica archive at '{database_url}'"))?;

        let archive = Self { pool };
        archive.ensure_records_table().await?;
        Ok(archive)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_records_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS replica_records (
                kind       TEXT NOT NULL,
                record_id  TEXT NOT NULL,
                body       TEXT NOT NULL,
                saved_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (kind, record_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure replica_records table exists")?;
        Ok(())
    }

    /// Replaces the archived replica with `replica` in one SQL transaction.
    pub async fn save(&self, replica: &Replica) -> Result<()> {
        let rows = encode_records(replica)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin archive transaction")?;
        sqlx::query("DELETE FROM replica_records")
            .execute(&mut *tx)
            .await
            .context("failed to clear archived records")?;
        for (kind, record_id, body) in rows {
            sqlx::query("INSERT INTO replica_records (kind, record_id, body) VALUES (?, ?, ?)")
                .bind(kind)
                .bind(&record_id)
                .bind(body)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to archive {kind} '{record_id}'"))?;
        }
        tx.commit()
            .await
            .context("failed to commit archive transaction")?;
        Ok(())
    }

    pub async fn load(&self) -> Result<Replica> {
        let rows = sqlx::query(
            "SELECT kind, record_id, body FROM replica_records ORDER BY kind, record_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to read archived records")?;

        let mut replica = Replica::default();
        for row in rows {
            let kind: String = row.try_get("kind")?;
            let record_id: String = row.try_get("record_id")?;
            let body: String = row.try_get("body")?;
            match kind.as_str() {
                "current_user" => replica.current_user = Some(decode(&kind, &record_id, &body)?),
                "user" => {
                    let user: User = decode(&kind, &record_id, &body)?;
                    replica.users.insert(user.id.clone(), user);
                }
                "channel" => {
                    let channel: Channel = decode(&kind, &record_id, &body)?;
                    replica.channels.insert(channel.cid.clone(), channel);
                }
                "message" => {
                    let message: Message = decode(&kind, &record_id, &body)?;
                    replica.messages.insert(message.id.clone(), message);
                }
                "channel_read" => {
                    let read: ChannelRead = decode(&kind, &record_id, &body)?;
                    let key = ChannelUserKey::new(&read.cid, &read.user_id);
                    replica.reads.insert(key, read);
                }
                "member" => {
                    let member: Member = decode(&kind, &record_id, &body)?;
                    let key = ChannelUserKey::new(&member.cid, &member.user_id);
                    replica.members.insert(key, member);
                }
                "member_query" => {
                    let query: MemberListQuery = decode(&kind, &record_id, &body)?;
                    replica.member_queries.insert(query.id.clone(), query);
                }
                "reaction" => {
                    let reaction: Reaction = decode(&kind, &record_id, &body)?;
                    replica.reactions.insert(reaction.key(), reaction);
                }
                "thread" => {
                    let thread: Thread = decode(&kind, &record_id, &body)?;
                    replica.threads.insert(thread.parent_message_id.clone(), thread);
                }
                "reminder" => {
                    let reminder: Reminder = decode(&kind, &record_id, &body)?;
                    replica.reminders.insert(reminder.message_id.clone(), reminder);
                }
                "draft" => {
                    let draft: Draft = decode(&kind, &record_id, &body)?;
                    replica.drafts.insert(draft.key(), draft);
                }
                other => bail!("unknown archived record kind '{other}' for '{record_id}'"),
            }
        }
        Ok(replica)
    }
}

fn encode_records(replica: &Replica) -> Result<Vec<(&'static str, String, String)>> {
    let mut rows = Vec::new();
    if let Some(user) = &replica.current_user {
        rows.push(encode("current_user", user.id.to_string(), user)?);
    }
    for user in replica.users.values() {
        rows.push(encode("user", user.id.to_string(), user)?);
    }
    for channel in replica.channels.values() {
        rows.push(encode("channel", channel.cid.to_string(), channel)?);
    }
    for message in replica.messages.values() {
        rows.push(encode("message", message.id.to_string(), message)?);
    }
    for read in replica.reads.values() {
        rows.push(encode("channel_read", format!("{}/{}", read.cid, read.user_id), read)?);
    }
    for member in replica.members.values() {
        rows.push(encode("member", format!("{}/{}", member.cid, member.user_id), member)?);
    }
    for query in replica.member_queries.values() {
        rows.push(encode("member_query", query.id.clone(), query)?);
    }
    for reaction in replica.reactions.values() {
        let record_id = format!("{}/{}/{}", reaction.message_id, reaction.user_id, reaction.kind);
        rows.push(encode("reaction", record_id, reaction)?);
    }
    for thread in replica.threads.values() {
        rows.push(encode("thread", thread.parent_message_id.to_string(), thread)?);
    }
    for reminder in replica.reminders.values() {
        rows.push(encode("reminder", reminder.message_id.to_string(), reminder)?);
    }
    for draft in replica.drafts.values() {
        let record_id = match &draft.parent_id {
            Some(parent_id) => format!("{}/{parent_id}", draft.cid),
            None => draft.cid.to_string(),
        };
        rows.push(encode("draft", record_id, draft)?);
    }
    Ok(rows)
}

fn encode<T: Serialize>(
    kind: &'static str,
    record_id: String,
    record: &T,
) -> Result<(&'static str, String, String)> {
    let body = serde_json::to_string(record)
        .with_context(|| format!("failed to encode {kind} '{record_id}'"))?;
    Ok((kind, record_id, body))
}

fn decode<T: DeserializeOwned>(kind: &str, record_id: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).with_context(|| format!("failed to decode {kind} '{record_id}'"))
}

/// Turns a configured database location into a sqlite URL and creates its parent directory.
pub fn prepare_database_url(raw_database_url: &str) -> Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(parent) = sqlite_path(database_url)
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
    else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(&parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/archive_tests.rs"]
mod tests;
