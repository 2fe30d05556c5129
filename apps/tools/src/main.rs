use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, ChainDependencies, EventMiddlewareChain, EventNotificationCenter,
};
use shared::{
    domain::{ChannelId, UserId},
    events::Event,
};
use storage::{ReplicaArchive, Store};
use tracing::{info, warn};

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured archive location.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Applies a JSON-lines event log to the archived replica.
    Replay {
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        current_user: Option<String>,
    },
    Inspect {
        #[command(subcommand)]
        target: InspectTarget,
    },
}

#[derive(Subcommand, Debug)]
enum InspectTarget {
    Channel { cid: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let database_url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database_url.clone());
    let archive = ReplicaArchive::open(&database_url).await?;

    match cli.command {
        Command::Replay {
            events,
            current_user,
        } => {
            let current_user = current_user
                .map(UserId::new)
                .or(settings.current_user_id.clone())
                .ok_or_else(|| anyhow!("no current user; pass --current-user"))?;
            replay(&archive, &events, current_user).await?;
        }
        Command::Inspect {
            target: InspectTarget::Channel { cid },
        } => {
            let cid: ChannelId = cid.parse()?;
            inspect_channel(&archive, &cid).await?;
        }
    }

    Ok(())
}

async fn replay(archive: &ReplicaArchive, path: &Path, current_user: UserId) -> Result<()> {
    let store = Arc::new(Store::new(archive.load().await?));
    store.write(|session| {
        session.set_current_user(&current_user);
        Ok(())
    })?;
    let center = EventNotificationCenter::new(
        store.clone(),
        EventMiddlewareChain::standard(ChainDependencies::default()),
    );

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let (mut applied, mut swallowed, mut skipped) = (0usize, 0usize, 0usize);
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = match Event::decode(&line) {
            Ok(event) => event,
            Err(err) => {
                warn!(line = index + 1, error = %err, "replay: skipping undecodable event");
                skipped += 1;
                continue;
            }
        };
        match center.process(event)? {
            Some(_) => applied += 1,
            None => swallowed += 1,
        }
    }

    archive.save(&store.snapshot()).await?;
    info!(applied, swallowed, skipped, "replay: finished");
    println!("applied={applied} swallowed={swallowed} skipped={skipped}");
    Ok(())
}

async fn inspect_channel(archive: &ReplicaArchive, cid: &ChannelId) -> Result<()> {
    let replica = archive.load().await?;
    let channel = replica
        .channel(cid)
        .ok_or_else(|| anyhow!("channel {cid} is not in the replica"))?;

    println!(
        "{cid} hidden={} members={} truncated_at={:?} deleted_at={:?}",
        channel.is_hidden, channel.member_count, channel.truncated_at, channel.deleted_at
    );
    if let Some(me) = replica.current_user_id() {
        if let Some(read) = replica.channel_read(cid, me) {
            println!(
                "read user={me} last_read_at={:?} unread={} silent={} thread_replies={}",
                read.last_read_at,
                read.unread_messages_count,
                read.unread_silent_messages_count,
                read.unread_thread_replies_count
            );
        }
    }
    for message in replica.channel_messages(cid) {
        println!(
            "{} {} {}: {}",
            message.created_at.to_rfc3339(),
            message.id,
            message.user_id,
            message.text
        );
    }
    Ok(())
}
