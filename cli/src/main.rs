mod relay_util;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use contactfeed_core::prelude::*;
use contactfeed_memory_storage::ContactfeedMemoryStorage;
use contactfeed_sqlite_storage::ContactfeedSqliteStorage;
use contactfeed_storage_traits::GraphStorage;
use nostr::PublicKey;
use nostr::nips::nip19::ToBech32;
use serde_json::json;

const HOUR: u64 = 3600;

#[derive(Debug, Parser)]
#[command(name = "contactfeed")]
#[command(about = "Fetch a nostr user's contact list and the recent notes of their contacts")]
struct Cli {
    /// State directory (the contact graph database persists here between runs)
    #[arg(long, env = "CONTACTFEED_STATE_DIR", default_value = ".contactfeed")]
    state_dir: PathBuf,

    /// Relay websocket URLs (defaults to a built-in relay profile)
    #[arg(long)]
    relay: Vec<String>,

    /// User public key (hex or npub)
    #[arg(long, env = "CONTACTFEED_USER")]
    user: String,

    /// How far back to look for the user's contact list
    #[arg(long, default_value_t = 24 * 7)]
    contact_lookback_hours: u64,

    /// How far back to look for notes
    #[arg(long, default_value_t = 1)]
    message_lookback_hours: u64,

    /// Stop waiting for relays after this many seconds (0 = wait for every relay)
    #[arg(long, default_value_t = 30)]
    drain_timeout_secs: u64,

    /// Keep the contact graph in memory instead of the state directory
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the user's latest contact list and store it
    Sync,

    /// Print the stored contacts of the user
    Contacts,

    /// Fetch recent notes from the user's contacts
    Feed {
        /// Use the stored contact list instead of syncing it first
        #[arg(long)]
        skip_sync: bool,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize recent notes, optionally only those about a topic (needs OPENAI_API_KEY)
    Digest {
        /// Only keep posts the model classifies as about this topic
        #[arg(long)]
        topic: Option<String>,

        /// Use the stored contact list instead of syncing it first
        #[arg(long)]
        skip_sync: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.memory {
        run(&cli, Arc::new(ContactfeedMemoryStorage::new())).await
    } else {
        std::fs::create_dir_all(&cli.state_dir)
            .with_context(|| format!("create state dir {}", cli.state_dir.display()))?;
        let path = cli.state_dir.join("graph.db");
        let storage = ContactfeedSqliteStorage::new(&path)
            .with_context(|| format!("open graph database {}", path.display()))?;
        run(&cli, Arc::new(storage)).await
    }
}

async fn run<S>(cli: &Cli, storage: Arc<S>) -> anyhow::Result<()>
where
    S: GraphStorage + Send + Sync + 'static,
{
    let user = PublicKey::parse(cli.user.trim())
        .with_context(|| format!("parse user key: {}", cli.user))?;

    // Answered from storage alone
    if let Command::Contacts = cli.cmd {
        return cmd_contacts(storage.as_ref(), &user);
    }

    let coordinator = connect(cli, storage).await?;
    let result = match &cli.cmd {
        Command::Sync => cmd_sync(cli, &coordinator, user).await,
        Command::Feed { skip_sync, json } => {
            cmd_feed(cli, &coordinator, user, *skip_sync, *json).await
        }
        Command::Digest { topic, skip_sync } => {
            cmd_digest(cli, &coordinator, user, topic.as_deref(), *skip_sync).await
        }
        Command::Contacts => Ok(()),
    };
    coordinator.shutdown().await;
    result
}

// ── Helpers ─────────────────────────────────────────────────────────────────

async fn connect<S>(cli: &Cli, storage: Arc<S>) -> anyhow::Result<Coordinator<S>>
where
    S: GraphStorage + Send + Sync + 'static,
{
    let urls = relay_util::parse_relay_urls(&cli.relay)?;
    let drain_timeout =
        (cli.drain_timeout_secs > 0).then(|| Duration::from_secs(cli.drain_timeout_secs));
    let config = CoordinatorConfig::default().with_drain_timeout(drain_timeout);

    let coordinator =
        Coordinator::connect(relay_util::connections(urls), storage, config).await;
    for failure in coordinator.connect_failures() {
        eprintln!("warning: {failure}");
    }
    if coordinator.relays().is_empty() {
        return Err(anyhow!("no relay connected"));
    }
    Ok(coordinator)
}

fn hours(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(HOUR))
}

fn print(v: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&v).context("json encode")?);
    Ok(())
}

fn npub(key: &PublicKey) -> String {
    key.to_bech32().unwrap_or_else(|_| key.to_hex())
}

async fn sync<S>(
    cli: &Cli,
    coordinator: &Coordinator<S>,
    user: PublicKey,
) -> anyhow::Result<ContactSync>
where
    S: GraphStorage + Send + Sync + 'static,
{
    let sync = coordinator
        .sync_contact_list(user, hours(cli.contact_lookback_hours))
        .await
        .context("sync contact list")?;
    if !sync.drain.is_drained() {
        eprintln!("warning: not every relay finished sending contact lists ({:?})", sync.drain);
    }
    for failure in &sync.report.failures {
        eprintln!("warning: {failure}");
    }
    Ok(sync)
}

async fn fetch<S>(
    cli: &Cli,
    coordinator: &Coordinator<S>,
    user: PublicKey,
    skip_sync: bool,
) -> anyhow::Result<FeedFetch>
where
    S: GraphStorage + Send + Sync + 'static,
{
    if !skip_sync {
        sync(cli, coordinator, user).await?;
    }
    let fetch = coordinator
        .fetch_feed(user, hours(cli.message_lookback_hours))
        .await
        .context("fetch feed")?;
    if let Some(drain) = fetch.drain
        && !drain.is_drained()
    {
        eprintln!("warning: not every relay finished sending notes ({drain:?})");
    }
    Ok(fetch)
}

// ── Commands ────────────────────────────────────────────────────────────────

fn cmd_contacts<S>(storage: &S, user: &PublicKey) -> anyhow::Result<()>
where
    S: GraphStorage,
{
    let record = storage
        .find_user(user)
        .context("read user")?
        .ok_or_else(|| anyhow!("no contact list stored for {}", npub(user)))?;
    let contacts: Vec<String> = record.contacts.iter().map(npub).collect();
    print(json!({
        "user": npub(user),
        "contacts_updated_at": record.contacts_updated_at.map(|ts| ts.as_secs()),
        "contacts": contacts,
    }))
}

async fn cmd_sync<S>(cli: &Cli, coordinator: &Coordinator<S>, user: PublicKey) -> anyhow::Result<()>
where
    S: GraphStorage + Send + Sync + 'static,
{
    let sync = sync(cli, coordinator, user).await?;
    let contacts = coordinator
        .storage()
        .contacts_of(&user)
        .context("read contacts")?;
    let outcomes: Vec<String> = sync
        .report
        .outcomes
        .iter()
        .map(|(_, outcome)| format!("{outcome:?}"))
        .collect();
    print(json!({
        "user": npub(&user),
        "relays": sync.report.relays,
        "drained_relays": sync.report.drained_relays,
        "accepted": sync.report.accepted,
        "duplicates": sync.report.duplicates,
        "outcomes": outcomes,
        "contacts": contacts.len(),
        "known_users": coordinator.storage().user_count().context("count users")?,
    }))
}

async fn cmd_feed<S>(
    cli: &Cli,
    coordinator: &Coordinator<S>,
    user: PublicKey,
    skip_sync: bool,
    as_json: bool,
) -> anyhow::Result<()>
where
    S: GraphStorage + Send + Sync + 'static,
{
    let fetch = fetch(cli, coordinator, user, skip_sync).await?;
    if as_json {
        return print(serde_json::to_value(fetch.entries()).context("json encode")?);
    }
    for entry in fetch.entries() {
        println!("{entry}");
    }
    eprintln!(
        "{} notes from {} contacts",
        fetch.entries().len(),
        fetch.contacts
    );
    Ok(())
}

async fn cmd_digest<S>(
    cli: &Cli,
    coordinator: &Coordinator<S>,
    user: PublicKey,
    topic: Option<&str>,
    skip_sync: bool,
) -> anyhow::Result<()>
where
    S: GraphStorage + Send + Sync + 'static,
{
    let config = OpenAiConfig::from_env().ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
    let analyzer =
        FeedAnalyzer::new(OpenAiCompletion::new(config).context("build completion client")?);

    let fetch = fetch(cli, coordinator, user, skip_sync).await?;
    let entries = match topic {
        Some(topic) => {
            let result = analyzer.posts_about_topic(fetch.entries(), topic).await;
            eprintln!(
                "{} of {} posts are about {topic} ({} could not be classified)",
                result.matches.len(),
                result.processed,
                result.failures
            );
            result.matches
        }
        None => fetch.entries().to_vec(),
    };

    if entries.is_empty() {
        eprintln!("nothing to summarize");
        return Ok(());
    }
    let summary = analyzer.summarize(&entries).await.context("summarize feed")?;
    println!("{summary}");
    Ok(())
}
