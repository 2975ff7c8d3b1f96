//! # skystream
//!
//! Follow the firehose and print one JSON line per post (or per raw event
//! with `--account`). Ctrl-C disconnects and exits once the stream drains.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use skystream_client::{
    AccountStream, ClientConfig, EventCategory, FeedEvent, FirehoseClient, MentionStream,
    PostStream, SubscriptionFilter,
};
use skystream_core::logging::init_subscriber;
use skystream_settings::SkystreamSettings;
use tracing::{error, info, warn};

/// Follow a Jetstream-style firehose.
#[derive(Parser, Debug)]
#[command(name = "skystream", about = "Follow the firehose and print posts as JSON lines")]
struct Cli {
    /// Subscribe endpoint (overrides settings).
    #[arg(long)]
    endpoint: Option<String>,

    /// Collection NSID to receive; repeatable (overrides settings).
    #[arg(long = "collection", value_name = "NSID")]
    collections: Vec<String>,

    /// Account DID to receive; repeatable (overrides settings).
    #[arg(long = "did", value_name = "DID")]
    dids: Vec<String>,

    /// Print every raw event for one account instead of posts.
    #[arg(long, value_name = "DID", conflicts_with = "mentions")]
    account: Option<String>,

    /// Print only posts mentioning or authored by a handle.
    #[arg(long, value_name = "HANDLE")]
    mentions: Option<String>,

    /// Settings file (default `~/.skystream/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Exit on the first disconnect instead of reconnecting.
    #[arg(long)]
    no_reconnect: bool,
}

impl Cli {
    fn load_settings(&self) -> Result<SkystreamSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(skystream_settings::settings_path);
        skystream_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))
    }

    /// Client configuration: settings first, flags on top.
    fn client_config(&self, settings: &SkystreamSettings) -> ClientConfig {
        let endpoint = self
            .endpoint
            .clone()
            .unwrap_or_else(|| settings.stream.endpoint.clone());
        let collections = if self.collections.is_empty() {
            settings.stream.wanted_collections.clone()
        } else {
            self.collections.clone()
        };
        let dids = match (&self.account, self.dids.is_empty()) {
            (_, false) => self.dids.clone(),
            // Following one account: let the server do the filtering
            (Some(did), true) => vec![did.clone()],
            (None, true) => settings.stream.wanted_dids.clone(),
        };
        let mut reconnect = settings.reconnect.clone();
        if self.no_reconnect {
            reconnect.enabled = false;
        }
        ClientConfig::new(endpoint)
            .with_filter(SubscriptionFilter::new(collections, dids))
            .with_reconnect(reconnect)
    }

    fn log_level<'a>(&'a self, settings: &'a SkystreamSettings) -> &'a str {
        self.log_level
            .as_deref()
            .unwrap_or(settings.logging.level.as_str())
    }
}

/// The stream selected on the command line.
enum Feed {
    Posts(PostStream),
    Account(AccountStream),
    Mentions(MentionStream),
}

impl Feed {
    fn open(cli: &Cli, client: &FirehoseClient) -> Self {
        match (&cli.account, &cli.mentions) {
            (Some(did), _) => Self::Account(client.stream_from_account(did.clone())),
            (None, Some(handle)) => Self::Mentions(client.stream_mentions(handle)),
            (None, None) => Self::Posts(client.stream_posts()),
        }
    }

    /// Next item as one JSON line, or `None` once the stream ends.
    async fn next_line(&mut self) -> Option<serde_json::Result<String>> {
        match self {
            Self::Posts(posts) => posts.next().await.as_ref().map(to_line),
            Self::Account(events) => events.next().await.as_ref().map(to_line),
            Self::Mentions(mentions) => mentions.next().await.as_ref().map(to_line),
        }
    }
}

fn to_line<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Log connection lifecycle through hub subscriptions.
///
/// Returns the attempt count once reconnecting has given up.
fn log_lifecycle(client: &FirehoseClient) -> Arc<OnceLock<u32>> {
    let _ = client.on(EventCategory::Connected, |event| {
        if let FeedEvent::Connected { url } = event {
            info!(%url, "stream connected");
        }
        Ok(())
    });
    let _ = client.on(EventCategory::Disconnected, |event| {
        if let FeedEvent::Disconnected { code, reason } = event {
            info!(?code, ?reason, "stream disconnected");
        }
        Ok(())
    });
    let _ = client.on(EventCategory::Error, |event| {
        if let FeedEvent::Error(err) = event {
            warn!(code = err.code(), error = %err, "stream error");
        }
        Ok(())
    });

    let gave_up = Arc::new(OnceLock::new());
    let gave_up_ref = Arc::clone(&gave_up);
    let _ = client.on(EventCategory::MaxReconnectReached, move |event| {
        if let FeedEvent::MaxReconnectReached { attempts } = event {
            error!(attempts, "giving up on reconnecting");
            let _ = gave_up_ref.set(*attempts);
        }
        Ok(())
    });
    gave_up
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = args.load_settings()?;
    init_subscriber(args.log_level(&settings), settings.logging.format);

    let client =
        FirehoseClient::new(args.client_config(&settings)).context("Invalid client configuration")?;
    info!(url = client.subscribe_url(), "starting skystream");

    let gave_up = log_lifecycle(&client);
    let mut feed = Feed::open(&args, &client);

    let shutdown = client.clone();
    drop(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, disconnecting");
            shutdown.disconnect();
        }
    }));

    if let Err(err) = client.connect().await {
        if !client.config().reconnect.enabled {
            return Err(err).context("Failed to connect");
        }
        warn!(error = %err, "initial connect failed, retrying in background");
    }

    let stdout = std::io::stdout();
    while let Some(line) = feed.next_line().await {
        let line = line.context("Failed to serialize event")?;
        let mut out = stdout.lock();
        writeln!(out, "{line}").context("Failed to write to stdout")?;
        out.flush().context("Failed to flush stdout")?;
    }

    client.disconnect();
    if let Some(attempts) = gave_up.get() {
        anyhow::bail!("stream lost after {attempts} reconnect attempts");
    }
    info!("stream ended");
    Ok(())
}
