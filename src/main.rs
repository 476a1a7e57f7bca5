//! Brigade push CLI - operator tooling for the push engine.
//!
//! Generates VAPID keys and drives the same subscribe/unsubscribe/send
//! operations the portal uses, against the configured SQLite store.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use brigade_push::{
    MemberId, NotificationSender, PushConfig, SqliteStore, SubscriptionStore, VapidKeys,
};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "brigade-push")]
#[command(version)]
#[command(about = "Web Push delivery engine for the brigade portal")]
struct Cli {
    /// Config file (defaults to BRIGADE_PUSH_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a VAPID keypair and print (or write) a config
    Keygen {
        /// Contact URI for push services (mailto: or https:)
        #[arg(long, default_value = "mailto:admin@example.com")]
        subject: String,
        /// Write the config file instead of printing it
        #[arg(long)]
        write: bool,
        /// Replace existing keys when writing
        #[arg(long)]
        force: bool,
    },
    /// Store a browser subscription for a member
    Subscribe {
        /// Member id
        #[arg(long)]
        member: MemberId,
        /// Push endpoint URL
        #[arg(long)]
        endpoint: String,
        /// Browser p256dh key (base64url)
        #[arg(long)]
        p256dh: String,
        /// Browser auth secret (base64url)
        #[arg(long)]
        auth: String,
        /// User agent string
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Remove a member's subscription
    Unsubscribe {
        /// Member id
        #[arg(long)]
        member: MemberId,
        /// Push endpoint URL
        #[arg(long)]
        endpoint: String,
    },
    /// Send a notification to one or more members
    Send {
        /// Member ids (repeatable)
        #[arg(long = "member", required = true)]
        members: Vec<MemberId>,
        /// Notification title
        #[arg(long)]
        title: String,
        /// Notification body
        #[arg(long, default_value = "")]
        body: String,
        /// Data object as JSON (e.g. '{"type":"leave_decision"}')
        #[arg(long)]
        data: Option<String>,
    },
    /// List a member's subscriptions
    List {
        /// Member id
        #[arg(long)]
        member: MemberId,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PushConfig> {
    match path {
        Some(path) => PushConfig::load_from(path),
        None => PushConfig::load(),
    }
}

async fn open_store(config: &PushConfig) -> Result<Arc<SqliteStore>> {
    let url = config.database_url()?;
    let store = SqliteStore::connect(&url)
        .await
        .with_context(|| format!("Failed to open subscription database {url}"))?;
    Ok(Arc::new(store))
}

fn keygen(path: Option<&PathBuf>, subject: String, write: bool, force: bool) -> Result<()> {
    let keys = VapidKeys::generate();

    if !write {
        let config = PushConfig {
            enabled: true,
            public_key: keys.public_key_base64url().to_string(),
            private_key: keys.private_key_base64url().to_string(),
            subject,
            ..PushConfig::default()
        };
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let path = match path {
        Some(path) => path.clone(),
        None => PushConfig::config_path()?,
    };
    let mut config = PushConfig::load_from(&path)?;
    if !config.private_key.is_empty() && !force {
        anyhow::bail!(
            "{} already has VAPID keys; pass --force to replace them \
             (existing subscriptions will stop working)",
            path.display()
        );
    }

    config.enabled = true;
    config.public_key = keys.public_key_base64url().to_string();
    config.private_key = keys.private_key_base64url().to_string();
    config.subject = subject;
    config.save(&path)?;

    println!("Wrote {}", path.display());
    println!("applicationServerKey: {}", keys.public_key_base64url());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Keygen {
            subject,
            write,
            force,
        } => return keygen(cli.config.as_ref(), subject, write, force),
        other => other,
    };

    let config = load_config(cli.config.as_ref())?;
    let store = open_store(&config).await?;
    let sender =
        NotificationSender::from_config(&config, Arc::clone(&store) as Arc<dyn SubscriptionStore>);

    match command {
        Commands::Keygen { .. } => {}
        Commands::Subscribe {
            member,
            endpoint,
            p256dh,
            auth,
            user_agent,
        } => {
            let ok = sender
                .subscribe(member, &endpoint, &p256dh, &auth, user_agent.as_deref())
                .await;
            anyhow::ensure!(ok, "Subscription rejected (see log)");
            println!("Subscribed member {member}");
        }
        Commands::Unsubscribe { member, endpoint } => {
            if sender.unsubscribe(member, &endpoint).await {
                println!("Unsubscribed member {member}");
            } else {
                println!("No matching subscription for member {member}");
            }
        }
        Commands::Send {
            members,
            title,
            body,
            data,
        } => {
            anyhow::ensure!(
                sender.is_enabled(),
                "Push delivery is disabled (check config and log)"
            );
            let data: Map<String, Value> = match data {
                Some(json) => serde_json::from_str(&json).context("--data must be a JSON object")?,
                None => Map::new(),
            };
            for (member, delivered) in sender.send_to_members(&members, &title, &body, data).await {
                let outcome = if delivered { "delivered" } else { "not delivered" };
                println!("member {member}: {outcome}");
            }
        }
        Commands::List { member } => {
            for sub in store.list_for(member).await? {
                println!(
                    "{}  {}  {}  {}",
                    sub.id,
                    sub.created_at.format("%Y-%m-%d %H:%M"),
                    sub.user_agent.as_deref().unwrap_or("-"),
                    sub.endpoint
                );
            }
        }
    }

    store.close().await;
    Ok(())
}
