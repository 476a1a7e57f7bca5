//! Configuration loading and persistence.
//!
//! The push engine is configured once at process start from a JSON file
//! plus `BRIGADE_PUSH_*` environment overrides. The resulting value is
//! immutable; VAPID keys are parsed from it exactly once when the sender
//! is built.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::Path, path::PathBuf, sync::Arc, time::Duration};

use crate::constants::{DEFAULT_CONCURRENCY, DEFAULT_TTL_SECS, PUSH_REQUEST_TIMEOUT};
use crate::notifications::push::Urgency;
use crate::notifications::{PushDispatcher, VapidAuthenticator, VapidKeys};

/// Configuration for the push engine.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PushConfig {
    /// Master switch. When false, subscriptions are still stored but nothing is sent.
    pub enabled: bool,
    /// VAPID public key (base64url, 65-byte uncompressed point).
    pub public_key: String,
    /// VAPID private key (base64url raw scalar; SEC1/PKCS8 DER accepted).
    pub private_key: String,
    /// Contact URI for push services (`mailto:` or `https:`).
    pub subject: String,
    /// `TTL` header and VAPID assertion lifetime, in seconds.
    pub ttl_secs: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum deliveries in flight per fan-out.
    pub concurrency: usize,
    /// Optional `Urgency` header for every delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    /// SQLite URL for the subscription table. Defaults to a file in the config dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl std::fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConfig")
            .field("enabled", &self.enabled)
            .field("public_key", &self.public_key)
            .field("private_key", &if self.private_key.is_empty() { "" } else { "<redacted>" })
            .field("subject", &self.subject)
            .field("ttl_secs", &self.ttl_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("urgency", &self.urgency)
            .field("database_url", &self.database_url)
            .finish()
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            public_key: String::new(),
            private_key: String::new(),
            subject: String::new(),
            ttl_secs: DEFAULT_TTL_SECS,
            request_timeout_secs: PUSH_REQUEST_TIMEOUT.as_secs(),
            concurrency: DEFAULT_CONCURRENCY,
            urgency: None,
            database_url: None,
        }
    }
}

impl PushConfig {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `BRIGADE_PUSH_CONFIG_DIR` env var: explicit override
    /// 2. Default: platform config dir (e.g. `~/.config/brigade-push`)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(custom_dir) = std::env::var("BRIGADE_PUSH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("brigade-push")
        };
        fs::create_dir_all(&dir).context("Failed to create config directory")?;
        Ok(dir)
    }

    /// Path of the config file: `BRIGADE_PUSH_CONFIG` or `<config dir>/push.json`.
    pub fn config_path() -> Result<PathBuf> {
        match std::env::var("BRIGADE_PUSH_CONFIG") {
            Ok(path) => Ok(PathBuf::from(path)),
            Err(_) => Ok(Self::config_dir()?.join("push.json")),
        }
    }

    /// Loads configuration from the default file, with environment variable overrides.
    ///
    /// A missing file yields the defaults (sending disabled).
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads configuration from `path`, with environment variable overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Saves configuration to `path` with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        #[cfg(unix)]
        {
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config file permissions")?;
        }

        log::debug!("Saved push config to {:?}", path);
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("BRIGADE_PUSH_ENABLED") {
            self.enabled = matches!(enabled.trim(), "1" | "true" | "yes" | "on");
        }

        if let Ok(public_key) = std::env::var("BRIGADE_PUSH_VAPID_PUBLIC_KEY") {
            self.public_key = public_key;
        }

        if let Ok(private_key) = std::env::var("BRIGADE_PUSH_VAPID_PRIVATE_KEY") {
            self.private_key = private_key;
        }

        if let Ok(subject) = std::env::var("BRIGADE_PUSH_VAPID_SUBJECT") {
            self.subject = subject;
        }

        if let Ok(ttl) = std::env::var("BRIGADE_PUSH_TTL") {
            if let Ok(value) = ttl.parse() {
                self.ttl_secs = value;
            }
        }

        if let Ok(timeout) = std::env::var("BRIGADE_PUSH_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.request_timeout_secs = value;
            }
        }

        if let Ok(concurrency) = std::env::var("BRIGADE_PUSH_CONCURRENCY") {
            if let Ok(value) = concurrency.parse::<usize>() {
                self.concurrency = value.max(1);
            }
        }

        if let Ok(database) = std::env::var("BRIGADE_PUSH_DATABASE") {
            self.database_url = Some(database);
        }
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// SQLite URL for the subscription store.
    pub fn database_url(&self) -> Result<String> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => Ok(format!(
                "sqlite://{}",
                Self::config_dir()?.join("subscriptions.db").display()
            )),
        }
    }

    /// Build the dispatcher described by this config.
    ///
    /// Returns `Ok(None)` when sending is disabled and
    /// [`PushError::Config`](crate::PushError::Config) when the VAPID
    /// keypair or subject is missing or malformed.
    pub fn dispatcher(&self) -> crate::Result<Option<PushDispatcher>> {
        if !self.enabled {
            return Ok(None);
        }

        let keys = VapidKeys::from_base64url(&self.public_key, &self.private_key)?;
        let authenticator =
            VapidAuthenticator::new(&keys, &self.subject, u64::from(self.ttl_secs))?;
        let dispatcher =
            PushDispatcher::new(Arc::new(authenticator), self.ttl_secs, self.request_timeout())?
                .with_urgency(self.urgency);
        Ok(Some(dispatcher))
    }
}
