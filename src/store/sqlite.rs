//! SQLite subscription store.
//!
//! One table, `push_subscriptions`, unique on `endpoint`. The member id
//! refers to the portal's member table, which lives outside this crate.

// Rust guideline compliant 2026-02

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::SubscriptionStore;
use crate::error::StorageError;
use crate::notifications::push::{MemberId, NewSubscription, Subscription};

/// SQLite-backed subscription store.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    member_id: i64,
    endpoint: String,
    p256dh: String,
    auth: String,
    user_agent: Option<String>,
    created_at: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StorageError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|e| StorageError::CorruptRow {
            id: row.id.clone(),
            reason: e.to_string(),
        })?;
        let created_at =
            DateTime::<Utc>::from_timestamp(row.created_at, 0).ok_or_else(|| {
                StorageError::CorruptRow {
                    id: row.id.clone(),
                    reason: format!("created_at out of range: {}", row.created_at),
                }
            })?;

        Ok(Self {
            id,
            member_id: row.member_id,
            endpoint: row.endpoint,
            p256dh: row.p256dh,
            auth: row.auth,
            user_agent: row.user_agent,
            created_at,
        })
    }
}

impl SqliteStore {
    /// Open (or create) a store from a SQLite URL such as `sqlite://push.db`.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single connection: each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS push_subscriptions (
                id TEXT PRIMARY KEY,
                member_id INTEGER NOT NULL,
                endpoint TEXT NOT NULL UNIQUE,
                p256dh TEXT NOT NULL,
                auth TEXT NOT NULL,
                user_agent TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_push_subscriptions_member
            ON push_subscriptions(member_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the pool, waiting for connections to be released.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn store(&self, subscription: NewSubscription) -> Result<Subscription, StorageError> {
        let fresh = subscription.into_subscription();

        // The conflict branch keeps id and created_at of the existing row.
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            INSERT INTO push_subscriptions
                (id, member_id, endpoint, p256dh, auth, user_agent, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(endpoint) DO UPDATE SET
                member_id = excluded.member_id,
                p256dh = excluded.p256dh,
                auth = excluded.auth,
                user_agent = excluded.user_agent
            RETURNING id, member_id, endpoint, p256dh, auth, user_agent, created_at
            "#,
        )
        .bind(fresh.id.to_string())
        .bind(fresh.member_id)
        .bind(&fresh.endpoint)
        .bind(&fresh.p256dh)
        .bind(&fresh.auth)
        .bind(&fresh.user_agent)
        .bind(fresh.created_at.timestamp())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn remove(&self, member_id: MemberId, endpoint: &str) -> Result<bool, StorageError> {
        let result =
            sqlx::query("DELETE FROM push_subscriptions WHERE member_id = ?1 AND endpoint = ?2")
                .bind(member_id)
            .bind(endpoint)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for(&self, member_id: MemberId) -> Result<Vec<Subscription>, StorageError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, member_id, endpoint, p256dh, auth, user_agent, created_at
            FROM push_subscriptions
            WHERE member_id = ?1
            "#,
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn evict(&self, endpoint: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?1")
            .bind(endpoint)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
