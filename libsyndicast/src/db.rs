//! SQLite persistence for Syndicast

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::distribution::{Distribution, DistributionStatus};
use crate::error::{DbError, Result};
use crate::store::{AccountDirectory, DistributionStore, PostStore};
use crate::types::{Account, ConnectionStatus, Post};

const DISTRIBUTION_COLUMNS: &str = "id, post_id, account_id, platform_post_id, status, scheduled_for, \
     attempted_at, completed_at, error_message, retry_count, platform_response, \
     engagement_metrics, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes work for the SQLite URL on every OS; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        tracing::debug!(path = %expanded_path, "Database ready");
        Ok(Self { pool })
    }

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let media_refs = to_json(&post.media_refs)?;
        let platform_options = to_json(&post.platform_options)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, content, media_refs, platform_options, scheduled_for, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.content)
        .bind(media_refs)
        .bind(platform_options)
        .bind(post.scheduled_for)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Delete a post; its distributions go with it
    pub async fn delete_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, platform, username, connection_status, authentication_expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.platform)
        .bind(&account.username)
        .bind(account.connection_status.as_str())
        .bind(account.authentication_expires_at)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn update_account_status(&self, account_id: &str, status: ConnectionStatus) -> Result<()> {
        sqlx::query("UPDATE accounts SET connection_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Store analytics for a distribution, independent of its publishing state
    pub async fn record_engagement_metrics(&self, distribution_id: &str, metrics: &Value) -> Result<()> {
        sqlx::query("UPDATE distributions SET engagement_metrics = ? WHERE id = ?")
            .bind(metrics.to_string())
            .bind(distribution_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }
}

#[async_trait]
impl PostStore for Database {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, content, media_refs, platform_options, scheduled_for, created_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| post_from_row(&r)).transpose()
    }
}

#[async_trait]
impl AccountDirectory for Database {
    async fn get_accounts(&self, account_ids: &[String]) -> Result<Vec<Account>> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; account_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, platform, username, connection_status, authentication_expires_at, created_at \
             FROM accounts WHERE id IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in account_ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(DbError::SqlxError)?;
        rows.iter().map(account_from_row).collect()
    }
}

#[async_trait]
impl DistributionStore for Database {
    async fn insert_distribution(&self, d: &Distribution) -> Result<()> {
        let sql = format!(
            "INSERT INTO distributions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DISTRIBUTION_COLUMNS
        );

        sqlx::query(&sql)
            .bind(&d.id)
            .bind(&d.post_id)
            .bind(&d.account_id)
            .bind(&d.platform_post_id)
            .bind(d.status.as_str())
            .bind(d.scheduled_for)
            .bind(d.attempted_at)
            .bind(d.completed_at)
            .bind(&d.error_message)
            .bind(i64::from(d.retry_count))
            .bind(d.platform_response.as_ref().map(Value::to_string))
            .bind(d.engagement_metrics.as_ref().map(Value::to_string))
            .bind(d.created_at)
            .bind(d.updated_at)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn update_distribution(&self, d: &Distribution, expected: DistributionStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE distributions
            SET platform_post_id = ?, status = ?, attempted_at = ?, completed_at = ?,
                error_message = ?, retry_count = ?, platform_response = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(&d.platform_post_id)
        .bind(d.status.as_str())
        .bind(d.attempted_at)
        .bind(d.completed_at)
        .bind(&d.error_message)
        .bind(i64::from(d.retry_count))
        .bind(d.platform_response.as_ref().map(Value::to_string))
        .bind(d.updated_at)
        .bind(&d.id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_distribution(&self, id: &str) -> Result<Option<Distribution>> {
        let sql = format!("SELECT {} FROM distributions WHERE id = ?", DISTRIBUTION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| distribution_from_row(&r)).transpose()
    }

    async fn delete_pending_distribution(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM distributions WHERE id = ? AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_distributions(&self, post_id: &str) -> Result<Vec<Distribution>> {
        let sql = format!(
            "SELECT {} FROM distributions WHERE post_id = ? ORDER BY created_at ASC, rowid ASC",
            DISTRIBUTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(distribution_from_row).collect()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| DbError::Corrupt(format!("serialize: {}", e)).into())
}

fn parse_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| DbError::Corrupt(format!("{}: {}", column, e)).into())
}

fn post_from_row(r: &SqliteRow) -> Result<Post> {
    let media_refs: String = r.try_get("media_refs").map_err(DbError::SqlxError)?;
    let platform_options: String = r.try_get("platform_options").map_err(DbError::SqlxError)?;

    Ok(Post {
        id: r.try_get("id").map_err(DbError::SqlxError)?,
        content: r.try_get("content").map_err(DbError::SqlxError)?,
        media_refs: parse_json("media_refs", &media_refs)?,
        platform_options: parse_json("platform_options", &platform_options)?,
        scheduled_for: r.try_get("scheduled_for").map_err(DbError::SqlxError)?,
        created_at: r.try_get("created_at").map_err(DbError::SqlxError)?,
    })
}

fn account_from_row(r: &SqliteRow) -> Result<Account> {
    let status: String = r.try_get("connection_status").map_err(DbError::SqlxError)?;

    Ok(Account {
        id: r.try_get("id").map_err(DbError::SqlxError)?,
        platform: r.try_get("platform").map_err(DbError::SqlxError)?,
        username: r.try_get("username").map_err(DbError::SqlxError)?,
        connection_status: status.parse().map_err(DbError::Corrupt)?,
        authentication_expires_at: r
            .try_get("authentication_expires_at")
            .map_err(DbError::SqlxError)?,
        created_at: r.try_get("created_at").map_err(DbError::SqlxError)?,
    })
}

fn distribution_from_row(r: &SqliteRow) -> Result<Distribution> {
    let status: String = r.try_get("status").map_err(DbError::SqlxError)?;
    let retry_count: i64 = r.try_get("retry_count").map_err(DbError::SqlxError)?;
    let platform_response: Option<String> =
        r.try_get("platform_response").map_err(DbError::SqlxError)?;
    let engagement_metrics: Option<String> =
        r.try_get("engagement_metrics").map_err(DbError::SqlxError)?;

    Ok(Distribution {
        id: r.try_get("id").map_err(DbError::SqlxError)?,
        post_id: r.try_get("post_id").map_err(DbError::SqlxError)?,
        account_id: r.try_get("account_id").map_err(DbError::SqlxError)?,
        platform_post_id: r.try_get("platform_post_id").map_err(DbError::SqlxError)?,
        status: status.parse().map_err(DbError::Corrupt)?,
        scheduled_for: r.try_get("scheduled_for").map_err(DbError::SqlxError)?,
        attempted_at: r.try_get("attempted_at").map_err(DbError::SqlxError)?,
        completed_at: r.try_get("completed_at").map_err(DbError::SqlxError)?,
        error_message: r.try_get("error_message").map_err(DbError::SqlxError)?,
        retry_count: u32::try_from(retry_count)
            .map_err(|_| DbError::Corrupt(format!("retry_count out of range: {}", retry_count)))?,
        platform_response: platform_response
            .as_deref()
            .map(|raw| parse_json("platform_response", raw))
            .transpose()?,
        engagement_metrics: engagement_metrics
            .as_deref()
            .map(|raw| parse_json("engagement_metrics", raw))
            .transpose()?,
        created_at: r.try_get("created_at").map_err(DbError::SqlxError)?,
        updated_at: r.try_get("updated_at").map_err(DbError::SqlxError)?,
    })
}
