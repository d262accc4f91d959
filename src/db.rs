/// Database layer for the Matchday club server
///
/// Manages the SQLite connection pool and schema. The schema lives here as
/// idempotent DDL so the binary and the test suites initialize the exact same
/// tables.
use crate::error::{ClubError, ClubResult};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> ClubResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePool::connect_with(
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(if options.enable_wal {
                sqlx::sqlite::SqliteJournalMode::Wal
            } else {
                sqlx::sqlite::SqliteJournalMode::Delete
            })
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5)),
    )
    .await
    .map_err(ClubError::Database)?;

    Ok(pool)
}

/// Format a timestamp for storage.
///
/// All persisted timestamps go through this helper so that string comparison
/// in SQL (`vote_close_at <= ?`) matches chronological order. Second
/// granularity is plenty for a voting window.
pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp
pub fn parse_ts(s: &str) -> ClubResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ClubError::Internal(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Initialize the schema (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> ClubResult<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            club_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            real_name TEXT,
            phone TEXT,
            role TEXT NOT NULL,
            push_token TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            club_id TEXT NOT NULL,
            post_type TEXT NOT NULL,
            event_type TEXT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            place TEXT,
            start_at TEXT,
            vote_close_at TEXT,
            vote_closed INTEGER,
            vote_closed_at TEXT,
            vote_closed_by TEXT,
            comment_count INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            post_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (post_id, member_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            club_id TEXT NOT NULL,
            post_id TEXT NOT NULL,
            content TEXT NOT NULL,
            author_id TEXT NOT NULL,
            author_name TEXT NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            action TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            reason TEXT,
            request_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_audit_request
            ON audit_log (club_id, request_id)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS idempotency (
            club_id TEXT NOT NULL,
            request_id TEXT NOT NULL,
            result TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (club_id, request_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS store_indexes (
            name TEXT PRIMARY KEY,
            ready INTEGER NOT NULL DEFAULT 0
        )
        "#,
    ];

    for stmt in statements {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> ClubResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(ClubError::Database)?;

    Ok(())
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
