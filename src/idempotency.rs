/// Idempotency markers for retry-safe callables
///
/// Every callable carries a caller-supplied request id. The first successful
/// processing records the serialized result; any later call with the same id
/// gets that stored result back without re-running side effects, even when
/// the retry carries a different payload (documented policy: the marker does
/// not re-validate payload equality).
///
/// Marker lookup and marker insert run inside the caller's transaction
/// together with the mutation and the audit write, so a racing duplicate
/// rolls back wholesale on the marker's primary key and replays the stored
/// result instead.
use crate::db::ts;
use crate::error::{ClubError, ClubResult};
use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool};

/// Outcome of an idempotent operation
#[derive(Debug, Clone)]
pub struct IdempotentOutcome<T> {
    pub result: T,
    /// True when the result was replayed from a marker rather than produced
    /// by this call. Callers use this to skip re-running external effects
    /// such as push fan-out.
    pub replayed: bool,
}

/// Look up a stored result inside a transaction (or on a pool)
pub async fn lookup<'e, E>(
    executor: E,
    club_id: &str,
    request_id: &str,
) -> ClubResult<Option<serde_json::Value>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT result
        FROM idempotency
        WHERE club_id = ? AND request_id = ?
        "#,
    )
    .bind(club_id)
    .bind(request_id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => {
            let raw: String = row.get("result");
            let value = serde_json::from_str(&raw)
                .map_err(|e| ClubError::Internal(format!("Corrupt idempotency marker: {}", e)))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Record a marker inside the caller's transaction
pub async fn record<'e, E>(
    executor: E,
    club_id: &str,
    request_id: &str,
    result: &serde_json::Value,
) -> ClubResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO idempotency (club_id, request_id, result, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(club_id)
    .bind(request_id)
    .bind(result.to_string())
    .bind(ts(Utc::now()))
    .execute(executor)
    .await?;

    Ok(())
}

/// Whether a store error is a unique-key violation (a racing duplicate hit
/// the marker first)
pub fn is_unique_violation(err: &ClubError) -> bool {
    match err {
        ClubError::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Re-fetch the result recorded by a racing duplicate after our transaction
/// rolled back
pub async fn replay_after_race(
    pool: &SqlitePool,
    club_id: &str,
    request_id: &str,
) -> ClubResult<serde_json::Value> {
    lookup(pool, club_id, request_id).await?.ok_or_else(|| {
        ClubError::Conflict(format!(
            "Request {} raced but left no stored result",
            request_id
        ))
    })
}

/// Reject requests without a usable request id
pub fn require_request_id(request_id: &str) -> ClubResult<()> {
    if request_id.trim().is_empty() {
        return Err(ClubError::Validation("requestId is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_lookup_miss_then_hit() {
        let pool = memory_pool().await;

        assert!(lookup(&pool, "club", "req-1").await.unwrap().is_none());

        record(&pool, "club", "req-1", &json!({"id": "p1"})).await.unwrap();
        let stored = lookup(&pool, "club", "req-1").await.unwrap().unwrap();
        assert_eq!(stored, json!({"id": "p1"}));
    }

    #[tokio::test]
    async fn test_duplicate_record_is_unique_violation() {
        let pool = memory_pool().await;
        record(&pool, "club", "req-1", &json!({"id": "a"})).await.unwrap();

        let err = record(&pool, "club", "req-1", &json!({"id": "b"}))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        // First result wins
        let stored = replay_after_race(&pool, "club", "req-1").await.unwrap();
        assert_eq!(stored, json!({"id": "a"}));
    }

    #[tokio::test]
    async fn test_markers_scoped_per_club() {
        let pool = memory_pool().await;
        record(&pool, "club-a", "req-1", &json!({"id": "a"})).await.unwrap();
        assert!(lookup(&pool, "club-b", "req-1").await.unwrap().is_none());
    }

    #[test]
    fn test_require_request_id() {
        assert!(require_request_id("req-1").is_ok());
        assert!(require_request_id("").is_err());
        assert!(require_request_id("   ").is_err());
    }
}
