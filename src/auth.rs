/// Authentication: session lookup and axum extractors
///
/// The identity provider itself is external; its output is a bearer token
/// in the sessions table. Resolving that token to a member is the whole of
/// the authentication gate.
use crate::context::AppContext;
use crate::db::ts;
use crate::error::{ClubError, ClubResult};
use crate::members::Member;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

/// Session manager
#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
}

impl SessionManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a session token for a member
    pub async fn create_session(&self, token: &str, member_id: &str) -> ClubResult<()> {
        sqlx::query(
            "INSERT INTO sessions (token, member_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(member_id)
        .bind(ts(Utc::now()))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Resolve a bearer token to a member id
    pub async fn resolve(&self, token: &str) -> ClubResult<String> {
        let row = sqlx::query("SELECT member_id FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ClubError::Authentication("Invalid session token".to_string()))?;

        Ok(row.get("member_id"))
    }
}

/// Authenticated member, extracted from the request's bearer token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub member: Member,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = ClubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            ClubError::Authentication("Missing authorization header".to_string())
        })?;

        let member_id = state.sessions.resolve(&token).await?;
        let member = state.members.require(&member_id).await?;

        Ok(AuthContext { member })
    }
}
