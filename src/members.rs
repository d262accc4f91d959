/// Club membership records
use crate::db::ts;
use crate::error::{ClubError, ClubResult};
use crate::rbac::Role;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// A club member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub club_id: String,
    pub display_name: String,
    pub real_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub push_token: Option<String>,
}

/// Member manager
#[derive(Clone)]
pub struct MemberManager {
    db: SqlitePool,
}

impl MemberManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a member
    pub async fn add(&self, member: &Member) -> ClubResult<()> {
        sqlx::query(
            r#"
            INSERT INTO members (id, club_id, display_name, real_name, phone, role, push_token, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&member.id)
        .bind(&member.club_id)
        .bind(&member.display_name)
        .bind(&member.real_name)
        .bind(&member.phone)
        .bind(member.role.as_str())
        .bind(&member.push_token)
        .bind(ts(Utc::now()))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Get a member by id
    pub async fn get(&self, member_id: &str) -> ClubResult<Option<Member>> {
        let row = sqlx::query(
            r#"
            SELECT id, club_id, display_name, real_name, phone, role, push_token
            FROM members
            WHERE id = ?
            "#,
        )
        .bind(member_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::parse_member).transpose()
    }

    /// Get a member, failing with NotFound when absent
    pub async fn require(&self, member_id: &str) -> ClubResult<Member> {
        self.get(member_id)
            .await?
            .ok_or_else(|| ClubError::NotFound(format!("Member {} not found", member_id)))
    }

    /// All registered push tokens for the club
    pub async fn push_tokens(&self, club_id: &str) -> ClubResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT push_token
            FROM members
            WHERE club_id = ? AND push_token IS NOT NULL
            "#,
        )
        .bind(club_id)
        .fetch_all(&self.db)
        .await?;

        let mut tokens = Vec::new();
        for row in rows {
            let token: String = row.get("push_token");
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn parse_member(row: sqlx::sqlite::SqliteRow) -> ClubResult<Member> {
        let role_str: String = row.get("role");
        Ok(Member {
            id: row.get("id"),
            club_id: row.get("club_id"),
            display_name: row.get("display_name"),
            real_name: row.get("real_name"),
            phone: row.get("phone"),
            role: Role::from_str(&role_str)?,
            push_token: row.get("push_token"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn sample(id: &str, role: Role, token: Option<&str>) -> Member {
        Member {
            id: id.to_string(),
            club_id: "fc-riverside".to_string(),
            display_name: id.to_string(),
            real_name: Some("Full Name".to_string()),
            phone: Some("010-1234".to_string()),
            role,
            push_token: token.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let manager = MemberManager::new(memory_pool().await);
        manager.add(&sample("alice", Role::President, None)).await.unwrap();

        let got = manager.get("alice").await.unwrap().unwrap();
        assert_eq!(got.role, Role::President);
        assert!(manager.get("nobody").await.unwrap().is_none());
        assert!(manager.require("nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_push_tokens_filters_unregistered() {
        let manager = MemberManager::new(memory_pool().await);
        manager.add(&sample("a", Role::Member, Some("tok-a"))).await.unwrap();
        manager.add(&sample("b", Role::Member, None)).await.unwrap();
        manager.add(&sample("c", Role::Member, Some("tok-c"))).await.unwrap();

        let mut tokens = manager.push_tokens("fc-riverside").await.unwrap();
        tokens.sort();
        assert_eq!(tokens, vec!["tok-a".to_string(), "tok-c".to_string()]);
    }
}
