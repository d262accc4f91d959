/// Declarative write rules for direct (non-pipeline) store writes
///
/// Second enforcement layer next to the moderation pipeline, fed by the same
/// RBAC table so the two cannot drift. This layer is the single place the
/// attendance write gate is checked, and the place that denies privileged
/// direct writes to other members' comments so every moderation goes through
/// the audited pipeline.
use crate::error::{ClubError, ClubResult};
use crate::members::Member;
use crate::posts::{Post, PostType};
use crate::rbac::{self, Action, ResourceKind};
use crate::vote;
use chrono::{DateTime, Utc};

/// A direct write about to hit the store
#[derive(Debug)]
pub enum DirectWrite<'a> {
    /// Create or update one's own attendance record on an event
    Attendance {
        owner_id: &'a str,
        post: &'a Post,
        is_create: bool,
    },
    /// Create a comment under a post
    CommentCreate,
    /// Update one's own comment
    CommentUpdate { author_id: &'a str },
    /// Delete one's own comment
    CommentDelete { author_id: &'a str },
}

/// Evaluate a direct write. Returns the denial as a typed error so callers
/// surface it unchanged.
pub fn check_direct_write(
    actor: &Member,
    write: &DirectWrite<'_>,
    now: DateTime<Utc>,
) -> ClubResult<()> {
    match write {
        DirectWrite::Attendance {
            owner_id,
            post,
            is_create,
        } => {
            if actor.id != **owner_id {
                return Err(ClubError::Authorization(
                    "Members may only write their own attendance record".to_string(),
                ));
            }
            if !rbac::can(actor.role, Action::Create, ResourceKind::Attendance) {
                return Err(ClubError::Authorization(
                    "Role may not cast attendance votes".to_string(),
                ));
            }
            // Profile completeness applies to creation only
            if *is_create && !rbac::has_required_profile(actor) {
                return Err(ClubError::Authorization(
                    "A complete profile (real name, phone) is required to vote".to_string(),
                ));
            }
            if post.post_type != PostType::Event {
                return Err(ClubError::Validation(format!(
                    "Post {} is not an event",
                    post.id
                )));
            }
            let close_at = post.vote_close_at.ok_or_else(|| {
                ClubError::Internal(format!("Event {} has no vote_close_at", post.id))
            })?;
            if !vote::allow_attendance_write(post.vote_closed, close_at, now) {
                return Err(ClubError::Authorization(
                    "The voting window for this event is closed".to_string(),
                ));
            }
            Ok(())
        }
        DirectWrite::CommentCreate => {
            if !rbac::can(actor.role, Action::Create, ResourceKind::Comment) {
                return Err(ClubError::Authorization(
                    "Role may not create comments".to_string(),
                ));
            }
            if !rbac::has_required_profile(actor) {
                return Err(ClubError::Authorization(
                    "A complete profile (real name, phone) is required to comment".to_string(),
                ));
            }
            Ok(())
        }
        // Direct comment mutation is author-only. Privileged roles are denied
        // here on purpose; their path is the moderation pipeline.
        DirectWrite::CommentUpdate { author_id } | DirectWrite::CommentDelete { author_id } => {
            if actor.id != **author_id {
                return Err(ClubError::Authorization(
                    "Only the author may modify a comment directly; use moderation".to_string(),
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use chrono::TimeZone;

    fn member(id: &str, role: Role) -> Member {
        Member {
            id: id.to_string(),
            club_id: "fc-riverside".to_string(),
            display_name: id.to_string(),
            real_name: Some("Name".to_string()),
            phone: Some("010-1111".to_string()),
            role,
            push_token: None,
        }
    }

    fn event_post(vote_closed: Option<bool>, close_hour: u32) -> Post {
        let t = |h| Utc.with_ymd_and_hms(2025, 6, 13, h, 0, 0).unwrap();
        Post {
            id: "event-1".to_string(),
            club_id: "fc-riverside".to_string(),
            post_type: PostType::Event,
            event_type: Some("match".to_string()),
            title: "Friendly".to_string(),
            content: String::new(),
            place: None,
            start_at: Some(t(23)),
            vote_close_at: Some(t(close_hour)),
            vote_closed,
            vote_closed_at: None,
            vote_closed_by: None,
            comment_count: 0,
            created_by: "officer".to_string(),
            created_at: t(0),
            updated_at: t(0),
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 13, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_attendance_allowed_while_open() {
        let actor = member("m1", Role::Member);
        let post = event_post(None, 21);
        let write = DirectWrite::Attendance {
            owner_id: "m1",
            post: &post,
            is_create: true,
        };
        assert!(check_direct_write(&actor, &write, noon()).is_ok());
    }

    #[test]
    fn test_attendance_denied_after_close_flag() {
        let actor = member("m1", Role::Member);
        let post = event_post(Some(true), 21);
        let write = DirectWrite::Attendance {
            owner_id: "m1",
            post: &post,
            is_create: false,
        };
        assert!(check_direct_write(&actor, &write, noon()).is_err());
    }

    #[test]
    fn test_attendance_denied_after_window_elapsed() {
        let actor = member("m1", Role::Member);
        let post = event_post(None, 11);
        let write = DirectWrite::Attendance {
            owner_id: "m1",
            post: &post,
            is_create: false,
        };
        assert!(check_direct_write(&actor, &write, noon()).is_err());
    }

    #[test]
    fn test_attendance_owner_only_even_for_admin() {
        let actor = member("admin", Role::Admin);
        let post = event_post(None, 21);
        let write = DirectWrite::Attendance {
            owner_id: "m1",
            post: &post,
            is_create: false,
        };
        assert!(check_direct_write(&actor, &write, noon()).is_err());
    }

    #[test]
    fn test_attendance_profile_required_on_create_only() {
        let mut actor = member("m1", Role::Member);
        actor.phone = None;
        let post = event_post(None, 21);

        let create = DirectWrite::Attendance {
            owner_id: "m1",
            post: &post,
            is_create: true,
        };
        assert!(check_direct_write(&actor, &create, noon()).is_err());

        let update = DirectWrite::Attendance {
            owner_id: "m1",
            post: &post,
            is_create: false,
        };
        assert!(check_direct_write(&actor, &update, noon()).is_ok());
    }

    #[test]
    fn test_privileged_direct_comment_write_denied() {
        let admin = member("admin", Role::Admin);
        let write = DirectWrite::CommentUpdate { author_id: "m1" };
        assert!(check_direct_write(&admin, &write, noon()).is_err());

        let delete = DirectWrite::CommentDelete { author_id: "m1" };
        assert!(check_direct_write(&admin, &delete, noon()).is_err());
    }

    #[test]
    fn test_author_direct_comment_write_allowed_without_profile() {
        let mut author = member("m1", Role::Member);
        author.real_name = None; // profile no longer complete
        let write = DirectWrite::CommentUpdate { author_id: "m1" };
        assert!(check_direct_write(&author, &write, noon()).is_ok());
    }

    #[test]
    fn test_comment_create_requires_profile() {
        let mut actor = member("m1", Role::Member);
        actor.real_name = None;
        assert!(check_direct_write(&actor, &DirectWrite::CommentCreate, noon()).is_err());

        let complete = member("m2", Role::Member);
        assert!(check_direct_write(&complete, &DirectWrite::CommentCreate, noon()).is_ok());
    }
}
