/// Role-based access control policy
///
/// One explicit allow table consumed by both enforcement layers: the
/// moderation pipeline and the declarative store rules. Anything not listed
/// is denied.
use crate::error::{ClubError, ClubResult};
use crate::members::Member;
use serde::{Deserialize, Serialize};

/// Club membership roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Treasurer,
    President,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Treasurer => "treasurer",
            Role::President => "president",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> ClubResult<Self> {
        match s.to_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "treasurer" => Ok(Role::Treasurer),
            "president" => Ok(Role::President),
            "admin" => Ok(Role::Admin),
            _ => Err(ClubError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Actions a member can attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Edit,
    Delete,
    OverrideClose,
}

/// Resource kinds the policy speaks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Post,
    Event,
    Notice,
    Comment,
    Attendance,
}

/// The policy table. Total over all combinations; unmatched means deny.
///
/// Ownership is not expressed here: a member editing their own content is
/// authorized by the ownership check at the calling layer, not by this table.
pub fn can(role: Role, action: Action, resource: ResourceKind) -> bool {
    use Action::*;
    use ResourceKind::*;
    use Role::*;

    match (role, action, resource) {
        // Everyone with a complete profile may create free posts, comments
        // and cast attendance votes
        (_, Create, Post) => true,
        (_, Create, Comment) => true,
        (_, Create, Attendance) => true,

        // Scheduled events require an officer role
        (Treasurer | President | Admin, Create, Event) => true,

        // Notices (with push fan-out) require president or admin
        (President | Admin, Create, Notice) => true,

        // Moderating other members' comments requires an officer role
        (Treasurer | President | Admin, Edit | Delete, Comment) => true,

        // Operational vote-close override
        (President | Admin, OverrideClose, Event) => true,

        // Default deny
        _ => false,
    }
}

/// Profile completeness predicate.
///
/// Required when *creating* posts, comments or votes. Deliberately not
/// required when a member updates or deletes their own prior content, so
/// history stays editable for members whose profile was complete only at
/// creation time.
pub fn has_required_profile(member: &Member) -> bool {
    let filled = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.trim().is_empty());
    filled(&member.real_name) && filled(&member.phone)
}
