/// Event vote state machine
///
/// `vote_closed` comes from a schemaless document history, so it is tri-state:
/// absent, explicitly false, or true. Absent and false both mean the window is
/// still open; only a strict `Some(true)` means closed.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an event's voting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    /// Window open, attendance writes allowed
    Open,
    /// Window elapsed but not yet flipped closed; only the auto-close
    /// engine should observe this state
    ExpiredUnclosed,
    /// `vote_closed == true`
    Closed,
}

/// The "not strictly true" predicate for the tri-state flag
pub fn is_closed(vote_closed: Option<bool>) -> bool {
    vote_closed == Some(true)
}

/// Current state of a voting window
pub fn vote_state(
    vote_closed: Option<bool>,
    vote_close_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> VoteState {
    if is_closed(vote_closed) {
        VoteState::Closed
    } else if now <= vote_close_at {
        VoteState::Open
    } else {
        VoteState::ExpiredUnclosed
    }
}

/// Write gate for attendance records:
/// `vote_closed != true AND now <= vote_close_at`
pub fn allow_attendance_write(
    vote_closed: Option<bool>,
    vote_close_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    vote_state(vote_closed, vote_close_at, now) == VoteState::Open
}

/// Attendance status choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Attending,
    NotAttending,
    Undecided,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Attending => "attending",
            AttendanceStatus::NotAttending => "not_attending",
            AttendanceStatus::Undecided => "undecided",
        }
    }

    pub fn from_str(s: &str) -> crate::error::ClubResult<Self> {
        match s.to_lowercase().as_str() {
            "attending" => Ok(AttendanceStatus::Attending),
            "not_attending" => Ok(AttendanceStatus::NotAttending),
            "undecided" => Ok(AttendanceStatus::Undecided),
            _ => Err(crate::error::ClubError::Validation(format!(
                "Invalid attendance status: {}",
                s
            ))),
        }
    }
}
