use thiserror::Error;

use crate::domain::MemberId;

/// Caller-recoverable failures surfaced by the service layer. A closed match
/// deliberately reports as `MatchNotFound` for mutations, so rosters cannot
/// be tampered with after settlement.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Member already exists: {0}")]
    MemberAlreadyExists(String),

    #[error("Movement not found: {0}")]
    MovementNotFound(String),

    #[error("Match not found: {0}")]
    MatchNotFound(String),

    #[error("A match on or after today is already scheduled for {0}")]
    MatchAlreadyExists(String),

    #[error("No upcoming match")]
    NoUpcomingMatch,

    #[error("Player {0} has not confirmed for this match")]
    PlayerUnavailable(MemberId),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
