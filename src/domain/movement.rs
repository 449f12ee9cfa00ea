use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MemberId;

pub type MovementId = Uuid;

/// Signed amount in whole units. Negative amounts decrease a member's balance.
pub type Amount = i64;

/// Fine charged to every player who declined or never confirmed a match.
pub const MATCH_FINE: Amount = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Income,
    Expense,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Income => "income",
            MovementType::Expense => "expense",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" => Some(MovementType::Income),
            "expense" => Some(MovementType::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::from_str(s).ok_or_else(|| format!("unknown movement type: {}", s))
    }
}

/// A single signed ledger entry affecting one member's balance.
/// Movements are immutable facts except for `amount` and `description`,
/// which may be corrected by an amendment; the type, the owning member and
/// the creation timestamp never change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    /// Owning member. A weak reference: the movement outlives the member.
    pub member_id: MemberId,
    /// Informational classification - the sign of `amount` is not enforced
    pub movement_type: MovementType,
    pub amount: Amount,
    pub description: String,
    pub created_on: DateTime<Utc>,
}

impl Movement {
    pub fn new(
        member_id: MemberId,
        movement_type: MovementType,
        amount: Amount,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            movement_type,
            amount,
            description: description.into(),
            created_on: Utc::now(),
        }
    }

    /// Automatic fine generated when a match closes with this player in the
    /// not-available or unconfirmed partition.
    pub fn fine(member_id: MemberId, match_day: NaiveDate) -> Self {
        Movement::new(
            member_id,
            MovementType::Expense,
            MATCH_FINE,
            format!("Fine for missing the match on {}", match_day.format("%Y-%m-%d")),
        )
    }

    /// New snapshot with corrected amount and description. Everything else,
    /// including `created_on`, is carried over unchanged.
    pub fn amended(&self, amount: Amount, description: impl Into<String>) -> Self {
        Self {
            id: self.id,
            member_id: self.member_id,
            movement_type: self.movement_type,
            amount,
            description: description.into(),
            created_on: self.created_on,
        }
    }
}
