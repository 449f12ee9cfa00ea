use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MemberId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Club administrators - never part of a match roster
    Admin,
    /// Regular playing members
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_str(s).ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// A club member. The first+last name pair is the club-wide unique key.
/// Balance is never stored here - it is always derived from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
    /// Times this member has captained a team
    pub captaincies: u32,
    pub injured: bool,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn new(first_name: String, last_name: String, phone: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            phone,
            role,
            captaincies: 0,
            injured: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn handle(&self) -> MemberHandle {
        MemberHandle {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Human-readable composite key for a member, written as `first.last`.
/// Parsing happens here and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHandle {
    pub first_name: String,
    pub last_name: String,
}

impl std::str::FromStr for MemberHandle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(first), Some(last), None) if !first.is_empty() && !last.is_empty() => {
                Ok(MemberHandle {
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                })
            }
            _ => Err(HandleError::Malformed(s.to_string())),
        }
    }
}

impl std::fmt::Display for MemberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    Malformed(String),
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleError::Malformed(s) => {
                write!(f, "Malformed member handle '{}' (expected 'first.last')", s)
            }
        }
    }
}

impl std::error::Error for HandleError {}
