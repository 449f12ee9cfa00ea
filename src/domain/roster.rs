use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MemberId;

pub type MatchId = Uuid;

/// Attendance answer a player can give for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Available,
    NotAvailable,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Available => "available",
            PlayerStatus::NotAvailable => "not-available",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(PlayerStatus::Available),
            "not-available" | "not_available" => Some(PlayerStatus::NotAvailable),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlayerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayerStatus::from_str(s).ok_or_else(|| format!("unknown player status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::A => "a",
            Team::B => "b",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "a" => Some(Team::A),
            "b" => Some(Team::B),
            _ => None,
        }
    }

    pub fn other(&self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl std::str::FromStr for Team {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Team::from_str(s).ok_or_else(|| format!("unknown team: {} (expected 'a' or 'b')", s))
    }
}

/// A scheduled match with its roster: three mutually exclusive player-status
/// partitions, two ordered team line-ups drawn from the confirmed players,
/// and free-text guest lists.
///
/// A match is an immutable snapshot: transitions consume it and return a new
/// snapshot, which the storage layer commits atomically. Once `closed` the
/// match is terminal and every transition fails with `RosterError::Closed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// Calendar day the match is played on. Unique club-wide.
    pub match_day: NaiveDate,
    pub confirmed: HashSet<MemberId>,
    pub unconfirmed: HashSet<MemberId>,
    pub not_available: HashSet<MemberId>,
    pub team_a: Vec<MemberId>,
    pub team_b: Vec<MemberId>,
    pub team_a_guests: Vec<String>,
    pub team_b_guests: Vec<String>,
    pub closed: bool,
    /// Row version of the snapshot this match was read from. Transitions
    /// carry it unchanged; the storage layer bumps it on every replace and
    /// rejects writes derived from a stale snapshot.
    pub version: i64,
}

impl Match {
    /// Create an open match for the given day. Every member of `roster`
    /// (the current non-admin members) starts in `unconfirmed`.
    pub fn new(match_day: NaiveDate, roster: impl IntoIterator<Item = MemberId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            match_day,
            confirmed: HashSet::new(),
            unconfirmed: roster.into_iter().collect(),
            not_available: HashSet::new(),
            team_a: Vec::new(),
            team_b: Vec::new(),
            team_a_guests: Vec::new(),
            team_b_guests: Vec::new(),
            closed: false,
            version: 0,
        }
    }

    fn ensure_open(&self) -> Result<(), RosterError> {
        if self.closed {
            Err(RosterError::Closed)
        } else {
            Ok(())
        }
    }

    fn team(&self, team: Team) -> &Vec<MemberId> {
        match team {
            Team::A => &self.team_a,
            Team::B => &self.team_b,
        }
    }

    fn team_mut(&mut self, team: Team) -> &mut Vec<MemberId> {
        match team {
            Team::A => &mut self.team_a,
            Team::B => &mut self.team_b,
        }
    }

    fn guests_mut(&mut self, team: Team) -> &mut Vec<String> {
        match team {
            Team::A => &mut self.team_a_guests,
            Team::B => &mut self.team_b_guests,
        }
    }

    /// Record a player's attendance answer. The id ends up in exactly one of
    /// `confirmed`/`not_available` and leaves the other two partitions; a
    /// player who withdraws also loses any team spot.
    pub fn set_player_status(
        mut self,
        player: MemberId,
        status: PlayerStatus,
    ) -> Result<Self, RosterError> {
        self.ensure_open()?;

        self.unconfirmed.remove(&player);
        match status {
            PlayerStatus::Available => {
                self.not_available.remove(&player);
                self.confirmed.insert(player);
            }
            PlayerStatus::NotAvailable => {
                self.confirmed.remove(&player);
                self.not_available.insert(player);
                self.team_a.retain(|id| *id != player);
                self.team_b.retain(|id| *id != player);
            }
        }

        Ok(self)
    }

    /// Put a confirmed player on a team, pulling them off the other team if
    /// needed. Players outside `confirmed` cannot be lined up.
    pub fn assign_to_team(mut self, player: MemberId, team: Team) -> Result<Self, RosterError> {
        self.ensure_open()?;

        if !self.confirmed.contains(&player) {
            return Err(RosterError::PlayerUnavailable(player));
        }

        self.team_mut(team.other()).retain(|id| *id != player);
        if !self.team(team).contains(&player) {
            self.team_mut(team).push(player);
        }

        Ok(self)
    }

    /// Remove a player from a team line-up. No-op if they are not on it.
    pub fn unassign_from_team(mut self, player: MemberId, team: Team) -> Result<Self, RosterError> {
        self.ensure_open()?;
        self.team_mut(team).retain(|id| *id != player);
        Ok(self)
    }

    pub fn add_guest(mut self, team: Team, name: impl Into<String>) -> Result<Self, RosterError> {
        self.ensure_open()?;
        self.guests_mut(team).push(name.into());
        Ok(self)
    }

    /// Remove one instance of a guest name (list semantics: duplicates are
    /// preserved, an absent name is a no-op).
    pub fn remove_guest(mut self, team: Team, name: &str) -> Result<Self, RosterError> {
        self.ensure_open()?;
        let guests = self.guests_mut(team);
        if let Some(pos) = guests.iter().position(|g| g == name) {
            guests.remove(pos);
        }
        Ok(self)
    }

    /// Close the match and return the players to be fined: everyone who
    /// declined or never answered. Sorted so settlement output is
    /// deterministic. Closing an already closed match is rejected, which is
    /// what makes fine generation exactly-once.
    pub fn close(mut self) -> Result<(Self, Vec<MemberId>), RosterError> {
        self.ensure_open()?;
        self.closed = true;

        let mut fined: Vec<MemberId> = self
            .not_available
            .union(&self.unconfirmed)
            .copied()
            .collect();
        fined.sort();

        Ok((self, fined))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// The match is closed; it behaves as nonexistent for mutations.
    Closed,
    /// The player is not in the confirmed partition.
    PlayerUnavailable(MemberId),
}

impl std::fmt::Display for RosterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterError::Closed => write!(f, "Match is closed"),
            RosterError::PlayerUnavailable(id) => {
                write!(f, "Player {} has not confirmed for this match", id)
            }
        }
    }
}

impl std::error::Error for RosterError {}
