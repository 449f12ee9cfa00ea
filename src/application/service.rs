use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

use crate::domain::{
    Amount, Match, MatchId, Member, MemberHandle, MemberId, Movement, MovementId, MovementType,
    PlayerStatus, Role, RosterError, Team,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing high-level operations for the club:
/// the member directory, the fines ledger and the match roster engine.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
pub struct ClubService {
    repo: Repository,
}

/// Detailed member information with the derived balance
pub struct MemberInfo {
    pub member: Member,
    pub balance: Amount,
    pub movement_count: i64,
    pub last_movement: Option<DateTime<Utc>>,
}

/// Balance entry for a member
pub struct BalanceEntry {
    pub member: Member,
    pub balance: Amount,
}

/// Filter for querying movements
pub struct MovementFilter {
    pub member: Option<String>,
    pub movement_type: Option<MovementType>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// A match together with display names for every member id it references.
/// Members removed from the directory keep their roster slot and show up as
/// "Not found".
pub struct MatchRoster {
    pub match_: Match,
    pub names: HashMap<MemberId, String>,
}

impl ClubService {
    /// Create a new club service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Member directory
    // ========================

    /// Register a new member. The first+last name pair must be unique.
    pub async fn create_member(
        &self,
        first_name: String,
        last_name: String,
        phone: String,
        role: Role,
    ) -> Result<Member, AppError> {
        if self
            .repo
            .get_member_by_name(&first_name, &last_name)
            .await?
            .is_some()
        {
            return Err(AppError::MemberAlreadyExists(format!(
                "{} {}",
                first_name, last_name
            )));
        }

        let member = Member::new(first_name, last_name, phone, role);
        self.repo.save_member(&member).await?;
        Ok(member)
    }

    /// Get a member by id.
    pub async fn get_member(&self, id: MemberId) -> Result<Member, AppError> {
        self.repo
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::MemberNotFound(id.to_string()))
    }

    /// Resolve a `first.last` handle to a member. This is the single place
    /// where the human-readable composite key is parsed and looked up; a
    /// malformed handle does not resolve and reports as not found.
    pub async fn find_member(&self, handle: &str) -> Result<Member, AppError> {
        let parsed: MemberHandle = handle
            .parse()
            .map_err(|_| AppError::MemberNotFound(handle.to_string()))?;

        self.repo
            .get_member_by_name(&parsed.first_name, &parsed.last_name)
            .await?
            .ok_or_else(|| AppError::MemberNotFound(handle.to_string()))
    }

    /// List all members.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        Ok(self.repo.list_members().await?)
    }

    /// Get detailed member information, including the derived balance.
    pub async fn member_info(&self, id: MemberId) -> Result<MemberInfo, AppError> {
        let member = self.get_member(id).await?;
        let balance = self.repo.compute_balance(member.id).await?;
        let movement_count = self.repo.count_movements_for_member(member.id).await?;
        let last_movement = self.repo.last_movement_on(member.id).await?;

        Ok(MemberInfo {
            member,
            balance,
            movement_count,
            last_movement,
        })
    }

    /// Update a member's editable fields. Identity, injury flag and creation
    /// timestamp are preserved.
    pub async fn update_member(
        &self,
        id: MemberId,
        first_name: String,
        last_name: String,
        phone: String,
        captaincies: u32,
        role: Role,
    ) -> Result<Member, AppError> {
        let member = self.get_member(id).await?;

        // Renaming onto another member's name is the same collision as
        // creating a duplicate
        if let Some(existing) = self
            .repo
            .get_member_by_name(&first_name, &last_name)
            .await?
        {
            if existing.id != id {
                return Err(AppError::MemberAlreadyExists(format!(
                    "{} {}",
                    first_name, last_name
                )));
            }
        }

        let updated = Member {
            id: member.id,
            first_name,
            last_name,
            phone,
            role,
            captaincies,
            injured: member.injured,
            created_at: member.created_at,
        };
        self.repo.update_member(&updated).await?;
        Ok(updated)
    }

    /// Flag or clear a member's injury.
    pub async fn set_injured(&self, id: MemberId, injured: bool) -> Result<Member, AppError> {
        let mut member = self.get_member(id).await?;
        member.injured = injured;
        self.repo.update_member(&member).await?;
        Ok(member)
    }

    /// Remove a member. Their ledger movements are independent facts and
    /// survive the removal.
    pub async fn delete_member(&self, id: MemberId) -> Result<(), AppError> {
        self.repo.delete_member(id).await?;
        Ok(())
    }

    // ========================
    // Ledger
    // ========================

    /// Append a movement to the ledger.
    pub async fn record_movement(
        &self,
        member_id: MemberId,
        movement_type: MovementType,
        amount: Amount,
        description: String,
    ) -> Result<Movement, AppError> {
        // Appending requires a known member; the reverse is not true once
        // the movement exists.
        self.get_member(member_id).await?;

        let movement = Movement::new(member_id, movement_type, amount, description);
        self.repo.save_movement(&movement).await?;
        Ok(movement)
    }

    /// Correct a movement's amount and description. Its type, owning member
    /// and creation timestamp are immutable.
    pub async fn amend_movement(
        &self,
        id: MovementId,
        amount: Amount,
        description: String,
    ) -> Result<Movement, AppError> {
        let movement = self.get_movement(id).await?;

        // The owning member may have been removed since the movement was
        // created; an amendment on an orphaned movement is rejected.
        self.get_member(movement.member_id).await?;

        let amended = movement.amended(amount, description);
        self.repo.update_movement(&amended).await?;
        Ok(amended)
    }

    /// Remove a movement. Idempotent: removing an unknown id is a no-op.
    pub async fn remove_movement(&self, id: MovementId) -> Result<(), AppError> {
        self.repo.delete_movement(id).await?;
        Ok(())
    }

    /// Get a movement by id.
    pub async fn get_movement(&self, id: MovementId) -> Result<Movement, AppError> {
        self.repo
            .get_movement(id)
            .await?
            .ok_or_else(|| AppError::MovementNotFound(id.to_string()))
    }

    /// List all movements in insertion order.
    pub async fn list_movements(&self) -> Result<Vec<Movement>, AppError> {
        Ok(self.repo.list_movements().await?)
    }

    /// List the movements owned by one member, in insertion order. Purely
    /// ledger-driven: an id unknown to the directory yields an empty list.
    pub async fn list_movements_for(&self, member_id: MemberId) -> Result<Vec<Movement>, AppError> {
        Ok(self.repo.list_movements_for_member(member_id).await?)
    }

    /// List movements with filters.
    pub async fn list_movements_filtered(
        &self,
        filter: MovementFilter,
    ) -> Result<Vec<Movement>, AppError> {
        // Resolve the member handle to an id if provided
        let member_id = if let Some(handle) = &filter.member {
            Some(self.find_member(handle).await?.id)
        } else {
            None
        };

        Ok(self
            .repo
            .list_movements_filtered(
                member_id,
                filter.movement_type,
                filter.from_date,
                filter.to_date,
                filter.limit,
            )
            .await?)
    }

    /// Balance for a single member: the sum of their movement amounts.
    /// Never cached, never stored, and independent of the directory - an
    /// unknown member simply has balance 0.
    pub async fn balance_of(&self, member_id: MemberId) -> Result<Amount, AppError> {
        Ok(self.repo.compute_balance(member_id).await?)
    }

    /// Balances for all members of the directory.
    pub async fn all_balances(&self) -> Result<Vec<BalanceEntry>, AppError> {
        let members = self.repo.list_members().await?;
        let balances = self.repo.compute_all_balances().await?;

        Ok(members
            .into_iter()
            .map(|member| {
                let balance = balances.get(&member.id).copied().unwrap_or(0);
                BalanceEntry { member, balance }
            })
            .collect())
    }

    // ========================
    // Match roster engine
    // ========================

    /// Schedule a match. There is a single "next match" slot: creation is
    /// rejected while any match with a day on or after today exists. Every
    /// current non-admin member starts in `unconfirmed`.
    pub async fn create_match(&self, match_day: NaiveDate) -> Result<Match, AppError> {
        let today = Utc::now().date_naive();
        if let Some(existing) = self.repo.find_next_match(today).await? {
            return Err(AppError::MatchAlreadyExists(existing.match_day.to_string()));
        }

        let roster: Vec<MemberId> = self
            .repo
            .list_members()
            .await?
            .into_iter()
            .filter(|m| !m.is_admin())
            .map(|m| m.id)
            .collect();

        let match_ = Match::new(match_day, roster);
        self.repo.save_match(&match_).await?;
        Ok(match_)
    }

    /// Get a match by id.
    pub async fn get_match(&self, id: MatchId) -> Result<Match, AppError> {
        self.repo
            .get_match(id)
            .await?
            .ok_or_else(|| AppError::MatchNotFound(id.to_string()))
    }

    /// The match with the smallest day on or after today.
    pub async fn next_match(&self) -> Result<Match, AppError> {
        let today = Utc::now().date_naive();
        self.repo
            .find_next_match(today)
            .await?
            .ok_or(AppError::NoUpcomingMatch)
    }

    /// A match annotated with display names for every referenced member.
    pub async fn match_roster(&self, id: MatchId) -> Result<MatchRoster, AppError> {
        let match_ = self.get_match(id).await?;

        let mut names = HashMap::new();
        let ids = match_
            .confirmed
            .iter()
            .chain(match_.unconfirmed.iter())
            .chain(match_.not_available.iter())
            .chain(match_.team_a.iter())
            .chain(match_.team_b.iter());
        for id in ids {
            if !names.contains_key(id) {
                let name = self
                    .repo
                    .get_member(*id)
                    .await?
                    .map(|m| m.full_name())
                    .unwrap_or_else(|| "Not found".to_string());
                names.insert(*id, name);
            }
        }

        Ok(MatchRoster { match_, names })
    }

    /// Record a player's attendance answer. The player is addressed by their
    /// `first.last` handle, as they would identify themselves.
    pub async fn set_player_status(
        &self,
        match_id: MatchId,
        player: &str,
        status: PlayerStatus,
    ) -> Result<(), AppError> {
        let member = self.find_member(player).await?;
        self.apply_roster(match_id, |m| m.set_player_status(member.id, status))
            .await
    }

    /// Put a confirmed player on a team line-up.
    pub async fn assign_to_team(
        &self,
        match_id: MatchId,
        member_id: MemberId,
        team: Team,
    ) -> Result<(), AppError> {
        self.get_member(member_id).await?;
        self.apply_roster(match_id, |m| m.assign_to_team(member_id, team))
            .await
    }

    /// Take a player off a team line-up. No-op if they are not on it.
    pub async fn unassign_from_team(
        &self,
        match_id: MatchId,
        member_id: MemberId,
        team: Team,
    ) -> Result<(), AppError> {
        self.apply_roster(match_id, |m| m.unassign_from_team(member_id, team))
            .await
    }

    /// Add a free-text guest to a team.
    pub async fn add_guest(
        &self,
        match_id: MatchId,
        team: Team,
        name: String,
    ) -> Result<(), AppError> {
        self.apply_roster(match_id, |m| m.add_guest(team, name.clone()))
            .await
    }

    /// Remove one instance of a guest name from a team.
    pub async fn remove_guest(
        &self,
        match_id: MatchId,
        team: Team,
        name: &str,
    ) -> Result<(), AppError> {
        self.apply_roster(match_id, |m| m.remove_guest(team, name))
            .await
    }

    /// Close a match and fine every player who declined or never answered:
    /// one expense movement of -1 per player, all committed in the same
    /// transaction that marks the match closed. Closing an already closed
    /// match is rejected and appends nothing.
    pub async fn close_match(&self, id: MatchId) -> Result<Vec<Movement>, AppError> {
        loop {
            let match_ = self.get_match(id).await?;

            let (closed, fined) = match_.close().map_err(|e| Self::roster_error(id, e))?;
            let fines: Vec<Movement> = fined
                .into_iter()
                .map(|player| Movement::fine(player, closed.match_day))
                .collect();

            if self.repo.close_match(&closed, &fines).await? {
                return Ok(fines);
            }
            // The snapshot went stale before the close committed. A roster
            // mutation slipped in: retry so the fines reflect the current
            // roster. A concurrent close surfaces on the re-read as
            // MatchNotFound.
        }
    }

    /// Settled matches for history views, most recent day first.
    pub async fn list_closed_matches(&self) -> Result<Vec<Match>, AppError> {
        Ok(self.repo.list_closed_matches().await?)
    }

    /// Remove a match. Unconditional; fines already generated by a close are
    /// independent facts and are not cleaned up.
    pub async fn delete_match(&self, id: MatchId) -> Result<(), AppError> {
        self.repo.delete_match(id).await?;
        Ok(())
    }

    // ========================
    // Settlement
    // ========================

    /// Close every open match whose day has passed. Each close attempt is
    /// independent: a failure is logged and the sweep moves on, so one bad
    /// match cannot block the rest. Returns the ids actually settled.
    pub async fn settle_past_matches(&self) -> Result<Vec<MatchId>, AppError> {
        let today = Utc::now().date_naive();
        let open = self.repo.list_open_matches_before(today).await?;

        let mut settled = Vec::new();
        for match_ in open {
            match self.close_match(match_.id).await {
                Ok(fines) => {
                    tracing::info!(
                        match_id = %match_.id,
                        match_day = %match_.match_day,
                        fines = fines.len(),
                        "settled past match"
                    );
                    settled.push(match_.id);
                }
                Err(err) => {
                    tracing::warn!(
                        match_id = %match_.id,
                        match_day = %match_.match_day,
                        error = %err,
                        "failed to settle match, skipping"
                    );
                }
            }
        }
        Ok(settled)
    }

    // ========================
    // Helpers
    // ========================

    fn roster_error(match_id: MatchId, err: RosterError) -> AppError {
        match err {
            // Closed matches behave as not-found for mutations
            RosterError::Closed => AppError::MatchNotFound(match_id.to_string()),
            RosterError::PlayerUnavailable(player) => AppError::PlayerUnavailable(player),
        }
    }

    /// Apply a roster transition as an atomic read-modify-write unit. The
    /// replace is version-guarded, so a snapshot that went stale under a
    /// concurrent mutation writes nothing; the transition is then re-applied
    /// to a fresh read. A match that closed or vanished in the meantime
    /// surfaces on the re-read as not-found.
    async fn apply_roster<F>(&self, match_id: MatchId, transition: F) -> Result<(), AppError>
    where
        F: Fn(Match) -> Result<Match, RosterError>,
    {
        loop {
            let match_ = self.get_match(match_id).await?;
            let updated = transition(match_).map_err(|e| Self::roster_error(match_id, e))?;
            if self.repo.replace_open_match(&updated).await? {
                return Ok(());
            }
        }
    }
}
