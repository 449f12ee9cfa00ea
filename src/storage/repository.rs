use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Amount, Match, MatchId, Member, MemberId, Movement, MovementId, MovementType, Role,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying members, movements and matches.
///
/// Matches are stored as whole snapshots with a row version. A snapshot is
/// only ever replaced while still open and only when it was derived from
/// the current row (`WHERE ... AND closed = 0 AND version = ?`), so the
/// closed state is terminal at the storage level and a stale snapshot can
/// never overwrite a concurrent mutation.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Member operations
    // ========================

    /// Save a new member to the database.
    pub async fn save_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (id, first_name, last_name, phone, role, captaincies, injured, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(member.id.to_string())
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.phone)
        .bind(member.role.as_str())
        .bind(i64::from(member.captaincies))
        .bind(member.injured)
        .bind(member.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save member")?;
        Ok(())
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: MemberId) -> Result<Option<Member>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, phone, role, captaincies, injured, created_at
            FROM members
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_member(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a member by the unique first+last name pair.
    pub async fn get_member_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Member>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, phone, role, captaincies, injured, created_at
            FROM members
            WHERE first_name = ? AND last_name = ?
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member by name")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_member(&row)?)),
            None => Ok(None),
        }
    }

    /// List all members, ordered by name.
    pub async fn list_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query(
            r#"
            SELECT id, first_name, last_name, phone, role, captaincies, injured, created_at
            FROM members
            ORDER BY last_name, first_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list members")?;

        rows.iter().map(Self::row_to_member).collect()
    }

    /// Replace a member's stored fields.
    pub async fn update_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE members
            SET first_name = ?, last_name = ?, phone = ?, role = ?, captaincies = ?, injured = ?
            WHERE id = ?
            "#,
        )
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.phone)
        .bind(member.role.as_str())
        .bind(i64::from(member.captaincies))
        .bind(member.injured)
        .bind(member.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update member")?;
        Ok(())
    }

    /// Delete a member. Idempotent.
    pub async fn delete_member(&self, id: MemberId) -> Result<()> {
        sqlx::query("DELETE FROM members WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete member")?;
        Ok(())
    }

    fn row_to_member(row: &sqlx::sqlite::SqliteRow) -> Result<Member> {
        let id_str: String = row.get("id");
        let role_str: String = row.get("role");
        let captaincies: i64 = row.get("captaincies");
        let created_at_str: String = row.get("created_at");

        Ok(Member {
            id: Uuid::parse_str(&id_str).context("Invalid member ID")?,
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            phone: row.get("phone"),
            role: Role::from_str(&role_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid role: {}", role_str))?,
            captaincies: u32::try_from(captaincies).context("Invalid captaincy count")?,
            injured: row.get::<i32, _>("injured") != 0,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Movement operations
    // ========================

    /// Save a new movement to the database.
    pub async fn save_movement(&self, movement: &Movement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO movements (id, member_id, movement_type, amount, description, created_on)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(movement.id.to_string())
        .bind(movement.member_id.to_string())
        .bind(movement.movement_type.as_str())
        .bind(movement.amount)
        .bind(&movement.description)
        .bind(movement.created_on.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save movement")?;
        Ok(())
    }

    /// Get a movement by ID.
    pub async fn get_movement(&self, id: MovementId) -> Result<Option<Movement>> {
        let row = sqlx::query(
            r#"
            SELECT id, member_id, movement_type, amount, description, created_on
            FROM movements
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch movement")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_movement(&row)?)),
            None => Ok(None),
        }
    }

    /// Amend a movement's corrected fields. Type, owning member and creation
    /// timestamp are never written back.
    pub async fn update_movement(&self, movement: &Movement) -> Result<()> {
        sqlx::query("UPDATE movements SET amount = ?, description = ? WHERE id = ?")
            .bind(movement.amount)
            .bind(&movement.description)
            .bind(movement.id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update movement")?;
        Ok(())
    }

    /// Delete a movement. Idempotent: deleting an unknown id is a no-op.
    pub async fn delete_movement(&self, id: MovementId) -> Result<()> {
        sqlx::query("DELETE FROM movements WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete movement")?;
        Ok(())
    }

    /// List all movements in insertion order.
    pub async fn list_movements(&self) -> Result<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, member_id, movement_type, amount, description, created_on
            FROM movements
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list movements")?;

        rows.iter().map(Self::row_to_movement).collect()
    }

    /// List the movements owned by a specific member.
    pub async fn list_movements_for_member(&self, member_id: MemberId) -> Result<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, member_id, movement_type, amount, description, created_on
            FROM movements
            WHERE member_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(member_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list movements for member")?;

        rows.iter().map(Self::row_to_movement).collect()
    }

    /// List movements with optional filters.
    pub async fn list_movements_filtered(
        &self,
        member_id: Option<MemberId>,
        movement_type: Option<MovementType>,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<Movement>> {
        // Build query dynamically based on filters
        let mut query = String::from(
            "SELECT id, member_id, movement_type, amount, description, created_on FROM movements WHERE 1=1",
        );

        // Collect all string bindings first so they live long enough
        let member_id_str = member_id.map(|id| id.to_string());
        let from_date_str = from_date.map(|dt| dt.to_rfc3339());
        let to_date_str = to_date.map(|dt| dt.to_rfc3339());

        if member_id.is_some() {
            query.push_str(" AND member_id = ?");
        }
        if movement_type.is_some() {
            query.push_str(" AND movement_type = ?");
        }
        if from_date.is_some() {
            query.push_str(" AND created_on >= ?");
        }
        if to_date.is_some() {
            query.push_str(" AND created_on <= ?");
        }

        query.push_str(" ORDER BY rowid");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        // Build the query with bindings
        let mut sql_query = sqlx::query(&query);

        if let Some(ref mid_str) = member_id_str {
            sql_query = sql_query.bind(mid_str);
        }
        if let Some(mt) = movement_type {
            sql_query = sql_query.bind(mt.as_str());
        }
        if let Some(ref fd_str) = from_date_str {
            sql_query = sql_query.bind(fd_str);
        }
        if let Some(ref td_str) = to_date_str {
            sql_query = sql_query.bind(td_str);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list filtered movements")?;

        rows.iter().map(Self::row_to_movement).collect()
    }

    /// Compute the balance for a member using SQL aggregation.
    /// Purely ledger-driven: a member with no movements (or one unknown to
    /// the directory) gets 0.
    pub async fn compute_balance(&self, member_id: MemberId) -> Result<Amount> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) as balance
            FROM movements
            WHERE member_id = ?
            "#,
        )
        .bind(member_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute balance")?;

        Ok(row.get("balance"))
    }

    /// Compute balances for all members in a single query.
    /// Members with no movements won't be in the map (balance = 0).
    pub async fn compute_all_balances(
        &self,
    ) -> Result<std::collections::HashMap<MemberId, Amount>> {
        let rows = sqlx::query(
            r#"
            SELECT member_id, SUM(amount) as balance
            FROM movements
            GROUP BY member_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute all balances")?;

        let mut balances = std::collections::HashMap::new();
        for row in rows {
            let member_id_str: String = row.get("member_id");
            let balance: Amount = row.get("balance");
            let member_id = Uuid::parse_str(&member_id_str).context("Invalid member ID")?;
            balances.insert(member_id, balance);
        }

        Ok(balances)
    }

    /// Count movements owned by a member.
    pub async fn count_movements_for_member(&self, member_id: MemberId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM movements WHERE member_id = ?")
            .bind(member_id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count movements")?;

        Ok(row.get("count"))
    }

    /// Get the timestamp of the most recent movement for a member.
    pub async fn last_movement_on(&self, member_id: MemberId) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT MAX(created_on) as last_movement
            FROM movements
            WHERE member_id = ?
            "#,
        )
        .bind(member_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to get last movement")?;

        let last_movement_str: Option<String> = row.get("last_movement");
        match last_movement_str {
            Some(s) => Ok(Some(
                DateTime::parse_from_rfc3339(&s)
                    .context("Invalid timestamp")?
                    .with_timezone(&Utc),
            )),
            None => Ok(None),
        }
    }

    fn row_to_movement(row: &sqlx::sqlite::SqliteRow) -> Result<Movement> {
        let id_str: String = row.get("id");
        let member_id_str: String = row.get("member_id");
        let type_str: String = row.get("movement_type");
        let created_on_str: String = row.get("created_on");

        Ok(Movement {
            id: Uuid::parse_str(&id_str).context("Invalid movement ID")?,
            member_id: Uuid::parse_str(&member_id_str).context("Invalid member ID")?,
            movement_type: MovementType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid movement type: {}", type_str))?,
            amount: row.get("amount"),
            description: row.get("description"),
            created_on: DateTime::parse_from_rfc3339(&created_on_str)
                .context("Invalid created_on timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Match operations
    // ========================

    /// Save a new match to the database.
    pub async fn save_match(&self, match_: &Match) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO matches (id, match_day, confirmed, unconfirmed, not_available,
                                 team_a, team_b, team_a_guests, team_b_guests, closed, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(match_.id.to_string())
        .bind(match_.match_day.to_string())
        .bind(serde_json::to_string(&match_.confirmed)?)
        .bind(serde_json::to_string(&match_.unconfirmed)?)
        .bind(serde_json::to_string(&match_.not_available)?)
        .bind(serde_json::to_string(&match_.team_a)?)
        .bind(serde_json::to_string(&match_.team_b)?)
        .bind(serde_json::to_string(&match_.team_a_guests)?)
        .bind(serde_json::to_string(&match_.team_b_guests)?)
        .bind(match_.closed)
        .bind(match_.version)
        .execute(&self.pool)
        .await
        .context("Failed to save match")?;
        Ok(())
    }

    /// Get a match by ID.
    pub async fn get_match(&self, id: MatchId) -> Result<Option<Match>> {
        let row = sqlx::query(
            r#"
            SELECT id, match_day, confirmed, unconfirmed, not_available,
                   team_a, team_b, team_a_guests, team_b_guests, closed, version
            FROM matches
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch match")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_match(&row)?)),
            None => Ok(None),
        }
    }

    /// Find the match occupying the "next match" slot: the one with the
    /// smallest day on or after `today`.
    pub async fn find_next_match(&self, today: NaiveDate) -> Result<Option<Match>> {
        let row = sqlx::query(
            r#"
            SELECT id, match_day, confirmed, unconfirmed, not_available,
                   team_a, team_b, team_a_guests, team_b_guests, closed, version
            FROM matches
            WHERE match_day >= ?
            ORDER BY match_day
            LIMIT 1
            "#,
        )
        .bind(today.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find next match")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_match(&row)?)),
            None => Ok(None),
        }
    }

    /// List closed matches, most recent day first.
    pub async fn list_closed_matches(&self) -> Result<Vec<Match>> {
        let rows = sqlx::query(
            r#"
            SELECT id, match_day, confirmed, unconfirmed, not_available,
                   team_a, team_b, team_a_guests, team_b_guests, closed, version
            FROM matches
            WHERE closed = 1
            ORDER BY match_day DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list closed matches")?;

        rows.iter().map(Self::row_to_match).collect()
    }

    /// List open matches played strictly before the given day.
    pub async fn list_open_matches_before(&self, day: NaiveDate) -> Result<Vec<Match>> {
        let rows = sqlx::query(
            r#"
            SELECT id, match_day, confirmed, unconfirmed, not_available,
                   team_a, team_b, team_a_guests, team_b_guests, closed, version
            FROM matches
            WHERE closed = 0 AND match_day < ?
            ORDER BY match_day
            "#,
        )
        .bind(day.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list open matches")?;

        rows.iter().map(Self::row_to_match).collect()
    }

    /// Replace an open match with a new roster snapshot and bump the row
    /// version. Returns false when the match does not exist, has been closed
    /// in the meantime, or the snapshot was derived from an older version -
    /// the guard is in the WHERE clause, so neither a closed match nor a
    /// concurrent mutation can ever be overwritten by a stale snapshot.
    pub async fn replace_open_match(&self, match_: &Match) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE matches
            SET confirmed = ?, unconfirmed = ?, not_available = ?,
                team_a = ?, team_b = ?, team_a_guests = ?, team_b_guests = ?,
                version = version + 1
            WHERE id = ? AND closed = 0 AND version = ?
            "#,
        )
        .bind(serde_json::to_string(&match_.confirmed)?)
        .bind(serde_json::to_string(&match_.unconfirmed)?)
        .bind(serde_json::to_string(&match_.not_available)?)
        .bind(serde_json::to_string(&match_.team_a)?)
        .bind(serde_json::to_string(&match_.team_b)?)
        .bind(serde_json::to_string(&match_.team_a_guests)?)
        .bind(serde_json::to_string(&match_.team_b_guests)?)
        .bind(match_.id.to_string())
        .bind(match_.version)
        .execute(&self.pool)
        .await
        .context("Failed to replace match")?;

        Ok(result.rows_affected() > 0)
    }

    /// Close a match and append its fine movements as one transaction:
    /// either the match is marked closed and every fine is persisted, or
    /// nothing is. Returns false (and writes nothing) when the match is
    /// unknown, was already closed, or the fines were computed from a stale
    /// snapshot - which makes fines exactly-once and always derived from
    /// the current roster.
    pub async fn close_match(&self, match_: &Match, fines: &[Movement]) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin close transaction")?;

        let result = sqlx::query(
            "UPDATE matches SET closed = 1, version = version + 1 WHERE id = ? AND closed = 0 AND version = ?",
        )
        .bind(match_.id.to_string())
        .bind(match_.version)
        .execute(&mut *tx)
        .await
        .context("Failed to close match")?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .context("Failed to roll back close transaction")?;
            return Ok(false);
        }

        for fine in fines {
            sqlx::query(
                r#"
                INSERT INTO movements (id, member_id, movement_type, amount, description, created_on)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(fine.id.to_string())
            .bind(fine.member_id.to_string())
            .bind(fine.movement_type.as_str())
            .bind(fine.amount)
            .bind(&fine.description)
            .bind(fine.created_on.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to save fine movement")?;
        }

        tx.commit()
            .await
            .context("Failed to commit close transaction")?;
        Ok(true)
    }

    /// Delete a match. Idempotent; movements generated by a close survive.
    pub async fn delete_match(&self, id: MatchId) -> Result<()> {
        sqlx::query("DELETE FROM matches WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete match")?;
        Ok(())
    }

    fn row_to_match(row: &sqlx::sqlite::SqliteRow) -> Result<Match> {
        let id_str: String = row.get("id");
        let match_day_str: String = row.get("match_day");
        let confirmed_json: String = row.get("confirmed");
        let unconfirmed_json: String = row.get("unconfirmed");
        let not_available_json: String = row.get("not_available");
        let team_a_json: String = row.get("team_a");
        let team_b_json: String = row.get("team_b");
        let team_a_guests_json: String = row.get("team_a_guests");
        let team_b_guests_json: String = row.get("team_b_guests");

        Ok(Match {
            id: Uuid::parse_str(&id_str).context("Invalid match ID")?,
            match_day: NaiveDate::parse_from_str(&match_day_str, "%Y-%m-%d")
                .context("Invalid match day")?,
            confirmed: serde_json::from_str(&confirmed_json).context("Invalid confirmed set")?,
            unconfirmed: serde_json::from_str(&unconfirmed_json)
                .context("Invalid unconfirmed set")?,
            not_available: serde_json::from_str(&not_available_json)
                .context("Invalid not_available set")?,
            team_a: serde_json::from_str(&team_a_json).context("Invalid team A")?,
            team_b: serde_json::from_str(&team_b_json).context("Invalid team B")?,
            team_a_guests: serde_json::from_str(&team_a_guests_json)
                .context("Invalid team A guests")?,
            team_b_guests: serde_json::from_str(&team_b_guests_json)
                .context("Invalid team B guests")?,
            closed: row.get::<i32, _>("closed") != 0,
            version: row.get("version"),
        })
    }
}
