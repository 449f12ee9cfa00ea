use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{ClubService, MovementFilter};
use crate::domain::{MovementType, PlayerStatus, Role, Team};

/// Clubhouse - Football Club Manager
#[derive(Parser)]
#[command(name = "clubhouse")]
#[command(about = "A local-first football club manager: members, match rosters and a fines ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "clubhouse.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Member directory commands
    #[command(subcommand)]
    Member(MemberCommands),

    /// Ledger movement commands
    #[command(subcommand)]
    Movement(MovementCommands),

    /// Match roster commands
    #[command(subcommand, name = "match")]
    MatchCmd(MatchCommands),

    /// Show the balance for one member or the whole club
    Balance {
        /// Member handle as 'first.last' (omit for all members)
        member: Option<String>,
    },

    /// Close every open match whose day has passed, fining absentees
    Settle,
}

#[derive(Subcommand)]
pub enum MemberCommands {
    /// Register a new member
    Add {
        /// First name
        first_name: String,

        /// Last name (first+last must be unique)
        last_name: String,

        /// Contact phone
        #[arg(short, long, default_value = "")]
        phone: String,

        /// Role: admin, user
        #[arg(short, long, default_value = "user")]
        role: String,
    },

    /// List all members
    List,

    /// Show detailed member information
    Show {
        /// Member handle as 'first.last'
        handle: String,
    },

    /// Update a member's details
    Update {
        /// Member handle as 'first.last'
        handle: String,

        /// New first name
        #[arg(long)]
        first_name: Option<String>,

        /// New last name
        #[arg(long)]
        last_name: Option<String>,

        /// New contact phone
        #[arg(long)]
        phone: Option<String>,

        /// New captaincy count
        #[arg(long)]
        captaincies: Option<u32>,

        /// New role: admin, user
        #[arg(long)]
        role: Option<String>,
    },

    /// Flag a member as injured (or fit again)
    Injured {
        /// Member handle as 'first.last'
        handle: String,

        /// Clear the injury flag instead of setting it
        #[arg(long)]
        clear: bool,
    },

    /// Remove a member (their movements remain in the ledger)
    Remove {
        /// Member handle as 'first.last'
        handle: String,
    },
}

#[derive(Subcommand)]
pub enum MovementCommands {
    /// Append a movement to the ledger
    Add {
        /// Member handle as 'first.last'
        member: String,

        /// Signed amount in units (negative decreases the balance)
        #[arg(allow_hyphen_values = true)]
        amount: i64,

        /// Movement type: income, expense
        #[arg(short = 't', long = "type", default_value = "income")]
        movement_type: String,

        /// Description of the movement
        #[arg(short, long)]
        description: String,
    },

    /// List movements
    List {
        /// Filter by member handle
        #[arg(long)]
        member: Option<String>,

        /// Filter by type: income, expense
        #[arg(short = 't', long = "type")]
        movement_type: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of movements to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a single movement
    Show {
        /// Movement ID
        id: String,
    },

    /// Correct a movement's amount and description
    Amend {
        /// Movement ID
        id: String,

        /// Corrected amount
        #[arg(allow_hyphen_values = true)]
        amount: i64,

        /// Corrected description
        #[arg(short, long)]
        description: String,
    },

    /// Remove a movement (no-op if it does not exist)
    Remove {
        /// Movement ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum MatchCommands {
    /// Schedule a match (there can be only one upcoming match)
    Create {
        /// Match day (YYYY-MM-DD)
        day: String,
    },

    /// Show the upcoming match
    Next,

    /// Show a match roster
    Show {
        /// Match ID
        id: String,
    },

    /// Record a player's attendance answer
    Status {
        /// Match ID
        match_id: String,

        /// Player handle as 'first.last'
        player: String,

        /// Status: available, not-available
        status: String,
    },

    /// Put a confirmed player on a team
    TeamAdd {
        /// Match ID
        match_id: String,

        /// Player handle as 'first.last'
        player: String,

        /// Team: a, b
        team: String,
    },

    /// Take a player off a team
    TeamRemove {
        /// Match ID
        match_id: String,

        /// Player handle as 'first.last'
        player: String,

        /// Team: a, b
        team: String,
    },

    /// Add a guest to a team
    GuestAdd {
        /// Match ID
        match_id: String,

        /// Team: a, b
        team: String,

        /// Guest name (free text)
        name: String,
    },

    /// Remove a guest from a team
    GuestRemove {
        /// Match ID
        match_id: String,

        /// Team: a, b
        team: String,

        /// Guest name (free text)
        name: String,
    },

    /// Close a match and fine every absentee
    Close {
        /// Match ID
        id: String,
    },

    /// List settled matches, most recent first
    History,

    /// Delete a match (already generated fines remain)
    Delete {
        /// Match ID
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                ClubService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Member(member_cmd) => {
                let service = ClubService::connect(&self.database).await?;
                run_member_command(&service, member_cmd).await?;
            }

            Commands::Movement(movement_cmd) => {
                let service = ClubService::connect(&self.database).await?;
                run_movement_command(&service, movement_cmd).await?;
            }

            Commands::MatchCmd(match_cmd) => {
                let service = ClubService::connect(&self.database).await?;
                run_match_command(&service, match_cmd).await?;
            }

            Commands::Balance { member } => {
                let service = ClubService::connect(&self.database).await?;
                run_balance_command(&service, member).await?;
            }

            Commands::Settle => {
                let service = ClubService::connect(&self.database).await?;
                let settled = service.settle_past_matches().await?;
                if settled.is_empty() {
                    println!("No past matches to settle.");
                } else {
                    println!("Settled {} match(es):", settled.len());
                    for id in settled {
                        println!("  {}", id);
                    }
                }
            }
        }

        Ok(())
    }
}

async fn run_member_command(service: &ClubService, cmd: MemberCommands) -> Result<()> {
    match cmd {
        MemberCommands::Add {
            first_name,
            last_name,
            phone,
            role,
        } => {
            let role: Role = role
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid role. Valid roles: admin, user. {}", e))?;

            let member = service
                .create_member(first_name, last_name, phone, role)
                .await?;
            println!("Registered member: {} ({})", member.full_name(), member.handle());
        }

        MemberCommands::List => {
            let members = service.list_members().await?;
            if members.is_empty() {
                println!("No members found.");
            } else {
                println!("{:<25} {:<8} {:<12} {:<8}", "NAME", "ROLE", "CAPTAINCIES", "INJURED");
                println!("{}", "-".repeat(56));
                for member in members {
                    println!(
                        "{:<25} {:<8} {:<12} {:<8}",
                        member.full_name(),
                        member.role,
                        member.captaincies,
                        if member.injured { "yes" } else { "no" }
                    );
                }
            }
        }

        MemberCommands::Show { handle } => {
            let member = service.find_member(&handle).await?;
            let info = service.member_info(member.id).await?;
            let member = &info.member;

            println!("Member: {}", member.full_name());
            println!("  ID:          {}", member.id);
            println!("  Handle:      {}", member.handle());
            if !member.phone.is_empty() {
                println!("  Phone:       {}", member.phone);
            }
            println!("  Role:        {}", member.role);
            println!("  Captaincies: {}", member.captaincies);
            println!("  Injured:     {}", if member.injured { "yes" } else { "no" });
            println!(
                "  Joined:      {}",
                member.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Balance:     {}", info.balance);
            println!("  Movements:   {}", info.movement_count);
            if let Some(last) = info.last_movement {
                println!("  Last move:   {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        MemberCommands::Update {
            handle,
            first_name,
            last_name,
            phone,
            captaincies,
            role,
        } => {
            let member = service.find_member(&handle).await?;

            let role = match role {
                Some(r) => r
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid role. Valid roles: admin, user. {}", e))?,
                None => member.role,
            };

            let updated = service
                .update_member(
                    member.id,
                    first_name.unwrap_or(member.first_name),
                    last_name.unwrap_or(member.last_name),
                    phone.unwrap_or(member.phone),
                    captaincies.unwrap_or(member.captaincies),
                    role,
                )
                .await?;
            println!("Updated member: {}", updated.full_name());
        }

        MemberCommands::Injured { handle, clear } => {
            let member = service.find_member(&handle).await?;
            let member = service.set_injured(member.id, !clear).await?;
            println!(
                "{} is now {}",
                member.full_name(),
                if member.injured { "injured" } else { "fit" }
            );
        }

        MemberCommands::Remove { handle } => {
            let member = service.find_member(&handle).await?;
            service.delete_member(member.id).await?;
            println!("Removed member: {}", member.full_name());
        }
    }

    Ok(())
}

async fn run_movement_command(service: &ClubService, cmd: MovementCommands) -> Result<()> {
    match cmd {
        MovementCommands::Add {
            member,
            amount,
            movement_type,
            description,
        } => {
            let movement_type: MovementType = movement_type.parse().map_err(|e| {
                anyhow::anyhow!("Invalid movement type. Valid types: income, expense. {}", e)
            })?;

            let member = service.find_member(&member).await?;
            let movement = service
                .record_movement(member.id, movement_type, amount, description)
                .await?;
            println!(
                "Recorded {}: {} for {} ({})",
                movement.movement_type,
                movement.amount,
                member.full_name(),
                movement.id
            );
        }

        MovementCommands::List {
            member,
            movement_type,
            from_date,
            to_date,
            limit,
        } => {
            let movement_type = movement_type
                .map(|t| {
                    t.parse::<MovementType>().map_err(|e| {
                        anyhow::anyhow!("Invalid movement type. Valid types: income, expense. {}", e)
                    })
                })
                .transpose()?;

            let filter = MovementFilter {
                member,
                movement_type,
                from_date: from_date.map(|d| parse_date(&d)).transpose()?,
                to_date: to_date.map(|d| parse_date(&d)).transpose()?,
                limit,
            };

            let movements = service.list_movements_filtered(filter).await?;
            if movements.is_empty() {
                println!("No movements found.");
            } else {
                println!("{:<12} {:<8} {:<10} DESCRIPTION", "DATE", "TYPE", "AMOUNT");
                println!("{}", "-".repeat(60));
                for movement in movements {
                    println!(
                        "{:<12} {:<8} {:<10} {}",
                        movement.created_on.format("%Y-%m-%d"),
                        movement.movement_type,
                        movement.amount,
                        movement.description
                    );
                }
            }
        }

        MovementCommands::Show { id } => {
            let movement_id =
                Uuid::parse_str(&id).context("Invalid movement ID format (expected UUID)")?;
            let movement = service.get_movement(movement_id).await?;

            println!("Movement: {}", movement.id);
            println!("  Member:      {}", movement.member_id);
            println!("  Type:        {}", movement.movement_type);
            println!("  Amount:      {}", movement.amount);
            println!("  Description: {}", movement.description);
            println!(
                "  Created:     {}",
                movement.created_on.format("%Y-%m-%d %H:%M:%S")
            );
        }

        MovementCommands::Amend {
            id,
            amount,
            description,
        } => {
            let movement_id =
                Uuid::parse_str(&id).context("Invalid movement ID format (expected UUID)")?;
            let movement = service.amend_movement(movement_id, amount, description).await?;
            println!("Amended movement {}: {}", movement.id, movement.amount);
        }

        MovementCommands::Remove { id } => {
            let movement_id =
                Uuid::parse_str(&id).context("Invalid movement ID format (expected UUID)")?;
            service.remove_movement(movement_id).await?;
            println!("Removed movement: {}", movement_id);
        }
    }

    Ok(())
}

async fn run_match_command(service: &ClubService, cmd: MatchCommands) -> Result<()> {
    match cmd {
        MatchCommands::Create { day } => {
            let match_day = parse_day(&day)?;
            let match_ = service.create_match(match_day).await?;
            println!(
                "Scheduled match for {} ({} players to confirm, id {})",
                match_.match_day,
                match_.unconfirmed.len(),
                match_.id
            );
        }

        MatchCommands::Next => {
            let match_ = service.next_match().await?;
            print_match(service, match_.id).await?;
        }

        MatchCommands::Show { id } => {
            let match_id = parse_match_id(&id)?;
            print_match(service, match_id).await?;
        }

        MatchCommands::Status {
            match_id,
            player,
            status,
        } => {
            let match_id = parse_match_id(&match_id)?;
            let status: PlayerStatus = status.parse().map_err(|e| {
                anyhow::anyhow!(
                    "Invalid status. Valid statuses: available, not-available. {}",
                    e
                )
            })?;

            service.set_player_status(match_id, &player, status).await?;
            println!("{} is {}", player, status);
        }

        MatchCommands::TeamAdd {
            match_id,
            player,
            team,
        } => {
            let match_id = parse_match_id(&match_id)?;
            let team = parse_team(&team)?;
            let member = service.find_member(&player).await?;

            service.assign_to_team(match_id, member.id, team).await?;
            println!("{} plays in team {}", member.full_name(), team);
        }

        MatchCommands::TeamRemove {
            match_id,
            player,
            team,
        } => {
            let match_id = parse_match_id(&match_id)?;
            let team = parse_team(&team)?;
            let member = service.find_member(&player).await?;

            service.unassign_from_team(match_id, member.id, team).await?;
            println!("{} left team {}", member.full_name(), team);
        }

        MatchCommands::GuestAdd {
            match_id,
            team,
            name,
        } => {
            let match_id = parse_match_id(&match_id)?;
            let team = parse_team(&team)?;

            service.add_guest(match_id, team, name.clone()).await?;
            println!("Guest {} plays in team {}", name, team);
        }

        MatchCommands::GuestRemove {
            match_id,
            team,
            name,
        } => {
            let match_id = parse_match_id(&match_id)?;
            let team = parse_team(&team)?;

            service.remove_guest(match_id, team, &name).await?;
            println!("Guest {} left team {}", name, team);
        }

        MatchCommands::Close { id } => {
            let match_id = parse_match_id(&id)?;
            let fines = service.close_match(match_id).await?;
            println!("Match closed. Fines issued: {}", fines.len());
        }

        MatchCommands::History => {
            let matches = service.list_closed_matches().await?;
            if matches.is_empty() {
                println!("No settled matches.");
            } else {
                println!("{:<12} {:<10} {:<10} {:<8}", "DAY", "CONFIRMED", "ABSENT", "TEAMS");
                println!("{}", "-".repeat(44));
                for m in matches {
                    println!(
                        "{:<12} {:<10} {:<10} {}v{}",
                        m.match_day,
                        m.confirmed.len(),
                        m.not_available.len() + m.unconfirmed.len(),
                        m.team_a.len() + m.team_a_guests.len(),
                        m.team_b.len() + m.team_b_guests.len()
                    );
                }
            }
        }

        MatchCommands::Delete { id } => {
            let match_id = parse_match_id(&id)?;
            service.delete_match(match_id).await?;
            println!("Deleted match: {}", match_id);
        }
    }

    Ok(())
}

async fn run_balance_command(service: &ClubService, member: Option<String>) -> Result<()> {
    match member {
        Some(handle) => {
            let member = service.find_member(&handle).await?;
            let balance = service.balance_of(member.id).await?;
            println!("{}: {}", member.full_name(), balance);
        }
        None => {
            let balances = service.all_balances().await?;
            if balances.is_empty() {
                println!("No members found.");
            } else {
                println!("{:<25} {:>10}", "NAME", "BALANCE");
                println!("{}", "-".repeat(36));
                for entry in balances {
                    println!("{:<25} {:>10}", entry.member.full_name(), entry.balance);
                }
            }
        }
    }

    Ok(())
}

async fn print_match(service: &ClubService, id: crate::domain::MatchId) -> Result<()> {
    let roster = service.match_roster(id).await?;
    let m = &roster.match_;
    let name = |id: &crate::domain::MemberId| -> &str {
        roster.names.get(id).map(String::as_str).unwrap_or("Not found")
    };

    println!(
        "Match on {} ({}) - id {}",
        m.match_day,
        if m.closed { "closed" } else { "open" },
        m.id
    );

    print_section("Confirmed", m.confirmed.iter().map(name));
    print_section("Unconfirmed", m.unconfirmed.iter().map(name));
    print_section("Not available", m.not_available.iter().map(name));
    print_section(
        "Team A",
        m.team_a
            .iter()
            .map(name)
            .chain(m.team_a_guests.iter().map(String::as_str)),
    );
    print_section(
        "Team B",
        m.team_b
            .iter()
            .map(name)
            .chain(m.team_b_guests.iter().map(String::as_str)),
    );

    Ok(())
}

fn print_section<'a>(title: &str, names: impl Iterator<Item = &'a str>) {
    let names: Vec<&str> = names.collect();
    if names.is_empty() {
        println!("  {:<15} -", title);
    } else {
        println!("  {:<15} {}", title, names.join(", "));
    }
}

fn parse_match_id(id: &str) -> Result<crate::domain::MatchId> {
    Uuid::parse_str(id).context("Invalid match ID format (expected UUID)")
}

fn parse_team(team: &str) -> Result<Team> {
    team.parse()
        .map_err(|e| anyhow::anyhow!("Invalid team. Valid teams: a, b. {}", e))
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let midnight = parse_day(s)?
        .and_hms_opt(0, 0, 0)
        .context("Invalid time of day")?;
    Ok(midnight.and_utc())
}
