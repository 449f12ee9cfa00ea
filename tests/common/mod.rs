// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clubhouse::application::ClubService;
use clubhouse::domain::{Member, Role};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(ClubService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = ClubService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// A calendar day relative to today (negative offsets are in the past)
pub fn day_from_today(offset: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(offset)
}

/// Test fixture: standard club setup
pub struct StandardClub;

impl StandardClub {
    /// Create one admin plus three playing members
    pub async fn create_basic(service: &ClubService) -> Result<()> {
        service
            .create_member("Maria".into(), "Admin".into(), "".into(), Role::Admin)
            .await?;
        service
            .create_member("Juan".into(), "Torres".into(), "555-0101".into(), Role::User)
            .await?;
        service
            .create_member("Ana".into(), "Gil".into(), "555-0102".into(), Role::User)
            .await?;
        service
            .create_member("Pablo".into(), "Sanz".into(), "555-0103".into(), Role::User)
            .await?;
        Ok(())
    }

    /// Look up one of the fixture members by handle
    pub async fn member(service: &ClubService, handle: &str) -> Result<Member> {
        Ok(service.find_member(handle).await?)
    }
}
