mod common;

use anyhow::Result;
use clubhouse::application::AppError;
use clubhouse::domain::{MovementType, PlayerStatus, Role, Team, MATCH_FINE};
use common::{day_from_today, test_service, StandardClub};

#[tokio::test]
async fn test_close_fines_every_absentee() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let match_ = service.create_match(day_from_today(-1)).await?;
    let juan = StandardClub::member(&service, "Juan.Torres").await?;
    let ana = StandardClub::member(&service, "Ana.Gil").await?;
    let pablo = StandardClub::member(&service, "Pablo.Sanz").await?;

    // Juan played, Ana declined, Pablo never answered
    service
        .set_player_status(match_.id, "Juan.Torres", PlayerStatus::Available)
        .await?;
    service
        .set_player_status(match_.id, "Ana.Gil", PlayerStatus::NotAvailable)
        .await?;

    let fines = service.close_match(match_.id).await?;
    assert_eq!(fines.len(), 2);
    for fine in &fines {
        assert_eq!(fine.movement_type, MovementType::Expense);
        assert_eq!(fine.amount, MATCH_FINE);
        assert!(
            fine.description.contains(&match_.match_day.to_string()),
            "fine names the match day: {}",
            fine.description
        );
    }
    let mut fined: Vec<_> = fines.iter().map(|f| f.member_id).collect();
    fined.sort();
    let mut expected = vec![ana.id, pablo.id];
    expected.sort();
    assert_eq!(fined, expected);

    assert_eq!(service.balance_of(juan.id).await?, 0);
    assert_eq!(service.balance_of(ana.id).await?, -1);
    assert_eq!(service.balance_of(pablo.id).await?, -1);

    Ok(())
}

#[tokio::test]
async fn test_close_is_exactly_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let match_ = service.create_match(day_from_today(-1)).await?;
    service.close_match(match_.id).await?;

    let err = service.close_match(match_.id).await.unwrap_err();
    assert!(matches!(err, AppError::MatchNotFound(_)));

    // No second round of fines was booked
    assert_eq!(service.list_movements().await?.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_decline_after_confirming_still_gets_fined() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let match_ = service.create_match(day_from_today(-1)).await?;
    let juan = StandardClub::member(&service, "Juan.Torres").await?;
    let ana = StandardClub::member(&service, "Ana.Gil").await?;
    let pablo = StandardClub::member(&service, "Pablo.Sanz").await?;

    service
        .set_player_status(match_.id, "Juan.Torres", PlayerStatus::Available)
        .await?;
    service.assign_to_team(match_.id, juan.id, Team::A).await?;

    // Ana confirms, gets lined up, then pulls out
    service
        .set_player_status(match_.id, "Ana.Gil", PlayerStatus::Available)
        .await?;
    service.assign_to_team(match_.id, ana.id, Team::B).await?;
    service
        .set_player_status(match_.id, "Ana.Gil", PlayerStatus::NotAvailable)
        .await?;

    // Pulling out also vacated her team slot
    let m = service.get_match(match_.id).await?;
    assert!(m.team_b.is_empty());
    let err = service
        .assign_to_team(match_.id, ana.id, Team::B)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PlayerUnavailable(id) if id == ana.id));

    let fines = service.close_match(match_.id).await?;
    let mut fined: Vec<_> = fines.iter().map(|f| f.member_id).collect();
    fined.sort();
    let mut expected = vec![ana.id, pablo.id];
    expected.sort();
    assert_eq!(fined, expected);
    assert_eq!(service.balance_of(juan.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_full_roster_lifecycle_fines_the_silent_decliner() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let a = service
        .create_member("Ivan".into(), "Mora".into(), "".into(), Role::User)
        .await?;
    let b = service
        .create_member("Oscar".into(), "Vidal".into(), "".into(), Role::User)
        .await?;

    let match_ = service.create_match(day_from_today(7)).await?;
    assert!(match_.unconfirmed.contains(&a.id) && match_.unconfirmed.contains(&b.id));

    service
        .set_player_status(match_.id, "Ivan.Mora", PlayerStatus::Available)
        .await?;

    // B never confirmed, so lining them up fails both before and after
    // they explicitly decline
    let err = service
        .assign_to_team(match_.id, b.id, Team::A)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PlayerUnavailable(id) if id == b.id));

    service
        .set_player_status(match_.id, "Oscar.Vidal", PlayerStatus::NotAvailable)
        .await?;
    let err = service
        .assign_to_team(match_.id, b.id, Team::A)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PlayerUnavailable(id) if id == b.id));

    let fines = service.close_match(match_.id).await?;
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].member_id, b.id);
    assert_eq!(service.balance_of(a.id).await?, 0);
    assert_eq!(service.balance_of(b.id).await?, -1);

    Ok(())
}

#[tokio::test]
async fn test_everyone_confirmed_means_no_fines() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let match_ = service.create_match(day_from_today(-1)).await?;
    for handle in ["Juan.Torres", "Ana.Gil", "Pablo.Sanz"] {
        service
            .set_player_status(match_.id, handle, PlayerStatus::Available)
            .await?;
    }

    let fines = service.close_match(match_.id).await?;
    assert!(fines.is_empty());
    assert!(service.list_movements().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_settle_sweeps_only_past_open_matches() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let past = service.create_match(day_from_today(-7)).await?;
    let upcoming = service.create_match(day_from_today(7)).await?;

    let settled = service.settle_past_matches().await?;
    assert_eq!(settled, vec![past.id]);

    assert!(service.get_match(past.id).await?.closed);
    assert!(!service.get_match(upcoming.id).await?.closed);

    // Fines landed for all three absentees of the past match
    assert_eq!(service.list_movements().await?.len(), 3);

    // A second sweep finds nothing left to do
    assert!(service.settle_past_matches().await?.is_empty());
    assert_eq!(service.list_movements().await?.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_deleting_a_closed_match_keeps_the_fines() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let match_ = service.create_match(day_from_today(-1)).await?;
    let fines = service.close_match(match_.id).await?;
    assert_eq!(fines.len(), 3);

    service.delete_match(match_.id).await?;

    let err = service.get_match(match_.id).await.unwrap_err();
    assert!(matches!(err, AppError::MatchNotFound(_)));
    assert_eq!(service.list_movements().await?.len(), 3);

    Ok(())
}
