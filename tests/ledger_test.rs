mod common;

use anyhow::Result;
use clubhouse::application::{AppError, MovementFilter};
use clubhouse::domain::{compute_balance, MovementType};
use common::{test_service, StandardClub};
use uuid::Uuid;

#[tokio::test]
async fn test_append_requires_known_member() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .record_movement(Uuid::new_v4(), MovementType::Income, 10, "Dues".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MemberNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_balance_replays_the_ledger() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let juan = StandardClub::member(&service, "Juan.Torres").await?;

    let dues = service
        .record_movement(juan.id, MovementType::Income, 20, "Dues".into())
        .await?;
    let fine = service
        .record_movement(juan.id, MovementType::Expense, -4, "Yellow card".into())
        .await?;
    service
        .record_movement(juan.id, MovementType::Expense, -1, "Late".into())
        .await?;
    assert_eq!(service.balance_of(juan.id).await?, 15);

    // Amending replays into the new amount
    service
        .amend_movement(fine.id, -2, "Yellow card (appealed)".into())
        .await?;
    assert_eq!(service.balance_of(juan.id).await?, 17);

    // Removal replays too
    service.remove_movement(dues.id).await?;
    assert_eq!(service.balance_of(juan.id).await?, -3);

    // The SQL aggregation agrees with the in-memory ledger algebra
    let movements = service.list_movements_for(juan.id).await?;
    assert_eq!(compute_balance(juan.id, &movements), -3);

    Ok(())
}

#[tokio::test]
async fn test_balance_of_unknown_member_is_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // No directory check, no error - just an empty ledger
    assert_eq!(service.balance_of(Uuid::new_v4()).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_amend_preserves_immutable_fields() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let ana = StandardClub::member(&service, "Ana.Gil").await?;
    let original = service
        .record_movement(ana.id, MovementType::Expense, -10, "Red card".into())
        .await?;

    let amended = service
        .amend_movement(original.id, -5, "Red card (reduced)".into())
        .await?;
    assert_eq!(amended.id, original.id);
    assert_eq!(amended.member_id, original.member_id);
    assert_eq!(amended.movement_type, original.movement_type);
    assert_eq!(amended.created_on, original.created_on);

    let stored = service.get_movement(original.id).await?;
    assert_eq!(stored.amount, -5);
    assert_eq!(stored.description, "Red card (reduced)");
    assert_eq!(stored.movement_type, MovementType::Expense);

    Ok(())
}

#[tokio::test]
async fn test_amend_unknown_movement_fails() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .amend_movement(Uuid::new_v4(), 1, "nope".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MovementNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_amend_orphaned_movement_fails() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let pablo = StandardClub::member(&service, "Pablo.Sanz").await?;
    let movement = service
        .record_movement(pablo.id, MovementType::Income, 20, "Dues".into())
        .await?;

    service.delete_member(pablo.id).await?;

    let err = service
        .amend_movement(movement.id, 25, "Dues (corrected)".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MemberNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_remove_is_idempotent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let juan = StandardClub::member(&service, "Juan.Torres").await?;
    let movement = service
        .record_movement(juan.id, MovementType::Income, 20, "Dues".into())
        .await?;

    service.remove_movement(movement.id).await?;
    // Removing again (or removing garbage) is a quiet no-op
    service.remove_movement(movement.id).await?;
    service.remove_movement(Uuid::new_v4()).await?;

    assert!(service.list_movements().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_list_keeps_insertion_order() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let juan = StandardClub::member(&service, "Juan.Torres").await?;
    let ana = StandardClub::member(&service, "Ana.Gil").await?;

    let descriptions = ["first", "second", "third"];
    service
        .record_movement(juan.id, MovementType::Income, 1, descriptions[0].into())
        .await?;
    service
        .record_movement(ana.id, MovementType::Income, 2, descriptions[1].into())
        .await?;
    service
        .record_movement(juan.id, MovementType::Income, 3, descriptions[2].into())
        .await?;

    let listed: Vec<String> = service
        .list_movements()
        .await?
        .into_iter()
        .map(|m| m.description)
        .collect();
    assert_eq!(listed, descriptions);

    Ok(())
}

#[tokio::test]
async fn test_filtered_listing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let juan = StandardClub::member(&service, "Juan.Torres").await?;
    let ana = StandardClub::member(&service, "Ana.Gil").await?;

    service
        .record_movement(juan.id, MovementType::Income, 20, "Dues".into())
        .await?;
    service
        .record_movement(juan.id, MovementType::Expense, -1, "Fine".into())
        .await?;
    service
        .record_movement(ana.id, MovementType::Expense, -1, "Fine".into())
        .await?;

    // By member handle
    let filter = MovementFilter {
        member: Some("Juan.Torres".into()),
        movement_type: None,
        from_date: None,
        to_date: None,
        limit: None,
    };
    assert_eq!(service.list_movements_filtered(filter).await?.len(), 2);

    // By type
    let filter = MovementFilter {
        member: None,
        movement_type: Some(MovementType::Expense),
        from_date: None,
        to_date: None,
        limit: None,
    };
    assert_eq!(service.list_movements_filtered(filter).await?.len(), 2);

    // Combined, with a limit
    let filter = MovementFilter {
        member: Some("Juan.Torres".into()),
        movement_type: Some(MovementType::Expense),
        from_date: None,
        to_date: None,
        limit: Some(1),
    };
    let filtered = service.list_movements_filtered(filter).await?;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].member_id, juan.id);

    Ok(())
}

#[tokio::test]
async fn test_all_balances_covers_every_member() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardClub::create_basic(&service).await?;

    let juan = StandardClub::member(&service, "Juan.Torres").await?;
    service
        .record_movement(juan.id, MovementType::Income, 20, "Dues".into())
        .await?;

    let balances = service.all_balances().await?;
    // admin + 3 players, members without movements at 0
    assert_eq!(balances.len(), 4);
    for entry in balances {
        let expected = if entry.member.id == juan.id { 20 } else { 0 };
        assert_eq!(entry.balance, expected, "{}", entry.member.full_name());
    }

    Ok(())
}
