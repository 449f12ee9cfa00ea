use std::collections::HashMap;

use super::{Amount, MemberId, Movement};

/// Compute the balance for a single member from a list of movements.
/// Balance = sum of all movement amounts for that member. A member with no
/// movements has balance 0; the member directory is never consulted.
pub fn compute_balance(member_id: MemberId, movements: &[Movement]) -> Amount {
    movements
        .iter()
        .filter(|m| m.member_id == member_id)
        .map(|m| m.amount)
        .sum()
}

/// Compute balances for all members that appear in the ledger.
/// Returns a map of member_id -> balance.
pub fn compute_all_balances(movements: &[Movement]) -> HashMap<MemberId, Amount> {
    let mut balances: HashMap<MemberId, Amount> = HashMap::new();

    for movement in movements {
        *balances.entry(movement.member_id).or_insert(0) += movement.amount;
    }

    balances
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::MovementType;

    fn make_movement(member: MemberId, amount: Amount) -> Movement {
        let movement_type = if amount >= 0 {
            MovementType::Income
        } else {
            MovementType::Expense
        };
        Movement::new(member, movement_type, amount, "test")
    }

    #[test]
    fn test_compute_balance_empty() {
        let member = Uuid::new_v4();
        assert_eq!(compute_balance(member, &[]), 0);
    }

    #[test]
    fn test_compute_balance_mixed_signs() {
        let member = Uuid::new_v4();
        let other = Uuid::new_v4();

        let movements = vec![
            make_movement(member, 20),
            make_movement(member, -1),
            make_movement(other, 50),
            make_movement(member, -4),
        ];

        assert_eq!(compute_balance(member, &movements), 15);
        assert_eq!(compute_balance(other, &movements), 50);
    }

    #[test]
    fn test_compute_balance_unknown_member_is_zero() {
        let member = Uuid::new_v4();
        let movements = vec![make_movement(Uuid::new_v4(), 100)];
        assert_eq!(compute_balance(member, &movements), 0);
    }

    #[test]
    fn test_compute_all_balances() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let movements = vec![
            make_movement(a, 10),
            make_movement(b, -1),
            make_movement(a, -3),
        ];

        let balances = compute_all_balances(&movements);

        assert_eq!(balances.get(&a), Some(&7));
        assert_eq!(balances.get(&b), Some(&-1));
        assert_eq!(balances.len(), 2);
    }
}
