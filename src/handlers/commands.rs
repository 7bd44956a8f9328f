//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, Amount, DomainError, DomainResult};

/// Command to move credits from one account to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCommand {
    pub source_id: Uuid,
    pub destination_id: Uuid,
    pub amount: i64,
}

impl TransferCommand {
    pub fn new(source_id: Uuid, destination_id: Uuid, amount: i64) -> Self {
        Self {
            source_id,
            destination_id,
            amount,
        }
    }

    /// Reject the command before any database access
    pub fn validate(&self) -> DomainResult<Amount> {
        if self.source_id == self.destination_id {
            return Err(DomainError::invalid_argument(
                "source and destination accounts must differ",
            ));
        }

        Amount::new(self.amount).map_err(|e| DomainError::invalid_argument(e.to_string()))
    }

    /// Both ids in the global lock order
    pub fn lock_order(&self) -> [Uuid; 2] {
        let mut ids = [self.source_id, self.destination_id];
        ids.sort();
        ids
    }
}

/// Post-transfer state of both accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    pub source: Account,
    pub destination: Account,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_account_rejected() {
        let id = Uuid::new_v4();
        let err = TransferCommand::new(id, id, 10).validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        for amount in [0, -1, -100] {
            let err = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), amount)
                .validate()
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidArgument(_)), "{}", amount);
        }
    }

    #[test]
    fn test_amount_beyond_column_range_rejected() {
        let err = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), i64::from(i32::MAX) + 1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_valid_command() {
        let amount = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), 50)
            .validate()
            .unwrap();
        assert_eq!(amount.value(), 50);
    }

    #[test]
    fn test_lock_order_ignores_direction() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let forward = TransferCommand::new(a, b, 10).lock_order();
        let backward = TransferCommand::new(b, a, 5).lock_order();

        assert_eq!(forward, backward);
        assert!(forward[0] < forward[1]);
    }
}
