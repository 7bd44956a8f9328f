//! Transfer Handler
//!
//! Moves credits between two accounts inside one transaction, locking both
//! rows in id order.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::account::select_account;
use crate::db::{Database, TransactionOptions};
use crate::domain::{Amount, DomainError, DomainResult};

use super::{TransferCommand, TransferResult};

/// Balance row as seen under the row lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct LockedBalance {
    pub id: Uuid,
    pub credits: i32,
}

/// Handler for credit transfers
#[derive(Debug, Clone)]
pub struct TransferHandler {
    db: Database,
    options: TransactionOptions,
}

impl TransferHandler {
    pub fn new(db: Database) -> Self {
        let options = db.transaction_options();
        Self { db, options }
    }

    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        self.options = options;
        self
    }

    /// Convenience wrapper around `execute`
    pub async fn transfer(
        &self,
        source_id: Uuid,
        destination_id: Uuid,
        amount: i64,
    ) -> DomainResult<TransferResult> {
        self.execute(TransferCommand::new(source_id, destination_id, amount))
            .await
    }

    /// Execute the transfer command
    pub async fn execute(&self, command: TransferCommand) -> DomainResult<TransferResult> {
        let amount = command.validate()?;

        let result = self
            .db
            .transaction_with(&self.options, move |conn| {
                Box::pin(async move { apply_transfer(conn, &command, amount).await })
            })
            .await;

        match &result {
            Ok(_) => tracing::info!(
                source_id = %command.source_id,
                destination_id = %command.destination_id,
                amount = command.amount,
                "Transfer committed"
            ),
            Err(e) => tracing::warn!(
                source_id = %command.source_id,
                destination_id = %command.destination_id,
                amount = command.amount,
                error = %e,
                "Transfer failed"
            ),
        }

        result
    }
}

/// Body of the transfer unit of work
async fn apply_transfer(
    conn: &mut PgConnection,
    command: &TransferCommand,
    amount: Amount,
) -> DomainResult<TransferResult> {
    let ids = command.lock_order();

    let locked: Vec<LockedBalance> = sqlx::query_as(
        r#"
        SELECT id, credits
        FROM accounts
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(&ids[..])
    .fetch_all(&mut *conn)
    .await?;

    let missing = missing_accounts(command, &locked);
    if !missing.is_empty() {
        return Err(DomainError::AccountNotFound(missing));
    }

    let source = locked
        .iter()
        .find(|row| row.id == command.source_id)
        .ok_or_else(|| DomainError::account_not_found(command.source_id))?;

    if !amount.is_covered_by(source.credits) {
        return Err(DomainError::InsufficientBalance {
            account_id: source.id,
            required: i64::from(amount.value()),
            available: source.credits,
        });
    }

    sqlx::query("UPDATE accounts SET credits = credits - $1, updated_at = NOW() WHERE id = $2")
        .bind(amount.value())
        .bind(command.source_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE accounts SET credits = credits + $1, updated_at = NOW() WHERE id = $2")
        .bind(amount.value())
        .bind(command.destination_id)
        .execute(&mut *conn)
        .await?;

    let source = select_account(&mut *conn, command.source_id)
        .await?
        .ok_or_else(|| DomainError::account_not_found(command.source_id))?;
    let destination = select_account(&mut *conn, command.destination_id)
        .await?
        .ok_or_else(|| DomainError::account_not_found(command.destination_id))?;

    Ok(TransferResult {
        source,
        destination,
    })
}

/// Ids of the command that did not come back from the locking read,
/// source first
fn missing_accounts(command: &TransferCommand, locked: &[LockedBalance]) -> Vec<Uuid> {
    [command.source_id, command.destination_id]
        .into_iter()
        .filter(|id| !locked.iter().any(|row| row.id == *id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Uuid, credits: i32) -> LockedBalance {
        LockedBalance { id, credits }
    }

    #[test]
    fn test_nothing_missing() {
        let cmd = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), 10);
        let locked = [row(cmd.destination_id, 0), row(cmd.source_id, 10)];

        assert!(missing_accounts(&cmd, &locked).is_empty());
    }

    #[test]
    fn test_missing_source_only() {
        let cmd = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), 10);
        let locked = [row(cmd.destination_id, 0)];

        assert_eq!(missing_accounts(&cmd, &locked), vec![cmd.source_id]);
    }

    #[test]
    fn test_missing_destination_only() {
        let cmd = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), 10);
        let locked = [row(cmd.source_id, 100)];

        assert_eq!(missing_accounts(&cmd, &locked), vec![cmd.destination_id]);
    }

    #[test]
    fn test_missing_both() {
        let cmd = TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), 10);

        assert_eq!(
            missing_accounts(&cmd, &[]),
            vec![cmd.source_id, cmd.destination_id]
        );
    }
}
