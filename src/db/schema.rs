//! Schema bootstrap
//!
//! Idempotent DDL for the accounts table, run once at startup.

use super::Database;
use crate::domain::DomainResult;

const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id uuid PRIMARY KEY,
    email text NOT NULL UNIQUE,
    credential_hash text NOT NULL,
    name text NOT NULL,
    date_of_birth date NOT NULL,
    role varchar(50) NOT NULL DEFAULT 'user',
    credits integer NOT NULL DEFAULT 0 CHECK (credits >= 0),
    created_at timestamptz NOT NULL DEFAULT now(),
    updated_at timestamptz NOT NULL DEFAULT now()
)
"#;

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS accounts_email_idx ON accounts(email)",
    "CREATE INDEX IF NOT EXISTS accounts_role_idx ON accounts(role)",
];

/// Create the accounts table and its indexes if they do not exist
pub async fn ensure_schema(db: &Database) -> DomainResult<()> {
    let mut conn = db.acquire().await?;

    sqlx::query(CREATE_ACCOUNTS).execute(&mut *conn).await?;
    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    tracing::info!("Database schema verified");
    Ok(())
}
