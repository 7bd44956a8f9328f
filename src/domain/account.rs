//! Account model
//!
//! Row types for the accounts table and the inputs that create or patch them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account as returned to callers (no credential)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub credits: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account together with its credential hash (by-email lookup only)
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AccountWithCredential {
    #[sqlx(flatten)]
    pub account: Account,
    pub credential_hash: String,
}

/// Input for creating an account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAccount {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub email: String,
    pub credential_hash: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub credits: Option<i32>,
}

impl NewAccount {
    pub fn new(
        email: impl Into<String>,
        credential_hash: impl Into<String>,
        name: impl Into<String>,
        date_of_birth: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            email: email.into(),
            credential_hash: credential_hash.into(),
            name: name.into(),
            date_of_birth,
            credits: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_credits(mut self, credits: i32) -> Self {
        self.credits = Some(credits);
        self
    }
}

/// Partial profile update. Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountPatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub credential_hash: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.credential_hash.is_none()
            && self.name.is_none()
            && self.date_of_birth.is_none()
    }
}

/// Pagination for account listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_emptiness_is_presence_based() {
        assert!(AccountPatch::default().is_empty());

        // An empty string is still a provided field
        let patch = AccountPatch {
            name: Some(String::new()),
            ..AccountPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_patch_deserialize_missing_fields() {
        let patch: AccountPatch = serde_json::from_str(r#"{"email": "A@B.io"}"#).unwrap();
        assert_eq!(patch.email.as_deref(), Some("A@B.io"));
        assert!(patch.name.is_none());

        let empty: AccountPatch = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_list_params_defaults() {
        let params: ListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, ListParams::default());
        assert_eq!(params.limit, 20);
        assert_eq!(params.offset, 0);
    }

    #[test]
    fn test_new_account_builder() {
        let id = Uuid::new_v4();
        let dob = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
        let account = NewAccount::new("a@example.com", "hash", "Alice", dob)
            .with_id(id)
            .with_credits(100);

        assert_eq!(account.id, Some(id));
        assert_eq!(account.credits, Some(100));
    }
}
