//! Account rows for sign-up and log-in.
//!
//! Accounts are a thin row lookup: user name, password, generated id.
//! Password hashing and credential hardening are out of scope; a real
//! deployment plugs a database-backed [`AccountStore`] in here.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;

use crate::{SessionError, generate_token};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub user_name: String,
}

/// Lookup and insertion of account rows.
pub trait AccountStore: Send + Sync + 'static {
    /// Returns the account when both the user name and password match.
    ///
    /// An unknown name and a wrong password both yield `Ok(None)`.
    fn lookup(
        &self,
        user_name: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<Account>, SessionError>> + Send;

    /// Creates a new account.
    ///
    /// # Errors
    /// [`SessionError::AccountExists`] if the name is already taken.
    fn insert(
        &self,
        user_name: &str,
        password: &str,
    ) -> impl Future<Output = Result<Account, SessionError>> + Send;
}

struct Row {
    account: Account,
    password: String,
}

/// An [`AccountStore`] kept in process memory. Lost on restart.
#[derive(Default)]
pub struct InMemoryAccounts {
    rows: RwLock<HashMap<String, Row>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryAccounts {
    async fn lookup(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<Option<Account>, SessionError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(user_name)
            .filter(|row| row.password == password)
            .map(|row| row.account.clone()))
    }

    async fn insert(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<Account, SessionError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(user_name) {
            return Err(SessionError::AccountExists(user_name.to_string()));
        }

        let account = Account {
            user_id: generate_token(),
            user_name: user_name.to_string(),
        };
        rows.insert(
            user_name.to_string(),
            Row {
                account: account.clone(),
                password: password.to_string(),
            },
        );
        tracing::info!(user_name, "account created");
        Ok(account)
    }
}
