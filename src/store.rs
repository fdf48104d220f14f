//! Credential store adapter: read-only account and guardianship lookups.
//!
//! The relational store that owns accounts, sensors and guardianship edges is
//! an external collaborator; this gateway only consumes it through the
//! `CredentialStore` trait. `MemoryStore` is the in-process implementation
//! used by tests and by first-run demo seeding when no external store is
//! configured.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Bound on a single store lookup. Past this the operation fails with a
/// retryable dependency error rather than hanging the request.
pub const STORE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Elder,
    Guardian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// One account row as the gateway sees it. `password_hash` is an Argon2 PHC
/// string; the cleartext never reaches this type.
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique, stable identifier. Tokens, sessions and topics are keyed by it.
    pub id: String,
    /// Login identifier on the device-facing surface.
    pub phone: String,
    pub password_hash: String,
    /// Unique display name.
    pub nickname: String,
    pub gender: Gender,
    pub role: AccountRole,
    /// Opaque profile image bytes; served elsewhere, only presence is reported.
    pub portrait: Option<Vec<u8>>,
    pub register_date: DateTime<Utc>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>>;
    async fn find_account_by_phone(&self, phone: &str) -> Result<Option<Account>>;
    /// True when a guardianship edge links `elder_id` to `guardian_id`.
    async fn guardianship_exists(&self, elder_id: &str, guardian_id: &str) -> Result<bool>;
}

/// Run a store lookup under the bounded timeout.
pub async fn with_lookup_timeout<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(STORE_LOOKUP_TIMEOUT, fut).await {
        Ok(res) => res,
        Err(_) => Err(anyhow!("credential store lookup timed out")),
    }
}

/// In-memory credential store. Accounts are indexed by id, with a secondary
/// phone index; guardianship edges are an (elder, guardian) pair set.
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    phone_index: RwLock<HashMap<String, String>>,
    guardianships: RwLock<HashSet<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account.
    pub fn add_account(&self, account: Account) {
        self.phone_index.write().insert(account.phone.clone(), account.id.clone());
        self.accounts.write().insert(account.id.clone(), account);
    }

    /// Record a guardianship edge. The pair is unique; re-linking is a no-op.
    pub fn link_guardian(&self, elder_id: &str, guardian_id: &str) {
        self.guardianships.write().insert((elder_id.to_string(), guardian_id.to_string()));
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().get(id).cloned())
    }

    async fn find_account_by_phone(&self, phone: &str) -> Result<Option<Account>> {
        let id = { self.phone_index.read().get(phone).cloned() };
        match id {
            Some(id) => Ok(self.accounts.read().get(&id).cloned()),
            None => Ok(None),
        }
    }

    async fn guardianship_exists(&self, elder_id: &str, guardian_id: &str) -> Result<bool> {
        Ok(self.guardianships.read().contains(&(elder_id.to_string(), guardian_id.to_string())))
    }
}
