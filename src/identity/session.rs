//! Sliding-window session cache: account identifier -> (token, expiry).
//!
//! At most one live token per account: `start` overwrites unconditionally, so
//! a re-login supersedes the previous session and the old token fails with
//! `TokenMismatch`. Every successful `validate` refreshes the expiry to
//! now + ttl, so a session used at least once per TTL never expires.
//!
//! Entries sit behind per-account mutexes inside an RwLock'd map: `validate`
//! on two different accounts never contend, and a `start` racing a `validate`
//! on the same account resolves to whichever completed last.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::SessionError;

/// Reference deployment TTL: 72 hours, expressed in seconds for storage.
pub const SESSION_TTL_SECS: u64 = 72 * 3600;

#[derive(Debug)]
struct SessionEntry {
    token: String,
    expires_at: Instant,
}

pub struct SessionCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Arc<Mutex<SessionEntry>>>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Begin a session for `account_id`, overwriting any existing one.
    pub fn start(&self, account_id: &str, token: impl Into<String>) {
        let entry = SessionEntry { token: token.into(), expires_at: Instant::now() + self.ttl };
        self.entries.write().insert(account_id.to_string(), Arc::new(Mutex::new(entry)));
        debug!(account = %account_id, ttl_secs = self.ttl.as_secs(), "session.start");
    }

    /// Check `presented` against the live session and refresh its expiry on
    /// success. Failure order: no entry, token mismatch, expired.
    pub fn validate(&self, account_id: &str, presented: &str) -> Result<(), SessionError> {
        let slot = { self.entries.read().get(account_id).cloned() };
        let Some(slot) = slot else {
            return Err(SessionError::NoSession);
        };

        let now = Instant::now();
        {
            let mut entry = slot.lock();
            if entry.token != presented {
                return Err(SessionError::TokenMismatch);
            }
            if now <= entry.expires_at {
                entry.expires_at = now + self.ttl;
                return Ok(());
            }
        }

        // Expired: drop the entry, but only if a concurrent start has not
        // already replaced it.
        let mut map = self.entries.write();
        if let Some(current) = map.get(account_id) {
            if Arc::ptr_eq(current, &slot) {
                map.remove(account_id);
            }
        }
        debug!(account = %account_id, "session.expired");
        Err(SessionError::Expired)
    }

    /// Remove the session unconditionally. Absence is not an error.
    pub fn end(&self, account_id: &str) {
        self.entries.write().remove(account_id);
        debug!(account = %account_id, "session.end");
    }
}
