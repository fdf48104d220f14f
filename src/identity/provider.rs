//! Login/logout state machine orchestrating the codec, cache, gate and
//! broker bridge: Anonymous -> Authenticated (login) -> Anonymous (logout or
//! expiry).

use std::sync::Arc;

use tracing::{debug, info};

use crate::broker::{sensor_topic, BrokerAdapter, SENSOR_REPORT_QOS};
use crate::error::{AuthError, CheckError, LoginError};
use crate::security;
use crate::store::{with_lookup_timeout, AccountRole, CredentialStore};

use super::authorizer::authorize_topic_access;
use super::principal::Principal;
use super::session::SessionCache;
use super::token::TokenCodec;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    broker: Arc<dyn BrokerAdapter>,
    sessions: SessionCache,
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        broker: Arc<dyn BrokerAdapter>,
        sessions: SessionCache,
        codec: TokenCodec,
    ) -> Self {
        Self { store, broker, sessions, codec }
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Device-facing login: look the account up by phone, verify the
    /// credential, enforce the Elder-only surface rule, then issue a token
    /// and start (or supersede) the session.
    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, LoginError> {
        let account = with_lookup_timeout(self.store.find_account_by_phone(&req.phone))
            .await
            .map_err(|e| LoginError::Store(e.to_string()))?
            .ok_or(LoginError::UserNotFound)?;
        if !security::verify_password(&account.password_hash, &req.password) {
            return Err(LoginError::IncorrectPassword);
        }
        if account.role != AccountRole::Elder {
            return Err(LoginError::RoleNotPermitted);
        }

        let token = self.codec.issue(&account.id);
        self.sessions.start(&account.id, token.clone());
        info!(account = %account.id, "auth.login");
        Ok(LoginResponse { token })
    }

    /// Resolve and liveness-check a presented token: pure decode, then the
    /// session cache (which refreshes the sliding window on success).
    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let account_id = self.codec.decode(token)?;
        self.sessions.validate(&account_id, token)?;
        Ok(Principal::new(account_id))
    }

    /// End the session bound into `token`. Idempotent: a second logout with
    /// the same (still decodable) token is a no-op, only a malformed token is
    /// an error.
    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        let account_id = self.codec.decode(token)?;
        self.sessions.end(&account_id);
        info!(account = %account_id, "auth.logout");
        Ok(())
    }

    /// Validate the token, require the claimed identifier to match the one
    /// the token resolves to, run the gate, then register the caller on its
    /// own sensor-report topic with the broker.
    pub async fn check_login(&self, token: &str, claimed_account_id: &str) -> Result<(), CheckError> {
        let caller = self.authenticate(token)?;
        if caller.account_id != claimed_account_id {
            return Err(AuthError::IdentityMismatch.into());
        }
        authorize_topic_access(self.store.as_ref(), &caller, claimed_account_id).await?;
        self.broker
            .subscribe(&caller.account_id, &sensor_topic(&caller.account_id), SENSOR_REPORT_QOS)
            .await?;
        debug!(account = %caller.account_id, "auth.check_login subscribed");
        Ok(())
    }
}
