//! Unified application error model and mapping helpers.
//! The typed enums below are what the service layer returns; `AppError` is the
//! boundary type the HTTP layer serializes, carrying a stable result code and a
//! caller-facing message.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Token codec failures. Everything structurally wrong with a presented token
/// collapses into a single variant so the wire response cannot be used to
/// probe which part of the check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
}

/// Session cache verdicts for a presented (account, token) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no live session for this account")]
    NoSession,
    #[error("token superseded by a newer login")]
    TokenMismatch,
    #[error("session expired")]
    Expired,
}

/// Login flow failures. `Store` covers lookup timeouts and outages; the rest
/// are credential verdicts.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("user does not exist")]
    UserNotFound,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("account role is not permitted on this surface")]
    RoleNotPermitted,
    #[error("credential store unavailable: {0}")]
    Store(String),
}

/// Failures while establishing the caller identity on an authenticated
/// endpoint: bad token, dead session, or a claimed identifier that does not
/// match the one bound into the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("token does not match this user")]
    IdentityMismatch,
}

/// Authorization gate verdicts for topic access.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("caller is not a guardian of the target account")]
    NotGuardian,
    #[error("credential store unavailable: {0}")]
    Store(String),
}

/// Broker adapter failure after retries are exhausted.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Composite error for the login-check flow (authenticate, then gate, then
/// broker registration).
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    Validation { code: String, message: String },
    Dependency { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Validation { code, .. }
            | AppError::Dependency { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Validation { message, .. }
            | AppError::Dependency { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn dependency<S: Into<String>>(code: S, msg: S) -> Self { AppError::Dependency { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Validation { .. } => 422,
            AppError::Dependency { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// The undifferentiated 401 used for every token/session failure. The
    /// internal cause is logged by the caller; the wire response stays
    /// identical so token state cannot be enumerated.
    pub fn invalid_token() -> Self {
        AppError::auth("invalid_token", "Invalid token")
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            // Only the identity mismatch is allowed to name itself; everything
            // else is collapsed into one code.
            AuthError::IdentityMismatch => AppError::auth("identity_mismatch", "Token does not match this user"),
            AuthError::Token(_) | AuthError::Session(_) => AppError::invalid_token(),
        }
    }
}

impl From<LoginError> for AppError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::UserNotFound => AppError::auth("user_not_exist", "User does not exist"),
            LoginError::IncorrectPassword => AppError::auth("incorrect_password", "Incorrect password"),
            LoginError::RoleNotPermitted => {
                AppError::validation("role_not_permitted", "Only elder accounts may log in here")
            }
            LoginError::Store(_) => AppError::dependency("store_unavailable", "Credential store unavailable, retry later"),
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotGuardian => AppError::forbidden("not_guardian", "Not a guardian of this account"),
            AccessError::Store(_) => AppError::dependency("store_unavailable", "Credential store unavailable, retry later"),
        }
    }
}

impl From<BrokerError> for AppError {
    fn from(_: BrokerError) -> Self {
        AppError::dependency("broker_unavailable", "Broker unavailable, retry later")
    }
}

impl From<CheckError> for AppError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Auth(e) => e.into(),
            CheckError::Access(e) => e.into(),
            CheckError::Broker(e) => e.into(),
        }
    }
}
