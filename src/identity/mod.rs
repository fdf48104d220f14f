//! Central identity and session management for the gateway.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod principal;
mod provider;
mod session;
mod token;

pub use authorizer::authorize_topic_access;
pub use principal::Principal;
pub use provider::{AuthService, LoginRequest, LoginResponse};
pub use session::{SessionCache, SESSION_TTL_SECS};
pub use token::TokenCodec;
