use serde::{Deserialize, Serialize};

/// The validated caller identity handed to handler logic once the token and
/// session checks have passed. Deliberately minimal: establishing it must not
/// require a store lookup, so it carries only what the token binds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub account_id: String,
}

impl Principal {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self { account_id: account_id.into() }
    }
}
