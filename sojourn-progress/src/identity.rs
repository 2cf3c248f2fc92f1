//! Identity binding
//!
//! The engine never authenticates. It receives an opaque user id and a
//! signed-in flag from the identity provider and uses them as the
//! persistence key.

use serde::{Deserialize, Serialize};

/// User id used when nobody is signed in
pub const ANONYMOUS_USER_ID: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub signed_in: bool,
}

impl Identity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            signed_in: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER_ID.to_string(),
            signed_in: false,
        }
    }

    /// Key under which local storage keeps this user's record
    pub fn storage_key(&self) -> String {
        format!("progress:{}", self.user_id)
    }
}
