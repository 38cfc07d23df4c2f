//! Authenticated identity handed to the core by the login layer.

use crate::{Error, Result, UserId};

/// An authenticated user session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Reject the request when no session is present
pub fn require(session: Option<&Session>) -> Result<&Session> {
    session.ok_or_else(|| {
        tracing::warn!("Rejected request without a session");
        Error::Unauthorized
    })
}
