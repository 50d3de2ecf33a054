use crate::error::{Error, Result};

/// Source of the signed-in user's id.
///
/// Sign-in itself happens elsewhere; this crate only asks who is signed in.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<String>;

    fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Fixed identity, for the CLI and tests
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user: Option<String>,
}

impl StaticAuth {
    pub fn signed_in(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<String> {
        self.user.clone()
    }
}

/// Signed-in user id, or [`Error::NotSignedIn`]
pub fn require_user(auth: &dyn AuthProvider) -> Result<String> {
    auth.current_user().ok_or(Error::NotSignedIn)
}
