//! Who is signed in.

use crate::UserId;

/// Source of the current user's identity
pub trait AuthProvider {
    /// `None` when nobody is signed in
    fn current_user_id(&self) -> Option<UserId>;
}

/// Fixed identity, e.g. from the config file or a command-line flag
#[derive(Clone, Debug, Default)]
pub struct StaticAuth {
    user: Option<UserId>,
}

impl StaticAuth {
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.user.clone()
    }
}
