//! Session - Explicit Identity Context
//!
//! Every namespaced facade call receives the caller's session instead
//! of reading a global "current user". The user id selects the remote
//! namespace `users/{userId}`.

/// Identity of the caller, as issued by the authentication provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
  user_id: Option<String>,
  email: Option<String>,
}

impl Session {
  /// A signed-in user.
  pub fn authenticated(user_id: impl Into<String>) -> Self {
    Self {
      user_id: Some(user_id.into()),
      email: None,
    }
  }

  /// No signed-in user; namespaced operations fail with `AuthRequired`.
  pub fn anonymous() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_email(mut self, email: impl Into<String>) -> Self {
    self.email = Some(email.into());
    self
  }

  /// User id, if signed in. Blank ids count as signed out.
  pub fn user_id(&self) -> Option<&str> {
    self.user_id.as_deref().filter(|id| !id.trim().is_empty())
  }

  pub fn email(&self) -> Option<&str> {
    self.email.as_deref()
  }

  pub fn is_authenticated(&self) -> bool {
    self.user_id().is_some()
  }
}
