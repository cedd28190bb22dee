//! Environment Session Loader
//!
//! Builds the caller's `Session` and auth provider token from
//! environment variables for the CLI. These MUST be set in the shell
//! or a `.env` file (never committed to git):
//! - `FINTRACK_USER_ID`: authenticated user id (namespace key)
//! - `FINTRACK_USER_EMAIL`: optional, shown by `status`
//! - `FINTRACK_ID_TOKEN`: optional ID token for the remote store

use crate::ports::session::Session;

pub const USER_ID_VAR: &str = "FINTRACK_USER_ID";
pub const USER_EMAIL_VAR: &str = "FINTRACK_USER_EMAIL";
pub const ID_TOKEN_VAR: &str = "FINTRACK_ID_TOKEN";

/// Session from the environment; anonymous when no user id is set.
pub fn session_from_env() -> Session {
    session_from_vars(|name| std::env::var(name).ok())
}

/// ID token for the remote store, if provided.
pub fn id_token_from_env() -> Option<String> {
    std::env::var(ID_TOKEN_VAR).ok().filter(|t| !t.trim().is_empty())
}

fn session_from_vars(lookup: impl Fn(&str) -> Option<String>) -> Session {
    let Some(user_id) = lookup(USER_ID_VAR).filter(|id| !id.trim().is_empty()) else {
        return Session::anonymous();
    };
    let session = Session::authenticated(user_id);
    match lookup(USER_EMAIL_VAR) {
        Some(email) if !email.trim().is_empty() => session.with_email(email),
        _ => session,
    }
}
