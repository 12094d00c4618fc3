use super::session::{SessionClient, SessionStatus};

/// Route the navigation layer should fall back to when entry is denied.
pub const LOGIN_ROUTE: &str = "/login";

/// Outcome of an access check.
///
/// Deliberately a value, not a navigation side effect: the caller owns
/// navigation and can complete its original matching attempt atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Entry granted; carries the status so callers need not re-query.
    Allow(SessionStatus),
    /// Entry denied; navigate to the given route instead.
    Redirect(&'static str),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow(_))
    }
}

/// Predicate evaluated before entering a protected view. Entry is granted
/// iff the backend confirms a live session; every other answer, including
/// an unreachable backend, redirects to login.
pub async fn check_access(session: &SessionClient) -> GuardDecision {
    let status = session.status().await;
    if status.authenticated {
        GuardDecision::Allow(status)
    } else {
        GuardDecision::Redirect(LOGIN_ROUTE)
    }
}
