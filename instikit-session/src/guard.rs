//! Route authorization
//!
//! A pure decision over the session snapshot and a role allowlist. While
//! the startup credential check is still running the guard refuses to
//! decide; a student with a pending forced password change is sent to the
//! rotation flow before anything else, whatever the destination.

use crate::identity::Role;
use crate::store::{SessionSnapshot, SessionStatus};
use std::collections::HashSet;

/// Outcome of an authorization check for one navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session state not settled yet; show a neutral loading indicator
    Loading,
    /// Render the protected view
    Render,
    /// Not signed in; go to login and come back to `resume` afterwards
    RedirectLogin { resume: String },
    /// Forced password rotation pending; nothing else renders first
    RedirectPasswordReset,
    /// Signed in but not permitted; signal denial and go home
    RedirectHome,
}

/// Authorization gate for a protected view
#[derive(Debug, Clone)]
pub struct RouteGuard {
    allowed: HashSet<Role>,
}

impl RouteGuard {
    pub fn allowing<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        Self {
            allowed: roles.into_iter().collect(),
        }
    }

    pub fn evaluate(&self, session: &SessionSnapshot, requested_path: &str) -> RouteDecision {
        match session.status {
            SessionStatus::Unknown | SessionStatus::Verifying => RouteDecision::Loading,
            SessionStatus::Anonymous => RouteDecision::RedirectLogin {
                resume: requested_path.to_string(),
            },
            SessionStatus::Authenticated => {
                let Some(identity) = &session.identity else {
                    // Authenticated without an identity cannot happen through
                    // the store; treat it as signed out.
                    return RouteDecision::RedirectLogin {
                        resume: requested_path.to_string(),
                    };
                };

                if identity.needs_password_reset && identity.role == Role::Student {
                    return RouteDecision::RedirectPasswordReset;
                }

                if self.allowed.contains(&identity.role) {
                    RouteDecision::Render
                } else {
                    RouteDecision::RedirectHome
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn student(needs_password_reset: bool) -> SessionSnapshot {
        SessionSnapshot {
            status: SessionStatus::Authenticated,
            identity: Some(Identity {
                id: "u-1".to_string(),
                username: "asha".to_string(),
                role: Role::Student,
                needs_password_reset,
                full_name: None,
                email: None,
                phone: None,
            }),
            last_error: None,
        }
    }

    fn anonymous() -> SessionSnapshot {
        SessionSnapshot {
            status: SessionStatus::Anonymous,
            identity: None,
            last_error: None,
        }
    }

    #[test]
    fn unsettled_session_never_decides() {
        let guard = RouteGuard::allowing([Role::Student]);
        for status in [SessionStatus::Unknown, SessionStatus::Verifying] {
            let session = SessionSnapshot {
                status,
                identity: None,
                last_error: None,
            };
            assert_eq!(guard.evaluate(&session, "/marks"), RouteDecision::Loading);
        }
    }

    #[test]
    fn anonymous_is_sent_to_login_with_resume_path() {
        let guard = RouteGuard::allowing([Role::Student]);
        assert_eq!(
            guard.evaluate(&anonymous(), "/attendance"),
            RouteDecision::RedirectLogin {
                resume: "/attendance".to_string()
            }
        );
    }

    #[test]
    fn admin_only_route_denies_a_student() {
        let guard = RouteGuard::allowing([Role::Admin]);
        assert_eq!(
            guard.evaluate(&student(false), "/console"),
            RouteDecision::RedirectHome
        );
    }

    #[test]
    fn shared_route_admits_either_role() {
        let guard = RouteGuard::allowing([Role::Student, Role::Admin]);
        assert_eq!(
            guard.evaluate(&student(false), "/downloads"),
            RouteDecision::Render
        );
    }

    #[test]
    fn pending_password_reset_preempts_everything() {
        // Even a route the student is normally allowed to see.
        let guard = RouteGuard::allowing([Role::Student]);
        assert_eq!(
            guard.evaluate(&student(true), "/marks"),
            RouteDecision::RedirectPasswordReset
        );
    }

    #[test]
    fn password_reset_only_gates_students() {
        let guard = RouteGuard::allowing([Role::Faculty]);
        let mut session = student(true);
        if let Some(identity) = session.identity.as_mut() {
            identity.role = Role::Faculty;
        }
        assert_eq!(guard.evaluate(&session, "/marks"), RouteDecision::Render);
    }
}
