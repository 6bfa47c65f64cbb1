use super::role::UserRole;
use super::store::SessionSnapshot;
use crate::error::ApiError;

/// Views of the admin front end, each with its own access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Login,
    Projects,
    Tags,
    Users,
    Activity,
}

impl View {
    pub fn requires_auth(&self) -> bool { !matches!(self, View::Login) }

    pub fn admin_only(&self) -> bool { matches!(self, View::Users | View::Activity) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectToProjects,
}

/// Navigation guard evaluated on entry and again on every auth change.
/// Role checks only decide what to show; the backend still rejects
/// unauthorized calls on its own.
pub struct RouteGuard;

impl RouteGuard {
    pub fn check(view: View, session: &SessionSnapshot) -> GuardDecision {
        if !view.requires_auth() {
            return GuardDecision::Allow;
        }
        if view.admin_only() {
            // A missing role sends you to projects, which then bounces to login if needed.
            return match session.role {
                Some(r) if session.is_authenticated() && allowed(view, r) => GuardDecision::Allow,
                _ => GuardDecision::RedirectToProjects,
            };
        }
        if session.is_authenticated() { GuardDecision::Allow } else { GuardDecision::RedirectToLogin }
    }

    /// Decide what to do after a call on `view` failed. The store is the source
    /// of truth: a cleared session means the gateway gave up, so go to login;
    /// otherwise stay and show the error.
    pub fn after_failure(view: View, session: &SessionSnapshot, err: &ApiError) -> GuardDecision {
        if err.is_session_expired() || !session.is_authenticated() {
            return if view.requires_auth() { GuardDecision::RedirectToLogin } else { GuardDecision::Allow };
        }
        GuardDecision::Allow
    }
}

fn allowed(view: View, role: UserRole) -> bool {
    match view {
        View::Activity => role.can_view_activity(),
        _ => role.can_manage_users(),
    }
}
