//! Route guard state machine.
//!
//! A guard decides whether a protected page renders. The decision is a pure
//! function of an [`AuthSnapshot`]; [`Guard`] wraps it with the last state seen
//! so callers only act (redirect, prompt) when the state actually changes.
//!
//! ```text
//!            +---------+
//!            | Loading |
//!            +----+----+
//!                 | snapshot resolved
//!     +-----------+-------------+
//!     v           v             v
//! Unauthenticated Forbidden  Authorized
//! ```

use crate::types::{Role, User, UserStatus};

/// Where a forbidden inventory visitor is sent.
pub const SUSPENDED_PATH: &str = "/account/suspended";

/// Where a forbidden admin-area visitor is sent.
pub const ADMIN_FORBIDDEN_PATH: &str = "/";

/// Which protected area a guard protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    /// Inventory pages: admins, or users in good standing.
    Inventory,
    /// Staff pages: admins only.
    Admin,
}

impl GuardKind {
    /// Redirect target when the visitor is signed in but not allowed.
    #[must_use]
    pub const fn forbidden_target(self) -> &'static str {
        match self {
            Self::Inventory => SUSPENDED_PATH,
            Self::Admin => ADMIN_FORBIDDEN_PATH,
        }
    }
}

/// The auth facts a guard looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub loading: bool,
    pub identity: Option<(Role, UserStatus)>,
}

impl AuthSnapshot {
    /// Snapshot before the session has been read.
    pub const LOADING: Self = Self {
        loading: true,
        identity: None,
    };

    /// Snapshot for a resolved session.
    #[must_use]
    pub fn resolved(user: Option<&User>) -> Self {
        Self {
            loading: false,
            identity: user.map(|u| (u.role, u.status)),
        }
    }
}

/// Guard states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthenticated,
    Forbidden,
    Authorized,
}

/// What the caller should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEffect {
    /// Show the sign-in / register prompt.
    PromptLogin,
    /// Send the visitor elsewhere.
    Redirect(&'static str),
    /// Render the protected content.
    Render,
}

/// Whether a role/status pair may browse the inventory.
#[must_use]
pub const fn can_access_inventory(role: Role, status: UserStatus) -> bool {
    match role {
        Role::Admin => true,
        Role::User => status.grants_inventory_access(),
    }
}

/// Pure transition function.
#[must_use]
pub const fn evaluate(kind: GuardKind, snapshot: AuthSnapshot) -> GuardState {
    if snapshot.loading {
        return GuardState::Loading;
    }
    let Some((role, status)) = snapshot.identity else {
        return GuardState::Unauthenticated;
    };
    let allowed = match kind {
        GuardKind::Inventory => can_access_inventory(role, status),
        GuardKind::Admin => matches!(role, Role::Admin),
    };
    if allowed {
        GuardState::Authorized
    } else {
        GuardState::Forbidden
    }
}

/// A guard instance that remembers its current state.
#[derive(Debug, Clone, Copy)]
pub struct Guard {
    kind: GuardKind,
    state: GuardState,
}

impl Guard {
    /// New guard in the `Loading` state.
    #[must_use]
    pub const fn new(kind: GuardKind) -> Self {
        Self {
            kind,
            state: GuardState::Loading,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> GuardState {
        self.state
    }

    /// Feed a new snapshot; returns an effect only if the state changed.
    pub fn transition(&mut self, snapshot: AuthSnapshot) -> Option<GuardEffect> {
        let next = evaluate(self.kind, snapshot);
        if next == self.state {
            return None;
        }
        self.state = next;
        match next {
            GuardState::Loading => None,
            GuardState::Unauthenticated => Some(GuardEffect::PromptLogin),
            GuardState::Forbidden => Some(GuardEffect::Redirect(self.kind.forbidden_target())),
            GuardState::Authorized => Some(GuardEffect::Render),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(role: Role, status: UserStatus) -> AuthSnapshot {
        AuthSnapshot {
            loading: false,
            identity: Some((role, status)),
        }
    }

    #[test]
    fn test_user_without_good_standing_is_redirected_to_suspended() {
        for status in [
            UserStatus::Pending,
            UserStatus::Suspended,
            UserStatus::Rejected,
        ] {
            let mut guard = Guard::new(GuardKind::Inventory);
            assert_eq!(
                guard.transition(signed_in(Role::User, status)),
                Some(GuardEffect::Redirect(SUSPENDED_PATH)),
                "status {status} should be redirected"
            );
        }
    }

    #[test]
    fn test_admin_always_renders_inventory() {
        for status in UserStatus::ALL {
            let mut guard = Guard::new(GuardKind::Inventory);
            assert_eq!(
                guard.transition(signed_in(Role::Admin, status)),
                Some(GuardEffect::Render)
            );
        }
    }

    #[test]
    fn test_active_and_approved_users_render_inventory() {
        for status in [UserStatus::Active, UserStatus::Approved] {
            assert_eq!(
                evaluate(GuardKind::Inventory, signed_in(Role::User, status)),
                GuardState::Authorized
            );
        }
    }

    #[test]
    fn test_admin_guard_rejects_users() {
        assert_eq!(
            evaluate(
                GuardKind::Admin,
                signed_in(Role::User, UserStatus::Approved)
            ),
            GuardState::Forbidden
        );
        let mut guard = Guard::new(GuardKind::Admin);
        assert_eq!(
            guard.transition(signed_in(Role::User, UserStatus::Active)),
            Some(GuardEffect::Redirect(ADMIN_FORBIDDEN_PATH))
        );
    }

    #[test]
    fn test_loading_then_unauthenticated_prompts_once() {
        let mut guard = Guard::new(GuardKind::Inventory);
        assert_eq!(guard.transition(AuthSnapshot::LOADING), None);
        assert_eq!(guard.state(), GuardState::Loading);

        let anonymous = AuthSnapshot::resolved(None);
        assert_eq!(guard.transition(anonymous), Some(GuardEffect::PromptLogin));
        assert_eq!(guard.transition(anonymous), None);
    }

    #[test]
    fn test_repeated_snapshot_does_not_redirect_twice() {
        let mut guard = Guard::new(GuardKind::Inventory);
        let suspended = signed_in(Role::User, UserStatus::Suspended);
        assert!(guard.transition(suspended).is_some());
        assert_eq!(guard.transition(suspended), None);
        assert_eq!(guard.state(), GuardState::Forbidden);

        // Approval flips the state and renders.
        assert_eq!(
            guard.transition(signed_in(Role::User, UserStatus::Approved)),
            Some(GuardEffect::Render)
        );
    }
}
