//! # Caller Identity & Roles
//!
//! The engine never authenticates anyone. The surrounding application
//! does that and hands us a [`Caller`]: who is acting and with which
//! role. The engine's only job is to enforce separation rules on top of
//! it -- a maker can't check their own work, a teller can't validate
//! their own drawer.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Identifier of a user as assigned by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The roles the host application can attach to a caller.
///
/// Role determines capability, not identity: a branch manager who
/// requested a movement is still barred from approving that movement,
/// because the requester/approver separation is checked on identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Operates a cash drawer; requests movements, never approves them.
    Teller,
    /// Runs an agency; approves movements and validates sessions.
    BranchManager,
    /// Oversees several agencies.
    Director,
    /// Full administrative authority.
    SuperAdmin,
    /// Manages loan files; no cash authority at all.
    LoanOfficer,
}

impl Role {
    /// Whether this role may approve or reject cash movements.
    pub fn can_approve_movements(&self) -> bool {
        matches!(self, Role::BranchManager | Role::Director | Role::SuperAdmin)
    }

    /// Whether this role may validate a closed cash session.
    ///
    /// Same set as movement approval; the separation from the session
    /// owner is enforced separately on identity.
    pub fn can_validate_sessions(&self) -> bool {
        self.can_approve_movements()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Teller => "Teller",
            Role::BranchManager => "BranchManager",
            Role::Director => "Director",
            Role::SuperAdmin => "SuperAdmin",
            Role::LoanOfficer => "LoanOfficer",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Caller
// ---------------------------------------------------------------------------

/// An authenticated caller: identity plus role, as asserted by the host
/// application's session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Who is acting.
    pub user_id: UserId,
    /// With which role.
    pub role: Role,
}

impl Caller {
    /// Convenience constructor.
    pub fn new(user_id: u64, role: Role) -> Self {
        Self {
            user_id: UserId(user_id),
            role,
        }
    }
}
