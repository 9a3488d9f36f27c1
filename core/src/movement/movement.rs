//! # Cash Movement Data Model
//!
//! A movement is cash physically crossing the counter between a
//! teller's drawer and the agency vault, under maker-checker control:
//! the teller requests, somebody else with authority decides. Type and
//! state are persisted as numeric codes by the host application --
//! `Supply=1, Remittance=2` and `Pending=1, Approved=2, Rejected=3` --
//! and those codes are a storage contract.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserId;
use crate::ledger::{AgencyId, EntryId};
use crate::session::{MovementEffect, SessionId};

/// Identifier of a cash movement.
pub type MovementId = Uuid;

// ---------------------------------------------------------------------------
// MovementType
// ---------------------------------------------------------------------------

/// Direction of the transfer between vault and drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MovementType {
    /// Vault to drawer: the teller is topped up.
    Supply,
    /// Drawer to vault: the teller hands surplus cash back.
    Remittance,
}

impl MovementType {
    /// The persisted numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Supply => 1,
            Self::Remittance => 2,
        }
    }

    /// Decodes a persisted code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Supply),
            2 => Some(Self::Remittance),
            _ => None,
        }
    }

    /// The effect on the drawer's running totals once approved.
    pub fn effect(&self) -> MovementEffect {
        match self {
            Self::Supply => MovementEffect::Inflow,
            Self::Remittance => MovementEffect::Outflow,
        }
    }
}

impl TryFrom<u8> for MovementType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid movement type code {code}"))
    }
}

impl From<MovementType> for u8 {
    fn from(t: MovementType) -> Self {
        t.code()
    }
}

// ---------------------------------------------------------------------------
// MovementState
// ---------------------------------------------------------------------------

/// Decision state of a movement. Approved and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MovementState {
    /// Requested, awaiting a checker.
    Pending,
    /// Accepted; the paired journal entry is posted.
    Approved,
    /// Refused; no ledger effect, ever.
    Rejected,
}

impl MovementState {
    /// The persisted numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Pending => 1,
            Self::Approved => 2,
            Self::Rejected => 3,
        }
    }

    /// Decodes a persisted code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Pending),
            2 => Some(Self::Approved),
            3 => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Whether a checker has ruled on the movement.
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl TryFrom<u8> for MovementState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid movement state code {code}"))
    }
}

impl From<MovementState> for u8 {
    fn from(s: MovementState) -> Self {
        s.code()
    }
}

// ---------------------------------------------------------------------------
// CashMovement
// ---------------------------------------------------------------------------

/// A drawer/vault transfer under maker-checker control.
///
/// Invariants held by the workflow: `requester != approver`, and
/// `approver`/`decided_at` are set exactly when the state is decided.
/// `posted_entry` is set only on approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashMovement {
    /// Unique id, issued at request time.
    pub movement_id: MovementId,
    /// The session whose drawer is involved.
    pub session_id: SessionId,
    /// The agency, denormalized from the session for reporting.
    pub agency_id: AgencyId,
    /// Supply or remittance.
    pub movement_type: MovementType,
    /// Amount moved, strictly positive.
    pub amount: Decimal,
    /// Decision state.
    pub state: MovementState,
    /// The maker.
    pub requester: UserId,
    /// The checker; `None` while pending.
    pub approver: Option<UserId>,
    /// When the movement was requested.
    pub requested_at: DateTime<Utc>,
    /// When it was decided; `None` while pending.
    pub decided_at: Option<DateTime<Utc>>,
    /// The journal entry posted on approval, in the agency's sequence.
    pub posted_entry: Option<EntryId>,
}
