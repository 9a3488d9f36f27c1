//! # Cash Session Data Model
//!
//! One teller, one agency, one calendar date, one physical drawer.
//! The session accumulates approved movement effects while open, gets a
//! counted closing and a variance when closed, and a supervisor stamp
//! when validated. The struct here is pure data plus derived figures;
//! every transition goes through the
//! [`SessionManager`](super::SessionManager).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cash::CashCount;
use crate::identity::UserId;
use crate::ledger::AgencyId;

/// Identifier of a cash session. Nil is reserved as "no session" by
/// legacy storage and is never issued.
pub type SessionId = Uuid;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle state of a cash session.
///
/// Persisted as the numeric codes 1/2/3 (a storage contract with the
/// host application): `Open=1, Closed=2, Validated=3`. The machine only
/// moves forward; a closed-in-error session is compensated by a new
/// session, never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SessionState {
    /// Drawer in use; movements may be requested.
    Open,
    /// Teller declared a closing count; awaiting supervisor review.
    Closed,
    /// Supervisor accepted the closing reconciliation. Terminal.
    Validated,
}

impl SessionState {
    /// The persisted numeric code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Open => 1,
            Self::Closed => 2,
            Self::Validated => 3,
        }
    }

    /// Decodes a persisted code. Returns `None` for anything else.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Open),
            2 => Some(Self::Closed),
            3 => Some(Self::Validated),
            _ => None,
        }
    }
}

impl TryFrom<u8> for SessionState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid session state code {code}"))
    }
}

impl From<SessionState> for u8 {
    fn from(state: SessionState) -> Self {
        state.code()
    }
}

// ---------------------------------------------------------------------------
// Closing & validation records
// ---------------------------------------------------------------------------

/// Everything recorded at the moment a session closes. Immutable once
/// written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closing {
    /// The denomination count the teller declared.
    pub counted: CashCount,
    /// The declared total, kept denormalized for reporting.
    pub counted_total: Decimal,
    /// `counted_total - (opening + inflows - outflows)`. Never
    /// auto-corrected; a nonzero variance waits for a compensating
    /// entry against the shortage/overage accounts.
    pub variance: Decimal,
    /// Justification recorded when the close was forced through a
    /// non-matching denomination reconciliation.
    pub override_justification: Option<String>,
    /// When the teller closed.
    pub closed_at: DateTime<Utc>,
}

/// The supervisor's acceptance of a closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStamp {
    /// Who validated. Never the session's own teller.
    pub supervisor: UserId,
    /// When.
    pub validated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CashSession
// ---------------------------------------------------------------------------

/// A teller's drawer for one day at one agency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashSession {
    /// Unique id, issued at open.
    pub session_id: SessionId,
    /// The teller who owns the drawer.
    pub teller: UserId,
    /// The agency the drawer belongs to.
    pub agency_id: AgencyId,
    /// The working date. One open session per (teller, agency, date).
    pub date: NaiveDate,
    /// Cash in the drawer at open.
    pub opening_amount: Decimal,
    /// Running total of approved inflows (vault supplies).
    pub inflows: Decimal,
    /// Running total of approved outflows (remittances to vault).
    pub outflows: Decimal,
    /// Lifecycle state.
    pub state: SessionState,
    /// Closing record; `None` while open.
    pub closing: Option<Closing>,
    /// Supervisor stamp; `None` until validated.
    pub validation: Option<ValidationStamp>,
    /// When the session opened.
    pub opened_at: DateTime<Utc>,
}

impl CashSession {
    /// Cash the drawer should hold right now: opening plus approved
    /// inflows minus approved outflows.
    pub fn theoretical_total(&self) -> Decimal {
        self.opening_amount + self.inflows - self.outflows
    }

    /// The closing variance, once closed.
    pub fn variance(&self) -> Option<Decimal> {
        self.closing.as_ref().map(|c| c.variance)
    }

    /// The declared closing amount, once closed.
    pub fn closing_amount(&self) -> Option<Decimal> {
        self.closing.as_ref().map(|c| c.counted_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn session() -> CashSession {
        CashSession {
            session_id: Uuid::new_v4(),
            teller: UserId(5),
            agency_id: 1,
            date: "2024-01-10".parse().unwrap(),
            opening_amount: dec!(100000),
            inflows: dec!(50000),
            outflows: dec!(20000),
            state: SessionState::Open,
            closing: None,
            validation: None,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn theoretical_total_formula() {
        assert_eq!(session().theoretical_total(), dec!(130000));
    }

    #[test]
    fn variance_none_while_open() {
        let s = session();
        assert_eq!(s.variance(), None);
        assert_eq!(s.closing_amount(), None);
    }

    #[test]
    fn state_codes_are_the_storage_contract() {
        assert_eq!(SessionState::Open.code(), 1);
        assert_eq!(SessionState::Closed.code(), 2);
        assert_eq!(SessionState::Validated.code(), 3);
        for code in 1..=3u8 {
            assert_eq!(SessionState::from_code(code).unwrap().code(), code);
        }
        assert_eq!(SessionState::from_code(0), None);
        assert_eq!(SessionState::from_code(4), None);
    }

    #[test]
    fn state_serializes_as_numeric_code() {
        assert_eq!(serde_json::to_string(&SessionState::Closed).unwrap(), "2");
        let back: SessionState = serde_json::from_str("3").unwrap();
        assert_eq!(back, SessionState::Validated);
        assert!(serde_json::from_str::<SessionState>("9").is_err());
    }

    #[test]
    fn session_serde_roundtrip() {
        let s = session();
        let json = serde_json::to_string(&s).unwrap();
        let back: CashSession = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
