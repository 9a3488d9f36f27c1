//! # Audit Snapshot
//!
//! The auditor does not inspect the live stores; it inspects rows, the
//! way they would sit in storage. Session states, movement types and
//! movement states are therefore raw numeric codes here, and account
//! numbers are raw strings: a migration gone wrong produces rows the
//! typed domain model would refuse to even parse, and surfacing those
//! rows is exactly the auditor's job.
//!
//! [`Snapshot::capture`] builds the row set from the live components;
//! the host application can also persist a snapshot as JSON and feed it
//! back later (that is what the `caisse-audit` binary does).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{AgencyId, Direction, EntryId, JournalEntry, LedgerStore};
use crate::movement::{CashMovement, MovementWorkflow};
use crate::session::{CashSession, SessionManager};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One entry line, as persisted. The account is a raw string so that a
/// malformed number can be represented and reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRow {
    /// Raw account number.
    pub account: String,
    /// Debit or credit.
    pub direction: Direction,
    /// Line amount.
    pub amount: Decimal,
    /// Line label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One journal entry, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRow {
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Per-agency entry id.
    pub entry_id: EntryId,
    /// Accounting value date.
    pub value_date: NaiveDate,
    /// The lines.
    pub lines: Vec<LineRow>,
}

/// One cash session, as persisted. `state_code` is the raw 1/2/3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session id.
    pub session_id: Uuid,
    /// Owning teller.
    pub teller: u64,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Working date.
    pub date: NaiveDate,
    /// Raw state code (1=Open, 2=Closed, 3=Validated).
    pub state_code: u8,
    /// Cash at open.
    pub opening_amount: Decimal,
    /// Approved inflows.
    pub inflows: Decimal,
    /// Approved outflows.
    pub outflows: Decimal,
    /// Declared closing total, once closed.
    pub closing_amount: Option<Decimal>,
    /// Closing variance, once closed.
    pub variance: Option<Decimal>,
}

/// One cash movement, as persisted. Codes are raw; the session
/// reference is nullable (legacy storage used 0 as a null marker --
/// here absence is explicit and the nil UUID is reserved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRow {
    /// Movement id.
    pub movement_id: Uuid,
    /// Owning session, if any.
    pub session_id: Option<Uuid>,
    /// Raw type code (1=Supply, 2=Remittance).
    pub type_code: u8,
    /// Raw state code (1=Pending, 2=Approved, 3=Rejected).
    pub state_code: u8,
    /// Movement amount.
    pub amount: Decimal,
    /// The maker.
    pub requester: u64,
    /// The checker, once decided.
    pub approver: Option<u64>,
}

/// One denomination count, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRow {
    /// Owning session; `None` for vault snapshots.
    pub session_id: Option<Uuid>,
    /// Quantities in denomination-table order.
    pub quantities: Vec<i64>,
    /// Declared total.
    pub declared_total: Decimal,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A point-in-time row set of the whole system, the auditor's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// All journal entries.
    pub entries: Vec<EntryRow>,
    /// All cash sessions.
    pub sessions: Vec<SessionRow>,
    /// All cash movements.
    pub movements: Vec<MovementRow>,
    /// All denomination counts (session closings and vault snapshots).
    pub counts: Vec<CountRow>,
}

impl Snapshot {
    /// Captures the current state of the live components.
    ///
    /// Counts come from session closings; vault counts, which the host
    /// application manages, can be appended afterwards.
    pub fn capture(
        ledger: &LedgerStore,
        sessions: &SessionManager,
        movements: &MovementWorkflow,
    ) -> Self {
        let session_snaps = sessions.snapshot();
        let counts = session_snaps
            .iter()
            .filter_map(|s| {
                s.closing.as_ref().map(|c| CountRow {
                    session_id: Some(s.session_id),
                    quantities: c.counted.quantities.clone(),
                    declared_total: c.counted.declared_total,
                })
            })
            .collect();

        Self {
            taken_at: Utc::now(),
            entries: ledger.snapshot().iter().map(EntryRow::from).collect(),
            sessions: session_snaps.iter().map(SessionRow::from).collect(),
            movements: movements.snapshot().iter().map(MovementRow::from).collect(),
            counts,
        }
    }
}

impl From<&JournalEntry> for EntryRow {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            agency_id: entry.agency_id,
            entry_id: entry.entry_id,
            value_date: entry.value_date,
            lines: entry
                .lines
                .iter()
                .map(|l| LineRow {
                    account: l.account.as_str().to_string(),
                    direction: l.direction,
                    amount: l.amount,
                    label: l.label.clone(),
                })
                .collect(),
        }
    }
}

impl From<&CashSession> for SessionRow {
    fn from(s: &CashSession) -> Self {
        Self {
            session_id: s.session_id,
            teller: s.teller.0,
            agency_id: s.agency_id,
            date: s.date,
            state_code: s.state.code(),
            opening_amount: s.opening_amount,
            inflows: s.inflows,
            outflows: s.outflows,
            closing_amount: s.closing_amount(),
            variance: s.variance(),
        }
    }
}

impl From<&CashMovement> for MovementRow {
    fn from(m: &CashMovement) -> Self {
        Self {
            movement_id: m.movement_id,
            session_id: Some(m.session_id),
            type_code: m.movement_type.code(),
            state_code: m.state.code(),
            amount: m.amount,
            requester: m.requester.0,
            approver: m.approver.map(|u| u.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cash::CashCount;
    use crate::identity::UserId;
    use rust_decimal_macros::dec;

    #[test]
    fn capture_includes_closing_counts() {
        let ledger = LedgerStore::new();
        let sessions = SessionManager::new();
        let workflow = MovementWorkflow::new(
            std::sync::Arc::new(LedgerStore::new()),
            std::sync::Arc::new(SessionManager::new()),
        );

        let s = sessions
            .open(UserId(5), 1, "2024-01-10".parse().unwrap(), dec!(0))
            .unwrap();
        sessions.close(s.session_id, CashCount::zero(), None).unwrap();

        let snap = Snapshot::capture(&ledger, &sessions, &workflow);
        assert_eq!(snap.sessions.len(), 1);
        assert_eq!(snap.sessions[0].state_code, 2);
        assert_eq!(snap.counts.len(), 1);
        assert_eq!(snap.counts[0].session_id, Some(s.session_id));
    }

    #[test]
    fn snapshot_serde_roundtrip() {
        let snap = Snapshot {
            taken_at: Utc::now(),
            entries: vec![EntryRow {
                agency_id: 1,
                entry_id: 1,
                value_date: "2024-01-10".parse().unwrap(),
                lines: vec![LineRow {
                    account: "1.0.1".to_string(),
                    direction: Direction::Debit,
                    amount: dec!(10),
                    label: None,
                }],
            }],
            sessions: vec![],
            movements: vec![],
            counts: vec![],
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);
    }
}
