//! # Cash Session Manager
//!
//! Owns every session and serializes its lifecycle. The state machine
//! is strictly forward:
//!
//! ```text
//!   open ──close(count)──► Closed ──validate(supervisor)──► Validated
//! ```
//!
//! Nothing reopens. A drawer closed in error gets a new compensating
//! session; the old one keeps its history. Closing runs the
//! denomination reconciliation first and refuses a non-matching count
//! unless the caller records an override justification, so every
//! discrepancy is either fixed at the counter or written down.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cash::{self, CashCount, CountError};
use crate::config;
use crate::identity::{Caller, Role, UserId};
use crate::ledger::AgencyId;
use crate::session::session::{CashSession, Closing, SessionId, SessionState, ValidationStamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with this id exists.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// An open session already exists for this (teller, agency, date).
    #[error("teller {teller} already has an open session at agency {agency_id} on {date}")]
    DuplicateOpenSession {
        /// The teller.
        teller: UserId,
        /// The agency.
        agency_id: AgencyId,
        /// The working date.
        date: NaiveDate,
    },

    /// The operation requires an Open session.
    #[error("session {session_id} is not open (state {state:?})")]
    SessionNotOpen {
        /// The session.
        session_id: SessionId,
        /// Its actual state.
        state: SessionState,
    },

    /// The operation requires a Closed session.
    #[error("session {session_id} is not closed (state {state:?})")]
    SessionNotClosed {
        /// The session.
        session_id: SessionId,
        /// Its actual state.
        state: SessionState,
    },

    /// A teller tried to validate their own session.
    #[error("supervisor {supervisor} owns session {session_id} and cannot validate it")]
    ValidatorIsOwner {
        /// The session.
        session_id: SessionId,
        /// The would-be validator, who is also the owner.
        supervisor: UserId,
    },

    /// The caller's role cannot validate sessions.
    #[error("role {role} cannot validate sessions")]
    InsufficientRole {
        /// The caller's role.
        role: Role,
    },

    /// The closing denomination count does not add up to its declared
    /// total and no override justification was given.
    #[error(
        "closing count mismatch: rows sum to {computed_total}, declared {declared_total}; \
         close requires an override justification"
    )]
    CountMismatch {
        /// Total recomputed from the denomination rows.
        computed_total: Decimal,
        /// Total the teller declared.
        declared_total: Decimal,
    },

    /// The closing count itself is malformed (negative row, wrong
    /// number of rows).
    #[error("invalid closing count: {0}")]
    InvalidCount(#[from] CountError),

    /// A per-session or index lock wait timed out. Transient.
    #[error("session manager contention, gave up after {waited_ms}ms")]
    Contention {
        /// How long we waited before giving up.
        waited_ms: u64,
    },
}

fn contention() -> SessionError {
    SessionError::Contention {
        waited_ms: config::LOCK_ACQUIRE_TIMEOUT.as_millis() as u64,
    }
}

// ---------------------------------------------------------------------------
// MovementEffect
// ---------------------------------------------------------------------------

/// Which way an approved movement moves cash relative to the drawer.
/// The movement workflow maps Supply to inflow and Remittance to
/// outflow before calling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementEffect {
    /// Cash entered the drawer.
    Inflow,
    /// Cash left the drawer.
    Outflow,
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Owns all cash sessions and their open-session uniqueness index.
///
/// Sessions shard into independent locks; only `open` touches the
/// shared index, so lifecycle traffic on different drawers never
/// contends.
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Mutex<CashSession>>>,
    /// (teller, agency, date) -> currently open session. Guards the
    /// at-most-one-open invariant.
    open_index: Mutex<HashMap<(UserId, AgencyId, NaiveDate), SessionId>>,
}

impl SessionManager {
    /// Creates a manager with no sessions.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            open_index: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a session for a teller's drawer.
    ///
    /// # Errors
    ///
    /// [`SessionError::DuplicateOpenSession`] if the (teller, agency,
    /// date) triple already has an open session;
    /// [`SessionError::Contention`] on index lock timeout.
    pub fn open(
        &self,
        teller: UserId,
        agency_id: AgencyId,
        date: NaiveDate,
        opening_amount: Decimal,
    ) -> Result<CashSession, SessionError> {
        let mut index = self
            .open_index
            .try_lock_for(config::LOCK_ACQUIRE_TIMEOUT)
            .ok_or_else(contention)?;

        let key = (teller, agency_id, date);
        if index.contains_key(&key) {
            return Err(SessionError::DuplicateOpenSession {
                teller,
                agency_id,
                date,
            });
        }

        let session = CashSession {
            session_id: Uuid::new_v4(),
            teller,
            agency_id,
            date,
            opening_amount,
            inflows: Decimal::ZERO,
            outflows: Decimal::ZERO,
            state: SessionState::Open,
            closing: None,
            validation: None,
            opened_at: Utc::now(),
        };
        index.insert(key, session.session_id);
        self.sessions
            .insert(session.session_id, Arc::new(Mutex::new(session.clone())));

        info!(
            session_id = %session.session_id,
            teller = %teller,
            agency_id,
            date = %date,
            opening = %opening_amount,
            "cash session opened"
        );
        Ok(session)
    }

    /// Closes an open session against a counted denomination breakdown.
    ///
    /// The count is reconciled first. A non-matching count blocks the
    /// close unless `override_justification` is given, in which case
    /// the justification is recorded on the closing. The variance
    /// (`declared - theoretical`) is stored as-is; compensation is a
    /// separate journal entry posted by the host application.
    ///
    /// Returns the closed session.
    pub fn close(
        &self,
        session_id: SessionId,
        counted: CashCount,
        override_justification: Option<String>,
    ) -> Result<CashSession, SessionError> {
        let shard = self
            .sessions
            .get(&session_id)
            .map(|s| s.clone())
            .ok_or(SessionError::UnknownSession(session_id))?;
        let mut session = shard
            .try_lock_for(config::LOCK_ACQUIRE_TIMEOUT)
            .ok_or_else(contention)?;

        if session.state != SessionState::Open {
            return Err(SessionError::SessionNotOpen {
                session_id,
                state: session.state,
            });
        }

        let reconciliation = cash::reconcile(&counted)?;
        if !reconciliation.matches && override_justification.is_none() {
            return Err(SessionError::CountMismatch {
                computed_total: reconciliation.computed_total,
                declared_total: reconciliation.declared_total,
            });
        }
        if !reconciliation.matches {
            warn!(
                session_id = %session_id,
                computed = %reconciliation.computed_total,
                declared = %reconciliation.declared_total,
                "session closed over a non-matching count with override"
            );
        }

        let counted_total = counted.declared_total;
        let variance = counted_total - session.theoretical_total();
        if variance != Decimal::ZERO {
            warn!(
                session_id = %session_id,
                variance = %variance,
                "session closed with nonzero variance"
            );
        }

        // Index lock before any write: a timeout here must leave the
        // session Open and its index entry in place, so the close can
        // simply be retried.
        let mut index = self
            .open_index
            .try_lock_for(config::LOCK_ACQUIRE_TIMEOUT)
            .ok_or_else(contention)?;

        session.closing = Some(Closing {
            counted,
            counted_total,
            variance,
            override_justification,
            closed_at: Utc::now(),
        });
        session.state = SessionState::Closed;
        index.remove(&(session.teller, session.agency_id, session.date));

        info!(
            session_id = %session_id,
            counted = %counted_total,
            variance = %variance,
            "cash session closed"
        );
        Ok(session.clone())
    }

    /// Validates a closed session: the supervisor accepts its closing
    /// reconciliation.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotClosed`] unless the session is Closed,
    /// [`SessionError::InsufficientRole`] if the caller's role cannot
    /// validate, [`SessionError::ValidatorIsOwner`] if the caller is
    /// the session's own teller.
    pub fn validate(
        &self,
        session_id: SessionId,
        supervisor: &Caller,
    ) -> Result<CashSession, SessionError> {
        let shard = self
            .sessions
            .get(&session_id)
            .map(|s| s.clone())
            .ok_or(SessionError::UnknownSession(session_id))?;
        let mut session = shard
            .try_lock_for(config::LOCK_ACQUIRE_TIMEOUT)
            .ok_or_else(contention)?;

        if session.state != SessionState::Closed {
            return Err(SessionError::SessionNotClosed {
                session_id,
                state: session.state,
            });
        }
        if !supervisor.role.can_validate_sessions() {
            return Err(SessionError::InsufficientRole {
                role: supervisor.role,
            });
        }
        if supervisor.user_id == session.teller {
            return Err(SessionError::ValidatorIsOwner {
                session_id,
                supervisor: supervisor.user_id,
            });
        }

        session.validation = Some(ValidationStamp {
            supervisor: supervisor.user_id,
            validated_at: Utc::now(),
        });
        session.state = SessionState::Validated;

        info!(
            session_id = %session_id,
            supervisor = %supervisor.user_id,
            "cash session validated"
        );
        Ok(session.clone())
    }

    /// Runs `f` on a session while holding its lock, after checking it
    /// is Open. The movement workflow uses this to make "post the
    /// paired entry, then bump the counters" atomic against a
    /// concurrent close. Generic over the caller's error type so the
    /// closure can fail with ledger errors too.
    pub(crate) fn with_open_session<R, E>(
        &self,
        session_id: SessionId,
        f: impl FnOnce(&mut CashSession) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<SessionError>,
    {
        let shard = self
            .sessions
            .get(&session_id)
            .map(|s| s.clone())
            .ok_or(SessionError::UnknownSession(session_id))?;
        let mut session = shard
            .try_lock_for(config::LOCK_ACQUIRE_TIMEOUT)
            .ok_or_else(contention)?;

        if session.state != SessionState::Open {
            return Err(SessionError::SessionNotOpen {
                session_id,
                state: session.state,
            }
            .into());
        }
        f(&mut session)
    }

    /// Applies an approved movement's effect to a session's running
    /// totals. Only the movement workflow calls this, inside
    /// [`Self::with_open_session`].
    pub(crate) fn record_movement_effect(
        session: &mut CashSession,
        effect: MovementEffect,
        amount: Decimal,
    ) {
        match effect {
            MovementEffect::Inflow => session.inflows += amount,
            MovementEffect::Outflow => session.outflows += amount,
        }
    }

    /// A point-in-time copy of a session.
    pub fn get(&self, session_id: SessionId) -> Option<CashSession> {
        self.sessions
            .get(&session_id)
            .map(|shard| shard.value().lock().clone())
    }

    /// The currently open session for a drawer, if any.
    pub fn open_session_for(
        &self,
        teller: UserId,
        agency_id: AgencyId,
        date: NaiveDate,
    ) -> Option<SessionId> {
        self.open_index
            .lock()
            .get(&(teller, agency_id, date))
            .copied()
    }

    /// Copies of every session, ordered by (date, agency, teller,
    /// open time) for stable reporting.
    pub fn snapshot(&self) -> Vec<CashSession> {
        let mut all: Vec<CashSession> = self
            .sessions
            .iter()
            .map(|shard| shard.value().lock().clone())
            .collect();
        all.sort_by(|a, b| {
            (a.date, a.agency_id, a.teller, a.opened_at)
                .cmp(&(b.date, b.agency_id, b.teller, b.opened_at))
        });
        all
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DENOMINATIONS;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// A count declaring exactly `n` 10,000-franc notes.
    fn notes_10k(n: i64) -> CashCount {
        let mut q = vec![0i64; DENOMINATIONS.len()];
        q[0] = n;
        CashCount::from_quantities(q).unwrap()
    }

    #[test]
    fn open_then_duplicate_rejected() {
        let mgr = SessionManager::new();
        mgr.open(UserId(5), 1, date("2024-01-10"), dec!(0)).unwrap();
        assert!(matches!(
            mgr.open(UserId(5), 1, date("2024-01-10"), dec!(0)),
            Err(SessionError::DuplicateOpenSession { .. })
        ));
    }

    #[test]
    fn same_teller_other_agency_or_day_is_fine() {
        let mgr = SessionManager::new();
        mgr.open(UserId(5), 1, date("2024-01-10"), dec!(0)).unwrap();
        mgr.open(UserId(5), 2, date("2024-01-10"), dec!(0)).unwrap();
        mgr.open(UserId(5), 1, date("2024-01-11"), dec!(0)).unwrap();
    }

    #[test]
    fn close_computes_variance() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(100000))
            .unwrap();

        // Drawer holds 100000, teller counts 9 notes = 90000.
        let closed = mgr.close(s.session_id, notes_10k(9), None).unwrap();
        assert_eq!(closed.state, SessionState::Closed);
        assert_eq!(closed.variance(), Some(dec!(-10000)));
        assert_eq!(closed.closing_amount(), Some(dec!(90000)));
    }

    #[test]
    fn close_twice_rejected() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        mgr.close(s.session_id, notes_10k(0), None).unwrap();
        assert!(matches!(
            mgr.close(s.session_id, notes_10k(0), None),
            Err(SessionError::SessionNotOpen {
                state: SessionState::Closed,
                ..
            })
        ));
    }

    #[test]
    fn mismatching_count_blocks_close_without_override() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();

        // Rows say 10000, sheet says 12000.
        let count = CashCount::new(notes_10k(1).quantities, dec!(12000));
        assert!(matches!(
            mgr.close(s.session_id, count, None),
            Err(SessionError::CountMismatch {
                computed_total,
                declared_total,
            }) if computed_total == dec!(10000) && declared_total == dec!(12000)
        ));
        // Still open.
        assert_eq!(mgr.get(s.session_id).unwrap().state, SessionState::Open);
    }

    #[test]
    fn mismatching_count_closes_with_override() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();

        let count = CashCount::new(notes_10k(1).quantities, dec!(12000));
        let closed = mgr
            .close(
                s.session_id,
                count,
                Some("torn 2000 note set aside for destruction".to_string()),
            )
            .unwrap();
        assert_eq!(closed.state, SessionState::Closed);
        assert!(closed
            .closing
            .unwrap()
            .override_justification
            .is_some());
    }

    #[test]
    fn malformed_count_rejected() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        let mut q = vec![0i64; DENOMINATIONS.len()];
        q[3] = -2;
        assert!(matches!(
            mgr.close(s.session_id, CashCount::new(q, dec!(0)), None),
            Err(SessionError::InvalidCount(CountError::NegativeQuantity { .. }))
        ));
    }

    #[test]
    fn new_session_allowed_after_close() {
        // A compensating session on the same day is the remedy for a
        // close-in-error; only *open* sessions are unique.
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        mgr.close(s.session_id, notes_10k(0), None).unwrap();
        mgr.open(UserId(5), 1, date("2024-01-10"), dec!(0)).unwrap();
    }

    #[test]
    fn validate_happy_path() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        mgr.close(s.session_id, notes_10k(0), None).unwrap();

        let supervisor = Caller::new(7, Role::BranchManager);
        let validated = mgr.validate(s.session_id, &supervisor).unwrap();
        assert_eq!(validated.state, SessionState::Validated);
        assert_eq!(validated.validation.unwrap().supervisor, UserId(7));
    }

    #[test]
    fn validate_requires_closed_state() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        let supervisor = Caller::new(7, Role::Director);
        assert!(matches!(
            mgr.validate(s.session_id, &supervisor),
            Err(SessionError::SessionNotClosed { .. })
        ));
    }

    #[test]
    fn owner_cannot_validate_own_session() {
        let mgr = SessionManager::new();
        // A branch manager running their own drawer still can't
        // self-validate.
        let s = mgr
            .open(UserId(7), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        mgr.close(s.session_id, notes_10k(0), None).unwrap();
        assert!(matches!(
            mgr.validate(s.session_id, &Caller::new(7, Role::BranchManager)),
            Err(SessionError::ValidatorIsOwner { .. })
        ));
    }

    #[test]
    fn teller_role_cannot_validate() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        mgr.close(s.session_id, notes_10k(0), None).unwrap();
        assert!(matches!(
            mgr.validate(s.session_id, &Caller::new(6, Role::Teller)),
            Err(SessionError::InsufficientRole { role: Role::Teller })
        ));
    }

    #[test]
    fn validated_is_terminal() {
        let mgr = SessionManager::new();
        let s = mgr
            .open(UserId(5), 1, date("2024-01-10"), dec!(0))
            .unwrap();
        mgr.close(s.session_id, notes_10k(0), None).unwrap();
        mgr.validate(s.session_id, &Caller::new(7, Role::Director))
            .unwrap();

        assert!(matches!(
            mgr.validate(s.session_id, &Caller::new(8, Role::Director)),
            Err(SessionError::SessionNotClosed { .. })
        ));
        assert!(matches!(
            mgr.close(s.session_id, notes_10k(0), None),
            Err(SessionError::SessionNotOpen { .. })
        ));
    }

    #[test]
    fn unknown_session_reported() {
        let mgr = SessionManager::new();
        assert!(matches!(
            mgr.close(Uuid::new_v4(), notes_10k(0), None),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn contended_close_mutates_nothing() {
        let mgr = SessionManager::new();
        let s = mgr.open(UserId(5), 1, date("2024-01-10"), dec!(0)).unwrap();

        // Hold the open index across the close attempt; close must give
        // up without touching the session.
        let result = {
            let _index = mgr.open_index.lock();
            std::thread::scope(|scope| {
                scope
                    .spawn(|| mgr.close(s.session_id, notes_10k(0), None))
                    .join()
                    .unwrap()
            })
        };
        assert!(matches!(result, Err(SessionError::Contention { .. })));

        // Still open, still indexed, and a retry goes through.
        assert_eq!(mgr.get(s.session_id).unwrap().state, SessionState::Open);
        assert_eq!(
            mgr.open_session_for(UserId(5), 1, date("2024-01-10")),
            Some(s.session_id)
        );
        mgr.close(s.session_id, notes_10k(0), None).unwrap();
    }

    #[test]
    fn open_index_tracks_lifecycle() {
        let mgr = SessionManager::new();
        let teller = UserId(5);
        let day = date("2024-01-10");
        assert_eq!(mgr.open_session_for(teller, 1, day), None);

        let s = mgr.open(teller, 1, day, dec!(0)).unwrap();
        assert_eq!(mgr.open_session_for(teller, 1, day), Some(s.session_id));

        mgr.close(s.session_id, notes_10k(0), None).unwrap();
        assert_eq!(mgr.open_session_for(teller, 1, day), None);
    }
}
