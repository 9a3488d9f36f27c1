//! # Cash Movement Workflow
//!
//! The maker-checker pipeline for drawer/vault transfers. A teller
//! requests a supply or remittance against their open session; a
//! caller with approval authority (and a different identity) decides.
//! Approval is the only path that touches money, and it is atomic:
//! every precondition is re-checked under the movement and session
//! locks, the paired journal entry is posted, and the session counters
//! are bumped -- or none of that happens.
//!
//! The paired entry is always drawer against vault:
//!
//! ```text
//!   Supply      debit  1.0.2.<agency>.<teller>   (drawer)
//!               credit 1.0.1.<agency>            (vault)
//!   Remittance  debit  1.0.1.<agency>            (vault)
//!               credit 1.0.2.<agency>.<teller>   (drawer)
//! ```

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::identity::{Caller, Role, UserId};
use crate::ledger::{
    AccountNumber, EntryDraft, EntryLine, LedgerError, LedgerStore,
};
use crate::movement::movement::{CashMovement, MovementId, MovementState, MovementType};
use crate::session::{SessionError, SessionId, SessionManager};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the movement workflow.
#[derive(Debug, Error)]
pub enum MovementError {
    /// No movement with this id exists.
    #[error("unknown movement {0}")]
    UnknownMovement(MovementId),

    /// The requested amount is zero or negative.
    #[error("movement amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// The offending amount.
        amount: Decimal,
    },

    /// The movement has already been approved or rejected.
    #[error("movement {movement_id} already decided ({state:?})")]
    AlreadyDecided {
        /// The movement.
        movement_id: MovementId,
        /// Its terminal state.
        state: MovementState,
    },

    /// The approver is the movement's own requester.
    #[error("user {user} requested movement {movement_id} and cannot decide it")]
    SelfApproval {
        /// The movement.
        movement_id: MovementId,
        /// The user attempting to decide their own request.
        user: UserId,
    },

    /// The caller's role cannot decide movements.
    #[error("role {role} cannot approve or reject movements")]
    InsufficientRole {
        /// The caller's role.
        role: Role,
    },

    /// A session precondition failed (unknown, not open, contention on
    /// its lock).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Posting the paired entry failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The per-movement lock wait timed out. Transient.
    #[error("movement contention, gave up after {waited_ms}ms")]
    Contention {
        /// How long we waited before giving up.
        waited_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The checker's ruling on a pending movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Accept: post the paired entry and apply the session effect.
    Approve,
    /// Refuse: terminal, no ledger effect.
    Reject,
}

// ---------------------------------------------------------------------------
// MovementWorkflow
// ---------------------------------------------------------------------------

/// Owns all movements and drives them through the maker-checker
/// pipeline against the ledger store and the session manager.
pub struct MovementWorkflow {
    ledger: Arc<LedgerStore>,
    sessions: Arc<SessionManager>,
    movements: DashMap<MovementId, Arc<Mutex<CashMovement>>>,
}

impl MovementWorkflow {
    /// Creates a workflow over the given ledger and session manager.
    pub fn new(ledger: Arc<LedgerStore>, sessions: Arc<SessionManager>) -> Self {
        Self {
            ledger,
            sessions,
            movements: DashMap::new(),
        }
    }

    /// Requests a movement against an open session. The movement starts
    /// Pending; nothing is posted until a checker approves.
    ///
    /// The open check and the insert run under the session lock, so a
    /// concurrent close cannot commit between them and leave a Pending
    /// movement against a Closed session.
    ///
    /// # Errors
    ///
    /// [`MovementError::NonPositiveAmount`] on a bad amount;
    /// [`SessionError::UnknownSession`] / [`SessionError::SessionNotOpen`]
    /// (wrapped) if the session can't take movements.
    pub fn request(
        &self,
        session_id: SessionId,
        movement_type: MovementType,
        amount: Decimal,
        requester: UserId,
    ) -> Result<CashMovement, MovementError> {
        if amount <= Decimal::ZERO {
            return Err(MovementError::NonPositiveAmount { amount });
        }

        let movement = self
            .sessions
            .with_open_session::<_, MovementError>(session_id, |session| {
                let movement = CashMovement {
                    movement_id: Uuid::new_v4(),
                    session_id,
                    agency_id: session.agency_id,
                    movement_type,
                    amount,
                    state: MovementState::Pending,
                    requester,
                    approver: None,
                    requested_at: Utc::now(),
                    decided_at: None,
                    posted_entry: None,
                };
                self.movements
                    .insert(movement.movement_id, Arc::new(Mutex::new(movement.clone())));
                Ok(movement)
            })?;

        info!(
            movement_id = %movement.movement_id,
            session_id = %session_id,
            kind = ?movement_type,
            amount = %amount,
            requester = %requester,
            "cash movement requested"
        );
        Ok(movement)
    }

    /// Decides a pending movement.
    ///
    /// Approval validates everything first -- pending state, approver
    /// separation and role, session still open -- then posts the paired
    /// drawer/vault entry and applies the session effect under the
    /// session lock. Any failure leaves the movement Pending and the
    /// ledger untouched. Rejection is terminal and touches nothing but
    /// the movement itself.
    pub fn decide(
        &self,
        movement_id: MovementId,
        approver: &Caller,
        decision: Decision,
    ) -> Result<CashMovement, MovementError> {
        let shard = self
            .movements
            .get(&movement_id)
            .map(|m| m.clone())
            .ok_or(MovementError::UnknownMovement(movement_id))?;
        let mut movement = shard
            .try_lock_for(config::LOCK_ACQUIRE_TIMEOUT)
            .ok_or(MovementError::Contention {
                waited_ms: config::LOCK_ACQUIRE_TIMEOUT.as_millis() as u64,
            })?;

        if movement.state != MovementState::Pending {
            return Err(MovementError::AlreadyDecided {
                movement_id,
                state: movement.state,
            });
        }
        if approver.user_id == movement.requester {
            return Err(MovementError::SelfApproval {
                movement_id,
                user: approver.user_id,
            });
        }
        if !approver.role.can_approve_movements() {
            return Err(MovementError::InsufficientRole {
                role: approver.role,
            });
        }

        match decision {
            Decision::Reject => {
                movement.state = MovementState::Rejected;
                movement.approver = Some(approver.user_id);
                movement.decided_at = Some(Utc::now());
                info!(
                    movement_id = %movement_id,
                    approver = %approver.user_id,
                    "cash movement rejected"
                );
            }
            Decision::Approve => {
                let ledger = Arc::clone(&self.ledger);
                let movement_type = movement.movement_type;
                let amount = movement.amount;

                // Post and apply under the session lock so a concurrent
                // close can't slip between the two.
                let entry_id = self.sessions.with_open_session::<_, MovementError>(
                    movement.session_id,
                    |session| {
                        let draft = paired_entry(
                            session.agency_id,
                            session.teller,
                            session.date,
                            movement_type,
                            amount,
                        )?;
                        let entry_id = ledger.post(draft)?;
                        SessionManager::record_movement_effect(
                            session,
                            movement_type.effect(),
                            amount,
                        );
                        Ok(entry_id)
                    },
                )?;

                movement.state = MovementState::Approved;
                movement.approver = Some(approver.user_id);
                movement.decided_at = Some(Utc::now());
                movement.posted_entry = Some(entry_id);
                info!(
                    movement_id = %movement_id,
                    approver = %approver.user_id,
                    entry_id,
                    amount = %amount,
                    "cash movement approved and posted"
                );
            }
        }

        Ok(movement.clone())
    }

    /// A point-in-time copy of a movement.
    pub fn get(&self, movement_id: MovementId) -> Option<CashMovement> {
        self.movements
            .get(&movement_id)
            .map(|shard| shard.value().lock().clone())
    }

    /// Copies of every movement, ordered by request time.
    pub fn snapshot(&self) -> Vec<CashMovement> {
        let mut all: Vec<CashMovement> = self
            .movements
            .iter()
            .map(|shard| shard.value().lock().clone())
            .collect();
        all.sort_by_key(|m| (m.requested_at, m.movement_id));
        all
    }
}

/// Builds the balanced drawer/vault entry for an approved movement.
fn paired_entry(
    agency_id: u32,
    teller: UserId,
    value_date: chrono::NaiveDate,
    movement_type: MovementType,
    amount: Decimal,
) -> Result<EntryDraft, LedgerError> {
    let drawer: AccountNumber = config::drawer_account(agency_id, teller.0)
        .parse()
        .map_err(LedgerError::InvalidAccount)?;
    let vault: AccountNumber = config::vault_account(agency_id)
        .parse()
        .map_err(LedgerError::InvalidAccount)?;

    let (debit, credit, label) = match movement_type {
        MovementType::Supply => (drawer, vault, "vault supply to drawer"),
        MovementType::Remittance => (vault, drawer, "drawer remittance to vault"),
    };

    Ok(EntryDraft::new(
        agency_id,
        value_date,
        vec![
            EntryLine::debit(debit, amount).labeled(label),
            EntryLine::credit(credit, amount).labeled(label),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Direction;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    struct Fixture {
        ledger: Arc<LedgerStore>,
        sessions: Arc<SessionManager>,
        workflow: MovementWorkflow,
        session_id: SessionId,
    }

    /// Teller 5 at agency 1 with an open drawer on 2024-01-10.
    fn fixture() -> Fixture {
        let ledger = Arc::new(LedgerStore::new());
        let sessions = Arc::new(SessionManager::new());
        let session = sessions
            .open(UserId(5), 1, date("2024-01-10"), dec!(100000))
            .unwrap();
        let workflow = MovementWorkflow::new(Arc::clone(&ledger), Arc::clone(&sessions));
        Fixture {
            ledger,
            sessions,
            workflow,
            session_id: session.session_id,
        }
    }

    #[test]
    fn request_starts_pending() {
        let f = fixture();
        let m = f
            .workflow
            .request(f.session_id, MovementType::Supply, dec!(50000), UserId(5))
            .unwrap();
        assert_eq!(m.state, MovementState::Pending);
        assert_eq!(m.approver, None);
        assert_eq!(m.posted_entry, None);
        assert!(f.ledger.is_empty());
    }

    #[test]
    fn request_needs_positive_amount() {
        let f = fixture();
        assert!(matches!(
            f.workflow
                .request(f.session_id, MovementType::Supply, dec!(0), UserId(5)),
            Err(MovementError::NonPositiveAmount { .. })
        ));
    }

    #[test]
    fn request_needs_open_session() {
        let f = fixture();
        f.sessions
            .close(f.session_id, crate::cash::CashCount::zero(), None)
            .unwrap();
        assert!(matches!(
            f.workflow
                .request(f.session_id, MovementType::Supply, dec!(10), UserId(5)),
            Err(MovementError::Session(SessionError::SessionNotOpen { .. }))
        ));
    }

    #[test]
    fn request_runs_under_the_session_lock() {
        let f = fixture();

        // Hold the session lock across the request; it must wait on the
        // same lock, give up, and insert nothing.
        let inner = f
            .sessions
            .with_open_session::<_, SessionError>(f.session_id, |_session| {
                Ok(std::thread::scope(|scope| {
                    scope
                        .spawn(|| {
                            f.workflow.request(
                                f.session_id,
                                MovementType::Supply,
                                dec!(10),
                                UserId(5),
                            )
                        })
                        .join()
                        .unwrap()
                }))
            })
            .unwrap();

        assert!(matches!(
            inner,
            Err(MovementError::Session(SessionError::Contention { .. }))
        ));
        assert!(f.workflow.snapshot().is_empty());
    }

    #[test]
    fn request_unknown_session() {
        let f = fixture();
        assert!(matches!(
            f.workflow
                .request(Uuid::new_v4(), MovementType::Supply, dec!(10), UserId(5)),
            Err(MovementError::Session(SessionError::UnknownSession(_)))
        ));
    }

    #[test]
    fn approved_supply_posts_and_bumps_inflows() {
        let f = fixture();
        let m = f
            .workflow
            .request(f.session_id, MovementType::Supply, dec!(50000), UserId(5))
            .unwrap();

        let decided = f
            .workflow
            .decide(
                m.movement_id,
                &Caller::new(7, Role::BranchManager),
                Decision::Approve,
            )
            .unwrap();

        assert_eq!(decided.state, MovementState::Approved);
        assert_eq!(decided.approver, Some(UserId(7)));
        assert!(decided.posted_entry.is_some());

        let session = f.sessions.get(f.session_id).unwrap();
        assert_eq!(session.inflows, dec!(50000));
        assert_eq!(session.outflows, dec!(0));

        // Drawer debited, vault credited, one entry.
        let entries = f.ledger.snapshot();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.lines.len(), 2);
        let debit = entry
            .lines
            .iter()
            .find(|l| l.direction == Direction::Debit)
            .unwrap();
        let credit = entry
            .lines
            .iter()
            .find(|l| l.direction == Direction::Credit)
            .unwrap();
        assert_eq!(debit.account.as_str(), "1.0.2.1.5");
        assert_eq!(credit.account.as_str(), "1.0.1.1");
        assert_eq!(debit.amount, dec!(50000));
    }

    #[test]
    fn approved_remittance_posts_inverse_and_bumps_outflows() {
        let f = fixture();
        let m = f
            .workflow
            .request(f.session_id, MovementType::Remittance, dec!(30000), UserId(5))
            .unwrap();
        f.workflow
            .decide(
                m.movement_id,
                &Caller::new(7, Role::Director),
                Decision::Approve,
            )
            .unwrap();

        let session = f.sessions.get(f.session_id).unwrap();
        assert_eq!(session.outflows, dec!(30000));

        let entry = &f.ledger.snapshot()[0];
        let debit = entry
            .lines
            .iter()
            .find(|l| l.direction == Direction::Debit)
            .unwrap();
        assert_eq!(debit.account.as_str(), "1.0.1.1", "remittance debits vault");
    }

    #[test]
    fn rejection_is_terminal_and_posts_nothing() {
        let f = fixture();
        let m = f
            .workflow
            .request(f.session_id, MovementType::Supply, dec!(10000), UserId(5))
            .unwrap();
        let decided = f
            .workflow
            .decide(
                m.movement_id,
                &Caller::new(7, Role::BranchManager),
                Decision::Reject,
            )
            .unwrap();

        assert_eq!(decided.state, MovementState::Rejected);
        assert_eq!(decided.approver, Some(UserId(7)));
        assert!(f.ledger.is_empty());
        assert_eq!(f.sessions.get(f.session_id).unwrap().inflows, dec!(0));

        assert!(matches!(
            f.workflow.decide(
                m.movement_id,
                &Caller::new(8, Role::Director),
                Decision::Approve
            ),
            Err(MovementError::AlreadyDecided {
                state: MovementState::Rejected,
                ..
            })
        ));
    }

    #[test]
    fn self_approval_rejected_and_movement_stays_pending() {
        let f = fixture();
        let m = f
            .workflow
            .request(f.session_id, MovementType::Supply, dec!(10000), UserId(5))
            .unwrap();

        // Even with an approving role, identity separation wins.
        assert!(matches!(
            f.workflow.decide(
                m.movement_id,
                &Caller::new(5, Role::BranchManager),
                Decision::Approve
            ),
            Err(MovementError::SelfApproval { user: UserId(5), .. })
        ));
        assert_eq!(
            f.workflow.get(m.movement_id).unwrap().state,
            MovementState::Pending
        );
        assert!(f.ledger.is_empty());
    }

    #[test]
    fn teller_and_loan_officer_cannot_decide() {
        let f = fixture();
        let m = f
            .workflow
            .request(f.session_id, MovementType::Supply, dec!(10000), UserId(5))
            .unwrap();
        for role in [Role::Teller, Role::LoanOfficer] {
            assert!(matches!(
                f.workflow
                    .decide(m.movement_id, &Caller::new(9, role), Decision::Approve),
                Err(MovementError::InsufficientRole { .. })
            ));
        }
    }

    #[test]
    fn approval_after_close_fails_atomically() {
        let f = fixture();
        let m = f
            .workflow
            .request(f.session_id, MovementType::Supply, dec!(10000), UserId(5))
            .unwrap();
        f.sessions
            .close(f.session_id, crate::cash::CashCount::zero(), None)
            .unwrap();

        assert!(matches!(
            f.workflow.decide(
                m.movement_id,
                &Caller::new(7, Role::BranchManager),
                Decision::Approve
            ),
            Err(MovementError::Session(SessionError::SessionNotOpen { .. }))
        ));
        // Nothing moved: no entry, movement still pending.
        assert!(f.ledger.is_empty());
        assert_eq!(
            f.workflow.get(m.movement_id).unwrap().state,
            MovementState::Pending
        );
    }

    #[test]
    fn unknown_movement_reported() {
        let f = fixture();
        assert!(matches!(
            f.workflow.decide(
                Uuid::new_v4(),
                &Caller::new(7, Role::Director),
                Decision::Approve
            ),
            Err(MovementError::UnknownMovement(_))
        ));
    }
}
