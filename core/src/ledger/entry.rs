//! # Journal Entries
//!
//! The unit of posting. An entry is two or more lines that debit and
//! credit accounts for the same grand total; the ledger accepts it
//! whole or not at all, and once accepted it never changes. A wrong
//! entry is corrected by posting its reverse, never by editing.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;
use crate::ledger::account::{AccountError, AccountNumber};

/// Identifier of an agency (branch). Assigned by the host application.
pub type AgencyId = u32;

/// Identifier of a posted journal entry, monotonic per agency.
pub type EntryId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by entry validation and by the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Debit total and credit total differ by [`config::EPSILON`] or more.
    #[error("unbalanced entry: debits {debits}, credits {credits}")]
    UnbalancedEntry {
        /// Sum of the debit lines.
        debits: Decimal,
        /// Sum of the credit lines.
        credits: Decimal,
    },

    /// A line references an account that fails classification.
    #[error("invalid account on entry line: {0}")]
    InvalidAccount(#[from] AccountError),

    /// A line carries a zero or negative amount.
    #[error("non-positive amount {amount} on account {account}")]
    NonPositiveAmount {
        /// The offending account.
        account: AccountNumber,
        /// The offending amount.
        amount: Decimal,
    },

    /// Fewer than two lines; double entry needs both sides.
    #[error("entry has {0} line(s), at least 2 required")]
    TooFewLines(usize),

    /// The per-agency write lock could not be acquired within the
    /// bounded wait. Transient; the caller decides whether to retry.
    #[error("ledger contention on agency {agency_id}, gave up after {waited_ms}ms")]
    Contention {
        /// The contended agency.
        agency_id: AgencyId,
        /// How long we waited before giving up.
        waited_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which side of the entry a line sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Left side. Increases debit-natured accounts.
    Debit,
    /// Right side. Increases credit-natured accounts.
    Credit,
}

// ---------------------------------------------------------------------------
// EntryLine
// ---------------------------------------------------------------------------

/// One line of a journal entry: an account, a side, a positive amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLine {
    /// The account this line touches.
    pub account: AccountNumber,
    /// Debit or credit.
    pub direction: Direction,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Optional free-text label for statements and reports.
    pub label: Option<String>,
}

impl EntryLine {
    /// A debit line with no label.
    pub fn debit(account: AccountNumber, amount: Decimal) -> Self {
        Self {
            account,
            direction: Direction::Debit,
            amount,
            label: None,
        }
    }

    /// A credit line with no label.
    pub fn credit(account: AccountNumber, amount: Decimal) -> Self {
        Self {
            account,
            direction: Direction::Credit,
            amount,
            label: None,
        }
    }

    /// Attaches a label.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EntryDraft
// ---------------------------------------------------------------------------

/// An entry that has not been posted yet: everything but the id.
///
/// Drafts are what the surrounding banking operations hand to
/// [`LedgerStore::post`](crate::ledger::LedgerStore::post). Validation
/// happens before any write, so a rejected draft leaves no trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    /// The agency whose ledger this posts to.
    pub agency_id: AgencyId,
    /// Accounting value date.
    pub value_date: NaiveDate,
    /// The lines. At least two, balanced.
    pub lines: Vec<EntryLine>,
}

impl EntryDraft {
    /// Creates a draft. Validation is deferred to [`Self::validate`]
    /// (and always re-run by the store); this just assembles the parts.
    pub fn new(agency_id: AgencyId, value_date: NaiveDate, lines: Vec<EntryLine>) -> Self {
        Self {
            agency_id,
            value_date,
            lines,
        }
    }

    /// Sum of the debit lines.
    pub fn debit_total(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.direction == Direction::Debit)
            .map(|l| l.amount)
            .sum()
    }

    /// Sum of the credit lines.
    pub fn credit_total(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.direction == Direction::Credit)
            .map(|l| l.amount)
            .sum()
    }

    /// Checks every posting invariant: line count, positive amounts,
    /// balance within epsilon. Account validity is guaranteed by
    /// [`AccountNumber`] construction.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.lines.len() < 2 {
            return Err(LedgerError::TooFewLines(self.lines.len()));
        }
        for line in &self.lines {
            if line.amount <= Decimal::ZERO {
                return Err(LedgerError::NonPositiveAmount {
                    account: line.account.clone(),
                    amount: line.amount,
                });
            }
        }
        let debits = self.debit_total();
        let credits = self.credit_total();
        if !config::amounts_equal(debits, credits) {
            return Err(LedgerError::UnbalancedEntry { debits, credits });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JournalEntry
// ---------------------------------------------------------------------------

/// A posted, immutable journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Identifier, monotonic within the agency.
    pub entry_id: EntryId,
    /// The agency whose ledger holds this entry.
    pub agency_id: AgencyId,
    /// Accounting value date.
    pub value_date: NaiveDate,
    /// Wall-clock time the store accepted the entry.
    pub posted_at: DateTime<Utc>,
    /// The balanced lines.
    pub lines: Vec<EntryLine>,
}

impl JournalEntry {
    /// Sum of the debit lines.
    pub fn debit_total(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.direction == Direction::Debit)
            .map(|l| l.amount)
            .sum()
    }

    /// Sum of the credit lines.
    pub fn credit_total(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.direction == Direction::Credit)
            .map(|l| l.amount)
            .sum()
    }
}
