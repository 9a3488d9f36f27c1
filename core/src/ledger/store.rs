//! # Ledger Store
//!
//! Append-only storage for journal entries, sharded by agency. Each
//! agency's ledger is an independent unit of contention: posting to
//! agency 1 never waits on agency 2. Within one agency, posts are
//! serialized under a timed mutex so entry ids stay monotonic and an
//! entry's lines become visible all at once.
//!
//! There is no update and no delete. The only way to undo a posted
//! entry is to post its reverse.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config;
use crate::ledger::account::{AccountClass, AccountError, BalanceSide};
use crate::ledger::entry::{AgencyId, Direction, EntryDraft, EntryId, JournalEntry, LedgerError};

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Pagination window for [`LedgerStore::query_by_account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Number of matching lines to skip.
    pub offset: usize,
    /// Maximum lines to return; clamped to [`config::MAX_PAGE_SIZE`].
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: config::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One entry line joined with its entry's metadata, as returned by
/// account queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLine {
    /// Agency whose ledger holds the entry.
    pub agency_id: AgencyId,
    /// The entry this line belongs to.
    pub entry_id: EntryId,
    /// The entry's value date.
    pub value_date: NaiveDate,
    /// Account touched by the line.
    pub account: String,
    /// Debit or credit.
    pub direction: Direction,
    /// Line amount.
    pub amount: Decimal,
    /// Line label, if any.
    pub label: Option<String>,
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// One agency's ordered entries plus its id sequence. Guarded by the
/// per-agency mutex; never touched outside it.
struct AgencyLedger {
    next_entry_id: EntryId,
    entries: Vec<JournalEntry>,
}

impl AgencyLedger {
    fn new() -> Self {
        Self {
            next_entry_id: 1,
            entries: Vec::new(),
        }
    }
}

/// The append-only journal entry store.
///
/// Cheap to share: clone the surrounding `Arc`, not the store. All
/// mutation flows through [`Self::post`]; reads take the same per-agency
/// locks briefly, so they observe whole entries or nothing.
pub struct LedgerStore {
    agencies: DashMap<AgencyId, Arc<Mutex<AgencyLedger>>>,
}

impl LedgerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            agencies: DashMap::new(),
        }
    }

    fn agency(&self, agency_id: AgencyId) -> Arc<Mutex<AgencyLedger>> {
        self.agencies
            .entry(agency_id)
            .or_insert_with(|| Arc::new(Mutex::new(AgencyLedger::new())))
            .clone()
    }

    /// Posts a draft entry, returning the assigned entry id.
    ///
    /// Fully validates before acquiring the agency lock; a rejected
    /// draft leaves the ledger untouched. The per-agency lock wait is
    /// bounded by [`config::LOCK_ACQUIRE_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnbalancedEntry`], [`LedgerError::NonPositiveAmount`],
    /// [`LedgerError::TooFewLines`] from validation, or
    /// [`LedgerError::Contention`] if the agency lock wait times out.
    pub fn post(&self, draft: EntryDraft) -> Result<EntryId, LedgerError> {
        draft.validate()?;

        let shard = self.agency(draft.agency_id);
        let mut ledger =
            shard
                .try_lock_for(config::LOCK_ACQUIRE_TIMEOUT)
                .ok_or(LedgerError::Contention {
                    agency_id: draft.agency_id,
                    waited_ms: config::LOCK_ACQUIRE_TIMEOUT.as_millis() as u64,
                })?;

        let entry_id = ledger.next_entry_id;
        ledger.next_entry_id += 1;

        let entry = JournalEntry {
            entry_id,
            agency_id: draft.agency_id,
            value_date: draft.value_date,
            posted_at: Utc::now(),
            lines: draft.lines,
        };
        info!(
            agency_id = entry.agency_id,
            entry_id,
            value_date = %entry.value_date,
            total = %entry.debit_total(),
            lines = entry.lines.len(),
            "journal entry posted"
        );
        ledger.entries.push(entry);

        Ok(entry_id)
    }

    /// Returns the lines touching any account under `prefix` with a
    /// value date in `[from, to]`, ordered by (value date, agency,
    /// entry id), paginated.
    pub fn query_by_account(
        &self,
        prefix: &str,
        from: NaiveDate,
        to: NaiveDate,
        page: Page,
    ) -> Vec<AccountLine> {
        let mut lines: Vec<AccountLine> = Vec::new();
        for shard in self.agencies.iter() {
            let ledger = shard.value().lock();
            for entry in &ledger.entries {
                if entry.value_date < from || entry.value_date > to {
                    continue;
                }
                for line in &entry.lines {
                    if line.account.is_under(prefix) {
                        lines.push(AccountLine {
                            agency_id: entry.agency_id,
                            entry_id: entry.entry_id,
                            value_date: entry.value_date,
                            account: line.account.as_str().to_string(),
                            direction: line.direction,
                            amount: line.amount,
                            label: line.label.clone(),
                        });
                    }
                }
            }
        }
        lines.sort_by(|a, b| {
            (a.value_date, a.agency_id, a.entry_id).cmp(&(b.value_date, b.agency_id, b.entry_id))
        });

        let limit = page.limit.min(config::MAX_PAGE_SIZE);
        lines.into_iter().skip(page.offset).take(limit).collect()
    }

    /// Signed balance of everything under `prefix` as of `as_of`
    /// (inclusive), using the classification sign convention: debit
    /// minus credit for debit-natured classes, the inverse otherwise.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAccount`] if the prefix's leading segment
    /// is not a class digit 1..=7.
    pub fn balance(&self, prefix: &str, as_of: NaiveDate) -> Result<Decimal, LedgerError> {
        let side = prefix_side(prefix)?;

        let mut debits = Decimal::ZERO;
        let mut credits = Decimal::ZERO;
        for shard in self.agencies.iter() {
            let ledger = shard.value().lock();
            for entry in &ledger.entries {
                if entry.value_date > as_of {
                    continue;
                }
                for line in &entry.lines {
                    if line.account.is_under(prefix) {
                        match line.direction {
                            Direction::Debit => debits += line.amount,
                            Direction::Credit => credits += line.amount,
                        }
                    }
                }
            }
        }

        Ok(match side {
            BalanceSide::Debit => debits - credits,
            BalanceSide::Credit => credits - debits,
        })
    }

    /// All posted entries, ordered by (agency, entry id). Feeds the
    /// auditor and the host application's persistence layer.
    pub fn snapshot(&self) -> Vec<JournalEntry> {
        let mut all: Vec<JournalEntry> = Vec::new();
        for shard in self.agencies.iter() {
            let ledger = shard.value().lock();
            all.extend(ledger.entries.iter().cloned());
        }
        all.sort_by_key(|e| (e.agency_id, e.entry_id));
        all
    }

    /// Number of entries across all agencies.
    pub fn len(&self) -> usize {
        self.agencies
            .iter()
            .map(|shard| shard.value().lock().entries.len())
            .sum()
    }

    /// `true` if nothing has ever been posted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a query prefix to the balance side of its class.
fn prefix_side(prefix: &str) -> Result<BalanceSide, LedgerError> {
    let first = prefix.split('.').next().unwrap_or_default();
    let digit = first.parse::<u8>().unwrap_or(0);
    let class = AccountClass::from_digit(digit).ok_or_else(|| {
        LedgerError::InvalidAccount(AccountError::UnknownClass {
            class: first.to_string(),
            number: prefix.to_string(),
        })
    })?;
    Ok(class.expected_side())
}
