//! The double-entry ledger: account classification, journal entries,
//! and the append-only store everything posts through.

pub mod account;
pub mod entry;
pub mod store;

pub use account::{classify, AccountClass, AccountError, AccountNumber, BalanceSide, Classification};
pub use entry::{AgencyId, Direction, EntryDraft, EntryId, EntryLine, JournalEntry, LedgerError};
pub use store::{AccountLine, LedgerStore, Page};
