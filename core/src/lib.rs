//! # Caisse — Ledger & Cash-Drawer Reconciliation Engine
//!
//! Caisse keeps the books straight for branch tellers who still handle
//! physical cash: a double-entry journal underneath, a supervised cash
//! lifecycle on top, and an auditor that trusts neither.
//!
//! ## Architecture
//!
//! The engine is split into modules that mirror the actual concerns of a
//! teller operation:
//!
//! - **ledger** — Double-entry journal. Account classification, balanced
//!   entries, per-agency posting with serialized mutation.
//! - **cash** — Physical money as data. Denomination counts and the pure
//!   reconciliation arithmetic over them.
//! - **session** — The teller's day. Open with a float, absorb movements,
//!   close against a counted drawer, get validated by a supervisor.
//! - **movement** — Vault/drawer transfers under maker-checker: one user
//!   requests, a different and sufficiently senior user decides.
//! - **audit** — The second line. Snapshots the whole state and runs a
//!   battery of consistency checks over the raw rows.
//! - **identity** — Users and the role ladder the workflows gate on.
//! - **config** — Constants: account prefixes, epsilon, denominations.
//!
//! ## Design Philosophy
//!
//! 1. Validate before writing. A rejected operation leaves no trace.
//! 2. Variance is a fact, not a bug. Record it, compensate it by hand.
//! 3. The auditor reads raw codes. Corrupt data gets reported, not
//!    silently normalized away.
//! 4. If it touches money, it has tests. Plural.

pub mod audit;
pub mod cash;
pub mod config;
pub mod identity;
pub mod ledger;
pub mod movement;
pub mod session;
