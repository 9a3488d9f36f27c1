//! Physical cash: denomination counts and their reconciliation.

pub mod count;

pub use count::{reconcile, CashCount, CountError, Reconciliation};
