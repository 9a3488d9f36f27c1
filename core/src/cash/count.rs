//! # Denomination Counts
//!
//! A cash count is the physical truth of a drawer or a vault: so many
//! 10,000-franc notes, so many 25-franc coins, and the total the
//! counter wrote at the bottom of the sheet. Reconciliation recomputes
//! the total from the rows and compares it to the declared figure. It
//! never fixes anything; a mismatch is a finding, not an input error to
//! paper over.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{self, DENOMINATIONS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised when reconciling a cash count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountError {
    /// A denomination row carries a negative quantity.
    #[error("negative quantity {quantity} for denomination {face}")]
    NegativeQuantity {
        /// Face value of the offending row.
        face: i64,
        /// The negative quantity.
        quantity: i64,
    },

    /// The count does not have one quantity per denomination row.
    #[error("count has {got} rows, expected {expected}")]
    WrongRowCount {
        /// Rows in the configured denomination table.
        expected: usize,
        /// Rows supplied.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// CashCount
// ---------------------------------------------------------------------------

/// A declared cash count: one quantity per row of
/// [`config::DENOMINATIONS`], in table order, plus the total the
/// counter declared.
///
/// Quantities are signed so that a bad row coming out of storage can be
/// represented and reported rather than rejected at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashCount {
    /// Quantities aligned with the denomination table.
    pub quantities: Vec<i64>,
    /// The total declared by whoever counted.
    pub declared_total: Decimal,
}

impl CashCount {
    /// A count with the given quantities and declared total.
    pub fn new(quantities: Vec<i64>, declared_total: Decimal) -> Self {
        Self {
            quantities,
            declared_total,
        }
    }

    /// An empty drawer: all-zero quantities, zero declared total.
    pub fn zero() -> Self {
        Self {
            quantities: vec![0; DENOMINATIONS.len()],
            declared_total: Decimal::ZERO,
        }
    }

    /// A count whose declared total is derived from its own rows.
    /// Convenience for callers that count rows first and trust the sum.
    pub fn from_quantities(quantities: Vec<i64>) -> Result<Self, CountError> {
        let mut count = Self::new(quantities, Decimal::ZERO);
        count.declared_total = count.computed_total()?;
        Ok(count)
    }

    /// Recomputes the total from the denomination rows.
    ///
    /// # Errors
    ///
    /// [`CountError::WrongRowCount`] if the row count differs from the
    /// table, [`CountError::NegativeQuantity`] on any negative row.
    pub fn computed_total(&self) -> Result<Decimal, CountError> {
        if self.quantities.len() != DENOMINATIONS.len() {
            return Err(CountError::WrongRowCount {
                expected: DENOMINATIONS.len(),
                got: self.quantities.len(),
            });
        }
        let mut total = Decimal::ZERO;
        for (denom, &qty) in DENOMINATIONS.iter().zip(&self.quantities) {
            if qty < 0 {
                return Err(CountError::NegativeQuantity {
                    face: denom.face,
                    quantity: qty,
                });
            }
            total += denom.face_value() * Decimal::from(qty);
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Outcome of reconciling a count against its declared total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Whether computed and declared totals agree within epsilon.
    pub matches: bool,
    /// Total recomputed from the denomination rows.
    pub computed_total: Decimal,
    /// Total declared on the count.
    pub declared_total: Decimal,
}

/// Reconciles a cash count: recomputes its total and compares against
/// the declared one. Pure; mutates nothing.
///
/// # Errors
///
/// Propagates [`CountError`] from [`CashCount::computed_total`].
pub fn reconcile(count: &CashCount) -> Result<Reconciliation, CountError> {
    let computed_total = count.computed_total()?;
    Ok(Reconciliation {
        matches: config::amounts_equal(computed_total, count.declared_total),
        computed_total,
        declared_total: count.declared_total,
    })
}
