//! # Engine Configuration & Constants
//!
//! Every magic number in the reconciliation engine lives here. Account
//! prefixes, the cash-equality epsilon, the denomination table, lock
//! timeouts. If you find a hardcoded constant anywhere else in the
//! crate, that's a bug worth filing.
//!
//! A word on the numeric codes further down: session states, movement
//! types and movement states are persisted as small integers by the
//! surrounding application. Those integers are a storage contract.
//! Changing any of them means migrating every stored row, so don't.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Cash equality
// ---------------------------------------------------------------------------

/// Tolerance for every cash-equality comparison in the engine.
///
/// Amounts are exact decimals, but totals that crossed the surrounding
/// application (rate conversions, interest splits) can carry sub-cent
/// residue. Two amounts closer than one cent are the same amount.
pub const EPSILON: Decimal = dec!(0.01);

/// Returns `true` if two amounts are equal within [`EPSILON`].
pub fn amounts_equal(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < EPSILON
}

// ---------------------------------------------------------------------------
// Chart-of-accounts anchors
// ---------------------------------------------------------------------------

/// Prefix of the agency vault accounts. An agency's vault is
/// `1.0.1.<agency_id>`.
pub const VAULT_ACCOUNT_PREFIX: &str = "1.0.1";

/// Prefix of the teller drawer accounts. A drawer is
/// `1.0.2.<agency_id>.<teller_id>`.
pub const DRAWER_ACCOUNT_PREFIX: &str = "1.0.2";

/// Prefix of the cash shortage/overage accounts. Nonzero session
/// variances must eventually be compensated by a journal entry against
/// an account under this prefix; the auditor cross-checks.
pub const SHORTAGE_OVERAGE_PREFIX: &str = "3.4";

/// Builds the vault account number for an agency.
pub fn vault_account(agency_id: u32) -> String {
    format!("{}.{}", VAULT_ACCOUNT_PREFIX, agency_id)
}

/// Builds the drawer account number for a teller at an agency.
pub fn drawer_account(agency_id: u32, teller_id: u64) -> String {
    format!("{}.{}.{}", DRAWER_ACCOUNT_PREFIX, agency_id, teller_id)
}

// ---------------------------------------------------------------------------
// Denominations
// ---------------------------------------------------------------------------

/// Whether a denomination is a banknote or a coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenominationKind {
    /// Paper money.
    Note,
    /// Metal money. Heavier, louder, counted last.
    Coin,
}

/// A recognized physical denomination: a face value plus its kind.
///
/// The 500-franc value appears twice (note and coin); count sheets list
/// them on separate rows, so the engine does too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Denomination {
    /// Face value in whole currency units.
    pub face: i64,
    /// Note or coin.
    pub kind: DenominationKind,
}

impl Denomination {
    /// Face value as an exact decimal amount.
    pub fn face_value(&self) -> Decimal {
        Decimal::from(self.face)
    }
}

/// The fixed denomination table, descending by face value, notes before
/// coins at equal value. Every [`CashCount`](crate::cash::CashCount)
/// carries exactly one quantity per row of this table, in this order.
pub const DENOMINATIONS: [Denomination; 13] = [
    Denomination { face: 10_000, kind: DenominationKind::Note },
    Denomination { face: 5_000, kind: DenominationKind::Note },
    Denomination { face: 2_000, kind: DenominationKind::Note },
    Denomination { face: 1_000, kind: DenominationKind::Note },
    Denomination { face: 500, kind: DenominationKind::Note },
    Denomination { face: 500, kind: DenominationKind::Coin },
    Denomination { face: 250, kind: DenominationKind::Coin },
    Denomination { face: 100, kind: DenominationKind::Coin },
    Denomination { face: 50, kind: DenominationKind::Coin },
    Denomination { face: 25, kind: DenominationKind::Coin },
    Denomination { face: 10, kind: DenominationKind::Coin },
    Denomination { face: 5, kind: DenominationKind::Coin },
    Denomination { face: 1, kind: DenominationKind::Coin },
];

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// Bounded wait for acquiring any per-key mutation lock (per-agency
/// ledger, per-session, per-movement). Past this, the operation fails
/// with a `Contention` error and the caller decides whether to retry.
pub const LOCK_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Query limits
// ---------------------------------------------------------------------------

/// Hard cap on a single `query_by_account` page. Reporting pages ask
/// for 50 at a time; nothing legitimate asks for more than this.
pub const MAX_PAGE_SIZE: usize = 500;

/// Default page size when the caller doesn't specify one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_is_one_cent() {
        assert_eq!(EPSILON, dec!(0.01));
    }

    #[test]
    fn amounts_equal_within_epsilon() {
        assert!(amounts_equal(dec!(100.000), dec!(100.009)));
        assert!(amounts_equal(dec!(100.00), dec!(100.00)));
        assert!(!amounts_equal(dec!(100.00), dec!(100.01)));
        assert!(!amounts_equal(dec!(100.00), dec!(99.00)));
    }

    #[test]
    fn denominations_strictly_ordered() {
        // Descending by face value; the two 500s are adjacent, note first.
        for pair in DENOMINATIONS.windows(2) {
            assert!(pair[0].face >= pair[1].face);
            if pair[0].face == pair[1].face {
                assert_eq!(pair[0].kind, DenominationKind::Note);
                assert_eq!(pair[1].kind, DenominationKind::Coin);
            }
        }
    }

    #[test]
    fn denomination_face_values_positive() {
        for d in DENOMINATIONS {
            assert!(d.face > 0);
            assert_eq!(d.face_value(), Decimal::from(d.face));
        }
    }

    #[test]
    fn account_builders() {
        assert_eq!(vault_account(3), "1.0.1.3");
        assert_eq!(drawer_account(3, 17), "1.0.2.3.17");
    }

    #[test]
    fn drawer_is_not_under_vault_prefix() {
        // The two treasury sub-trees must stay disjoint or balance
        // queries by prefix would double count.
        assert!(!drawer_account(1, 1).starts_with(VAULT_ACCOUNT_PREFIX));
        assert!(!vault_account(1).starts_with(DRAWER_ACCOUNT_PREFIX));
    }

    #[test]
    fn page_size_limits_sane() {
        assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
        assert!(DEFAULT_PAGE_SIZE > 0);
    }
}
