//! # Account Numbers & Classification
//!
//! Accounts are dot-delimited hierarchical codes: `1.0.1.3` is the
//! vault of agency 3, somewhere under the treasury tree. The leading
//! segment is the class digit, 1 through 7, and the class alone decides
//! the account's nature and which side it normally carries its balance
//! on. That sign convention lives here and nowhere else -- every
//! component that needs a signed balance asks [`classify`] instead of
//! flipping signs locally.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised when parsing or classifying an account number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// The string does not match `class.segment(.segment)*` with all
    /// segments non-empty ASCII digits.
    #[error("malformed account number: {0:?}")]
    InvalidFormat(String),

    /// The leading class digit is outside 1..=7.
    #[error("unknown account class {class} in {number:?}")]
    UnknownClass {
        /// The offending leading digit (or whole first segment).
        class: String,
        /// The full account number.
        number: String,
    },
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The seven account classes of the chart of accounts. Ordered by
/// class digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountClass {
    /// Class 1: cash in vaults, drawers, banks.
    Treasury,
    /// Class 2: client deposit and loan accounts.
    Clientele,
    /// Class 3: suspense, shortages/overages, sundry.
    Misc,
    /// Class 4: buildings, equipment.
    FixedAssets,
    /// Class 5: capital and reserves.
    Equity,
    /// Class 6: charges.
    Expense,
    /// Class 7: products.
    Income,
}

impl AccountClass {
    /// Maps a class digit to its class. Returns `None` outside 1..=7.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(Self::Treasury),
            2 => Some(Self::Clientele),
            3 => Some(Self::Misc),
            4 => Some(Self::FixedAssets),
            5 => Some(Self::Equity),
            6 => Some(Self::Expense),
            7 => Some(Self::Income),
            _ => None,
        }
    }

    /// The class digit, 1..=7.
    pub fn digit(&self) -> u8 {
        match self {
            Self::Treasury => 1,
            Self::Clientele => 2,
            Self::Misc => 3,
            Self::FixedAssets => 4,
            Self::Equity => 5,
            Self::Expense => 6,
            Self::Income => 7,
        }
    }

    /// The side this class normally carries its balance on.
    ///
    /// Treasury, misc, fixed assets and expenses accumulate on the
    /// debit side; clientele (deposits are what we owe clients), equity
    /// and income accumulate on the credit side.
    pub fn expected_side(&self) -> BalanceSide {
        match self {
            Self::Treasury | Self::Misc | Self::FixedAssets | Self::Expense => BalanceSide::Debit,
            Self::Clientele | Self::Equity | Self::Income => BalanceSide::Credit,
        }
    }
}

impl fmt::Display for AccountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Treasury => "treasury",
            Self::Clientele => "clientele",
            Self::Misc => "misc",
            Self::FixedAssets => "fixed-assets",
            Self::Equity => "equity",
            Self::Expense => "expense",
            Self::Income => "income",
        };
        write!(f, "{name}")
    }
}

/// Which side of the ledger a balance is expected to sit on.
///
/// Drives the sign convention of `balance()`: a debit-natured account
/// reports `debits - credits`, a credit-natured account the inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceSide {
    /// Net balance expected on the debit side.
    Debit,
    /// Net balance expected on the credit side.
    Credit,
}

/// Result of classifying an account number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The account's class.
    pub class: AccountClass,
    /// The side its balance normally sits on.
    pub expected_side: BalanceSide,
}

/// Classifies an account number by its leading class digit.
///
/// Pure and stateless. Infallible because [`AccountNumber`]
/// construction already validated the class; raw snapshot rows go
/// through [`AccountNumber::is_well_formed`] instead.
pub fn classify(account: &AccountNumber) -> Classification {
    // AccountNumber construction already guarantees a valid class.
    let class = account.class();
    Classification {
        class,
        expected_side: class.expected_side(),
    }
}

// ---------------------------------------------------------------------------
// AccountNumber
// ---------------------------------------------------------------------------

/// A validated, dot-delimited hierarchical account number.
///
/// Invariants established at construction: at least two segments, every
/// segment non-empty ASCII digits, leading segment a single digit in
/// 1..=7. The inner string is normalized (no whitespace) and is the
/// exact wire/storage representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber {
    raw: String,
    class: AccountClass,
}

impl AccountNumber {
    /// The account's class. Resolved once at construction from the
    /// leading digit.
    pub fn class(&self) -> AccountClass {
        self.class
    }

    /// The raw dot-delimited string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this account sits under `prefix` in the hierarchy.
    ///
    /// Prefix matching is segment-wise: `1.0.1` covers `1.0.1` itself
    /// and `1.0.1.3`, but not `1.0.10`.
    pub fn is_under(&self, prefix: &str) -> bool {
        if self.raw == prefix {
            return true;
        }
        self.raw.starts_with(prefix) && self.raw.as_bytes().get(prefix.len()) == Some(&b'.')
    }

    /// Validates a raw string against the account-number pattern
    /// without building an [`AccountNumber`]. Used by the auditor on
    /// as-persisted rows.
    pub fn is_well_formed(raw: &str) -> bool {
        let mut segments = raw.split('.');
        let Some(class_seg) = segments.next() else {
            return false;
        };
        let class_ok = class_seg.len() == 1
            && matches!(class_seg.as_bytes()[0], b'1'..=b'7');
        if !class_ok {
            return false;
        }
        let mut rest = 0usize;
        for seg in segments {
            if seg.is_empty() || !seg.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
            rest += 1;
        }
        rest >= 1
    }
}

impl FromStr for AccountNumber {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let first = s.split('.').next().unwrap_or_default();
        if !first.is_empty()
            && first.bytes().all(|b| b.is_ascii_digit())
            && AccountClass::from_digit(first.parse::<u8>().unwrap_or(0)).is_none()
        {
            return Err(AccountError::UnknownClass {
                class: first.to_string(),
                number: s.to_string(),
            });
        }
        if !Self::is_well_formed(s) {
            return Err(AccountError::InvalidFormat(s.to_string()));
        }
        // Well-formed means the leading segment is one digit in 1..=7.
        let class = AccountClass::from_digit(s.as_bytes()[0] - b'0').ok_or_else(|| {
            AccountError::UnknownClass {
                class: first.to_string(),
                number: s.to_string(),
            }
        })?;
        Ok(Self {
            raw: s.to_string(),
            class,
        })
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = AccountError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccountNumber> for String {
    fn from(a: AccountNumber) -> Self {
        a.raw
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
