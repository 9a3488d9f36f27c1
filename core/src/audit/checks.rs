//! # Consistency Check Battery
//!
//! A fixed battery of read-only checks over an audit [`Snapshot`].
//! Each check is independent and individually reportable; a finding is
//! returned, never thrown. The engine's components already enforce
//! these invariants at the door -- the auditor is the second line,
//! catching what migrations, manual fixes and host-application bugs
//! let through.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::audit::report::{CheckResult, Report};
use crate::audit::snapshot::{EntryRow, Snapshot};
use crate::cash::CashCount;
use crate::config;
use crate::ledger::account::{AccountClass, AccountNumber, BalanceSide};
use crate::ledger::Direction;
use crate::movement::{MovementState, MovementType};
use crate::session::SessionState;

/// Runs the consistency battery. Construct once, run on any snapshot.
///
/// The reference date anchors the future-posting check; it defaults to
/// today and is injectable for reproducible runs.
pub struct Auditor {
    reference_date: NaiveDate,
}

impl Auditor {
    /// An auditor anchored to today's date.
    pub fn new() -> Self {
        Self {
            reference_date: Utc::now().date_naive(),
        }
    }

    /// An auditor anchored to an explicit date.
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self { reference_date }
    }

    /// Runs every check, in battery order, and rolls up the report.
    /// Read-only: the snapshot is borrowed and nothing is mutated.
    pub fn run_all(&self, snap: &Snapshot) -> Report {
        Report::from_checks(vec![
            check_global_balance(snap),
            check_entry_balance(snap),
            check_agency_balance(snap),
            check_session_state_codes(snap),
            check_single_open_session(snap),
            check_orphan_references(snap),
            check_movement_codes(snap),
            check_approver_presence(snap),
            check_self_approval(snap),
            check_count_totals(snap),
            check_positive_amounts(snap),
            check_future_postings(snap, self.reference_date),
            check_account_format(snap),
            check_nature_conformance(snap),
            check_variance_coverage(snap),
        ])
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_totals(entry: &EntryRow) -> (Decimal, Decimal) {
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    for line in &entry.lines {
        match line.direction {
            Direction::Debit => debits += line.amount,
            Direction::Credit => credits += line.amount,
        }
    }
    (debits, credits)
}

/// Σdebits == Σcredits over the whole book.
fn check_global_balance(snap: &Snapshot) -> CheckResult {
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    for entry in &snap.entries {
        let (d, c) = entry_totals(entry);
        debits += d;
        credits += c;
    }
    if config::amounts_equal(debits, credits) {
        CheckResult::success(
            "global_balance",
            format!("book balanced at {debits} on each side"),
        )
    } else {
        CheckResult::error(
            "global_balance",
            "global debit and credit totals diverge",
            json!({"debits": debits, "credits": credits, "difference": debits - credits}),
        )
    }
}

/// Every entry balances on its own.
fn check_entry_balance(snap: &Snapshot) -> CheckResult {
    let offenders: Vec<_> = snap
        .entries
        .iter()
        .filter_map(|entry| {
            let (d, c) = entry_totals(entry);
            (!config::amounts_equal(d, c)).then(|| {
                json!({
                    "agency_id": entry.agency_id,
                    "entry_id": entry.entry_id,
                    "debits": d,
                    "credits": c,
                })
            })
        })
        .collect();
    if offenders.is_empty() {
        CheckResult::success(
            "entry_balance",
            format!("{} entries individually balanced", snap.entries.len()),
        )
    } else {
        CheckResult::error(
            "entry_balance",
            format!("{} unbalanced entries", offenders.len()),
            json!(offenders),
        )
    }
}

/// Every agency's sub-book balances.
fn check_agency_balance(snap: &Snapshot) -> CheckResult {
    let mut per_agency: HashMap<u32, (Decimal, Decimal)> = HashMap::new();
    for entry in &snap.entries {
        let (d, c) = entry_totals(entry);
        let slot = per_agency.entry(entry.agency_id).or_default();
        slot.0 += d;
        slot.1 += c;
    }
    let mut offenders: Vec<_> = per_agency
        .iter()
        .filter(|(_, (d, c))| !config::amounts_equal(*d, *c))
        .map(|(agency, (d, c))| json!({"agency_id": agency, "debits": d, "credits": c}))
        .collect();
    offenders.sort_by_key(|v| v["agency_id"].as_u64());
    if offenders.is_empty() {
        CheckResult::success(
            "agency_balance",
            format!("{} agencies balanced", per_agency.len()),
        )
    } else {
        CheckResult::error(
            "agency_balance",
            format!("{} agencies out of balance", offenders.len()),
            json!(offenders),
        )
    }
}

/// Session state codes decode to the 1/2/3 contract.
fn check_session_state_codes(snap: &Snapshot) -> CheckResult {
    let offenders: Vec<_> = snap
        .sessions
        .iter()
        .filter(|s| SessionState::from_code(s.state_code).is_none())
        .map(|s| json!({"session_id": s.session_id, "state_code": s.state_code}))
        .collect();
    if offenders.is_empty() {
        CheckResult::success("session_state_codes", "all session state codes valid")
    } else {
        CheckResult::error(
            "session_state_codes",
            format!("{} sessions with invalid state codes", offenders.len()),
            json!(offenders),
        )
    }
}

/// At most one open session per (teller, agency, date).
fn check_single_open_session(snap: &Snapshot) -> CheckResult {
    let mut open: HashMap<(u64, u32, NaiveDate), Vec<Uuid>> = HashMap::new();
    for s in &snap.sessions {
        if s.state_code == SessionState::Open.code() {
            open.entry((s.teller, s.agency_id, s.date))
                .or_default()
                .push(s.session_id);
        }
    }
    let offenders: Vec<_> = open
        .iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((teller, agency, date), ids)| {
            json!({"teller": teller, "agency_id": agency, "date": date, "sessions": ids})
        })
        .collect();
    if offenders.is_empty() {
        CheckResult::success("single_open_session", "open sessions unique per drawer-day")
    } else {
        CheckResult::error(
            "single_open_session",
            format!("{} drawer-days with concurrent open sessions", offenders.len()),
            json!(offenders),
        )
    }
}

/// Movements and counts reference sessions that exist; the nil UUID is
/// reserved as a legacy null marker and counts as missing.
fn check_orphan_references(snap: &Snapshot) -> CheckResult {
    let known: std::collections::HashSet<Uuid> =
        snap.sessions.iter().map(|s| s.session_id).collect();
    let dangling = |id: &Option<Uuid>| match id {
        // Movements must have a session; counts without one are vault
        // snapshots and legitimate (handled below).
        Some(id) => id.is_nil() || !known.contains(id),
        None => false,
    };

    let mut offenders = Vec::new();
    for m in &snap.movements {
        if m.session_id.is_none() || dangling(&m.session_id) {
            offenders.push(json!({"movement_id": m.movement_id, "session_id": m.session_id}));
        }
    }
    for (i, c) in snap.counts.iter().enumerate() {
        if dangling(&c.session_id) {
            offenders.push(json!({"count_index": i, "session_id": c.session_id}));
        }
    }
    if offenders.is_empty() {
        CheckResult::success("orphan_references", "no orphan movements or counts")
    } else {
        CheckResult::error(
            "orphan_references",
            format!("{} orphan references", offenders.len()),
            json!(offenders),
        )
    }
}

/// Movement type and state codes decode to their contracts.
fn check_movement_codes(snap: &Snapshot) -> CheckResult {
    let offenders: Vec<_> = snap
        .movements
        .iter()
        .filter(|m| {
            MovementType::from_code(m.type_code).is_none()
                || MovementState::from_code(m.state_code).is_none()
        })
        .map(|m| {
            json!({
                "movement_id": m.movement_id,
                "type_code": m.type_code,
                "state_code": m.state_code,
            })
        })
        .collect();
    if offenders.is_empty() {
        CheckResult::success("movement_codes", "all movement codes valid")
    } else {
        CheckResult::error(
            "movement_codes",
            format!("{} movements with invalid codes", offenders.len()),
            json!(offenders),
        )
    }
}

/// An approver is recorded exactly when the movement is decided.
fn check_approver_presence(snap: &Snapshot) -> CheckResult {
    let offenders: Vec<_> = snap
        .movements
        .iter()
        .filter(|m| {
            match MovementState::from_code(m.state_code) {
                // Bad codes are movement_codes findings, not ours.
                None => false,
                Some(state) => state.is_decided() != m.approver.is_some(),
            }
        })
        .map(|m| {
            json!({
                "movement_id": m.movement_id,
                "state_code": m.state_code,
                "approver": m.approver,
            })
        })
        .collect();
    if offenders.is_empty() {
        CheckResult::success("approver_presence", "approver present iff decided")
    } else {
        CheckResult::error(
            "approver_presence",
            format!("{} movements with inconsistent approver", offenders.len()),
            json!(offenders),
        )
    }
}

/// Nobody decided their own request.
fn check_self_approval(snap: &Snapshot) -> CheckResult {
    let offenders: Vec<_> = snap
        .movements
        .iter()
        .filter(|m| m.approver == Some(m.requester))
        .map(|m| json!({"movement_id": m.movement_id, "user": m.requester}))
        .collect();
    if offenders.is_empty() {
        CheckResult::success("self_approval", "maker and checker separated everywhere")
    } else {
        CheckResult::error(
            "self_approval",
            format!("{} self-approved movements", offenders.len()),
            json!(offenders),
        )
    }
}

/// Every count's rows sum to its declared total.
fn check_count_totals(snap: &Snapshot) -> CheckResult {
    let mut offenders = Vec::new();
    for (i, row) in snap.counts.iter().enumerate() {
        let count = CashCount::new(row.quantities.clone(), row.declared_total);
        match count.computed_total() {
            Err(err) => offenders.push(json!({
                "count_index": i,
                "session_id": row.session_id,
                "error": err.to_string(),
            })),
            Ok(computed) if !config::amounts_equal(computed, row.declared_total) => {
                offenders.push(json!({
                    "count_index": i,
                    "session_id": row.session_id,
                    "computed_total": computed,
                    "declared_total": row.declared_total,
                }));
            }
            Ok(_) => {}
        }
    }
    if offenders.is_empty() {
        CheckResult::success(
            "count_totals",
            format!("{} counts reconcile to their declared totals", snap.counts.len()),
        )
    } else {
        CheckResult::error(
            "count_totals",
            format!("{} counts do not reconcile", offenders.len()),
            json!(offenders),
        )
    }
}

/// No zero or negative amounts on entry lines or movements.
fn check_positive_amounts(snap: &Snapshot) -> CheckResult {
    let mut offenders = Vec::new();
    for entry in &snap.entries {
        for (i, line) in entry.lines.iter().enumerate() {
            if line.amount <= Decimal::ZERO {
                offenders.push(json!({
                    "agency_id": entry.agency_id,
                    "entry_id": entry.entry_id,
                    "line": i,
                    "amount": line.amount,
                }));
            }
        }
    }
    for m in &snap.movements {
        if m.amount <= Decimal::ZERO {
            offenders.push(json!({"movement_id": m.movement_id, "amount": m.amount}));
        }
    }
    if offenders.is_empty() {
        CheckResult::success("positive_amounts", "all amounts strictly positive")
    } else {
        CheckResult::error(
            "positive_amounts",
            format!("{} non-positive amounts", offenders.len()),
            json!(offenders),
        )
    }
}

/// No entry carries a value date after the reference date.
fn check_future_postings(snap: &Snapshot, reference_date: NaiveDate) -> CheckResult {
    let offenders: Vec<_> = snap
        .entries
        .iter()
        .filter(|e| e.value_date > reference_date)
        .map(|e| {
            json!({
                "agency_id": e.agency_id,
                "entry_id": e.entry_id,
                "value_date": e.value_date,
            })
        })
        .collect();
    if offenders.is_empty() {
        CheckResult::success("future_postings", "no future-dated postings")
    } else {
        CheckResult::error(
            "future_postings",
            format!("{} future-dated entries", offenders.len()),
            json!(offenders),
        )
    }
}

/// Every line's account matches the dot-delimited class pattern.
fn check_account_format(snap: &Snapshot) -> CheckResult {
    let mut offenders = Vec::new();
    for entry in &snap.entries {
        for line in &entry.lines {
            if !AccountNumber::is_well_formed(&line.account) {
                offenders.push(json!({
                    "agency_id": entry.agency_id,
                    "entry_id": entry.entry_id,
                    "account": line.account,
                }));
            }
        }
    }
    if offenders.is_empty() {
        CheckResult::success("account_format", "all account numbers well-formed")
    } else {
        CheckResult::error(
            "account_format",
            format!("{} malformed account numbers", offenders.len()),
            json!(offenders),
        )
    }
}

/// The flow classes net out on their structural side: expenses (class
/// 6) on the debit side, income (class 7) on the credit side. Balance
/// sheet classes swing legitimately, so only the flow classes are
/// checked, and a wrong-side net is a warning for review rather than
/// an integrity error.
fn check_nature_conformance(snap: &Snapshot) -> CheckResult {
    let mut per_class: HashMap<u8, (Decimal, Decimal)> = HashMap::new();
    for entry in &snap.entries {
        for line in &entry.lines {
            // Malformed accounts are account_format findings.
            if !AccountNumber::is_well_formed(&line.account) {
                continue;
            }
            let digit = line.account.as_bytes()[0] - b'0';
            let slot = per_class.entry(digit).or_default();
            match line.direction {
                Direction::Debit => slot.0 += line.amount,
                Direction::Credit => slot.1 += line.amount,
            }
        }
    }
    let mut offenders: Vec<_> = per_class
        .iter()
        .filter_map(|(digit, (debits, credits))| {
            let class = AccountClass::from_digit(*digit)?;
            if !matches!(class, AccountClass::Expense | AccountClass::Income) {
                return None;
            }
            let net = match class.expected_side() {
                BalanceSide::Debit => debits - credits,
                BalanceSide::Credit => credits - debits,
            };
            (net < -config::EPSILON).then(|| {
                json!({
                    "class": digit,
                    "nature": class.to_string(),
                    "expected_side": class.expected_side(),
                    "net_on_expected_side": net,
                })
            })
        })
        .collect();
    offenders.sort_by_key(|v| v["class"].as_u64());
    if offenders.is_empty() {
        CheckResult::success("nature_conformance", "every class nets on its expected side")
    } else {
        CheckResult::warning(
            "nature_conformance",
            format!("{} classes net on the wrong side", offenders.len()),
            json!(offenders),
        )
    }
}

/// Closed sessions with a nonzero variance should eventually be covered
/// by a shortage/overage entry for the same agency and amount. Policy
/// is manual compensation, so an uncovered variance is a warning for
/// human follow-up, not an integrity error.
fn check_variance_coverage(snap: &Snapshot) -> CheckResult {
    let uncovered: Vec<_> = snap
        .sessions
        .iter()
        .filter(|s| {
            s.state_code != SessionState::Open.code()
                && s.variance
                    .map(|v| v.abs() >= config::EPSILON)
                    .unwrap_or(false)
        })
        .filter(|s| {
            let variance = s.variance.unwrap_or_default().abs();
            let covered = snap.entries.iter().any(|e| {
                e.agency_id == s.agency_id
                    && e.lines.iter().any(|l| {
                        is_under_prefix(&l.account, config::SHORTAGE_OVERAGE_PREFIX)
                            && config::amounts_equal(l.amount, variance)
                    })
            });
            !covered
        })
        .map(|s| {
            json!({
                "session_id": s.session_id,
                "agency_id": s.agency_id,
                "variance": s.variance,
            })
        })
        .collect();
    if uncovered.is_empty() {
        CheckResult::success("variance_coverage", "all nonzero variances compensated")
    } else {
        CheckResult::warning(
            "variance_coverage",
            format!("{} session variances awaiting compensation", uncovered.len()),
            json!(uncovered),
        )
    }
}

/// Raw-string flavor of segment-wise prefix matching, for rows whose
/// accounts may not parse.
fn is_under_prefix(account: &str, prefix: &str) -> bool {
    account == prefix
        || (account.starts_with(prefix) && account.as_bytes().get(prefix.len()) == Some(&b'.'))
}
