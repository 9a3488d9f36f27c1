// Posting benchmarks for the reconciliation engine.
//
// Covers single-entry posting on one agency, posting fanned out across
// many agencies, balance queries over a populated book, and paged
// account queries at various book sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use caisse_core::config;
use caisse_core::ledger::{EntryDraft, EntryLine, LedgerStore, Page};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

fn supply_draft(agency_id: u32, teller_id: u64) -> EntryDraft {
    let drawer = config::drawer_account(agency_id, teller_id).parse().unwrap();
    let vault = config::vault_account(agency_id).parse().unwrap();
    EntryDraft::new(
        agency_id,
        day(),
        vec![
            EntryLine::debit(drawer, dec!(50000)),
            EntryLine::credit(vault, dec!(50000)),
        ],
    )
}

fn bench_post_single_agency(c: &mut Criterion) {
    let store = LedgerStore::new();

    c.bench_function("ledger/post_single_agency", |b| {
        b.iter(|| store.post(supply_draft(1, 5)).unwrap());
    });
}

fn bench_post_across_agencies(c: &mut Criterion) {
    let store = LedgerStore::new();
    let mut agency = 0u32;

    c.bench_function("ledger/post_round_robin_16_agencies", |b| {
        b.iter(|| {
            agency = (agency + 1) % 16;
            store.post(supply_draft(agency + 1, 5)).unwrap()
        });
    });
}

fn bench_balance_query(c: &mut Criterion) {
    let store = LedgerStore::new();
    for _ in 0..1_000 {
        store.post(supply_draft(1, 5)).unwrap();
    }

    c.bench_function("ledger/balance_1k_entries", |b| {
        b.iter(|| store.balance("1.0.2.1.5", day()).unwrap());
    });
}

fn bench_paged_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/query_by_account");

    for size in [100usize, 1_000, 5_000] {
        let store = LedgerStore::new();
        for _ in 0..size {
            store.post(supply_draft(1, 5)).unwrap();
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| store.query_by_account("1.0.2", day(), day(), Page::default()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_post_single_agency,
    bench_post_across_agencies,
    bench_balance_query,
    bench_paged_query,
);
criterion_main!(benches);
