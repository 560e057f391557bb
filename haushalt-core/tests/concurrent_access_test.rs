//! Concurrent evaluation tests
//!
//! The engine keeps no state between calls, and the DuckDB adapter
//! serializes access behind its connection mutex. These tests hammer both
//! from several threads and check every thread sees the same answers.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use haushalt_core::adapters::duckdb::DuckDbRepository;
use haushalt_core::domain::{
    Column, Condition, ConditionType, Rule, Transaction, TransactionSnapshot,
};
use haushalt_core::engine;
use haushalt_core::ports::{Repository, TransactionFilter};
use haushalt_core::services::{CategorizeOptions, CategorizeService, RuleService};

const THREAD_COUNT: usize = 6;
const ITERATIONS_PER_THREAD: usize = 200;

fn rule_set() -> Vec<Rule> {
    vec![
        Rule::new(
            "groceries",
            "Groceries",
            "food",
            vec![
                Condition::text(
                    1,
                    ConditionType::Regex,
                    Column::Description,
                    r"^(rewe|edeka|aldi)\b",
                ),
                Condition::amount_range(2, None, Some(Decimal::ZERO)),
            ],
        )
        .with_logic("1 AND 2")
        .with_priority(5),
        Rule::new(
            "salary",
            "Salary",
            "income",
            vec![
                Condition::contains(1, Column::Description, "gehalt"),
                Condition::contains(2, Column::Description, "lohn"),
            ],
        )
        .with_logic("1 ODER 2")
        .with_priority(8),
        Rule::new(
            "savings-only",
            "Savings interest",
            "interest",
            vec![Condition::contains(1, Column::Description, "zins")],
        )
        .with_accounts(["savings"]),
    ]
}

fn cases() -> Vec<(TransactionSnapshot, &'static str, Option<&'static str>)> {
    vec![
        (TransactionSnapshot::new("REWE Markt 123", Decimal::new(-2350, 2)), "giro", Some("food")),
        (TransactionSnapshot::new("REWE Erstattung", Decimal::new(500, 2)), "giro", None),
        (TransactionSnapshot::new("Gehalt Mai", Decimal::new(300000, 2)), "giro", Some("income")),
        (TransactionSnapshot::new("Zinsen", Decimal::new(120, 2)), "giro", None),
        (TransactionSnapshot::new("Zinsen", Decimal::new(120, 2)), "savings", Some("interest")),
    ]
}

#[test]
fn test_concurrent_selection_is_deterministic() {
    let rules = Arc::new(rule_set());
    let cases = Arc::new(cases());
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let rules = Arc::clone(&rules);
            let cases = Arc::clone(&cases);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut mismatches = 0;
                for _ in 0..ITERATIONS_PER_THREAD {
                    for (snapshot, account, expected) in cases.iter() {
                        let selected = engine::select(snapshot, account, &rules);
                        if selected.as_deref() != *expected {
                            mismatches += 1;
                        }
                    }
                }
                mismatches
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }
}

#[test]
fn test_concurrent_reads_while_categorizing() {
    let temp_dir = TempDir::new().unwrap();
    let repo = Arc::new(DuckDbRepository::new(&temp_dir.path().join("test.duckdb")).unwrap());
    repo.run_migrations().unwrap();

    let rule_service = RuleService::new(repo.clone());
    for rule in rule_set() {
        rule_service.save_rule(rule).unwrap();
    }

    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    for i in 0..50 {
        let t = Transaction::new(
            Uuid::new_v4(),
            "giro",
            Decimal::new(-(i + 1) * 100, 2),
            format!("EDEKA Filiale {}", i),
            date,
        );
        repo.upsert_transaction(&t).unwrap();
    }

    let barrier = Arc::new(Barrier::new(THREAD_COUNT + 1));
    let readers: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let repo = repo.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let service = RuleService::new(repo);
                for _ in 0..20 {
                    let listing = service.get_enabled_rules().unwrap();
                    assert_eq!(listing.rules.len(), 3);
                    assert!(listing.invalid.is_empty());
                }
            })
        })
        .collect();

    barrier.wait();
    let result = CategorizeService::new(repo.clone(), CategorizeOptions::default())
        .apply_rules(None, false)
        .unwrap();

    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(result.transactions_categorized, 50);
    assert!(repo
        .get_transactions(&TransactionFilter::uncategorized())
        .unwrap()
        .is_empty());
}
