//! Integration tests for haushalt-core services
//!
//! All database operations run against a real DuckDB file in a temp dir.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use haushalt_core::adapters::duckdb::DuckDbRepository;
use haushalt_core::config::Config;
use haushalt_core::domain::{Column, Condition, ConditionType, Rule, Transaction};
use haushalt_core::ports::{Repository, TransactionFilter};
use haushalt_core::services::{CategorizeOptions, CategorizeService, RuleService};
use haushalt_core::HaushaltContext;

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbRepository> {
    let db_path = temp_dir.path().join("test.duckdb");
    let repo = DuckDbRepository::new(&db_path).expect("Failed to create repository");
    repo.run_migrations().expect("Failed to initialize schema");
    Arc::new(repo)
}

fn tx(account: &str, description: &str, cents: i64) -> Transaction {
    Transaction::new(
        Uuid::new_v4(),
        account,
        Decimal::new(cents, 2),
        description,
        NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
    )
}

fn rent_rule() -> Rule {
    Rule::new(
        "rent",
        "Monthly rent",
        "housing",
        vec![
            Condition::contains(1, Column::Description, "miete"),
            Condition::contains(2, Column::RecipientApplicant, "hausverwaltung"),
            Condition::amount_range(3, Some(Decimal::new(-1200, 0)), Some(Decimal::new(-800, 0))),
        ],
    )
    .with_logic("(1 OR 2) AND 3")
    .with_priority(10)
}

// ============================================================================
// Categorization Runs
// ============================================================================

#[test]
fn test_categorize_run_against_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let rules = RuleService::new(repo.clone());

    rules.save_rule(rent_rule()).unwrap();
    rules
        .save_rule(
            Rule::new(
                "fallback-transfer",
                "Transfers",
                "transfers",
                vec![Condition::text(
                    1,
                    ConditionType::StartsWith,
                    Column::Description,
                    "überweisung",
                )],
            )
            .with_priority(1),
        )
        .unwrap();

    let rent = tx("giro", "Überweisung", -95000).with_recipient("Hausverwaltung Schmidt GmbH");
    let too_big = tx("giro", "Miete + Nebenkosten", -150000);
    let transfer = tx("giro", "Überweisung an Anna", -2000);
    for t in [&rent, &too_big, &transfer] {
        repo.upsert_transaction(t).unwrap();
    }

    let service = CategorizeService::new(repo.clone(), CategorizeOptions::default());
    let result = service.apply_rules(None, false).unwrap();

    assert_eq!(result.transactions_evaluated, 3);
    assert_eq!(result.transactions_categorized, 2);
    assert_eq!(result.still_uncategorized, 1);

    let stored_rent = repo.get_transaction_by_id(&rent.id).unwrap().unwrap();
    assert_eq!(stored_rent.category.as_deref(), Some("housing"));
    assert_eq!(stored_rent.category_rule_id.as_deref(), Some("rent"));

    let stored_transfer = repo.get_transaction_by_id(&transfer.id).unwrap().unwrap();
    assert_eq!(stored_transfer.category.as_deref(), Some("transfers"));

    let backlog = repo.get_transactions(&TransactionFilter::uncategorized()).unwrap();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].id, too_big.id);
    assert_eq!(backlog[0].amount, Decimal::new(-150000, 2));
}

#[test]
fn test_equal_priority_follows_storage_order() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let rules = RuleService::new(repo.clone());

    let make = |id: &str, category: &str| {
        Rule::new(id, id, category, vec![Condition::contains(1, Column::Description, "shop")])
    };
    rules.save_rule(make("z-first", "first")).unwrap();
    rules.save_rule(make("a-second", "second")).unwrap();
    // Editing the first rule must not move it behind the second
    rules.save_rule(make("z-first", "first").with_logic("1")).unwrap();

    let t = tx("giro", "Online Shop", -1000);
    repo.upsert_transaction(&t).unwrap();

    CategorizeService::new(repo.clone(), CategorizeOptions::default())
        .apply_rules(None, false)
        .unwrap();

    let stored = repo.get_transaction_by_id(&t.id).unwrap().unwrap();
    assert_eq!(stored.category.as_deref(), Some("first"));
}

#[test]
fn test_broken_logic_rule_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);

    // Written directly: the service would refuse to store this rule
    repo.put_setting(
        "category_rule.broken",
        r#"{"id": "broken", "category": "x", "priority": 99, "conditionLogic": "1 AND",
            "conditions": [
                {"id": 1, "type": "contains", "columnName": "description", "value": "a"}
            ]}"#,
    )
    .unwrap();
    RuleService::new(repo.clone()).save_rule(rent_rule()).unwrap();

    let t = tx("giro", "Miete April", -90000);
    repo.upsert_transaction(&t).unwrap();

    let result = CategorizeService::new(repo.clone(), CategorizeOptions::default())
        .apply_rules(None, false)
        .unwrap();

    assert_eq!(result.transactions_categorized, 1);
    assert_eq!(result.invalid_rules.len(), 1);
    assert_eq!(result.invalid_rules[0].key, "category_rule.broken");
}

#[test]
fn test_malformed_condition_does_not_disable_rule() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);

    repo.put_setting(
        "category_rule.rent",
        r#"{"id": "rent", "category": "housing", "conditions": [
            {"id": 1, "type": "contains", "columnName": "description", "value": "miete"},
            {"id": 2, "type": "amountRange", "columnName": "amount", "minAmount": "abc"}
        ]}"#,
    )
    .unwrap();

    let t = tx("giro", "Miete Mai", -90000);
    repo.upsert_transaction(&t).unwrap();

    let result = CategorizeService::new(repo.clone(), CategorizeOptions::default())
        .apply_rules(None, false)
        .unwrap();

    assert!(result.invalid_rules.is_empty());
    assert_eq!(result.transactions_categorized, 1);
    let stored = repo.get_transaction_by_id(&t.id).unwrap().unwrap();
    assert_eq!(stored.category.as_deref(), Some("housing"));
}

// ============================================================================
// Context
// ============================================================================

#[test]
fn test_context_reopen_keeps_rules_and_transactions() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("haushalt");

    let created_id = {
        let ctx = HaushaltContext::new(&data_dir).unwrap();
        ctx.rule_service.save_rule(rent_rule()).unwrap();
        let created = ctx
            .transaction_service
            .create(tx("giro", "Miete Mai", -100000))
            .unwrap();
        assert_eq!(created.transaction.category.as_deref(), Some("housing"));
        created.transaction.id
    };

    let ctx = HaushaltContext::new(&data_dir).unwrap();
    assert_eq!(ctx.config, Config::default());
    assert_eq!(ctx.rule_service.list_rules().unwrap().rules.len(), 1);
    let stored = ctx.transaction_service.get(&created_id).unwrap().unwrap();
    assert_eq!(stored.category_rule_id.as_deref(), Some("rent"));
}

#[test]
fn test_context_respects_settings() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("settings.json"),
        r#"{"categorization": {"autoCategorize": false}}"#,
    )
    .unwrap();

    let ctx = HaushaltContext::new(temp_dir.path()).unwrap();
    ctx.rule_service.save_rule(rent_rule()).unwrap();
    let created = ctx
        .transaction_service
        .create(tx("giro", "Miete Mai", -100000))
        .unwrap();

    assert!(created.matched_rule.is_none());
    assert!(!created.transaction.is_categorized());
}

#[test]
fn test_create_rejects_amount_storage_would_round() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = HaushaltContext::new(temp_dir.path()).unwrap();
    ctx.rule_service.save_rule(rent_rule()).unwrap();

    let mut rounded = tx("giro", "Miete Mai", 0);
    rounded.amount = Decimal::new(-799996, 3);
    assert!(ctx.transaction_service.create(rounded).is_err());
    assert!(ctx.transaction_service.list(&TransactionFilter::all()).unwrap().is_empty());

    // The same amount at storage precision is categorized and stored unchanged
    let exact = ctx.transaction_service.create(tx("giro", "Miete Mai", -80000)).unwrap();
    assert_eq!(exact.transaction.category.as_deref(), Some("housing"));
    let stored = ctx.transaction_service.get(&exact.transaction.id).unwrap().unwrap();
    assert_eq!(stored.amount, Decimal::new(-80000, 2));
}
