//! Integration tests for the anonymization engine
//!
//! These tests verify that:
//! - Field matrices resolve into the expected trees
//! - Anonymization is idempotent and selective
//! - Reversible fields round-trip across relations, reverse generic ones included
//! - Irreversible fields block deanonymization without touching any record

mod common;

use common::{record, rref, Fixture};
use custodian::adapters::store::{LedgerStore, RecordStore};
use custodian::anonymization::{FieldMatrix, FieldSpec, LocalFields};
use custodian::domain::CustodianError;
use serde_json::json;
use std::collections::BTreeSet;

fn names(fields: &[&str]) -> LocalFields {
    LocalFields::Named(fields.iter().map(|f| f.to_string()).collect::<BTreeSet<_>>())
}

#[tokio::test]
async fn test_resolve_local_only_matrix() {
    let fixture = Fixture::new().await;
    let matrix = FieldMatrix::fields(["first_name", "last_name"]);

    let spec = fixture.engine.resolve(&rref("customer:1"), Some(&matrix)).unwrap();

    assert_eq!(spec.local, names(&["first_name", "last_name"]));
    assert!(spec.related.is_empty());
}

#[tokio::test]
async fn test_resolve_multilevel_matrix() {
    let fixture = Fixture::new().await;
    let matrix: FieldMatrix =
        serde_json::from_value(json!([["accounts", ["number", "owner", ["payments", ["value", "date"]]]]]))
            .unwrap();

    let spec = fixture.engine.resolve(&rref("customer:1"), Some(&matrix)).unwrap();

    let accounts = &spec.related["accounts"];
    assert_eq!(accounts.local, names(&["number", "owner"]));
    assert_eq!(accounts.related["payments"].local, names(&["value", "date"]));
    assert_eq!(spec.local, names(&[]));
}

#[tokio::test]
async fn test_bare_relation_name_means_whole_relation() {
    let fixture = Fixture::new().await;
    let matrix = FieldMatrix::fields(["notes"]);

    let spec = fixture.engine.resolve(&rref("customer:1"), Some(&matrix)).unwrap();

    assert_eq!(spec.related["notes"].local, LocalFields::All);
}

#[tokio::test]
async fn test_unknown_relation_is_configuration_error() {
    let fixture = Fixture::new().await;
    let matrix = FieldMatrix::fields(["first_name"]).with_relation("orders", FieldMatrix::all());

    let result = fixture.engine.resolve(&rref("customer:1"), Some(&matrix));

    assert!(matches!(result, Err(CustodianError::Configuration(msg)) if msg.contains("orders")));
}

#[tokio::test]
async fn test_wildcard_expands_to_declared_fields_only() {
    let fixture = Fixture::new().await;
    let context = fixture.context("wildcard");

    fixture
        .engine
        .anonymize_all(&rref("customer:1"), &context)
        .await
        .unwrap();

    let entries = fixture.store.entries_for(&rref("customer:1")).await.unwrap();
    let scrubbed: BTreeSet<_> = entries.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(
        scrubbed,
        BTreeSet::from([
            "birth_date",
            "first_name",
            "last_login_ip",
            "last_name",
            "personal_id",
            "primary_email_address",
        ])
    );
    // Foreign keys are not personal data
    assert_eq!(fixture.value("customer:1", "address_id").await, json!("1"));
}

#[tokio::test]
async fn test_selective_matrix_changes_only_named_field() {
    let fixture = Fixture::new().await;
    let matrix = FieldMatrix::fields(["first_name"]);

    fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &fixture.context("selective"))
        .await
        .unwrap();

    assert_ne!(fixture.value("customer:1", "first_name").await, json!("Ada"));
    assert_eq!(fixture.value("customer:1", "last_name").await, json!("Lovelace"));

    let last_name_row = fixture
        .store
        .active_entry(&rref("customer:1"), "last_name")
        .await
        .unwrap();
    assert!(last_name_row.is_none());
}

#[tokio::test]
async fn test_anonymize_twice_is_noop() {
    let fixture = Fixture::new().await;
    let first = FieldMatrix::fields(["first_name", "last_name"]);
    let overlapping = FieldMatrix::fields(["last_name"]);

    fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&first), &fixture.context("one"))
        .await
        .unwrap();
    let first_name = fixture.value("customer:1", "first_name").await;
    let last_name = fixture.value("customer:1", "last_name").await;

    let outcome = fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&overlapping), &fixture.context("two"))
        .await
        .unwrap();

    assert!(!outcome.changed_anything());
    assert_eq!(fixture.value("customer:1", "first_name").await, first_name);
    assert_eq!(fixture.value("customer:1", "last_name").await, last_name);

    let entries = fixture.store.entries_for(&rref("customer:1")).await.unwrap();
    assert_eq!(entries.iter().filter(|e| e.is_active).count(), 2);
}

#[tokio::test]
async fn test_round_trip_across_relations() {
    let fixture = Fixture::new().await;
    let matrix: FieldMatrix = serde_json::from_value(json!([
        "first_name",
        "primary_email_address",
        "birth_date",
        "last_login_ip",
        "address",
        ["accounts", ["number", "owner", ["payments", ["value", "date"]]]]
    ]))
    .unwrap();
    let context = fixture.context("round-trip");

    let outcome = fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();
    // customer, address, two accounts, two payments
    assert_eq!(outcome.records_visited, 6);

    assert_ne!(fixture.value("account:2", "owner").await, json!("A. Lovelace"));
    let email = fixture.value("customer:1", "primary_email_address").await;
    assert!(email.as_str().unwrap().ends_with(".com"));

    fixture
        .engine
        .deanonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();

    assert_eq!(fixture.value("customer:1", "first_name").await, json!("Ada"));
    assert_eq!(
        fixture.value("customer:1", "primary_email_address").await,
        json!("ada@example.com")
    );
    assert_eq!(fixture.value("customer:1", "birth_date").await, json!("1815-12-10"));
    assert_eq!(fixture.value("customer:1", "last_login_ip").await, json!("192.168.1.20"));
    assert_eq!(fixture.value("address:1", "zip").await, json!("SW1Y 4JH"));
    assert_eq!(fixture.value("account:1", "number").await, json!("GB29NWBK60161331926819"));
    assert_eq!(fixture.value("payment:1", "value").await, json!("120.50"));
    assert_eq!(fixture.value("payment:2", "date").await, json!("2024-02-01"));

    for reference in ["customer:1", "account:1", "payment:2"] {
        let entries = fixture.store.entries_for(&rref(reference)).await.unwrap();
        assert!(!entries.is_empty());
        assert!(entries.iter().all(|e| !e.is_active), "{reference} still marked");
    }
}

#[tokio::test]
async fn test_reverse_generic_relation_is_discovered() {
    let fixture = Fixture::new().await;
    let matrix = FieldMatrix::fields(["first_name"]).with_relation("notes", FieldMatrix::all());
    let context = fixture.context("notes");

    fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();

    assert_ne!(fixture.value("note:1", "text").await, json!("Prefers phone contact"));
    // Attached to an account, not to the customer
    assert_eq!(fixture.value("note:2", "text").await, json!("Overdraft approved"));

    fixture
        .engine
        .deanonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();
    assert_eq!(fixture.value("note:1", "text").await, json!("Prefers phone contact"));
}

#[tokio::test]
async fn test_irreversible_anonymizer_blocks_deanonymize() {
    let fixture = Fixture::new().await;
    let context = fixture.context("support");

    fixture
        .engine
        .anonymize_all(&rref("contact_form:1"), &context)
        .await
        .unwrap();
    let scrubbed_email = fixture.value("contact_form:1", "email").await;
    assert_ne!(scrubbed_email, json!("ada@example.com"));

    let err = fixture
        .engine
        .deanonymize_all(&rref("contact_form:1"), &context)
        .await
        .unwrap_err();

    assert!(matches!(err, CustodianError::IrreversibleAnonymizer { .. }));
    assert_eq!(fixture.value("contact_form:1", "email").await, scrubbed_email);
    let entries = fixture.store.entries_for(&rref("contact_form:1")).await.unwrap();
    assert!(entries.iter().all(|e| e.is_active));
}

#[tokio::test]
async fn test_irreversible_nested_field_leaves_parent_untouched() {
    let fixture = Fixture::new().await;
    let context = fixture.context("mixed");
    let matrix = FieldMatrix::fields(["first_name", "personal_id"]);

    fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();
    let scrubbed_name = fixture.value("customer:1", "first_name").await;

    let result = fixture
        .engine
        .deanonymize(&rref("customer:1"), Some(&matrix), &context)
        .await;

    assert!(matches!(
        result,
        Err(CustodianError::IrreversibleAnonymizer { ref field, .. }) if field == "personal_id"
    ));
    assert_eq!(fixture.value("customer:1", "first_name").await, scrubbed_name);
}

#[tokio::test]
async fn test_same_context_is_deterministic_and_salts_differ() {
    let first = Fixture::new().await;
    let second = Fixture::new().await;
    let third = Fixture::new().await;
    let matrix = FieldMatrix::fields(["last_name"]);

    for (fixture, salt) in [(&first, "consent-a"), (&second, "consent-a"), (&third, "consent-b")] {
        fixture
            .engine
            .anonymize(&rref("customer:1"), Some(&matrix), &fixture.context(salt))
            .await
            .unwrap();
    }

    let a = first.value("customer:1", "last_name").await;
    assert_eq!(a, second.value("customer:1", "last_name").await);
    assert_ne!(a, third.value("customer:1", "last_name").await);
}

#[tokio::test]
async fn test_dangling_forward_reference_is_not_found() {
    let fixture = Fixture::new().await;
    fixture.store.remove_record(&rref("address:1")).await;
    let matrix = FieldMatrix::fields(["first_name", "address"]);

    let err = fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &fixture.context("x"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    // Planning failed, nothing was written
    assert_eq!(fixture.value("customer:1", "first_name").await, json!("Ada"));
}

#[tokio::test]
async fn test_malformed_value_aborts_before_any_write() {
    let fixture = Fixture::new().await;
    fixture
        .store
        .insert_record(common::record(
            "payment:2",
            json!({"account_id": "2", "value": "not a number", "date": "2024-02-01"}),
        ))
        .await;
    let matrix: FieldMatrix =
        serde_json::from_value(json!(["first_name", ["accounts", [["payments", ["value"]]]]])).unwrap();

    let result = fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &fixture.context("x"))
        .await;

    assert!(matches!(result, Err(CustodianError::Encryption(msg)) if msg.contains("payment:2")));
    assert_eq!(fixture.value("customer:1", "first_name").await, json!("Ada"));
    assert_eq!(fixture.value("payment:1", "value").await, json!("120.50"));
    assert!(fixture
        .store
        .entries_for(&rref("customer:1"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_null_and_missing_fields() {
    let fixture = Fixture::new().await;
    fixture
        .store
        .insert_record(common::record("customer:2", json!({"first_name": null})))
        .await;
    let context = fixture.context("sparse");

    fixture
        .engine
        .anonymize_all(&rref("customer:2"), &context)
        .await
        .unwrap();

    assert_eq!(fixture.value("customer:2", "first_name").await, json!(null));
    assert_eq!(fixture.value("customer:2", "last_name").await, json!(null));
}

#[tokio::test]
async fn test_spec_tree_equality_after_resolution() {
    let fixture = Fixture::new().await;
    let spec = fixture.engine.resolve(&rref("customer:1"), None).unwrap();
    assert_eq!(spec, FieldSpec::all(common::record_type("customer")));
}

#[tokio::test]
async fn test_generated_people_round_trip() {
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::{FirstName, LastName};
    use fake::Fake;

    let fixture = Fixture::empty();
    let matrix = FieldMatrix::fields(["first_name", "last_name", "primary_email_address"]);

    for id in 0..25 {
        let first_name: String = FirstName().fake();
        let last_name: String = LastName().fake();
        let email: String = SafeEmail().fake();
        let reference = format!("customer:{id}");
        fixture
            .store
            .insert_record(common::record(
                &reference,
                json!({"first_name": first_name, "last_name": last_name, "primary_email_address": email}),
            ))
            .await;

        let context = fixture.context(&format!("consent-{id}"));
        fixture
            .engine
            .anonymize(&rref(&reference), Some(&matrix), &context)
            .await
            .unwrap();
        fixture
            .engine
            .deanonymize(&rref(&reference), Some(&matrix), &context)
            .await
            .unwrap();

        assert_eq!(fixture.value(&reference, "first_name").await, json!(first_name));
        assert_eq!(fixture.value(&reference, "last_name").await, json!(last_name));
        assert_eq!(fixture.value(&reference, "primary_email_address").await, json!(email));
    }
}

#[tokio::test]
async fn test_wrong_context_is_refused() {
    let fixture = Fixture::new().await;
    let matrix = FieldMatrix::fields(["last_name"]);
    let right = fixture.context("right");

    fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &right)
        .await
        .unwrap();
    let scrubbed = fixture.value("customer:1", "last_name").await;

    let result = fixture
        .engine
        .deanonymize(&rref("customer:1"), Some(&matrix), &fixture.context("wrong"))
        .await;

    assert!(matches!(result, Err(CustodianError::Encryption(msg)) if msg.contains("last_name")));
    assert_eq!(fixture.value("customer:1", "last_name").await, scrubbed);
    assert!(fixture
        .store
        .active_entry(&rref("customer:1"), "last_name")
        .await
        .unwrap()
        .is_some());

    fixture
        .engine
        .deanonymize(&rref("customer:1"), Some(&matrix), &right)
        .await
        .unwrap();
    assert_eq!(fixture.value("customer:1", "last_name").await, json!("Lovelace"));
}

#[tokio::test]
async fn test_deleting_anonymizer_removes_related_record() {
    let fixture = Fixture::new().await;
    let matrix: FieldMatrix = serde_json::from_value(json!(["sessions"])).unwrap();
    let context = fixture.context("sessions");

    let outcome = fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();

    assert_eq!(outcome.records_visited, 2);
    assert_eq!(outcome.records_deleted, 1);
    assert_eq!(outcome.fields_changed, 0);
    assert!(fixture.store.get_record(&rref("session:1")).await.unwrap().is_none());
    assert!(fixture.store.entries_for(&rref("session:1")).await.unwrap().is_empty());
    // The parent is not touched by a relation-only matrix
    assert_eq!(fixture.value("customer:1", "first_name").await, json!("Ada"));

    let again = fixture
        .engine
        .anonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();
    assert_eq!(again.records_deleted, 0);
    assert!(!again.changed_anything());

    // Nothing left to restore
    let restored = fixture
        .engine
        .deanonymize(&rref("customer:1"), Some(&matrix), &context)
        .await
        .unwrap();
    assert!(!restored.changed_anything());
}

#[tokio::test]
async fn test_deleting_anonymizer_as_root() {
    let fixture = Fixture::new().await;

    let outcome = fixture
        .engine
        .anonymize_all(&rref("session:1"), &fixture.context("root"))
        .await
        .unwrap();

    assert_eq!(outcome.records_deleted, 1);
    assert!(fixture.store.get_record(&rref("session:1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_iban_keeps_its_shape() {
    let fixture = Fixture::new().await;
    let matrix = FieldMatrix::fields(["number"]);
    let context = fixture.context("iban");

    fixture
        .engine
        .anonymize(&rref("account:1"), Some(&matrix), &context)
        .await
        .unwrap();

    let scrubbed = fixture.value("account:1", "number").await;
    let scrubbed = scrubbed.as_str().unwrap();
    assert_ne!(scrubbed, "GB29NWBK60161331926819");
    assert_eq!(scrubbed.len(), 22);
    assert!(scrubbed.starts_with("GB29"));
    assert!(scrubbed[4..8].chars().all(|c| c.is_ascii_uppercase()));
    assert!(scrubbed[8..].chars().all(|c| c.is_ascii_digit()));

    fixture
        .engine
        .deanonymize(&rref("account:1"), Some(&matrix), &context)
        .await
        .unwrap();
    assert_eq!(fixture.value("account:1", "number").await, json!("GB29NWBK60161331926819"));
}

#[tokio::test]
async fn test_numbers_and_timestamps_restored_exactly() {
    let fixture = Fixture::new().await;
    let payments = [
        ("payment:3", json!(100.0), json!("2024-03-01T09:30:00.250+02:00")),
        ("payment:4", json!(42), json!("2024-03-01 09:30:00Z")),
        ("payment:5", json!("0.125"), json!("2024-02-29")),
    ];
    for (reference, value, date) in &payments {
        fixture
            .store
            .insert_record(record(reference, json!({"account_id": "1", "value": value, "date": date})))
            .await;
    }
    let context = fixture.context("exact");

    for (reference, value, date) in &payments {
        fixture
            .engine
            .anonymize_all(&rref(reference), &context)
            .await
            .unwrap();
        assert_ne!(fixture.value(reference, "value").await, *value);
        assert_ne!(fixture.value(reference, "date").await, *date);

        fixture
            .engine
            .deanonymize_all(&rref(reference), &context)
            .await
            .unwrap();
        assert_eq!(fixture.value(reference, "value").await, *value, "{reference}");
        assert_eq!(fixture.value(reference, "date").await, *date, "{reference}");
    }
    assert!(fixture.value("payment:3", "value").await.is_f64());
    assert!(fixture.value("payment:4", "value").await.is_u64());
}
