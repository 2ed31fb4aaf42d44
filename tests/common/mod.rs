//! Shared fixture for integration tests
//!
//! A customer with an address, two accounts (each with a payment), an attached
//! note, a login session that is deleted on anonymization and an irreversible
//! contact form, wired to the purposes below.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use custodian::adapters::memory::MemoryStore;
use custodian::adapters::store::RecordStore;
use custodian::anonymization::{AnonymizationEngine, AnonymizerRegistry, EncryptionContext};
use custodian::config::{parse_config, CustodianConfig, SecretString};
use custodian::core::consent::ConsentManager;
use custodian::core::purposes::PurposeRegistry;
use custodian::core::sweep::RetentionSweep;
use custodian::domain::ids::{PurposeSlug, RecordRef, RecordType};
use custodian::domain::record::Record;
use serde_json::{json, Value};
use std::sync::Arc;

pub const FIXTURE_CONFIG: &str = r#"
[encryption]
base_key = "test-organisation-secret"

[audit]
enabled = false

[logging]
local_enabled = false

[anonymizers.customer]
fields = { first_name = "text", last_name = "text", primary_email_address = "email", personal_id = "hash", birth_date = "date", last_login_ip = "ip_address" }

[anonymizers.customer.relations.address]
kind = "forward"
target = "address"
field = "address_id"

[anonymizers.customer.relations.accounts]
kind = "reverse"
target = "account"
field = "customer_id"

[anonymizers.customer.relations.notes]
kind = "reverse_generic"
target = "note"

[anonymizers.customer.relations.sessions]
kind = "reverse"
target = "session"
field = "customer_id"

[anonymizers.address]
fields = { street = "text", city = "text", zip = "text" }

[anonymizers.account]
fields = { number = "iban", owner = "text" }

[anonymizers.account.relations.payments]
kind = "reverse"
target = "payment"
field = "account_id"

[anonymizers.payment]
fields = { value = "decimal", date = "date" }

[anonymizers.contact_form]
reversible = false
fields = { email = "email", full_name = "text" }

[anonymizers.note]
fields = { text = "text" }

[anonymizers.session]
delete = true
fields = { user_agent = "text" }

[purposes.marketing]
name = "Marketing"
expiration = { months = 6 }
source_type = "customer"
fields = ["first_name", "last_name", "primary_email_address", ["notes", "__ALL__"]]

[purposes.newsletter]
name = "Newsletter"
expiration = { years = 1 }
source_type = "customer"
fields = ["primary_email_address"]

[purposes.billing]
name = "Billing"
expiration = { months = 6 }
source_type = "payment"
fields = ["value"]

[purposes.analytics]
name = "Analytics"
expiration = { days = 30 }
retains_data = false
source_type = "customer"
fields = ["last_login_ip"]

[purposes.tracking]
name = "Tracking"
expiration = { days = 14 }
source_type = "customer"
fields = ["sessions"]

[purposes.support]
name = "Support"
expiration = { days = 90 }
source_type = "contact_form"
"#;

/// Services wired over an in-memory store
pub struct Fixture {
    pub config: CustodianConfig,
    pub store: Arc<MemoryStore>,
    pub consents: ConsentManager,
    pub engine: Arc<AnonymizationEngine>,
}

impl Fixture {
    /// Builds the services and seeds the customer graph
    pub async fn new() -> Self {
        let fixture = Self::empty();
        fixture.seed().await;
        fixture
    }

    /// Builds the services over an empty store
    pub fn empty() -> Self {
        let config = parse_config(FIXTURE_CONFIG).unwrap();
        let purposes = Arc::new(PurposeRegistry::from_config(&config.purposes).unwrap());
        let anonymizers = Arc::new(AnonymizerRegistry::from_config(&config.anonymizers).unwrap());
        let store = Arc::new(MemoryStore::new());

        let consents = ConsentManager::new(purposes, store.clone(), store.clone());
        let engine = Arc::new(AnonymizationEngine::new(anonymizers, store.clone(), store.clone()));

        Self {
            config,
            store,
            consents,
            engine,
        }
    }

    async fn seed(&self) {
        let records = [
            record(
                "customer:1",
                json!({
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "primary_email_address": "ada@example.com",
                    "personal_id": "815210/1234",
                    "birth_date": "1815-12-10",
                    "last_login_ip": "192.168.1.20",
                    "address_id": "1",
                }),
            ),
            record(
                "address:1",
                json!({"street": "12 St James's Square", "city": "London", "zip": "SW1Y 4JH"}),
            ),
            record(
                "account:1",
                json!({"customer_id": "1", "number": "GB29NWBK60161331926819", "owner": "Ada Lovelace"}),
            ),
            record(
                "account:2",
                json!({"customer_id": "1", "number": "GB94BARC10201530093459", "owner": "A. Lovelace"}),
            ),
            record(
                "payment:1",
                json!({"account_id": "1", "value": "120.50", "date": "2024-01-15"}),
            ),
            record(
                "payment:2",
                json!({"account_id": "2", "value": "99.99", "date": "2024-02-01"}),
            ),
            record(
                "note:1",
                json!({"object_type": "customer", "object_id": "1", "text": "Prefers phone contact"}),
            ),
            record(
                "note:2",
                json!({"object_type": "account", "object_id": "1", "text": "Overdraft approved"}),
            ),
            record(
                "session:1",
                json!({"customer_id": "1", "user_agent": "Mozilla/5.0 (X11; Linux x86_64)"}),
            ),
            record(
                "contact_form:1",
                json!({"email": "ada@example.com", "full_name": "Ada Lovelace"}),
            ),
        ];
        for r in records {
            self.store.insert_record(r).await;
        }
    }

    pub fn base_key(&self) -> SecretString {
        self.config.encryption.base_key.clone()
    }

    /// Sweep with the fixture's base key
    pub fn sweep(&self) -> RetentionSweep {
        RetentionSweep::new(self.consents.clone(), self.engine.clone(), self.base_key())
    }

    /// Encryption context for direct engine calls
    pub fn context(&self, salt: &str) -> EncryptionContext {
        EncryptionContext::new(&self.base_key(), salt)
    }

    /// Current value of a field
    pub async fn value(&self, reference: &str, field: &str) -> Value {
        self.store
            .get_record(&rref(reference))
            .await
            .unwrap()
            .unwrap()
            .value_or_null(field)
    }
}

/// Parses a `type:id` reference
pub fn rref(reference: &str) -> RecordRef {
    reference.parse().unwrap()
}

pub fn slug(s: &str) -> PurposeSlug {
    PurposeSlug::new(s).unwrap()
}

pub fn record_type(s: &str) -> RecordType {
    RecordType::new(s).unwrap()
}

pub fn record(reference: &str, fields: Value) -> Record {
    let mut record = Record::new(rref(reference));
    if let Value::Object(map) = fields {
        for (name, value) in map {
            record = record.with_field(name, value);
        }
    }
    record
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}
