//! Property-based tests for the sanitizer.

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::{PiiSanitizer, REDACTED};

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,20}",
        "[a-z]{1,8}@[a-z]{1,8}\\.(com|org|io)",
        "password=[a-z0-9]{1,10}",
        "\\d{3}-\\d{2}-\\d{4}",
        "\\d{4}-\\d{4}-\\d{4}-\\d{4}",
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        arb_text().prop_map(Value::String),
        any::<i64>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,10}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn sanitizing_twice_changes_nothing(value in arb_value()) {
        let sanitizer = PiiSanitizer::new();
        let once = sanitizer.sanitize_value(&value).unwrap();
        let twice = sanitizer.sanitize_value(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sensitive_keys_never_leak(secret in "[a-zA-Z0-9]{6,16}", key in "(password|db_token|client_secret|ssn)") {
        let sanitizer = PiiSanitizer::new();
        let input = json!({ (key.clone()): secret.clone(), "nested": [{ (key.clone()): secret.clone() }] });
        let clean = sanitizer.sanitize_value(&input).unwrap();

        prop_assert_eq!(&clean[&key], &json!(REDACTED));
        prop_assert_eq!(&clean["nested"][0][&key], &json!(REDACTED));
    }

    #[test]
    fn emails_never_survive(local in "[a-z]{1,10}", domain in "[a-z]{2,10}") {
        let email = format!("{local}@{domain}.com");
        let clean = PiiSanitizer::new().sanitize_string(&format!("contact {email} today"));
        prop_assert!(!clean.contains(&email));
    }
}
