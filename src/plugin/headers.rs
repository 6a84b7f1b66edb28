//! Success/failure header rules applied to the outgoing response.
//!
//! # Rule Table
//! ```text
//! mode      success          failure
//! replace   success_value    failure_value
//! notify    success_value    (untouched)
//! empty     (untouched)      failure_value
//! ```
//!
//! Rules run in configured order and only ever set or overwrite their own header.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::schema::{HeaderRule, HeaderRuleMode};

/// Apply every rule to `headers` for the given external call outcome.
pub fn apply_header_rules(rules: &[HeaderRule], headers: &mut HeaderMap, success: bool) {
    for rule in rules {
        let Some(value) = rule_value(rule, success) else {
            continue;
        };

        let name = match HeaderName::from_bytes(rule.name.as_bytes()) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(header = %rule.name, error = %e, "Skipping header rule with invalid name");
                continue;
            }
        };
        let value = match HeaderValue::from_str(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(header = %rule.name, error = %e, "Skipping header rule with invalid value");
                continue;
            }
        };

        headers.insert(name, value);
    }
}

fn rule_value(rule: &HeaderRule, success: bool) -> Option<&str> {
    match (rule.mode, success) {
        (HeaderRuleMode::Replace, true) | (HeaderRuleMode::Notify, true) => Some(&rule.success_value),
        (HeaderRuleMode::Replace, false) | (HeaderRuleMode::Empty, false) => Some(&rule.failure_value),
        (HeaderRuleMode::Notify, false) | (HeaderRuleMode::Empty, true) => None,
    }
}
