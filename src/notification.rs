//! # Notifications
//!
//! Agents push a notification to their webhook target whenever an exchange
//! record changes. A notification is the topic it was posted to plus the
//! record as it stood at that moment.
//!
//! Waiters select notifications with a [`Predicate`]. The usual predicate is
//! a [`Filter`]: a set of key/value constraints that must all hold on the
//! payload's top-level fields.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event delivered asynchronously by the agent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Notification {
    /// Webhook topic, e.g. `issue_credential_v2_0`.
    pub topic: String,

    /// Record payload.
    pub payload: Value,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Top-level string field of the payload.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// The `state` field of the payload.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.field("state")
    }
}

/// Selects the notifications a waiter is interested in.
pub trait Predicate: Send + 'static {
    /// Whether the payload satisfies the predicate.
    fn matches(&self, payload: &Value) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&Value) -> bool + Send + 'static,
{
    fn matches(&self, payload: &Value) -> bool {
        self(payload)
    }
}

/// Key/value constraints on a payload's top-level fields.
///
/// An empty filter matches any payload.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    /// A filter that matches every payload.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl Predicate for Filter {
    fn matches(&self, payload: &Value) -> bool {
        self.0.iter().all(|(key, expected)| payload.get(key) == Some(expected))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_requires_every_constraint() {
        let payload = json!({"cred_ex_id": "abc", "state": "done", "role": "issuer"});

        assert!(Filter::any().matches(&payload));
        assert!(Filter::any().with("cred_ex_id", "abc").matches(&payload));
        assert!(Filter::any().with("cred_ex_id", "abc").with("state", "done").matches(&payload));
        assert!(!Filter::any().with("cred_ex_id", "abc").with("state", "offer-sent").matches(&payload));
        assert!(!Filter::any().with("missing", "abc").matches(&payload));
    }

    #[test]
    fn filter_compares_json_values() {
        let payload = json!({"auto_issue": false, "verified": "true"});

        assert!(Filter::any().with("auto_issue", false).matches(&payload));
        assert!(!Filter::any().with("verified", true).matches(&payload));
        assert!(Filter::any().with("verified", "true").matches(&payload));
    }

    #[test]
    fn closure_predicate() {
        let has_indy = |payload: &Value| payload.get("indy").is_some();
        assert!(has_indy.matches(&json!({"indy": {}})));
        assert!(!has_indy.matches(&json!({"ld_proof": {}})));
    }
}
