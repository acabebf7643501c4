//! # Protocols
//!
//! Descriptors for the agent protocols the driver knows how to sequence, and
//! the [`Record`] type used to hold (possibly stale) copies of the agent's
//! exchange records.
//!
//! A descriptor names the webhook topic a protocol's records are posted to,
//! the field carrying the exchange id, and the protocol's states in the
//! order an exchange passes through them. Roles share one ordering: each
//! role visits an increasing subsequence of it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

/// Topic, id field and state ordering of one agent protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Protocol {
    /// Webhook topic records are posted to.
    pub topic: &'static str,

    /// Record field holding the exchange id.
    pub id_field: &'static str,

    /// Record field holding the state.
    pub state_field: &'static str,

    /// States in the order an exchange passes through them.
    pub states: &'static [&'static str],

    /// States from which an exchange cannot complete.
    pub failed: &'static [&'static str],
}

impl Protocol {
    /// Position of `state` in the protocol's ordering.
    #[must_use]
    pub fn rank(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| *s == state)
    }

    /// Whether `state` means the exchange has failed.
    #[must_use]
    pub fn is_failed(&self, state: &str) -> bool {
        self.failed.contains(&state)
    }
}

/// DID exchange connections (RFC 0023).
pub const CONNECTIONS: Protocol = Protocol {
    topic: "connections",
    id_field: "connection_id",
    state_field: "rfc23_state",
    states: &[
        "start",
        "invitation-sent",
        "invitation-received",
        "request-sent",
        "request-received",
        "response-sent",
        "response-received",
        "completed",
    ],
    failed: &["abandoned"],
};

/// Issue credential 1.0.
pub const ISSUE_CREDENTIAL_V1: Protocol = Protocol {
    topic: "issue_credential",
    id_field: "credential_exchange_id",
    state_field: "state",
    states: &[
        "proposal_sent",
        "proposal_received",
        "offer_sent",
        "offer_received",
        "request_sent",
        "request_received",
        "credential_issued",
        "credential_received",
        "credential_acked",
    ],
    failed: &["abandoned", "deleted", "credential_revoked"],
};

/// Issue credential 2.0.
pub const ISSUE_CREDENTIAL_V2: Protocol = Protocol {
    topic: "issue_credential_v2_0",
    id_field: "cred_ex_id",
    state_field: "state",
    states: &[
        "proposal-sent",
        "proposal-received",
        "offer-sent",
        "offer-received",
        "request-sent",
        "request-received",
        "credential-issued",
        "credential-received",
        "done",
    ],
    failed: &["abandoned", "deleted", "credential-revoked"],
};

/// Present proof 2.0.
pub const PRESENT_PROOF_V2: Protocol = Protocol {
    topic: "present_proof_v2_0",
    id_field: "pres_ex_id",
    state_field: "state",
    states: &[
        "proposal-sent",
        "proposal-received",
        "request-sent",
        "request-received",
        "presentation-sent",
        "presentation-received",
        "done",
    ],
    failed: &["abandoned", "deleted"],
};

/// A copy of an agent-owned record, as returned by the admin API or carried
/// by a notification.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::InvalidResponse(format!("expected a record, got {other}"))),
        }
    }

    /// Field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field value.
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Whether the record carries a non-null `key`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    /// String field value, required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the field is missing or not a
    /// string.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.str(key).ok_or_else(|| Error::InvalidResponse(format!("record has no `{key}`")))
    }

    /// Exchange id according to `protocol`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if the id field is missing.
    pub fn id(&self, protocol: &Protocol) -> Result<&str> {
        self.require(protocol.id_field)
    }

    /// State according to `protocol`.
    #[must_use]
    pub fn state(&self, protocol: &Protocol) -> Option<&str> {
        self.str(protocol.state_field)
    }

    /// The `verified` field of a presentation record (`"true"` or `"false"`).
    #[must_use]
    pub fn verified(&self) -> Option<&str> {
        self.str("verified")
    }

    /// Summary of a presentation exchange record for logs and reports.
    #[must_use]
    pub fn summary(&self) -> Value {
        let field = |key: &str| self.get(key).cloned().unwrap_or(Value::Null);
        json!({
            "state": field("state"),
            "verified": field("verified"),
            "role": field("role"),
            "connection_id": field("connection_id"),
            "pres_request": field("pres_request"),
            "pres": field("pres"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered() {
        let issuer = ["offer-sent", "request-received", "credential-issued", "done"];
        let ranks: Vec<_> = issuer.iter().map(|s| ISSUE_CREDENTIAL_V2.rank(s).unwrap()).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));

        let holder = ["request-received", "presentation-sent", "done"];
        let ranks: Vec<_> = holder.iter().map(|s| PRESENT_PROOF_V2.rank(s).unwrap()).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));

        assert!(ISSUE_CREDENTIAL_V2.is_failed("abandoned"));
        assert_eq!(ISSUE_CREDENTIAL_V2.rank("abandoned"), None);
    }

    #[test]
    fn record_fields() {
        let record = Record::from_value(json!({
            "cred_ex_id": "abc",
            "state": "done",
            "by_format": null,
        }))
        .unwrap();

        assert_eq!(record.id(&ISSUE_CREDENTIAL_V2).unwrap(), "abc");
        assert_eq!(record.state(&ISSUE_CREDENTIAL_V2), Some("done"));
        assert!(!record.has("by_format"));
        assert!(record.id(&PRESENT_PROOF_V2).is_err());
    }

    #[test]
    fn record_must_be_object() {
        assert!(Record::from_value(json!(["done"])).is_err());
    }

    #[test]
    fn summary_keeps_presentation_fields() {
        let record = Record::from_value(json!({
            "pres_ex_id": "p1",
            "state": "done",
            "verified": "true",
            "role": "verifier",
            "thread_id": "t1",
        }))
        .unwrap();

        let summary = record.summary();
        assert_eq!(summary["verified"], "true");
        assert_eq!(summary["role"], "verifier");
        assert_eq!(summary["pres"], Value::Null);
        assert!(summary.get("thread_id").is_none());
    }
}
