//! # Credential Issuance
//!
//! Issuer-side flows for issue credential 1.0 and 2.0. The holder is
//! expected to respond to offers on its own (auto-respond), so only the
//! issuer is driven.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Driver;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::notification::Filter;
use crate::protocol::{ISSUE_CREDENTIAL_V1, ISSUE_CREDENTIAL_V2, Record};
use crate::provider::Agent;

/// Detail format of an indy credential exchange.
pub const INDY: &str = "indy";

/// Detail format of a linked-data proof credential exchange.
pub const LD_PROOF: &str = "ld_proof";

/// Final state of an issue credential 2.0 exchange.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuedCredential {
    /// The exchange record, in its terminal state.
    pub record: Record,

    /// Format-specific detail record (`indy` or `ld_proof`).
    pub detail: Record,
}

impl Driver {
    /// Issue an indy credential using issue credential 2.0.
    ///
    /// ```text
    /// send-offer ─▶ request-received ─▶ issue ─▶ done ─▶ indy detail
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call or step.
    pub async fn issue_credential_v2<A: Agent>(
        &self, issuer: &Client<A>, connection_id: &str, cred_def_id: &str,
        attributes: &[(&str, &str)],
    ) -> Result<IssuedCredential> {
        let offer = issuer
            .post(
                "/issue-credential-2.0/send-offer",
                &json!({
                    "auto_issue": false,
                    "auto_remove": self.config.auto_remove,
                    "comment": self.config.comment,
                    "trace": false,
                    "connection_id": connection_id,
                    "filter": {"indy": {"cred_def_id": cred_def_id}},
                    "credential_preview": preview("issue-credential/2.0/credential-preview", attributes),
                }),
            )
            .await?;
        let cred_ex_id = Record::from_value(offer)?.id(&ISSUE_CREDENTIAL_V2)?.to_string();
        tracing::info!("{}: offered credential {cred_ex_id}", issuer.label());

        let mut exchange = self.track(
            issuer,
            ISSUE_CREDENTIAL_V2,
            Filter::any().with("cred_ex_id", cred_ex_id.as_str()),
        );
        exchange.reach("request-received").await?;

        issuer.post(&format!("/issue-credential-2.0/records/{cred_ex_id}/issue"), &json!({})).await?;
        let record = exchange.reach("done").await?;
        tracing::info!("{}: issued credential {cred_ex_id}", issuer.label());

        let detail = self.detail(issuer, &record, &cred_ex_id, INDY).await?;
        Ok(IssuedCredential { record, detail })
    }

    /// Issue an indy credential using issue credential 1.0.
    ///
    /// ```text
    /// send-offer ─▶ request_received ─▶ issue ─▶ credential_acked
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call or step.
    pub async fn issue_credential_v1<A: Agent>(
        &self, issuer: &Client<A>, connection_id: &str, cred_def_id: &str,
        attributes: &[(&str, &str)],
    ) -> Result<Record> {
        let offer = issuer
            .post(
                "/issue-credential/send-offer",
                &json!({
                    "auto_issue": false,
                    "auto_remove": self.config.auto_remove,
                    "comment": self.config.comment,
                    "trace": false,
                    "connection_id": connection_id,
                    "cred_def_id": cred_def_id,
                    "credential_preview": preview("issue-credential/1.0/credential-preview", attributes),
                }),
            )
            .await?;
        let cred_ex_id = Record::from_value(offer)?.id(&ISSUE_CREDENTIAL_V1)?.to_string();
        tracing::info!("{}: offered credential {cred_ex_id}", issuer.label());

        let mut exchange = self.track(
            issuer,
            ISSUE_CREDENTIAL_V1,
            Filter::any().with("credential_exchange_id", cred_ex_id.as_str()),
        );
        exchange.reach("request_received").await?;

        issuer.post(&format!("/issue-credential/records/{cred_ex_id}/issue"), &json!({})).await?;
        let record = exchange.reach("credential_acked").await?;

        tracing::info!("{}: issued credential {cred_ex_id}", issuer.label());
        Ok(record)
    }

    /// Issue a JSON-LD credential using issue credential 2.0.
    ///
    /// The offer, request and issue steps are left to the agents; the driver
    /// waits for the exchange to complete.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call or step.
    pub async fn issue_ld_credential<A: Agent>(
        &self, issuer: &Client<A>, connection_id: &str, credential: &Value, options: &Value,
    ) -> Result<IssuedCredential> {
        let sent = issuer
            .post(
                "/issue-credential-2.0/send",
                &json!({
                    "auto_remove": self.config.auto_remove,
                    "comment": self.config.comment,
                    "trace": false,
                    "connection_id": connection_id,
                    "filter": {"ld_proof": {"credential": credential, "options": options}},
                }),
            )
            .await?;
        let cred_ex_id = Record::from_value(sent)?.id(&ISSUE_CREDENTIAL_V2)?.to_string();
        tracing::info!("{}: sent JSON-LD credential {cred_ex_id}", issuer.label());

        let record = self
            .track(issuer, ISSUE_CREDENTIAL_V2, Filter::any().with("cred_ex_id", cred_ex_id.as_str()))
            .reach("done")
            .await?;

        let detail = self.detail(issuer, &record, &cred_ex_id, LD_PROOF).await?;
        Ok(IssuedCredential { record, detail })
    }

    // The format detail record comes embedded in the exchange record, as its
    // own `issue_credential_v2_0_{format}` notification, or by fetching the
    // exchange. A record removed at `done` can only be seen through its
    // notification, so that is waited for; otherwise only an already
    // received one is used.
    async fn detail<A: Agent>(
        &self, issuer: &Client<A>, record: &Record, cred_ex_id: &str, format: &str,
    ) -> Result<Record> {
        if let Some(detail) = record.get(format).filter(|d| d.is_object()) {
            return Record::from_value(detail.clone());
        }

        let topic = format!("{}_{format}", ISSUE_CREDENTIAL_V2.topic);
        let wait = if self.config.auto_remove { self.config.timeout } else { Duration::ZERO };
        match issuer
            .await_notification(&topic, Filter::any().with("cred_ex_id", cred_ex_id), wait)
            .await
        {
            Ok(notification) => return Record::from_value(notification.payload),
            Err(Error::Timeout { .. }) if !self.config.auto_remove => {}
            Err(e) => return Err(e),
        }

        tracing::debug!("{}: fetching {format} detail for {cred_ex_id}", issuer.label());
        let mut fetched = issuer.get(&format!("/issue-credential-2.0/records/{cred_ex_id}")).await?;
        match fetched.get_mut(format).map(Value::take) {
            Some(detail @ Value::Object(_)) => Record::from_value(detail),
            _ => Err(Error::InvalidResponse(format!("exchange {cred_ex_id} has no {format} detail"))),
        }
    }
}

fn preview(type_: &str, attributes: &[(&str, &str)]) -> Value {
    let attributes: Vec<Value> =
        attributes.iter().map(|(name, value)| json!({"name": name, "value": value})).collect();
    json!({"@type": type_, "attributes": attributes})
}
