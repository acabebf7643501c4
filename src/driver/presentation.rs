//! # Proof Presentation
//!
//! Present proof 2.0 between a holder and a verifier, driving both sides:
//!
//! ```text
//! verifier: send-request ──────────────────────────▶ presentation-received ─▶ verify ─▶ done
//! holder:             request-received ─▶ send-presentation ─▶ presentation-sent ────▶ done
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::Driver;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::notification::Filter;
use crate::protocol::{PRESENT_PROOF_V2, Record};
use crate::provider::Agent;

/// Final records of a presentation exchange.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Presentation {
    /// The holder's exchange record.
    pub holder: Record,

    /// The verifier's exchange record. Carries the verification result in
    /// `verified`.
    pub verifier: Record,
}

impl Presentation {
    /// Whether the verifier accepted the presentation.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.verifier.verified() == Some("true")
    }
}

/// An indy proof request.
#[derive(Clone, Debug, Default)]
pub struct IndyProofRequest {
    /// Attributes to reveal, e.g. `{"name": "firstname"}`.
    pub requested_attributes: Vec<Value>,

    /// Predicates to prove, e.g. `{"name": "age", "p_type": ">=", "p_value": 18}`.
    pub requested_predicates: Vec<Value>,

    /// Non-revocation interval, e.g. `{"to": 1700000000}`.
    pub non_revoked: Option<Value>,
}

impl IndyProofRequest {
    /// Request that each named attribute be revealed.
    #[must_use]
    pub fn attributes(names: &[&str]) -> Self {
        Self {
            requested_attributes: names.iter().map(|name| json!({"name": name})).collect(),
            ..Self::default()
        }
    }

    fn to_request(&self) -> Value {
        let referents = |items: &[Value]| -> Map<String, Value> {
            items.iter().map(|item| (Uuid::new_v4().to_string(), item.clone())).collect()
        };
        let mut request = json!({
            "name": "proof",
            "version": "0.1.0",
            "nonce": nonce(),
            "requested_attributes": referents(&self.requested_attributes),
            "requested_predicates": referents(&self.requested_predicates),
        });
        if let Some(non_revoked) = &self.non_revoked {
            request["non_revoked"] = non_revoked.clone();
        }
        request
    }
}

impl Driver {
    /// Present an indy proof from `holder` to `verifier` over their
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call or step, or
    /// [`Error::ProtocolViolation`] if the holder has no credential for a
    /// requested referent.
    pub async fn present_proof_v2<H: Agent, V: Agent>(
        &self, holder: &Client<H>, verifier: &Client<V>, holder_connection_id: &str,
        verifier_connection_id: &str, request: &IndyProofRequest,
    ) -> Result<Presentation> {
        let presentation_request = json!({"indy": request.to_request()});
        self.present(
            holder,
            verifier,
            holder_connection_id,
            verifier_connection_id,
            presentation_request,
            Format::Indy,
        )
        .await
    }

    /// Present a JSON-LD proof satisfying a DIF presentation definition from
    /// `holder` to `verifier`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call or step.
    pub async fn present_ld_proof<H: Agent, V: Agent>(
        &self, holder: &Client<H>, verifier: &Client<V>, holder_connection_id: &str,
        verifier_connection_id: &str, presentation_definition: &Value, domain: &str,
    ) -> Result<Presentation> {
        let presentation_request = json!({
            "dif": {
                "presentation_definition": presentation_definition,
                "options": {
                    "challenge": Uuid::new_v4().to_string(),
                    "domain": domain,
                },
            },
        });
        self.present(
            holder,
            verifier,
            holder_connection_id,
            verifier_connection_id,
            presentation_request,
            Format::Dif,
        )
        .await
    }

    async fn present<H: Agent, V: Agent>(
        &self, holder: &Client<H>, verifier: &Client<V>, holder_connection_id: &str,
        verifier_connection_id: &str, presentation_request: Value, format: Format,
    ) -> Result<Presentation> {
        let sent = verifier
            .post(
                "/present-proof-2.0/send-request",
                &json!({
                    "auto_verify": false,
                    "auto_remove": self.config.auto_remove,
                    "comment": self.config.comment,
                    "trace": false,
                    "connection_id": verifier_connection_id,
                    "presentation_request": presentation_request,
                }),
            )
            .await?;
        let sent = Record::from_value(sent)?;
        let verifier_pres_ex_id = sent.id(&PRESENT_PROOF_V2)?.to_string();
        let thread_id = sent.require("thread_id")?.to_string();
        tracing::info!("{}: requested presentation {verifier_pres_ex_id}", verifier.label());

        // the holder's record has its own id; it is found by thread
        let mut holder_exchange = self.track(
            holder,
            PRESENT_PROOF_V2,
            Filter::any()
                .with("connection_id", holder_connection_id)
                .with("thread_id", thread_id.as_str()),
        );
        let received = holder_exchange.reach("request-received").await?;
        let holder_pres_ex_id = received.id(&PRESENT_PROOF_V2)?.to_string();
        let received = if received.has("by_format") {
            received
        } else {
            let path = format!("/present-proof-2.0/records/{holder_pres_ex_id}");
            Record::from_value(holder.get(&path).await?)?
        };

        let presentation = match format {
            Format::Indy => {
                let credentials = holder
                    .get(&format!("/present-proof-2.0/records/{holder_pres_ex_id}/credentials"))
                    .await?;
                let request = indy_request(&received)?;
                json!({"indy": select_credentials(request, &credentials)?})
            }
            Format::Dif => json!({"dif": {}}),
        };
        holder
            .post(
                &format!("/present-proof-2.0/records/{holder_pres_ex_id}/send-presentation"),
                &presentation,
            )
            .await?;
        holder_exchange.reach("presentation-sent").await?;

        let mut verifier_exchange = self.track(
            verifier,
            PRESENT_PROOF_V2,
            Filter::any().with("pres_ex_id", verifier_pres_ex_id.as_str()),
        );
        verifier_exchange.reach("presentation-received").await?;
        verifier
            .post(
                &format!("/present-proof-2.0/records/{verifier_pres_ex_id}/verify-presentation"),
                &json!({}),
            )
            .await?;
        let verifier_record = verifier_exchange.reach("done").await?;
        let holder_record = holder_exchange.reach("done").await?;

        tracing::info!(
            "{}: presentation {verifier_pres_ex_id} verified={}",
            verifier.label(),
            verifier_record.verified().unwrap_or("unknown")
        );
        Ok(Presentation {
            holder: holder_record,
            verifier: verifier_record,
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum Format {
    Indy,
    Dif,
}

// 80-bit decimal nonce.
fn nonce() -> String {
    (Uuid::new_v4().as_u128() >> 48).to_string()
}

// The indy proof request as seen by the holder: inline in `by_format`, or in
// the request attachment.
fn indy_request(record: &Record) -> Result<&Value> {
    record
        .get("by_format")
        .and_then(|f| f.get("pres_request"))
        .and_then(|r| r.get("indy"))
        .ok_or_else(|| Error::InvalidResponse("presentation record has no indy request".into()))
}

// Pick, for each referent in the request, the first credential the holder's
// agent lists as satisfying it.
fn select_credentials(request: &Value, credentials: &Value) -> Result<Value> {
    let credentials = credentials.as_array().map(Vec::as_slice).unwrap_or_default();
    let select = |referent: &str| -> Result<String> {
        credentials
            .iter()
            .find(|c| {
                c.get("presentation_referents")
                    .and_then(Value::as_array)
                    .is_some_and(|refs| refs.iter().any(|r| r == referent))
            })
            .and_then(|c| c.pointer("/cred_info/referent"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                Error::ProtocolViolation(format!("no credential satisfies referent {referent}"))
            })
    };

    let mut attributes = Map::new();
    if let Some(requested) = request.get("requested_attributes").and_then(Value::as_object) {
        for referent in requested.keys() {
            attributes.insert(referent.clone(), json!({"cred_id": select(referent)?, "revealed": true}));
        }
    }
    let mut predicates = Map::new();
    if let Some(requested) = request.get("requested_predicates").and_then(Value::as_object) {
        for referent in requested.keys() {
            predicates.insert(referent.clone(), json!({"cred_id": select(referent)?}));
        }
    }

    Ok(json!({
        "requested_attributes": attributes,
        "requested_predicates": predicates,
        "self_attested_attributes": {},
    }))
}
