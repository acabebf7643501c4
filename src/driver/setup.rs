//! # Issuer Setup
//!
//! Synchronous preparation steps an issuer needs before it can offer indy
//! credentials: a public DID registered on the ledger, an accepted
//! transaction author agreement (TAA), a schema and a credential definition.
//! None of these wait on notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Driver;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::provider::{Agent, Method};

/// A DID held in an agent's wallet.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Did {
    /// The DID, without method prefix for `sov` DIDs.
    pub did: String,

    /// Verification key.
    pub verkey: String,

    /// DID method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Key type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
}

/// Identifiers of the ledger artifacts an issuer offers credentials against.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialArtifacts {
    /// Schema identifier.
    pub schema_id: String,

    /// Credential definition identifier.
    pub cred_def_id: String,
}

/// Preferred way of accepting a transaction author agreement.
pub const TAA_MECHANISM: &str = "on_file";

#[derive(Deserialize)]
struct DidResult {
    result: Option<Did>,
}

#[derive(Deserialize)]
struct TaaResult {
    #[serde(default)]
    result: TaaInfo,
}

#[derive(Default, Deserialize)]
struct TaaInfo {
    #[serde(default)]
    taa_required: bool,
    taa_accepted: Option<Value>,
    taa_record: Option<TaaRecord>,
    aml_record: Option<AmlRecord>,
}

#[derive(Deserialize)]
struct TaaRecord {
    text: String,
    version: String,
}

#[derive(Deserialize)]
struct AmlRecord {
    aml: BTreeMap<String, Value>,
}

impl Driver {
    /// Ensure `issuer` has a public DID.
    ///
    /// A fresh issuer gets a new `sov` DID, written to the ledger through
    /// `registrar` (the ledger's `/register` service) and then made public.
    /// Either way the ledger's transaction author agreement is accepted when
    /// the ledger requires it.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent or registrar call, or
    /// [`Error::InvalidResponse`] if the agent does not return a DID.
    pub async fn onboard<A: Agent, R: Agent>(
        &self, issuer: &Client<A>, registrar: &R,
    ) -> Result<Did> {
        let current: DidResult = issuer.get_as("/wallet/did/public").await?;
        if let Some(did) = current.result {
            tracing::info!("{}: public DID {}", issuer.label(), did.did);
            self.accept_taa(issuer).await?;
            return Ok(did);
        }

        let did = self.create_did(issuer, "sov", "ed25519").await?;
        register_nym(registrar, &did).await?;
        self.accept_taa(issuer).await?;

        let published: DidResult =
            issuer.post_as(&format!("/wallet/did/public?did={}", did.did), &json!({})).await?;
        let did = published.result.unwrap_or(did);

        tracing::info!("{}: published DID {}", issuer.label(), did.did);
        Ok(did)
    }

    /// Accept the ledger's transaction author agreement on behalf of
    /// `client`, if the ledger requires one and it has not been accepted.
    /// Returns whether an acceptance was sent.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call, or
    /// [`Error::InvalidResponse`] if a required agreement comes without its
    /// text or acceptance mechanisms.
    pub async fn accept_taa<A: Agent>(&self, client: &Client<A>) -> Result<bool> {
        let taa: TaaResult = client.get_as("/ledger/taa").await?;
        let taa = taa.result;
        if !taa.taa_required || taa.taa_accepted.as_ref().is_some_and(|a| !a.is_null()) {
            return Ok(false);
        }

        let record = taa
            .taa_record
            .ok_or_else(|| Error::InvalidResponse("required TAA has no record".into()))?;
        let mechanisms = taa.aml_record.map(|r| r.aml).unwrap_or_default();
        let mechanism = if mechanisms.contains_key(TAA_MECHANISM) {
            TAA_MECHANISM.to_string()
        } else {
            mechanisms
                .into_keys()
                .next()
                .ok_or_else(|| Error::InvalidResponse("ledger offers no TAA mechanism".into()))?
        };

        client
            .post(
                "/ledger/taa/accept",
                &json!({
                    "mechanism": mechanism,
                    "text": record.text,
                    "version": record.version,
                }),
            )
            .await?;
        tracing::info!("{}: accepted TAA {} ({mechanism})", client.label(), record.version);
        Ok(true)
    }

    /// Create a local DID with the given method and key type.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call, or
    /// [`Error::InvalidResponse`] if the agent does not return a DID.
    pub async fn create_did<A: Agent>(
        &self, client: &Client<A>, method: &str, key_type: &str,
    ) -> Result<Did> {
        let created: DidResult = client
            .post_as(
                "/wallet/did/create",
                &json!({"method": method, "options": {"key_type": key_type}}),
            )
            .await?;
        created.result.ok_or_else(|| Error::InvalidResponse("no DID created".into()))
    }

    /// Create a schema with `attributes` and a credential definition for it.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call, or
    /// [`Error::InvalidResponse`] if an identifier is missing from a
    /// response.
    pub async fn credential_artifacts<A: Agent>(
        &self, issuer: &Client<A>, name: &str, attributes: &[&str], support_revocation: bool,
    ) -> Result<CredentialArtifacts> {
        let schema = issuer
            .post(
                "/schemas",
                &json!({
                    "schema_name": name,
                    "schema_version": "1.0",
                    "attributes": attributes,
                }),
            )
            .await?;
        let schema_id = sent_id(&schema, "schema_id")?;

        let mut request = json!({
            "schema_id": schema_id,
            "support_revocation": support_revocation,
            "tag": "default",
        });
        if support_revocation {
            request["revocation_registry_size"] = json!(10);
        }
        let cred_def = issuer.post("/credential-definitions", &request).await?;
        let cred_def_id = sent_id(&cred_def, "credential_definition_id")?;

        tracing::info!("{}: credential definition {cred_def_id}", issuer.label());
        Ok(CredentialArtifacts {
            schema_id,
            cred_def_id,
        })
    }
}

// Write a new DID to the ledger as an endorser.
async fn register_nym<R: Agent>(registrar: &R, did: &Did) -> Result<()> {
    registrar
        .call(
            Method::POST,
            "/register",
            Some(&json!({
                "did": did.did,
                "verkey": did.verkey,
                "alias": null,
                "role": "ENDORSER",
            })),
        )
        .await?;
    tracing::info!("registered DID {} on the ledger", did.did);
    Ok(())
}

// Identifiers come back under `sent` when the agent writes to the ledger
// itself, and at the top level otherwise.
fn sent_id(response: &Value, key: &str) -> Result<String> {
    response
        .get("sent")
        .and_then(|sent| sent.get(key))
        .or_else(|| response.get(key))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| Error::InvalidResponse(format!("response has no `{key}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_id_locations() {
        let nested = json!({"sent": {"schema_id": "s1"}, "txn": null});
        assert_eq!(sent_id(&nested, "schema_id").unwrap(), "s1");

        let flat = json!({"schema_id": "s2"});
        assert_eq!(sent_id(&flat, "schema_id").unwrap(), "s2");

        assert!(sent_id(&json!({"txn": {}}), "schema_id").is_err());
    }
}
