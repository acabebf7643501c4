//! # Scenarios
//!
//! Each scenario connects alice (issuer, verifier) and bob (holder), issues
//! a credential to bob and has bob present it back to alice. A scenario
//! fails unless alice's final presentation record has `verified` = `"true"`.

use anyhow::ensure;
use credibil_exchange::driver::presentation::{IndyProofRequest, Presentation};
use credibil_exchange::http::HttpAgent;
use credibil_exchange::protocol::CONNECTIONS;
use credibil_exchange::{Client, Driver};
use serde_json::json;
use tracing::{Instrument, info_span};
use uuid::Uuid;

/// Issue credential protocol version.
#[derive(Clone, Copy, Debug)]
pub enum Issuance {
    V1,
    V2,
}

/// Issue an indy credential and present one of its attributes.
pub async fn anoncreds(
    driver: &Driver, alice: &Client<HttpAgent>, bob: &Client<HttpAgent>, ledger: &HttpAgent,
    issuance: Issuance,
) -> anyhow::Result<()> {
    let (alice_conn, bob_conn) =
        driver.didexchange(alice, bob).instrument(info_span!("connect")).await?;
    let alice_conn_id = alice_conn.id(&CONNECTIONS)?;
    let bob_conn_id = bob_conn.id(&CONNECTIONS)?;

    let artifacts = async {
        driver.onboard(alice, ledger).await?;
        let name = format!("minimal-{}", &Uuid::new_v4().simple().to_string()[..8]);
        driver.credential_artifacts(alice, &name, &["firstname", "lastname"], true).await
    }
    .instrument(info_span!("prepare issuance"))
    .await?;

    let attributes = [("firstname", "Bob"), ("lastname", "Builder")];
    async {
        match issuance {
            Issuance::V1 => {
                driver
                    .issue_credential_v1(alice, alice_conn_id, &artifacts.cred_def_id, &attributes)
                    .await?;
            }
            Issuance::V2 => {
                driver
                    .issue_credential_v2(alice, alice_conn_id, &artifacts.cred_def_id, &attributes)
                    .await?;
            }
        }
        anyhow::Ok(())
    }
    .instrument(info_span!("issue"))
    .await?;

    let presentation = driver
        .present_proof_v2(
            bob,
            alice,
            bob_conn_id,
            alice_conn_id,
            &IndyProofRequest::attributes(&["firstname"]),
        )
        .instrument(info_span!("present"))
        .await?;

    verified(&presentation)
}

/// Issue a JSON-LD credential and present it against a DIF presentation
/// definition.
pub async fn json_ld(
    driver: &Driver, alice: &Client<HttpAgent>, bob: &Client<HttpAgent>, ledger: &HttpAgent,
) -> anyhow::Result<()> {
    let (alice_conn, bob_conn) =
        driver.didexchange(alice, bob).instrument(info_span!("connect")).await?;
    let alice_conn_id = alice_conn.id(&CONNECTIONS)?;
    let bob_conn_id = bob_conn.id(&CONNECTIONS)?;

    let public_did = async {
        let public_did = driver.onboard(alice, ledger).await?;
        let bls_did = driver.create_did(alice, "key", "bls12381g2").await?;
        ensure!(!bls_did.did.is_empty(), "no BLS DID created");
        anyhow::Ok(public_did)
    }
    .instrument(info_span!("prepare issuance"))
    .await?;

    let credential = json!({
        "@context": [
            "https://www.w3.org/2018/credentials/v1",
            "https://w3id.org/citizenship/v1",
        ],
        "type": ["VerifiableCredential", "PermanentResident"],
        "issuer": format!("did:sov:{}", public_did.did),
        "issuanceDate": chrono::Utc::now().date_naive().to_string(),
        "credentialSubject": {
            "type": ["PermanentResident"],
            "givenName": "Bob",
            "familyName": "Builder",
            "gender": "Male",
            "birthCountry": "Bahamas",
            "birthDate": "1958-07-17",
        },
    });
    let options = json!({"proofType": "Ed25519Signature2018"});
    driver
        .issue_ld_credential(alice, alice_conn_id, &credential, &options)
        .instrument(info_span!("issue"))
        .await?;

    let field_id = "1f44d55f-f161-4938-a659-f8026467f126";
    let definition = json!({
        "id": Uuid::new_v4().to_string(),
        "format": {"ldp_vp": {"proof_type": ["Ed25519Signature2018"]}},
        "input_descriptors": [{
            "id": "citizenship_input_1",
            "name": "EU Driver's License",
            "schema": [
                {"uri": "https://www.w3.org/2018/credentials#VerifiableCredential"},
                {"uri": "https://w3id.org/citizenship#PermanentResident"},
            ],
            "constraints": {
                "is_holder": [{"directive": "required", "field_id": [field_id]}],
                "fields": [
                    {
                        "id": field_id,
                        "path": ["$.credentialSubject.familyName"],
                        "purpose": "The claim must be from one of the specified issuers",
                        "filter": {"const": "Builder"},
                    },
                    {
                        "path": ["$.credentialSubject.givenName"],
                        "purpose": "The claim must be from one of the specified issuers",
                    },
                ],
            },
        }],
    });
    let presentation = driver
        .present_ld_proof(bob, alice, bob_conn_id, alice_conn_id, &definition, "test-degree")
        .instrument(info_span!("present"))
        .await?;

    verified(&presentation)
}

fn verified(presentation: &Presentation) -> anyhow::Result<()> {
    tracing::info!("Summary: {:#}", presentation.verifier.summary());
    ensure!(
        presentation.verified(),
        "presentation not verified: verified = {:?}",
        presentation.verifier.verified()
    );
    Ok(())
}
