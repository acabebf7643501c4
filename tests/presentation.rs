//! Tests for present proof 2.0 between a scripted holder and verifier.
mod provider;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use credibil_exchange::driver::presentation::IndyProofRequest;
use credibil_exchange::protocol::PRESENT_PROOF_V2;
use credibil_exchange::{Broker, Client, Driver, DriverConfig, Method};
use insta::assert_yaml_snapshot;
use serde_json::{Value, json};

use crate::provider::{Agent, notify};

const TOPIC: &str = "present_proof_v2_0";

fn driver() -> Driver {
    Driver::new(DriverConfig {
        timeout: Duration::from_secs(2),
        ..DriverConfig::default()
    })
}

struct Parties {
    holder: Agent,
    holder_broker: Broker,
    verifier: Agent,
    verifier_broker: Broker,
    embed_request: bool,
}

impl Parties {
    fn new() -> Self {
        Self {
            holder: Agent::new(),
            holder_broker: Broker::default(),
            verifier: Agent::new(),
            verifier_broker: Broker::default(),
            embed_request: true,
        }
    }

    // Verifier side of the exchange, ending with the verification result.
    // Returns the presentation request as sent to the agent.
    fn script_verifier(&self, verified: &'static str) -> Arc<Mutex<Value>> {
        let sent = Arc::new(Mutex::new(Value::Null));

        let (h, v, request) =
            (self.holder_broker.clone(), self.verifier_broker.clone(), Arc::clone(&sent));
        let embed = self.embed_request;
        self.verifier.route(Method::POST, "/present-proof-2.0/send-request", move |body| {
            assert_eq!(body["auto_verify"], false);
            assert_eq!(body["connection_id"], "alice-bob");
            *request.lock().unwrap() = body["presentation_request"].clone();

            notify(&v, TOPIC, vec![json!({
                "pres_ex_id": "v-1", "thread_id": "th-1", "state": "request-sent",
            })]);
            let mut received = json!({
                "pres_ex_id": "h-1",
                "thread_id": "th-1",
                "connection_id": "bob-alice",
                "state": "request-received",
            });
            if embed {
                received["by_format"] = json!({"pres_request": body["presentation_request"].clone()});
            }
            notify(&h, TOPIC, vec![received]);
            Ok(json!({"pres_ex_id": "v-1", "thread_id": "th-1", "state": "request-sent"}))
        });

        let (h, v) = (self.holder_broker.clone(), self.verifier_broker.clone());
        self.verifier.route(
            Method::POST,
            "/present-proof-2.0/records/v-1/verify-presentation",
            move |_| {
                notify(&v, TOPIC, vec![json!({
                    "pres_ex_id": "v-1",
                    "thread_id": "th-1",
                    "connection_id": "alice-bob",
                    "role": "verifier",
                    "state": "done",
                    "verified": verified,
                })]);
                notify(&h, TOPIC, vec![json!({
                    "pres_ex_id": "h-1", "thread_id": "th-1", "connection_id": "bob-alice", "state": "done",
                })]);
                Ok(json!({"pres_ex_id": "v-1", "state": "done", "verified": verified}))
            },
        );

        sent
    }

    // Holder side: sending the presentation notifies both parties.
    fn script_holder(&self, check: impl Fn(&Value) + Send + Sync + 'static) {
        let (h, v) = (self.holder_broker.clone(), self.verifier_broker.clone());
        self.holder.route(
            Method::POST,
            "/present-proof-2.0/records/h-1/send-presentation",
            move |body| {
                check(body);
                notify(&h, TOPIC, vec![json!({
                    "pres_ex_id": "h-1", "thread_id": "th-1", "connection_id": "bob-alice",
                    "state": "presentation-sent",
                })]);
                notify(&v, TOPIC, vec![json!({
                    "pres_ex_id": "v-1", "thread_id": "th-1", "connection_id": "alice-bob",
                    "state": "presentation-received",
                })]);
                Ok(json!({"pres_ex_id": "h-1", "state": "presentation-sent"}))
            },
        );
    }

    // Holder's credentials: one credential matching every requested attribute.
    fn script_credentials(&self, request: &Arc<Mutex<Value>>) {
        let sent = Arc::clone(request);
        self.holder.route(Method::GET, "/present-proof-2.0/records/h-1/credentials", move |_| {
            let sent = sent.lock().unwrap();
            let referents: Vec<&String> = sent["indy"]["requested_attributes"]
                .as_object()
                .expect("should have attributes")
                .keys()
                .collect();
            Ok(json!([{
                "cred_info": {"referent": "cred-1", "attrs": {"firstname": "Bob"}},
                "presentation_referents": referents,
            }]))
        });
    }

    fn clients(&self) -> (Client<Agent>, Client<Agent>) {
        (
            Client::new("bob", self.holder.clone(), self.holder_broker.clone()),
            Client::new("alice", self.verifier.clone(), self.verifier_broker.clone()),
        )
    }
}

// Indy proof: the holder answers each requested referent with a credential
// its agent lists as matching, and the verifier reports the proof verified.
#[tokio::test]
async fn present_indy() {
    let parties = Parties::new();
    let request = parties.script_verifier("true");

    parties.script_credentials(&request);
    parties.script_holder(|body| {
        let attributes = body["indy"]["requested_attributes"].as_object().expect("should have attributes");
        assert_eq!(attributes.len(), 1);
        assert!(attributes.values().all(|a| a["cred_id"] == "cred-1" && a["revealed"] == true));
    });

    let (holder, verifier) = parties.clients();
    let presentation = driver()
        .present_proof_v2(
            &holder,
            &verifier,
            "bob-alice",
            "alice-bob",
            &IndyProofRequest::attributes(&["firstname"]),
        )
        .await
        .expect("should present proof");

    assert!(presentation.verified());
    assert_eq!(presentation.holder.state(&PRESENT_PROOF_V2), Some("done"));
    assert_eq!(parties.verifier.calls(), vec![
        "POST /present-proof-2.0/send-request",
        "POST /present-proof-2.0/records/v-1/verify-presentation",
    ]);
    assert_eq!(parties.holder.calls(), vec![
        "GET /present-proof-2.0/records/h-1/credentials",
        "POST /present-proof-2.0/records/h-1/send-presentation",
    ]);

    assert_yaml_snapshot!("verifier_summary", presentation.verifier.summary(), {
        "." => insta::sorted_redaction(),
    });
}

// DIF proof: the holder's agent selects credentials itself.
#[tokio::test]
async fn present_ld() {
    let parties = Parties::new();
    let request = parties.script_verifier("true");
    parties.script_holder(|body| assert_eq!(body, &json!({"dif": {}})));

    let definition = json!({
        "id": "32f54163-7166-48f1-93d8-ff217bdb0654",
        "input_descriptors": [{"id": "citizenship_input_1", "schema": [{"uri": "https://w3id.org/citizenship#PermanentResident"}]}],
    });
    let (holder, verifier) = parties.clients();
    let presentation = driver()
        .present_ld_proof(&holder, &verifier, "bob-alice", "alice-bob", &definition, "test-degree")
        .await
        .expect("should present proof");

    assert!(presentation.verified());
    let sent = request.lock().unwrap();
    assert_eq!(sent["dif"]["presentation_definition"], definition);
    assert_eq!(sent["dif"]["options"]["domain"], "test-degree");
    assert!(parties.holder.calls().iter().all(|call| !call.ends_with("/credentials")));
}

// A failed verification completes the exchange; the result is reported,
// not raised.
#[tokio::test]
async fn not_verified() {
    let parties = Parties::new();
    parties.script_verifier("false");
    parties.script_holder(|_| {});

    let (holder, verifier) = parties.clients();
    let presentation = driver()
        .present_ld_proof(&holder, &verifier, "bob-alice", "alice-bob", &json!({}), "test")
        .await
        .expect("should complete");

    assert!(!presentation.verified());
    assert_eq!(presentation.verifier.verified(), Some("false"));
}

// A request-received notification without the request itself makes the
// holder fetch its exchange record before selecting credentials.
#[tokio::test]
async fn request_fetched_when_absent() {
    let mut parties = Parties::new();
    parties.embed_request = false;
    let request = parties.script_verifier("true");
    parties.script_credentials(&request);
    parties.script_holder(|body| {
        let attributes = body["indy"]["requested_attributes"].as_object().expect("should have attributes");
        assert_eq!(attributes.len(), 2);
    });

    let sent = Arc::clone(&request);
    parties.holder.route(Method::GET, "/present-proof-2.0/records/h-1", move |_| {
        Ok(json!({
            "pres_ex_id": "h-1",
            "thread_id": "th-1",
            "state": "request-received",
            "by_format": {"pres_request": sent.lock().unwrap().clone()},
        }))
    });

    let (holder, verifier) = parties.clients();
    let presentation = driver()
        .present_proof_v2(
            &holder,
            &verifier,
            "bob-alice",
            "alice-bob",
            &IndyProofRequest::attributes(&["firstname", "lastname"]),
        )
        .await
        .expect("should present proof");

    assert!(presentation.verified());
    assert_eq!(parties.holder.calls(), vec![
        "GET /present-proof-2.0/records/h-1",
        "GET /present-proof-2.0/records/h-1/credentials",
        "POST /present-proof-2.0/records/h-1/send-presentation",
    ]);
}
