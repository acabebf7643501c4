//! # Webhook Ingress
//!
//! Agents post record changes to `{webhook_url}/topic/{topic}/`. The router
//! returned by [`router`] accepts those posts and publishes exchange topics
//! to a [`Broker`].
//!
//! Topics the crate does not know about are acknowledged and logged so new
//! agent topics do not break the receiver.

use std::fmt;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::broker::Broker;
use crate::notification::Notification;

/// Build the webhook router for one agent.
pub fn router(broker: Broker) -> Router {
    Router::new()
        .route("/topic/:topic", post(receive))
        .route("/topic/:topic/", post(receive))
        .layer(TraceLayer::new_for_http())
        .with_state(broker)
}

// Webhook endpoint
#[axum::debug_handler]
async fn receive(
    State(broker): State<Broker>, Path(topic): Path<String>, Json(payload): Json<Value>,
) -> Result<StatusCode, AppError> {
    let topic = Topic::from(topic.as_str());

    // only published records need to be objects; anything else is just logged
    if topic.handler() == Handler::Publish && !payload.is_object() {
        return Err(AppError::Status(
            StatusCode::BAD_REQUEST,
            format!("`{topic}` payload is not a JSON object"),
        ));
    }
    topic.dispatch(&broker, payload);
    Ok(StatusCode::OK)
}

/// Webhook topics, as posted by the agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topic {
    /// Connection record changes.
    Connections,

    /// Issue credential 1.0 exchange records.
    IssueCredential,

    /// Issue credential 2.0 exchange records.
    IssueCredentialV2,

    /// Indy detail records for issue credential 2.0.
    IssueCredentialV2Indy,

    /// Linked-data proof detail records for issue credential 2.0.
    IssueCredentialV2LdProof,

    /// Present proof 1.0 exchange records.
    PresentProof,

    /// Present proof 2.0 exchange records.
    PresentProofV2,

    /// Out-of-band invitation records.
    OutOfBand,

    /// Basic messages received over a connection.
    BasicMessage,

    /// Informational ping responses.
    Ping,

    /// Any topic not listed above.
    Other(String),
}

/// What to do with a notification on a given topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    /// Publish to the broker for waiters.
    Publish,

    /// Log and drop.
    Log,
}

impl Topic {
    const TABLE: [(&'static str, Self, Handler); 10] = [
        ("connections", Self::Connections, Handler::Publish),
        ("issue_credential", Self::IssueCredential, Handler::Publish),
        ("issue_credential_v2_0", Self::IssueCredentialV2, Handler::Publish),
        ("issue_credential_v2_0_indy", Self::IssueCredentialV2Indy, Handler::Publish),
        ("issue_credential_v2_0_ld_proof", Self::IssueCredentialV2LdProof, Handler::Publish),
        ("present_proof", Self::PresentProof, Handler::Publish),
        ("present_proof_v2_0", Self::PresentProofV2, Handler::Publish),
        ("out_of_band", Self::OutOfBand, Handler::Publish),
        ("basicmessages", Self::BasicMessage, Handler::Publish),
        ("ping", Self::Ping, Handler::Log),
    ];

    /// Topic name as it appears in the webhook path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Other(name) = self {
            return name;
        }
        Self::TABLE.iter().find(|(_, t, _)| t == self).map_or("", |(name, _, _)| *name)
    }

    /// Handler for this topic.
    #[must_use]
    pub fn handler(&self) -> Handler {
        Self::TABLE.iter().find(|(_, t, _)| t == self).map_or(Handler::Log, |(_, _, h)| *h)
    }

    /// Handle a notification posted to this topic.
    pub fn dispatch(&self, broker: &Broker, payload: Value) {
        match self.handler() {
            Handler::Publish => {
                tracing::info!("webhook `{self}`: {payload}");
                broker.publish(Notification::new(self.as_str(), payload));
            }
            Handler::Log => {
                tracing::info!("webhook `{self}` ignored: {payload}");
            }
        }
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::TABLE
            .iter()
            .find(|(n, _, _)| *n == name)
            .map_or_else(|| Self::Other(name.to_string()), |(_, t, _)| t.clone())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook handler error.
#[derive(Debug)]
pub enum AppError {
    /// Reject the request with a status and message.
    Status(StatusCode, String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Self::Status(status, message) = self;
        tracing::warn!("webhook rejected: {message}");
        (status, Json(json!({"error": message}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::notification::Filter;

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn known_topic_is_published() {
        let broker = Broker::default();
        let body = json!({"cred_ex_id": "abc", "state": "offer-sent"}).to_string();

        let response =
            router(broker.clone()).oneshot(post("/topic/issue_credential_v2_0/", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let n = broker
            .wait("issue_credential_v2_0", Filter::any().with("cred_ex_id", "abc"), Duration::from_millis(50))
            .await
            .expect("notification should be published");
        assert_eq!(n.state(), Some("offer-sent"));
    }

    #[tokio::test]
    async fn path_without_trailing_slash() {
        let broker = Broker::default();
        let body = json!({"connection_id": "c1", "rfc23_state": "completed"}).to_string();

        let response = router(broker.clone()).oneshot(post("/topic/connections", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(broker.buffered(), 1);
    }

    #[tokio::test]
    async fn unknown_topic_is_acknowledged() {
        let broker = Broker::default();

        let response = router(broker.clone())
            .oneshot(post("/topic/some_future_topic/", r#"{"anything": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(broker.buffered(), 0);
    }

    #[tokio::test]
    async fn unknown_topic_accepts_any_json() {
        let broker = Broker::default();

        for body in ["[1, 2]", "\"hello\"", "null"] {
            let response = router(broker.clone())
                .oneshot(post("/topic/discover_feature_v2_0/", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "body {body}");
        }
        let response = router(broker.clone()).oneshot(post("/topic/ping/", "[]")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(broker.buffered(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let broker = Broker::default();

        let response =
            router(broker.clone()).oneshot(post("/topic/connections/", "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router(broker.clone()).oneshot(post("/topic/connections/", "[1, 2]")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(broker.buffered(), 0);
    }

    #[test]
    fn topic_lookup() {
        assert_eq!(Topic::from("present_proof_v2_0"), Topic::PresentProofV2);
        assert_eq!(Topic::PresentProofV2.as_str(), "present_proof_v2_0");
        assert_eq!(Topic::from("ping").handler(), Handler::Log);

        let other = Topic::from("revocation_notification");
        assert_eq!(other, Topic::Other("revocation_notification".into()));
        assert_eq!(other.as_str(), "revocation_notification");
        assert_eq!(other.handler(), Handler::Log);
    }
}
