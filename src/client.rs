//! # Exchange Client
//!
//! Pairs an [`Agent`] with the [`Broker`] receiving that agent's webhook
//! notifications. Requests go out through the agent; the results of the
//! agent's internal processing come back as notifications, which callers
//! wait on with [`Client::await_notification`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::broker::Broker;
use crate::error::Result;
use crate::notification::{Notification, Predicate};
use crate::provider::{Agent, Method};

/// Client for one agent.
///
/// Cloning is cheap; clones share the agent and the notification broker, so
/// concurrent exchanges can each hold their own clone.
#[derive(Debug)]
pub struct Client<A: Agent> {
    agent: Arc<A>,
    broker: Broker,
    label: String,
}

impl<A: Agent> Clone for Client<A> {
    fn clone(&self) -> Self {
        Self {
            agent: Arc::clone(&self.agent),
            broker: self.broker.clone(),
            label: self.label.clone(),
        }
    }
}

impl<A: Agent> Client<A> {
    /// Create a client for `agent`, receiving notifications through `broker`.
    #[must_use]
    pub fn new(label: impl Into<String>, agent: A, broker: Broker) -> Self {
        Self {
            agent: Arc::new(agent),
            broker,
            label: label.into(),
        }
    }

    /// Name used for this agent in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The broker notifications for this agent are published to.
    #[must_use]
    pub const fn notifications(&self) -> &Broker {
        &self.broker
    }

    /// Issue one request against the agent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] when the agent cannot be reached
    /// and [`crate::Error::Agent`] when it answers with a non-2xx status.
    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("{}: {method} {path}", self.label);
        self.agent.call(method, path, body).await
    }

    /// `GET` a resource.
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.call(Method::GET, path, None).await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.call(Method::POST, path, Some(body)).await
    }

    /// `GET` a resource and deserialize it.
    ///
    /// # Errors
    ///
    /// See [`Client::call`]. Returns [`crate::Error::InvalidResponse`] when the
    /// response does not deserialize into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get(path).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// `POST` a serializable body and deserialize the response.
    ///
    /// # Errors
    ///
    /// See [`Client::get_as`].
    pub async fn post_as<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let value = self.post(path, &body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Wait for the next notification on `topic` satisfying `predicate`.
    ///
    /// Notifications that arrived before the call are considered first, in
    /// arrival order. The matching notification is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] if nothing matches within `timeout`.
    pub async fn await_notification(
        &self, topic: &str, predicate: impl Predicate, timeout: Duration,
    ) -> Result<Notification> {
        tracing::debug!("{}: waiting on `{topic}`", self.label);
        let notification = self.broker.wait(topic, predicate, timeout).await?;
        tracing::debug!("{}: received `{topic}` notification", self.label);
        Ok(notification)
    }
}
