//! In-process stand-in for an agent's admin API.
//!
//! Routes are registered per test. A route handler receives the request body
//! and returns the response; it can also script the webhook notifications
//! the real agent would send, using [`notify`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use credibil_exchange::{Broker, Error, Method, Notification, Result};
use serde_json::{Value, json};

type Handler = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Scripted agent. Clones share routes and the call log.
#[derive(Clone, Default)]
pub struct Agent {
    routes: Arc<Mutex<HashMap<(Method, String), Handler>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Agent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method` `path` (including any query string).
    pub fn route(
        &self, method: Method, path: &str,
        handler: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.routes.lock().unwrap().insert((method, path.to_string()), Box::new(handler));
    }

    /// Requests received so far, as `METHOD path`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl credibil_exchange::Agent for Agent {
    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.calls.lock().unwrap().push(format!("{method} {path}"));

        let routes = self.routes.lock().unwrap();
        let Some(handler) = routes.get(&(method, path.to_string())) else {
            return Err(Error::Agent {
                status: 404,
                body: json!(format!("no route for {path}")),
            });
        };
        handler(body.unwrap_or(&Value::Null))
    }
}

/// Publish `notifications` to `broker`, in order, shortly after the current
/// request has been answered.
pub fn notify(broker: &Broker, topic: &str, payloads: Vec<Value>) {
    let broker = broker.clone();
    let topic = topic.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        for payload in payloads {
            broker.publish(Notification::new(topic.clone(), payload));
        }
    });
}
