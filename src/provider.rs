//! # Agent Provider
//!
//! The exchange client talks to an agent through the [`Agent`] trait. The
//! crate ships a `reqwest`-based implementation in [`crate::http`];
//! implementors can supply their own, for instance to route calls through an
//! existing HTTP stack or to stand in for an agent in tests.

use std::future::Future;

pub use reqwest::Method;
use serde_json::Value;

use crate::error::Result;

/// Issues requests against an agent's admin API.
pub trait Agent: Send + Sync {
    /// Issue one request and return the agent's JSON response.
    ///
    /// An empty response body is returned as [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Implementations return [`crate::Error::Transport`] when the agent
    /// cannot be reached and [`crate::Error::Agent`] when it answers with a
    /// non-2xx status.
    fn call(
        &self, method: Method, path: &str, body: Option<&Value>,
    ) -> impl Future<Output = Result<Value>> + Send;
}
