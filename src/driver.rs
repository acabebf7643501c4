//! # Exchange Driver
//!
//! Sequences agent calls into complete multi-step exchanges. Each step sends
//! a request and then waits for the notification confirming the agent has
//! reached the state the next request depends on:
//!
//! ```text
//! send-offer ──▶ await request-received ──▶ issue ──▶ await done
//! ```
//!
//! The driver never sends the next request before the confirming
//! notification arrives, and never retries: the first failing step aborts
//! the exchange and its error is returned to the caller.
//!
//! Flows are grouped by protocol:
//!
//! - [`connection`]: DID exchange between two agents.
//! - [`setup`]: issuer onboarding, schemas and credential definitions.
//! - [`issuance`]: issue credential 1.0 and 2.0 (indy and JSON-LD).
//! - [`presentation`]: present proof 2.0 (indy and DIF).

pub mod connection;
pub mod issuance;
pub mod presentation;
pub mod setup;

use std::time::Duration;

use tokio::time::Instant;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::notification::Filter;
use crate::protocol::{Protocol, Record};
use crate::provider::Agent;

/// Default time each step may wait for its notification.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Driver settings, fixed at construction.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// How long each step may wait for its confirming notification.
    pub timeout: Duration,

    /// Comment attached to offers and requests.
    pub comment: String,

    /// Ask agents to delete exchange records once complete.
    pub auto_remove: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            comment: "Sent by credibil-exchange".to_string(),
            auto_remove: false,
        }
    }
}

/// Drives multi-step exchanges between agents.
#[derive(Clone, Debug, Default)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    /// Create a driver.
    #[must_use]
    pub const fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// Driver settings.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Track one exchange on `client`, selecting its notifications with
    /// `filter`.
    pub fn track<'a, A: Agent>(
        &self, client: &'a Client<A>, protocol: Protocol, filter: Filter,
    ) -> Exchange<'a, A> {
        Exchange {
            client,
            protocol,
            filter,
            timeout: self.config.timeout,
            reached: None,
        }
    }
}

/// One exchange in progress, as seen by one agent.
///
/// Remembers the furthest state confirmed so far so that a notification
/// reporting an earlier state is reported as a protocol violation.
#[derive(Debug)]
pub struct Exchange<'a, A: Agent> {
    client: &'a Client<A>,
    protocol: Protocol,
    filter: Filter,
    timeout: Duration,
    reached: Option<usize>,
}

impl<A: Agent> Exchange<'_, A> {
    /// Wait until the exchange reaches `target`, returning the record carried
    /// by the confirming notification.
    ///
    /// Notifications for states between the last confirmed state and
    /// `target` are consumed on the way.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if `target` is not reached within the step
    ///   timeout.
    /// - [`Error::ProtocolViolation`] if the exchange fails, regresses, skips
    ///   past `target`, or reports a state the protocol does not define.
    pub async fn reach(&mut self, target: &str) -> Result<Record> {
        let topic = self.protocol.topic;
        let target_rank = self.protocol.rank(target).ok_or_else(|| {
            Error::ProtocolViolation(format!("`{target}` is not a `{topic}` state"))
        })?;
        let deadline = Instant::now() + self.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let notification = self
                .client
                .await_notification(topic, self.filter.clone(), remaining)
                .await
                .map_err(|e| match e {
                    Error::Timeout { topic, .. } => Error::Timeout {
                        topic,
                        timeout: self.timeout,
                    },
                    other => other,
                })?;

            let record = Record::from_value(notification.payload)?;
            let Some(state) = record.state(&self.protocol) else {
                return Err(Error::ProtocolViolation(format!("`{topic}` record has no state")));
            };

            if self.protocol.is_failed(state) {
                return Err(Error::ProtocolViolation(format!(
                    "`{topic}` exchange {:?} ended in `{state}` waiting for `{target}`",
                    self.filter
                )));
            }
            let Some(rank) = self.protocol.rank(state) else {
                return Err(Error::ProtocolViolation(format!("unknown `{topic}` state `{state}`")));
            };
            if self.reached.is_some_and(|reached| rank < reached) {
                return Err(Error::ProtocolViolation(format!(
                    "`{topic}` exchange {:?} regressed to `{state}`",
                    self.filter
                )));
            }
            if rank > target_rank {
                return Err(Error::ProtocolViolation(format!(
                    "`{topic}` exchange {:?} moved past `{target}` to `{state}`",
                    self.filter
                )));
            }

            self.reached = Some(rank);
            if rank == target_rank {
                tracing::debug!("{}: `{topic}` reached `{state}`", self.client.label());
                return Ok(record);
            }
            tracing::debug!("{}: `{topic}` passed `{state}`", self.client.label());
        }
    }
}
