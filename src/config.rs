//! # Configuration
//!
//! Settings are read from the environment, falling back to defaults that
//! suit the docker-compose setup used for integration runs.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default admin URL of the first agent.
pub const DEFAULT_ALICE: &str = "http://alice:3001";

/// Default admin URL of the second agent.
pub const DEFAULT_BOB: &str = "http://bob:3001";

/// Default ledger service used to register new public DIDs.
pub const DEFAULT_LEDGER: &str = "http://test.bcovrin.vonx.io";

/// Runtime configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Admin URL of the first agent (`ALICE`).
    pub alice: String,

    /// Admin URL of the second agent (`BOB`).
    pub bob: String,

    /// Ledger service that registers new public DIDs (`LEDGER_URL`).
    pub ledger: String,

    /// Port the first agent's webhooks are received on (`ALICE_WEBHOOK_PORT`).
    pub alice_webhook_port: u16,

    /// Port the second agent's webhooks are received on (`BOB_WEBHOOK_PORT`).
    pub bob_webhook_port: u16,

    /// Admin API key, when the agents require one (`AGENT_API_KEY`).
    pub api_key: Option<String>,

    /// How long each exchange step may wait for its notification
    /// (`EXCHANGE_TIMEOUT_SECS`).
    pub timeout: Duration,

    /// How long unmatched notifications are kept (`NOTIFICATION_TTL_SECS`).
    pub notification_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alice: DEFAULT_ALICE.to_string(),
            bob: DEFAULT_BOB.to_string(),
            ledger: DEFAULT_LEDGER.to_string(),
            alice_webhook_port: 8021,
            bob_webhook_port: 8022,
            api_key: None,
            timeout: Duration::from_secs(30),
            notification_ttl: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load configuration from a set of variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a numeric variable does not parse.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let string = |key: &str, default: String| vars.get(key).cloned().unwrap_or(default);

        Ok(Self {
            alice: string("ALICE", defaults.alice),
            bob: string("BOB", defaults.bob),
            ledger: string("LEDGER_URL", defaults.ledger),
            alice_webhook_port: parse(&vars, "ALICE_WEBHOOK_PORT")?
                .unwrap_or(defaults.alice_webhook_port),
            bob_webhook_port: parse(&vars, "BOB_WEBHOOK_PORT")?.unwrap_or(defaults.bob_webhook_port),
            api_key: vars.get("AGENT_API_KEY").filter(|k| !k.is_empty()).cloned(),
            timeout: parse(&vars, "EXCHANGE_TIMEOUT_SECS")?
                .map_or(defaults.timeout, Duration::from_secs),
            notification_ttl: parse(&vars, "NOTIFICATION_TTL_SECS")?
                .map_or(defaults.notification_ttl, Duration::from_secs),
        })
    }
}

fn parse<T: std::str::FromStr>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    vars.get(key)
        .map(|v| v.parse::<T>().map_err(|e| Error::Config(format!("{key}={v}: {e}"))))
        .transpose()
}
