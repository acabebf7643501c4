//! # Exchange Harness
//!
//! Connects two agents, runs an issuance and presentation scenario between
//! them and exits non-zero when the verifier does not accept the
//! presentation.
//!
//! Agent URLs and webhook ports are read from the environment (or a `.env`
//! file). Point each agent's webhook URL at `http://<host>:<port>` for the
//! matching port.

mod receiver;
mod scenario;

use clap::{Parser, ValueEnum};
use credibil_exchange::broker::DEFAULT_CAPACITY;
use credibil_exchange::http::HttpAgent;
use credibil_exchange::{Broker, Client, Config, Driver, DriverConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(about = "Drive issuance and presentation exchanges between two agents")]
struct Opts {
    /// Scenario to run.
    #[arg(value_enum, default_value = "anoncreds-v2")]
    scenario: Scenario,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Indy credential over issue credential 1.0, presented with present proof 2.0.
    AnoncredsV1,
    /// Indy credential over issue credential 2.0, presented with present proof 2.0.
    AnoncredsV2,
    /// JSON-LD credential, presented against a DIF presentation definition.
    JsonLd,
    /// Only receive and log webhooks until interrupted.
    Receive,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let opts = Opts::parse();
    let config = Config::from_env()?;

    let alice = participant("alice", &config.alice, config.alice_webhook_port, &config).await?;
    let bob = participant("bob", &config.bob, config.bob_webhook_port, &config).await?;
    let ledger = HttpAgent::new(&config.ledger);
    let driver = Driver::new(DriverConfig {
        timeout: config.timeout,
        ..DriverConfig::default()
    });

    tracing::info!("running {:?}", opts.scenario);
    match opts.scenario {
        Scenario::AnoncredsV1 => {
            scenario::anoncreds(&driver, &alice, &bob, &ledger, scenario::Issuance::V1).await
        }
        Scenario::AnoncredsV2 => {
            scenario::anoncreds(&driver, &alice, &bob, &ledger, scenario::Issuance::V2).await
        }
        Scenario::JsonLd => scenario::json_ld(&driver, &alice, &bob, &ledger).await,
        Scenario::Receive => {
            tokio::signal::ctrl_c().await?;
            Ok(())
        }
    }
}

async fn participant(
    label: &str, url: &str, webhook_port: u16, config: &Config,
) -> anyhow::Result<Client<HttpAgent>> {
    let broker = Broker::new(config.notification_ttl, DEFAULT_CAPACITY);
    receiver::spawn(label, webhook_port, broker.clone()).await?;

    let mut agent = HttpAgent::new(url);
    if let Some(api_key) = &config.api_key {
        agent = agent.with_api_key(api_key)?;
    }
    Ok(Client::new(label, agent, broker))
}
