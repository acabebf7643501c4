//! # Webhook Receiver
//!
//! Serves the webhook router for one agent in the background.

use credibil_exchange::{webhook, Broker};
use tokio::net::TcpListener;

/// Bind `port` and serve webhooks for the agent named `label`, publishing
/// them to `broker`.
pub async fn spawn(label: &str, port: u16, broker: Broker) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("{label}: receiving webhooks on {}", listener.local_addr()?);

    let label = label.to_string();
    let router = webhook::router(broker);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("{label}: webhook receiver stopped: {e}");
        }
    });
    Ok(())
}
