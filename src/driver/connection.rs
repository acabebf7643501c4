//! # DID Exchange
//!
//! Connects two agents using an out-of-band invitation with the DID exchange
//! handshake. Neither agent auto-accepts: the driver steps both through
//! the handshake explicitly.

use serde_json::json;

use super::Driver;
use crate::client::Client;
use crate::error::Result;
use crate::notification::Filter;
use crate::protocol::{CONNECTIONS, Record};
use crate::provider::Agent;

/// Handshake protocol requested in invitations.
pub const DIDEXCHANGE: &str = "https://didcomm.org/didexchange/1.0";

impl Driver {
    /// Connect `inviter` and `invitee`, returning their connection records
    /// (inviter's first) once both report the connection `completed`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an agent call or step.
    pub async fn didexchange<A: Agent, B: Agent>(
        &self, inviter: &Client<A>, invitee: &Client<B>,
    ) -> Result<(Record, Record)> {
        tracing::info!("connecting {} and {}", inviter.label(), invitee.label());

        let oob = inviter
            .post(
                "/out-of-band/create-invitation?auto_accept=false",
                &json!({
                    "handshake_protocols": [DIDEXCHANGE],
                    "use_public_did": false,
                }),
            )
            .await?;
        let oob = Record::from_value(oob)?;
        let invitation_msg_id = oob.require("invi_msg_id")?.to_string();
        let invitation = oob.get("invitation").cloned().unwrap_or_default();

        let received =
            invitee.post("/out-of-band/receive-invitation?auto_accept=false", &invitation).await?;
        let invitee_conn_id = Record::from_value(received)?.require("connection_id")?.to_string();

        let mut invitee_conn = self.track(
            invitee,
            CONNECTIONS,
            Filter::any().with("connection_id", invitee_conn_id.as_str()),
        );
        invitee_conn.reach("invitation-received").await?;
        invitee.post(&format!("/didexchange/{invitee_conn_id}/accept-invitation"), &json!({})).await?;

        let mut inviter_conn = self.track(
            inviter,
            CONNECTIONS,
            Filter::any().with("invitation_msg_id", invitation_msg_id.as_str()),
        );
        let request = inviter_conn.reach("request-received").await?;
        let inviter_conn_id = request.id(&CONNECTIONS)?.to_string();
        inviter.post(&format!("/didexchange/{inviter_conn_id}/accept-request"), &json!({})).await?;

        let inviter_record = inviter_conn.reach("completed").await?;
        let invitee_record = invitee_conn.reach("completed").await?;

        tracing::info!("connected: {inviter_conn_id} <-> {invitee_conn_id}");
        Ok((inviter_record, invitee_record))
    }
}
