//! Per-connection handler: frame decoding, event routing, outbound writes.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], plus a writer task:
//!   1. The writer drains the connection's outbox, wrapping each event in
//!      a numbered `Envelope`.
//!   2. The reader decodes inbound frames and hands them to the
//!      coordinator one at a time, in arrival order.
//!   3. When the reader stops, the same task departs the connection from
//!      its sessions, then lets the writer flush and exit.

use std::sync::Arc;
use std::time::Instant;

use duelforge_protocol::{ClientEvent, Codec, Envelope, ServerEvent};
use duelforge_session::{Peer, RulesEngine};
use duelforge_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::DuelforgeError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, C>>,
) -> Result<(), DuelforgeError>
where
    R: RulesEngine,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let start = Instant::now();
    tracing::debug!(connection = %conn_id, "handling new connection");

    let (outbox, inbox) = mpsc::unbounded_channel();
    let peer = Peer::new(conn_id, outbox);
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        Arc::clone(&state),
        inbox,
        start,
    ));

    let result = read_loop(&conn, &state, &peer).await;

    // Runs after the last inbound event has been fully handled, so a
    // disconnect never overtakes a join or move from the same client.
    let departed = state.coordinator.depart(conn_id).await;
    tracing::info!(connection = %conn_id, sessions = departed, "connection closed");

    // Sessions dropped their clones of the outbox on departure; dropping
    // ours lets the writer drain what is queued and stop.
    drop(peer);
    if let Err(e) = writer.await {
        tracing::warn!(connection = %conn_id, error = %e, "writer task failed");
    }

    result
}

async fn read_loop<R, C>(
    conn: &WebSocketConnection,
    state: &ServerState<R, C>,
    peer: &Peer<R::Target>,
) -> Result<(), DuelforgeError>
where
    R: RulesEngine,
    C: Codec,
{
    loop {
        let Some(data) = conn.recv().await? else {
            tracing::debug!(connection = %peer.id(), "connection closed cleanly");
            return Ok(());
        };

        let envelope: Envelope<ClientEvent<R::Action, R::Query>> =
            match state.codec.decode(&data) {
                Ok(env) => env,
                Err(e) => {
                    tracing::debug!(
                        connection = %peer.id(),
                        error = %e,
                        "failed to decode envelope"
                    );
                    peer.send(ServerEvent::Error {
                        code: 400,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

        // Rejections have already been sent to the peer.
        let _ = state.coordinator.handle(peer, envelope.payload).await;
    }
}

async fn write_loop<R, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<R, C>>,
    mut inbox: mpsc::UnboundedReceiver<ServerEvent<R::Target>>,
    start: Instant,
) where
    R: RulesEngine,
    C: Codec,
{
    let mut seq: u64 = 1;

    while let Some(event) = inbox.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: start.elapsed().as_millis() as u64,
            payload: event,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(connection = %conn.id(), error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(connection = %conn.id(), error = %e, "send failed");
            break;
        }
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
