//! # Duelforge
//!
//! Server-authoritative coordination for two-player, turn-based games
//! played over WebSocket.
//!
//! Game developers implement one [`RulesEngine`](duelforge_session::RulesEngine)
//! trait. Duelforge pairs connections into named sessions, hands out the
//! two roles, enforces turn order, and broadcasts every accepted
//! transition to both sides.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelforge::prelude::*;
//!
//! // Implement RulesEngine for your game, then:
//! // duelforge::init_tracing();
//! // let server = DuelforgeServer::builder()
//! //     .bind("0.0.0.0:3001")
//! //     .build(MyGame)
//! //     .await?;
//! // server.run().await
//! ```

mod error;
mod handler;
mod server;

pub use error::DuelforgeError;
pub use server::{DuelforgeServer, DuelforgeServerBuilder};

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    pub use crate::{DuelforgeError, DuelforgeServer, DuelforgeServerBuilder, init_tracing};
    pub use duelforge_protocol::{
        ClientEvent, Codec, ConnectionId, Envelope, JsonCodec, ParticipantInfo, RejectReason,
        Role, ServerEvent, SessionId, Snapshot,
    };
    pub use duelforge_session::{
        Coordinator, RulesEngine, RulesError, SessionConfig, SessionError, SessionPhase,
        SessionRegistry, Verdict,
    };
}
