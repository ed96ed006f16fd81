//! Integration tests for the Duelforge server over real WebSocket clients.

use std::time::Duration;

use duelforge::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Mock rules: players take turns adding 1-3 to a running total. Whoever
// brings it to 10 or more wins.
// =========================================================================

struct RaceToTen;

impl RulesEngine for RaceToTen {
    type State = u32;
    type Action = u32;
    type Query = u32;
    type Target = u32;

    fn initial_state(&self) -> u32 {
        0
    }

    fn apply(&self, total: &u32, add: &u32) -> Result<Verdict<u32>, RulesError> {
        if !(1..=3).contains(add) {
            return Ok(Verdict::reject("add 1, 2 or 3"));
        }
        let next = total + add;
        if next >= 10 {
            Ok(Verdict::finish(next, "reached ten"))
        } else {
            Ok(Verdict::accept(next))
        }
    }

    /// The first `n` totals reachable from here, at most three.
    fn legal_targets(&self, total: &u32, n: &u32) -> Vec<u32> {
        (1..=*n.min(&3)).map(|add| total + add).collect()
    }

    fn encode_state(&self, total: &u32) -> String {
        total.to_string()
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its address and registry.
async fn start_server() -> (String, SessionRegistry<RaceToTen>) {
    let server = DuelforgeServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(RaceToTen)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = server.coordinator().registry().clone();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, registry)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, payload: Value) {
    let frame = json!({ "seq": 0, "timestamp": 0, "payload": payload });
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("send");
}

async fn recv(ws: &mut ClientWs) -> Envelope<ServerEvent<u32>> {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("recv");
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

async fn assert_silent(ws: &mut ClientWs) {
    let next = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(next.is_err(), "expected no frame, got {next:?}");
}

async fn join(ws: &mut ClientWs, session: &str) -> Role {
    send(ws, json!({ "type": "Join", "session_id": session })).await;
    let assigned = recv(ws).await;
    let ServerEvent::RoleAssigned { role } = assigned.payload else {
        panic!("expected RoleAssigned, got {assigned:?}");
    };
    let snapshot = recv(ws).await;
    assert!(matches!(snapshot.payload, ServerEvent::SessionSnapshot(_)));
    role
}

async fn propose(ws: &mut ClientWs, session: &str, add: u32) {
    send(
        ws,
        json!({ "type": "ProposeTransition", "session_id": session, "action": add }),
    )
    .await;
}

/// Two connected clients seated in `session`, with join traffic drained.
async fn paired(addr: &str, session: &str) -> (ClientWs, ClientWs) {
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    assert_eq!(join(&mut a, session).await, Role::First);
    assert_eq!(join(&mut b, session).await, Role::Second);
    let _ = recv(&mut a).await; // snapshot announcing b
    (a, b)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_join_assigns_role_then_snapshot() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({ "type": "Join", "session_id": "R1" })).await;

    let first = recv(&mut ws).await;
    assert_eq!(first.seq, 1);
    assert_eq!(first.payload, ServerEvent::RoleAssigned { role: Role::First });

    let second = recv(&mut ws).await;
    assert_eq!(second.seq, 2);
    match second.payload {
        ServerEvent::SessionSnapshot(snapshot) => {
            assert_eq!(snapshot.state, "0");
            assert_eq!(snapshot.participants.len(), 1);
            assert_eq!(snapshot.turn_holder, Role::First);
        }
        other => panic!("expected SessionSnapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_frame_without_counters_is_accepted() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    let frame = json!({ "payload": { "type": "Join", "session_id": "R1" } });
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("send");

    let env = recv(&mut ws).await;
    assert_eq!(env.payload, ServerEvent::RoleAssigned { role: Role::First });
}

#[tokio::test]
async fn test_second_joiner_and_room_full() {
    let (addr, _) = start_server().await;
    let (mut a, mut b) = paired(&addr, "R1").await;

    let mut c = connect(&addr).await;
    send(&mut c, json!({ "type": "Join", "session_id": "R1" })).await;
    let env = recv(&mut c).await;
    assert!(matches!(
        env.payload,
        ServerEvent::Rejected {
            reason: RejectReason::RoomFull,
            ..
        }
    ));

    assert_silent(&mut a).await;
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_transition_broadcast_and_targeted_rejection() {
    let (addr, _) = start_server().await;
    let (mut a, mut b) = paired(&addr, "R1").await;

    propose(&mut a, "R1", 2).await;
    let expected = ServerEvent::TransitionApplied {
        state: "2".into(),
        turn_holder: Role::Second,
    };
    assert_eq!(recv(&mut a).await.payload, expected);
    assert_eq!(recv(&mut b).await.payload, expected);

    // Out of range: only b hears about it.
    propose(&mut b, "R1", 7).await;
    let env = recv(&mut b).await;
    assert!(matches!(
        env.payload,
        ServerEvent::Rejected {
            reason: RejectReason::InvalidAction,
            ..
        }
    ));
    assert_silent(&mut a).await;

    // a moving twice in a row.
    propose(&mut a, "R1", 1).await;
    let env = recv(&mut a).await;
    assert!(matches!(
        env.payload,
        ServerEvent::Rejected {
            reason: RejectReason::NotYourTurn,
            ..
        }
    ));
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_game_to_the_end() {
    let (addr, _) = start_server().await;
    let (mut a, mut b) = paired(&addr, "R1").await;

    // 3 + 3 + 3 + 1 = 10, a makes the last move.
    for (n, add) in [3, 3, 3, 1].into_iter().enumerate() {
        let mover = if n % 2 == 0 { &mut a } else { &mut b };
        propose(mover, "R1", add).await;
        let _ = recv(&mut a).await;
        let _ = recv(&mut b).await;
    }

    let ended = ServerEvent::SessionEnded {
        summary: "reached ten".into(),
    };
    assert_eq!(recv(&mut a).await.payload, ended);
    assert_eq!(recv(&mut b).await.payload, ended);

    propose(&mut a, "R1", 1).await;
    assert!(matches!(
        recv(&mut a).await.payload,
        ServerEvent::Rejected {
            reason: RejectReason::InvalidAction,
            ..
        }
    ));
}

#[tokio::test]
async fn test_query_is_unicast() {
    let (addr, _) = start_server().await;
    let (mut a, mut b) = paired(&addr, "R1").await;

    send(
        &mut b,
        json!({ "type": "Query", "session_id": "R1", "args": 2 }),
    )
    .await;
    assert_eq!(
        recv(&mut b).await.payload,
        ServerEvent::QueryResult {
            targets: vec![1, 2]
        }
    );
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_unknown_session() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(&addr).await;

    propose(&mut ws, "ghost", 1).await;
    assert!(matches!(
        recv(&mut ws).await.payload,
        ServerEvent::Rejected {
            reason: RejectReason::UnknownSession,
            ..
        }
    ));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");
    match recv(&mut ws).await.payload {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error 400, got {other:?}"),
    }

    // An empty session id fails validation the same way.
    send(&mut ws, json!({ "type": "Join", "session_id": "" })).await;
    assert!(matches!(
        recv(&mut ws).await.payload,
        ServerEvent::Error { code: 400, .. }
    ));

    assert_eq!(join(&mut ws, "R1").await, Role::First);
}

#[tokio::test]
async fn test_disconnects_shrink_then_delete_session() {
    let (addr, registry) = start_server().await;
    let (a, mut b) = paired(&addr, "R1").await;

    drop(a);
    match recv(&mut b).await.payload {
        ServerEvent::SessionSnapshot(snapshot) => {
            assert_eq!(snapshot.participants.len(), 1);
            assert_eq!(snapshot.participants[0].role, Role::Second);
        }
        other => panic!("expected SessionSnapshot, got {other:?}"),
    }

    b.close(None).await.expect("close");
    drop(b);

    let deleted = tokio::time::timeout(Duration::from_secs(5), async {
        while registry.get(&SessionId::new("R1").unwrap()).is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(deleted.is_ok(), "session should be deleted once empty");
}
