//! Property tests: seating and turn order hold for arbitrary sequences.

mod common;

use common::{Script, coordinator, peer, sid};
use duelforge_protocol::Role;
use duelforge_session::SessionError;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn every_join_past_the_second_is_room_full(
        ids in proptest::collection::hash_set(1u64..10_000, 3..8)
    ) {
        let ids: Vec<u64> = ids.into_iter().collect();
        runtime().block_on(async {
            let coord = coordinator();
            let mut seated = Vec::new();
            for (n, id) in ids.iter().enumerate() {
                let (p, _rx) = peer(*id);
                let result = coord.join(&sid("P"), &p).await;
                match n {
                    0 => prop_assert_eq!(result, Ok(Role::First)),
                    1 => prop_assert_eq!(result, Ok(Role::Second)),
                    _ => prop_assert!(matches!(result, Err(SessionError::RoomFull(_)))),
                }
                seated.push(p);
            }
            let handle = coord.registry().get(&sid("P")).unwrap();
            let info = handle.info().await.unwrap();
            prop_assert_eq!(info.participants.len(), 2);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn turn_passes_only_on_accepted_transitions(
        moves in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..40)
    ) {
        runtime().block_on(async {
            let coord = coordinator();
            let (a, _a_rx) = peer(1);
            let (b, _b_rx) = peer(2);
            coord.join(&sid("P"), &a).await.unwrap();
            coord.join(&sid("P"), &b).await.unwrap();

            let mut turn = Role::First;
            let mut accepted = 0u32;
            for (by_first, legal) in moves {
                let (who, role) = if by_first { (&a, Role::First) } else { (&b, Role::Second) };
                let script = if legal { Script::Legal } else { Script::Illegal };
                let result = coord.propose(&sid("P"), who.id(), script).await;

                if role != turn {
                    let is_out_of_turn = matches!(result, Err(SessionError::NotYourTurn { .. }));
                    prop_assert!(is_out_of_turn);
                } else if !legal {
                    let is_invalid = matches!(result, Err(SessionError::InvalidAction(_)));
                    prop_assert!(is_invalid);
                } else {
                    turn = turn.other();
                    accepted += 1;
                    prop_assert_eq!(result, Ok(turn));
                }
            }

            let info = coord.registry().get(&sid("P")).unwrap().info().await.unwrap();
            prop_assert_eq!(info.turn_holder, turn);
            prop_assert_eq!(info.state, format!("moves={accepted}"));
            Ok::<(), TestCaseError>(())
        })?;
    }
}
