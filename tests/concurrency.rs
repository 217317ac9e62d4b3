//! Races between handlers on one room.

use std::sync::Arc;

use tokio::sync::Barrier;

use coup_game_engine::engine::codec::dehydrate;
use coup_game_engine::engine::config::EngineConfig;
use coup_game_engine::engine::error::ErrorKind;
use coup_game_engine::engine::store::{room_key, GameStore, MemoryStore};
use coup_game_engine::games::coup::types::{ActionKind, ActionResponse, EventType};
use coup_game_engine::server::GameServer;

async fn started_room(server: &GameServer<MemoryStore>, david_coins: u32) -> String {
    let room = server
        .create_game("David", None)
        .await
        .unwrap();
    let room_id = room.room_id;
    server.join_game(&room_id, "Harper").await.unwrap();
    server.join_game(&room_id, "Hailey").await.unwrap();
    server.start_game(&room_id, "David").await.unwrap();

    let mut state = server.rooms().load(&room_id).await.unwrap();
    state.turn_player = Some("David".into());
    state.player_mut("David").unwrap().coins = david_coins;
    server
        .rooms()
        .store()
        .set(&room_key(&room_id), dehydrate(&state).unwrap(), server.config().state_ttl())
        .await
        .unwrap();
    room_id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hundred_concurrent_coups_commit_once() {
    let server = Arc::new(GameServer::new(
        Arc::new(MemoryStore::new()),
        EngineConfig::default(),
    ));
    let room_id = started_room(&server, 11).await;

    let barrier = Arc::new(Barrier::new(100));
    let mut handles = Vec::with_capacity(100);
    for _ in 0..100 {
        let server = Arc::clone(&server);
        let barrier = Arc::clone(&barrier);
        let room_id = room_id.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            server
                .choose_action(&room_id, "David", ActionKind::Coup, Some("Harper"))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(
                matches!(e.kind(), ErrorKind::Conflict | ErrorKind::NotAllowed),
                "unexpected error {:?}",
                e
            ),
        }
    }
    assert_eq!(successes, 1);

    let state = server.rooms().load(&room_id).await.unwrap();
    assert_eq!(state.player("David").unwrap().coins, 4);
    assert_eq!(state.pending_losses("Harper"), 1);
    assert_eq!(
        state
            .event_logs
            .iter()
            .filter(|e| e.event_type == EventType::ChoseAction)
            .count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_responses_are_not_lost_silently() {
    let server = Arc::new(GameServer::new(
        Arc::new(MemoryStore::new()),
        EngineConfig::default(),
    ));
    let room_id = started_room(&server, 2).await;
    server
        .choose_action(&room_id, "David", ActionKind::ForeignAid, None)
        .await
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for name in ["Harper", "Hailey"] {
        let server = Arc::clone(&server);
        let barrier = Arc::clone(&barrier);
        let room_id = room_id.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let result = server
                .action_response(&room_id, name, ActionResponse::Pass)
                .await;
            (name, result)
        }));
    }

    let mut passed = Vec::new();
    for handle in handles {
        let (name, result) = handle.await.unwrap();
        match result {
            Ok(_) => passed.push(name),
            Err(e) => assert!(e.is_retryable(), "unexpected error {:?}", e),
        }
    }
    assert!(!passed.is_empty());

    let state = server.rooms().load(&room_id).await.unwrap();
    if passed.len() == 2 {
        assert_eq!(state.player("David").unwrap().coins, 4);
        assert!(state.pending_action.is_none());
    } else {
        let pending = &state.pending_action.as_ref().unwrap().pending_players;
        assert_eq!(pending.len(), 1);
        assert!(!pending.contains(passed[0]));
    }
}
