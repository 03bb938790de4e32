//! Integration tests for the mesito HTTP API.
//!
//! Every test runs the full router against an in-memory redb store.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use mesito::api::{AppState, RouterOptions, create_router};
use mesito_core::{Emission, MachineCondition, RedbStore};
use serde_json::{Value, json};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a server on a fresh in-memory store, keeping the state around.
fn server() -> (TestServer, AppState) {
    let state = AppState::new(RedbStore::in_memory().unwrap());
    let router = create_router(state.clone(), &RouterOptions::default());
    (TestServer::new(router).unwrap(), state)
}

/// Put a machine named `name` and return its id.
async fn put_machine(server: &TestServer, name: &str) -> u64 {
    let resp = server
        .post("/api/v1/put_machine")
        .json(&json!({"name": name}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    resp.json::<u64>()
}

fn working(machine_id: u64, start: i64, stop: i64) -> Value {
    json!({
        "machine_id": machine_id,
        "start": start,
        "stop": stop,
        "condition": "working",
    })
}

/// Put a machine and one working state on [1000, 2000].
async fn machine_with_state(server: &TestServer) -> u64 {
    let machine_id = put_machine(server, "some-machine").await;
    assert_eq!(machine_id, 1);

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(machine_id, 1000, 2000))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<u64>(), 1);

    machine_id
}

// =============================================================================
// MACHINE TESTS
// =============================================================================

#[tokio::test]
async fn test_machines_on_empty() {
    let (server, _) = server();

    let resp = server.post("/api/v1/machines").await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    resp.assert_json(&json!([]));

    let resp = server.get("/api/v1/machines").await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    resp.assert_json(&json!([]));
}

#[tokio::test]
async fn test_insert_new_machine() {
    let (server, _) = server();

    assert_eq!(put_machine(&server, "some-machine").await, 1);

    let resp = server.post("/api/v1/machines").await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    resp.assert_json(&json!([{"id": 1, "name": "some-machine", "version": 1}]));
}

#[tokio::test]
async fn test_rename_machine() {
    let (server, _) = server();
    assert_eq!(put_machine(&server, "some-machine").await, 1);

    let resp = server
        .post("/api/v1/put_machine")
        .json(&json!({"id": 1, "name": "renamed-machine"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<u64>(), 1);

    let resp = server.post("/api/v1/machines").await;
    resp.assert_json(&json!([{"id": 1, "name": "renamed-machine", "version": 2}]));
}

#[tokio::test]
async fn test_put_machine_with_unknown_id() {
    let (server, _) = server();

    let resp = server
        .post("/api/v1/put_machine")
        .json(&json!({"id": 7, "name": "ghost"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({"what": "MachineNotFound", "why": {"machine_id": 7}}));
}

#[tokio::test]
async fn test_post_machine() {
    let (server, _) = server();

    let resp = server
        .post("/api/v1/machine")
        .json(&json!({"name": "press"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<u64>(), 1);

    let resp = server
        .post("/api/v1/machine")
        .json(&json!({"name": "lathe"}))
        .await;
    assert_eq!(resp.json::<u64>(), 2);

    // Listed by name.
    let resp = server.get("/api/v1/machines").await;
    resp.assert_json(&json!([
        {"id": 2, "name": "lathe", "version": 1},
        {"id": 1, "name": "press", "version": 1},
    ]));
}

#[tokio::test]
async fn test_machine_name_is_unique() {
    let (server, _) = server();
    put_machine(&server, "press").await;

    let resp = server
        .post("/api/v1/machine")
        .json(&json!({"name": "press"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({"what": "MachineNameTaken", "why": {"name": "press"}}));
}

#[tokio::test]
async fn test_patch_machine() {
    let (server, _) = server();
    let id = put_machine(&server, "press").await;

    let resp = server
        .patch(&format!("/api/v1/machine/{id}"))
        .json(&json!({"name": "big-press"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<u64>(), 2);

    let resp = server.get("/api/v1/machines").await;
    resp.assert_json(&json!([{"id": id, "name": "big-press", "version": 2}]));
}

#[tokio::test]
async fn test_patch_machine_rejects_empty_patch() {
    let (server, _) = server();
    let id = put_machine(&server, "press").await;

    let resp = server
        .patch(&format!("/api/v1/machine/{id}"))
        .json(&json!({}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({"what": "ConstraintViolation", "why": "Empty patch"}));
}

#[tokio::test]
async fn test_patch_missing_machine() {
    let (server, _) = server();

    let resp = server
        .patch("/api/v1/machine/42")
        .json(&json!({"name": "ghost"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({"what": "MachineNotFound", "why": {"machine_id": 42}}));
}

#[tokio::test]
async fn test_delete_machine() {
    let (server, state) = server();
    let id = machine_with_state(&server).await;

    let resp = server.delete(&format!("/api/v1/machine/{id}")).await;
    assert_eq!(resp.status_code(), StatusCode::OK);

    server.get("/api/v1/machines").await.assert_json(&json!([]));
    assert!(state.store.machine_states(id).unwrap().is_empty());

    // Deleting again is harmless.
    let resp = server.delete(&format!("/api/v1/machine/{id}")).await;
    assert_eq!(resp.status_code(), StatusCode::OK);
}

// =============================================================================
// SCHEMA TESTS
// =============================================================================

#[tokio::test]
async fn test_body_must_be_an_object() {
    let (server, _) = server();

    let resp = server.post("/api/v1/put_machine").json(&json!([1, 2])).await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({"what": "SchemaViolation", "why": "data must be object"}));
}

#[tokio::test]
async fn test_malformed_json_is_a_schema_violation() {
    let (server, _) = server();

    let resp = server.post("/api/v1/machine").text("{not json").await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["what"], "SchemaViolation");
}

#[tokio::test]
async fn test_missing_name_is_a_schema_violation() {
    let (server, _) = server();

    let resp = server.post("/api/v1/machine").json(&json!({})).await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["what"], "SchemaViolation");
}

#[tokio::test]
async fn test_unknown_condition_is_a_schema_violation() {
    let (server, _) = server();
    let machine_id = put_machine(&server, "press").await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&json!({
            "machine_id": machine_id,
            "start": 1000,
            "stop": 2000,
            "condition": "dancing",
        }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["what"], "SchemaViolation");
}

#[tokio::test]
async fn test_stop_before_start() {
    let (server, _) = server();
    let machine_id = put_machine(&server, "press").await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(machine_id, 2000, 1000))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({"what": "ConstraintViolation", "why": "stop before start"}));
}

#[tokio::test]
async fn test_malformed_machine_id_is_a_schema_violation() {
    let (server, _) = server();

    let resp = server
        .patch("/api/v1/machine/abc")
        .json(&json!({"name": "ghost"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["what"], "SchemaViolation");

    let resp = server.delete("/api/v1/machine/-1").await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["what"], "SchemaViolation");
}

// =============================================================================
// MACHINE STATE TESTS
// =============================================================================

#[tokio::test]
async fn test_machine_state_works() {
    let (server, _) = server();
    machine_with_state(&server).await;
}

#[tokio::test]
async fn test_machine_doesnt_exist() {
    let (server, _) = server();

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(1984, 1000, 2000))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({"what": "MachineNotFound", "why": {"machine_id": 1984}}));
}

async fn assert_overlap(start: i64, stop: i64) {
    let (server, _) = server();
    let machine_id = machine_with_state(&server).await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(machine_id, start, stop))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({
        "what": "MachineStateOverlap",
        "why": {"machine_id": 1, "start": 1000, "stop": 2000},
    }));
}

#[tokio::test]
async fn test_overlap_before() {
    assert_overlap(500, 1500).await;
}

#[tokio::test]
async fn test_overlap_after() {
    assert_overlap(1500, 2500).await;
}

#[tokio::test]
async fn test_overlap_encompassing() {
    assert_overlap(900, 2500).await;
}

#[tokio::test]
async fn test_overlap_contained() {
    assert_overlap(1100, 1900).await;
}

#[tokio::test]
async fn test_adjacent_states_ok() {
    let (server, _) = server();
    let machine_id = machine_with_state(&server).await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(machine_id, 2000, 3000))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<u64>(), 2);
}

#[tokio::test]
async fn test_prolonged_ok() {
    let (server, state) = server();
    let machine_id = machine_with_state(&server).await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(machine_id, 1000, 2500))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<u64>(), 1);

    let stored = state
        .store
        .find_machine_state(machine_id, 1000)
        .unwrap()
        .unwrap();
    assert_eq!(stored.stop, 2500);
}

#[tokio::test]
async fn test_repeated_request_ok() {
    let (server, _) = server();
    let machine_id = machine_with_state(&server).await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(machine_id, 1000, 2000))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.json::<u64>(), 1);
}

#[tokio::test]
async fn test_error_on_condition_changed() {
    let (server, _) = server();
    let machine_id = machine_with_state(&server).await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&json!({
            "machine_id": machine_id,
            "start": 1000,
            "stop": 2500,
            "condition": "broken",
        }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({
        "what": "MachineStateConditionChanged",
        "why": {"old": "working", "new": "broken"},
    }));
}

#[tokio::test]
async fn test_shortening_to_an_instant_is_rejected() {
    let (server, state) = server();
    let machine_id = machine_with_state(&server).await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&working(machine_id, 1000, 1000))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    resp.assert_json(&json!({
        "what": "MachineStateOverlap",
        "why": {"machine_id": 1, "start": 1000, "stop": 2000},
    }));

    let stored = state
        .store
        .find_machine_state(machine_id, 1000)
        .unwrap()
        .unwrap();
    assert_eq!(stored.stop, 2000);
}

#[tokio::test]
async fn test_measurements_are_stored() {
    let (server, state) = server();
    let machine_id = put_machine(&server, "press").await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&json!({
            "machine_id": machine_id,
            "start": 0,
            "stop": 60,
            "condition": "idle",
            "avg_power_consumption": 1.5,
            "total_energy": 90.0,
            "pieces": 12,
        }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::OK);

    let stored = state.store.find_machine_state(machine_id, 0).unwrap().unwrap();
    assert_eq!(stored.condition, MachineCondition::Idle);
    assert_eq!(stored.avg_power_consumption, Some(1.5));
    assert_eq!(stored.total_energy, Some(90.0));
    assert_eq!(stored.pieces, Some(12));
    assert_eq!(stored.min_power_consumption, None);
}

#[tokio::test]
async fn test_negative_energy_is_rejected() {
    let (server, _) = server();
    let machine_id = put_machine(&server, "press").await;

    let resp = server
        .post("/api/v1/put_machine_state")
        .json(&json!({
            "machine_id": machine_id,
            "start": 0,
            "stop": 60,
            "condition": "idle",
            "total_energy": -1.0,
        }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["what"], "SchemaViolation");
}

// =============================================================================
// EMISSION TESTS
// =============================================================================

#[tokio::test]
async fn test_mutations_are_emitted() {
    let (server, state) = server();
    let mut events = state.events.subscribe();

    let id = put_machine(&server, "press").await;
    server
        .patch(&format!("/api/v1/machine/{id}"))
        .json(&json!({"name": "big-press"}))
        .await;
    server.delete(&format!("/api/v1/machine/{id}")).await;
    server.delete(&format!("/api/v1/machine/{id}")).await;

    assert_eq!(events.try_recv().unwrap(), Emission::put_machine(id, "press", 1));
    assert_eq!(
        events.try_recv().unwrap(),
        Emission::put_machine(id, "big-press", 2)
    );
    assert_eq!(events.try_recv().unwrap(), Emission::delete_machine(id));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_rejections_are_not_emitted() {
    let (server, state) = server();
    let mut events = state.events.subscribe();

    let resp = server
        .patch("/api/v1/machine/9")
        .json(&json!({"name": "ghost"}))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert!(events.try_recv().is_err());
}

// =============================================================================
// WEBSOCKET TESTS
// =============================================================================

/// Create a server on a real socket so `/ws` can be upgraded.
fn ws_server(capacity: usize) -> (TestServer, AppState) {
    let state = AppState::with_capacity(RedbStore::in_memory().unwrap(), capacity);
    let router = create_router(state.clone(), &RouterOptions::default());
    let server = TestServer::builder()
        .http_transport()
        .build(router)
        .unwrap();
    (server, state)
}

#[tokio::test]
async fn test_observer_receives_mutations() {
    let (server, _) = ws_server(16);
    let mut observer = server.get_websocket("/ws").await.into_websocket().await;

    let id = put_machine(&server, "press").await;
    server.delete(&format!("/api/v1/machine/{id}")).await;

    observer
        .assert_receive_json(&json!({
            "event": "put_machine",
            "data": {"id": id, "name": "press", "version": 1},
        }))
        .await;
    observer
        .assert_receive_json(&json!({"event": "delete_machine", "data": {"id": id}}))
        .await;
}

#[tokio::test]
async fn test_machine_change_reaches_other_observers() {
    let (server, _) = ws_server(16);
    let mut sender = server.get_websocket("/ws").await.into_websocket().await;
    let mut observer = server.get_websocket("/ws").await.into_websocket().await;

    let frame = json!({"event": "machine_change", "data": {"id": 2, "lamp": "red"}});
    sender.send_json(&frame).await;

    observer.assert_receive_json(&frame).await;
    sender.assert_receive_json(&frame).await;
}

#[tokio::test]
async fn test_lagging_observer_keeps_receiving() {
    let (server, state) = ws_server(2);
    let mut observer = server.get_websocket("/ws").await.into_websocket().await;

    // No await in between: the relay cannot drain the channel, so it lags.
    for id in 1..=10 {
        state.emit(Emission::delete_machine(id));
    }

    observer
        .assert_receive_json(&json!({"event": "delete_machine", "data": {"id": 9}}))
        .await;
    observer
        .assert_receive_json(&json!({"event": "delete_machine", "data": {"id": 10}}))
        .await;

    let id = put_machine(&server, "press").await;
    observer
        .assert_receive_json(&json!({
            "event": "put_machine",
            "data": {"id": id, "name": "press", "version": 1},
        }))
        .await;
}

// =============================================================================
// STATIC FILE TESTS
// =============================================================================

#[tokio::test]
async fn test_static_files_are_served() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("index.html"), "<h1>mesito</h1>").unwrap();
    std::fs::write(temp.path().join("app.js"), "console.log(1);").unwrap();

    let options = RouterOptions {
        cors_allowed_all_origins: true,
        static_dir: temp.path().to_path_buf(),
    };
    let state = AppState::new(RedbStore::in_memory().unwrap());
    let server = TestServer::new(create_router(state, &options)).unwrap();

    let resp = server.get("/").await;
    assert_eq!(resp.status_code(), StatusCode::OK);
    assert_eq!(resp.text(), "<h1>mesito</h1>");

    let resp = server.get("/app.js").await;
    assert_eq!(resp.text(), "console.log(1);");

    let resp = server.get("/missing.css").await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
}
