//! API endpoint integration tests

use std::time::Duration;

use axum::http::StatusCode;

mod common;
use common::{delete_json, get, post_json, put_json, send, spawn_gateway, test_config};

#[tokio::test]
async fn test_unknown_path_is_404() {
    let app = spawn_gateway(test_config());

    let reply = get(&app, "/node/unknown").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let body = reply.json();
    assert_eq!(body["ErrorCode"], 404);
    assert_eq!(body["ErrorMessage"], "404 Not Found");
}

#[tokio::test]
async fn test_unsupported_method_is_405() {
    let app = spawn_gateway(test_config());

    let reply = post_json(&app, "/node/state", r#""enable""#).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);

    let reply = send(&app, "PATCH", "/node/state", &[], "").await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.json()["ErrorCode"], 405);
}

#[tokio::test]
async fn test_options_on_mutating_resource() {
    let app = spawn_gateway(test_config());

    let reply = send(&app, "OPTIONS", "/node/state", &[], "").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_empty());

    let reply = send(&app, "OPTIONS", "/node/rloc16", &[], "").await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_node_info() {
    let app = spawn_gateway(test_config());

    let reply = get(&app, "/node").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type(), "application/json");
    let node = reply.json();
    assert_eq!(node["State"], "leader");
    assert_eq!(node["Rloc16"], 1024);
    assert_eq!(node["NumOfRouter"], 3);

    let reply = get(&app, "/node/ext-panid").await;
    assert_eq!(reply.json(), "DEAD00BEEF00CAFE");
}

#[tokio::test]
async fn test_state_round_trip() {
    let app = spawn_gateway(test_config());

    let reply = put_json(&app, "/node/state", r#""disable""#).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(get(&app, "/node/state").await.json(), "disabled");

    let reply = put_json(&app, "/node/state", "enable").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST, "unquoted body");

    put_json(&app, "/node/state", r#""enable""#).await;
    assert_eq!(get(&app, "/node/state").await.json(), "leader");
}

#[tokio::test]
async fn test_active_dataset() {
    let app = spawn_gateway(test_config());

    let reply = send(
        &app,
        "GET",
        "/node/dataset/active",
        &[("accept", "text/plain")],
        "",
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type(), "text/plain");
    assert!(hex::decode(&reply.body).is_ok());

    let reply = put_json(&app, "/node/dataset/active", r#"{"Channel":20}"#).await;
    assert_eq!(reply.status, StatusCode::CONFLICT, "node is attached");

    put_json(&app, "/node/state", r#""disable""#).await;
    let reply = put_json(&app, "/node/dataset/active", r#"{"Channel":20}"#).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(get(&app, "/node/dataset/active").await.json()["Channel"], 20);
}

#[tokio::test]
async fn test_pending_dataset() {
    let app = spawn_gateway(test_config());

    let reply = get(&app, "/node/dataset/pending").await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert!(reply.body.is_empty());

    let reply = put_json(
        &app,
        "/node/dataset/pending",
        r#"{"ActiveDataset":{"Channel":25}}"#,
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST, "Delay is required");

    let reply = put_json(
        &app,
        "/node/dataset/pending",
        r#"{"ActiveDataset":{"Channel":25},"Delay":60000}"#,
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let pending = get(&app, "/node/dataset/pending").await.json();
    assert_eq!(pending["Delay"], 60000);
    assert_eq!(pending["ActiveDataset"]["Channel"], 25);
}

#[tokio::test]
async fn test_node_delete_erases_datasets() {
    let app = spawn_gateway(test_config());

    let reply = send(&app, "DELETE", "/node", &[], "").await;
    assert_eq!(reply.status, StatusCode::OK);

    assert_eq!(get(&app, "/node/state").await.json(), "disabled");
    let reply = get(&app, "/node/dataset/active").await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_commissioner_joiners() {
    let app = spawn_gateway(test_config());
    let joiner = |id: &str| format!(r#"{{"Pskd":"J01NME","JoinerId":"{id}","Timeout":60}}"#);

    let reply = post_json(&app, "/node/commissioner/joiner", &joiner("*")).await;
    assert_eq!(reply.status, StatusCode::CONFLICT, "commissioner not active");

    put_json(&app, "/node/commissioner/state", r#""enable""#).await;
    assert_eq!(get(&app, "/node/commissioner/state").await.json(), "active");

    for id in ["*", "0xabc/12", "18b4300000000001", "18b4300000000002"] {
        let reply = post_json(&app, "/node/commissioner/joiner", &joiner(id)).await;
        assert_eq!(reply.status, StatusCode::OK, "joiner {id}");
    }
    let reply = post_json(&app, "/node/commissioner/joiner", &joiner("18b4300000000003")).await;
    assert_eq!(reply.status, StatusCode::INSUFFICIENT_STORAGE);

    let reply = post_json(&app, "/node/commissioner/joiner", r#"{"Pskd":"J01NME"}"#).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = delete_json(&app, "/node/commissioner/joiner", r#""0xabc/12""#).await;
    assert_eq!(reply.status, StatusCode::OK);
    let joiners = get(&app, "/node/commissioner/joiner").await.json();
    assert_eq!(joiners.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_srp_client() {
    let app = spawn_gateway(test_config());

    put_json(&app, "/node/srp/client/state", r#""autostart""#).await;
    assert_eq!(get(&app, "/node/srp/client/state").await.json(), "enabled");

    let reply = put_json(
        &app,
        "/node/srp/client/host",
        r#"{"HostName":"printer","HostAddress":"auto"}"#,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(get(&app, "/node/srp/client/host").await.json()["Name"], "printer");

    let reply = post_json(
        &app,
        "/node/srp/client/service",
        r#"{"ServiceName":"_ipp._tcp","InstanceName":"printer","Port":631}"#,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let services = get(&app, "/node/srp/client/service").await.json();
    assert_eq!(services[0]["State"], "Registered");

    let reply = delete_json(
        &app,
        "/node/srp/client/service",
        r#"{"ServiceName":"_ipp._tcp","InstanceName":"scanner"}"#,
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_diagnostics_complete_after_window() {
    let app = spawn_gateway(test_config());

    let reply = get(&app, "/diagnostics").await;
    assert_eq!(reply.status, StatusCode::OK);

    let records = reply.json();
    let mut rlocs: Vec<u64> = records
        .as_array()
        .expect("records are a list")
        .iter()
        .filter_map(|r| r["Rloc16"].as_u64())
        .collect();
    rlocs.sort_unstable();
    // local leader plus the two routers; the child does not answer multicast
    assert_eq!(rlocs, vec![0x0400, 0x1000, 0x2000]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_request_times_out() {
    let mut config = test_config();
    config.server.request_timeout = Duration::from_millis(500);
    let app = spawn_gateway(config);

    let reply = get(&app, "/diagnostics").await;
    assert_eq!(reply.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(reply.json()["ErrorCode"], 408);

    // the loop keeps serving after abandoning the pending response
    assert_eq!(get(&app, "/node/rloc16").await.json(), 1024);
}
