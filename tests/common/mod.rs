//! Shared test utilities

#![allow(dead_code)]

use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use mesh_gateway::{Config, Daemon};
use tower::ServiceExt;

/// Config with the built-in topology and a fast poller
#[must_use]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.tick = Duration::from_millis(10);
    config
}

/// Start an event loop for `config` and return a router that feeds it
///
/// The loop stops once the router and all its clones are dropped.
pub fn spawn_gateway(config: Config) -> axum::Router {
    let (mainloop, state) = Daemon::new(config).build();
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        let _shutdown_tx = shutdown_tx;
        mainloop.run(shutdown_rx).await;
    });
    mesh_gateway::api::router(state)
}

/// A decoded HTTP reply
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body is not JSON")
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

/// Send one request through `app`
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder
        .body(Body::from(body.to_owned()))
        .expect("failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body")
        .to_vec();
    Reply {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &axum::Router, uri: &str) -> Reply {
    send(app, "GET", uri, &[], "").await
}

pub async fn put_json(app: &axum::Router, uri: &str, body: &str) -> Reply {
    send(app, "PUT", uri, &[("content-type", "application/json")], body).await
}

pub async fn post_json(app: &axum::Router, uri: &str, body: &str) -> Reply {
    send(app, "POST", uri, &[("content-type", "application/json")], body).await
}

pub async fn delete_json(app: &axum::Router, uri: &str, body: &str) -> Reply {
    send(app, "DELETE", uri, &[("content-type", "application/json")], body).await
}
