//! HTTP API server for the mesh gateway
//!
//! Every request is forwarded to the event loop's mailbox and answered with
//! whatever complete response comes back. The router has no routes of its
//! own; path and method resolution belong to the dispatch table.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::mainloop::{Envelope, Mailbox};
use crate::rest::{
    ACCEPT_HEADER, CONTENT_TYPE_HEADER, HttpMethod, HttpStatus, Request, Response,
};
use crate::{Error, Result};

/// Largest request body accepted
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state for the forwarding handler
#[derive(Debug, Clone)]
pub struct ApiState {
    pub mailbox: Mailbox,
    pub request_timeout: Duration,
}

impl ApiState {
    #[must_use]
    pub const fn new(mailbox: Mailbox, request_timeout: Duration) -> Self {
        Self {
            mailbox,
            request_timeout,
        }
    }
}

/// Build the router: a single fallback that forwards to the event loop
pub fn router(state: ApiState) -> Router {
    // CORS layer for cross-origin requests from browser tooling
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .fallback(forward)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn forward(
    State(state): State<ApiState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> axum::response::Response {
    let Some(method) = HttpMethod::parse(method.as_str()) else {
        tracing::debug!(%method, path = uri.path(), "unsupported method");
        return error_response(HttpStatus::MethodNotAllowed);
    };

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable request body");
            return error_response(HttpStatus::BadRequest);
        }
    };

    let mut request = Request::new(method, uri.path(), tokio::time::Instant::now().into_std())
        .with_body(body.to_vec());
    for name in [ACCEPT_HEADER, CONTENT_TYPE_HEADER] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            request = request.with_header(name, value);
        }
    }

    let id = Uuid::new_v4();
    let (reply, answer) = oneshot::channel();
    if state
        .mailbox
        .send(Envelope { id, request, reply })
        .await
        .is_err()
    {
        tracing::error!(request_id = %id, "event loop is gone");
        return error_response(HttpStatus::InternalServerError);
    }

    match tokio::time::timeout(state.request_timeout, answer).await {
        Ok(Ok(response)) => into_http(response),
        Ok(Err(_)) => {
            tracing::warn!(request_id = %id, "event loop dropped the request");
            error_response(HttpStatus::InternalServerError)
        }
        Err(_) => {
            tracing::warn!(request_id = %id, timeout = ?state.request_timeout, "request timed out");
            error_response(HttpStatus::from(&Error::Timeout))
        }
    }
}

fn error_response(status: HttpStatus) -> axum::response::Response {
    let mut response = Response::new();
    response.set_error(status);
    into_http(response)
}

fn into_http(response: Response) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status().code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = HeaderValue::from_static(response.content_type());
    let body = response.into_body();

    let mut http = axum::response::Response::new(Body::from(body));
    *http.status_mut() = status;
    http.headers_mut().insert(header::CONTENT_TYPE, content_type);
    http
}

/// API server
pub struct ApiServer {
    state: ApiState,
    addr: SocketAddr,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: ApiState, addr: SocketAddr) -> Self {
        Self { state, addr }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await.inspect_err(
            |e| tracing::error!(addr = %self.addr, error = %e, "failed to bind API server"),
        )?;

        tracing::info!(addr = %self.addr, "API server listening");

        axum::serve(listener, router(self.state)).await?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_response_carries_status_and_type() {
        let mut response = Response::new();
        response.set_status(HttpStatus::Created);
        response.set_body("{}");
        response.set_complete();

        let http = into_http(response);
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn timeout_error_maps_to_408() {
        let http = error_response(HttpStatus::from(&Error::Timeout));
        assert_eq!(http.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn bind_failure_is_io_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let (mailbox, _inbox) = tokio::sync::mpsc::channel(1);

        let err = ApiServer::new(ApiState::new(mailbox, Duration::from_secs(1)), addr)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn insufficient_storage_maps_to_507() {
        let http = error_response(HttpStatus::InsufficientStorage);
        assert_eq!(http.status(), StatusCode::INSUFFICIENT_STORAGE);
    }
}
