//! Integration tests for the Espiga dashboard.
//!
//! The harness in this crate serves an in-process axum application that
//! imitates the bakery REST backend on an ephemeral port, records every
//! request it receives, and answers with canned responses the tests define.
//! [`BackendClient`](espiga_dashboard::backend::BackendClient) is pointed at
//! the real socket, so URL building, bearer auth, envelope decoding and the
//! line-plan compensation all run over actual HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p espiga-integration-tests
//! ```

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use url::Url;

use espiga_dashboard::backend::{AuthToken, BackendClient};

/// One request the mock backend received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    /// Parsed JSON body; `Null` when the request had none.
    pub body: serde_json::Value,
}

impl RecordedRequest {
    /// Whether this request is `method path`.
    #[must_use]
    pub fn is(&self, method: &str, path: &str) -> bool {
        self.method == method && self.path == path
    }
}

/// A mock bakery backend listening on an ephemeral port.
pub struct MockBackend {
    base_url: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockBackend {
    /// Serve `router` on `127.0.0.1:0`, recording every request.
    ///
    /// # Panics
    ///
    /// Panics when the listener cannot be bound; tests cannot proceed
    /// without it.
    #[allow(clippy::unwrap_used)]
    pub async fn start(router: Router) -> Self {
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        let app = router.layer(axum::middleware::from_fn(move |request, next| {
            let log = Arc::clone(&log);
            async move { record(&log, request, next).await }
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = Url::parse(&format!("http://{addr}/")).unwrap();
        Self { base_url, requests }
    }

    /// A client pointed at this mock backend.
    #[must_use]
    pub fn client(&self) -> BackendClient {
        BackendClient::new(self.base_url.clone())
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// First recorded request matching `method path`.
    #[must_use]
    pub fn find(&self, method: &str, path: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .find(|request| request.is(method, path))
    }
}

/// A fixed bearer token for tests.
#[must_use]
pub fn test_token() -> AuthToken {
    AuthToken::from("test-token".to_string())
}

async fn record(
    log: &Arc<Mutex<Vec<RecordedRequest>>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        authorization: parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string),
        body: serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null),
    };
    if let Ok(mut log) = log.lock() {
        log.push(recorded);
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}
