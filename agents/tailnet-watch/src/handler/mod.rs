//! HTTP handler for the monitor
//!
//! `GET /` returns a snapshot of every stored device status. It never touches
//! the reconciliation path. `GET /health` and `GET /metrics` are always open.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tailnet_watch_core::StatusStore;
use tower_http::trace::TraceLayer;

use crate::contracts::*;
use crate::telemetry::MonitorMetrics;

/// Header carrying the shared secret
pub const AUTH_HEADER: &str = "x-auth-token";

/// Application state
#[derive(Debug)]
pub struct AppState {
    pub store: StatusStore,
    /// `None` leaves the status endpoint open
    pub auth_token: Option<String>,
    pub metrics: Arc<MonitorMetrics>,
}

impl AppState {
    pub fn new(store: StatusStore, auth_token: Option<String>, metrics: Arc<MonitorMetrics>) -> Self {
        Self {
            store,
            auth_token,
            metrics,
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(status_snapshot))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status_snapshot(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(expected) = state.auth_token.as_deref() {
        let provided = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!("Rejected status request with missing or invalid token");
            return (StatusCode::UNAUTHORIZED, Json(ApiError::new("Unauthorized"))).into_response();
        }
    }

    match state.store.snapshot().await {
        Ok(entries) => Json(StatusResponse {
            success: true,
            data: entries.iter().map(NodeStatusView::from).collect(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read status snapshot");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError::new(format!("Status store unavailable: {}", e))),
            )
                .into_response()
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_id: AGENT_ID.to_string(),
        agent_version: AGENT_VERSION.to_string(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode_text() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError::new(e.to_string()))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tailnet_watch_core::{KvStore, MemoryStore, NodeKey, NodeStatus, StoreResult};
    use tower::ServiceExt;

    /// Memory store that counts every access
    #[derive(Debug, Default)]
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl KvStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }

        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: String) -> StoreResult<()> {
            self.inner.put(key, value).await
        }

        async fn list(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list(prefix).await
        }
    }

    async fn seeded(auth_token: Option<&str>) -> (Arc<CountingStore>, Router) {
        let kv = Arc::new(CountingStore::default());
        let store = StatusStore::new(kv.clone());
        store
            .put(
                &NodeKey::new("n1", "nas"),
                &NodeStatus::outage_started(1_700_000_000_000),
            )
            .await
            .unwrap();
        store
            .put(&NodeKey::new("n2", "pi"), &NodeStatus::Online)
            .await
            .unwrap();

        let state = AppState::new(
            store,
            auth_token.map(str::to_string),
            Arc::new(MonitorMetrics::new().unwrap()),
        );
        (kv, create_router(Arc::new(state)))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_open_snapshot() {
        let (_, app) = seeded(None).await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);

        let mut data = body["data"].as_array().unwrap().clone();
        data.sort_by_key(|v| v["nodeId"].as_str().unwrap_or_default().to_string());
        assert_eq!(
            data[0],
            serde_json::json!({
                "nodeId": "n1",
                "shortName": "nas",
                "status": {
                    "state": "OFFLINE",
                    "alertTs": "2023-11-14T22:13:20.000Z",
                    "firstDownTs": "2023-11-14T22:13:20.000Z"
                }
            })
        );
        assert_eq!(data[1]["status"]["state"], "ONLINE");
        assert!(data[1]["status"]["alertTs"].is_null());
    }

    #[tokio::test]
    async fn test_bad_token_rejected_before_store_access() {
        let (kv, app) = seeded(Some("s3cret")).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(AUTH_HEADER, "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(kv.calls.load(Ordering::SeqCst), 0);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let (_, app) = seeded(Some("s3cret")).await;
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_accepted() {
        let (_, app) = seeded(Some("s3cret")).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(AUTH_HEADER, "s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_health_and_metrics_are_open() {
        let (_, app) = seeded(Some("s3cret")).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["agent_id"], AGENT_ID);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
