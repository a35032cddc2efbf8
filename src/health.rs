//! # Health reporter.
//!
//! A deliberately minimal axum router served by the primary on its own port,
//! so health checks keep answering even when the application listener is
//! saturated or the handler's collaborators are down. It reads nothing but
//! the shared [`WorkerTable`] — no database, no external service.
//!
//! ## Interface
//! - `GET /health` → `200`, JSON [`ClusterStatus`] (recomputed per request)
//! - anything else (path *or* method) → `404`, empty body

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterStatus, WorkerTable};
use crate::error::RuntimeError;

/// Builds the health router over a shared worker table.
pub(crate) fn router(table: Arc<WorkerTable>) -> Router {
    Router::new()
        .route("/health", get(health).fallback(not_found))
        .fallback(not_found)
        .with_state(table)
}

/// Binds the health listener. Failing to bind is fatal to the primary: a
/// cluster whose health cannot be observed is not operable.
pub(crate) async fn bind(addr: SocketAddr) -> Result<TcpListener, RuntimeError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| RuntimeError::Bind { addr, source })
}

/// Serves the router until `token` is cancelled.
pub(crate) async fn serve(
    listener: TcpListener,
    table: Arc<WorkerTable>,
    token: CancellationToken,
) {
    let addr = listener.local_addr().ok();
    info!("[primary] health endpoint on {addr:?}");

    let app = router(table);
    let shutdown = async move { token.cancelled().await };
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        let err = RuntimeError::Health { source: err };
        error!("[primary] {}", err.as_message());
    }
}

async fn health(State(table): State<Arc<WorkerTable>>) -> (StatusCode, Json<ClusterStatus>) {
    (StatusCode::OK, Json(table.status().await))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn seeded_table() -> Arc<WorkerTable> {
        let table = Arc::new(WorkerTable::new());
        table.insert_starting(11).await;
        table.insert_starting(22).await;
        table.mark_ready(11).await;
        table.mark_ready(22).await;
        table
    }

    #[tokio::test]
    async fn test_health_reports_pool_state() {
        let app = router(seeded_table().await);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["totalWorkers"], 2);
        assert_eq!(json["readyWorkers"], 2);
        assert_eq!(json["allWorkersReady"], true);
        assert_eq!(json["workers"]["11"], "ready");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_empty() {
        let app = router(seeded_table().await);

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_method_is_404() {
        let app = router(seeded_table().await);

        let response = app
            .oneshot(Request::post("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_does_not_cache() {
        let table = Arc::new(WorkerTable::new());
        table.insert_starting(5).await;
        let app = router(Arc::clone(&table));

        let first = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(first.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["readyWorkers"], 0);

        table.mark_ready(5).await;

        let second = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["readyWorkers"], 1);
        assert_eq!(json["allWorkersReady"], true);
    }
}
