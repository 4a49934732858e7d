//! Vendor matching webhook server.
//!
//! One authenticated POST endpoint for the document pipeline plus a health
//! check for the process manager. All matching logic lives in the
//! `vendor-match` library; this crate is wiring.

mod auth;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use vendor_match::store::executor::{PgBackend, ResilientExecutor};
use vendor_match::{
    ConnectorConfig, ConnectorError, MatchEngine, PgVendorStore, VendorMatchHandler,
    WebhookRequest, WebhookResponse,
};

#[derive(Clone)]
pub struct AppState {
    handler: Arc<VendorMatchHandler<PgVendorStore>>,
    secret: Arc<str>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vendor_match=info,vendor_match_web=info,tower_http=debug".into()
            }),
        )
        .init();
    dotenvy::dotenv().ok();

    let config = ConnectorConfig::from_env();
    let state = build_state(&config)?;
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!(%addr, "starting vendor matching webhook server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state(config: &ConnectorConfig) -> anyhow::Result<AppState> {
    // The connection itself is established lazily on first query; startup
    // never blocks on an unreachable store.
    let backend = PgBackend::from_url(&config.database_url)?;
    let store = PgVendorStore::new(
        ResilientExecutor::new(backend),
        config.similarity_threshold,
    );
    Ok(AppState {
        handler: Arc::new(VendorMatchHandler::new(MatchEngine::new(store))),
        secret: Arc::from(config.webhook_secret.as_str()),
    })
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/vendor_matching", post(vendor_matching))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_signature,
        ))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn vendor_matching(
    State(state): State<AppState>,
    Json(request): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let response = state.handler.handle(request).await?;
    Ok(Json(response))
}

// Useful when the connector runs under a managed environment (e.g. Kubernetes).
async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

struct ApiError(ConnectorError);

impl From<ConnectorError> for ApiError {
    fn from(err: ConnectorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ConnectorError::RequestShape(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ConnectorError::Store(err) => {
                error!(error = %err, "store failure while matching");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "vendor store failure".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::CONTENT_TYPE, Request};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let backend =
            PgBackend::from_url("postgresql://postgres@localhost:5432/vendor_match_test").unwrap();
        AppState {
            handler: Arc::new(VendorMatchHandler::new(MatchEngine::new(
                PgVendorStore::new(ResilientExecutor::new(backend), 0.3),
            ))),
            secret: Arc::from("Jefe"),
        }
    }

    #[tokio::test]
    async fn healthz_returns_no_content() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unsigned_webhook_request_is_unauthorized() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/vendor_matching")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("missing signature header"));
    }

    #[tokio::test]
    async fn malformed_signature_header_is_distinguished() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/vendor_matching")
                    .header(CONTENT_TYPE, "application/json")
                    .header(auth::SIGNATURE_HEADER, "sha1deadbeef")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("incorrect signature header format"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_as_too_large() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/vendor_matching")
                    .header(CONTENT_TYPE, "application/json")
                    .header(auth::SIGNATURE_HEADER, "sha1=00")
                    .body(Body::from(vec![b' '; auth::BODY_LIMIT + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("unable to read request body"));
    }
}
