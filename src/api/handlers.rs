//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CancelResponse, ChatResponse, ErrorResponse, TokenSearchQuery, VerifyStartedResponse,
    VerifyTransactionRequest, VersionResponse,
};
use super::AppState;
use crate::chat::{chat_metadata, load_chat, ChatMetadata, ChatView};
use crate::notify::Notification;
use crate::runtime::RuntimeError;
use crate::tokens::{Token, TokenPrice};
use crate::verification::VerifyState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Header carrying the signed-in user's id, set by the auth proxy
const USER_ID_HEADER: &str = "x-user-id";

const APP_VERSION: &str = "0.4.7";
const IS_BETA: bool = true;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat pages
        .route("/api/chat/:id", get(get_chat))
        .route("/api/chat/:id/metadata", get(get_chat_metadata))
        // EAP purchase verification
        .route("/api/eap/verify", post(start_verification))
        .route("/api/eap/cancel", post(cancel_verification))
        .route("/api/eap/status", get(verification_status))
        // Toasts
        .route("/api/notifications/stream", get(stream_notifications))
        // Token proxy
        .route("/api/tokens", get(search_tokens))
        .route("/api/tokens/:address/price", get(token_price))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Pages
// ============================================================

async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ChatResponse>, AppError> {
    let view = load_chat(&state.db, &id, viewer(&headers), state.content_policy)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    match view {
        ChatView::Ready {
            conversation,
            messages,
        } => Ok(Json(ChatResponse {
            conversation,
            messages,
        })),
        ChatView::NotFound => Err(AppError::NotFound("Chat not found".to_string())),
    }
}

async fn get_chat_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ChatMetadata> {
    Json(chat_metadata(&state.db, &id, state.metadata_policy).await)
}

// ============================================================
// EAP Verification
// ============================================================

async fn start_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<VerifyTransactionRequest>,
) -> Result<Json<VerifyStartedResponse>, AppError> {
    let user_id = require_user(&headers)?;
    let session = state
        .verification
        .submit(user_id, req.tx_id)
        .await
        .map_err(|e| match e {
            RuntimeError::EmptyTransaction => AppError::BadRequest(e.to_string()),
            RuntimeError::Stopped => AppError::Internal(e.to_string()),
        })?;

    state
        .notifier
        .send_to(user_id, Notification::transaction_sent());

    Ok(Json(VerifyStartedResponse {
        session_id: session.id(),
    }))
}

async fn cancel_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CancelResponse>, AppError> {
    let user_id = require_user(&headers)?;
    state
        .verification
        .cancel_active(user_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(CancelResponse { ok: true }))
}

async fn verification_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifyState>, AppError> {
    let user_id = require_user(&headers)?;
    Ok(Json(state.verification.state(user_id).await))
}

async fn stream_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;
    Ok(sse_stream(state.notifier.subscribe(), user_id.to_string()))
}

// ============================================================
// Token Proxy
// ============================================================

async fn search_tokens(
    State(state): State<AppState>,
    Query(query): Query<TokenSearchQuery>,
) -> Json<Vec<Token>> {
    Json(state.tokens.search_tokens(&query.q).await)
}

async fn token_price(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<TokenPrice>, AppError> {
    state
        .tokens
        .get_token_price(&address)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No price for {address}")))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: APP_VERSION,
        beta: IS_BETA,
    })
}

// ============================================================
// Viewer Identity
// ============================================================

fn viewer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

fn require_user(headers: &HeaderMap) -> Result<&str, AppError> {
    viewer(headers)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::{Database, MessageRole, Visibility};
    use crate::notify::BroadcastNotifier;
    use crate::runtime::testing::MockVerifier;
    use crate::runtime::VerificationRegistry;
    use crate::tokens::JupiterClient;
    use crate::verification::VerifyPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(verifier: MockVerifier) -> AppState {
        test_state_with_config(verifier, &AppConfig::from_lookup(|_| None))
    }

    fn test_state_with_config(verifier: MockVerifier, config: &AppConfig) -> AppState {
        let db = Database::open_in_memory().unwrap();
        db.create_conversation("public-1", "alice", Some("Swap SOL"), Visibility::Public)
            .unwrap();
        db.create_conversation("private-1", "alice", None, Visibility::Private)
            .unwrap();
        db.add_message("m1", "private-1", MessageRole::User, &json!({ "text": "gm" }))
            .unwrap();

        let notifier = Arc::new(BroadcastNotifier::new(16));
        let verification = Arc::new(VerificationRegistry::new(
            VerifyPolicy::eap(),
            Arc::new(verifier),
            Arc::clone(&notifier),
        ));
        // Unroutable token API: every upstream call fails fast
        let tokens = Arc::new(
            JupiterClient::new("http://127.0.0.1:9/tokens", "http://127.0.0.1:9/quote").unwrap(),
        );

        AppState::new(db, verification, notifier, tokens, config)
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn get_as(uri: &str, user: &str) -> Request<Body> {
        Request::get(uri)
            .header(USER_ID_HEADER, user)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, user: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .header(USER_ID_HEADER, user)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_version() {
        let state = test_state(MockVerifier::new());
        let (status, body) = send(&state, get("/version")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "version": "0.4.7", "beta": true }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_public_chat() {
        let state = test_state(MockVerifier::new());
        let (status, body) = send(&state, get("/api/chat/public-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversation"]["title"], "Swap SOL");
        assert_eq!(body["messages"], json!([]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_chat_requires_owner() {
        let state = test_state(MockVerifier::new());

        let (status, body) = send(&state, get_as("/api/chat/private-1", "alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"][0]["content"]["text"], "gm");

        let (denied, _) = send(&state, get_as("/api/chat/private-1", "bob")).await;
        let (anonymous, _) = send(&state, get("/api/chat/private-1")).await;
        let (missing, _) = send(&state, get("/api/chat/ghost")).await;

        assert_eq!(denied, StatusCode::NOT_FOUND);
        assert_eq!(anonymous, StatusCode::NOT_FOUND);
        assert_eq!(missing, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_metadata() {
        let state = test_state(MockVerifier::new());

        let (status, body) = send(&state, get("/api/chat/public-1/metadata")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "title": "Chat - Swap SOL",
                "description": "Chat conversation: Swap SOL"
            })
        );

        let (status, body) = send(&state, get("/api/chat/ghost/metadata")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Chat Not Found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_is_server_error_when_propagated() {
        let config = AppConfig::from_lookup(|key| {
            (key == "NEUR_PROBE_ERRORS").then(|| "propagate".to_string())
        });
        let state = test_state_with_config(MockVerifier::new(), &config);
        state
            .db
            .execute_batch("DROP TABLE messages; DROP TABLE conversations;")
            .unwrap();

        let (status, body) = send(&state, get("/api/chat/public-1")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());

        // Metadata never fails: it degrades to the not-found text
        let (status, body) = send(&state, get("/api/chat/public-1/metadata")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Chat Not Found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_eap_routes_require_user() {
        let state = test_state(MockVerifier::new());

        let request = Request::post("/api/eap/verify")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "tx_id": "5xTx" }).to_string()))
            .unwrap();
        let (verify, body) = send(&state, request).await;
        assert_eq!(verify, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let cancel_request = Request::post("/api/eap/cancel").body(Body::empty()).unwrap();
        let (cancel, _) = send(&state, cancel_request).await;
        let (status, _) = send(&state, get("/api/eap/status")).await;
        let (stream, _) = send(&state, get("/api/notifications/stream")).await;

        assert_eq!(cancel, StatusCode::UNAUTHORIZED);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(stream, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_rejects_empty_transaction() {
        let state = test_state(MockVerifier::new());
        let mut rx = state.notifier.subscribe();

        let (status, body) = send(
            &state,
            post_json("/api/eap/verify", "alice", &json!({ "tx_id": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_flow_reports_status() {
        let verifier = MockVerifier::new();
        verifier.queue(Ok(false));
        verifier.queue(Ok(true));
        let state = test_state(verifier);
        let mut rx = state.notifier.subscribe();

        let (status, body) = send(
            &state,
            post_json("/api/eap/verify", "alice", &json!({ "tx_id": "5xTx" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.user_id, "alice");
        assert_eq!(sent.notification.title, "Transaction Sent");

        state
            .verification
            .watch("alice")
            .await
            .wait_for(|s| s.active_tx().is_some())
            .await
            .unwrap();
        let (_, status_body) = send(&state, get_as("/api/eap/status", "alice")).await;
        assert_eq!(status_body["type"], "verifying");
        assert_eq!(status_body["tx_id"], "5xTx");

        // Another user's status is untouched
        let (_, other) = send(&state, get_as("/api/eap/status", "bob")).await;
        assert_eq!(other, json!({ "type": "idle" }));

        let verified = rx.recv().await.unwrap();
        assert_eq!(verified.user_id, "alice");
        assert_eq!(verified.notification.title, "EAP Purchase Successful");

        let (_, status_body) = send(&state, get_as("/api/eap/status", "alice")).await;
        assert_eq!(status_body["type"], "confirmed");
        assert_eq!(status_body["session_id"], session_id.as_str());
        assert_eq!(status_body["attempts"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_returns_to_idle() {
        let state = test_state(MockVerifier::new());
        send(
            &state,
            post_json("/api/eap/verify", "alice", &json!({ "tx_id": "5xTx" })),
        )
        .await;

        let (status, body) =
            send(&state, post_json("/api/eap/cancel", "alice", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        // Let the runtime drain both events and outlive the first deferral
        tokio::time::sleep(Duration::from_secs(10)).await;
        let (_, status_body) = send(&state, get_as("/api/eap/status", "alice")).await;
        assert_eq!(status_body, json!({ "type": "idle" }));
    }

    #[tokio::test]
    async fn test_notification_stream_only_carries_own_deliveries() {
        let state = test_state(MockVerifier::new());
        let response = create_router(state.clone())
            .oneshot(get_as("/api/notifications/stream", "alice"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        state
            .notifier
            .send_to("bob", Notification::purchase_verified());
        state
            .notifier
            .send_to("alice", Notification::verification_timeout());

        let mut body = response.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.contains("event: notification"));
        assert!(text.contains("Verification Timeout"));
        assert!(!text.contains("EAP Purchase Successful"));
    }

    #[tokio::test]
    async fn test_token_proxy_degrades_when_upstream_is_down() {
        let state = test_state(MockVerifier::new());

        let (status, body) = send(&state, get("/api/tokens?q=sol")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = send(&state, get("/api/tokens")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&state, get("/api/tokens/So111/price")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
