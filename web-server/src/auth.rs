//! Request signature verification.
//!
//! The pipeline signs the raw request body with HMAC-SHA1 and sends the
//! digest as `X-Elis-Signature: sha1=<hex>`. Verification is constant time.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use ring::hmac;
use thiserror::Error;

use crate::AppState;

pub const SIGNATURE_HEADER: &str = "X-Elis-Signature";
const SIGNATURE_PREFIX: &str = "sha1";

/// Webhook payloads are small annotation trees; anything bigger is bogus.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("incorrect signature header format")]
    MalformedHeader,
    #[error("authorization failed")]
    InvalidSignature,
    #[error("unable to read request body")]
    UnreadableBody,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::UnreadableBody => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Middleware: rejects the request before it reaches the matching core unless
/// the body signature checks out. The body is re-attached for the handler.
pub async fn require_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (parts, body) = request.into_parts();
    let header = parts
        .headers
        .get(SIGNATURE_HEADER)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?
        .to_string();

    let bytes = to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|_| AuthError::UnreadableBody)?;
    verify_signature(&state.secret, &header, &bytes)?;

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}

/// Checks `sha1=<hex digest>` against the HMAC-SHA1 of `body`.
pub fn verify_signature(secret: &str, header: &str, body: &[u8]) -> Result<(), AuthError> {
    let (prefix, digest) = header.split_once('=').ok_or(AuthError::MalformedHeader)?;
    if prefix != SIGNATURE_PREFIX {
        return Err(AuthError::InvalidSignature);
    }
    let expected = hex::decode(digest).map_err(|_| AuthError::MalformedHeader)?;
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret.as_bytes());
    hmac::verify(&key, body, &expected).map_err(|_| AuthError::InvalidSignature)
}
