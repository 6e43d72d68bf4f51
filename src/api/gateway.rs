// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The sponsorship RPC endpoint.
//!
//! A body moves through `received → method_filter → authenticate →
//! rate_check → validate* → forward`. Any failure rejects the whole body
//! before the upstream is contacted; the error carries the id of the call
//! that failed.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::{Session, SessionCredentials, SessionError};
use crate::error::{GatewayError, RpcFailure};
use crate::ratelimit::RateKey;
use crate::rpc::{RpcBody, SponsorshipRequest};
use crate::state::AppState;
use crate::validation::{
    catalog::{is_allowed_method, requires_user_op},
    validate_sponsorship,
};

/// Validate a JSON-RPC body and relay it to the sponsor.
#[utoipa::path(
    post,
    path = "/",
    tag = "Gateway",
    request_body = SponsorshipRequest,
    responses(
        (status = 200, description = "Upstream response, relayed verbatim"),
        (status = 400, description = "Malformed JSON-RPC body or params"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Method, ownership, allowlist or call policy rejection"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 502, description = "Upstream unreachable"),
        (status = 503, description = "Allowlist store unavailable")
    )
)]
pub async fn handle_rpc(
    State(state): State<AppState>,
    credentials: SessionCredentials,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("rpc", %request_id);

    async move {
        match process(&state, &credentials, body).await {
            Ok(response) => response,
            Err(failure) => {
                tracing::warn!(
                    %request_id,
                    stage = failure.error.stage(),
                    method = failure.method.as_deref().unwrap_or("-"),
                    reason = failure.error.reason(),
                    error = %failure.error,
                    "Request rejected"
                );
                failure.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Any HTTP method other than POST on the RPC routes.
pub async fn method_not_allowed() -> Response {
    tracing::warn!(
        stage = "received",
        reason = GatewayError::HttpMethodNotAllowed.reason(),
        "Request rejected"
    );
    RpcFailure::new(Value::Null, GatewayError::HttpMethodNotAllowed).into_response()
}

async fn process(
    state: &AppState,
    credentials: &SessionCredentials,
    body: Bytes,
) -> Result<Response, RpcFailure> {
    let rpc = RpcBody::parse(&body)?;
    let requests = rpc.requests();
    tracing::debug!(calls = requests.len(), "Body received");

    if let Some(rejected) = requests.iter().find(|r| !is_allowed_method(&r.method)) {
        return Err(attribute(
            rejected,
            GatewayError::MethodNotAllowed(rejected.method.clone()),
        ));
    }
    tracing::debug!("Methods allowed");

    // Only sponsorship methods need a session.
    let session = match requests.iter().find(|r| requires_user_op(&r.method)) {
        Some(first) => {
            let session = authenticate(state, credentials)
                .await
                .map_err(|e| attribute(first, e.into()))?;
            tracing::debug!(owner = %session.address, "Session verified");
            Some(session)
        }
        None => None,
    };

    let key = match &session {
        Some(session) => RateKey::Session(session.rate_limit_key()),
        None => credentials.anonymous_key(),
    };
    let allowance = state
        .rate_limiter
        .check(&key)
        .map_err(|e| RpcFailure::new(rpc.body_id(), e))?;
    tracing::debug!(remaining = allowance.remaining, "Rate check passed");

    if let Some(session) = &session {
        for request in requests.iter().filter(|r| requires_user_op(&r.method)) {
            let validated = validate_sponsorship(state, &request.params, session)
                .await
                .map_err(|e| attribute(request, e))?;
            tracing::info!(
                method = %request.method,
                sender = %validated.sender,
                mode = ?validated.primary.mode,
                creator_token = %validated.primary.creator_token,
                "Sponsorship validated"
            );
        }
    }

    let upstream = state
        .upstream
        .forward(body)
        .await
        .map_err(|e| RpcFailure::new(rpc.body_id(), e))?;
    tracing::debug!(status = upstream.status.as_u16(), "Forwarded upstream");

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    if let Some(content_type) = upstream.content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}

async fn authenticate(
    state: &AppState,
    credentials: &SessionCredentials,
) -> Result<Session, SessionError> {
    let verifier = state.sessions.as_ref().ok_or(SessionError::NotConfigured)?;
    let token = credentials.token()?;
    verifier.verify(token).await
}

fn attribute(request: &SponsorshipRequest, error: GatewayError) -> RpcFailure {
    RpcFailure::new(request.id.clone(), error).with_method(&request.method)
}
