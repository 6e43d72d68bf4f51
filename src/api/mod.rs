// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{rpc::SponsorshipRequest, state::AppState};

pub mod gateway;
pub mod health;

pub fn router(state: AppState) -> Router {
    let rpc = post(gateway::handle_rpc).fallback(gateway::method_not_allowed);

    let routes = Router::new()
        .route("/", rpc.clone())
        .route("/rpc", rpc)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        gateway::handle_rpc,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            SponsorshipRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Gateway", description = "Validated JSON-RPC relay to the sponsor"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
