// rest/mod.rs — Public REST API server.
//
// Axum HTTP server, local-only by default. Bridges REST calls to the
// domain engines and exposes the per-household SSE event stream.
//
// Endpoints:
//   POST  /api/v1/households
//   POST  /api/v1/households/join
//   POST  /api/v1/households/{id}/leave
//   GET   /api/v1/households/{id}/summary
//   GET   /api/v1/households/{id}/leaderboard
//   GET   /api/v1/households/{id}/activity
//   GET   /api/v1/households/{id}/tasks
//   POST  /api/v1/households/{id}/tasks
//   POST  /api/v1/households/{id}/rewards
//   POST  /api/v1/households/{id}/challenges
//   GET   /api/v1/households/{id}/events   (SSE)
//   POST  /api/v1/tasks/{id}/complete
//   PATCH /api/v1/tasks/{id}
//   POST  /api/v1/tasks/{id}/comments
//   POST  /api/v1/rewards/{id}/redeem
//   POST  /api/v1/challenges/{id}/join
//   GET   /api/v1/health

pub mod auth;
pub mod routes;
pub mod sse;

use anyhow::Result;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(routes::health::health))
        // Households
        .route("/api/v1/households", post(routes::households::create))
        .route("/api/v1/households/join", post(routes::households::join))
        .route(
            "/api/v1/households/{id}/leave",
            post(routes::households::leave),
        )
        .route(
            "/api/v1/households/{id}/summary",
            get(routes::households::summary),
        )
        .route(
            "/api/v1/households/{id}/leaderboard",
            get(routes::households::leaderboard),
        )
        .route(
            "/api/v1/households/{id}/activity",
            get(routes::households::activity),
        )
        // Tasks
        .route(
            "/api/v1/households/{id}/tasks",
            get(routes::tasks::list).post(routes::tasks::create),
        )
        .route("/api/v1/tasks/{id}/complete", post(routes::tasks::complete))
        .route("/api/v1/tasks/{id}", patch(routes::tasks::update))
        .route(
            "/api/v1/tasks/{id}/comments",
            post(routes::tasks::comment),
        )
        // Rewards
        .route(
            "/api/v1/households/{id}/rewards",
            post(routes::rewards::create),
        )
        .route("/api/v1/rewards/{id}/redeem", post(routes::rewards::redeem))
        // Challenges
        .route(
            "/api/v1/households/{id}/challenges",
            post(routes::challenges::create),
        )
        .route(
            "/api/v1/challenges/{id}/join",
            post(routes::challenges::join),
        )
        // Event stream
        .route(
            "/api/v1/households/{id}/events",
            get(sse::household_events_sse),
        )
        .layer(cors)
        .with_state(ctx)
}
