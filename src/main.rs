//! Conversion Trainer backend — real-time WebSocket game orchestration for the conversion
//! practice multiplayer modes. `main` wires together the Store, the Registry, the
//! idle-room reaper, and the HTTP/WS router.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod auth;
mod config;
mod error;
mod handlers;
mod leaderboard;
mod models;
mod question;
mod registry;
mod room;
mod store;
mod tournament;
mod utils;
mod ws;

use config::Config;
use registry::Registry;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub registry: Arc<Registry>,
    pub ws_claims: Arc<ws::ConnectionClaims>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "conversion_trainer_server=debug,tower_http=debug,axum=trace".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let store: Arc<dyn Store> = match &config.store_url {
        Some(url) => {
            let pg = store::PgStore::connect(url)
                .await
                .expect("failed to connect to STORE_URL");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("STORE_URL not set, running with an in-memory store");
            Arc::new(store::InMemoryStore::new())
        }
    };

    let registry = Arc::new(Registry::new());
    registry::reaper::spawn(registry.clone(), config.room_idle_ttl);

    let state = AppState {
        store,
        config: config.clone(),
        registry,
        ws_claims: Arc::new(ws::ConnectionClaims::new()),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/mp/rooms", post(handlers::rooms::create_room))
        .route("/api/mp/rooms/join", post(handlers::rooms::join_room))
        .route(
            "/api/mp/rooms/{room_code}/start",
            post(handlers::rooms::start_room),
        )
        .route(
            "/api/tournaments",
            post(handlers::tournaments::create_tournament),
        )
        .route(
            "/api/tournaments/{code}",
            get(handlers::tournaments::get_tournament),
        )
        .route(
            "/api/tournaments/{code}/join",
            post(handlers::tournaments::join_tournament),
        )
        .route(
            "/api/tournaments/{code}/start",
            post(handlers::tournaments::start_tournament),
        )
        .route(
            "/api/tournaments/{code}/brackets",
            get(handlers::tournaments::list_brackets),
        )
        .route(
            "/api/conversion/session",
            post(handlers::conversion::create_session),
        )
        .route(
            "/api/conversion/scores",
            post(handlers::conversion::submit_score),
        )
        .route(
            "/api/conversion/leaderboard",
            get(handlers::conversion::get_leaderboard),
        )
        .route(
            "/api/conversion/xp-leaderboard",
            get(handlers::conversion::get_xp_leaderboard),
        )
        .route(
            "/api/conversion/progress",
            get(handlers::conversion::get_progress).post(handlers::conversion::post_progress),
        )
        .route(
            "/api/conversion/achievements/{id}/unlock",
            post(handlers::conversion::unlock_achievement),
        )
        .route("/ws/rooms/{room_id}", get(handlers::ws::room_ws_handler))
        .route(
            "/ws/tournaments/{id}/control",
            get(handlers::ws::tournament_ws_handler),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: std::net::SocketAddr = config
        .listen_addr
        .parse()
        .expect("LISTEN_ADDR must be a valid socket address");
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> impl axum::response::IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
