pub mod appresult;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod gate;
pub mod messages;
pub mod users;

use std::sync::Arc;

use axum::{extract::FromRef, middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use db::Db;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Db, config: Config) -> Self {
        Self { db, config: Arc::new(config) }
    }
}

pub fn app(state: AppState) -> Router {
    let gated = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/messages", messages::router())
        .route_layer(middleware::from_fn_with_state(state.db.clone(), gate::require_db));

    let app = Router::new()
        .route("/health", get(gate::health))
        .merge(gated)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    if state.config.cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
