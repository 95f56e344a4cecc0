use axum::{debug_handler, extract::{Request, State}, middleware::Next, response::{IntoResponse, Response}, Json};
use serde::Serialize;

use crate::{appresult::AppError, db::Db};

pub const DB_UNAVAILABLE: &str =
    "Base de données indisponible, réessayez plus tard. / Database unavailable, please try again later.";

/// Fails fast with 503 while the store is down. Nothing is queued.
pub async fn require_db(State(db): State<Db>, request: Request, next: Next) -> Response {
    if !db.is_ready() {
        tracing::debug!(path = %request.uri().path(), "rejected, database not ready");
        return AppError::unavailable(DB_UNAVAILABLE).into_response();
    }
    next.run(request).await
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: &'static str,
}

#[debug_handler(state = crate::AppState)]
pub async fn health(State(db): State<Db>) -> Json<Health> {
    Json(Health {
        status: "ok",
        database: if db.is_ready() { "connected" } else { "disconnected" },
    })
}
