use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{appresult::AppError, db::Db, users::{find_user, User}, AppResult, AppState};

use super::{issue_token, password, register::normalize_email, Session};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

const BAD_CREDENTIALS: &str = "invalid email or password";

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db): State<Db>,
    Json(LoginRequest { email, password }): Json<LoginRequest>,
) -> AppResult<Json<Session>> {
    let email = normalize_email(&email).map_err(|_| AppError::unauthorized(BAD_CREDENTIALS))?;

    let Some((user_id, stored)): Option<(String, String)> =
        sqlx::query_as("SELECT id,password_hash FROM users WHERE email=?")
            .bind(&email)
            .fetch_optional(&db.pool)
            .await?
    else {
        return Err(AppError::unauthorized(BAD_CREDENTIALS));
    };

    if !password::verify(&password, &stored) {
        tracing::info!(user = %user_id, "failed login");
        return Err(AppError::unauthorized(BAD_CREDENTIALS));
    }

    let user: User = find_user(&db.pool, &user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized(BAD_CREDENTIALS))?;
    let mut conn = db.pool.acquire().await?;
    let token = issue_token(&mut conn, &user.id).await?;

    tracing::info!(user = %user.id, "welcome {}", user.display_name);
    Ok(Json(Session { user, token }))
}
