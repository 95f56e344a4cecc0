use axum::{debug_handler, extract::State, http::StatusCode};

use crate::{db::Db, AppResult, AppState};

use super::AuthUser;

#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    AuthUser { user, token }: AuthUser,
    State(db): State<Db>,
) -> AppResult<StatusCode> {
    sqlx::query("DELETE FROM tokens WHERE token=?")
        .bind(&token)
        .execute(&db.pool)
        .await?;

    tracing::info!(user = %user.id, "logged out");
    Ok(StatusCode::NO_CONTENT)
}
