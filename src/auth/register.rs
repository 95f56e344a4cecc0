use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{appresult::AppError, db::Db, users::{Role, User}, AppResult, AppState};

use super::{issue_token, password, Session};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}

pub(crate) fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::bad_request("invalid email address")),
    }
}

/// Concurrent sign-ups can all pass the pre-check; the UNIQUE index decides.
fn email_taken(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref e) if e.is_unique_violation() => AppError::conflict("email already registered"),
        err => err.into(),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db): State<Db>,
    Json(RegisterRequest { email, password, display_name, role }): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Session>)> {
    if role == Role::Admin {
        return Err(AppError::forbidden("admin accounts cannot be self-registered"));
    }
    let email = normalize_email(&email)?;
    let display_name = display_name.trim().to_owned();
    if display_name.is_empty() {
        return Err(AppError::bad_request("display name is required"));
    }
    if password.chars().count() < password::MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {} characters",
            password::MIN_PASSWORD_LEN
        )));
    }

    let taken = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE email=?")
        .bind(&email)
        .fetch_optional(&db.pool)
        .await?
        .is_some();
    if taken {
        return Err(AppError::conflict("email already registered"));
    }

    let user = User {
        id: Uuid::now_v7().to_string(),
        email,
        display_name,
        role,
        created_at: OffsetDateTime::now_utc(),
    };
    let password_hash = password::hash(&password)?;

    let mut tx = db.begin_write().await?;
    sqlx::query("INSERT INTO users (id,email,password_hash,display_name,role,created_at) VALUES (?,?,?,?,?,?)")
        .bind(&user.id)
        .bind(&user.email)
        .bind(password_hash)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(email_taken)?;

    let token = issue_token(&mut tx, &user.id).await?;
    tx.commit().await?;
    tracing::info!(user = %user.id, role = %user.role, "registered");

    Ok((StatusCode::CREATED, Json(Session { user, token })))
}
