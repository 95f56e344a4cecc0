use axum::{extract::{FromRef, FromRequestParts}, http::{header, request::Parts, HeaderMap}, routing::post, Router};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use time::OffsetDateTime;

use crate::{appresult::AppError, db::Db, users::User, AppResult, AppState};

mod login;
mod logout;
mod password;
mod register;

pub use login::LoginRequest;
pub use register::RegisterRequest;

const TOKEN_LEN: usize = 48;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/logout", post(logout::logout))
}

/// Response of register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// The caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    Db: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(AppError::unauthorized("missing bearer token"));
        };

        let db = Db::from_ref(state);
        let user = sqlx::query_as::<_, User>(
            "SELECT users.id,users.email,users.display_name,users.role,users.created_at
             FROM tokens JOIN users ON users.id=tokens.user_id WHERE tokens.token=?"
        )
            .bind(token)
            .fetch_optional(&db.pool)
            .await?;

        match user {
            Some(user) => Ok(AuthUser { user, token: token.to_owned() }),
            None => Err(AppError::unauthorized("invalid or expired token")),
        }
    }
}

pub(crate) async fn issue_token(conn: &mut SqliteConnection, user_id: &str) -> AppResult<String> {
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();

    sqlx::query("INSERT INTO tokens (token,user_id,created_at) VALUES (?,?,?)")
        .bind(&token)
        .bind(user_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&mut *conn)
        .await?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn reads_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
    }

    #[test]
    fn rejects_other_schemes_and_blanks() {
        assert_eq!(bearer_token(&headers("Basic abc123")), None);
        assert_eq!(bearer_token(&headers("Bearer    ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
