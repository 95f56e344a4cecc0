mod model;

use axum::{debug_handler, extract::{Query, State}, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, db::Db, AppResult, AppState};

pub use model::{PublicUser, Role, User};
use model::USER_COLUMNS;

const EXPLORE_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(explore))
        .route("/me", get(me))
}

#[derive(Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Serialize, Deserialize)]
pub struct UsersEnvelope {
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExploreQuery {
    pub role: Option<Role>,
    pub q: Option<String>,
}

fn like_escape(q: &str) -> String {
    let mut escaped = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) async fn find_user(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
    Ok(
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id=?"))
            .bind(user_id)
            .fetch_optional(db_pool)
            .await?
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn me(AuthUser { user, .. }: AuthUser) -> Json<UserEnvelope> {
    Json(UserEnvelope { user })
}

#[debug_handler(state = AppState)]
pub(crate) async fn explore(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    Query(ExploreQuery { role, q }): Query<ExploreQuery>,
) -> AppResult<Json<UsersEnvelope>> {
    let pattern = q
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", like_escape(&q)));

    let users = sqlx::query_as::<_, PublicUser>(
        "SELECT id,display_name,role FROM users
         WHERE id<>? AND (? IS NULL OR role=?) AND (? IS NULL OR lower(display_name) LIKE ? ESCAPE '\\')
         ORDER BY display_name COLLATE NOCASE, id LIMIT ?"
    )
        .bind(&user.id)
        .bind(role)
        .bind(role)
        .bind(&pattern)
        .bind(&pattern)
        .bind(EXPLORE_LIMIT)
        .fetch_all(&db.pool)
        .await?;

    tracing::debug!(user = %user.id, found = users.len(), "explore");
    Ok(Json(UsersEnvelope { users }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(like_escape("a_b"), "a\\_b");
        assert_eq!(like_escape("100%"), "100\\%");
        assert_eq!(like_escape(r"c:\x"), r"c:\\x");
        assert_eq!(like_escape("dana"), "dana");
    }
}
