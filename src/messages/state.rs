use anyhow::anyhow;
use axum::{debug_handler, extract::{Path, State}, Json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::AuthUser, db::Db, AppResult, AppState};

use super::{fetch_conversation, load_for, ConversationEnvelope, Notice};

#[debug_handler(state = AppState)]
pub(crate) async fn read(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConversationEnvelope>> {
    let id = id.to_string();
    let mut tx = db.begin_write().await?;
    let (_, side) = load_for(&mut tx, &id, &user.id).await?;

    let now = OffsetDateTime::now_utc();
    let marked = sqlx::query(
        "UPDATE messages
         SET read=TRUE, read_at=?, delivered=TRUE, delivered_at=COALESCE(delivered_at, ?)
         WHERE conversation_id=? AND sender_id<>? AND read=FALSE"
    )
        .bind(now)
        .bind(now)
        .bind(&id)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let counter = side.unread_column();
    sqlx::query(&format!("UPDATE conversations SET {counter}=0 WHERE id=?"))
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    let conversation = fetch_conversation(&mut tx, &id).await?.ok_or_else(|| anyhow!("conversation vanished"))?;
    tx.commit().await?;

    tracing::debug!(conversation = %id, user = %user.id, marked, "read");
    Ok(Json(ConversationEnvelope { conversation }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn close(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConversationEnvelope>> {
    let id = id.to_string();
    let mut tx = db.begin_write().await?;
    let (conversation, _) = load_for(&mut tx, &id, &user.id).await?;

    if !conversation.is_open() {
        tx.commit().await?;
        return Ok(Json(ConversationEnvelope { conversation }));
    }

    sqlx::query("UPDATE conversations SET status='closed', updated_at=? WHERE id=?")
        .bind(OffsetDateTime::now_utc())
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    let conversation = fetch_conversation(&mut tx, &id).await?.ok_or_else(|| anyhow!("conversation vanished"))?;
    tx.commit().await?;

    tracing::info!(conversation = %id, by = %user.id, "conversation closed");
    Ok(Json(ConversationEnvelope { conversation }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notice>> {
    let id = id.to_string();
    let mut tx = db.begin_write().await?;
    load_for(&mut tx, &id, &user.id).await?;

    let removed = sqlx::query("DELETE FROM messages WHERE conversation_id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM conversations WHERE id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(conversation = %id, by = %user.id, removed, "conversation deleted");
    Ok(Json(Notice { message: "Conversation deleted".to_owned() }))
}
