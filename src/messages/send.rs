use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use sqlx::SqliteConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{appresult::AppError, auth::AuthUser, db::Db, AppResult, AppState, Config};

use super::{clean_content, load_for, Conversation, Message, MessageEnvelope, SendMessage};

/// Stores a message and refreshes the snapshot and the other side's unread counter.
pub(crate) async fn append_message(
    conn: &mut SqliteConnection,
    conversation: &Conversation,
    sender_id: &str,
    content: String,
) -> AppResult<Message> {
    let Some(side) = conversation.side_of(sender_id) else {
        return Err(AppError::forbidden("you are not part of this conversation"));
    };

    let now = OffsetDateTime::now_utc();
    let message = Message {
        id: Uuid::now_v7().to_string(),
        conversation_id: conversation.id.clone(),
        sender_id: sender_id.to_owned(),
        content,
        delivered: false,
        delivered_at: None,
        read: false,
        read_at: None,
        created_at: now,
    };

    sqlx::query("INSERT INTO messages (id,conversation_id,sender_id,content,created_at) VALUES (?,?,?,?,?)")
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&mut *conn)
        .await?;

    let counter = side.other().unread_column();
    sqlx::query(&format!(
        "UPDATE conversations
         SET last_message_content=?, last_message_sender_id=?, last_message_at=?, updated_at=?, {counter}={counter}+1
         WHERE id=?"
    ))
        .bind(&message.content)
        .bind(&message.sender_id)
        .bind(now)
        .bind(now)
        .bind(&conversation.id)
        .execute(&mut *conn)
        .await?;

    Ok(message)
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    State(config): State<Arc<Config>>,
    Path(id): Path<Uuid>,
    Json(SendMessage { content }): Json<SendMessage>,
) -> AppResult<(StatusCode, Json<MessageEnvelope>)> {
    let content = clean_content(&content, config.max_message_len)?;

    let mut tx = db.begin_write().await?;
    let (conversation, _) = load_for(&mut tx, &id.to_string(), &user.id).await?;
    if !conversation.is_open() {
        return Err(AppError::conflict("conversation is closed"));
    }

    let message = append_message(&mut tx, &conversation, &user.id, content).await?;
    tx.commit().await?;

    tracing::debug!(conversation = %conversation.id, message = %message.id, "message sent");
    Ok((StatusCode::CREATED, Json(MessageEnvelope { message })))
}
