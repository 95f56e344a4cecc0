use std::sync::Arc;

use anyhow::anyhow;
use axum::{debug_handler, extract::{Path, Query, State}, http::StatusCode, Json};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{appresult::AppError, auth::AuthUser, db::Db, users::{find_user, PublicUser}, AppResult, AppState, Config};

use super::{
    clean_content, fetch_conversation, load_for,
    model::{ConversationRow, CONVERSATION_COLUMNS, MESSAGE_COLUMNS},
    send::append_message,
    Conversation, ConversationKind, ConversationView, ConversationsEnvelope, ListQuery, Message,
    StartConversation, StartedEnvelope, ThreadEnvelope, UnreadCount,
};

const MAX_SUBJECT_LEN: usize = 200;

#[derive(FromRow)]
struct ListRow {
    #[sqlx(flatten)]
    conversation: ConversationRow,
    other_id: String,
    other_display_name: String,
    other_role: crate::users::Role,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    Query(ListQuery { status }): Query<ListQuery>,
) -> AppResult<Json<ConversationsEnvelope>> {
    let columns = CONVERSATION_COLUMNS.split(',').map(|c| format!("c.{c}")).collect::<Vec<_>>().join(",");
    let rows = sqlx::query_as::<_, ListRow>(&format!(
        "SELECT {columns},u.id AS other_id,u.display_name AS other_display_name,u.role AS other_role
         FROM conversations c
         JOIN users u ON u.id = CASE WHEN c.initiator_id=? THEN c.recipient_id ELSE c.initiator_id END
         WHERE (c.initiator_id=? OR c.recipient_id=?) AND (? IS NULL OR c.status=?)
         ORDER BY c.rowid DESC"
    ))
        .bind(&user.id)
        .bind(&user.id)
        .bind(&user.id)
        .bind(status)
        .bind(status)
        .fetch_all(&db.pool)
        .await?;

    let mut conversations = Vec::with_capacity(rows.len());
    for ListRow { conversation, other_id, other_display_name, other_role } in rows {
        let conversation = Conversation::from(conversation);
        let Some(side) = conversation.side_of(&user.id) else {
            continue;
        };
        conversations.push(ConversationView {
            unread_count: conversation.unread_for(side),
            other_participant: PublicUser { id: other_id, display_name: other_display_name, role: other_role },
            conversation,
        });
    }
    conversations.sort_by(|a, b| b.conversation.updated_at.cmp(&a.conversation.updated_at));

    Ok(Json(ConversationsEnvelope { conversations }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unread_count(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
) -> AppResult<Json<UnreadCount>> {
    let (unread_count,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(CASE WHEN initiator_id=? THEN initiator_unread ELSE recipient_unread END), 0)
         FROM conversations WHERE initiator_id=? OR recipient_id=?"
    )
        .bind(&user.id)
        .bind(&user.id)
        .bind(&user.id)
        .fetch_one(&db.pool)
        .await?;

    Ok(Json(UnreadCount { unread_count }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn thread(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ThreadEnvelope>> {
    let id = id.to_string();
    let mut conn = db.pool.acquire().await?;
    let (conversation, _) = load_for(&mut conn, &id, &user.id).await?;

    let delivered = sqlx::query(
        "UPDATE messages SET delivered=TRUE, delivered_at=?
         WHERE conversation_id=? AND sender_id<>? AND delivered=FALSE"
    )
        .bind(OffsetDateTime::now_utc())
        .bind(&id)
        .bind(&user.id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if delivered > 0 {
        tracing::debug!(conversation = %id, delivered, "marked delivered");
    }

    let messages = sqlx::query_as::<_, Message>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id=? ORDER BY rowid"
    ))
        .bind(&id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Json(ThreadEnvelope { conversation, messages }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn start(
    AuthUser { user, .. }: AuthUser,
    State(db): State<Db>,
    State(config): State<Arc<Config>>,
    Json(StartConversation { recipient_id, subject, content }): Json<StartConversation>,
) -> AppResult<(StatusCode, Json<StartedEnvelope>)> {
    let content = clean_content(&content, config.max_message_len)?;
    let subject = subject.as_deref().unwrap_or("").trim().to_owned();
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(AppError::bad_request(format!("subject is limited to {MAX_SUBJECT_LEN} characters")));
    }
    if recipient_id == user.id {
        return Err(AppError::bad_request("you cannot message yourself"));
    }

    let Some(recipient) = find_user(&db.pool, &recipient_id).await? else {
        return Err(AppError::not_found("recipient"));
    };
    let Some(kind) = ConversationKind::between(user.role, recipient.role) else {
        return Err(AppError::forbidden(format!("a {} cannot message a {}", user.role, recipient.role)));
    };

    let mut tx = db.begin_write().await?;

    let existing = sqlx::query_as::<_, ConversationRow>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations
         WHERE kind=? AND status='open'
           AND ((initiator_id=? AND recipient_id=?) OR (initiator_id=? AND recipient_id=?))
         ORDER BY rowid DESC LIMIT 1"
    ))
        .bind(kind)
        .bind(&user.id)
        .bind(&recipient.id)
        .bind(&recipient.id)
        .bind(&user.id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Conversation::from);

    let (conversation, status) = match existing {
        Some(conversation) => (conversation, StatusCode::OK),
        None => {
            let now = OffsetDateTime::now_utc();
            let id = Uuid::now_v7().to_string();
            sqlx::query(
                "INSERT INTO conversations (id,kind,initiator_id,recipient_id,subject,status,created_at,updated_at)
                 VALUES (?,?,?,?,?,'open',?,?)"
            )
                .bind(&id)
                .bind(kind)
                .bind(&user.id)
                .bind(&recipient.id)
                .bind(&subject)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            tracing::info!(conversation = %id, from = %user.id, to = %recipient.id, ?kind, "conversation opened");

            let conversation = fetch_conversation(&mut tx, &id).await?.ok_or_else(|| anyhow!("conversation vanished"))?;
            (conversation, StatusCode::CREATED)
        }
    };

    let message = append_message(&mut tx, &conversation, &user.id, content).await?;
    let conversation = fetch_conversation(&mut tx, &conversation.id).await?.ok_or_else(|| anyhow!("conversation vanished"))?;
    tx.commit().await?;

    Ok((status, Json(StartedEnvelope { conversation, message })))
}
