mod conversations;
mod model;
mod send;
mod state;

use axum::{routing::{get, patch, post}, Router};
use sqlx::SqliteConnection;

use crate::{appresult::AppError, AppResult, AppState};

pub use model::{
    Conversation, ConversationEnvelope, ConversationKind, ConversationStatus, ConversationView,
    ConversationsEnvelope, LastMessage, ListQuery, Message, MessageEnvelope, Notice, SendMessage, Side,
    StartConversation, StartedEnvelope, ThreadEnvelope, UnreadCount,
};
use model::{ConversationRow, CONVERSATION_COLUMNS};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(conversations::list).post(conversations::start))
        .route("/unread-count", get(conversations::unread_count))
        .route("/conversations/{id}", get(conversations::thread).delete(state::delete))
        .route("/conversations/{id}/messages", post(send::send))
        .route("/conversations/{id}/read", patch(state::read))
        .route("/conversations/{id}/close", patch(state::close))
}

pub(crate) async fn fetch_conversation(conn: &mut SqliteConnection, id: &str) -> AppResult<Option<Conversation>> {
    Ok(
        sqlx::query_as::<_, ConversationRow>(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id=?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Conversation::from)
    )
}

/// Loads a conversation the caller takes part in.
pub(crate) async fn load_for(conn: &mut SqliteConnection, id: &str, user_id: &str) -> AppResult<(Conversation, Side)> {
    let Some(conversation) = fetch_conversation(conn, id).await? else {
        return Err(AppError::not_found("conversation"));
    };
    let Some(side) = conversation.side_of(user_id) else {
        tracing::info!(conversation = %id, user = %user_id, "not a participant");
        return Err(AppError::forbidden("you are not part of this conversation"));
    };
    Ok((conversation, side))
}

pub(crate) fn clean_content(content: &str, max_len: usize) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("message content is required"));
    }
    if content.chars().count() > max_len {
        return Err(AppError::bad_request(format!("message content is limited to {max_len} characters")));
    }
    Ok(content.to_owned())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn content_is_trimmed() {
        assert_eq!(clean_content("  see you at the callback \n", 100).unwrap(), "see you at the callback");
    }

    #[test]
    fn blank_content_is_rejected() {
        assert_eq!(clean_content(" \t\n", 100).unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(clean_content("ééééé", 5).is_ok());
        assert!(clean_content("éééééé", 5).is_err());
    }
}
