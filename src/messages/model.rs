use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::{PublicUser, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ConversationKind {
    DirectorTalent,
    WriterUser,
}

impl ConversationKind {
    /// Which kind of conversation two roles may have, if any.
    pub fn between(a: Role, b: Role) -> Option<ConversationKind> {
        use Role::*;
        match (a, b) {
            (Director, Talent) | (Talent, Director) => Some(ConversationKind::DirectorTalent),
            (Writer | Admin, _) | (_, Writer | Admin) => Some(ConversationKind::WriterUser),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub sender_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub initiator_id: String,
    pub recipient_id: String,
    pub subject: String,
    pub last_message: Option<LastMessage>,
    pub initiator_unread: i64,
    pub recipient_unread: i64,
    pub status: ConversationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One side of a two-party conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Initiator,
    Recipient,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Initiator => Side::Recipient,
            Side::Recipient => Side::Initiator,
        }
    }

    pub(crate) fn unread_column(self) -> &'static str {
        match self {
            Side::Initiator => "initiator_unread",
            Side::Recipient => "recipient_unread",
        }
    }
}

impl Conversation {
    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        if self.initiator_id == user_id {
            Some(Side::Initiator)
        } else if self.recipient_id == user_id {
            Some(Side::Recipient)
        } else {
            None
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ConversationStatus::Open
    }

    pub fn unread_for(&self, side: Side) -> i64 {
        match side {
            Side::Initiator => self.initiator_unread,
            Side::Recipient => self.recipient_unread,
        }
    }

    pub fn participant(&self, side: Side) -> &str {
        match side {
            Side::Initiator => &self.initiator_id,
            Side::Recipient => &self.recipient_id,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ConversationRow {
    id: String,
    kind: ConversationKind,
    initiator_id: String,
    recipient_id: String,
    subject: String,
    last_message_content: Option<String>,
    last_message_sender_id: Option<String>,
    last_message_at: Option<OffsetDateTime>,
    initiator_unread: i64,
    recipient_unread: i64,
    status: ConversationStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

pub(crate) const CONVERSATION_COLUMNS: &str = "id,kind,initiator_id,recipient_id,subject,\
    last_message_content,last_message_sender_id,last_message_at,\
    initiator_unread,recipient_unread,status,created_at,updated_at";

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        let last_message = match (row.last_message_content, row.last_message_sender_id, row.last_message_at) {
            (Some(content), Some(sender_id), Some(sent_at)) => Some(LastMessage { content, sender_id, sent_at }),
            _ => None,
        };

        Conversation {
            id: row.id,
            kind: row.kind,
            initiator_id: row.initiator_id,
            recipient_id: row.recipient_id,
            subject: row.subject,
            last_message,
            initiator_unread: row.initiator_unread,
            recipient_unread: row.recipient_unread,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub delivered: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivered_at: Option<OffsetDateTime>,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub(crate) const MESSAGE_COLUMNS: &str =
    "id,conversation_id,sender_id,content,delivered,delivered_at,read,read_at,created_at";

/// A conversation as one participant sees it in their list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: i64,
    pub other_participant: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationsEnvelope {
    pub conversations: Vec<ConversationView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationEnvelope {
    pub conversation: Conversation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadEnvelope {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartedEnvelope {
    pub conversation: Conversation,
    pub message: Message,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message: Message,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversation {
    pub recipient_id: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub content: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ListQuery {
    pub status: Option<ConversationStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn director_and_talent_get_a_casting_thread() {
        assert_eq!(ConversationKind::between(Role::Director, Role::Talent), Some(ConversationKind::DirectorTalent));
        assert_eq!(ConversationKind::between(Role::Talent, Role::Director), Some(ConversationKind::DirectorTalent));
    }

    #[test]
    fn writers_and_admins_reach_anyone() {
        for other in [Role::Director, Role::Talent, Role::Writer, Role::Admin] {
            assert_eq!(ConversationKind::between(Role::Writer, other), Some(ConversationKind::WriterUser));
            assert_eq!(ConversationKind::between(other, Role::Admin), Some(ConversationKind::WriterUser));
        }
    }

    #[test]
    fn same_side_pairs_are_refused() {
        assert_eq!(ConversationKind::between(Role::Talent, Role::Talent), None);
        assert_eq!(ConversationKind::between(Role::Director, Role::Director), None);
    }

    #[test]
    fn snapshot_needs_every_column() {
        let now = OffsetDateTime::now_utc();
        let row = ConversationRow {
            id: "c".into(),
            kind: ConversationKind::WriterUser,
            initiator_id: "a".into(),
            recipient_id: "b".into(),
            subject: String::new(),
            last_message_content: Some("hi".into()),
            last_message_sender_id: None,
            last_message_at: Some(now),
            initiator_unread: 0,
            recipient_unread: 1,
            status: ConversationStatus::Open,
            created_at: now,
            updated_at: now,
        };
        let conversation = Conversation::from(row);
        assert_eq!(conversation.last_message, None);
        assert_eq!(conversation.side_of("b"), Some(Side::Recipient));
        assert_eq!(conversation.side_of("z"), None);
        assert_eq!(conversation.unread_for(Side::Recipient), 1);
        assert_eq!(conversation.participant(Side::Recipient.other()), "a");
    }

    #[test]
    fn view_serializes_flat_and_camel_cased() {
        let now = OffsetDateTime::now_utc();
        let view = ConversationView {
            conversation: Conversation {
                id: "c".into(),
                kind: ConversationKind::DirectorTalent,
                initiator_id: "a".into(),
                recipient_id: "b".into(),
                subject: "Callback".into(),
                last_message: None,
                initiator_unread: 0,
                recipient_unread: 2,
                status: ConversationStatus::Open,
                created_at: now,
                updated_at: now,
            },
            unread_count: 2,
            other_participant: PublicUser { id: "a".into(), display_name: "Dee".into(), role: Role::Director },
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["kind"], "director_talent");
        assert_eq!(json["unreadCount"], 2);
        assert_eq!(json["otherParticipant"]["displayName"], "Dee");
        assert!(json["lastMessage"].is_null());

        let back: ConversationView = serde_json::from_value(json).unwrap();
        assert_eq!(back.conversation.subject, "Callback");
        assert_eq!(back.other_participant.role, Role::Director);
    }
}
