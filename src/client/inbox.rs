use time::OffsetDateTime;
use uuid::Uuid;

use crate::messages::{Conversation, ConversationView, LastMessage, Message, StartConversation};

use super::api::{Api, ClientError};

/// A message in the open thread; `pending` until the server has it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMessage {
    pub message: Message,
    pub pending: bool,
}

/// Client-side messaging state, refreshed by polling.
///
/// Every action catches its own failure, logs it and queues a toast; nothing
/// is retried.
pub struct Inbox {
    api: Api,
    me: String,
    pub conversations: Vec<ConversationView>,
    pub active: Option<Conversation>,
    pub messages: Vec<LocalMessage>,
    pub unread_count: i64,
    pub toasts: Vec<String>,
}

impl Inbox {
    pub fn new(api: Api, me: impl Into<String>) -> Self {
        Self {
            api,
            me: me.into(),
            conversations: Vec::new(),
            active: None,
            messages: Vec::new(),
            unread_count: 0,
            toasts: Vec::new(),
        }
    }

    fn toast(&mut self, action: &str, err: ClientError) {
        tracing::warn!("{action} failed: {err}");
        self.toasts.push(format!("Could not {action}: {err}"));
    }

    pub fn take_toasts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.toasts)
    }

    fn view_mut(&mut self, id: &str) -> Option<&mut ConversationView> {
        self.conversations.iter_mut().find(|v| v.conversation.id == id)
    }

    /// Reloads the list and the unread badge.
    pub async fn refresh(&mut self) -> bool {
        let conversations = match self.api.conversations(None).await {
            Ok(conversations) => conversations,
            Err(e) => {
                self.toast("load conversations", e);
                return false;
            }
        };
        self.conversations = conversations;

        match self.api.unread_count().await {
            Ok(n) => {
                self.unread_count = n;
                true
            }
            Err(e) => {
                self.toast("load unread count", e);
                false
            }
        }
    }

    /// Opens a thread and marks it read.
    pub async fn select(&mut self, id: &str) -> bool {
        let thread = match self.api.thread(id).await {
            Ok(thread) => thread,
            Err(e) => {
                self.toast("open conversation", e);
                return false;
            }
        };
        self.active = Some(thread.conversation);
        self.messages = thread.messages
            .into_iter()
            .map(|message| LocalMessage { message, pending: false })
            .collect();

        match self.api.mark_read(id).await {
            Ok(conversation) => {
                let cleared = self.view_mut(id).map(|view| {
                    let cleared = view.unread_count;
                    view.unread_count = 0;
                    view.conversation = conversation.clone();
                    cleared
                });
                self.unread_count = (self.unread_count - cleared.unwrap_or(0)).max(0);
                self.active = Some(conversation);
                true
            }
            Err(e) => {
                self.toast("mark conversation read", e);
                false
            }
        }
    }

    /// Appends to the open thread right away and reconciles with the server's copy.
    pub async fn send(&mut self, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() {
            return false;
        }
        let Some(conversation_id) = self.active.as_ref().map(|c| c.id.clone()) else {
            return false;
        };

        let local_id = format!("pending-{}", Uuid::now_v7());
        self.messages.push(LocalMessage {
            message: Message {
                id: local_id.clone(),
                conversation_id: conversation_id.clone(),
                sender_id: self.me.clone(),
                content: content.to_owned(),
                delivered: false,
                delivered_at: None,
                read: false,
                read_at: None,
                created_at: OffsetDateTime::now_utc(),
            },
            pending: true,
        });

        match self.api.send(&conversation_id, content).await {
            Ok(message) => {
                let snapshot = LastMessage {
                    content: message.content.clone(),
                    sender_id: message.sender_id.clone(),
                    sent_at: message.created_at,
                };
                if let Some(local) = self.messages.iter_mut().find(|m| m.message.id == local_id) {
                    *local = LocalMessage { message, pending: false };
                }
                if let Some(active) = self.active.as_mut() {
                    active.last_message = Some(snapshot.clone());
                    active.updated_at = snapshot.sent_at;
                }
                if let Some(pos) = self.conversations.iter().position(|v| v.conversation.id == conversation_id) {
                    let mut view = self.conversations.remove(pos);
                    view.conversation.updated_at = snapshot.sent_at;
                    view.conversation.last_message = Some(snapshot);
                    self.conversations.insert(0, view);
                }
                true
            }
            Err(e) => {
                self.messages.retain(|m| m.message.id != local_id);
                self.toast("send message", e);
                false
            }
        }
    }

    /// Starts (or continues) a conversation with `recipient_id` and opens it.
    pub async fn start(&mut self, recipient_id: &str, subject: Option<&str>, content: &str) -> bool {
        let req = StartConversation {
            recipient_id: recipient_id.to_owned(),
            subject: subject.map(str::to_owned),
            content: content.to_owned(),
        };
        let started = match self.api.start(&req).await {
            Ok(started) => started,
            Err(e) => {
                self.toast("start conversation", e);
                return false;
            }
        };

        self.refresh().await && self.select(&started.conversation.id).await
    }

    pub async fn close(&mut self, id: &str) -> bool {
        match self.api.close(id).await {
            Ok(conversation) => {
                if let Some(view) = self.view_mut(id) {
                    view.conversation = conversation.clone();
                }
                if self.active.as_ref().is_some_and(|c| c.id == id) {
                    self.active = Some(conversation);
                }
                true
            }
            Err(e) => {
                self.toast("close conversation", e);
                false
            }
        }
    }

    pub async fn delete(&mut self, id: &str) -> bool {
        match self.api.delete(id).await {
            Ok(_) => {
                let dropped: i64 = self.conversations.iter()
                    .filter(|v| v.conversation.id == id)
                    .map(|v| v.unread_count)
                    .sum();
                self.conversations.retain(|v| v.conversation.id != id);
                self.unread_count = (self.unread_count - dropped).max(0);
                if self.active.as_ref().is_some_and(|c| c.id == id) {
                    self.active = None;
                    self.messages.clear();
                }
                true
            }
            Err(e) => {
                self.toast("delete conversation", e);
                false
            }
        }
    }

    /// Typing indicators are local only; nothing goes over the wire.
    pub fn typing(&self, is_typing: bool) {
        if let Some(active) = &self.active {
            tracing::debug!(conversation = %active.id, is_typing, "typing");
        }
    }
}
