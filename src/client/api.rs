use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    auth::{LoginRequest, RegisterRequest, Session},
    messages::{
        Conversation, ConversationEnvelope, ConversationStatus, ConversationView, ConversationsEnvelope,
        Message, MessageEnvelope, Notice, SendMessage, StartConversation, StartedEnvelope, ThreadEnvelope,
        UnreadCount,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{message} ({status})")]
    Status { status: StatusCode, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
struct StatusFilter {
    status: ConversationStatus,
}

/// Typed calls against the REST surface, authenticated with a bearer token.
#[derive(Clone)]
pub struct Api {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl Api {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn decode<T: DeserializeOwned>(res: Response) -> ClientResult<T> {
        let status = res.status();
        if status.is_success() {
            return Ok(res.json().await?);
        }
        let message = match res.json::<ErrorBody>().await {
            Ok(ErrorBody { message }) => message,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_owned(),
        };
        Err(ClientError::Status { status, message })
    }

    pub async fn register(&mut self, req: &RegisterRequest) -> ClientResult<Session> {
        let res = self.request(Method::POST, "/auth/register").json(req).send().await?;
        let session: Session = Self::decode(res).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<Session> {
        let req = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let res = self.request(Method::POST, "/auth/login").json(&req).send().await?;
        let session: Session = Self::decode(res).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn conversations(&self, status: Option<ConversationStatus>) -> ClientResult<Vec<ConversationView>> {
        let mut req = self.request(Method::GET, "/messages/conversations");
        if let Some(status) = status {
            req = req.query(&StatusFilter { status });
        }
        let ConversationsEnvelope { conversations } = Self::decode(req.send().await?).await?;
        Ok(conversations)
    }

    pub async fn unread_count(&self) -> ClientResult<i64> {
        let res = self.request(Method::GET, "/messages/unread-count").send().await?;
        let UnreadCount { unread_count } = Self::decode(res).await?;
        Ok(unread_count)
    }

    pub async fn thread(&self, id: &str) -> ClientResult<ThreadEnvelope> {
        let res = self.request(Method::GET, &format!("/messages/conversations/{id}")).send().await?;
        Self::decode(res).await
    }

    pub async fn send(&self, id: &str, content: &str) -> ClientResult<Message> {
        let res = self.request(Method::POST, &format!("/messages/conversations/{id}/messages"))
            .json(&SendMessage { content: content.to_owned() })
            .send()
            .await?;
        let MessageEnvelope { message } = Self::decode(res).await?;
        Ok(message)
    }

    pub async fn start(&self, req: &StartConversation) -> ClientResult<StartedEnvelope> {
        let res = self.request(Method::POST, "/messages/conversations").json(req).send().await?;
        Self::decode(res).await
    }

    pub async fn mark_read(&self, id: &str) -> ClientResult<Conversation> {
        let res = self.request(Method::PATCH, &format!("/messages/conversations/{id}/read")).send().await?;
        let ConversationEnvelope { conversation } = Self::decode(res).await?;
        Ok(conversation)
    }

    pub async fn close(&self, id: &str) -> ClientResult<Conversation> {
        let res = self.request(Method::PATCH, &format!("/messages/conversations/{id}/close")).send().await?;
        let ConversationEnvelope { conversation } = Self::decode(res).await?;
        Ok(conversation)
    }

    pub async fn delete(&self, id: &str) -> ClientResult<String> {
        let res = self.request(Method::DELETE, &format!("/messages/conversations/{id}")).send().await?;
        let Notice { message } = Self::decode(res).await?;
        Ok(message)
    }
}
