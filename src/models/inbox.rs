use serde::{Deserialize, Serialize};

/// A private message. Messages are never edited, so there is no update time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Inbox {
    pub inbox_id: i64,
    pub receiver_id: i64,
    pub sender_id: i64,
    pub content_markdown: String,
    pub content_rendered: String,
    pub create_time: i64,
    pub read_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    pub content_markdown: String,
}
