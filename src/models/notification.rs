use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub notification_id: i64,
    pub receiver_id: i64,
    pub sender_id: Option<i64>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub question_id: Option<i64>,
    pub article_id: Option<i64>,
    pub answer_id: Option<i64>,
    pub comment_id: Option<i64>,
    /// Snapshot of the row that was deleted, for `*_deleted` notifications.
    pub content_deleted: Option<serde_json::Value>,
    pub create_time: i64,
    pub read_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    QuestionAnswered,
    QuestionCommented,
    QuestionDeleted,
    ArticleCommented,
    ArticleDeleted,
    AnswerCommented,
    AnswerDeleted,
    CommentDeleted,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::QuestionAnswered => "question_answered",
            NotificationType::QuestionCommented => "question_commented",
            NotificationType::QuestionDeleted => "question_deleted",
            NotificationType::ArticleCommented => "article_commented",
            NotificationType::ArticleDeleted => "article_deleted",
            NotificationType::AnswerCommented => "answer_commented",
            NotificationType::AnswerDeleted => "answer_deleted",
            NotificationType::CommentDeleted => "comment_deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "question_answered" => Some(NotificationType::QuestionAnswered),
            "question_commented" => Some(NotificationType::QuestionCommented),
            "question_deleted" => Some(NotificationType::QuestionDeleted),
            "article_commented" => Some(NotificationType::ArticleCommented),
            "article_deleted" => Some(NotificationType::ArticleDeleted),
            "answer_commented" => Some(NotificationType::AnswerCommented),
            "answer_deleted" => Some(NotificationType::AnswerDeleted),
            "comment_deleted" => Some(NotificationType::CommentDeleted),
            _ => None,
        }
    }
}

/// Ids a notification points at, plus the deleted content snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRelationship {
    pub question_id: Option<i64>,
    pub article_id: Option<i64>,
    pub answer_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub content_deleted: Option<serde_json::Value>,
}
