use serde::{Deserialize, Serialize};

use super::{ColumnValue, ResourceKind, SoftDelete};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub comment_id: i64,
    /// One of `question`, `article` or `answer`.
    pub commentable_type: String,
    pub commentable_id: i64,
    pub user_id: i64,
    pub content: String,
    pub create_time: i64,
    pub update_time: i64,
    pub delete_time: Option<i64>,
}

/// What a comment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Commentable {
    Question(i64),
    Article(i64),
    Answer(i64),
}

impl Commentable {
    pub fn new(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "question" => Some(Commentable::Question(id)),
            "article" => Some(Commentable::Article(id)),
            "answer" => Some(Commentable::Answer(id)),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Commentable::Question(_) => "question",
            Commentable::Article(_) => "article",
            Commentable::Answer(_) => "answer",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Commentable::Question(id) | Commentable::Article(id) | Commentable::Answer(id) => *id,
        }
    }
}

impl Comment {
    pub fn commentable(&self) -> Option<Commentable> {
        Commentable::new(&self.commentable_type, self.commentable_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub captcha_token: Option<String>,
    pub captcha_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

impl SoftDelete for Comment {
    const KIND: ResourceKind = ResourceKind::Comment;
    const TABLE: &'static str = "comments";
    const PRIMARY_KEY: &'static str = "comment_id";
    const COLUMNS: &'static [&'static str] = &[
        "commentable_type",
        "commentable_id",
        "user_id",
        "content",
        "create_time",
        "update_time",
        "delete_time",
    ];

    fn id(&self) -> i64 {
        self.comment_id
    }

    fn set_id(&mut self, id: i64) {
        self.comment_id = id;
    }

    fn owner_id(&self) -> i64 {
        self.user_id
    }

    fn delete_time(&self) -> Option<i64> {
        self.delete_time
    }

    fn set_delete_time(&mut self, time: Option<i64>) {
        self.delete_time = time;
    }

    fn column(&self, name: &str) -> Option<ColumnValue> {
        match name {
            "comment_id" => Some(ColumnValue::Int(self.comment_id)),
            "commentable_type" => Some(ColumnValue::Text(self.commentable_type.clone())),
            "commentable_id" => Some(ColumnValue::Int(self.commentable_id)),
            "user_id" => Some(ColumnValue::Int(self.user_id)),
            "create_time" => Some(ColumnValue::Int(self.create_time)),
            "update_time" => Some(ColumnValue::Int(self.update_time)),
            _ => None,
        }
    }
}
