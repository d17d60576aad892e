use serde::{Deserialize, Serialize};

use super::{ColumnValue, ResourceKind, SoftDelete};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Answer {
    pub answer_id: i64,
    pub question_id: i64,
    pub user_id: i64,
    pub content_markdown: String,
    pub content_rendered: String,
    pub comment_count: i64,
    pub create_time: i64,
    pub update_time: i64,
    pub delete_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnswerRequest {
    pub content_markdown: String,
    pub captcha_token: Option<String>,
    pub captcha_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAnswerRequest {
    pub content_markdown: String,
}

impl SoftDelete for Answer {
    const KIND: ResourceKind = ResourceKind::Answer;
    const TABLE: &'static str = "answers";
    const PRIMARY_KEY: &'static str = "answer_id";
    const COLUMNS: &'static [&'static str] = &[
        "question_id",
        "user_id",
        "content_markdown",
        "content_rendered",
        "comment_count",
        "create_time",
        "update_time",
        "delete_time",
    ];

    fn id(&self) -> i64 {
        self.answer_id
    }

    fn set_id(&mut self, id: i64) {
        self.answer_id = id;
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
            "answer_id" => Some(ColumnValue::Int(self.answer_id)),
            "question_id" => Some(ColumnValue::Int(self.question_id)),
            "user_id" => Some(ColumnValue::Int(self.user_id)),
            "comment_count" => Some(ColumnValue::Int(self.comment_count)),
            "create_time" => Some(ColumnValue::Int(self.create_time)),
            "update_time" => Some(ColumnValue::Int(self.update_time)),
            _ => None,
        }
    }
}
