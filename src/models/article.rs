use serde::{Deserialize, Serialize};

use super::{ColumnValue, ResourceKind, SoftDelete};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub article_id: i64,
    pub user_id: i64,
    pub title: String,
    pub content_markdown: String,
    pub content_rendered: String,
    pub comment_count: i64,
    pub create_time: i64,
    pub update_time: i64,
    pub delete_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content_markdown: String,
    pub captcha_token: Option<String>,
    pub captcha_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content_markdown: Option<String>,
}

impl SoftDelete for Article {
    const KIND: ResourceKind = ResourceKind::Article;
    const TABLE: &'static str = "articles";
    const PRIMARY_KEY: &'static str = "article_id";
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "title",
        "content_markdown",
        "content_rendered",
        "comment_count",
        "create_time",
        "update_time",
        "delete_time",
    ];

    fn id(&self) -> i64 {
        self.article_id
    }

    fn set_id(&mut self, id: i64) {
        self.article_id = id;
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
            "article_id" => Some(ColumnValue::Int(self.article_id)),
            "user_id" => Some(ColumnValue::Int(self.user_id)),
            "comment_count" => Some(ColumnValue::Int(self.comment_count)),
            "create_time" => Some(ColumnValue::Int(self.create_time)),
            "update_time" => Some(ColumnValue::Int(self.update_time)),
            _ => None,
        }
    }
}
