// Shapes rows into API responses and embeds requested sub-resources
pub mod content;
pub mod image;
pub mod notification;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Answer, Article, Comment, Question, UserBrief};
use crate::services::{AnswerService, ArticleService, CommentService, ImageService, QuestionService, UserService, VoteService};
use crate::Result;

/// Embedded sub-resources. Only the requested ones are present.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Relationships {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<UserBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<ArticleBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerBrief>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentBrief>,
    /// `up`, `down` or empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionBrief {
    pub question_id: i64,
    pub title: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl From<Question> for QuestionBrief {
    fn from(q: Question) -> Self {
        Self {
            question_id: q.question_id,
            title: q.title,
            create_time: q.create_time,
            update_time: q.update_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleBrief {
    pub article_id: i64,
    pub title: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl From<Article> for ArticleBrief {
    fn from(a: Article) -> Self {
        Self {
            article_id: a.article_id,
            title: a.title,
            create_time: a.create_time,
            update_time: a.update_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerBrief {
    pub answer_id: i64,
    pub question_id: i64,
    pub create_time: i64,
    pub update_time: i64,
}

impl From<Answer> for AnswerBrief {
    fn from(a: Answer) -> Self {
        Self {
            answer_id: a.answer_id,
            question_id: a.question_id,
            create_time: a.create_time,
            update_time: a.update_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentBrief {
    pub comment_id: i64,
    pub content: String,
    pub create_time: i64,
}

impl From<Comment> for CommentBrief {
    fn from(c: Comment) -> Self {
        Self {
            comment_id: c.comment_id,
            content: c.content,
            create_time: c.create_time,
        }
    }
}

/// A row with its relationships, serialized flat.
#[derive(Debug, Clone, Serialize)]
pub struct Transformed<T: Serialize> {
    #[serde(flatten)]
    pub item: T,
    pub relationships: Relationships,
}

#[derive(Clone)]
pub struct Transformers {
    pub(crate) users: Arc<UserService>,
    pub(crate) votes: Arc<VoteService>,
    pub(crate) questions: Arc<QuestionService>,
    pub(crate) articles: Arc<ArticleService>,
    pub(crate) answers: Arc<AnswerService>,
    pub(crate) comments: Arc<CommentService>,
    pub(crate) images: Arc<ImageService>,
}

impl Transformers {
    pub fn new(
        users: Arc<UserService>,
        votes: Arc<VoteService>,
        questions: Arc<QuestionService>,
        articles: Arc<ArticleService>,
        answers: Arc<AnswerService>,
        comments: Arc<CommentService>,
        images: Arc<ImageService>,
    ) -> Self {
        Self {
            users,
            votes,
            questions,
            articles,
            answers,
            comments,
            images,
        }
    }

    pub async fn question_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, QuestionBrief>> {
        Ok(briefs(self.questions.get_in_relationship(ids).await?))
    }

    pub async fn article_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, ArticleBrief>> {
        Ok(briefs(self.articles.get_in_relationship(ids).await?))
    }

    pub async fn answer_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, AnswerBrief>> {
        Ok(briefs(self.answers.get_in_relationship(ids).await?))
    }

    pub async fn comment_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, CommentBrief>> {
        Ok(briefs(self.comments.get_in_relationship(ids).await?))
    }
}

fn briefs<T, B: From<T>>(rows: HashMap<i64, T>) -> HashMap<i64, B> {
    rows.into_iter().map(|(id, row)| (id, B::from(row))).collect()
}

/// Requested includes that the resource supports.
pub(crate) fn wanted<'a>(includes: &'a [String], available: &[&str]) -> Vec<&'a str> {
    includes
        .iter()
        .map(String::as_str)
        .filter(|include| available.contains(include))
        .collect()
}

/// Escapes text for safe inclusion in HTML, quoting both `"` and `'`
/// (`'` as `&#039;`), the same output as `htmlspecialchars` with `ENT_QUOTES`.
pub fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#), "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;");
    }

    #[test]
    fn test_wanted_filters_unknown_includes() {
        let includes = vec!["user".to_string(), "secret".to_string(), "voting".to_string()];
        assert_eq!(wanted(&includes, &["user", "voting"]), vec!["user", "voting"]);
    }

    #[test]
    fn test_empty_relationships_serialize_empty() {
        let value = serde_json::to_value(Relationships::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }
}
