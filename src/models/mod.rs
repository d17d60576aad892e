pub mod user;
pub mod topic;
pub mod question;
pub mod article;
pub mod answer;
pub mod comment;
pub mod image;
pub mod inbox;
pub mod vote;
pub mod notification;

// Re-export models for convenience
pub use user::{User, UserBrief};
pub use topic::Topic;
pub use question::Question;
pub use article::Article;
pub use answer::Answer;
pub use comment::{Comment, Commentable};
pub use image::Image;
pub use inbox::Inbox;
pub use vote::{Vote, VoteType};
pub use notification::{Notification, NotificationType, NotificationRelationship};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The five resource types that share the trash lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Question,
    Article,
    Answer,
    Comment,
    Topic,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Question => "question",
            ResourceKind::Article => "article",
            ResourceKind::Answer => "answer",
            ResourceKind::Comment => "comment",
            ResourceKind::Topic => "topic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "question" => Some(ResourceKind::Question),
            "article" => Some(ResourceKind::Article),
            "answer" => Some(ResourceKind::Answer),
            "comment" => Some(ResourceKind::Comment),
            "topic" => Some(ResourceKind::Topic),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filterable/sortable column value, used by list queries.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int(i64),
    Text(String),
}

impl ColumnValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ColumnValue::Int(v) => Some(*v),
            ColumnValue::Text(_) => None,
        }
    }
}

/// A row with a soft-delete marker. Implemented by every model that goes
/// through the trash lifecycle.
pub trait SoftDelete: Clone + Serialize + Send + Sync + Unpin + 'static {
    const KIND: ResourceKind;
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str;
    /// Columns written on insert/update, in bind order.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn owner_id(&self) -> i64;
    fn delete_time(&self) -> Option<i64>;
    fn set_delete_time(&mut self, time: Option<i64>);

    /// Value of a column used for filtering or ordering.
    fn column(&self, name: &str) -> Option<ColumnValue>;

    fn is_trashed(&self) -> bool {
        self.delete_time().is_some()
    }
}

/// Renders user-supplied markdown. Raw HTML blocks are emitted as text.
pub fn render_markdown(markdown: &str) -> String {
    use pulldown_cmark::{html, Event, Options, Parser};

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_escapes_raw_html() {
        let rendered = render_markdown("**bold**\n\n<script>alert(1)</script>");
        assert!(rendered.contains("<strong>bold</strong>"));
        assert!(!rendered.contains("<script>"));
        assert!(rendered.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_resource_kind_round_trip() {
        for kind in [ResourceKind::Question, ResourceKind::Article, ResourceKind::Answer, ResourceKind::Comment, ResourceKind::Topic] {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::parse("image"), None);
    }
}
