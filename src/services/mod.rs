pub mod answer_service;
pub mod article_service;
pub mod comment_service;
pub mod deletable;
pub mod image_service;
pub mod inbox_service;
pub mod notification_service;
pub mod question_service;
pub mod topic_service;
pub mod user_service;
pub mod vote_service;

// Re-export services for convenience
pub use answer_service::AnswerService;
pub use article_service::ArticleService;
pub use comment_service::CommentService;
pub use deletable::Deletable;
pub use image_service::ImageService;
pub use inbox_service::InboxService;
pub use notification_service::{NotificationBatch, NotificationService};
pub use question_service::QuestionService;
pub use topic_service::TopicService;
pub use user_service::UserService;
pub use vote_service::VoteService;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::ThrottleConfig;
use crate::db::repository::{Filters, ListQuery, OrderBy, RecordRepository, TrashScope};
use crate::library::CaptchaService;
use crate::models::SoftDelete;
use crate::{AppError, Result};

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// A freshly created row and whether the author's next post needs a captcha.
#[derive(Debug, Clone)]
pub struct Created<T> {
    pub item: T,
    pub need_captcha: bool,
}

pub(crate) async fn list_page<T: SoftDelete>(repo: &dyn RecordRepository<T>, query: &ListQuery) -> Result<Page<T>> {
    let items = repo.list(query).await?;
    let total = repo.count(&query.filters, query.scope).await?;
    Ok(Page { items, total })
}

/// Every row matching `filters`, trashed or not.
pub(crate) async fn all_where<T: SoftDelete>(repo: &dyn RecordRepository<T>, filters: Filters) -> Result<Vec<T>> {
    let mut query = ListQuery::new(OrderBy::asc(T::PRIMARY_KEY))
        .page(u32::MAX, 0)
        .scope(TrashScope::WithTrashed);
    query.filters = filters;
    repo.list(&query).await
}

pub(crate) fn distinct<I: IntoIterator<Item = i64>>(ids: I) -> Vec<i64> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Rate limit for content creation, escalating to a captcha.
#[derive(Clone)]
pub struct CreationGuard {
    captcha: Arc<CaptchaService>,
    limits: ThrottleConfig,
}

impl CreationGuard {
    pub fn new(captcha: Arc<CaptchaService>, limits: ThrottleConfig) -> Self {
        Self { captcha, limits }
    }

    pub async fn check(&self, user_id: i64, action: &str, token: Option<&str>, code: Option<&str>, now: i64) -> Result<bool> {
        self.captcha
            .is_next_time_need(
                &user_id.to_string(),
                action,
                self.limits.max_count,
                self.limits.period,
                token,
                code,
                now,
            )
            .await
    }
}

pub(crate) fn require_text(field: &str, value: &str, max_chars: Option<usize>) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::field(field, "must not be empty"));
    }
    if let Some(max) = max_chars {
        if value.chars().count() > max {
            return Err(AppError::field(field, &format!("must be at most {} characters", max)));
        }
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  hi  ", Some(5)).unwrap(), "hi");
        assert!(matches!(
            require_text("title", "   ", None),
            Err(AppError::FieldValidation { .. })
        ));
        assert!(require_text("title", "abcdef", Some(5)).is_err());
    }

    #[test]
    fn test_distinct_sorts_and_dedupes() {
        assert_eq!(distinct(vec![3, 1, 3, 2]), vec![1, 2, 3]);
    }
}
