use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Claims;
use crate::db::repository::{ListQuery, RecordRepository, TrashScope};
use crate::models::article::{CreateArticleRequest, UpdateArticleRequest};
use crate::models::{render_markdown, Article, Comment, NotificationRelationship, NotificationType, ResourceKind};
use crate::services::comment_service::purge_comments;
use crate::services::deletable::{snapshot, Deletable};
use crate::services::{
    list_page, require_text, Created, CreationGuard, ImageService, NotificationBatch, NotificationService, Page,
    VoteService,
};
use crate::{AppError, Result};

const MAX_TITLE_CHARS: usize = 80;

pub const ARTICLE_ORDERS: &[&str] = &["create_time", "update_time", "comment_count"];

pub struct ArticleService {
    articles: Arc<dyn RecordRepository<Article>>,
    comments: Arc<dyn RecordRepository<Comment>>,
    votes: Arc<VoteService>,
    images: Arc<ImageService>,
    notifier: Arc<NotificationService>,
    guard: CreationGuard,
}

impl ArticleService {
    pub fn new(
        articles: Arc<dyn RecordRepository<Article>>,
        comments: Arc<dyn RecordRepository<Comment>>,
        votes: Arc<VoteService>,
        images: Arc<ImageService>,
        notifier: Arc<NotificationService>,
        guard: CreationGuard,
    ) -> Self {
        Self {
            articles,
            comments,
            votes,
            images,
            notifier,
            guard,
        }
    }

    pub async fn create(&self, author: &Claims, request: CreateArticleRequest, now: i64) -> Result<Created<Article>> {
        let title = require_text("title", &request.title, Some(MAX_TITLE_CHARS))?;
        let content_markdown = require_text("content_markdown", &request.content_markdown, None)?;

        let need_captcha = self
            .guard
            .check(
                author.user_id,
                "create_article",
                request.captcha_token.as_deref(),
                request.captcha_code.as_deref(),
                now,
            )
            .await?;

        let article = self
            .articles
            .insert(&Article {
                article_id: 0,
                user_id: author.user_id,
                title,
                content_rendered: render_markdown(&content_markdown),
                content_markdown,
                comment_count: 0,
                create_time: now,
                update_time: now,
                delete_time: None,
            })
            .await?;

        self.images
            .attach_from_content(&article.content_markdown, author.user_id, "article", article.article_id)
            .await?;

        tracing::info!("User {} published article {}", author.user_id, article.article_id);
        Ok(Created { item: article, need_captcha })
    }

    pub async fn get(&self, article_id: i64) -> Result<Article> {
        self.articles
            .find(article_id, TrashScope::Active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Article {} not found", article_id)))
    }

    pub async fn list(&self, query: ListQuery) -> Result<Page<Article>> {
        list_page(self.articles.as_ref(), &query).await
    }

    pub async fn get_in_relationship(&self, ids: &[i64]) -> Result<HashMap<i64, Article>> {
        let articles = self.articles.find_many(ids, TrashScope::WithTrashed).await?;
        Ok(articles.into_iter().map(|a| (a.article_id, a)).collect())
    }

    pub async fn update(&self, viewer: &Claims, article_id: i64, request: UpdateArticleRequest, now: i64) -> Result<Article> {
        let mut article = self.get(article_id).await?;
        if article.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only edit your own articles".to_string()));
        }

        if let Some(title) = request.title {
            article.title = require_text("title", &title, Some(MAX_TITLE_CHARS))?;
        }
        if let Some(content) = request.content_markdown {
            article.content_markdown = require_text("content_markdown", &content, None)?;
            article.content_rendered = render_markdown(&article.content_markdown);
        }
        article.update_time = now;

        let article = self.articles.update(&article).await?;
        self.images
            .attach_from_content(&article.content_markdown, article.user_id, "article", article.article_id)
            .await?;
        Ok(article)
    }

    pub async fn delete(&self, viewer: &Claims, article_id: i64) -> Result<()> {
        let article = self.get(article_id).await?;
        if article.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only delete your own articles".to_string()));
        }
        self.force_delete(article_id, Some(article), viewer.user_id).await
    }
}

#[async_trait]
impl Deletable for ArticleService {
    type Record = Article;

    fn records(&self) -> &dyn RecordRepository<Article> {
        self.articles.as_ref()
    }

    fn notifier(&self) -> &NotificationService {
        &self.notifier
    }

    async fn deletion_notices(&self, items: &[Article], batch: &mut NotificationBatch) -> Result<()> {
        for article in items {
            batch.add(
                article.user_id,
                NotificationType::ArticleDeleted,
                NotificationRelationship {
                    article_id: Some(article.article_id),
                    content_deleted: Some(snapshot(article)?),
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    async fn after_delete(&self, items: &[Article]) -> Result<()> {
        let ids: Vec<i64> = items.iter().map(|a| a.article_id).collect();
        purge_comments(self.comments.as_ref(), &self.votes, ResourceKind::Article, &ids).await?;
        self.votes.delete_for_targets(ResourceKind::Article, &ids).await
    }
}
