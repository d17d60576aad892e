use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::auth::Claims;
use crate::db::repository::{ListQuery, RecordRepository, TrashScope};
use crate::models::comment::{CreateCommentRequest, UpdateCommentRequest};
use crate::models::{
    Answer, Article, ColumnValue, Comment, Commentable, NotificationRelationship, NotificationType, Question,
    ResourceKind, SoftDelete,
};
use crate::services::deletable::{snapshot, Deletable};
use crate::services::{
    all_where, distinct, list_page, require_text, Created, CreationGuard, NotificationBatch, NotificationService, Page,
    VoteService,
};
use crate::{AppError, Result};

const MAX_COMMENT_CHARS: usize = 1000;

pub const COMMENT_ORDERS: &[&str] = &["create_time", "update_time"];

pub struct CommentService {
    comments: Arc<dyn RecordRepository<Comment>>,
    questions: Arc<dyn RecordRepository<Question>>,
    answers: Arc<dyn RecordRepository<Answer>>,
    articles: Arc<dyn RecordRepository<Article>>,
    votes: Arc<VoteService>,
    notifier: Arc<NotificationService>,
    guard: CreationGuard,
}

/// Owner of the commented item and the notice its owner receives.
struct Target {
    owner_id: i64,
    notification_type: NotificationType,
    relationship: NotificationRelationship,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn RecordRepository<Comment>>,
        questions: Arc<dyn RecordRepository<Question>>,
        answers: Arc<dyn RecordRepository<Answer>>,
        articles: Arc<dyn RecordRepository<Article>>,
        votes: Arc<VoteService>,
        notifier: Arc<NotificationService>,
        guard: CreationGuard,
    ) -> Self {
        Self {
            comments,
            questions,
            answers,
            articles,
            votes,
            notifier,
            guard,
        }
    }

    async fn target(&self, commentable: Commentable) -> Result<Target> {
        let missing = || AppError::NotFound(format!("{} {} not found", commentable.kind(), commentable.id()));

        match commentable {
            Commentable::Question(id) => {
                let question = self.questions.find(id, TrashScope::Active).await?.ok_or_else(missing)?;
                Ok(Target {
                    owner_id: question.user_id,
                    notification_type: NotificationType::QuestionCommented,
                    relationship: NotificationRelationship {
                        question_id: Some(id),
                        ..Default::default()
                    },
                })
            }
            Commentable::Article(id) => {
                let article = self.articles.find(id, TrashScope::Active).await?.ok_or_else(missing)?;
                Ok(Target {
                    owner_id: article.user_id,
                    notification_type: NotificationType::ArticleCommented,
                    relationship: NotificationRelationship {
                        article_id: Some(id),
                        ..Default::default()
                    },
                })
            }
            Commentable::Answer(id) => {
                let answer = self.answers.find(id, TrashScope::Active).await?.ok_or_else(missing)?;
                Ok(Target {
                    owner_id: answer.user_id,
                    notification_type: NotificationType::AnswerCommented,
                    relationship: NotificationRelationship {
                        question_id: Some(answer.question_id),
                        answer_id: Some(id),
                        ..Default::default()
                    },
                })
            }
        }
    }

    pub async fn create(&self, author: &Claims, commentable: Commentable, request: CreateCommentRequest, now: i64) -> Result<Created<Comment>> {
        let content = require_text("content", &request.content, Some(MAX_COMMENT_CHARS))?;
        let target = self.target(commentable).await?;

        let need_captcha = self
            .guard
            .check(
                author.user_id,
                "create_comment",
                request.captcha_token.as_deref(),
                request.captcha_code.as_deref(),
                now,
            )
            .await?;

        let comment = self
            .comments
            .insert(&Comment {
                comment_id: 0,
                commentable_type: commentable.kind().to_string(),
                commentable_id: commentable.id(),
                user_id: author.user_id,
                content,
                create_time: now,
                update_time: now,
                delete_time: None,
            })
            .await?;

        self.recount(&[commentable]).await?;

        let mut batch = NotificationBatch::new(Some(author.user_id), now);
        let relationship = NotificationRelationship {
            comment_id: Some(comment.comment_id),
            ..target.relationship
        };
        batch.add(target.owner_id, target.notification_type, relationship);
        self.notifier.send(batch).await?;

        tracing::info!("User {} commented on {} {}", author.user_id, commentable.kind(), commentable.id());
        Ok(Created { item: comment, need_captcha })
    }

    pub async fn get(&self, comment_id: i64) -> Result<Comment> {
        self.comments
            .find(comment_id, TrashScope::Active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))
    }

    pub async fn list(&self, query: ListQuery) -> Result<Page<Comment>> {
        list_page(self.comments.as_ref(), &query).await
    }

    /// Live comments on one item. The item itself must be live.
    pub async fn list_for(&self, commentable: Commentable, query: ListQuery) -> Result<Page<Comment>> {
        self.target(commentable).await?;
        let query = query
            .filter("commentable_type", ColumnValue::Text(commentable.kind().to_string()))
            .filter("commentable_id", ColumnValue::Int(commentable.id()));
        list_page(self.comments.as_ref(), &query).await
    }

    pub async fn get_in_relationship(&self, ids: &[i64]) -> Result<HashMap<i64, Comment>> {
        let comments = self.comments.find_many(ids, TrashScope::WithTrashed).await?;
        Ok(comments.into_iter().map(|c| (c.comment_id, c)).collect())
    }

    pub async fn update(&self, viewer: &Claims, comment_id: i64, request: UpdateCommentRequest, now: i64) -> Result<Comment> {
        let mut comment = self.get(comment_id).await?;
        if comment.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only edit your own comments".to_string()));
        }

        comment.content = require_text("content", &request.content, Some(MAX_COMMENT_CHARS))?;
        comment.update_time = now;
        self.comments.update(&comment).await
    }

    pub async fn delete(&self, viewer: &Claims, comment_id: i64) -> Result<()> {
        let comment = self.get(comment_id).await?;
        if comment.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only delete your own comments".to_string()));
        }
        self.force_delete(comment_id, Some(comment), viewer.user_id).await
    }

    /// Recomputes `comment_count` of the given items from their live comments.
    async fn recount(&self, targets: &[Commentable]) -> Result<()> {
        let targets: BTreeSet<(&'static str, i64)> = targets.iter().map(|t| (t.kind(), t.id())).collect();

        for (kind, id) in targets {
            let filters = [
                ("commentable_type", ColumnValue::Text(kind.to_string())),
                ("commentable_id", ColumnValue::Int(id)),
            ];
            let count = self.comments.count(&filters, TrashScope::Active).await?;

            match Commentable::new(kind, id) {
                Some(Commentable::Question(id)) => {
                    if let Some(mut question) = self.questions.find(id, TrashScope::WithTrashed).await? {
                        question.comment_count = count;
                        self.questions.update(&question).await?;
                    }
                }
                Some(Commentable::Article(id)) => {
                    if let Some(mut article) = self.articles.find(id, TrashScope::WithTrashed).await? {
                        article.comment_count = count;
                        self.articles.update(&article).await?;
                    }
                }
                Some(Commentable::Answer(id)) => {
                    if let Some(mut answer) = self.answers.find(id, TrashScope::WithTrashed).await? {
                        answer.comment_count = count;
                        self.answers.update(&answer).await?;
                    }
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn commentables(items: &[Comment]) -> Vec<Commentable> {
    items.iter().filter_map(Comment::commentable).collect()
}

/// Permanently removes every comment on the given items, with their votes.
/// No notifications are sent.
pub(crate) async fn purge_comments(
    comments: &dyn RecordRepository<Comment>,
    votes: &VoteService,
    kind: ResourceKind,
    ids: &[i64],
) -> Result<()> {
    let mut removed = Vec::new();
    for id in ids {
        let filters = vec![
            ("commentable_type", ColumnValue::Text(kind.as_str().to_string())),
            ("commentable_id", ColumnValue::Int(*id)),
        ];
        removed.extend(all_where(comments, filters).await?.iter().map(SoftDelete::id));
    }
    if removed.is_empty() {
        return Ok(());
    }

    comments.delete(&removed).await?;
    votes.delete_for_targets(ResourceKind::Comment, &removed).await
}

#[async_trait]
impl Deletable for CommentService {
    type Record = Comment;

    fn records(&self) -> &dyn RecordRepository<Comment> {
        self.comments.as_ref()
    }

    fn notifier(&self) -> &NotificationService {
        &self.notifier
    }

    async fn deletion_notices(&self, items: &[Comment], batch: &mut NotificationBatch) -> Result<()> {
        let answer_ids = distinct(
            items
                .iter()
                .filter(|comment| comment.commentable_type == ResourceKind::Answer.as_str())
                .map(|comment| comment.commentable_id),
        );
        let question_of_answer: HashMap<i64, i64> = if answer_ids.is_empty() {
            HashMap::new()
        } else {
            self.answers
                .find_many(&answer_ids, TrashScope::WithTrashed)
                .await?
                .into_iter()
                .map(|answer| (answer.answer_id, answer.question_id))
                .collect()
        };

        for comment in items {
            let mut relationship = NotificationRelationship {
                comment_id: Some(comment.comment_id),
                content_deleted: Some(snapshot(comment)?),
                ..Default::default()
            };
            match comment.commentable() {
                Some(Commentable::Question(id)) => relationship.question_id = Some(id),
                Some(Commentable::Article(id)) => relationship.article_id = Some(id),
                Some(Commentable::Answer(id)) => {
                    relationship.answer_id = Some(id);
                    relationship.question_id = question_of_answer.get(&id).copied();
                }
                None => {}
            }
            batch.add(comment.user_id, NotificationType::CommentDeleted, relationship);
        }
        Ok(())
    }

    async fn after_delete(&self, items: &[Comment]) -> Result<()> {
        let ids: Vec<i64> = items.iter().map(|c| c.comment_id).collect();
        self.votes.delete_for_targets(ResourceKind::Comment, &ids).await?;
        self.recount(&commentables(items)).await
    }

    async fn after_trash(&self, items: &[Comment]) -> Result<()> {
        self.recount(&commentables(items)).await
    }

    async fn after_untrash(&self, items: &[Comment]) -> Result<()> {
        self.recount(&commentables(items)).await
    }
}
