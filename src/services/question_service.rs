use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Claims;
use crate::db::repository::{ListQuery, RecordRepository, TrashScope};
use crate::models::question::{CreateQuestionRequest, UpdateQuestionRequest};
use crate::models::{
    render_markdown, Answer, ColumnValue, Comment, NotificationRelationship, NotificationType, Question, ResourceKind,
    SoftDelete,
};
use crate::services::comment_service::purge_comments;
use crate::services::deletable::{snapshot, Deletable};
use crate::services::{
    all_where, list_page, require_text, Created, CreationGuard, ImageService, NotificationBatch, NotificationService,
    Page, VoteService,
};
use crate::{AppError, Result};

const MAX_TITLE_CHARS: usize = 80;

pub const QUESTION_ORDERS: &[&str] = &["create_time", "update_time", "answer_count", "comment_count"];

pub struct QuestionService {
    questions: Arc<dyn RecordRepository<Question>>,
    answers: Arc<dyn RecordRepository<Answer>>,
    comments: Arc<dyn RecordRepository<Comment>>,
    votes: Arc<VoteService>,
    images: Arc<ImageService>,
    notifier: Arc<NotificationService>,
    guard: CreationGuard,
}

impl QuestionService {
    pub fn new(
        questions: Arc<dyn RecordRepository<Question>>,
        answers: Arc<dyn RecordRepository<Answer>>,
        comments: Arc<dyn RecordRepository<Comment>>,
        votes: Arc<VoteService>,
        images: Arc<ImageService>,
        notifier: Arc<NotificationService>,
        guard: CreationGuard,
    ) -> Self {
        Self {
            questions,
            answers,
            comments,
            votes,
            images,
            notifier,
            guard,
        }
    }

    pub async fn create(&self, author: &Claims, request: CreateQuestionRequest, now: i64) -> Result<Created<Question>> {
        let title = require_text("title", &request.title, Some(MAX_TITLE_CHARS))?;
        let content_markdown = require_text("content_markdown", &request.content_markdown, None)?;

        let need_captcha = self
            .guard
            .check(
                author.user_id,
                "create_question",
                request.captcha_token.as_deref(),
                request.captcha_code.as_deref(),
                now,
            )
            .await?;

        let question = self
            .questions
            .insert(&Question {
                question_id: 0,
                user_id: author.user_id,
                title,
                content_rendered: render_markdown(&content_markdown),
                content_markdown,
                answer_count: 0,
                comment_count: 0,
                create_time: now,
                update_time: now,
                delete_time: None,
            })
            .await?;

        self.images
            .attach_from_content(&question.content_markdown, author.user_id, "question", question.question_id)
            .await?;

        tracing::info!("User {} asked question {}", author.user_id, question.question_id);
        Ok(Created { item: question, need_captcha })
    }

    pub async fn get(&self, question_id: i64) -> Result<Question> {
        self.questions
            .find(question_id, TrashScope::Active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", question_id)))
    }

    pub async fn list(&self, query: ListQuery) -> Result<Page<Question>> {
        list_page(self.questions.as_ref(), &query).await
    }

    pub async fn get_in_relationship(&self, ids: &[i64]) -> Result<HashMap<i64, Question>> {
        let questions = self.questions.find_many(ids, TrashScope::WithTrashed).await?;
        Ok(questions.into_iter().map(|q| (q.question_id, q)).collect())
    }

    pub async fn update(&self, viewer: &Claims, question_id: i64, request: UpdateQuestionRequest, now: i64) -> Result<Question> {
        let mut question = self.get(question_id).await?;
        if question.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only edit your own questions".to_string()));
        }

        if let Some(title) = request.title {
            question.title = require_text("title", &title, Some(MAX_TITLE_CHARS))?;
        }
        if let Some(content) = request.content_markdown {
            question.content_markdown = require_text("content_markdown", &content, None)?;
            question.content_rendered = render_markdown(&question.content_markdown);
        }
        question.update_time = now;

        let question = self.questions.update(&question).await?;
        self.images
            .attach_from_content(&question.content_markdown, question.user_id, "question", question.question_id)
            .await?;
        Ok(question)
    }

    pub async fn delete(&self, viewer: &Claims, question_id: i64) -> Result<()> {
        let question = self.get(question_id).await?;
        if question.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only delete your own questions".to_string()));
        }
        self.force_delete(question_id, Some(question), viewer.user_id).await
    }
}

#[async_trait]
impl Deletable for QuestionService {
    type Record = Question;

    fn records(&self) -> &dyn RecordRepository<Question> {
        self.questions.as_ref()
    }

    fn notifier(&self) -> &NotificationService {
        &self.notifier
    }

    async fn deletion_notices(&self, items: &[Question], batch: &mut NotificationBatch) -> Result<()> {
        for question in items {
            batch.add(
                question.user_id,
                NotificationType::QuestionDeleted,
                NotificationRelationship {
                    question_id: Some(question.question_id),
                    content_deleted: Some(snapshot(question)?),
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    /// Answers and comments go with the question, silently.
    async fn after_delete(&self, items: &[Question]) -> Result<()> {
        let ids: Vec<i64> = items.iter().map(|q| q.question_id).collect();

        let mut answer_ids = Vec::new();
        for id in &ids {
            let answers = all_where(self.answers.as_ref(), vec![("question_id", ColumnValue::Int(*id))]).await?;
            answer_ids.extend(answers.iter().map(SoftDelete::id));
        }

        if !answer_ids.is_empty() {
            self.answers.delete(&answer_ids).await?;
            purge_comments(self.comments.as_ref(), &self.votes, ResourceKind::Answer, &answer_ids).await?;
            self.votes.delete_for_targets(ResourceKind::Answer, &answer_ids).await?;
        }

        purge_comments(self.comments.as_ref(), &self.votes, ResourceKind::Question, &ids).await?;
        self.votes.delete_for_targets(ResourceKind::Question, &ids).await
    }
}
