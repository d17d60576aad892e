use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Claims;
use crate::db::repository::{ListQuery, RecordRepository, TrashScope};
use crate::models::answer::{CreateAnswerRequest, UpdateAnswerRequest};
use crate::models::{
    render_markdown, Answer, ColumnValue, Comment, NotificationRelationship, NotificationType, Question, ResourceKind,
};
use crate::services::comment_service::purge_comments;
use crate::services::deletable::{snapshot, Deletable};
use crate::services::{
    distinct, list_page, require_text, Created, CreationGuard, ImageService, NotificationBatch, NotificationService,
    Page, VoteService,
};
use crate::{AppError, Result};

pub const ANSWER_ORDERS: &[&str] = &["create_time", "update_time", "comment_count"];

pub struct AnswerService {
    answers: Arc<dyn RecordRepository<Answer>>,
    questions: Arc<dyn RecordRepository<Question>>,
    comments: Arc<dyn RecordRepository<Comment>>,
    votes: Arc<VoteService>,
    images: Arc<ImageService>,
    notifier: Arc<NotificationService>,
    guard: CreationGuard,
}

impl AnswerService {
    pub fn new(
        answers: Arc<dyn RecordRepository<Answer>>,
        questions: Arc<dyn RecordRepository<Question>>,
        comments: Arc<dyn RecordRepository<Comment>>,
        votes: Arc<VoteService>,
        images: Arc<ImageService>,
        notifier: Arc<NotificationService>,
        guard: CreationGuard,
    ) -> Self {
        Self {
            answers,
            questions,
            comments,
            votes,
            images,
            notifier,
            guard,
        }
    }

    async fn live_question(&self, question_id: i64) -> Result<Question> {
        self.questions
            .find(question_id, TrashScope::Active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", question_id)))
    }

    pub async fn create(&self, author: &Claims, question_id: i64, request: CreateAnswerRequest, now: i64) -> Result<Created<Answer>> {
        let content_markdown = require_text("content_markdown", &request.content_markdown, None)?;
        let question = self.live_question(question_id).await?;

        let need_captcha = self
            .guard
            .check(
                author.user_id,
                "create_answer",
                request.captcha_token.as_deref(),
                request.captcha_code.as_deref(),
                now,
            )
            .await?;

        let answer = self
            .answers
            .insert(&Answer {
                answer_id: 0,
                question_id,
                user_id: author.user_id,
                content_rendered: render_markdown(&content_markdown),
                content_markdown,
                comment_count: 0,
                create_time: now,
                update_time: now,
                delete_time: None,
            })
            .await?;

        self.images
            .attach_from_content(&answer.content_markdown, author.user_id, "answer", answer.answer_id)
            .await?;
        self.recount(&[question_id]).await?;

        let mut batch = NotificationBatch::new(Some(author.user_id), now);
        batch.add(
            question.user_id,
            NotificationType::QuestionAnswered,
            NotificationRelationship {
                question_id: Some(question_id),
                answer_id: Some(answer.answer_id),
                ..Default::default()
            },
        );
        self.notifier.send(batch).await?;

        tracing::info!("User {} answered question {}", author.user_id, question_id);
        Ok(Created { item: answer, need_captcha })
    }

    pub async fn get(&self, answer_id: i64) -> Result<Answer> {
        self.answers
            .find(answer_id, TrashScope::Active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Answer {} not found", answer_id)))
    }

    pub async fn list(&self, query: ListQuery) -> Result<Page<Answer>> {
        list_page(self.answers.as_ref(), &query).await
    }

    pub async fn list_for_question(&self, question_id: i64, query: ListQuery) -> Result<Page<Answer>> {
        self.live_question(question_id).await?;
        let query = query.filter("question_id", ColumnValue::Int(question_id));
        list_page(self.answers.as_ref(), &query).await
    }

    pub async fn get_in_relationship(&self, ids: &[i64]) -> Result<HashMap<i64, Answer>> {
        let answers = self.answers.find_many(ids, TrashScope::WithTrashed).await?;
        Ok(answers.into_iter().map(|a| (a.answer_id, a)).collect())
    }

    pub async fn update(&self, viewer: &Claims, answer_id: i64, request: UpdateAnswerRequest, now: i64) -> Result<Answer> {
        let mut answer = self.get(answer_id).await?;
        if answer.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only edit your own answers".to_string()));
        }

        answer.content_markdown = require_text("content_markdown", &request.content_markdown, None)?;
        answer.content_rendered = render_markdown(&answer.content_markdown);
        answer.update_time = now;

        let answer = self.answers.update(&answer).await?;
        self.images
            .attach_from_content(&answer.content_markdown, answer.user_id, "answer", answer.answer_id)
            .await?;
        Ok(answer)
    }

    pub async fn delete(&self, viewer: &Claims, answer_id: i64) -> Result<()> {
        let answer = self.get(answer_id).await?;
        if answer.user_id != viewer.user_id && !viewer.is_admin {
            return Err(AppError::Forbidden("You can only delete your own answers".to_string()));
        }
        self.force_delete(answer_id, Some(answer), viewer.user_id).await
    }

    /// Recomputes `answer_count` of the questions from their live answers.
    async fn recount(&self, question_ids: &[i64]) -> Result<()> {
        for question_id in distinct(question_ids.iter().copied()) {
            let filters = [("question_id", ColumnValue::Int(question_id))];
            let count = self.answers.count(&filters, TrashScope::Active).await?;

            if let Some(mut question) = self.questions.find(question_id, TrashScope::WithTrashed).await? {
                question.answer_count = count;
                self.questions.update(&question).await?;
            }
        }
        Ok(())
    }
}

fn question_ids(items: &[Answer]) -> Vec<i64> {
    items.iter().map(|answer| answer.question_id).collect()
}

#[async_trait]
impl Deletable for AnswerService {
    type Record = Answer;

    fn records(&self) -> &dyn RecordRepository<Answer> {
        self.answers.as_ref()
    }

    fn notifier(&self) -> &NotificationService {
        &self.notifier
    }

    async fn deletion_notices(&self, items: &[Answer], batch: &mut NotificationBatch) -> Result<()> {
        for answer in items {
            batch.add(
                answer.user_id,
                NotificationType::AnswerDeleted,
                NotificationRelationship {
                    question_id: Some(answer.question_id),
                    answer_id: Some(answer.answer_id),
                    content_deleted: Some(snapshot(answer)?),
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    async fn after_delete(&self, items: &[Answer]) -> Result<()> {
        let ids: Vec<i64> = items.iter().map(|a| a.answer_id).collect();
        purge_comments(self.comments.as_ref(), &self.votes, ResourceKind::Answer, &ids).await?;
        self.votes.delete_for_targets(ResourceKind::Answer, &ids).await?;
        self.recount(&question_ids(items)).await
    }

    async fn after_trash(&self, items: &[Answer]) -> Result<()> {
        self.recount(&question_ids(items)).await
    }

    async fn after_untrash(&self, items: &[Answer]) -> Result<()> {
        self.recount(&question_ids(items)).await
    }
}
