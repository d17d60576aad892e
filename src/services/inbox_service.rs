use std::sync::Arc;

use crate::auth::Claims;
use crate::db::repository::{InboxRepository, UserRepository};
use crate::models::inbox::SendMessageRequest;
use crate::models::{render_markdown, Inbox};
use crate::services::{require_text, Page};
use crate::{AppError, Result};

const MAX_MESSAGE_CHARS: usize = 2000;

/// Private messages between two users
pub struct InboxService {
    inbox_repo: Arc<dyn InboxRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl InboxService {
    pub fn new(inbox_repo: Arc<dyn InboxRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { inbox_repo, user_repo }
    }

    pub async fn send(&self, sender: &Claims, request: SendMessageRequest, now: i64) -> Result<Inbox> {
        if request.receiver_id == sender.user_id {
            return Err(AppError::field("receiver_id", "You cannot message yourself"));
        }
        if self.user_repo.get_user_by_id(request.receiver_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", request.receiver_id)));
        }
        let content_markdown = require_text("content_markdown", &request.content_markdown, Some(MAX_MESSAGE_CHARS))?;

        let message = Inbox {
            inbox_id: 0,
            receiver_id: request.receiver_id,
            sender_id: sender.user_id,
            content_rendered: render_markdown(&content_markdown),
            content_markdown,
            create_time: now,
            read_time: None,
        };
        self.inbox_repo.insert(&message).await
    }

    pub async fn list_received(&self, viewer: &Claims, limit: u32, offset: u32) -> Result<Page<Inbox>> {
        let items = self.inbox_repo.list_received(viewer.user_id, limit, offset).await?;
        let total = self.inbox_repo.count_received(viewer.user_id).await?;
        Ok(Page { items, total })
    }

    pub async fn list_conversation(&self, viewer: &Claims, other_id: i64, limit: u32, offset: u32) -> Result<Page<Inbox>> {
        let items = self
            .inbox_repo
            .list_conversation(viewer.user_id, other_id, limit, offset)
            .await?;
        let total = self.inbox_repo.count_conversation(viewer.user_id, other_id).await?;
        Ok(Page { items, total })
    }

    /// Only the receiver can mark a message read.
    pub async fn mark_read(&self, viewer: &Claims, inbox_id: i64, now: i64) -> Result<Inbox> {
        let message = self
            .inbox_repo
            .find(inbox_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", inbox_id)))?;
        if message.receiver_id != viewer.user_id {
            return Err(AppError::Forbidden("Message belongs to another user".to_string()));
        }

        self.inbox_repo.mark_read(inbox_id, now).await?;
        self.inbox_repo
            .find(inbox_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", inbox_id)))
    }
}
