use std::sync::Arc;

use crate::db::repository::{NotificationFilter, NotificationRepository};
use crate::models::{now, Notification, NotificationRelationship, NotificationType};
use crate::services::Page;
use crate::{AppError, Result};

/// Notifications collected while handling one request, persisted together.
#[derive(Debug, Clone)]
pub struct NotificationBatch {
    sender_id: Option<i64>,
    time: i64,
    pending: Vec<Notification>,
}

impl NotificationBatch {
    pub fn new(sender_id: Option<i64>, time: i64) -> Self {
        Self {
            sender_id,
            time,
            pending: Vec::new(),
        }
    }

    /// Queues a notification. Nobody is notified about their own actions.
    pub fn add(&mut self, receiver_id: i64, notification_type: NotificationType, relationship: NotificationRelationship) {
        if self.sender_id == Some(receiver_id) {
            return;
        }

        self.pending.push(Notification {
            notification_id: 0,
            receiver_id,
            sender_id: self.sender_id,
            notification_type: notification_type.as_str().to_string(),
            question_id: relationship.question_id,
            article_id: relationship.article_id,
            answer_id: relationship.answer_id,
            comment_id: relationship.comment_id,
            content_deleted: relationship.content_deleted,
            create_time: self.time,
            read_time: None,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &[Notification] {
        &self.pending
    }
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    pub async fn send(&self, batch: NotificationBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!("Sending {} notifications", batch.len());
        self.repo.insert_many(&batch.pending).await
    }

    pub async fn list(&self, receiver_id: i64, filter: &NotificationFilter, limit: u32, offset: u32) -> Result<Page<Notification>> {
        let items = self.repo.list(receiver_id, filter, limit, offset).await?;
        let total = self.repo.count(receiver_id, filter).await?;
        Ok(Page { items, total })
    }

    pub async fn unread_count(&self, receiver_id: i64) -> Result<i64> {
        let filter = NotificationFilter {
            notification_type: None,
            unread_only: true,
        };
        self.repo.count(receiver_id, &filter).await
    }

    async fn owned(&self, receiver_id: i64, notification_id: i64) -> Result<Notification> {
        let notification = self
            .repo
            .find(notification_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.receiver_id != receiver_id {
            return Err(AppError::Forbidden("Notification belongs to another user".to_string()));
        }
        Ok(notification)
    }

    pub async fn get(&self, receiver_id: i64, notification_id: i64) -> Result<Notification> {
        self.owned(receiver_id, notification_id).await
    }

    pub async fn mark_read(&self, receiver_id: i64, notification_id: i64) -> Result<Notification> {
        self.owned(receiver_id, notification_id).await?;
        self.repo.mark_read(receiver_id, Some(&[notification_id]), now()).await?;
        self.owned(receiver_id, notification_id).await
    }

    pub async fn mark_all_read(&self, receiver_id: i64) -> Result<()> {
        self.repo.mark_read(receiver_id, None, now()).await
    }

    pub async fn delete(&self, receiver_id: i64, notification_id: i64) -> Result<()> {
        self.owned(receiver_id, notification_id).await?;
        self.repo.delete(notification_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::InMemoryNotificationRepository;

    fn relationship(question_id: i64) -> NotificationRelationship {
        NotificationRelationship {
            question_id: Some(question_id),
            ..Default::default()
        }
    }

    #[test]
    fn test_batch_skips_sender() {
        let mut batch = NotificationBatch::new(Some(1), 100);
        batch.add(1, NotificationType::QuestionDeleted, relationship(5));
        batch.add(2, NotificationType::QuestionDeleted, relationship(6));

        assert_eq!(batch.len(), 1);
        let notification = &batch.pending()[0];
        assert_eq!(notification.receiver_id, 2);
        assert_eq!(notification.sender_id, Some(1));
        assert_eq!(notification.notification_type, "question_deleted");
        assert_eq!(notification.question_id, Some(6));
    }

    #[tokio::test]
    async fn test_read_and_delete_are_owner_only() {
        let service = NotificationService::new(Arc::new(InMemoryNotificationRepository::new()));
        let mut batch = NotificationBatch::new(None, 100);
        batch.add(2, NotificationType::QuestionAnswered, relationship(5));
        batch.add(2, NotificationType::QuestionCommented, relationship(5));
        service.send(batch).await.unwrap();

        assert_eq!(service.unread_count(2).await.unwrap(), 2);
        assert!(matches!(service.mark_read(3, 1).await, Err(AppError::Forbidden(_))));

        let read = service.mark_read(2, 1).await.unwrap();
        assert!(read.read_time.is_some());
        assert_eq!(service.unread_count(2).await.unwrap(), 1);

        service.mark_all_read(2).await.unwrap();
        assert_eq!(service.unread_count(2).await.unwrap(), 0);

        service.delete(2, 2).await.unwrap();
        let page = service.list(2, &NotificationFilter::default(), 20, 0).await.unwrap();
        assert_eq!(page.total, 1);
    }
}
