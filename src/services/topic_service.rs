use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::Claims;
use crate::db::repository::{ListQuery, RecordRepository, TrashScope};
use crate::models::topic::{CreateTopicRequest, UpdateTopicRequest};
use crate::models::Topic;
use crate::services::deletable::Deletable;
use crate::services::{list_page, require_text, NotificationService, Page};
use crate::{AppError, Result};

const MAX_NAME_CHARS: usize = 20;
const MAX_DESCRIPTION_CHARS: usize = 1000;

pub const TOPIC_ORDERS: &[&str] = &["create_time", "update_time", "name"];

/// Topics are managed by administrators; removing one sends no notices.
pub struct TopicService {
    topics: Arc<dyn RecordRepository<Topic>>,
    notifier: Arc<NotificationService>,
}

impl TopicService {
    pub fn new(topics: Arc<dyn RecordRepository<Topic>>, notifier: Arc<NotificationService>) -> Self {
        Self { topics, notifier }
    }

    fn description(value: &str) -> Result<String> {
        let value = value.trim();
        if value.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AppError::field("description", "is too long"));
        }
        Ok(value.to_string())
    }

    pub async fn create(&self, admin: &Claims, request: CreateTopicRequest, now: i64) -> Result<Topic> {
        let topic = Topic {
            topic_id: 0,
            user_id: admin.user_id,
            name: require_text("name", &request.name, Some(MAX_NAME_CHARS))?,
            description: Self::description(&request.description)?,
            create_time: now,
            update_time: now,
            delete_time: None,
        };
        self.topics.insert(&topic).await
    }

    pub async fn get(&self, topic_id: i64) -> Result<Topic> {
        self.topics
            .find(topic_id, TrashScope::Active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", topic_id)))
    }

    pub async fn list(&self, query: ListQuery) -> Result<Page<Topic>> {
        list_page(self.topics.as_ref(), &query).await
    }

    pub async fn update(&self, topic_id: i64, request: UpdateTopicRequest, now: i64) -> Result<Topic> {
        let mut topic = self.get(topic_id).await?;
        if let Some(name) = request.name {
            topic.name = require_text("name", &name, Some(MAX_NAME_CHARS))?;
        }
        if let Some(description) = request.description {
            topic.description = Self::description(&description)?;
        }
        topic.update_time = now;
        self.topics.update(&topic).await
    }

    pub async fn delete(&self, admin: &Claims, topic_id: i64) -> Result<()> {
        let topic = self.get(topic_id).await?;
        self.force_delete(topic_id, Some(topic), admin.user_id).await
    }
}

#[async_trait]
impl Deletable for TopicService {
    type Record = Topic;

    fn records(&self) -> &dyn RecordRepository<Topic> {
        self.topics.as_ref()
    }

    fn notifier(&self) -> &NotificationService {
        &self.notifier
    }
}
