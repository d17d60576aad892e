pub mod postgres;
pub mod repository;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::models::{Answer, Article, Comment, Question, Topic};
use crate::utils::database_retry::{retry_database_operation, DatabaseRetryConfig};
use crate::Result;
use repository::{
    ImageRepository, InMemoryImageRepository, InMemoryInboxRepository, InMemoryNotificationRepository,
    InMemoryRecordRepository, InMemoryUserRepository, InMemoryVoteRepository, InboxRepository,
    NotificationRepository, RecordRepository, UserRepository, VoteRepository,
};

// Database connection and repository handles
#[derive(Clone)]
pub struct DatabaseClient {
    pub postgres: Option<Arc<postgres::PostgresDatabase>>,
    pub question_repo: Arc<dyn RecordRepository<Question>>,
    pub article_repo: Arc<dyn RecordRepository<Article>>,
    pub answer_repo: Arc<dyn RecordRepository<Answer>>,
    pub comment_repo: Arc<dyn RecordRepository<Comment>>,
    pub topic_repo: Arc<dyn RecordRepository<Topic>>,
    pub user_repo: Arc<dyn UserRepository>,
    pub image_repo: Arc<dyn ImageRepository>,
    pub vote_repo: Arc<dyn VoteRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub inbox_repo: Arc<dyn InboxRepository>,
}

impl DatabaseClient {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set, using in-memory repositories");
            return Ok(Self::in_memory());
        };

        tracing::info!("Connecting to PostgreSQL");
        let database = retry_database_operation(
            || postgres::PostgresDatabase::new(url),
            DatabaseRetryConfig::default(),
        )
        .await?;

        Ok(Self {
            question_repo: Arc::new(database.records::<Question>()),
            article_repo: Arc::new(database.records::<Article>()),
            answer_repo: Arc::new(database.records::<Answer>()),
            comment_repo: Arc::new(database.records::<Comment>()),
            topic_repo: Arc::new(database.records::<Topic>()),
            user_repo: Arc::new(database.user_repo()),
            image_repo: Arc::new(database.image_repo()),
            vote_repo: Arc::new(database.vote_repo()),
            notification_repo: Arc::new(database.notification_repo()),
            inbox_repo: Arc::new(database.inbox_repo()),
            postgres: Some(Arc::new(database)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            postgres: None,
            question_repo: Arc::new(InMemoryRecordRepository::<Question>::new()),
            article_repo: Arc::new(InMemoryRecordRepository::<Article>::new()),
            answer_repo: Arc::new(InMemoryRecordRepository::<Answer>::new()),
            comment_repo: Arc::new(InMemoryRecordRepository::<Comment>::new()),
            topic_repo: Arc::new(InMemoryRecordRepository::<Topic>::new()),
            user_repo: Arc::new(InMemoryUserRepository::new()),
            image_repo: Arc::new(InMemoryImageRepository::new()),
            vote_repo: Arc::new(InMemoryVoteRepository::new()),
            notification_repo: Arc::new(InMemoryNotificationRepository::new()),
            inbox_repo: Arc::new(InMemoryInboxRepository::new()),
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        match &self.postgres {
            Some(database) => database.health_check().await,
            None => Ok(()),
        }
    }
}
