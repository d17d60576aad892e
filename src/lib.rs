// Library modules for the forum backend
pub mod config;
pub mod models;
pub mod db;
pub mod routes;
pub mod services;
pub mod auth;
pub mod error;
pub mod library;
pub mod transformers;
pub mod utils;

use std::sync::Arc;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use config::AppConfig;

use library::{CaptchaBuilder, CaptchaService, LocalStorage, MemoryCache, NoiseCaptchaBuilder};
use services::CreationGuard;

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: db::DatabaseClient,
    pub auth_service: Arc<auth::AuthService>,
    pub captcha: Arc<CaptchaService>,
    pub user_service: Arc<services::UserService>,
    pub vote_service: Arc<services::VoteService>,
    pub notification_service: Arc<services::NotificationService>,
    pub image_service: Arc<services::ImageService>,
    pub question_service: Arc<services::QuestionService>,
    pub article_service: Arc<services::ArticleService>,
    pub answer_service: Arc<services::AnswerService>,
    pub comment_service: Arc<services::CommentService>,
    pub topic_service: Arc<services::TopicService>,
    pub inbox_service: Arc<services::InboxService>,
    pub transformers: Arc<transformers::Transformers>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = db::DatabaseClient::new(&config).await?;
        Ok(Self::with_parts(config, db, Arc::new(NoiseCaptchaBuilder)))
    }

    /// Wires the services over an existing set of repositories.
    pub fn with_parts(config: AppConfig, db: db::DatabaseClient, captcha_builder: Arc<dyn CaptchaBuilder>) -> Self {
        let auth_service = Arc::new(auth::AuthService::new(config.jwt_secret.clone()));
        let captcha = Arc::new(CaptchaService::new(Arc::new(MemoryCache::new()), captcha_builder));
        let guard = CreationGuard::new(captcha.clone(), config.throttle.clone());

        let user_service = Arc::new(services::UserService::new(db.user_repo.clone()));
        let notification_service = Arc::new(services::NotificationService::new(db.notification_repo.clone()));
        let vote_service = Arc::new(services::VoteService::new(
            db.vote_repo.clone(),
            db.question_repo.clone(),
            db.answer_repo.clone(),
            db.article_repo.clone(),
            db.comment_repo.clone(),
        ));
        let storage = Arc::new(LocalStorage::new(&config.storage.path, &config.storage.url));
        let image_service = Arc::new(services::ImageService::new(
            db.image_repo.clone(),
            storage,
            config.storage.max_upload_bytes,
        ));

        let question_service = Arc::new(services::QuestionService::new(
            db.question_repo.clone(),
            db.answer_repo.clone(),
            db.comment_repo.clone(),
            vote_service.clone(),
            image_service.clone(),
            notification_service.clone(),
            guard.clone(),
        ));
        let article_service = Arc::new(services::ArticleService::new(
            db.article_repo.clone(),
            db.comment_repo.clone(),
            vote_service.clone(),
            image_service.clone(),
            notification_service.clone(),
            guard.clone(),
        ));
        let answer_service = Arc::new(services::AnswerService::new(
            db.answer_repo.clone(),
            db.question_repo.clone(),
            db.comment_repo.clone(),
            vote_service.clone(),
            image_service.clone(),
            notification_service.clone(),
            guard.clone(),
        ));
        let comment_service = Arc::new(services::CommentService::new(
            db.comment_repo.clone(),
            db.question_repo.clone(),
            db.answer_repo.clone(),
            db.article_repo.clone(),
            vote_service.clone(),
            notification_service.clone(),
            guard,
        ));
        let topic_service = Arc::new(services::TopicService::new(
            db.topic_repo.clone(),
            notification_service.clone(),
        ));
        let inbox_service = Arc::new(services::InboxService::new(db.inbox_repo.clone(), db.user_repo.clone()));

        let transformers = Arc::new(transformers::Transformers::new(
            user_service.clone(),
            vote_service.clone(),
            question_service.clone(),
            article_service.clone(),
            answer_service.clone(),
            comment_service.clone(),
            image_service.clone(),
        ));

        Self {
            config,
            db,
            auth_service,
            captcha,
            user_service,
            vote_service,
            notification_service,
            image_service,
            question_service,
            article_service,
            answer_service,
            comment_service,
            topic_service,
            inbox_service,
            transformers,
        }
    }
}
