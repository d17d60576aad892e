// PostgreSQL repository implementations using sqlx
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::db::repository::{
    ImageRepository, InboxRepository, ListQuery, NotificationFilter, NotificationRepository,
    RecordRepository, TrashScope, UserRepository, VoteRepository,
};
use crate::models::{
    Answer, Article, ColumnValue, Comment, Image, Inbox, Notification, Question, SoftDelete, Topic,
    User, Vote,
};
use crate::{AppError, Result};

// PostgreSQL connection pool wrapper
pub struct PostgresDatabase {
    pub pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        tracing::info!("Configuring PostgreSQL connection pool (max 20 connections)");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(3600))
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                AppError::DatabaseError(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("PostgreSQL connection pool ready, migrations applied");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn records<T: PgRecord>(&self) -> PgRecordRepository<T> {
        PgRecordRepository {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }

    pub fn user_repo(&self) -> PostgresUserRepository {
        PostgresUserRepository { pool: self.pool.clone() }
    }

    pub fn image_repo(&self) -> PostgresImageRepository {
        PostgresImageRepository { pool: self.pool.clone() }
    }

    pub fn vote_repo(&self) -> PostgresVoteRepository {
        PostgresVoteRepository { pool: self.pool.clone() }
    }

    pub fn notification_repo(&self) -> PostgresNotificationRepository {
        PostgresNotificationRepository { pool: self.pool.clone() }
    }

    pub fn inbox_repo(&self) -> PostgresInboxRepository {
        PostgresInboxRepository { pool: self.pool.clone() }
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.pool).await?;
        Ok(())
    }
}

/// A soft-deletable model that can be written with a generic query. Values are
/// bound in `SoftDelete::COLUMNS` order.
pub trait PgRecord: SoftDelete + for<'r> FromRow<'r, PgRow> {
    fn bind_columns(&self, values: &mut Separated<'_, '_, Postgres, &'static str>);
}

impl PgRecord for Question {
    fn bind_columns(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.user_id);
        values.push_bind(self.title.clone());
        values.push_bind(self.content_markdown.clone());
        values.push_bind(self.content_rendered.clone());
        values.push_bind(self.answer_count);
        values.push_bind(self.comment_count);
        values.push_bind(self.create_time);
        values.push_bind(self.update_time);
        values.push_bind(self.delete_time);
    }
}

impl PgRecord for Article {
    fn bind_columns(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.user_id);
        values.push_bind(self.title.clone());
        values.push_bind(self.content_markdown.clone());
        values.push_bind(self.content_rendered.clone());
        values.push_bind(self.comment_count);
        values.push_bind(self.create_time);
        values.push_bind(self.update_time);
        values.push_bind(self.delete_time);
    }
}

impl PgRecord for Answer {
    fn bind_columns(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.question_id);
        values.push_bind(self.user_id);
        values.push_bind(self.content_markdown.clone());
        values.push_bind(self.content_rendered.clone());
        values.push_bind(self.comment_count);
        values.push_bind(self.create_time);
        values.push_bind(self.update_time);
        values.push_bind(self.delete_time);
    }
}

impl PgRecord for Comment {
    fn bind_columns(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.commentable_type.clone());
        values.push_bind(self.commentable_id);
        values.push_bind(self.user_id);
        values.push_bind(self.content.clone());
        values.push_bind(self.create_time);
        values.push_bind(self.update_time);
        values.push_bind(self.delete_time);
    }
}

impl PgRecord for Topic {
    fn bind_columns(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.user_id);
        values.push_bind(self.name.clone());
        values.push_bind(self.description.clone());
        values.push_bind(self.create_time);
        values.push_bind(self.update_time);
        values.push_bind(self.delete_time);
    }
}

fn scope_condition(scope: TrashScope) -> &'static str {
    match scope {
        TrashScope::Active => "delete_time IS NULL",
        TrashScope::OnlyTrashed => "delete_time IS NOT NULL",
        TrashScope::WithTrashed => "TRUE",
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &[(&'static str, ColumnValue)]) {
    for (column, value) in filters {
        builder.push(format!(" AND {} = ", column));
        match value {
            ColumnValue::Int(v) => builder.push_bind(*v),
            ColumnValue::Text(v) => builder.push_bind(v.clone()),
        };
    }
}

// Generic repository for the soft-deletable tables
pub struct PgRecordRepository<T> {
    pool: Arc<PgPool>,
    _marker: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: PgRecord> RecordRepository<T> for PgRecordRepository<T> {
    async fn insert(&self, record: &T) -> Result<T> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            T::TABLE,
            T::COLUMNS.join(", ")
        ));
        {
            let mut values = builder.separated(", ");
            record.bind_columns(&mut values);
        }
        builder.push(") RETURNING *");

        builder
            .build_query_as::<T>()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create {}: {}", T::KIND, e)))
    }

    async fn update(&self, record: &T) -> Result<T> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {} SET ({}) = ROW(",
            T::TABLE,
            T::COLUMNS.join(", ")
        ));
        {
            let mut values = builder.separated(", ");
            record.bind_columns(&mut values);
        }
        builder.push(format!(") WHERE {} = ", T::PRIMARY_KEY));
        builder.push_bind(record.id());
        builder.push(" RETURNING *");

        builder
            .build_query_as::<T>()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update {}: {}", T::KIND, e)))?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", T::KIND, record.id())))
    }

    async fn find(&self, id: i64, scope: TrashScope) -> Result<Option<T>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 AND {}",
            T::TABLE,
            T::PRIMARY_KEY,
            scope_condition(scope)
        );
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get {}: {}", T::KIND, e)))
    }

    async fn find_many(&self, ids: &[i64], scope: TrashScope) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ANY($1) AND {} ORDER BY {}",
            T::TABLE,
            T::PRIMARY_KEY,
            scope_condition(scope),
            T::PRIMARY_KEY
        );
        sqlx::query_as::<_, T>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get {} list: {}", T::KIND, e)))
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<T>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT * FROM {} WHERE {}",
            T::TABLE,
            scope_condition(query.scope)
        ));
        push_filters(&mut builder, &query.filters);

        let direction = if query.order.descending { "DESC" } else { "ASC" };
        builder.push(format!(
            " ORDER BY {} {}, {} {} LIMIT ",
            query.order.column,
            direction,
            T::PRIMARY_KEY,
            direction
        ));
        builder.push_bind(query.limit as i64);
        builder.push(" OFFSET ");
        builder.push_bind(query.offset as i64);

        builder
            .build_query_as::<T>()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list {}: {}", T::KIND, e)))
    }

    async fn count(&self, filters: &[(&'static str, ColumnValue)], scope: TrashScope) -> Result<i64> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            T::TABLE,
            scope_condition(scope)
        ));
        push_filters(&mut builder, filters);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count {}: {}", T::KIND, e)))
    }

    async fn trash(&self, ids: &[i64], time: i64) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET delete_time = $1 WHERE {} = ANY($2) AND delete_time IS NULL",
            T::TABLE,
            T::PRIMARY_KEY
        );
        sqlx::query(&sql)
            .bind(time)
            .bind(ids.to_vec())
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to trash {}: {}", T::KIND, e)))?;
        Ok(())
    }

    async fn restore(&self, ids: &[i64]) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET delete_time = NULL WHERE {} = ANY($1)",
            T::TABLE,
            T::PRIMARY_KEY
        );
        sqlx::query(&sql)
            .bind(ids.to_vec())
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to restore {}: {}", T::KIND, e)))?;
        Ok(())
    }

    async fn delete(&self, ids: &[i64]) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ANY($1)", T::TABLE, T::PRIMARY_KEY);
        sqlx::query(&sql)
            .bind(ids.to_vec())
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete {}: {}", T::KIND, e)))?;
        Ok(())
    }
}

// PostgreSQL User Repository
pub struct PostgresUserRepository {
    pool: Arc<PgPool>,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, username, avatar, headline, create_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING user_id, username, avatar, headline, create_time
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.avatar)
        .bind(&user.headline)
        .bind(user.create_time)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create user: {}", e)))
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, username, avatar, headline, create_time FROM users WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get user by id: {}", e)))
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, User>(
            "SELECT user_id, username, avatar, headline, create_time FROM users WHERE user_id = ANY($1)",
        )
        .bind(ids.to_vec())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get users: {}", e)))
    }
}

// PostgreSQL Image Repository
pub struct PostgresImageRepository {
    pool: Arc<PgPool>,
}

const IMAGE_COLUMNS: &str = "key, filename, width, height, create_time, item_type, item_id, user_id";

#[async_trait]
impl ImageRepository for PostgresImageRepository {
    async fn insert(&self, image: &Image) -> Result<Image> {
        sqlx::query_as::<_, Image>(&format!(
            "INSERT INTO images ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {cols}",
            cols = IMAGE_COLUMNS
        ))
        .bind(&image.key)
        .bind(&image.filename)
        .bind(image.width)
        .bind(image.height)
        .bind(image.create_time)
        .bind(&image.item_type)
        .bind(image.item_id)
        .bind(image.user_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create image: {}", e)))
    }

    async fn find(&self, key: &str) -> Result<Option<Image>> {
        sqlx::query_as::<_, Image>(&format!("SELECT {} FROM images WHERE key = $1", IMAGE_COLUMNS))
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get image: {}", e)))
    }

    async fn find_many(&self, keys: &[String]) -> Result<Vec<Image>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Image>(&format!("SELECT {} FROM images WHERE key = ANY($1)", IMAGE_COLUMNS))
            .bind(keys.to_vec())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get images: {}", e)))
    }

    async fn list(&self, user_id: Option<i64>, limit: u32, offset: u32) -> Result<Vec<Image>> {
        sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE ($1::BIGINT IS NULL OR user_id = $1) \
             ORDER BY create_time DESC, key ASC LIMIT $2 OFFSET $3",
            IMAGE_COLUMNS
        ))
        .bind(user_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list images: {}", e)))
    }

    async fn count(&self, user_id: Option<i64>) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images WHERE ($1::BIGINT IS NULL OR user_id = $1)")
            .bind(user_id)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count images: {}", e)))
    }

    async fn update(&self, image: &Image) -> Result<Image> {
        sqlx::query_as::<_, Image>(&format!(
            "UPDATE images SET filename = $2, item_type = $3, item_id = $4 WHERE key = $1 RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(&image.key)
        .bind(&image.filename)
        .bind(&image.item_type)
        .bind(image.item_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update image: {}", e)))?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", image.key)))
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        sqlx::query("DELETE FROM images WHERE key = ANY($1)")
            .bind(keys.to_vec())
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete images: {}", e)))?;
        Ok(())
    }

    async fn attach(&self, keys: &[String], user_id: i64, item_type: &str, item_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE images SET item_type = $1, item_id = $2 \
             WHERE key = ANY($3) AND user_id = $4 AND item_type IS NULL",
        )
        .bind(item_type)
        .bind(item_id)
        .bind(keys.to_vec())
        .bind(user_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to attach images: {}", e)))?;
        Ok(())
    }
}

// PostgreSQL Vote Repository
pub struct PostgresVoteRepository {
    pool: Arc<PgPool>,
}

#[async_trait]
impl VoteRepository for PostgresVoteRepository {
    async fn find_for_user(&self, user_id: i64, votable_type: &str, votable_ids: &[i64]) -> Result<Vec<Vote>> {
        if votable_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Vote>(
            r#"
            SELECT user_id, votable_id, votable_type, type, create_time
            FROM votes
            WHERE user_id = $1 AND votable_type = $2 AND votable_id = ANY($3)
            "#,
        )
        .bind(user_id)
        .bind(votable_type)
        .bind(votable_ids.to_vec())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get votes: {}", e)))
    }

    async fn upsert(&self, vote: &Vote) -> Result<Vote> {
        sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (user_id, votable_id, votable_type, type, create_time)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, votable_type, votable_id)
            DO UPDATE SET type = EXCLUDED.type, create_time = EXCLUDED.create_time
            RETURNING user_id, votable_id, votable_type, type, create_time
            "#,
        )
        .bind(vote.user_id)
        .bind(vote.votable_id)
        .bind(&vote.votable_type)
        .bind(&vote.vote_type)
        .bind(vote.create_time)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to cast vote: {}", e)))
    }

    async fn remove(&self, user_id: i64, votable_type: &str, votable_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM votes WHERE user_id = $1 AND votable_type = $2 AND votable_id = $3")
            .bind(user_id)
            .bind(votable_type)
            .bind(votable_id)
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to remove vote: {}", e)))?;
        Ok(())
    }

    async fn delete_for_targets(&self, votable_type: &str, votable_ids: &[i64]) -> Result<()> {
        sqlx::query("DELETE FROM votes WHERE votable_type = $1 AND votable_id = ANY($2)")
            .bind(votable_type)
            .bind(votable_ids.to_vec())
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete votes: {}", e)))?;
        Ok(())
    }
}

// PostgreSQL Notification Repository
pub struct PostgresNotificationRepository {
    pool: Arc<PgPool>,
}

const NOTIFICATION_COLUMNS: &str = "notification_id, receiver_id, sender_id, type, question_id, article_id, \
     answer_id, comment_id, content_deleted, create_time, read_time";

fn push_notification_filter(builder: &mut QueryBuilder<'_, Postgres>, receiver_id: i64, filter: &NotificationFilter) {
    builder.push(" WHERE receiver_id = ");
    builder.push_bind(receiver_id);
    if let Some(kind) = &filter.notification_type {
        builder.push(" AND type = ");
        builder.push_bind(kind.clone());
    }
    if filter.unread_only {
        builder.push(" AND read_time IS NULL");
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn insert_many(&self, notifications: &[Notification]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for n in notifications {
            sqlx::query(
                r#"
                INSERT INTO notifications (receiver_id, sender_id, type, question_id, article_id,
                                           answer_id, comment_id, content_deleted, create_time, read_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(n.receiver_id)
            .bind(n.sender_id)
            .bind(&n.notification_type)
            .bind(n.question_id)
            .bind(n.article_id)
            .bind(n.answer_id)
            .bind(n.comment_id)
            .bind(&n.content_deleted)
            .bind(n.create_time)
            .bind(n.read_time)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create notification: {}", e)))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Option<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {} FROM notifications WHERE notification_id = $1",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get notification: {}", e)))
    }

    async fn list(&self, receiver_id: i64, filter: &NotificationFilter, limit: u32, offset: u32) -> Result<Vec<Notification>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM notifications", NOTIFICATION_COLUMNS));
        push_notification_filter(&mut builder, receiver_id, filter);
        builder.push(" ORDER BY notification_id DESC LIMIT ");
        builder.push_bind(limit as i64);
        builder.push(" OFFSET ");
        builder.push_bind(offset as i64);

        builder
            .build_query_as::<Notification>()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list notifications: {}", e)))
    }

    async fn count(&self, receiver_id: i64, filter: &NotificationFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_notification_filter(&mut builder, receiver_id, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count notifications: {}", e)))
    }

    async fn mark_read(&self, receiver_id: i64, ids: Option<&[i64]>, time: i64) -> Result<()> {
        sqlx::query(
            "UPDATE notifications SET read_time = $1 \
             WHERE receiver_id = $2 AND read_time IS NULL \
             AND ($3::BIGINT[] IS NULL OR notification_id = ANY($3))",
        )
        .bind(time)
        .bind(receiver_id)
        .bind(ids.map(|ids| ids.to_vec()))
        .execute(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to mark notifications read: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM notifications WHERE notification_id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete notification: {}", e)))?;
        Ok(())
    }
}

// PostgreSQL Inbox Repository
pub struct PostgresInboxRepository {
    pool: Arc<PgPool>,
}

const INBOX_COLUMNS: &str =
    "inbox_id, receiver_id, sender_id, content_markdown, content_rendered, create_time, read_time";

#[async_trait]
impl InboxRepository for PostgresInboxRepository {
    async fn insert(&self, message: &Inbox) -> Result<Inbox> {
        sqlx::query_as::<_, Inbox>(&format!(
            "INSERT INTO inbox (receiver_id, sender_id, content_markdown, content_rendered, create_time, read_time) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            INBOX_COLUMNS
        ))
        .bind(message.receiver_id)
        .bind(message.sender_id)
        .bind(&message.content_markdown)
        .bind(&message.content_rendered)
        .bind(message.create_time)
        .bind(message.read_time)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to send message: {}", e)))
    }

    async fn find(&self, id: i64) -> Result<Option<Inbox>> {
        sqlx::query_as::<_, Inbox>(&format!("SELECT {} FROM inbox WHERE inbox_id = $1", INBOX_COLUMNS))
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get message: {}", e)))
    }

    async fn list_received(&self, receiver_id: i64, limit: u32, offset: u32) -> Result<Vec<Inbox>> {
        sqlx::query_as::<_, Inbox>(&format!(
            "SELECT {} FROM inbox WHERE receiver_id = $1 ORDER BY inbox_id DESC LIMIT $2 OFFSET $3",
            INBOX_COLUMNS
        ))
        .bind(receiver_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list messages: {}", e)))
    }

    async fn count_received(&self, receiver_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM inbox WHERE receiver_id = $1")
            .bind(receiver_id)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count messages: {}", e)))
    }

    async fn list_conversation(&self, user_a: i64, user_b: i64, limit: u32, offset: u32) -> Result<Vec<Inbox>> {
        sqlx::query_as::<_, Inbox>(&format!(
            "SELECT {} FROM inbox \
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY inbox_id DESC LIMIT $3 OFFSET $4",
            INBOX_COLUMNS
        ))
        .bind(user_a)
        .bind(user_b)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list conversation: {}", e)))
    }

    async fn count_conversation(&self, user_a: i64, user_b: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM inbox \
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1)",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count conversation: {}", e)))
    }

    async fn mark_read(&self, id: i64, time: i64) -> Result<()> {
        sqlx::query("UPDATE inbox SET read_time = $1 WHERE inbox_id = $2 AND read_time IS NULL")
            .bind(time)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark message read: {}", e)))?;
        Ok(())
    }
}
