// Repository trait abstractions for database operations
use crate::models::{ColumnValue, Image, Inbox, Notification, SoftDelete, User, Vote};
use crate::{AppError, Result};
use async_trait::async_trait;

/// Which rows a lookup may see with respect to the trash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashScope {
    Active,
    OnlyTrashed,
    WithTrashed,
}

impl TrashScope {
    pub fn admits(&self, delete_time: Option<i64>) -> bool {
        match self {
            TrashScope::Active => delete_time.is_none(),
            TrashScope::OnlyTrashed => delete_time.is_some(),
            TrashScope::WithTrashed => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(column: &'static str) -> Self {
        Self { column, descending: true }
    }

    pub fn asc(column: &'static str) -> Self {
        Self { column, descending: false }
    }

    /// Parses `-create_time` / `create_time` style order parameters. Columns
    /// outside `allowed` are rejected.
    pub fn parse(value: &str, allowed: &[&'static str]) -> Option<Self> {
        let (descending, name) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        allowed
            .iter()
            .find(|column| **column == name)
            .map(|column| Self { column: *column, descending })
    }
}

pub type Filters = Vec<(&'static str, ColumnValue)>;

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filters: Filters,
    pub order: OrderBy,
    pub limit: u32,
    pub offset: u32,
    pub scope: TrashScope,
}

impl ListQuery {
    pub fn new(order: OrderBy) -> Self {
        Self {
            filters: Vec::new(),
            order,
            limit: 20,
            offset: 0,
            scope: TrashScope::Active,
        }
    }

    pub fn filter(mut self, column: &'static str, value: ColumnValue) -> Self {
        self.filters.push((column, value));
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn scope(mut self, scope: TrashScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Storage for the soft-deletable resources (questions, articles, answers,
/// comments, topics).
#[async_trait]
pub trait RecordRepository<T: SoftDelete>: Send + Sync {
    /// Inserts the record, ignoring its id, and returns it with the assigned id.
    async fn insert(&self, record: &T) -> Result<T>;
    async fn update(&self, record: &T) -> Result<T>;
    async fn find(&self, id: i64, scope: TrashScope) -> Result<Option<T>>;
    async fn find_many(&self, ids: &[i64], scope: TrashScope) -> Result<Vec<T>>;
    async fn list(&self, query: &ListQuery) -> Result<Vec<T>>;
    async fn count(&self, filters: &[(&'static str, ColumnValue)], scope: TrashScope) -> Result<i64>;
    /// Sets `delete_time` on the given live rows.
    async fn trash(&self, ids: &[i64], time: i64) -> Result<()>;
    /// Clears `delete_time` on the given rows.
    async fn restore(&self, ids: &[i64]) -> Result<()>;
    /// Removes the rows permanently, trashed or not.
    async fn delete(&self, ids: &[i64]) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<User>;
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>>;
    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn insert(&self, image: &Image) -> Result<Image>;
    async fn find(&self, key: &str) -> Result<Option<Image>>;
    async fn find_many(&self, keys: &[String]) -> Result<Vec<Image>>;
    async fn list(&self, user_id: Option<i64>, limit: u32, offset: u32) -> Result<Vec<Image>>;
    async fn count(&self, user_id: Option<i64>) -> Result<i64>;
    async fn update(&self, image: &Image) -> Result<Image>;
    async fn delete(&self, keys: &[String]) -> Result<()>;
    /// Links unattached images owned by `user_id` to a piece of content.
    async fn attach(&self, keys: &[String], user_id: i64, item_type: &str, item_id: i64) -> Result<()>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    async fn find_for_user(&self, user_id: i64, votable_type: &str, votable_ids: &[i64]) -> Result<Vec<Vote>>;
    async fn upsert(&self, vote: &Vote) -> Result<Vote>;
    async fn remove(&self, user_id: i64, votable_type: &str, votable_id: i64) -> Result<()>;
    async fn delete_for_targets(&self, votable_type: &str, votable_ids: &[i64]) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub notification_type: Option<String>,
    pub unread_only: bool,
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_many(&self, notifications: &[Notification]) -> Result<()>;
    async fn find(&self, id: i64) -> Result<Option<Notification>>;
    async fn list(&self, receiver_id: i64, filter: &NotificationFilter, limit: u32, offset: u32) -> Result<Vec<Notification>>;
    async fn count(&self, receiver_id: i64, filter: &NotificationFilter) -> Result<i64>;
    /// Marks the given notifications (or all of the receiver's when `ids` is
    /// `None`) as read.
    async fn mark_read(&self, receiver_id: i64, ids: Option<&[i64]>, time: i64) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait InboxRepository: Send + Sync {
    async fn insert(&self, message: &Inbox) -> Result<Inbox>;
    async fn find(&self, id: i64) -> Result<Option<Inbox>>;
    async fn list_received(&self, receiver_id: i64, limit: u32, offset: u32) -> Result<Vec<Inbox>>;
    async fn count_received(&self, receiver_id: i64) -> Result<i64>;
    /// Messages exchanged between two users, newest first.
    async fn list_conversation(&self, user_a: i64, user_b: i64, limit: u32, offset: u32) -> Result<Vec<Inbox>>;
    async fn count_conversation(&self, user_a: i64, user_b: i64) -> Result<i64>;
    async fn mark_read(&self, id: i64, time: i64) -> Result<()>;
}

// In-memory implementations, used when no database is configured and in tests
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::InternalError("In-memory store lock poisoned".to_string()))
}

fn page<T>(items: Vec<T>, limit: u32, offset: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

fn compare_columns(a: Option<ColumnValue>, b: Option<ColumnValue>) -> Ordering {
    match (a, b) {
        (Some(ColumnValue::Int(a)), Some(ColumnValue::Int(b))) => a.cmp(&b),
        (Some(ColumnValue::Text(a)), Some(ColumnValue::Text(b))) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

pub struct InMemoryRecordRepository<T: SoftDelete> {
    rows: Arc<Mutex<BTreeMap<i64, T>>>,
    next_id: Arc<Mutex<i64>>,
}

impl<T: SoftDelete> InMemoryRecordRepository<T> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn matches(record: &T, filters: &[(&'static str, ColumnValue)], scope: TrashScope) -> bool {
        scope.admits(record.delete_time())
            && filters
                .iter()
                .all(|(column, value)| record.column(column).as_ref() == Some(value))
    }
}

impl<T: SoftDelete> Default for InMemoryRecordRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: SoftDelete> RecordRepository<T> for InMemoryRecordRepository<T> {
    async fn insert(&self, record: &T) -> Result<T> {
        let mut next_id = lock(&self.next_id)?;
        let mut stored = record.clone();
        stored.set_id(*next_id);
        *next_id += 1;

        lock(&self.rows)?.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, record: &T) -> Result<T> {
        let mut rows = lock(&self.rows)?;
        match rows.get_mut(&record.id()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record.clone())
            }
            None => Err(AppError::NotFound(format!("{} {} not found", T::KIND, record.id()))),
        }
    }

    async fn find(&self, id: i64, scope: TrashScope) -> Result<Option<T>> {
        let rows = lock(&self.rows)?;
        Ok(rows
            .get(&id)
            .filter(|record| scope.admits(record.delete_time()))
            .cloned())
    }

    async fn find_many(&self, ids: &[i64], scope: TrashScope) -> Result<Vec<T>> {
        let rows = lock(&self.rows)?;
        Ok(rows
            .values()
            .filter(|record| ids.contains(&record.id()) && scope.admits(record.delete_time()))
            .cloned()
            .collect())
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<T>> {
        let rows = lock(&self.rows)?;
        let mut matched: Vec<T> = rows
            .values()
            .filter(|record| Self::matches(record, &query.filters, query.scope))
            .cloned()
            .collect();
        drop(rows);

        matched.sort_by(|a, b| {
            let ordering = compare_columns(a.column(query.order.column), b.column(query.order.column))
                .then_with(|| a.id().cmp(&b.id()));
            if query.order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        Ok(page(matched, query.limit, query.offset))
    }

    async fn count(&self, filters: &[(&'static str, ColumnValue)], scope: TrashScope) -> Result<i64> {
        let rows = lock(&self.rows)?;
        Ok(rows.values().filter(|record| Self::matches(record, filters, scope)).count() as i64)
    }

    async fn trash(&self, ids: &[i64], time: i64) -> Result<()> {
        let mut rows = lock(&self.rows)?;
        for id in ids {
            if let Some(record) = rows.get_mut(id) {
                if !record.is_trashed() {
                    record.set_delete_time(Some(time));
                }
            }
        }
        Ok(())
    }

    async fn restore(&self, ids: &[i64]) -> Result<()> {
        let mut rows = lock(&self.rows)?;
        for id in ids {
            if let Some(record) = rows.get_mut(id) {
                record.set_delete_time(None);
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[i64]) -> Result<()> {
        let mut rows = lock(&self.rows)?;
        for id in ids {
            rows.remove(id);
        }
        Ok(())
    }
}

pub struct InMemoryUserRepository {
    users_by_id: Arc<Mutex<HashMap<i64, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users_by_id: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<User> {
        lock(&self.users_by_id)?.insert(user.user_id, user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(lock(&self.users_by_id)?.get(&id).cloned())
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let users = lock(&self.users_by_id)?;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

pub struct InMemoryImageRepository {
    images: Arc<Mutex<HashMap<String, Image>>>,
}

impl InMemoryImageRepository {
    pub fn new() -> Self {
        Self {
            images: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryImageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageRepository for InMemoryImageRepository {
    async fn insert(&self, image: &Image) -> Result<Image> {
        lock(&self.images)?.insert(image.key.clone(), image.clone());
        Ok(image.clone())
    }

    async fn find(&self, key: &str) -> Result<Option<Image>> {
        Ok(lock(&self.images)?.get(key).cloned())
    }

    async fn find_many(&self, keys: &[String]) -> Result<Vec<Image>> {
        let images = lock(&self.images)?;
        Ok(keys.iter().filter_map(|key| images.get(key).cloned()).collect())
    }

    async fn list(&self, user_id: Option<i64>, limit: u32, offset: u32) -> Result<Vec<Image>> {
        let images = lock(&self.images)?;
        let mut matched: Vec<Image> = images
            .values()
            .filter(|image| user_id.map_or(true, |id| image.user_id == id))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.create_time.cmp(&a.create_time).then_with(|| a.key.cmp(&b.key)));
        Ok(page(matched, limit, offset))
    }

    async fn count(&self, user_id: Option<i64>) -> Result<i64> {
        let images = lock(&self.images)?;
        Ok(images
            .values()
            .filter(|image| user_id.map_or(true, |id| image.user_id == id))
            .count() as i64)
    }

    async fn update(&self, image: &Image) -> Result<Image> {
        let mut images = lock(&self.images)?;
        match images.get_mut(&image.key) {
            Some(existing) => {
                *existing = image.clone();
                Ok(image.clone())
            }
            None => Err(AppError::NotFound(format!("Image {} not found", image.key))),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        let mut images = lock(&self.images)?;
        for key in keys {
            images.remove(key);
        }
        Ok(())
    }

    async fn attach(&self, keys: &[String], user_id: i64, item_type: &str, item_id: i64) -> Result<()> {
        let mut images = lock(&self.images)?;
        for key in keys {
            if let Some(image) = images.get_mut(key) {
                if image.user_id == user_id && image.item_type.is_none() {
                    image.item_type = Some(item_type.to_string());
                    image.item_id = item_id;
                }
            }
        }
        Ok(())
    }
}

pub struct InMemoryVoteRepository {
    // (user_id, votable_type, votable_id) -> Vote
    votes: Arc<Mutex<HashMap<(i64, String, i64), Vote>>>,
}

impl InMemoryVoteRepository {
    pub fn new() -> Self {
        Self {
            votes: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVoteRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoteRepository for InMemoryVoteRepository {
    async fn find_for_user(&self, user_id: i64, votable_type: &str, votable_ids: &[i64]) -> Result<Vec<Vote>> {
        let votes = lock(&self.votes)?;
        Ok(votes
            .values()
            .filter(|vote| {
                vote.user_id == user_id
                    && vote.votable_type == votable_type
                    && votable_ids.contains(&vote.votable_id)
            })
            .cloned()
            .collect())
    }

    async fn upsert(&self, vote: &Vote) -> Result<Vote> {
        let key = (vote.user_id, vote.votable_type.clone(), vote.votable_id);
        lock(&self.votes)?.insert(key, vote.clone());
        Ok(vote.clone())
    }

    async fn remove(&self, user_id: i64, votable_type: &str, votable_id: i64) -> Result<()> {
        lock(&self.votes)?.remove(&(user_id, votable_type.to_string(), votable_id));
        Ok(())
    }

    async fn delete_for_targets(&self, votable_type: &str, votable_ids: &[i64]) -> Result<()> {
        lock(&self.votes)?
            .retain(|(_, kind, id), _| !(kind == votable_type && votable_ids.contains(id)));
        Ok(())
    }
}

pub struct InMemoryNotificationRepository {
    notifications: Arc<Mutex<BTreeMap<i64, Notification>>>,
    next_id: Arc<Mutex<i64>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn matches(notification: &Notification, receiver_id: i64, filter: &NotificationFilter) -> bool {
        notification.receiver_id == receiver_id
            && filter
                .notification_type
                .as_ref()
                .map_or(true, |kind| &notification.notification_type == kind)
            && (!filter.unread_only || notification.read_time.is_none())
    }
}

impl Default for InMemoryNotificationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert_many(&self, notifications: &[Notification]) -> Result<()> {
        let mut next_id = lock(&self.next_id)?;
        let mut stored = lock(&self.notifications)?;
        for notification in notifications {
            let mut notification = notification.clone();
            notification.notification_id = *next_id;
            *next_id += 1;
            stored.insert(notification.notification_id, notification);
        }
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Option<Notification>> {
        Ok(lock(&self.notifications)?.get(&id).cloned())
    }

    async fn list(&self, receiver_id: i64, filter: &NotificationFilter, limit: u32, offset: u32) -> Result<Vec<Notification>> {
        let notifications = lock(&self.notifications)?;
        let matched: Vec<Notification> = notifications
            .values()
            .rev()
            .filter(|n| Self::matches(n, receiver_id, filter))
            .cloned()
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn count(&self, receiver_id: i64, filter: &NotificationFilter) -> Result<i64> {
        let notifications = lock(&self.notifications)?;
        Ok(notifications
            .values()
            .filter(|n| Self::matches(n, receiver_id, filter))
            .count() as i64)
    }

    async fn mark_read(&self, receiver_id: i64, ids: Option<&[i64]>, time: i64) -> Result<()> {
        let mut notifications = lock(&self.notifications)?;
        for notification in notifications.values_mut() {
            let selected = ids.map_or(true, |ids| ids.contains(&notification.notification_id));
            if notification.receiver_id == receiver_id && selected && notification.read_time.is_none() {
                notification.read_time = Some(time);
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        lock(&self.notifications)?.remove(&id);
        Ok(())
    }
}

pub struct InMemoryInboxRepository {
    messages: Arc<Mutex<BTreeMap<i64, Inbox>>>,
    next_id: Arc<Mutex<i64>>,
}

impl InMemoryInboxRepository {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn in_conversation(message: &Inbox, user_a: i64, user_b: i64) -> bool {
        (message.sender_id == user_a && message.receiver_id == user_b)
            || (message.sender_id == user_b && message.receiver_id == user_a)
    }
}

impl Default for InMemoryInboxRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InboxRepository for InMemoryInboxRepository {
    async fn insert(&self, message: &Inbox) -> Result<Inbox> {
        let mut next_id = lock(&self.next_id)?;
        let mut stored = message.clone();
        stored.inbox_id = *next_id;
        *next_id += 1;
        lock(&self.messages)?.insert(stored.inbox_id, stored.clone());
        Ok(stored)
    }

    async fn find(&self, id: i64) -> Result<Option<Inbox>> {
        Ok(lock(&self.messages)?.get(&id).cloned())
    }

    async fn list_received(&self, receiver_id: i64, limit: u32, offset: u32) -> Result<Vec<Inbox>> {
        let messages = lock(&self.messages)?;
        let matched: Vec<Inbox> = messages
            .values()
            .rev()
            .filter(|m| m.receiver_id == receiver_id)
            .cloned()
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn count_received(&self, receiver_id: i64) -> Result<i64> {
        let messages = lock(&self.messages)?;
        Ok(messages.values().filter(|m| m.receiver_id == receiver_id).count() as i64)
    }

    async fn list_conversation(&self, user_a: i64, user_b: i64, limit: u32, offset: u32) -> Result<Vec<Inbox>> {
        let messages = lock(&self.messages)?;
        let matched: Vec<Inbox> = messages
            .values()
            .rev()
            .filter(|m| Self::in_conversation(m, user_a, user_b))
            .cloned()
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn count_conversation(&self, user_a: i64, user_b: i64) -> Result<i64> {
        let messages = lock(&self.messages)?;
        Ok(messages
            .values()
            .filter(|m| Self::in_conversation(m, user_a, user_b))
            .count() as i64)
    }

    async fn mark_read(&self, id: i64, time: i64) -> Result<()> {
        if let Some(message) = lock(&self.messages)?.get_mut(&id) {
            if message.read_time.is_none() {
                message.read_time = Some(time);
            }
        }
        Ok(())
    }
}
