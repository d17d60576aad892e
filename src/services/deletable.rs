// Soft-delete lifecycle shared by questions, articles, answers, comments and topics.
//
// Trashing always notifies the owner. Deleting permanently notifies only for
// rows that were still live; rows already in the trash were announced when
// they were trashed.
use async_trait::async_trait;

use crate::db::repository::{RecordRepository, TrashScope};
use crate::models::{now, SoftDelete};
use crate::services::notification_service::{NotificationBatch, NotificationService};
use crate::{AppError, Result};

#[async_trait]
pub trait Deletable: Send + Sync {
    type Record: SoftDelete;

    fn records(&self) -> &dyn RecordRepository<Self::Record>;
    fn notifier(&self) -> &NotificationService;

    /// Queues the notices sent when `items` leave the site.
    async fn deletion_notices(&self, _items: &[Self::Record], _batch: &mut NotificationBatch) -> Result<()> {
        Ok(())
    }

    async fn after_delete(&self, _items: &[Self::Record]) -> Result<()> {
        Ok(())
    }

    async fn after_trash(&self, _items: &[Self::Record]) -> Result<()> {
        Ok(())
    }

    async fn after_untrash(&self, _items: &[Self::Record]) -> Result<()> {
        Ok(())
    }

    async fn add_notifications(&self, items: &[Self::Record], actor: i64) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut batch = NotificationBatch::new(Some(actor), now());
        self.deletion_notices(items, &mut batch).await?;
        self.notifier().send(batch).await
    }

    /// Permanently deletes the rows, trashed or not.
    async fn delete_multiple(&self, ids: &[i64], actor: i64) -> Result<()> {
        let items = self.records().find_many(ids, TrashScope::WithTrashed).await?;
        if items.is_empty() {
            return Ok(());
        }

        let found: Vec<i64> = items.iter().map(SoftDelete::id).collect();
        self.records().delete(&found).await?;

        let live: Vec<Self::Record> = items.iter().filter(|item| !item.is_trashed()).cloned().collect();
        self.add_notifications(&live, actor).await?;
        self.after_delete(&items).await?;

        tracing::info!("Deleted {} {} rows", items.len(), <Self::Record as SoftDelete>::KIND);
        Ok(())
    }

    /// Permanently deletes one row. Permission checks are the caller's job;
    /// a row the caller already loaded can be passed in as `known`.
    async fn force_delete(&self, id: i64, known: Option<Self::Record>, actor: i64) -> Result<()> {
        let item = match known {
            Some(item) => item,
            None => match self.records().find(id, TrashScope::WithTrashed).await? {
                Some(item) => item,
                None => return Ok(()),
            },
        };

        self.records().delete(&[item.id()]).await?;

        if !item.is_trashed() {
            self.add_notifications(std::slice::from_ref(&item), actor).await?;
        }
        self.after_delete(std::slice::from_ref(&item)).await?;

        tracing::info!("Deleted {} {}", <Self::Record as SoftDelete>::KIND, item.id());
        Ok(())
    }

    /// Moves the live rows among `ids` to the trash and returns them.
    async fn trash_multiple(&self, ids: &[i64], actor: i64) -> Result<Vec<Self::Record>> {
        let items = self.records().find_many(ids, TrashScope::Active).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<i64> = items.iter().map(SoftDelete::id).collect();
        self.records().trash(&found, now()).await?;
        self.add_notifications(&items, actor).await?;

        let trashed = self.records().find_many(&found, TrashScope::WithTrashed).await?;
        self.after_trash(&trashed).await?;
        Ok(trashed)
    }

    async fn trash(&self, id: i64, actor: i64) -> Result<Self::Record> {
        let item = self
            .records()
            .find(id, TrashScope::Active)
            .await?
            .ok_or_else(|| not_found::<Self::Record>(id))?;

        self.records().trash(&[id], now()).await?;
        self.add_notifications(std::slice::from_ref(&item), actor).await?;

        let trashed = self
            .records()
            .find(id, TrashScope::WithTrashed)
            .await?
            .ok_or_else(|| not_found::<Self::Record>(id))?;
        self.after_trash(std::slice::from_ref(&trashed)).await?;
        Ok(trashed)
    }

    /// Restores the trashed rows among `ids` and returns them.
    async fn untrash_multiple(&self, ids: &[i64]) -> Result<Vec<Self::Record>> {
        let items = self.records().find_many(ids, TrashScope::OnlyTrashed).await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<i64> = items.iter().map(SoftDelete::id).collect();
        self.records().restore(&found).await?;

        let restored = self.records().find_many(&found, TrashScope::WithTrashed).await?;
        self.after_untrash(&restored).await?;
        Ok(restored)
    }

    async fn untrash(&self, id: i64) -> Result<Self::Record> {
        if self.records().find(id, TrashScope::OnlyTrashed).await?.is_none() {
            return Err(not_found::<Self::Record>(id));
        }

        self.records().restore(&[id]).await?;

        let restored = self
            .records()
            .find(id, TrashScope::WithTrashed)
            .await?
            .ok_or_else(|| not_found::<Self::Record>(id))?;
        self.after_untrash(std::slice::from_ref(&restored)).await?;
        Ok(restored)
    }
}

fn not_found<T: SoftDelete>(id: i64) -> AppError {
    AppError::NotFound(format!("{} {} not found", T::KIND, id))
}

/// JSON copy of a row, stored with its deletion notice.
pub fn snapshot<T: SoftDelete>(item: &T) -> Result<serde_json::Value> {
    serde_json::to_value(item)
        .map_err(|e| AppError::InternalError(format!("Failed to snapshot {} {}: {}", T::KIND, item.id(), e)))
}
