use serde::{Deserialize, Serialize};

use super::{ColumnValue, ResourceKind, SoftDelete};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Topic {
    pub topic_id: i64,
    /// The administrator who created the topic.
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub create_time: i64,
    pub update_time: i64,
    pub delete_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTopicRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl SoftDelete for Topic {
    const KIND: ResourceKind = ResourceKind::Topic;
    const TABLE: &'static str = "topics";
    const PRIMARY_KEY: &'static str = "topic_id";
    const COLUMNS: &'static [&'static str] =
        &["user_id", "name", "description", "create_time", "update_time", "delete_time"];

    fn id(&self) -> i64 {
        self.topic_id
    }

    fn set_id(&mut self, id: i64) {
        self.topic_id = id;
    }

    fn owner_id(&self) -> i64 {
        self.user_id
    }

    fn delete_time(&self) -> Option<i64> {
        self.delete_time
    }

    fn set_delete_time(&mut self, time: Option<i64>) {
        self.delete_time = time;
    }

    fn column(&self, name: &str) -> Option<ColumnValue> {
        match name {
            "topic_id" => Some(ColumnValue::Int(self.topic_id)),
            "user_id" => Some(ColumnValue::Int(self.user_id)),
            "name" => Some(ColumnValue::Text(self.name.clone())),
            "create_time" => Some(ColumnValue::Int(self.create_time)),
            "update_time" => Some(ColumnValue::Int(self.update_time)),
            _ => None,
        }
    }
}
