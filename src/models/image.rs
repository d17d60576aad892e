use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    /// Storage key, `<uuid>.<ext>`.
    pub key: String,
    pub filename: String,
    pub width: i32,
    pub height: i32,
    pub create_time: i64,
    /// `question`, `article` or `answer` once the image is used in content.
    pub item_type: Option<String>,
    pub item_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    pub filename: Option<String>,
}
