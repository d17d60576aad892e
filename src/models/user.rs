use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub headline: Option<String>,
    pub create_time: i64,
}

/// The embedded form used in `relationships.user`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserBrief {
    pub user_id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub headline: Option<String>,
}

impl From<User> for UserBrief {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            avatar: user.avatar,
            headline: user.headline,
        }
    }
}
