use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub user_id: i64,
    pub votable_id: i64,
    /// `question`, `answer`, `article` or `comment`
    pub votable_type: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub vote_type: String,
    pub create_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    #[serde(rename = "type")]
    pub vote_type: VoteType,
}
