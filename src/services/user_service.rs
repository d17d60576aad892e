use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Claims;
use crate::db::repository::UserRepository;
use crate::models::{now, User, UserBrief};
use crate::{AppError, Result};

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.user_repo
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Accounts are issued elsewhere; the first authenticated write records
    /// the user locally so content can be attributed.
    pub async fn ensure_user(&self, claims: &Claims) -> Result<User> {
        if let Some(user) = self.user_repo.get_user_by_id(claims.user_id).await? {
            return Ok(user);
        }

        let user = User {
            user_id: claims.user_id,
            username: claims.username.clone(),
            avatar: None,
            headline: None,
            create_time: now(),
        };
        tracing::info!("Recording user {} ({})", user.user_id, user.username);
        self.user_repo.create_user(&user).await
    }

    /// Brief users keyed by id, for embedding in `relationships.user`.
    pub async fn get_in_relationship(&self, user_ids: &[i64]) -> Result<HashMap<i64, UserBrief>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = self.user_repo.get_users_by_ids(user_ids).await?;
        Ok(users
            .into_iter()
            .map(|user| (user.user_id, UserBrief::from(user)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::InMemoryUserRepository;

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let service = UserService::new(Arc::new(InMemoryUserRepository::new()));
        let claims = Claims { user_id: 4, username: "dora".into(), is_admin: false, exp: 0 };

        let first = service.ensure_user(&claims).await.unwrap();
        let second = service.ensure_user(&claims).await.unwrap();
        assert_eq!(first.create_time, second.create_time);

        let briefs = service.get_in_relationship(&[4, 5]).await.unwrap();
        assert_eq!(briefs.len(), 1);
        assert_eq!(briefs[&4].username, "dora");
    }
}
