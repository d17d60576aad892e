pub mod middleware;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Token lifetime for issued tokens.
const TOKEN_TTL_SECONDS: i64 = 15 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: usize, // Expiration time
}

/// The caller of a request, if a valid token was sent.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|claims| claims.user_id)
    }

    pub fn is_admin(&self) -> bool {
        self.0.as_ref().map_or(false, |claims| claims.is_admin)
    }

    pub fn require(&self) -> Result<&Claims> {
        self.0
            .as_ref()
            .ok_or_else(|| AppError::AuthError("Login required".to_string()))
    }

    pub fn require_admin(&self) -> Result<&Claims> {
        let claims = self.require()?;
        if !claims.is_admin {
            return Err(AppError::Forbidden("Administrator only".to_string()));
        }
        Ok(claims)
    }

    /// Owner or administrator.
    pub fn require_owner(&self, owner_id: i64) -> Result<&Claims> {
        let claims = self.require()?;
        if claims.user_id != owner_id && !claims.is_admin {
            return Err(AppError::Forbidden("You can only modify your own content".to_string()));
        }
        Ok(claims)
    }
}

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn generate_token(&self, user_id: i64, username: &str, is_admin: bool) -> Result<String> {
        let exp = chrono::Utc::now().timestamp() + TOKEN_TTL_SECONDS;
        let claims = Claims {
            user_id,
            username: username.to_string(),
            is_admin,
            exp: exp as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("Failed to sign token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::AuthError(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let auth = AuthService::new("secret".to_string());
        let token = auth.generate_token(7, "alice", true).unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "alice");
        assert!(claims.is_admin);
    }

    #[test]
    fn test_rejects_foreign_signature() {
        let token = AuthService::new("one".to_string()).generate_token(1, "bob", false).unwrap();
        let result = AuthService::new("two".to_string()).verify_token(&token);
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }

    #[test]
    fn test_viewer_permissions() {
        let member = Viewer(Some(Claims { user_id: 2, username: "m".into(), is_admin: false, exp: 0 }));
        assert!(member.require_owner(2).is_ok());
        assert!(matches!(member.require_owner(3), Err(AppError::Forbidden(_))));
        assert!(matches!(member.require_admin(), Err(AppError::Forbidden(_))));
        assert!(matches!(Viewer::anonymous().require(), Err(AppError::AuthError(_))));
    }
}
