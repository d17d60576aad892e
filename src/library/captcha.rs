use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::cache::Cache;
use super::throttle::Throttle;
use crate::{AppError, Result};

const CAPTCHA_LIFETIME: u64 = 3600;
pub const DEFAULT_WIDTH: u32 = 100;
pub const DEFAULT_HEIGHT: u32 = 36;

/// A freshly generated captcha as handed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    /// `data:image/png;base64,...`
    pub image: String,
    pub token: String,
}

/// Draws a captcha image and returns its phrase with the PNG bytes.
pub trait CaptchaBuilder: Send + Sync {
    fn build(&self, width: u32, height: u32) -> Result<(String, Vec<u8>)>;
}

/// Five random characters over a noisy background.
pub struct NoiseCaptchaBuilder;

impl CaptchaBuilder for NoiseCaptchaBuilder {
    fn build(&self, width: u32, height: u32) -> Result<(String, Vec<u8>)> {
        let mut captcha = captcha::Captcha::new();
        captcha
            .add_chars(5)
            .apply_filter(captcha::filters::Noise::new(0.2))
            .view(width, height);

        captcha
            .as_tuple()
            .ok_or_else(|| AppError::InternalError("Failed to render captcha".to_string()))
    }
}

#[derive(Clone)]
pub struct CaptchaService {
    cache: Arc<dyn Cache>,
    throttle: Throttle,
    builder: Arc<dyn CaptchaBuilder>,
}

impl CaptchaService {
    pub fn new(cache: Arc<dyn Cache>, builder: Arc<dyn CaptchaBuilder>) -> Self {
        Self {
            throttle: Throttle::new(cache.clone()),
            cache,
            builder,
        }
    }

    fn cache_key(token: &str) -> String {
        format!("captcha_{}", token)
    }

    /// Generates a new captcha. Every call issues a new token.
    pub async fn generate(&self, width: u32, height: u32) -> Result<CaptchaChallenge> {
        let builder = self.builder.clone();
        let (phrase, png) = tokio::task::spawn_blocking(move || builder.build(width, height))
            .await
            .map_err(|e| AppError::InternalError(format!("Captcha task failed: {}", e)))??;

        let token = Uuid::new_v4().simple().to_string();
        self.cache
            .set(&Self::cache_key(&token), Value::String(phrase), CAPTCHA_LIFETIME)
            .await?;

        Ok(CaptchaChallenge {
            image: format!("data:image/png;base64,{}", STANDARD.encode(png)),
            token,
        })
    }

    /// Checks a code against the phrase stored for `token`. A token can be
    /// checked once; the stored phrase is removed whatever the outcome.
    pub async fn check(&self, token: &str, code: &str) -> Result<bool> {
        if token.is_empty() || code.is_empty() {
            return Ok(false);
        }

        let key = Self::cache_key(token);
        let phrase = match self.cache.get(&key).await? {
            Some(Value::String(phrase)) if !phrase.is_empty() => phrase,
            _ => return Ok(false),
        };

        self.cache.delete(&key).await?;

        Ok(phrase.to_lowercase() == code.to_lowercase())
    }

    /// Records one `action` by `id` and reports whether the following attempt
    /// will have to carry a captcha. Fails with a `captcha_code` field error
    /// when the allowance is used up and the supplied captcha does not match.
    #[allow(clippy::too_many_arguments)]
    pub async fn is_next_time_need(
        &self,
        id: &str,
        action: &str,
        max_count: i64,
        period: i64,
        token: Option<&str>,
        code: Option<&str>,
        now: i64,
    ) -> Result<bool> {
        let remaining = self.throttle.get_act_limit(id, action, max_count, period, now).await?;
        let need_captcha = remaining <= 1;

        if remaining <= 0 && !self.check(token.unwrap_or(""), code.unwrap_or("")).await? {
            tracing::info!("Captcha required for {} by {}", action, id);

            let captcha = if need_captcha {
                Some(self.generate(DEFAULT_WIDTH, DEFAULT_HEIGHT).await?)
            } else {
                None
            };
            let mut error = AppError::field("captcha_code", "Captcha code is incorrect");
            if let AppError::FieldValidation { need_captcha: need, captcha: challenge, .. } = &mut error {
                *need = need_captcha;
                *challenge = captcha;
            }
            return Err(error);
        }

        Ok(need_captcha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::cache::MemoryCache;

    struct FixedCaptcha;

    impl CaptchaBuilder for FixedCaptcha {
        fn build(&self, _width: u32, _height: u32) -> Result<(String, Vec<u8>)> {
            Ok(("AbCd5".to_string(), vec![0x89, 0x50, 0x4e, 0x47]))
        }
    }

    fn service() -> CaptchaService {
        CaptchaService::new(Arc::new(MemoryCache::new()), Arc::new(FixedCaptcha))
    }

    #[tokio::test]
    async fn test_generate_issues_new_tokens() {
        let captcha = service();
        let first = captcha.generate(DEFAULT_WIDTH, DEFAULT_HEIGHT).await.unwrap();
        let second = captcha.generate(DEFAULT_WIDTH, DEFAULT_HEIGHT).await.unwrap();

        assert!(first.image.starts_with("data:image/png;base64,"));
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn test_check_is_case_insensitive_and_single_use() {
        let captcha = service();
        let challenge = captcha.generate(DEFAULT_WIDTH, DEFAULT_HEIGHT).await.unwrap();

        assert!(captcha.check(&challenge.token, "abcd5").await.unwrap());
        assert!(!captcha.check(&challenge.token, "abcd5").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_code_burns_the_token() {
        let captcha = service();
        let challenge = captcha.generate(DEFAULT_WIDTH, DEFAULT_HEIGHT).await.unwrap();

        assert!(!captcha.check(&challenge.token, "zzzzz").await.unwrap());
        assert!(!captcha.check(&challenge.token, "AbCd5").await.unwrap());
        assert!(!captcha.check("", "AbCd5").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_next_time_need_progression() {
        let captcha = service();
        let need = |now| captcha.is_next_time_need("1", "create_answer", 2, 3600, None, None, now);

        // remaining 2 then 1
        assert!(!need(100).await.unwrap());
        assert!(need(100).await.unwrap());

        let err = need(100).await.unwrap_err();
        assert!(err.need_captcha());
        match err {
            AppError::FieldValidation { errors, captcha, .. } => {
                assert!(errors.contains_key("captcha_code"));
                assert!(captcha.is_some());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_is_next_time_need_accepts_valid_captcha() {
        let captcha = service();
        captcha.is_next_time_need("1", "create_comment", 1, 3600, None, None, 100).await.unwrap();

        let challenge = captcha.generate(DEFAULT_WIDTH, DEFAULT_HEIGHT).await.unwrap();
        let need = captcha
            .is_next_time_need("1", "create_comment", 1, 3600, Some(&challenge.token), Some("ABCD5"), 100)
            .await
            .unwrap();
        assert!(need);
    }
}
