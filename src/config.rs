use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    /// When unset the in-memory repositories are used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub site: SiteConfig,
    pub storage: StorageConfig,
    pub throttle: ThrottleConfig,
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub name: String,
    pub language: String,
    /// Absolute base URL used for links in RSS feeds, without trailing slash.
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: String,
    pub url: String,
    pub max_upload_bytes: usize,
}

/// Limits for content creation before a captcha is demanded.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub max_count: i64,
    pub period: i64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { max_count: 10, period: 3600 }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = ThrottleConfig::default();

        Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-in-production".to_string()),
            site: SiteConfig {
                name: env::var("SITE_NAME").unwrap_or_else(|_| "Community Forum".to_string()),
                language: env::var("SITE_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
                url: env::var("SITE_URL")
                    .unwrap_or_else(|_| "http://localhost:5000".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            storage: StorageConfig {
                path: env::var("STORAGE_PATH").unwrap_or_else(|_| "upload".to_string()),
                url: env::var("STORAGE_URL")
                    .unwrap_or_else(|_| "/upload".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                max_upload_bytes: env::var("STORAGE_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5 * 1024 * 1024),
            },
            throttle: ThrottleConfig {
                max_count: env::var("THROTTLE_MAX_COUNT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_count),
                period: env::var("THROTTLE_PERIOD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.period),
            },
        }
    }

    /// Configuration for tests and local experiments: in-memory storage and a
    /// fixed secret.
    pub fn for_testing(storage_path: &str) -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            site: SiteConfig {
                name: "Test Forum".to_string(),
                language: "en".to_string(),
                url: "http://forum.test".to_string(),
            },
            storage: StorageConfig {
                path: storage_path.to_string(),
                url: "/upload".to_string(),
                max_upload_bytes: 5 * 1024 * 1024,
            },
            throttle: ThrottleConfig::default(),
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
