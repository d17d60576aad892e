// Infrastructure shared by services and routes
pub mod cache;
pub mod captcha;
pub mod feed;
pub mod request;
pub mod storage;
pub mod throttle;

pub use cache::{Cache, MemoryCache};
pub use captcha::{CaptchaBuilder, CaptchaChallenge, CaptchaService, NoiseCaptchaBuilder};
pub use request::RequestContext;
pub use storage::{LocalStorage, StorageAdapter, Thumb};
pub use throttle::Throttle;
