use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header::ACCEPT, request::Parts},
};
use std::collections::HashMap;
use std::convert::Infallible;

use crate::models::now;

pub const DEFAULT_SPLIT_MAX: usize = 100;

/// Per-request facts used by handlers: arrival time, `Accept` negotiation
/// and raw query parameters.
#[derive(Debug, Clone)]
pub struct RequestContext {
    time: i64,
    accept: String,
    query: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(time: i64, accept: &str, query: HashMap<String, String>) -> Self {
        Self {
            time,
            accept: accept.to_string(),
            query,
        }
    }

    /// Unix time at which the request arrived.
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn is_support_webp(&self) -> bool {
        self.accept.contains("image/webp")
    }

    pub fn is_json(&self) -> bool {
        self.accept.contains("application/json")
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Splits a comma separated query parameter. At most `max` pieces are
    /// considered; empty pieces and duplicates are dropped, order is kept.
    pub fn query_params_split(&self, name: &str, max: usize) -> Vec<String> {
        match self.query.get(name) {
            Some(value) => split_unique(value, max),
            None => Vec::new(),
        }
    }

    pub fn includes(&self) -> Vec<String> {
        self.query_params_split("include", DEFAULT_SPLIT_MAX)
    }
}

pub fn split_unique(value: &str, max: usize) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for piece in value.split(',').take(max) {
        if !piece.is_empty() && !items.iter().any(|item| item == piece) {
            items.push(piece.to_string());
        }
    }
    items
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let accept = parts
            .headers
            .get(ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();

        Ok(Self::new(now(), accept, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_split_unique() {
        assert_eq!(split_unique("user,,voting,user", 100), vec!["user", "voting"]);
        assert_eq!(split_unique("a,b,c", 2), vec!["a", "b"]);
        assert!(split_unique("", 100).is_empty());
    }

    #[tokio::test]
    async fn test_extracts_accept_and_query() {
        let request = Request::builder()
            .uri("/api/questions?include=user,voting&order=-create_time")
            .header(ACCEPT, "image/webp,application/json")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(ctx.is_support_webp());
        assert!(ctx.is_json());
        assert_eq!(ctx.includes(), vec!["user", "voting"]);
        assert_eq!(ctx.query("order"), Some("-create_time"));
        assert!(ctx.time() > 0);
    }
}
