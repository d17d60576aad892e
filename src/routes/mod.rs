pub mod answers;
pub mod api;
pub mod articles;
pub mod comments;
pub mod images;
pub mod inbox;
pub mod notifications;
pub mod questions;
pub mod rss;
pub mod topics;
pub mod trash;
pub mod votes;

use axum::{middleware, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::services::ServeDir;

use crate::auth::middleware::auth_middleware;
use crate::auth::{Claims, Viewer};
use crate::db::repository::{ListQuery, OrderBy};
use crate::library::RequestContext;
use crate::models::ColumnValue;
use crate::services::Created;
use crate::{AppError, AppState, Result};

pub fn create_routes(state: &AppState) -> Router<AppState> {
    let storage = ServeDir::new(&state.config.storage.path);

    Router::new()
        .nest("/api", api::routes(state))
        .nest("/rss", rss::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .nest_service(&state.config.storage.url, storage)
}

// Pagination constants
const DEFAULT_PER_PAGE: u32 = 20;
const MIN_PER_PAGE: u32 = 1;
const MAX_PER_PAGE: u32 = 100;

/// `page` / `per_page` query parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paging {
    pub page: u32,
    pub per_page: u32,
}

impl Paging {
    pub fn from_request(ctx: &RequestContext) -> Result<Self> {
        let page = match ctx.query("page") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(|| AppError::ValidationError("Invalid page. Must be a positive integer".to_string()))?,
            None => 1,
        };
        let per_page = match ctx.query("per_page") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| (MIN_PER_PAGE..=MAX_PER_PAGE).contains(n))
                .ok_or_else(|| {
                    AppError::ValidationError(format!(
                        "Invalid per_page. Must be between {} and {}",
                        MIN_PER_PAGE, MAX_PER_PAGE
                    ))
                })?,
            None => DEFAULT_PER_PAGE,
        };
        Ok(Self { page, per_page })
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// A list query for this page, ordered by the `order` parameter.
    pub fn query(&self, ctx: &RequestContext, allowed: &[&'static str]) -> Result<ListQuery> {
        Ok(ListQuery::new(order(ctx, allowed)?).page(self.per_page, self.offset()))
    }

    pub fn envelope<T: Serialize>(&self, items: Vec<T>, total: i64) -> Json<Value> {
        let per_page = i64::from(self.per_page);
        Json(json!({
            "data": items,
            "pagination": {
                "page": self.page,
                "per_page": self.per_page,
                "total": total,
                "pages": (total + per_page - 1) / per_page,
            }
        }))
    }
}

/// Parses `order`, defaulting to newest first.
pub fn order(ctx: &RequestContext, allowed: &[&'static str]) -> Result<OrderBy> {
    match ctx.query("order") {
        None => Ok(OrderBy::desc("create_time")),
        Some(value) => OrderBy::parse(value, allowed)
            .ok_or_else(|| AppError::ValidationError(format!("Invalid order. Must be one of: {}", allowed.join(", ")))),
    }
}

/// Adds an `Int` filter for each integer query parameter present.
pub fn int_filters(ctx: &RequestContext, mut query: ListQuery, names: &[&'static str]) -> Result<ListQuery> {
    for &name in names {
        if let Some(value) = query_int(ctx, name)? {
            query = query.filter(name, ColumnValue::Int(value));
        }
    }
    Ok(query)
}

pub fn query_int(ctx: &RequestContext, name: &str) -> Result<Option<i64>> {
    ctx.query(name)
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|_| AppError::ValidationError(format!("Invalid {}. Must be an integer", name)))
        })
        .transpose()
}

/// Comma separated ids from the `ids` query parameter.
pub fn query_ids(ctx: &RequestContext) -> Result<Vec<i64>> {
    let ids = ctx
        .query_params_split("ids", crate::library::request::DEFAULT_SPLIT_MAX)
        .iter()
        .map(|id| id.parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| AppError::ValidationError("Invalid ids. Must be comma separated integers".to_string()))?;
    if ids.is_empty() {
        return Err(AppError::ValidationError("ids must not be empty".to_string()));
    }
    Ok(ids)
}

pub fn item<T: Serialize>(item: T) -> Json<Value> {
    Json(json!({ "data": item }))
}

pub fn created<T, U: Serialize>(created: Created<T>, item: U) -> Json<Value> {
    Json(json!({
        "data": item,
        "need_captcha": created.need_captcha,
    }))
}

/// The signed-in user, recorded locally on first use.
pub async fn author(state: &AppState, viewer: &Viewer) -> Result<Claims> {
    let claims = viewer.require()?.clone();
    state.user_service.ensure_user(&claims).await?;
    Ok(claims)
}

/// Takes the single transformed element back out of a one-item batch.
pub fn single<T>(mut items: Vec<T>) -> Result<T> {
    items
        .pop()
        .ok_or_else(|| AppError::InternalError("Transformer dropped an item".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx(pairs: &[(&str, &str)]) -> RequestContext {
        let query: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        RequestContext::new(0, "", query)
    }

    #[test]
    fn test_paging_defaults_and_bounds() {
        let paging = Paging::from_request(&ctx(&[])).unwrap();
        assert_eq!(paging, Paging { page: 1, per_page: DEFAULT_PER_PAGE });

        let paging = Paging::from_request(&ctx(&[("page", "3"), ("per_page", "10")])).unwrap();
        assert_eq!(paging.offset(), 20);

        assert!(Paging::from_request(&ctx(&[("page", "0")])).is_err());
        assert!(Paging::from_request(&ctx(&[("per_page", "101")])).is_err());
    }

    #[test]
    fn test_order_parameter() {
        let allowed = &["create_time", "update_time"];
        assert_eq!(order(&ctx(&[]), allowed).unwrap(), OrderBy::desc("create_time"));
        assert_eq!(order(&ctx(&[("order", "update_time")]), allowed).unwrap(), OrderBy::asc("update_time"));
        assert!(order(&ctx(&[("order", "-password")]), allowed).is_err());
    }

    #[test]
    fn test_envelope_page_count() {
        let paging = Paging { page: 1, per_page: 20 };
        let Json(value) = paging.envelope(vec![1, 2], 41);
        assert_eq!(value["pagination"]["pages"], 3);
        assert_eq!(value["data"], json!([1, 2]));
    }

    #[test]
    fn test_query_ids() {
        assert_eq!(query_ids(&ctx(&[("ids", "3,1,3")])).unwrap(), vec![3, 1]);
        assert!(query_ids(&ctx(&[("ids", "a")])).is_err());
        assert!(query_ids(&ctx(&[])).is_err());
    }
}
