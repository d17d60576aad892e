use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};

use crate::auth::Viewer;
use crate::library::request::DEFAULT_SPLIT_MAX;
use crate::library::RequestContext;
use crate::models::image::UpdateImageRequest;
use crate::routes::{author, item, query_int, single, Paging};
use crate::transformers::image::key_from_api;
use crate::{AppError, AppState, Result};

// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/images",
            get(list_images)
                .post(upload_image)
                .delete(delete_images)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD)),
        )
        .route(
            "/images/:key",
            get(get_image).patch(update_image).delete(delete_image),
        )
}

/// POST /api/images, multipart with an `image` file field.
async fn upload_image(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let claims = author(&state, &viewer).await?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or("image").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::ValidationError(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| AppError::field("image", "Please select an image to upload"))?;
    let image = state.image_service.upload(claims.user_id, &filename, data).await?;

    let items = state.transformers.images(vec![image], &ctx.includes()).await?;
    Ok(item(single(items)?))
}

/// GET /api/images?user_id=
async fn list_images(State(state): State<AppState>, ctx: RequestContext) -> Result<Json<Value>> {
    let paging = Paging::from_request(&ctx)?;
    let user_id = query_int(&ctx, "user_id")?;

    let page = state
        .image_service
        .list(user_id, paging.per_page, paging.offset())
        .await?;
    let items = state.transformers.images(page.items, &ctx.includes()).await?;
    Ok(paging.envelope(items, page.total))
}

async fn get_image(State(state): State<AppState>, ctx: RequestContext, Path(key): Path<String>) -> Result<Json<Value>> {
    let image = state.image_service.get(&key_from_api(&key)).await?;
    let items = state.transformers.images(vec![image], &ctx.includes()).await?;
    Ok(item(single(items)?))
}

async fn update_image(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
    Path(key): Path<String>,
    Json(request): Json<UpdateImageRequest>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let image = state
        .image_service
        .update(claims, &key_from_api(&key), request.filename)
        .await?;
    let items = state.transformers.images(vec![image], &ctx.includes()).await?;
    Ok(item(single(items)?))
}

async fn delete_image(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(key): Path<String>,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    state.image_service.delete(claims, &key_from_api(&key)).await?;
    Ok(Json(json!({ "message": "Image deleted successfully" })))
}

/// DELETE /api/images?keys=a_png,b_jpg
async fn delete_images(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ctx: RequestContext,
) -> Result<Json<Value>> {
    let claims = viewer.require()?;
    let keys: Vec<String> = ctx
        .query_params_split("keys", DEFAULT_SPLIT_MAX)
        .iter()
        .map(|key| key_from_api(key))
        .collect();
    if keys.is_empty() {
        return Err(AppError::ValidationError("keys must not be empty".to_string()));
    }

    state.image_service.delete_multiple(claims, &keys).await?;
    Ok(Json(json!({ "message": "Images deleted successfully" })))
}
