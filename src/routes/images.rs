//! Image ingest and query endpoints: upload, list, patch, delete, fetch,
//! thumb, text search, and image similarity.

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain;
use crate::encoder;
use crate::models::{Image, ServiceType};
use crate::services::error::LogErr;
use crate::{queue, storage, AppState};
use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/bmp",
    "image/tiff",
    "image/heic",
];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/images/", post(upload_image))
        .route("/images/list", get(list_images))
        .route("/images/search", get(search_images))
        .route("/images/{id}", patch(update_image).delete(delete_image))
        .route("/images/{id}/", get(get_image_file))
        .route("/images/{id}/thumb", get(get_image_thumb))
        .route("/images/{id}/similar", get(similar_images))
}

#[derive(Serialize)]
struct ImageResponse {
    image_id: Uuid,
    name: String,
    path: String,
    thumb: Option<String>,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embeddings: Option<Vec<f32>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Image> for ImageResponse {
    fn from(image: Image) -> Self {
        ImageResponse {
            image_id: image.id,
            name: image.name,
            path: image.path,
            thumb: image.thumb,
            tags: image.tags,
            embeddings: image.embeddings.map(|v| v.to_vec()),
            created_at: image.created_at,
            updated_at: image.updated_at,
        }
    }
}

fn validated_extension(filename: &str) -> Option<String> {
    let ext = std::path::Path::new(filename)
        .extension()?
        .to_str()?
        .to_lowercase();
    if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(ext)
    } else {
        None
    }
}

#[derive(Serialize)]
struct UploadResponse {
    image_id: Uuid,
    path: String,
}

/// POST /images/ — multipart upload. Enqueues a THUMB job in the same
/// transaction that inserts the image row.
async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        .ok_or((StatusCode::BAD_REQUEST, "missing file field".into()))?;

    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_default();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Invalid file type '{}'. Only image files are accepted.", content_type),
        ));
    }

    let original_name = field
        .file_name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "upload".to_string());
    let ext = validated_extension(&original_name)
        .ok_or((StatusCode::BAD_REQUEST, "Invalid or missing file extension".into()))?;

    let body = field
        .bytes()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let image_id = Uuid::now_v7();
    let file_path = storage::original_path(&state.config.upload_dir, &image_id.simple().to_string(), &ext);

    storage::write(&file_path, &body)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let path_str = file_path.to_string_lossy().into_owned();

    let result = async {
        let mut tx = state.db.begin().await?;
        domain::images::insert_image(&mut *tx, image_id, &original_name, &path_str).await?;
        queue::enqueue(&mut *tx, image_id, ServiceType::Thumb).await?;
        tx.commit().await?;
        Ok::<(), sqlx::Error>(())
    }
    .await;

    if let Err(e) = result {
        // File write succeeded but the DB side failed: clean up the
        // orphaned artifact before returning the error.
        let _ = storage::remove(&file_path).await;
        eprintln!("[upload] DB insert failed, removed orphaned file {:?}: {}", file_path, e);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Error uploading image".into()));
    }

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            image_id,
            path: path_str,
        }),
    ))
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<i64>,
    page_size: Option<i64>,
}

fn validate_page(page: Option<i64>, page_size: Option<i64>) -> Result<(i64, i64), StatusCode> {
    let page = page.unwrap_or(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok((page, page_size))
}

#[derive(Serialize)]
struct ListResponse {
    page: i64,
    page_size: i64,
    count: i64,
    items: Vec<ImageResponse>,
}

/// GET /images/list?page&page_size
async fn list_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse>, StatusCode> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;

    let (items, count) = domain::images::list_images(&state.db, page, page_size)
        .await
        .log_500("List images error")?;

    Ok(Json(ListResponse {
        page,
        page_size,
        count,
        items: items.into_iter().map(ImageResponse::from).collect(),
    }))
}

#[derive(Deserialize)]
struct UpdateImageBody {
    name: Option<String>,
    tags: Option<Vec<String>>,
}

/// PATCH /images/{id}
async fn update_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateImageBody>,
) -> Result<Json<ImageResponse>, StatusCode> {
    let image = domain::images::update_image(
        &state.db,
        id,
        body.name.as_deref(),
        body.tags.as_deref(),
    )
    .await
    .log_500("Update image error")?
    .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(image.into()))
}

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
}

/// DELETE /images/{id} — removes on-disk artifacts (missing files
/// tolerated) and the row (cascades jobs).
async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, StatusCode> {
    let image = domain::images::delete_image(&state.db, id)
        .await
        .log_500("Delete image error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    let _ = storage::remove(std::path::Path::new(&image.path)).await;
    if let Some(thumb) = &image.thumb {
        let _ = storage::remove(std::path::Path::new(thumb)).await;
    }

    Ok(Json(DeleteResponse {
        message: format!("Image {} deleted", id),
    }))
}

fn guess_content_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
        Some(ref e) if e == "png" => "image/png",
        Some(ref e) if e == "jpg" || e == "jpeg" => "image/jpeg",
        Some(ref e) if e == "webp" => "image/webp",
        Some(ref e) if e == "bmp" => "image/bmp",
        Some(ref e) if e == "tiff" || e == "tif" => "image/tiff",
        Some(ref e) if e == "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

async fn serve_file(path: &std::path::Path) -> Result<impl IntoResponse, StatusCode> {
    let bytes = storage::read(path).await.map_err(|_| StatusCode::NOT_FOUND)?;
    let content_type = guess_content_type(path);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

/// GET /images/{id}/ — streams the original file.
async fn get_image_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let image = domain::images::get_image(&state.db, id)
        .await
        .log_500("Get image error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    serve_file(std::path::Path::new(&image.path)).await
}

/// GET /images/{id}/thumb — streams the thumbnail, falling back to the
/// original if no thumbnail has been generated yet.
async fn get_image_thumb(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let image = domain::images::get_image(&state.db, id)
        .await
        .log_500("Get image thumb error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    let path = image.thumb.unwrap_or(image.path);
    serve_file(std::path::Path::new(&path)).await
}

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
    page: Option<i64>,
    page_size: Option<i64>,
}

#[derive(Serialize)]
struct SearchHitResponse {
    #[serde(flatten)]
    image: ImageResponse,
    similarity: f64,
}

#[derive(Serialize)]
struct SearchResponse {
    page: i64,
    page_size: i64,
    items: Vec<SearchHitResponse>,
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// GET /images/search?query&page&page_size — text search via the vector
/// encoder's `encode_text`, filtered by `TEXT_SIMILARITY_THRESHOLD`.
async fn search_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, StatusCode> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;

    let clip_model = state.config.clip_model.clone();
    let cpu_only = state.config.cpu_only;
    let text = query.query.clone();
    let embedding = tokio::task::spawn_blocking(move || encoder::encode_text(&text, &clip_model, cpu_only))
        .await
        .log_500("Text encode task panicked")?
        .log_500("Text encode error")?;

    let vector = Vector::from(embedding);

    let hits = domain::images::search_by_vector(
        &state.db,
        &vector,
        state.config.text_similarity_threshold,
        page,
        page_size,
    )
    .await
    .log_500("Text search error")?;

    Ok(Json(SearchResponse {
        page,
        page_size,
        items: hits
            .into_iter()
            .map(|hit| SearchHitResponse {
                similarity: round4(1.0 - hit.distance),
                image: hit.image.into(),
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct SimilarQuery {
    page: Option<i64>,
    page_size: Option<i64>,
}

/// GET /images/{id}/similar?page&page_size — images ordered by ascending
/// cosine distance to the target's own embedding.
async fn similar_images(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<SearchResponse>, StatusCode> {
    let (page, page_size) = validate_page(query.page, query.page_size)?;

    let image = domain::images::get_image(&state.db, id)
        .await
        .log_500("Get image for similarity error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    let vector = image.embeddings.ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;

    let hits = domain::images::search_by_vector(
        &state.db,
        &vector,
        state.config.similarity_threshold,
        page,
        page_size,
    )
    .await
    .log_500("Similarity search error")?;

    Ok(Json(SearchResponse {
        page,
        page_size,
        items: hits
            .into_iter()
            .map(|hit| SearchHitResponse {
                similarity: round4(1.0 - hit.distance),
                image: hit.image.into(),
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_must_be_purely_alphabetic() {
        assert_eq!(validated_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(validated_extension("photo.tar.gz"), Some("gz".to_string()));
        assert_eq!(validated_extension("photo.jp3g"), None);
        assert_eq!(validated_extension("noext"), None);
    }

    #[test]
    fn page_bounds_are_enforced() {
        assert!(validate_page(Some(0), Some(10)).is_err());
        assert!(validate_page(Some(1), Some(0)).is_err());
        assert!(validate_page(Some(1), Some(101)).is_err());
        assert_eq!(validate_page(Some(2), Some(50)).unwrap(), (2, 50));
        assert_eq!(validate_page(None, None).unwrap(), (1, 20));
    }

    #[test]
    fn similarity_rounds_to_four_places() {
        assert_eq!(round4(1.0 - 0.300_049), 0.6999);
    }
}
