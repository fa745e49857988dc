//! Photo upload and status API handlers
//!
//! POST /api/photos/upload, GET /api/photos/:id
//!
//! Upload validates and stages the file, creates the job record, and
//! spawns the enhancement workflow without awaiting it; the client learns
//! the outcome by polling the status endpoint. Once a job completes, the
//! status response inlines both images as data URIs so the frontend needs
//! no separate file route.

use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{NewPhoto, Photo, PhotoStatus},
    AppState,
};

/// Multipart field the image must arrive under
const UPLOAD_FIELD: &str = "photo";

/// POST /api/photos/upload response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub photo_id: i64,
    pub message: String,
}

/// Completed-photo response with both images inlined
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PhotoWithImages {
    #[serde(flatten)]
    photo: Photo,
    original_image: String,
    enhanced_image: String,
}

/// POST /api/photos/upload
///
/// Accept a multipart image, create the job record, and kick off
/// enhancement in the background. Returns the id to poll.
pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(|ct| ct.to_string());
        match field.bytes().await {
            Ok(bytes) => upload = Some((content_type, bytes.to_vec())),
            Err(e) => {
                warn!(error = %e, "failed to read upload body");
                return Err(ApiError::BadRequest("No file uploaded".to_string()));
            }
        }
        break;
    }

    let (content_type, bytes) = upload.ok_or_else(|| {
        ApiError::BadRequest("No file uploaded".to_string())
    })?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    }

    let max_bytes = state.config.max_upload_bytes();
    if bytes.len() > max_bytes {
        return Err(ApiError::BadRequest(format!(
            "File too large. Maximum size is {}MB",
            max_bytes / (1024 * 1024)
        )));
    }

    // Both the declared type and the magic bytes must look like an image
    let declared_image = content_type
        .as_deref()
        .map(|ct| ct.starts_with("image/"))
        .unwrap_or(false);
    let extension = match sniff_image_format(&bytes) {
        Some(ext) if declared_image => ext,
        _ => {
            return Err(ApiError::BadRequest(
                "Only image files are allowed".to_string(),
            ));
        }
    };
    let source_path = state
        .config
        .uploads_dir
        .join(format!("{}.{}", Uuid::new_v4(), extension));
    tokio::fs::write(&source_path, &bytes).await?;

    let photo = state.store.create_photo(NewPhoto {
        original_url: source_path.to_string_lossy().into_owned(),
        enhanced_url: None,
        status: Some(PhotoStatus::Processing),
    });

    info!(
        photo_id = photo.id,
        bytes = bytes.len(),
        source = %source_path.display(),
        "photo uploaded, starting enhancement"
    );

    let pipeline = state.pipeline.clone();
    let photo_id = photo.id;
    tokio::spawn(async move {
        pipeline.process(photo_id, source_path).await;
    });

    Ok(Json(UploadResponse {
        photo_id: photo.id,
        message: "Photo uploaded successfully, processing started".to_string(),
    }))
}

/// GET /api/photos/:id
///
/// Current job record. Completed jobs carry both images as data URIs;
/// if the files cannot be read back the bare record is returned instead.
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let photo = state
        .store
        .photo(id)
        .ok_or_else(|| ApiError::NotFound("Photo not found".to_string()))?;

    if photo.status == PhotoStatus::Completed {
        if let Some(enhanced_url) = photo.enhanced_url.clone() {
            match inline_images(&photo.original_url, &enhanced_url).await {
                Ok((original_image, enhanced_image)) => {
                    return Ok(Json(PhotoWithImages {
                        photo,
                        original_image,
                        enhanced_image,
                    })
                    .into_response());
                }
                Err(e) => {
                    warn!(photo_id = id, error = %e, "could not inline images, returning bare record");
                }
            }
        }
    }

    Ok(Json(photo).into_response())
}

async fn inline_images(
    original_url: &str,
    enhanced_url: &str,
) -> std::io::Result<(String, String)> {
    let original = tokio::fs::read(original_url).await?;
    let enhanced = tokio::fs::read(enhanced_url).await?;
    Ok((image_data_uri(&original), image_data_uri(&enhanced)))
}

fn image_data_uri(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(bytes))
}

/// Detect an image format from file magic bytes (not extension or the
/// declared content type), returning the extension to stage the file
/// under. Covers exactly the formats the decoder accepts.
fn sniff_image_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }
    // WebP: RIFF....WEBP
    if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return Some("webp");
    }
    // GIF: GIF87a / GIF89a
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("gif");
    }
    // BMP: BM
    if bytes.starts_with(b"BM") {
        return Some("bmp");
    }
    // TIFF: II 2A 00 (little-endian) / MM 00 2A (big-endian)
    if bytes.starts_with(b"II\x2A\x00") || bytes.starts_with(b"MM\x00\x2A") {
        return Some("tif");
    }
    None
}

/// Build photo routes
pub fn photo_routes() -> Router<AppState> {
    Router::new()
        .route("/api/photos/upload", post(upload_photo))
        .route("/api/photos/:id", get(get_photo))
}
