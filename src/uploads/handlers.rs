use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload-csv", post(upload_csv))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub file_path: String,
}

/// Accepts a single CSV file in a multipart `file` field and stores it under
/// a generated UUID-based name. The response carries the location string.
#[instrument(skip(state, multipart))]
pub async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.content_type() != Some("text/csv") {
            return Err(ApiError::Validation("Only CSV files are allowed".into()));
        }
        let original_name = field.file_name().unwrap_or("upload.csv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        file = Some((original_name, data));
    }

    let (original_name, data) = file.ok_or_else(|| ApiError::Validation("No file uploaded".into()))?;

    let key = object_key(&original_name);
    let location = state
        .storage
        .put_object(&key, data, "text/csv")
        .await
        .map_err(|e| ApiError::Dependency(e.to_string()))?;

    info!(%key, %location, "csv uploaded");
    Ok(Json(UploadResponse {
        message: "Uploaded successfully".into(),
        file_path: location,
    }))
}

/// UUID-based name preserving the original extension.
fn object_key(original_name: &str) -> String {
    let ext = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv");
    format!("{}.{}", Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use axum::{extract::FromRequest, http::StatusCode};

    use super::*;

    const BOUNDARY: &str = "----test-boundary";

    async fn multipart_from(body: String) -> Multipart {
        let req = axum::http::Request::builder()
            .header(
                axum::http::header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(axum::body::Body::from(body))
            .unwrap();
        Multipart::from_request(req, &()).await.expect("multipart")
    }

    fn file_part(content_type: &str, data: &str) -> String {
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"report.csv\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             {data}\r\n\
             --{BOUNDARY}--\r\n"
        )
    }

    #[tokio::test]
    async fn upload_rejects_non_csv_content_type() {
        let multipart = multipart_from(file_part("application/json", "{}")).await;
        let err = upload_csv(State(AppState::fake()), multipart)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Only CSV files are allowed");
    }

    #[tokio::test]
    async fn upload_rejects_missing_file_field() {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"notes\"\r\n\r\n\
             hello\r\n\
             --{BOUNDARY}--\r\n"
        );
        let multipart = multipart_from(body).await;
        let err = upload_csv(State(AppState::fake()), multipart)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No file uploaded");
    }

    #[tokio::test]
    async fn upload_stores_csv_and_returns_location() {
        let multipart = multipart_from(file_part("text/csv", "a,b\n1,2\n")).await;
        let Json(response) = upload_csv(State(AppState::fake()), multipart)
            .await
            .expect("upload");
        assert_eq!(response.message, "Uploaded successfully");
        assert!(response.file_path.starts_with("https://fake.local/"));
        assert!(response.file_path.ends_with(".csv"));
    }

    #[test]
    fn object_key_keeps_extension() {
        let key = object_key("report.csv");
        assert!(key.ends_with(".csv"));
        assert!(!key.starts_with("report"));
    }

    #[test]
    fn object_key_defaults_to_csv() {
        assert!(object_key("noextension").ends_with(".csv"));
    }

    #[test]
    fn object_keys_are_unique() {
        assert_ne!(object_key("a.csv"), object_key("a.csv"));
    }
}
