use crate::{
    config::{ProcessRequest, RequestFields},
    error::{ResizerError, Result},
    processor::ImageProcessor,
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Route of the processing endpoint
pub const PROCESS_IMAGE_PATH: &str = "/process_image";

/// Name of the multipart part carrying the upload
const IMAGE_FIELD: &str = "image";

/// Shared, read-only state handed to every request
#[derive(Debug, Clone)]
pub struct AppState {
    pub processor: Arc<ImageProcessor>,
    pub max_upload_bytes: usize,
}

impl AppState {
    #[must_use]
    pub fn new(processor: Arc<ImageProcessor>, max_upload_bytes: usize) -> Self {
        Self {
            processor,
            max_upload_bytes,
        }
    }
}

/// Build the service router
///
/// Layers, outermost first: CORS (any origin, method and header), request
/// tracing, body limit.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(PROCESS_IMAGE_PATH, post(process_image))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Raw multipart form contents
#[derive(Debug, Default)]
struct UploadForm {
    image: Option<Vec<u8>>,
    fields: RequestFields,
}

async fn process_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    // Not multipart form data, so no file parts
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "Request is not multipart form data");
        ResizerError::MissingImage
    })?;
    let form = read_form(&mut multipart, state.max_upload_bytes).await?;

    let image = form.image.ok_or(ResizerError::MissingImage)?;
    let request = ProcessRequest::from_fields(&form.fields)?;

    let processor = Arc::clone(&state.processor);
    let processed = tokio::task::spawn_blocking(move || processor.process_bytes(&image, &request))
        .await
        .map_err(|e| ResizerError::internal(format!("Processing task failed: {e}")))??;

    Ok((
        [(header::CONTENT_TYPE, processed.mime_type())],
        processed.bytes,
    )
        .into_response())
}

async fn read_form(multipart: &mut Multipart, limit_bytes: usize) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, limit_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGE_FIELD {
            let file_name = field.file_name().map(str::to_owned);
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error(&e, limit_bytes))?;
            if form.image.is_none() {
                tracing::debug!(bytes = data.len(), file_name = ?file_name, "Received image part");
                form.image = Some(data.to_vec());
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| multipart_error(&e, limit_bytes))?;
        if !form.fields.set(&name, value) {
            tracing::debug!(field = %name, "Ignoring unknown form field");
        }
    }

    Ok(form)
}

fn multipart_error(error: &MultipartError, limit_bytes: usize) -> ResizerError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ResizerError::PayloadTooLarge { limit_bytes }
    } else {
        ResizerError::Multipart(error.body_text())
    }
}
