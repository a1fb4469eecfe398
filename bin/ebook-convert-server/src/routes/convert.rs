//! Conversion endpoints.
//!
//! One request runs strictly in order: validate the format, spool the upload
//! into the workspace, run the converter, drop the input, then either stream
//! the result or report the failure. Every workspace file is owned by a
//! [`ScratchFile`] guard, so early returns, cancelled requests and aborted
//! downloads all leave the directory clean.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use ebook_convert_core::{BookFormat, ScratchFile, WorkspaceEntry};
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::convert::{ConvertUpload, ErrorBody};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(convert_upload, convert_raw),
    components(schemas(ConvertUpload, ErrorBody, BookFormat)),
)]
pub struct ConvertApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(convert_upload))
        .route("/{format}", post(convert_raw))
}

/// Read size when streaming the converted file back.
const STREAM_CHUNK_SIZE: usize = 16 * 1024;

/// Download name used when the upload carried no file name.
const DEFAULT_STEM: &str = "converted";

/// An uploaded document sitting in the workspace.
struct Upload {
    entry: WorkspaceEntry,
    input: ScratchFile,
    file_name: Option<String>,
}

/// Convert an FB2 upload (`POST /`).
///
/// Expects `multipart/form-data` with a `file` part and a `format` part
/// (`epub` or `mobi`, any case). Sending `format` first lets an unsupported
/// value be rejected before anything touches the disk.
#[utoipa::path(
    post,
    path = "/",
    tag = "convert",
    request_body(content = ConvertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Converted book bytes; Content-Type follows the format"),
        (status = 400, description = "Missing field, unsupported format or conversion failure", body = ErrorBody),
        (status = 413, description = "Upload too large", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody),
    )
)]
pub async fn convert_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let mut format: Option<BookFormat> = None;
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("format") => {
                let raw = field.text().await?;
                format = Some(BookFormat::parse(&raw)?);
            }
            Some("file") if upload.is_none() => {
                let file_name = field.file_name().map(str::to_owned);
                upload = Some(receive_upload(&state, field, file_name).await?);
            }
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }

    let (Some(format), Some(upload)) = (format, upload) else {
        return Err(ServerError::BadRequest("file and format required".into()));
    };

    run_conversion(&state, upload, format).await
}

/// Convert a raw request body (`POST /{format}`).
#[utoipa::path(
    post,
    path = "/{format}",
    tag = "convert",
    params(("format" = BookFormat, Path, description = "Target format, case-insensitive")),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Converted book bytes; Content-Type follows the format"),
        (status = 400, description = "Unsupported format or conversion failure", body = ErrorBody),
        (status = 413, description = "Upload too large", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody),
    )
)]
pub async fn convert_raw(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
    body: Body,
) -> Result<Response, ServerError> {
    let format = BookFormat::parse(&format)?;
    let upload = receive_upload(&state, body.into_data_stream(), None).await?;
    run_conversion(&state, upload, format).await
}

/// Stream `chunks` into a fresh workspace entry's input file.
async fn receive_upload<S, E>(
    state: &AppState,
    chunks: S,
    file_name: Option<String>,
) -> Result<Upload, ServerError>
where
    S: Stream<Item = Result<Bytes, E>>,
    ServerError: From<E>,
{
    let entry = state.workspace.create();
    let input = entry.input_file();
    let limit = state.config.max_upload_bytes;

    let mut file = File::create(input.path()).await?;
    let mut chunks = std::pin::pin!(chunks);
    let mut received: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        received += chunk.len() as u64;
        if received > limit {
            return Err(ServerError::PayloadTooLarge(format!(
                "upload exceeds the limit of {limit} bytes"
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!(id = %entry.id(), size_bytes = received, "upload stored");
    Ok(Upload {
        entry,
        input,
        file_name,
    })
}

async fn run_conversion(
    state: &AppState,
    upload: Upload,
    format: BookFormat,
) -> Result<Response, ServerError> {
    let Upload {
        entry,
        input,
        file_name,
    } = upload;
    // Guard the output before the converter runs so a cancelled request
    // also takes a partial result with it.
    let output = entry.output_file(format);

    let result = state.converter.convert(input.path(), format).await;
    input.remove().await;
    let outcome = result?;

    if !outcome.succeeded() {
        warn!(
            id = %entry.id(),
            %format,
            exit_code = ?outcome.exit_code,
            stderr = %outcome.stderr_lossy(),
            "conversion failed"
        );
        // Also takes any partial output; the guard then finds nothing left.
        entry.release(format, false).await;
        return Err(ServerError::ConversionFailed);
    }

    let file = File::open(output.path()).await?;
    let content_length = file.metadata().await?.len();
    info!(id = %entry.id(), %format, size_bytes = content_length, "conversion succeeded");

    let disposition = HeaderValue::from_str(&content_disposition(file_name.as_deref(), format))
        .map_err(|e| ServerError::Internal(format!("invalid content-disposition: {e}")))?;
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type())),
        (header::CONTENT_LENGTH, HeaderValue::from(content_length)),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok((headers, Body::from_stream(output_stream(file, output))).into_response())
}

/// Chunks of the converted file. The file is deleted once the reader hits
/// EOF, or by the guard's `Drop` if the body is dropped first (client went
/// away).
fn output_stream(
    file: File,
    output: ScratchFile,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let cleanup = futures::stream::once(async move {
        output.remove().await;
        None::<std::io::Result<Bytes>>
    })
    .filter_map(futures::future::ready);

    ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE).chain(cleanup)
}

fn content_disposition(file_name: Option<&str>, format: BookFormat) -> String {
    let stem = file_name
        .and_then(|name| FsPath::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .map(sanitize_filename)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| DEFAULT_STEM.to_owned());
    format!("attachment; filename=\"{stem}.{}\"", format.extension())
}

/// Keep only characters that are safe inside a quoted header parameter.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
