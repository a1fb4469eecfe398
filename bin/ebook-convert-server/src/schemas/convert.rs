use ebook_convert_core::BookFormat;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart form accepted by `POST /`; documentation only, the handler
/// reads the parts as a stream.
#[allow(dead_code)]
#[derive(Debug, ToSchema)]
pub struct ConvertUpload {
    /// FB2 document to convert.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Target format, case-insensitive.
    pub format: BookFormat,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
