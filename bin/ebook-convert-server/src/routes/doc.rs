use utoipa::OpenApi;

use crate::routes::{convert, health};

#[derive(OpenApi)]
#[openapi(info(
    title = "ebook-convert-server",
    description = "FB2 to EPUB/MOBI conversion API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(convert::ConvertApi::openapi());
    root
}
