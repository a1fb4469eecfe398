//! Output formats accepted by the converter.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use utoipa::ToSchema;

use crate::error::CoreError;

/// Target e-book format.
///
/// Parsing is ASCII case-insensitive; rendering is always lowercase, which is
/// also the file extension the converter writes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    VariantNames,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Epub,
    Mobi,
}

impl BookFormat {
    /// Parse a caller-supplied format value against the allow-list.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        raw.parse()
            .map_err(|_| CoreError::UnsupportedFormat(raw.to_owned()))
    }

    /// File extension of the converted file.
    pub fn extension(self) -> &'static str {
        match self {
            BookFormat::Epub => "epub",
            BookFormat::Mobi => "mobi",
        }
    }

    /// MIME type sent with the converted file.
    pub fn mime_type(self) -> &'static str {
        match self {
            BookFormat::Epub => "application/epub+zip",
            BookFormat::Mobi => "application/x-mobipocket-ebook",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(BookFormat::parse("epub").unwrap(), BookFormat::Epub);
        assert_eq!(BookFormat::parse("EPUB").unwrap(), BookFormat::Epub);
        assert_eq!(BookFormat::parse("MoBi").unwrap(), BookFormat::Mobi);
    }

    #[test]
    fn rejects_formats_outside_allow_list() {
        for raw in ["pdf", "", "fb2", " epub", "epub.exe"] {
            let err = BookFormat::parse(raw).unwrap_err();
            assert!(
                matches!(&err, CoreError::UnsupportedFormat(v) if v == raw),
                "{raw:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn error_message_lists_every_variant() {
        let msg = BookFormat::parse("pdf").unwrap_err().to_string();
        for name in BookFormat::VARIANTS {
            assert!(msg.contains(name), "{msg} should mention {name}");
        }
    }

    #[test]
    fn display_matches_extension() {
        for format in [BookFormat::Epub, BookFormat::Mobi] {
            assert_eq!(format.to_string(), format.extension());
            assert_eq!(format.as_ref(), format.extension());
        }
    }
}
