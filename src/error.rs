use serde_cbor::Error as SerdeCborError;
use serde_json::error::Error as SerdeJsonError;
use std::fmt::Display;
use std::io::Error as IoError;
use std::path::PathBuf;
use wikitext_parser::TemplateError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    IoError {
        action: &'static str,
        path: PathBuf,
        cause: IoError,
    },
    PageMissing {
        path: PathBuf,
    },
    FetchFailed {
        path: PathBuf,
        reason: String,
    },
    SerdeJsonError(SerdeJsonError),
    SerdeCborError(SerdeCborError),
    TemplateError(TemplateError),
    NoMatchingTemplates {
        name: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError { action, path, cause } => {
                write!(f, "failed to {} {}: {}", action, path.display(), cause)
            }
            Error::PageMissing { path } => {
                write!(f, "page file {} does not exist", path.display())
            }
            Error::FetchFailed { path, reason } => {
                write!(f, "failed to read page file {}: {}", path.display(), reason)
            }
            Error::SerdeJsonError(e) => {
                write!(f, "error writing or reading JSON: {}", e)
            }
            Error::SerdeCborError(e) => write!(f, "error writing CBOR: {}", e),
            Error::TemplateError(e) => write!(f, "invalid template: {}", e),
            Error::NoMatchingTemplates { name } => {
                write!(f, "no transclusions of {} found", name)
            }
        }
    }
}

macro_rules! impl_from {
    ($into_enum:ident <- [$($type_and_variant:ident),+ $(,)?]) => {
        $(
            impl From<$type_and_variant> for $into_enum {
                fn from(e: $type_and_variant) -> $into_enum {
                    $into_enum::$type_and_variant(e)
                }
            }
        )+
    };
}

impl_from! {
    Error <- [SerdeCborError, SerdeJsonError, TemplateError]
}
