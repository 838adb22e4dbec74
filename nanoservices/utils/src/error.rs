use thiserror::Error;
use arrow::error::ArrowError;
use reqwest::Error as ReqwestError;
use std::io::Error as IoError;
use url::ParseError;

#[derive(Debug, Error)]
pub enum Error {
    /// The source locator did not resolve (missing file, 404, unreachable host).
    #[error("Source not found: {0}")]
    NotFound(String),

    /// The source resolved but could not be decoded into a record collection.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Decodable input that lacks every occurrence of a required field.
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Destination unreachable: {0}")]
    ConnectionError(String),

    #[error("Destination rejected write: {0}")]
    WriteError(String),

    #[error("Arrow Error: {0}")]
    ArrowError(#[from] ArrowError),

    #[error("Io Error: {0}")]
    IoError(#[from] IoError),

    #[error("Reqwest Error: {0}")]
    HttpError(#[from] ReqwestError),

    #[error("Url Error: {0}")]
    UrlParseError(#[from] ParseError),
}

impl Error {
    /// Short machine-friendly label used in run history and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::MalformedInput(_) => "malformed_input",
            Error::SchemaError(_) => "schema_error",
            Error::ConnectionError(_) => "connection_error",
            Error::WriteError(_) => "write_error",
            Error::ArrowError(_) => "arrow_error",
            Error::IoError(_) => "io_error",
            Error::HttpError(_) => "http_error",
            Error::UrlParseError(_) => "url_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: Error = IoError::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(err.kind(), "io_error");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn taxonomy_messages() {
        assert_eq!(
            Error::NotFound("data.json".into()).to_string(),
            "Source not found: data.json"
        );
        assert_eq!(Error::WriteError("disk full".into()).kind(), "write_error");
    }
}
