//! Error types for the split service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced at the upload boundary
#[derive(Debug, Error)]
pub enum AppError {
    /// No `file` part in the upload
    #[error("no file uploaded")]
    MissingFile,

    /// Uploaded file name does not end in `.json`
    #[error("a .json file is required")]
    NotJsonFile,

    /// Multipart stream could not be read
    #[error("malformed upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    /// A form field held an unusable value
    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// Body is not valid JSON
    #[error("JSON parse error: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Top-level JSON value is not an object
    #[error("JSON document must be an object")]
    NotAnObject,

    /// Document normalized to zero records
    #[error("no messages found in file")]
    NoMessages,

    /// Spreadsheet rendering failed
    #[error("export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    /// Zip packaging failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile
            | Self::NotJsonFile
            | Self::Multipart(_)
            | Self::InvalidField { .. }
            | Self::InvalidJson(_)
            | Self::NotAnObject
            | Self::NoMessages => StatusCode::BAD_REQUEST,
            Self::Export(_) | Self::Archive(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            detail: String,
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(ErrorResponse { detail: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_request() {
        assert_eq!(AppError::NoMessages.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotAnObject.status(), StatusCode::BAD_REQUEST);
        let field = AppError::InvalidField { field: "overlap", value: "x".into() };
        assert_eq!(field.status(), StatusCode::BAD_REQUEST);
        assert_eq!(field.to_string(), "invalid value for overlap: \"x\"");
    }

    #[test]
    fn test_server_errors() {
        let io = AppError::from(std::io::Error::other("disk"));
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(io.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
