use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

// Taken from https://github.com/tokio-rs/axum/blob/main/examples/anyhow-error-response/src/main.rs
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: HttpErrorResponse,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HttpErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl HttpErrorResponse {
    /// Attaches the underlying cause, reported next to the summary in `error`.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<String> for HttpErrorResponse {
    fn from(error: String) -> Self {
        HttpErrorResponse {
            error,
            message: None,
        }
    }
}

impl From<&str> for HttpErrorResponse {
    fn from(error: &str) -> Self {
        HttpErrorResponse::from(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut res = Json(self.message).into_response();
        *res.status_mut() = self.status;
        res
    }
}

pub type ApiResult<T, E = ApiError> = Result<T, E>;

#[macro_export]
macro_rules! bail_api {
    ($status_code:expr, $error_message:expr) => {
        return Err($crate::error::ApiError {
            status: $status_code,
            message: $crate::error::HttpErrorResponse::from($error_message),
        })
    };
}
