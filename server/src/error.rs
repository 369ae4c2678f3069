use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use layscience::job::JobState;
use layscience::{
    ConfigError, InputError, LayscienceError, ResultError, StoreError, TranslateError, UploadError,
};

const ERROR_INVALID_INPUT: &str = "invalid_input";
const ERROR_UNSUPPORTED_FORMAT: &str = "unsupported_format";
const ERROR_TOO_LARGE: &str = "payload_too_large";
const ERROR_NOT_FOUND: &str = "not_found";
const ERROR_NOT_READY: &str = "not_ready";
const ERROR_UPSTREAM: &str = "upstream_error";
const ERROR_INTERNAL: &str = "internal_server_error";

/// Failures that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] LayscienceError),

    #[error("Invalid bind address '{address}': {source}")]
    InvalidBind {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
}

/// Error response: a status code and a JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error,
                message: message.into(),
                state: None,
            },
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ERROR_INVALID_INPUT, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ERROR_NOT_FOUND, message)
    }

    pub fn not_ready(state: JobState) -> Self {
        let mut err = Self::new(
            StatusCode::CONFLICT,
            ERROR_NOT_READY,
            format!("job is {}", state),
        );
        err.body.state = Some(state);
        err
    }

    /// Logs the cause and hides it from the client.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ERROR_INTERNAL,
            "internal server error",
        )
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ERROR_UNSUPPORTED_FORMAT,
                rejection.body_text(),
            ),
            other => ApiError::invalid_input(other.body_text()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::UnsupportedFormat => {
                ApiError::new(StatusCode::BAD_REQUEST, ERROR_UNSUPPORTED_FORMAT, err.to_string())
            }
            UploadError::TooLarge { .. } => {
                ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, ERROR_TOO_LARGE, err.to_string())
            }
            UploadError::Io { .. } => ApiError::internal(err),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::not_found(format!("job {} not found", id)),
            other => ApiError::internal(other),
        }
    }
}

impl From<ResultError> for ApiError {
    fn from(err: ResultError) -> Self {
        match err {
            ResultError::NotFound(id) => ApiError::not_found(format!("job {} not found", id)),
            ResultError::NotReady(state) => ApiError::not_ready(state),
            ResultError::Failed(error) => ApiError::internal(error),
            ResultError::Store(e) => ApiError::from(e),
        }
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::Input(e) => ApiError::from(e),
            TranslateError::Result(ResultError::Failed(_)) => ApiError::not_ready(JobState::Failed),
            TranslateError::Result(e) => ApiError::from(e),
            upstream @ TranslateError::Upstream(_) => {
                tracing::warn!(error = %upstream, "summary translation failed");
                ApiError::new(StatusCode::BAD_GATEWAY, ERROR_UPSTREAM, upstream.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
