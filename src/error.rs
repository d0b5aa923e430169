//! Central error responder.
//!
//! Every failure a handler can produce is normalised into [`AppError`], which
//! maps its kind to a status code and always answers with a `{"message": ...}`
//! JSON body.

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    avatar::AvatarError, mailer::MailError, repository::RepositoryError, storage::StorageError,
};

/// Application-level error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// Schema/validation failure, empty update body, missing upload.
    #[error("{0}")]
    BadRequest(String),

    /// Missing/invalid/expired token or bad credentials. `None` is the bare
    /// rejection used for unverified accounts.
    #[error("{}", unauthorized_message(.0))]
    Unauthorized(Option<String>),

    /// Missing resource, or one owned by somebody else.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate email.
    #[error("{0}")]
    Conflict(String),

    /// Anything unexpected. The detail is logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

const NOT_AUTHORIZED: &str = "Not authorized";
const SERVER_ERROR: &str = "Server error";

fn unauthorized_message(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or(NOT_AUTHORIZED)
}

/// Uniform body of every error response.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn not_found() -> Self {
        Self::NotFound("Not found".to_string())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(Some(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                SERVER_ERROR.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AvatarError> for AppError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::Decode(_) => Self::BadRequest("Unsupported image file".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
