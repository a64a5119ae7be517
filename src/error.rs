use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::repo::RepoError;

/// Business-rule failures raised by the post and comment services.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    /// The caller is authenticated but does not own the resource.
    #[error("{0}")]
    Forbidden(String),
    #[error("storage failure: {0}")]
    Storage(RepoError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }
}

impl From<RepoError> for ServiceError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ServiceError::NotFound("not found".into()),
            RepoError::Deleted | RepoError::ParentMismatch => ServiceError::InvalidArgument(e.to_string()),
            other => ServiceError::Storage(other),
        }
    }
}

/// Attach an entity-specific message to a repo `NotFound`.
pub trait OrNotFound<T> {
    fn or_not_found<F: FnOnce() -> String>(self, msg: F) -> ServiceResult<T>;
}

impl<T> OrNotFound<T> for Result<T, RepoError> {
    fn or_not_found<F: FnOnce() -> String>(self, msg: F) -> ServiceResult<T> {
        self.map_err(|e| match e {
            RepoError::NotFound => ServiceError::NotFound(msg()),
            other => other.into(),
        })
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiErrorBody {
    pub success: bool,
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] NotFound(String),
    #[error("{0}")] BadRequest(String),
    #[error("{0}")] Forbidden(String),
    #[error("authentication required")] Unauthorized,
    #[error("conflict")] Conflict,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("not found".into()),
            RepoError::Conflict => ApiError::Conflict,
            RepoError::Deleted | RepoError::ParentMismatch => ApiError::BadRequest(e.to_string()),
            RepoError::Internal(msg) => {
                tracing::error!("storage error: {msg}");
                ApiError::Internal
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::Storage(e) => e.into(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { success: false, message: self.to_string() })
    }
}
