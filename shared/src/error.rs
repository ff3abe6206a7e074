use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Everything a user action can fail with. Handlers recover these at the
/// route boundary and render them as inline JSON; nothing here crashes the
/// process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    NotAuthenticated,
    #[error("admin role required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("a chapter must have at least one page")]
    EmptyChapter,
    #[error("index {index} is out of range for length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("{reason}")]
    Rejected { reason: String },
    #[error("upload failed for page {index}: {cause}")]
    UploadFailed { index: usize, cause: String },
    #[error("the series was modified by another session, reload and retry")]
    Conflict,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    Auth(String),
}

impl ApiError {
    /// Stable machine-readable code for the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotAuthenticated => "NotAuthenticated",
            ApiError::Forbidden => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Validation(_) => "ValidationError",
            ApiError::EmptyChapter => "EmptyChapter",
            ApiError::OutOfRange { .. } => "OutOfRange",
            ApiError::Rejected { .. } => "Rejected",
            ApiError::UploadFailed { .. } => "UploadFailed",
            ApiError::Conflict => "ConflictError",
            ApiError::Storage(_) => "StorageError",
            ApiError::Auth(_) => "AuthenticationFailed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_)
            | ApiError::EmptyChapter
            | ApiError::OutOfRange { .. }
            | ApiError::Rejected { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::UploadFailed { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as the JSON error body every endpoint returns.
    pub fn into_response(self) -> Result<Response<Body>, Error> {
        let error = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        Ok(Response::builder()
            .status(self.status())
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&error)?.into())
            .map_err(Box::new)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::NotAuthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::OutOfRange { index: 9, len: 2 }.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn response_body_carries_code_and_message() {
        let resp = ApiError::NotFound("series").into_response().unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value =
            serde_json::from_slice(&resp.body().to_vec()).unwrap();
        assert_eq!(body["error"], "NotFound");
        assert_eq!(body["message"], "series not found");
    }
}
