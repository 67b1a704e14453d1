use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tonic::Status;
use tracing::error;

/// Errors surfaced by the request handlers to either front end.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("invalid or expired token")]
    InvalidToken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_not_found() -> Self {
        AppError::NotFound("user not found".into())
    }

    pub fn invalid_credentials() -> Self {
        AppError::Unauthenticated("invalid credentials".into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated(_) | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client; backend detail stays in the log.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

const INTERNAL_MESSAGE: &str = "internal error";

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidArgument(msg) => Status::invalid_argument(msg),
            AppError::NotFound(msg) => Status::not_found(msg),
            AppError::AlreadyExists(msg) => Status::already_exists(msg),
            AppError::Unauthenticated(msg) => Status::unauthenticated(msg),
            AppError::InvalidToken => Status::unauthenticated("invalid or expired token"),
            internal @ AppError::Internal(_) => Status::internal(internal.client_message()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            AppError::InvalidArgument("bad id".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::user_not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("db down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn internal_detail_stays_out_of_the_body() {
        use http_body_util::BodyExt;

        let res = AppError::Internal(anyhow::anyhow!("connection to 10.0.0.7:5432 refused"))
            .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal error");
    }

    #[test]
    fn grpc_codes_follow_error_kind() {
        let status: Status = AppError::AlreadyExists("email already registered".into()).into();
        assert_eq!(status.code(), tonic::Code::AlreadyExists);
        assert_eq!(status.message(), "email already registered");

        let status: Status = AppError::invalid_credentials().into();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let status: Status = AppError::InvalidArgument("invalid user id".into()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: Status =
            AppError::Internal(anyhow::anyhow!("password authentication failed for user pg"))
                .into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert_eq!(status.message(), "internal error");
    }
}
