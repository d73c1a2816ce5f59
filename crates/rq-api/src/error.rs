//! API error handling
//!
//! Every failure leaves the server as the same HTTP 500 body. The detailed
//! error, including its kind, only goes to the log.
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rq_core::RqError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned to callers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always `"Error"`
    #[schema(example = "Error")]
    pub error: String,
}

impl ApiError {
    pub fn generic() -> Self {
        Self {
            error: "Error".to_string(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// The pipeline or one of its clients failed
    Pipeline(RqError),
    /// The request body could not be read as JSON
    InvalidBody(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Pipeline(err) => err.kind(),
            AppError::InvalidBody(_) => "request",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Pipeline(err) => write!(f, "{err}"),
            AppError::InvalidBody(msg) => write!(f, "Invalid request body: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(kind = self.kind(), "{self}");

        (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError::generic())).into_response()
    }
}

impl From<RqError> for AppError {
    fn from(err: RqError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rq_core::TemplateError;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_every_kind_renders_generic_500() {
        let errors = vec![
            AppError::from(RqError::Config("bad key".into())),
            AppError::from(RqError::Retrieval("index down".into())),
            AppError::from(RqError::from(TemplateError::MissingVariable(
                "question".into(),
            ))),
            AppError::from(RqError::Generation("rate limited".into())),
            AppError::InvalidBody("expected value".into()),
        ];

        for err in errors {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body_of(response).await, serde_json::json!({ "error": "Error" }));
        }
    }

    #[test]
    fn test_kind_is_kept_for_logs() {
        assert_eq!(
            AppError::from(RqError::Retrieval("x".into())).kind(),
            "retrieval"
        );
        assert_eq!(AppError::InvalidBody("x".into()).kind(), "request");
    }
}
