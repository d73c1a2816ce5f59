//! Resume query handler
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use rq_core::{Document, PipelineInput, PipelineResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Query request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct QueryRequest {
    /// User's question
    #[serde(default)]
    #[schema(example = "Who has more backend experience?")]
    pub prompt: Option<String>,
}

/// Query response body
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Generated answer
    #[schema(example = "Jane Doe has more backend experience, with five years of Go.")]
    pub output: String,

    /// Documents the answer was generated from
    #[schema(value_type = Vec<Object>)]
    pub source_documents: Vec<Document>,
}

impl From<PipelineResult> for QueryResponse {
    fn from(result: PipelineResult) -> Self {
        Self {
            output: result.output,
            source_documents: result.source_documents,
        }
    }
}

/// Answer a question about the indexed resumes
#[utoipa::path(
    post,
    path = "/api/resume-query-metadata",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Query successful", body = QueryResponse),
        (status = 500, description = "Any failure", body = crate::error::ApiError)
    )
)]
pub async fn resume_query_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    state.increment_requests();

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("resume_query", %request_id);

    async move {
        let Json(req) = payload?;
        let input = PipelineInput { prompt: req.prompt };

        let pipeline = state.pipeline().await?;
        let result = pipeline.run(&input).await?;

        tracing::info!(
            "Answered with {} source documents",
            result.source_documents.len()
        );
        Ok::<_, AppError>(Json(QueryResponse::from(result)))
    }
    .instrument(span)
    .await
}
