// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    application::{
        dto::crawl_request::{CrawlRequestDto, SummaryRequestDto},
        use_cases::crawl_use_case::{CrawlUseCase, CrawlUseCaseError},
    },
    utils::errors::PipelineError,
};

/// 提交抓取任务
pub async fn create_crawl(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Json(payload): Json<CrawlRequestDto>,
) -> impl IntoResponse {
    match use_case.create_crawl(payload) {
        Ok(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(e) => error_response(e),
    }
}

/// 获取任务的最新状态
pub async fn get_crawl(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    match use_case.get_crawl(job_id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(e),
    }
}

/// 取消进行中的抓取任务
pub async fn cancel_crawl(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    match use_case.cancel_crawl(job_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// 生成报告摘要，请求体可以省略
pub async fn summarize_crawl(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(job_id): Path<Uuid>,
    body: Bytes,
) -> impl IntoResponse {
    let dto = if body.is_empty() {
        SummaryRequestDto::default()
    } else {
        match serde_json::from_slice::<SummaryRequestDto>(&body) {
            Ok(dto) => dto,
            Err(e) => {
                return error_response(CrawlUseCaseError::ValidationError(e.to_string()));
            }
        }
    };
    match use_case.summarize(job_id, dto).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: CrawlUseCaseError) -> axum::response::Response {
    let (status, msg): (StatusCode, String) = err.into();
    (status, Json(json!({ "error": msg }))).into_response()
}

impl From<CrawlUseCaseError> for (StatusCode, String) {
    fn from(err: CrawlUseCaseError) -> Self {
        match err {
            CrawlUseCaseError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            CrawlUseCaseError::Pipeline(PipelineError::Configuration(e)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            CrawlUseCaseError::Pipeline(e @ PipelineError::JobAlreadyRunning(_)) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            CrawlUseCaseError::Pipeline(e @ PipelineError::NoSources) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            CrawlUseCaseError::NotFound => {
                (StatusCode::NOT_FOUND, "Crawl job not found".to_string())
            }
            CrawlUseCaseError::ReportNotReady => (
                StatusCode::CONFLICT,
                "Crawl job has no report yet".to_string(),
            ),
            CrawlUseCaseError::Summary(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}
