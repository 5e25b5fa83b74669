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

use crate::{
    application::{
        dto::crawl_request::{
            CrawlAcceptedDto, CrawlRequestDto, JobRefDto, SummaryRequestDto, SummaryResponseDto,
        },
        job_registry::{JobRegistry, JobView},
    },
    domain::services::llm_service::SummaryGenerator,
    utils::errors::PipelineError,
    workers::coordinator::MultiSourceCoordinator,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Error, Debug)]
pub enum CrawlUseCaseError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Crawl job not found")]
    NotFound,
    #[error("Crawl job has no report yet")]
    ReportNotReady,
    #[error("Summary generation failed: {0}")]
    Summary(#[from] anyhow::Error),
}

/// 抓取用例
///
/// 提交、查询、取消抓取任务以及生成报告摘要。
pub struct CrawlUseCase {
    coordinator: Arc<MultiSourceCoordinator>,
    registry: Arc<JobRegistry>,
    summarizer: Arc<dyn SummaryGenerator>,
}

impl CrawlUseCase {
    pub fn new(
        coordinator: Arc<MultiSourceCoordinator>,
        registry: Arc<JobRegistry>,
        summarizer: Arc<dyn SummaryGenerator>,
    ) -> Self {
        Self {
            coordinator,
            registry,
            summarizer,
        }
    }

    /// 提交抓取，每个启用的数据源一个任务
    pub fn create_crawl(&self, dto: CrawlRequestDto) -> Result<CrawlAcceptedDto, CrawlUseCaseError> {
        dto.validate()
            .map_err(|e| CrawlUseCaseError::ValidationError(e.to_string()))?;

        let scope = dto.scope.trim();
        let submission = self.coordinator.submit(scope, dto.pages)?;
        let jobs: Vec<JobRefDto> = self
            .registry
            .track(submission, scope)
            .into_iter()
            .map(|(job_id, source_id)| JobRefDto { job_id, source_id })
            .collect();

        info!(scope = %scope, pages = dto.pages, jobs = jobs.len(), "Crawl accepted");
        Ok(CrawlAcceptedDto { jobs })
    }

    pub fn get_crawl(&self, job_id: Uuid) -> Result<JobView, CrawlUseCaseError> {
        self.registry.get(&job_id).ok_or(CrawlUseCaseError::NotFound)
    }

    /// 协作式取消；任务已结束时视为成功
    pub fn cancel_crawl(&self, job_id: Uuid) -> Result<(), CrawlUseCaseError> {
        if !self.registry.contains(&job_id) {
            return Err(CrawlUseCaseError::NotFound);
        }
        if self.registry.cancel(&job_id) {
            info!(job_id = %job_id, "Crawl cancellation requested");
        }
        Ok(())
    }

    /// 为已完成任务的报告生成文字分析
    pub async fn summarize(
        &self,
        job_id: Uuid,
        dto: SummaryRequestDto,
    ) -> Result<SummaryResponseDto, CrawlUseCaseError> {
        dto.validate()
            .map_err(|e| CrawlUseCaseError::ValidationError(e.to_string()))?;
        if !self.registry.contains(&job_id) {
            return Err(CrawlUseCaseError::NotFound);
        }
        let report = self
            .registry
            .report(&job_id)
            .ok_or(CrawlUseCaseError::ReportNotReady)?;

        let summary = self
            .summarizer
            .summarize(&report.report.records, dto.instruction.as_deref())
            .await?;
        Ok(SummaryResponseDto { job_id, summary })
    }
}
