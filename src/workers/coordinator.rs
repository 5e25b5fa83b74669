// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{RendererKind, Settings, SourceSettings};
use crate::domain::models::crawl_job::CrawlJob;
use crate::domain::models::event::LifecycleEvent;
use crate::domain::models::rule_set::ExtractionRuleSet;
use crate::domain::repositories::listing_repository::ListingRepository;
use crate::domain::services::anti_detection_service::AntiDetectionScheduler;
use crate::domain::services::extraction_service::CompiledRuleSet;
use crate::engines::gateway::PageFetchGateway;
use crate::engines::playwright_engine::BrowserRenderer;
use crate::engines::reqwest_engine::HttpRenderer;
use crate::engines::traits::{EngineError, PageRenderer, RendererFactory};
use crate::utils::errors::{ConfigurationError, PipelineError};
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::orchestrator::{CrawlOrchestrator, JobHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 单个数据源的抓取配置
///
/// 规则集和调度器在启动时构建，之后只读；渲染器按任务创建。
pub struct SourcePipeline {
    pub rules: Arc<CompiledRuleSet>,
    pub scheduler: Arc<AntiDetectionScheduler>,
    pub renderer: Arc<dyn RendererFactory>,
}

impl SourcePipeline {
    pub fn new(
        rules: CompiledRuleSet,
        scheduler: AntiDetectionScheduler,
        renderer: Arc<dyn RendererFactory>,
    ) -> Self {
        Self {
            rules: Arc::new(rules),
            scheduler: Arc::new(scheduler),
            renderer,
        }
    }

    pub fn source_id(&self) -> &str {
        self.rules.source_id()
    }

    /// 根据数据源配置构建
    ///
    /// 读取规则文件和 Cookie 文件，合并全局与数据源自己的风控标记。
    pub fn from_settings(
        source: &SourceSettings,
        settings: &Settings,
    ) -> Result<Self, ConfigurationError> {
        let rules = ExtractionRuleSet::load(&source.rules_path)?;
        if rules.source_id != source.id {
            return Err(ConfigurationError::Invalid(format!(
                "rule set {} declares source {}, expected {}",
                source.rules_path, rules.source_id, source.id
            )));
        }

        let mut markers = settings.risk.markers.clone();
        markers.extend(rules.risk_markers.iter().cloned());
        markers.extend(source.risk_markers.iter().cloned());

        let cookie = source
            .cookie_path
            .as_ref()
            .and_then(AntiDetectionScheduler::load_cookie);
        let referer = source.referer.clone().or_else(|| rules.referer.clone());
        let pacing = source.pacing.unwrap_or(settings.pacing);

        let scheduler = AntiDetectionScheduler::new(
            source.user_agents.clone(),
            cookie,
            referer,
            markers,
            pacing,
        )?;
        let compiled = CompiledRuleSet::compile(rules)?;

        let timeout = settings.pipeline.fetch_timeout();
        let renderer: Arc<dyn RendererFactory> = match source.renderer {
            RendererKind::Browser => Arc::new(|| -> Result<Box<dyn PageRenderer>, EngineError> {
                Ok(Box::new(BrowserRenderer::new(true)))
            }),
            RendererKind::Http => {
                Arc::new(move || -> Result<Box<dyn PageRenderer>, EngineError> {
                    Ok(Box::new(HttpRenderer::new(timeout)?))
                })
            }
        };

        Ok(Self::new(compiled, scheduler, renderer))
    }
}

/// 一次提交产生的任务集合
pub struct Submission {
    pub jobs: Vec<JobHandle>,
    /// 所有数据源的事件，全部任务结束后流关闭
    pub events: UnboundedReceiver<LifecycleEvent>,
    cancel: CancellationToken,
}

impl Submission {
    /// 取消本次提交的全部任务
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// 多数据源协调器
///
/// 每次提交为每个数据源创建独立的编排器、网关和任务，
/// 数据源之间互不影响，也不做跨数据源的重试或合并。
pub struct MultiSourceCoordinator {
    sources: Vec<SourcePipeline>,
    repository: Option<Arc<dyn ListingRepository>>,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    max_pages: u32,
}

impl MultiSourceCoordinator {
    pub fn new(retry: RetryPolicy, fetch_timeout: Duration, max_pages: u32) -> Self {
        Self {
            sources: Vec::new(),
            repository: None,
            retry,
            fetch_timeout,
            max_pages,
        }
    }

    /// 从配置构建，任一启用的数据源配置无效都会失败
    pub fn from_settings(
        settings: &Settings,
        repository: Option<Arc<dyn ListingRepository>>,
    ) -> Result<Self, ConfigurationError> {
        let pipeline = &settings.pipeline;
        let retry = RetryPolicy::new(
            pipeline.max_attempts,
            Duration::from_millis(pipeline.retry_initial_backoff_ms),
            Duration::from_millis(pipeline.retry_max_backoff_ms),
        );
        let mut coordinator =
            Self::new(retry, pipeline.fetch_timeout(), pipeline.max_pages);
        coordinator.repository = repository;

        for source in settings.enabled_sources() {
            let pipeline = SourcePipeline::from_settings(source, settings)?;
            info!(
                source = %source.id,
                renderer = ?source.renderer,
                cookie = pipeline.scheduler.has_cookie(),
                "Source configured"
            );
            coordinator.add_source(pipeline);
        }
        Ok(coordinator)
    }

    pub fn with_repository(mut self, repository: Arc<dyn ListingRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn add_source(&mut self, source: SourcePipeline) {
        self.sources.push(source);
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.source_id().to_string()).collect()
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// 提交抓取
    ///
    /// 先同步校验全部数据源，任一失败则整次提交被拒绝且不会发起抓取。
    /// 页数越界时截断到 [1, max_pages]。
    pub fn submit(&self, scope_key: &str, pages: i64) -> Result<Submission, PipelineError> {
        if self.sources.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let mut prepared = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            source.rules.rules().resolve_scope(scope_key)?;
            let renderer = source.renderer.create().map_err(|e| {
                ConfigurationError::Invalid(format!(
                    "renderer for source {} unavailable: {}",
                    source.source_id(),
                    e
                ))
            })?;
            let job = CrawlJob::new(source.source_id(), scope_key, pages, self.max_pages);
            prepared.push((source, renderer, job));
        }

        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::unbounded_channel();
        let mut jobs = Vec::with_capacity(prepared.len());
        for (source, renderer, job) in prepared {
            let gateway = PageFetchGateway::new(source.source_id(), renderer, self.fetch_timeout);
            let mut orchestrator = CrawlOrchestrator::new(
                source.rules.clone(),
                source.scheduler.clone(),
                gateway,
                self.retry.clone(),
            );
            if let Some(repository) = &self.repository {
                orchestrator = orchestrator.with_repository(repository.clone());
            }
            match orchestrator.start(job, tx.clone(), cancel.child_token()) {
                Ok(handle) => jobs.push(handle),
                Err(e) => {
                    cancel.cancel();
                    return Err(e);
                }
            }
        }
        drop(tx);

        info!(scope = %scope_key, jobs = jobs.len(), "Crawl submitted");
        Ok(Submission {
            jobs,
            events,
            cancel,
        })
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
