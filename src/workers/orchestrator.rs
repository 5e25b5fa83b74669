// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::{CrawlJob, CrawlState};
use crate::domain::models::event::{EventPayload, FailureReason, LifecycleEvent};
use crate::domain::models::fetch::{FetchOutcome, FetchPurpose, FetchRequest};
use crate::domain::models::listing::ListingRecord;
use crate::domain::models::report::{DiagnosticsSummary, JobReport};
use crate::domain::repositories::listing_repository::ListingRepository;
use crate::domain::services::aggregation_service::AggregationService;
use crate::domain::services::anti_detection_service::{AntiDetectionScheduler, PacingPhase};
use crate::domain::services::dedup_service::DedupeIndex;
use crate::domain::services::extraction_service::{CompiledRuleSet, ExtractionService};
use crate::engines::gateway::PageFetchGateway;
use crate::infrastructure::metrics::{
    JOBS_FINISHED, RECORDS_ACCEPTED, RECORDS_REJECTED, RISK_BLOCKS, STORE_FAILURES,
};
use crate::utils::errors::{ConfigurationError, PipelineError};
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::event_sink::EventSink;
use chrono::Utc;
use metrics::counter;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 任务结束结果
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(Box<JobReport>),
    /// 命中风控页面
    Blocked { url: String },
    /// 重试次数耗尽
    FetchExhausted { url: String, attempts: u32 },
    Cancelled,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed(_) => "completed",
            JobOutcome::Blocked { .. } => "blocked",
            JobOutcome::FetchExhausted { .. } => "fetch_exhausted",
            JobOutcome::Cancelled => "cancelled",
        }
    }

    pub fn report(&self) -> Option<&JobReport> {
        match self {
            JobOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// 运行中任务的句柄
pub struct JobHandle {
    pub job_id: Uuid,
    pub source_id: String,
    cancel: CancellationToken,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// 请求取消，任务在下一次状态切换或等待时停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待任务结束
    pub async fn join(self) -> Result<JobOutcome, JoinError> {
        self.task.await
    }
}

/// 抓取编排器
///
/// 驱动单个数据源的抓取状态机。编排器独占自己的抓取网关，
/// 同一时刻只允许一个任务运行；上一个任务结束后可以再次启动。
pub struct CrawlOrchestrator {
    rules: Arc<CompiledRuleSet>,
    scheduler: Arc<AntiDetectionScheduler>,
    gateway: Arc<Mutex<PageFetchGateway>>,
    repository: Option<Arc<dyn ListingRepository>>,
    retry: RetryPolicy,
}

impl CrawlOrchestrator {
    pub fn new(
        rules: Arc<CompiledRuleSet>,
        scheduler: Arc<AntiDetectionScheduler>,
        gateway: PageFetchGateway,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            rules,
            scheduler,
            gateway: Arc::new(Mutex::new(gateway)),
            repository: None,
            retry,
        }
    }

    /// 汇总阶段把接收的记录写入仓库
    pub fn with_repository(mut self, repository: Arc<dyn ListingRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn source_id(&self) -> &str {
        self.rules.source_id()
    }

    /// 是否有任务正在运行
    pub fn is_running(&self) -> bool {
        self.gateway.try_lock().is_err()
    }

    /// 启动任务
    ///
    /// 校验失败或已有任务在运行时同步返回错误，此时不会发起任何抓取。
    /// 成功后任务在独立的 tokio 任务中运行，事件写入 `events`。
    pub fn start(
        &self,
        job: CrawlJob,
        events: UnboundedSender<LifecycleEvent>,
        cancel: CancellationToken,
    ) -> Result<JobHandle, PipelineError> {
        if job.source_id != self.rules.source_id() {
            return Err(ConfigurationError::MissingRuleSet(job.source_id).into());
        }
        let scope_slug = self.rules.rules().resolve_scope(&job.scope_key)?;

        let gateway = self
            .gateway
            .clone()
            .try_lock_owned()
            .map_err(|_| PipelineError::JobAlreadyRunning(job.source_id.clone()))?;

        let job_id = job.id;
        let source_id = job.source_id.clone();
        let run = JobRun {
            sink: EventSink::new(job.source_id.clone(), job.id, events),
            job,
            scope_slug,
            rules: self.rules.clone(),
            scheduler: self.scheduler.clone(),
            gateway,
            repository: self.repository.clone(),
            retry: self.retry.clone(),
            cancel: cancel.clone(),
            state: CrawlState::Idle,
            queue: VecDeque::new(),
            dedupe: DedupeIndex::new(),
            accepted: Vec::new(),
            diagnostics: DiagnosticsSummary::default(),
            pages_completed: 0,
        };

        let task = tokio::spawn(run.run());
        Ok(JobHandle {
            job_id,
            source_id,
            cancel,
            task,
        })
    }
}

/// 取消信号
struct Interrupted;

/// 单个任务的运行状态，任务开始时创建、结束时丢弃
struct JobRun {
    job: CrawlJob,
    scope_slug: String,
    rules: Arc<CompiledRuleSet>,
    scheduler: Arc<AntiDetectionScheduler>,
    gateway: OwnedMutexGuard<PageFetchGateway>,
    repository: Option<Arc<dyn ListingRepository>>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    sink: EventSink,
    state: CrawlState,
    queue: VecDeque<FetchRequest>,
    dedupe: DedupeIndex,
    accepted: Vec<ListingRecord>,
    diagnostics: DiagnosticsSummary,
    pages_completed: u32,
}

impl JobRun {
    async fn run(mut self) -> JobOutcome {
        info!(
            source = %self.job.source_id,
            job_id = %self.job.id,
            scope = %self.job.scope_key,
            pages = self.job.target_page_count,
            renderer = self.gateway.renderer_name(),
            "Crawl job started"
        );

        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(Interrupted) => {
                self.queue.clear();
                self.state = CrawlState::Cancelled;
                info!(source = %self.job.source_id, job_id = %self.job.id, "Crawl job cancelled");
                self.sink.emit(EventPayload::Failed {
                    reason: FailureReason::Cancelled,
                });
                JobOutcome::Cancelled
            }
        };

        self.gateway.close().await;
        counter!(
            JOBS_FINISHED,
            "source" => self.job.source_id.clone(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        outcome
    }

    async fn drive(&mut self) -> Result<JobOutcome, Interrupted> {
        match self.rules.rules().bootstrap_url.clone() {
            Some(url) => {
                self.transition(CrawlState::BootstrapSession, "正在预热会话")?;
                let headers = self.scheduler.next_headers();
                self.queue
                    .push_back(FetchRequest::new(url, headers, FetchPurpose::Bootstrap));
            }
            None => self.enqueue_page(1),
        }

        while let Some(request) = self.queue.pop_front() {
            let status = match request.purpose {
                FetchPurpose::Bootstrap => "正在加载引导页".to_string(),
                FetchPurpose::ResultPage(page) => format!("正在加载第{}页", page),
            };
            self.transition(CrawlState::AwaitingPageLoad, status)?;
            let outcome = self.fetch(&request).await?;

            if self.scheduler.classify_risk(&outcome.final_url) {
                return Ok(self.block(outcome.final_url));
            }

            if !outcome.succeeded {
                let reason = outcome
                    .error_kind
                    .as_ref()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                if !self.retry.should_retry(request.attempt) {
                    return Ok(self.exhaust(&request, &reason));
                }
                let backoff = self.retry.calculate_backoff(request.attempt);
                warn!(
                    source = %self.job.source_id,
                    url = %request.url,
                    attempt = request.attempt,
                    error = %reason,
                    backoff_ms = backoff.as_millis() as u64,
                    "Fetch failed, retrying"
                );
                self.transition(
                    CrawlState::FetchRetry,
                    format!(
                        "第{}次加载失败（{}），{}秒后重试",
                        request.attempt,
                        reason,
                        backoff.as_secs()
                    ),
                )?;
                self.pause(backoff).await?;
                let retry = request.next_attempt(self.scheduler.next_headers());
                self.queue.push_front(retry);
                continue;
            }

            match request.purpose {
                FetchPurpose::Bootstrap => {
                    self.pause(self.scheduler.delay_for(PacingPhase::Bootstrap))
                        .await?;
                    self.enqueue_page(1);
                }
                FetchPurpose::ResultPage(page) => {
                    if let Some(outcome) = self.process_page(page, outcome).await? {
                        return Ok(outcome);
                    }
                }
            }
        }

        self.transition(CrawlState::Aggregating, "正在汇总结果")?;
        Ok(self.aggregate().await)
    }

    /// 渲染等待、提取、去重并决定是否翻页；命中风控时返回终止结果
    async fn process_page(
        &mut self,
        page: u32,
        fetched: FetchOutcome,
    ) -> Result<Option<JobOutcome>, Interrupted> {
        let phase = self.settle_phase(&fetched.final_url);
        self.transition(CrawlState::RenderSettling, format!("等待第{}页渲染完成", page))?;
        self.pause(self.scheduler.delay_for(phase)).await?;

        let cancel = self.cancel.clone();
        let settled = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupted),
            settled = self.gateway.settle(fetched) => settled,
        };
        // 脚本可能在等待期间跳转到验证页
        if self.scheduler.classify_risk(&settled.final_url) {
            return Ok(Some(self.block(settled.final_url)));
        }

        self.transition(CrawlState::Extracting, format!("正在解析第{}页", page))?;
        self.extract_page(page, settled.content.as_deref().unwrap_or_default());
        self.pages_completed += 1;

        if self.pages_completed >= self.job.target_page_count {
            return Ok(None);
        }
        let next = page + 1;
        match self.rules.rules().page_url(&self.scope_slug, next) {
            Some(url) => {
                self.transition(CrawlState::AdvancingPage, format!("准备加载第{}页", next))?;
                self.pause(self.scheduler.delay_for(PacingPhase::InterPage))
                    .await?;
                let headers = self.scheduler.next_headers();
                self.queue
                    .push_back(FetchRequest::new(url, headers, FetchPurpose::ResultPage(next)));
            }
            None => info!(
                source = %self.job.source_id,
                page = next,
                "No further page can be derived, aggregating"
            ),
        }
        Ok(None)
    }

    fn extract_page(&mut self, page: u32, markup: &str) {
        let output = ExtractionService::extract(markup, &self.rules, &self.job.scope_key);
        output.merge_into(&mut self.diagnostics);
        let (containers, excluded) = (output.containers, output.excluded);

        let mut accepted = 0usize;
        let mut rejected = 0usize;
        for record in output.records {
            let decision = self.dedupe.accept(&record);
            if decision.is_accepted() {
                accepted += 1;
                self.sink.emit(EventPayload::RecordFound {
                    record: Box::new(record.clone()),
                });
                self.accepted.push(record);
            } else {
                rejected += 1;
                debug!(
                    source = %self.job.source_id,
                    url = %record.canonical_url,
                    decision = ?decision,
                    "Record rejected"
                );
            }
        }

        counter!(RECORDS_ACCEPTED, "source" => self.job.source_id.clone()).increment(accepted as u64);
        counter!(RECORDS_REJECTED, "source" => self.job.source_id.clone()).increment(rejected as u64);
        info!(
            source = %self.job.source_id,
            page,
            containers,
            excluded,
            accepted,
            rejected,
            "Page extracted"
        );
    }

    async fn aggregate(&mut self) -> JobOutcome {
        self.dedupe.write_stats(&mut self.diagnostics);
        let report = AggregationService::aggregate(std::mem::take(&mut self.accepted));

        if let Some(repository) = &self.repository {
            if !report.records.is_empty() {
                match repository.store_batch(&report.records).await {
                    Ok(stored) => debug!(source = %self.job.source_id, stored, "Records stored"),
                    Err(e) => {
                        error!(source = %self.job.source_id, error = %e, "Failed to store records");
                        counter!(STORE_FAILURES, "source" => self.job.source_id.clone())
                            .increment(1);
                    }
                }
            }
        }

        let job_report = JobReport {
            job_id: self.job.id,
            source_id: self.job.source_id.clone(),
            scope_key: self.job.scope_key.clone(),
            pages_completed: self.pages_completed,
            report,
            diagnostics: self.diagnostics.clone(),
            generated_at: Utc::now(),
        };

        self.state = CrawlState::Completed;
        info!(
            source = %self.job.source_id,
            job_id = %self.job.id,
            pages = self.pages_completed,
            total = job_report.report.total_count,
            "Crawl job completed"
        );
        self.sink.emit(EventPayload::Completed {
            report: Box::new(job_report.clone()),
        });
        JobOutcome::Completed(Box::new(job_report))
    }

    fn block(&mut self, url: String) -> JobOutcome {
        let discarded = self.queue.len();
        self.queue.clear();
        self.state = CrawlState::RiskBlocked;
        warn!(
            source = %self.job.source_id,
            url = %url,
            discarded,
            "Risk control page detected, job stopped"
        );
        counter!(RISK_BLOCKS, "source" => self.job.source_id.clone()).increment(1);
        self.sink.emit(EventPayload::Blocked { url: url.clone() });
        JobOutcome::Blocked { url }
    }

    fn exhaust(&mut self, request: &FetchRequest, reason: &str) -> JobOutcome {
        self.queue.clear();
        self.state = CrawlState::FetchExhausted;
        error!(
            source = %self.job.source_id,
            url = %request.url,
            attempts = request.attempt,
            error = %reason,
            "Fetch attempts exhausted"
        );
        self.sink.emit(EventPayload::Failed {
            reason: FailureReason::FetchExhausted {
                url: request.url.clone(),
                attempts: request.attempt,
            },
        });
        JobOutcome::FetchExhausted {
            url: request.url.clone(),
            attempts: request.attempt,
        }
    }

    fn enqueue_page(&mut self, page: u32) {
        match self.rules.rules().page_url(&self.scope_slug, page) {
            Some(url) => {
                let headers = self.scheduler.next_headers();
                self.queue
                    .push_back(FetchRequest::new(url, headers, FetchPurpose::ResultPage(page)));
            }
            None => warn!(source = %self.job.source_id, page, "Page URL cannot be derived"),
        }
    }

    fn settle_phase(&self, final_url: &str) -> PacingPhase {
        let script_rendered = self
            .rules
            .rules()
            .script_rendered_markers
            .iter()
            .any(|marker| final_url.contains(marker.as_str()));
        if script_rendered {
            PacingPhase::ResultsRender
        } else {
            PacingPhase::Navigation
        }
    }

    async fn fetch(&mut self, request: &FetchRequest) -> Result<FetchOutcome, Interrupted> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupted),
            outcome = self.gateway.fetch(request) => Ok(outcome),
        }
    }

    async fn pause(&self, delay: Duration) -> Result<(), Interrupted> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// 切换状态并发出进度事件，已取消时拒绝切换
    fn transition(
        &mut self,
        state: CrawlState,
        status: impl Into<String>,
    ) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted);
        }
        debug!(
            source = %self.job.source_id,
            job_id = %self.job.id,
            from = %self.state,
            to = %state,
            "State transition"
        );
        self.state = state;
        let percent = self.progress_percent();
        self.sink.emit(EventPayload::Progress {
            state,
            percent,
            status: status.into(),
        });
        Ok(())
    }

    fn progress_percent(&self) -> u8 {
        match self.state {
            CrawlState::Idle => 0,
            CrawlState::BootstrapSession => 2,
            CrawlState::Aggregating => 95,
            CrawlState::Completed => 100,
            _ => {
                let target = self.job.target_page_count.max(1);
                (5 + self.pages_completed * 85 / target).min(90) as u8
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
