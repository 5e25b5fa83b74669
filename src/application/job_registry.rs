// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::CrawlState;
use crate::domain::models::event::{EventPayload, FailureReason, LifecycleEvent};
use crate::config::settings::RegistrySettings;
use crate::domain::models::report::JobReport;
use crate::workers::coordinator::Submission;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// 任务的最新视图，由事件流驱动更新
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub source_id: String,
    pub scope_key: String,
    pub state: CrawlState,
    pub percent: u8,
    pub status: String,
    pub records_found: usize,
    pub blocked_url: Option<String>,
    pub failure: Option<FailureReason>,
    pub report: Option<JobReport>,
    pub last_sequence: Option<u64>,
    pub updated_at: DateTime<Utc>,
    /// 收到终止事件的时间
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobView {
    fn new(job_id: Uuid, source_id: String, scope_key: String) -> Self {
        Self {
            job_id,
            source_id,
            scope_key,
            state: CrawlState::Idle,
            percent: 0,
            status: "等待开始".to_string(),
            records_found: 0,
            blocked_url: None,
            failure: None,
            report: None,
            last_sequence: None,
            updated_at: Utc::now(),
            finished_at: None,
        }
    }

    fn apply(&mut self, event: LifecycleEvent) {
        self.last_sequence = Some(event.sequence);
        self.updated_at = event.emitted_at;
        if event.is_terminal() {
            self.finished_at = Some(event.emitted_at);
        }
        match event.payload {
            EventPayload::Progress {
                state,
                percent,
                status,
            } => {
                self.state = state;
                self.percent = percent;
                self.status = status;
            }
            EventPayload::RecordFound { .. } => self.records_found += 1,
            EventPayload::Blocked { url } => {
                self.state = CrawlState::RiskBlocked;
                self.status = "触发风控验证，任务已停止".to_string();
                self.blocked_url = Some(url);
            }
            EventPayload::Completed { report } => {
                self.state = CrawlState::Completed;
                self.percent = 100;
                self.status = format!("完成，共{}条房源", report.report.total_count);
                self.report = Some(*report);
            }
            EventPayload::Failed { reason } => {
                self.state = match reason {
                    FailureReason::FetchExhausted { .. } => CrawlState::FetchExhausted,
                    FailureReason::Cancelled => CrawlState::Cancelled,
                };
                self.status = match &reason {
                    FailureReason::FetchExhausted { attempts, .. } => {
                        format!("页面加载失败，已重试{}次", attempts)
                    }
                    FailureReason::Cancelled => "任务已取消".to_string(),
                };
                self.failure = Some(reason);
            }
        }
    }
}

/// 已结束任务视图的保留策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// 结束后保留的时长
    pub finished_ttl: Duration,
    /// 已结束任务的数量上限，超出时先清理最早结束的
    pub max_finished: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_settings(&RegistrySettings::default())
    }
}

impl RetentionPolicy {
    pub fn from_settings(settings: &RegistrySettings) -> Self {
        Self {
            finished_ttl: settings.finished_ttl(),
            max_finished: settings.max_finished_jobs,
        }
    }
}

/// 任务登记表
///
/// 保存每个任务的最新视图和取消令牌。每次提交启动一个后台任务消费事件流，
/// 流关闭即全部任务结束。已结束任务的视图按 [`RetentionPolicy`] 清理，
/// 运行中的任务不受影响。
#[derive(Default)]
pub struct JobRegistry {
    views: DashMap<Uuid, JobView>,
    cancels: DashMap<Uuid, CancellationToken>,
    retention: RetentionPolicy,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    /// 登记一次提交并开始消费它的事件流，返回 (任务ID, 数据源) 列表
    pub fn track(self: &Arc<Self>, submission: Submission, scope_key: &str) -> Vec<(Uuid, String)> {
        let Submission { jobs, events, .. } = submission;
        let mut refs = Vec::with_capacity(jobs.len());
        for job in jobs {
            self.views.insert(
                job.job_id,
                JobView::new(job.job_id, job.source_id.clone(), scope_key.to_string()),
            );
            self.cancels.insert(job.job_id, job.cancellation_token());
            refs.push((job.job_id, job.source_id.clone()));
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.drain(events).await });
        refs
    }

    async fn drain(&self, mut events: UnboundedReceiver<LifecycleEvent>) {
        while let Some(event) = events.recv().await {
            self.apply(event);
        }
        debug!("Submission event stream closed");
    }

    /// 应用一个事件，未登记的任务被忽略
    pub fn apply(&self, event: LifecycleEvent) {
        let job_id = event.job_id;
        let terminal = event.is_terminal();
        if let Some(mut view) = self.views.get_mut(&job_id) {
            view.apply(event);
        }
        if terminal {
            self.cancels.remove(&job_id);
            self.prune();
        }
    }

    /// 按保留策略清理已结束任务的视图，返回清理数量
    pub fn prune(&self) -> usize {
        self.prune_at(Utc::now())
    }

    fn prune_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::from_std(self.retention.finished_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let before = self.views.len();
        self.views.retain(|_, view| match view.finished_at {
            Some(finished) => now.signed_duration_since(finished) < ttl,
            None => true,
        });

        let mut finished: Vec<(DateTime<Utc>, Uuid)> = self
            .views
            .iter()
            .filter_map(|entry| entry.finished_at.map(|at| (at, *entry.key())))
            .collect();
        if finished.len() > self.retention.max_finished {
            finished.sort();
            let excess = finished.len() - self.retention.max_finished;
            for (_, job_id) in finished.into_iter().take(excess) {
                self.views.remove(&job_id);
            }
        }

        let removed = before.saturating_sub(self.views.len());
        if removed > 0 {
            debug!(removed, "Pruned finished job views");
        }
        removed
    }

    /// 启动后台定期清理，登记表释放后自动退出
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            info!("Job view sweeper started");
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.prune();
            }
            debug!("Job view sweeper stopped");
        })
    }

    pub fn get(&self, job_id: &Uuid) -> Option<JobView> {
        self.views.get(job_id).map(|v| v.clone())
    }

    pub fn report(&self, job_id: &Uuid) -> Option<JobReport> {
        self.views.get(job_id).and_then(|v| v.report.clone())
    }

    pub fn contains(&self, job_id: &Uuid) -> bool {
        self.views.contains_key(job_id)
    }

    /// 请求取消；任务已结束或不存在时返回 false
    pub fn cancel(&self, job_id: &Uuid) -> bool {
        match self.cancels.get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::report::{AggregateReport, DiagnosticsSummary, MeanValue};

    fn event(job_id: Uuid, sequence: u64, payload: EventPayload) -> LifecycleEvent {
        LifecycleEvent {
            source_id: "ke".to_string(),
            job_id,
            sequence,
            emitted_at: Utc::now(),
            payload,
        }
    }

    fn registry_with(job_id: Uuid) -> JobRegistry {
        let registry = JobRegistry::new();
        registry
            .views
            .insert(job_id, JobView::new(job_id, "ke".to_string(), "北京".to_string()));
        registry.cancels.insert(job_id, CancellationToken::new());
        registry
    }

    #[test]
    fn test_progress_and_completion_update_view() {
        let job_id = Uuid::new_v4();
        let registry = registry_with(job_id);

        registry.apply(event(
            job_id,
            0,
            EventPayload::Progress {
                state: CrawlState::AwaitingPageLoad,
                percent: 5,
                status: "正在加载第1页".to_string(),
            },
        ));
        let view = registry.get(&job_id).unwrap();
        assert_eq!(view.state, CrawlState::AwaitingPageLoad);
        assert_eq!(view.percent, 5);

        let report = JobReport {
            job_id,
            source_id: "ke".to_string(),
            scope_key: "北京".to_string(),
            pages_completed: 1,
            report: AggregateReport {
                records: vec![],
                total_count: 0,
                average_total_price: MeanValue::default(),
                average_unit_price: MeanValue::default(),
                layout_distribution: vec![],
            },
            diagnostics: DiagnosticsSummary::default(),
            generated_at: Utc::now(),
        };
        registry.apply(event(
            job_id,
            1,
            EventPayload::Completed {
                report: Box::new(report),
            },
        ));

        let view = registry.get(&job_id).unwrap();
        assert_eq!(view.state, CrawlState::Completed);
        assert_eq!(view.percent, 100);
        assert_eq!(view.last_sequence, Some(1));
        assert!(registry.report(&job_id).is_some());
        // 已结束的任务不能再取消
        assert!(!registry.cancel(&job_id));
    }

    fn cancelled(job_id: Uuid, sequence: u64) -> LifecycleEvent {
        event(
            job_id,
            sequence,
            EventPayload::Failed {
                reason: FailureReason::Cancelled,
            },
        )
    }

    fn track_view(registry: &JobRegistry, job_id: Uuid) {
        registry
            .views
            .insert(job_id, JobView::new(job_id, "ke".to_string(), "北京".to_string()));
    }

    #[test]
    fn test_finished_views_expire_after_ttl() {
        let registry = JobRegistry::with_retention(RetentionPolicy {
            finished_ttl: Duration::from_secs(600),
            max_finished: 100,
        });
        let finished = Uuid::new_v4();
        let running = Uuid::new_v4();
        track_view(&registry, finished);
        track_view(&registry, running);

        registry.apply(cancelled(finished, 0));
        let finished_at = registry.get(&finished).unwrap().finished_at.unwrap();
        assert!(registry.get(&running).unwrap().finished_at.is_none());

        assert_eq!(registry.prune_at(finished_at + chrono::Duration::seconds(599)), 0);
        assert!(registry.contains(&finished));

        assert_eq!(registry.prune_at(finished_at + chrono::Duration::seconds(601)), 1);
        assert!(!registry.contains(&finished));
        assert!(registry.get(&finished).is_none());
        // 运行中的任务不受保留时长影响
        assert!(registry.contains(&running));
        assert_eq!(registry.prune_at(finished_at + chrono::Duration::days(30)), 0);
    }

    #[test]
    fn test_oldest_finished_views_are_evicted_over_capacity() {
        let registry = JobRegistry::with_retention(RetentionPolicy {
            finished_ttl: Duration::from_secs(3600),
            max_finished: 2,
        });
        let jobs: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let running = Uuid::new_v4();
        track_view(&registry, running);
        for job_id in &jobs {
            track_view(&registry, *job_id);
        }

        let start = Utc::now();
        for (i, job_id) in jobs.iter().enumerate() {
            let mut event = cancelled(*job_id, 0);
            event.emitted_at = start + chrono::Duration::seconds(i as i64);
            registry.apply(event);
        }

        assert_eq!(registry.len(), 3);
        assert!(!registry.contains(&jobs[0]));
        assert!(!registry.contains(&jobs[1]));
        assert!(registry.contains(&jobs[2]));
        assert!(registry.contains(&jobs[3]));
        assert!(registry.contains(&running));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_prunes_and_stops_with_registry() {
        let registry = Arc::new(JobRegistry::with_retention(RetentionPolicy {
            finished_ttl: Duration::ZERO,
            max_finished: 100,
        }));
        let job_id = Uuid::new_v4();
        track_view(&registry, job_id);
        registry.views.get_mut(&job_id).unwrap().finished_at = Some(Utc::now());

        let sweeper = registry.spawn_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!registry.contains(&job_id));

        drop(registry);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(sweeper.is_finished());
    }

    #[test]
    fn test_cancel_and_block() {
        let job_id = Uuid::new_v4();
        let registry = registry_with(job_id);
        assert!(registry.cancel(&job_id));
        assert!(!registry.cancel(&Uuid::new_v4()));

        registry.apply(event(
            job_id,
            0,
            EventPayload::Blocked {
                url: "https://hip.ke.com/captcha".to_string(),
            },
        ));
        let view = registry.get(&job_id).unwrap();
        assert_eq!(view.state, CrawlState::RiskBlocked);
        assert_eq!(view.blocked_url.as_deref(), Some("https://hip.ke.com/captcha"));
        assert!(registry.report(&job_id).is_none());
    }
}
