// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::CrawlState;
use crate::domain::models::listing::ListingRecord;
use crate::domain::models::report::JobReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Progress,
    RecordFound,
    Blocked,
    Completed,
    Failed,
}

/// 任务失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FailureReason {
    /// 重试次数耗尽
    FetchExhausted { url: String, attempts: u32 },
    /// 被外部取消
    Cancelled,
}

/// 事件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventPayload {
    Progress {
        state: CrawlState,
        percent: u8,
        status: String,
    },
    RecordFound {
        record: Box<ListingRecord>,
    },
    Blocked {
        url: String,
    },
    Completed {
        report: Box<JobReport>,
    },
    Failed {
        reason: FailureReason,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Progress { .. } => EventKind::Progress,
            EventPayload::RecordFound { .. } => EventKind::RecordFound,
            EventPayload::Blocked { .. } => EventKind::Blocked,
            EventPayload::Completed { .. } => EventKind::Completed,
            EventPayload::Failed { .. } => EventKind::Failed,
        }
    }
}

/// 生命周期事件
///
/// 每个数据源的事件按 `sequence` 严格有序，多个数据源的事件在协调器中合并。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub source_id: String,
    pub job_id: Uuid,
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// 是否为终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::Blocked | EventKind::Completed | EventKind::Failed
        )
    }
}
