// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 默认的最大抓取页数
pub const DEFAULT_MAX_PAGES: u32 = 5;

/// 抓取任务
///
/// 一次提交针对一个数据源生成一个任务。任务只描述抓取范围，
/// 运行过程中的可变状态由编排器在任务启动时构建、结束时丢弃。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJob {
    /// 任务ID
    pub id: Uuid,
    /// 数据源标识
    pub source_id: String,
    /// 抓取范围（城市或区域名）
    pub scope_key: String,
    /// 目标页数，已被限制在 [1, max_pages]
    pub target_page_count: u32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl CrawlJob {
    /// 创建新任务，页数越界时静默截断而不是报错
    pub fn new(
        source_id: impl Into<String>,
        scope_key: impl Into<String>,
        requested_pages: i64,
        max_pages: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            scope_key: scope_key.into(),
            target_page_count: clamp_page_count(requested_pages, max_pages),
            created_at: Utc::now(),
        }
    }
}

/// 将请求的页数截断到 [1, max_pages]
pub fn clamp_page_count(requested: i64, max_pages: u32) -> u32 {
    let upper = i64::from(max_pages.max(1));
    requested.clamp(1, upper) as u32
}

/// 编排器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Idle,
    BootstrapSession,
    AwaitingPageLoad,
    FetchRetry,
    RenderSettling,
    Extracting,
    AdvancingPage,
    Aggregating,
    Completed,
    RiskBlocked,
    FetchExhausted,
    Cancelled,
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CrawlState::Completed
                | CrawlState::RiskBlocked
                | CrawlState::FetchExhausted
                | CrawlState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlState::Idle => "idle",
            CrawlState::BootstrapSession => "bootstrap_session",
            CrawlState::AwaitingPageLoad => "awaiting_page_load",
            CrawlState::FetchRetry => "fetch_retry",
            CrawlState::RenderSettling => "render_settling",
            CrawlState::Extracting => "extracting",
            CrawlState::AdvancingPage => "advancing_page",
            CrawlState::Aggregating => "aggregating",
            CrawlState::Completed => "completed",
            CrawlState::RiskBlocked => "risk_blocked",
            CrawlState::FetchExhausted => "fetch_exhausted",
            CrawlState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
