// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::fetch::HeaderSet;
use crate::utils::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// 默认的浏览器 User-Agent 池
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36",
];

/// 默认的风控标记
pub const DEFAULT_RISK_MARKERS: &[&str] = &["verify", "captcha", "security", "antispam"];

/// 节奏阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingPhase {
    /// 预热会话之后
    Bootstrap,
    /// 普通静态页面加载后的等待
    Navigation,
    /// 脚本渲染的结果页加载后的等待
    ResultsRender,
    /// 翻页之间的间隔
    InterPage,
}

/// 毫秒区间 `[min_ms, max_ms]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    fn sample(&self) -> Duration {
        if self.min_ms >= self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::random_range(self.min_ms..=self.max_ms))
    }
}

/// 各阶段的延迟区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingProfile {
    pub bootstrap: DelayRange,
    pub navigation: DelayRange,
    pub results_render: DelayRange,
    pub inter_page: DelayRange,
}

impl Default for PacingProfile {
    fn default() -> Self {
        Self {
            bootstrap: DelayRange::new(4000, 6000),
            navigation: DelayRange::new(4000, 7000),
            results_render: DelayRange::new(15000, 20000),
            inter_page: DelayRange::new(8000, 15000),
        }
    }
}

impl PacingProfile {
    /// 所有阶段都不等待，用于测试和本地调试
    pub const fn immediate() -> Self {
        let zero = DelayRange::new(0, 0);
        Self {
            bootstrap: zero,
            navigation: zero,
            results_render: zero,
            inter_page: zero,
        }
    }

    pub fn range(&self, phase: PacingPhase) -> DelayRange {
        match phase {
            PacingPhase::Bootstrap => self.bootstrap,
            PacingPhase::Navigation => self.navigation,
            PacingPhase::ResultsRender => self.results_render,
            PacingPhase::InterPage => self.inter_page,
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, range) in [
            ("bootstrap", self.bootstrap),
            ("navigation", self.navigation),
            ("results_render", self.results_render),
            ("inter_page", self.inter_page),
        ] {
            if range.min_ms > range.max_ms {
                return Err(ConfigurationError::Invalid(format!(
                    "pacing range {} has min {} > max {}",
                    name, range.min_ms, range.max_ms
                )));
            }
        }
        Ok(())
    }
}

/// 反检测调度器
///
/// 负责请求身份（User-Agent、Cookie）、随机化的等待时长和风控页面识别。
/// 构造后只读，多个编排器可以并发读取。
#[derive(Debug, Clone)]
pub struct AntiDetectionScheduler {
    user_agents: Vec<String>,
    cookie: Option<String>,
    referer: Option<String>,
    risk_markers: Vec<String>,
    pacing: PacingProfile,
}

impl AntiDetectionScheduler {
    /// 创建调度器
    ///
    /// # 参数
    ///
    /// * `user_agents` - UA池，为空时使用内置池
    /// * `cookie` - 预先获取的 Cookie
    /// * `referer` - Referer 请求头
    /// * `risk_markers` - 风控标记，不区分大小写
    /// * `pacing` - 各阶段延迟区间
    pub fn new(
        user_agents: Vec<String>,
        cookie: Option<String>,
        referer: Option<String>,
        risk_markers: Vec<String>,
        pacing: PacingProfile,
    ) -> Result<Self, ConfigurationError> {
        pacing.validate()?;

        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            user_agents
        };

        let risk_markers: Vec<String> = risk_markers
            .into_iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        Ok(Self {
            user_agents,
            cookie: cookie.filter(|c| !c.trim().is_empty()),
            referer,
            risk_markers,
            pacing,
        })
    }

    /// 读取 Cookie 文件
    ///
    /// 文件只在启动时读取一次；缺失时记录警告并返回 `None`，
    /// 此时站点更容易触发风控。
    pub fn load_cookie(path: impl AsRef<Path>) -> Option<String> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cookie = content.trim().to_string();
                if cookie.is_empty() {
                    warn!("Cookie file {} is empty", path.display());
                    None
                } else {
                    info!("Loaded cookie from {}", path.display());
                    Some(cookie)
                }
            }
            Err(e) => {
                warn!(
                    "Failed to load cookie file {}: {}. Requests may trigger risk control",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// 生成一组请求头，UA从池中均匀抽取
    pub fn next_headers(&self) -> HeaderSet {
        let mut headers = HeaderSet::new();
        let index = rand::random_range(0..self.user_agents.len());
        headers.insert("User-Agent".to_string(), self.user_agents[index].clone());
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .to_string(),
        );
        headers.insert(
            "Accept-Language".to_string(),
            "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
        );
        headers.insert("Cache-Control".to_string(), "no-cache".to_string());
        headers.insert("Pragma".to_string(), "no-cache".to_string());
        headers.insert("Upgrade-Insecure-Requests".to_string(), "1".to_string());
        headers.insert("Sec-Fetch-Dest".to_string(), "document".to_string());
        headers.insert("Sec-Fetch-Mode".to_string(), "navigate".to_string());

        if let Some(referer) = &self.referer {
            headers.insert("Referer".to_string(), referer.clone());
        }
        if let Some(cookie) = &self.cookie {
            headers.insert("Cookie".to_string(), cookie.clone());
        }
        headers
    }

    /// 从阶段对应的区间中均匀抽取一个等待时长
    pub fn delay_for(&self, phase: PacingPhase) -> Duration {
        self.pacing.range(phase).sample()
    }

    /// 判断目标地址是否为风控页面
    pub fn classify_risk(&self, url: &str) -> bool {
        let lowered = url.to_lowercase();
        self.risk_markers.iter().any(|m| lowered.contains(m.as_str()))
    }

    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    pub fn pacing(&self) -> &PacingProfile {
        &self.pacing
    }
}
