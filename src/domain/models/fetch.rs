// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 请求头集合（User-Agent、Cookie、Referer、Accept-* 等）
pub type HeaderSet = BTreeMap<String, String>;

/// 请求用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "page")]
pub enum FetchPurpose {
    /// 预热会话，不做提取
    Bootstrap,
    /// 结果列表页（页码从1开始）
    ResultPage(u32),
}

/// 抓取请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HeaderSet,
    /// 第几次尝试，从1开始
    pub attempt: u32,
    pub purpose: FetchPurpose,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, headers: HeaderSet, purpose: FetchPurpose) -> Self {
        Self {
            url: url.into(),
            headers,
            attempt: 1,
            purpose,
        }
    }

    /// 生成下一次重试请求
    pub fn next_attempt(&self, headers: HeaderSet) -> Self {
        Self {
            url: self.url.clone(),
            headers,
            attempt: self.attempt + 1,
            purpose: self.purpose,
        }
    }
}

/// 抓取失败类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FetchErrorKind {
    /// 网络传输错误
    Transport(String),
    /// 超时
    Timeout,
    /// 非成功的HTTP状态
    HttpStatus(u16),
    /// 页面导航失败
    Navigation(String),
    /// 渲染器不可用
    RendererUnavailable(String),
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Transport(msg) => write!(f, "transport error: {}", msg),
            FetchErrorKind::Timeout => write!(f, "timed out"),
            FetchErrorKind::HttpStatus(code) => write!(f, "http status {}", code),
            FetchErrorKind::Navigation(msg) => write!(f, "navigation failed: {}", msg),
            FetchErrorKind::RendererUnavailable(msg) => write!(f, "renderer unavailable: {}", msg),
        }
    }
}

/// 抓取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub succeeded: bool,
    /// 跳转后的最终地址，风控检测基于此地址
    pub final_url: String,
    pub content: Option<String>,
    pub error_kind: Option<FetchErrorKind>,
}

impl FetchOutcome {
    pub fn success(final_url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            final_url: final_url.into(),
            content: Some(content.into()),
            error_kind: None,
        }
    }

    pub fn failure(final_url: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            succeeded: false,
            final_url: final_url.into(),
            content: None,
            error_kind: Some(kind),
        }
    }
}
