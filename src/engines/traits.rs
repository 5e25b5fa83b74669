// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::fetch::{FetchErrorKind, FetchRequest};
use async_trait::async_trait;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 浏览器启动或页面操作失败
    #[error("Browser error: {0}")]
    Browser(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::Timeout => true,
            EngineError::Browser(_) => true,
            EngineError::Other(_) => false,
        }
    }

    /// 归类为抓取结果中的错误类型
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            EngineError::RequestFailed(e) if e.is_timeout() => FetchErrorKind::Timeout,
            EngineError::RequestFailed(e) => match e.status() {
                Some(status) => FetchErrorKind::HttpStatus(status.as_u16()),
                None => FetchErrorKind::Transport(e.to_string()),
            },
            EngineError::Timeout => FetchErrorKind::Timeout,
            EngineError::Browser(msg) => FetchErrorKind::RendererUnavailable(msg.clone()),
            EngineError::Other(msg) => FetchErrorKind::Navigation(msg.clone()),
        }
    }
}

/// 渲染后的页面
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 跳转后的最终地址
    pub final_url: String,
    /// HTTP状态码，浏览器渲染时固定为200
    pub status_code: u16,
    pub content: String,
}

/// 页面渲染能力
///
/// 每个实例只服务一个任务，任务内的请求严格串行，
/// 因此实现可以在多次调用之间保留会话状态（cookie、浏览器标签页）。
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// 加载页面
    async fn fetch(&self, request: &FetchRequest) -> Result<RenderedPage, EngineError>;

    /// 重新读取当前页面
    ///
    /// 用于渲染等待结束后获取脚本填充完的内容；静态渲染器返回 `None`。
    async fn snapshot(&self) -> Result<Option<RenderedPage>, EngineError> {
        Ok(None)
    }

    /// 释放会话资源
    async fn close(&self) {}

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 渲染器工厂
///
/// 协调器为每个任务创建一个新的渲染器，数据源之间不共享会话。
pub trait RendererFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn PageRenderer>, EngineError>;
}

impl<F> RendererFactory for F
where
    F: Fn() -> Result<Box<dyn PageRenderer>, EngineError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn PageRenderer>, EngineError> {
        self()
    }
}
