// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::fetch::{FetchErrorKind, FetchOutcome, FetchRequest};
use crate::engines::traits::PageRenderer;
use crate::infrastructure::metrics::{FETCH_DURATION, FETCH_FAILURES, PAGES_FETCHED};
use metrics::{counter, histogram};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 页面抓取网关
///
/// 包装一个渲染器实例，把渲染结果统一成 [`FetchOutcome`]。
/// 网关由单个任务独占，`fetch` 需要 `&mut self`，同一时刻最多一个导航在进行。
pub struct PageFetchGateway {
    source_id: String,
    renderer: Box<dyn PageRenderer>,
    timeout: Duration,
}

impl PageFetchGateway {
    pub fn new(
        source_id: impl Into<String>,
        renderer: Box<dyn PageRenderer>,
        timeout: Duration,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            renderer,
            timeout,
        }
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// 发起一次抓取
    ///
    /// 渲染器错误、超时和非 2xx 状态都会变成失败结果，不会向上传播。
    pub async fn fetch(&mut self, request: &FetchRequest) -> FetchOutcome {
        let start = Instant::now();
        counter!(PAGES_FETCHED, "source" => self.source_id.clone()).increment(1);

        let outcome = match tokio::time::timeout(self.timeout, self.renderer.fetch(request)).await
        {
            Err(_) => FetchOutcome::failure(&request.url, FetchErrorKind::Timeout),
            Ok(Err(e)) => {
                debug!(url = %request.url, error = %e, retryable = e.is_retryable(), "Renderer error");
                FetchOutcome::failure(&request.url, e.kind())
            }
            Ok(Ok(page)) if !(200..300).contains(&page.status_code) => FetchOutcome::failure(
                page.final_url,
                FetchErrorKind::HttpStatus(page.status_code),
            ),
            Ok(Ok(page)) => FetchOutcome::success(page.final_url, page.content),
        };

        histogram!(FETCH_DURATION, "source" => self.source_id.clone())
            .record(start.elapsed().as_secs_f64());
        if !outcome.succeeded {
            counter!(FETCH_FAILURES, "source" => self.source_id.clone()).increment(1);
        }
        outcome
    }

    /// 渲染等待结束后重新读取页面
    ///
    /// 渲染器不支持或读取失败时沿用抓取时的内容。
    pub async fn settle(&mut self, fetched: FetchOutcome) -> FetchOutcome {
        match tokio::time::timeout(self.timeout, self.renderer.snapshot()).await {
            Ok(Ok(Some(page))) => FetchOutcome::success(page.final_url, page.content),
            Ok(Ok(None)) => fetched,
            Ok(Err(e)) => {
                warn!(url = %fetched.final_url, error = %e, "Failed to re-read settled page, using fetched content");
                fetched
            }
            Err(_) => {
                warn!(url = %fetched.final_url, "Timed out re-reading settled page, using fetched content");
                fetched
            }
        }
    }

    /// 结束会话
    pub async fn close(&mut self) {
        self.renderer.close().await;
    }
}
