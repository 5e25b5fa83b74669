// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::fetch::FetchRequest;
use crate::engines::traits::{EngineError, PageRenderer, RenderedPage};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

// One Chrome process is shared to avoid re-launching it for every job.
// Each renderer still gets its own browser context, so cookies never leak between jobs.
static SHARED_BROWSER: Lazy<SharedInstance<Browser>> = Lazy::new(SharedInstance::new);

/// 模拟浏览行为的滚动脚本
const SCROLL_SCRIPTS: [&str; 3] = [
    "window.scrollBy(0, Math.floor(window.innerHeight * 0.6));",
    "window.scrollBy(0, Math.floor(window.innerHeight * 0.8));",
    "window.scrollTo(0, Math.floor(document.body.scrollHeight / 2));",
];

/// 共享实例及其存活标记
struct Live<T> {
    instance: Arc<T>,
    alive: Arc<AtomicBool>,
}

impl<T> Clone for Live<T> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            alive: Arc::clone(&self.alive),
        }
    }
}

impl<T> Live<T> {
    fn new(instance: T) -> Self {
        Self {
            instance: Arc::new(instance),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn clone_status(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }
}

/// 可重建的共享实例
///
/// 实例被标记为失效后，下一次获取时重新创建；仍在使用旧实例的调用方不受影响。
struct SharedInstance<T> {
    slot: Mutex<Option<Live<T>>>,
}

impl<T> SharedInstance<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    async fn get_or_launch<F, Fut>(&self, launch: F) -> Result<Live<T>, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Live<T>, EngineError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(live) = slot.as_ref() {
            if live.is_alive() {
                return Ok(live.clone());
            }
            tracing::warn!("Shared browser connection lost, launching a new one");
        }
        let live = launch().await?;
        *slot = Some(live.clone());
        Ok(live)
    }
}

async fn launch_browser() -> Result<Live<Browser>, EngineError> {
    let remote_debugging_url = std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL").ok();

    let (browser, mut handler) = if let Some(ref url) = remote_debugging_url {
        tracing::info!("Connecting to remote Chrome instance at: {}", url);
        Browser::connect(url).await.map_err(|e| {
            EngineError::Browser(format!("Failed to connect to remote Chrome: {}", e))
        })?
    } else {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(30))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(EngineError::Browser)?;

        Browser::launch(config)
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?
    };

    let live = Live::new(browser);
    let status = live.clone_status();
    // The browser is unusable once its event handler stops
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::warn!("Browser handler stopped: {}", e);
                break;
            }
        }
        status.store(false, Ordering::SeqCst);
    });

    Ok(live)
}

/// 一个渲染器独占的浏览器会话：独立的浏览器上下文和其中的一个标签页
struct BrowserSession {
    browser: Live<Browser>,
    context: BrowserContextId,
    page: Page,
}

impl BrowserSession {
    async fn open() -> Result<Self, EngineError> {
        let browser = SHARED_BROWSER.get_or_launch(launch_browser).await?;
        let context = browser
            .instance
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?
            .result
            .browser_context_id;

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context.clone());
        match browser.instance.new_page(target).await {
            Ok(page) => Ok(Self {
                browser,
                context,
                page,
            }),
            Err(e) => {
                if let Err(dispose) = browser
                    .instance
                    .execute(DisposeBrowserContextParams::new(context))
                    .await
                {
                    tracing::debug!("Failed to dispose browser context: {}", dispose);
                }
                Err(EngineError::Browser(e.to_string()))
            }
        }
    }

    async fn close(self) {
        if let Err(e) = self.page.close().await {
            tracing::debug!("Failed to close browser tab: {}", e);
        }
        if self.browser.is_alive() {
            if let Err(e) = self
                .browser
                .instance
                .execute(DisposeBrowserContextParams::new(self.context))
                .await
            {
                tracing::debug!("Failed to dispose browser context: {}", e);
            }
        }
    }
}

/// 浏览器渲染器
///
/// 基于chromiumoxide，执行页面脚本。每个实例独占一个浏览器上下文和其中的标签页，
/// 在首次抓取时创建并在整个任务内复用以保持会话；不同实例之间不共享 cookie。
pub struct BrowserRenderer {
    session: Mutex<Option<BrowserSession>>,
    simulate_scrolling: bool,
}

impl Default for BrowserRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl BrowserRenderer {
    pub fn new(simulate_scrolling: bool) -> Self {
        Self {
            session: Mutex::new(None),
            simulate_scrolling,
        }
    }

    async fn apply_headers(page: &Page, request: &FetchRequest) -> Result<(), EngineError> {
        let mut extra = Map::new();
        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case("user-agent") {
                page.set_user_agent(value.as_str())
                    .await
                    .map_err(|e| EngineError::Browser(e.to_string()))?;
            } else {
                extra.insert(name.clone(), Value::String(value.clone()));
            }
        }

        if !extra.is_empty() {
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(Value::Object(
                extra,
            ))))
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;
        }
        Ok(())
    }

    async fn simulate_browsing(page: &Page) {
        for script in SCROLL_SCRIPTS {
            if let Err(e) = page.evaluate(script).await {
                tracing::debug!("Scroll script skipped: {}", e);
                return;
            }
            let pause = rand::random_range(300..=900);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }

    async fn read_page(page: &Page, fallback_url: &str) -> Result<RenderedPage, EngineError> {
        let final_url = page
            .url()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?
            .unwrap_or_else(|| fallback_url.to_string());
        let content = page
            .content()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        Ok(RenderedPage {
            final_url,
            // Chromiumoxide goto returns Page, not the main document response
            status_code: 200,
            content,
        })
    }
}

#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn fetch(&self, request: &FetchRequest) -> Result<RenderedPage, EngineError> {
        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(|session| !session.browser.is_alive()) {
            tracing::warn!("Browser session lost, opening a new one");
            *slot = None;
        }
        if slot.is_none() {
            *slot = Some(BrowserSession::open().await?);
        }
        let page = &slot
            .as_ref()
            .ok_or_else(|| EngineError::Browser("browser tab not initialized".to_string()))?
            .page;

        Self::apply_headers(page, request).await?;

        // goto waits for the load event by default
        page.goto(request.url.as_str())
            .await
            .map_err(|e| EngineError::Other(e.to_string()))?;

        if self.simulate_scrolling {
            Self::simulate_browsing(page).await;
        }

        Self::read_page(page, &request.url).await
    }

    async fn snapshot(&self) -> Result<Option<RenderedPage>, EngineError> {
        let slot = self.session.lock().await;
        match slot.as_ref() {
            Some(session) => Ok(Some(Self::read_page(&session.page, "about:blank").await?)),
            None => Ok(None),
        }
    }

    async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.close().await;
        }
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
