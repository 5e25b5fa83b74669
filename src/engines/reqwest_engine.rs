// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::fetch::FetchRequest;
use crate::engines::traits::{EngineError, PageRenderer, RenderedPage};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, Instant};

/// 静态HTTP渲染器
///
/// 基于reqwest，不执行页面脚本。每个实例持有独立的 cookie 存储，
/// 引导请求拿到的会话 cookie 会在后续翻页中继续携带。
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn fetch(&self, request: &FetchRequest) -> Result<RenderedPage, EngineError> {
        let mut headers = HeaderMap::new();
        for (k, v) in &request.headers {
            if let (Ok(k), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(k, v);
            }
        }

        let start = Instant::now();
        let response = self.client.get(&request.url).headers(headers).send().await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content = response.text().await?;

        tracing::debug!(
            url = %request.url,
            final_url = %final_url,
            status_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "HTTP page fetched"
        );

        Ok(RenderedPage {
            final_url,
            status_code,
            content,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
