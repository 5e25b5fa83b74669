// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::env;

use crate::config::settings::LlmSettings;
use crate::domain::models::listing::ListingRecord;

/// 默认分析指令
pub const DEFAULT_INSTRUCTION: &str = "请根据以下房源数据做一份简要的市场分析：\
整体价格水平、户型构成，并挑出三套性价比最高的房源说明理由。";

/// 单次请求最多携带的记录数
const MAX_RECORDS_IN_PROMPT: usize = 60;

#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// 根据汇总后的记录生成文字分析
    async fn summarize(&self, records: &[ListingRecord], instruction: Option<&str>)
        -> Result<String>;
}

/// LLM摘要服务 - 调用 OpenAI 兼容的 chat completions 接口
///
/// # 配置
///
/// 通过环境变量进行配置：
/// - `LLM_API_KEY` - LLM API密钥
/// - `LLM_MODEL` - 使用的模型名称（默认为 gpt-3.5-turbo）
/// - `LLM_API_BASE_URL` - LLM API基础URL
pub struct LlmSummaryService {
    api_key: Option<String>,
    model: String,
    api_base_url: String,
    client: reqwest::Client,
}

impl Default for LlmSummaryService {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmSummaryService {
    pub fn new() -> Self {
        Self::new_with_config(
            env::var("LLM_API_KEY").ok(),
            env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            env::var("LLM_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        )
    }

    /// 配置文件中的值优先，缺失的项回退到环境变量
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let fallback = Self::new();
        Self::new_with_config(
            settings.api_key.clone().or(fallback.api_key),
            settings.model.clone().unwrap_or(fallback.model),
            settings
                .api_base_url
                .clone()
                .unwrap_or(fallback.api_base_url),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn new_with_config(api_key: Option<String>, model: String, api_base_url: String) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_prompt(records: &[ListingRecord], instruction: &str) -> Result<String> {
        let sample: Vec<Value> = records
            .iter()
            .take(MAX_RECORDS_IN_PROMPT)
            .map(|r| {
                json!({
                    "title": r.title.to_string(),
                    "community": r.community_name.to_string(),
                    "total_price_wan": r.total_price.known(),
                    "unit_price_yuan_per_sqm": r.unit_price.known().map(|u| u.yuan_per_sqm),
                    "layout": r.layout_key(),
                    "area_sqm": r.area_sqm.known(),
                    "region": r.region.to_string(),
                })
            })
            .collect();
        let data = serde_json::to_string(&sample).context("Failed to serialize listings")?;
        Ok(format!(
            "{}\n共 {} 套房源，以下为其中 {} 套（总价单位：万元，单价单位：元/平方米）：\n{}",
            instruction,
            records.len(),
            sample.len(),
            data
        ))
    }
}

#[async_trait]
impl SummaryGenerator for LlmSummaryService {
    async fn summarize(
        &self,
        records: &[ListingRecord],
        instruction: Option<&str>,
    ) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("LLM API key not configured"))?;

        let prompt = Self::build_prompt(records, instruction.unwrap_or(DEFAULT_INSTRUCTION))?;
        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "你是一名房地产市场分析师，回答简洁、基于数据。"
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.3
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "LLM API returned error: {} - {}",
                status,
                error_text
            ));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse LLM API response")?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid response format from LLM API"))
    }
}
