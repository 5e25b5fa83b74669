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

use crate::domain::models::crawl_job::DEFAULT_MAX_PAGES;
use crate::domain::services::anti_detection_service::{PacingProfile, DEFAULT_RISK_MARKERS};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 指标导出配置
    pub metrics: MetricsSettings,
    /// 流水线参数
    pub pipeline: PipelineSettings,
    /// 全局节奏配置，数据源可单独覆盖
    #[serde(default)]
    pub pacing: PacingProfile,
    /// 风控识别配置
    pub risk: RiskSettings,
    /// 文本生成服务配置
    #[serde(default)]
    pub llm: LlmSettings,
    /// 任务视图保留策略
    #[serde(default)]
    pub registry: RegistrySettings,
    /// 数据源列表
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 关闭时使用内存仓库
    pub enabled: bool,
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 指标导出配置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_address: String,
}

/// 流水线参数
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// 单次提交允许的最大页数
    pub max_pages: u32,
    /// 单页最大尝试次数
    pub max_attempts: u32,
    /// 首次重试退避（毫秒）
    pub retry_initial_backoff_ms: u64,
    /// 最大重试退避（毫秒）
    pub retry_max_backoff_ms: u64,
    /// 单次抓取超时（秒）
    pub fetch_timeout_secs: u64,
}

impl PipelineSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// 风控识别配置
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSettings {
    /// 目标地址中出现即视为风控页面的关键字
    pub markers: Vec<String>,
}

/// LLM配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_base_url: Option<String>,
}

/// 任务视图保留策略
///
/// 已结束任务的视图携带完整报告，超过保留时长或数量上限后被清理。
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    /// 已结束任务的保留时长（秒）
    #[serde(default = "default_finished_ttl_secs")]
    pub finished_ttl_secs: u64,
    /// 最多保留的已结束任务数
    #[serde(default = "default_max_finished_jobs")]
    pub max_finished_jobs: usize,
    /// 后台清理间隔（秒）
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_finished_ttl_secs() -> u64 {
    3600
}

fn default_max_finished_jobs() -> usize {
    200
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            finished_ttl_secs: default_finished_ttl_secs(),
            max_finished_jobs: default_max_finished_jobs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RegistrySettings {
    pub fn finished_ttl(&self) -> Duration {
        Duration::from_secs(self.finished_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// 渲染器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// 浏览器渲染，执行页面脚本
    #[default]
    Browser,
    /// 静态HTTP请求
    Http,
}

fn default_true() -> bool {
    true
}

/// 数据源配置
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    /// 数据源标识，须与规则集中的 source_id 一致
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 提取规则集文件（YAML 或 JSON）
    pub rules_path: String,
    /// Cookie 文件，启动时读取一次
    #[serde(default)]
    pub cookie_path: Option<String>,
    #[serde(default)]
    pub renderer: RendererKind,
    /// 覆盖规则集中的 Referer
    #[serde(default)]
    pub referer: Option<String>,
    /// 为空时使用内置UA池
    #[serde(default)]
    pub user_agents: Vec<String>,
    /// 追加的风控标记
    #[serde(default)]
    pub risk_markers: Vec<String>,
    /// 覆盖全局节奏配置
    #[serde(default)]
    pub pacing: Option<PacingProfile>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `HOUSECRAWL__` 前缀的环境变量
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::load_from("config", &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &str, env: &str) -> Result<Self, ConfigError> {
        let default_markers: Vec<String> =
            DEFAULT_RISK_MARKERS.iter().map(|m| m.to_string()).collect();

        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default DB settings
            .set_default("database.enabled", false)?
            .set_default("database.url", "sqlite://housecrawl.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default metrics settings
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen_address", "0.0.0.0:9000")?
            // Default pipeline settings
            .set_default("pipeline.max_pages", i64::from(DEFAULT_MAX_PAGES))?
            .set_default("pipeline.max_attempts", 3)?
            .set_default("pipeline.retry_initial_backoff_ms", 2000)?
            .set_default("pipeline.retry_max_backoff_ms", 60000)?
            .set_default("pipeline.fetch_timeout_secs", 60)?
            .set_default("risk.markers", default_markers)?
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, env)).required(false))
            .add_source(
                Environment::with_prefix("HOUSECRAWL")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 已启用的数据源
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceSettings> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
