// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 配置错误
///
/// 规则集缺失或无效时在提交阶段同步返回，不会发起任何抓取。
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("读取配置文件失败 {path}: {message}")]
    Io { path: String, message: String },

    #[error("解析规则集失败: {0}")]
    Parse(String),

    #[error("字段 {field} 的正则表达式无效: {message}")]
    InvalidRegex { field: String, message: String },

    #[error("字段 {field} 的CSS选择器无效: {css}")]
    InvalidSelector { field: String, css: String },

    #[error("缺少必需的字段提取器: {0}")]
    MissingExtractor(String),

    #[error("数据源 {0} 没有可用的提取规则集")]
    MissingRuleSet(String),

    #[error("数据源 {source_id} 不支持抓取范围 {scope}")]
    UnsupportedScope { source_id: String, scope: String },

    #[error("无效配置: {0}")]
    Invalid(String),
}

/// 流水线错误
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("配置错误: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("数据源 {0} 的编排器已有正在运行的任务")]
    JobAlreadyRunning(String),

    #[error("没有启用的数据源")]
    NoSources,
}

/// 仓库层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("数据库错误: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}
