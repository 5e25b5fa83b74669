// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 请求DTO、任务登记表和用例
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 房源模型、提取规则、反检测调度、去重汇总和仓库接口
pub mod domain;

/// 引擎模块
///
/// 页面渲染器及抓取网关
pub mod engines;

/// 基础设施模块
///
/// 数据库、仓库实现和指标
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 工具模块
///
/// 错误类型、重试策略、日志初始化和URL工具
pub mod utils;

/// 工作器模块
///
/// 抓取编排器和多数据源协调器
pub mod workers;
