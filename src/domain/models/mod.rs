// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了抓取流水线的核心数据结构，包括：
/// - 抓取任务（crawl_job）：一次提交针对一个数据源的任务及编排器状态
/// - 抓取请求与结果（fetch）：与渲染器之间交换的数据
/// - 房源记录（listing）：提取出的结构化房源
/// - 提取规则集（rule_set）：每个数据源的声明式提取配置
/// - 汇总报告（report）：排序、均值和户型分布
/// - 生命周期事件（event）：编排器对外发布的有序事件
pub mod crawl_job;
pub mod event;
pub mod fetch;
pub mod listing;
pub mod report;
pub mod rule_set;
