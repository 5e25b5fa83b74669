// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 抓取任务的执行层：
/// - 编排器（orchestrator）：单个数据源的抓取状态机
/// - 协调器（coordinator）：把一次提交分发给所有数据源
/// - 事件出口（event_sink）：为任务事件编号并发送
pub mod coordinator;
pub mod event_sink;
pub mod orchestrator;

pub use coordinator::{MultiSourceCoordinator, SourcePipeline, Submission};
pub use orchestrator::{CrawlOrchestrator, JobHandle, JobOutcome};
