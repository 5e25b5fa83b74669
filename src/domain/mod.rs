// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：房源、提取规则、抓取任务和事件
/// - 仓库接口（repositories）：房源持久化抽象接口
/// - 服务（services）：提取、归一化、反检测调度、去重和汇总
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;
