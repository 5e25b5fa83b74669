// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 数据库（database）：连接池、迁移和实体映射
/// - 指标（metrics）：Prometheus 指标的注册和导出
/// - 仓库实现（repositories）：房源仓库的数据库和内存实现
///
/// 基础设施层依赖领域层的抽象接口，领域层不感知具体的存储技术。
pub mod database;
pub mod metrics;
pub mod repositories;
