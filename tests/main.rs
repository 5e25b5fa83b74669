// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 测试主模块
///
/// 集成测试覆盖 HTTP 接口和完整的抓取流水线，单元测试覆盖公开的领域接口
mod integration;

// === Unit Tests ===
mod unit;
