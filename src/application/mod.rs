// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 连接表示层与抓取流水线：请求DTO、任务登记表和用例
pub mod dto;
pub mod job_registry;
pub mod use_cases;
