// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 反检测调度（anti_detection_service）：请求头、节奏延迟与风控识别
/// - 字段提取（extraction_service）：按规则集把页面切分为房源记录
/// - 字段归一化（normalization）：价格、面积、户型等文本的解析
/// - 去重（dedup_service）与汇总（aggregation_service）
/// - 文本生成（llm_service）：基于汇总记录的市场分析
pub mod aggregation_service;
pub mod anti_detection_service;
pub mod dedup_service;
pub mod extraction_service;
pub mod llm_service;
pub mod normalization;
