// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 均值及其样本数
///
/// 只统计已知值，`value` 在没有任何样本时为 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MeanValue {
    pub value: Option<f64>,
    pub samples: usize,
}

impl MeanValue {
    pub fn from_samples<I: IntoIterator<Item = f64>>(samples: I) -> Self {
        let (sum, count) = samples
            .into_iter()
            .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
        Self {
            value: if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            },
            samples: count,
        }
    }
}

/// 户型分布中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBucket {
    pub layout: String,
    pub count: usize,
}

/// 汇总报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// 按总价升序排列，总价未知的排在最后
    pub records: Vec<ListingRecord>,
    pub total_count: usize,
    /// 平均总价（万元）
    pub average_total_price: MeanValue,
    /// 平均单价（元/平方米）
    pub average_unit_price: MeanValue,
    /// 户型分布，按首次出现的顺序排列
    pub layout_distribution: Vec<LayoutBucket>,
}

/// 提取诊断统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiagnosticsSummary {
    /// 识别到的容器数
    pub containers: usize,
    /// 被排除的容器数（非住宅、已结束等）
    pub excluded: usize,
    /// 各字段未命中次数
    pub field_misses: BTreeMap<String, usize>,
    /// 因重复链接被丢弃的记录数
    pub duplicates: usize,
    /// 因缺少标题或链接被丢弃的记录数
    pub missing_mandatory: usize,
}

/// 单个任务的最终报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub source_id: String,
    pub scope_key: String,
    pub pages_completed: u32,
    pub report: AggregateReport,
    pub diagnostics: DiagnosticsSummary,
    pub generated_at: DateTime<Utc>,
}
