// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingRecord;
use crate::domain::models::report::DiagnosticsSummary;
use std::collections::HashSet;

/// 接收判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptDecision {
    Accepted,
    /// 链接已在本任务中出现过
    Duplicate,
    /// 标题为空或未知
    MissingTitle,
    /// 链接为空
    MissingUrl,
}

impl AcceptDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AcceptDecision::Accepted)
    }
}

/// 去重索引
///
/// 每个任务独占一份，任务开始时为空，任务结束后随任务状态一起丢弃，
/// 不会在任务或数据源之间共享。
#[derive(Debug, Default)]
pub struct DedupeIndex {
    seen_urls: HashSet<String>,
    duplicates: usize,
    missing_mandatory: usize,
}

impl DedupeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 判定并登记一条候选记录
    ///
    /// 检查和插入在同一次调用中完成，被拒绝的记录只计数不报错。
    pub fn accept(&mut self, record: &ListingRecord) -> AcceptDecision {
        if !record.has_title() {
            self.missing_mandatory += 1;
            return AcceptDecision::MissingTitle;
        }
        if record.canonical_url.trim().is_empty() {
            self.missing_mandatory += 1;
            return AcceptDecision::MissingUrl;
        }
        if self.seen_urls.insert(record.canonical_url.clone()) {
            AcceptDecision::Accepted
        } else {
            self.duplicates += 1;
            AcceptDecision::Duplicate
        }
    }

    pub fn contains(&self, canonical_url: &str) -> bool {
        self.seen_urls.contains(canonical_url)
    }

    /// 已接收的链接数
    pub fn len(&self) -> usize {
        self.seen_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_urls.is_empty()
    }

    /// 清空索引和计数
    pub fn clear(&mut self) {
        self.seen_urls.clear();
        self.duplicates = 0;
        self.missing_mandatory = 0;
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn missing_mandatory(&self) -> usize {
        self.missing_mandatory
    }

    /// 写入任务级诊断统计
    pub fn write_stats(&self, summary: &mut DiagnosticsSummary) {
        summary.duplicates = self.duplicates;
        summary.missing_mandatory = self.missing_mandatory;
    }
}
