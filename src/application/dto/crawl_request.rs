// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

fn default_pages() -> i64 {
    1
}

/// 抓取提交请求
///
/// 页数不做范围校验，越界时由协调器截断。
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CrawlRequestDto {
    #[validate(length(min = 1, max = 64, message = "Scope cannot be empty"))]
    pub scope: String,
    #[serde(default = "default_pages")]
    pub pages: i64,
}

/// 已创建的任务
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JobRefDto {
    pub job_id: Uuid,
    pub source_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CrawlAcceptedDto {
    pub jobs: Vec<JobRefDto>,
}

/// 报告摘要请求，不传指令时使用默认的市场分析指令
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct SummaryRequestDto {
    #[validate(length(max = 2000))]
    pub instruction: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SummaryResponseDto {
    pub job_id: Uuid,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_default_to_one() {
        let dto: CrawlRequestDto = serde_json::from_str(r#"{"scope":"北京"}"#).unwrap();
        assert_eq!(dto.pages, 1);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_empty_scope_is_invalid() {
        let dto = CrawlRequestDto {
            scope: String::new(),
            pages: 3,
        };
        assert!(dto.validate().is_err());
    }
}
