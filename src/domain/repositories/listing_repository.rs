// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingRecord;
use anyhow::Result;
use async_trait::async_trait;

/// 房源记录仓库特质
///
/// 同一数据源下以规范链接为唯一键，重复写入会覆盖旧记录。
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// 保存单条记录
    async fn store(&self, record: &ListingRecord) -> Result<()>;

    /// 批量保存，返回写入条数
    async fn store_batch(&self, records: &[ListingRecord]) -> Result<usize>;

    /// 按总价区间（万元，闭区间）查询
    async fn query_by_price_range(&self, min: f64, max: f64) -> Result<Vec<ListingRecord>>;

    /// 按户型文本精确查询
    async fn query_by_layout(&self, layout: &str) -> Result<Vec<ListingRecord>>;

    /// 按面积区间（平方米，闭区间）查询
    async fn query_by_area_range(&self, min: f64, max: f64) -> Result<Vec<ListingRecord>>;

    async fn fetch_all(&self) -> Result<Vec<ListingRecord>>;
}
