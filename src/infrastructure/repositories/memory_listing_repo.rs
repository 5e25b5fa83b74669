// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingRecord;
use crate::domain::repositories::listing_repository::ListingRepository;
use async_trait::async_trait;
use parking_lot::RwLock;

/// 内存房源仓库
///
/// 数据库未启用时使用，也用于测试。
#[derive(Default)]
pub struct InMemoryListingRepository {
    records: RwLock<Vec<ListingRecord>>,
}

impl InMemoryListingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn upsert(records: &mut Vec<ListingRecord>, record: &ListingRecord) {
        match records.iter_mut().find(|r| {
            r.source_id == record.source_id && r.canonical_url == record.canonical_url
        }) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
    }

    fn select<F: Fn(&ListingRecord) -> bool>(&self, predicate: F) -> Vec<ListingRecord> {
        let mut matched: Vec<ListingRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| match (a.total_price.known(), b.total_price.known()) {
            (Some(x), Some(y)) => x.total_cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        matched
    }
}

#[async_trait]
impl ListingRepository for InMemoryListingRepository {
    async fn store(&self, record: &ListingRecord) -> anyhow::Result<()> {
        Self::upsert(&mut self.records.write(), record);
        Ok(())
    }

    async fn store_batch(&self, records: &[ListingRecord]) -> anyhow::Result<usize> {
        let mut guard = self.records.write();
        for record in records {
            Self::upsert(&mut guard, record);
        }
        Ok(records.len())
    }

    async fn query_by_price_range(&self, min: f64, max: f64) -> anyhow::Result<Vec<ListingRecord>> {
        Ok(self.select(|r| {
            r.total_price
                .known()
                .map(|p| *p >= min && *p <= max)
                .unwrap_or(false)
        }))
    }

    async fn query_by_layout(&self, layout: &str) -> anyhow::Result<Vec<ListingRecord>> {
        Ok(self.select(|r| r.layout.known().map(|l| l.label == layout).unwrap_or(false)))
    }

    async fn query_by_area_range(&self, min: f64, max: f64) -> anyhow::Result<Vec<ListingRecord>> {
        Ok(self.select(|r| {
            r.area_sqm
                .known()
                .map(|a| *a >= min && *a <= max)
                .unwrap_or(false)
        }))
    }

    async fn fetch_all(&self) -> anyhow::Result<Vec<ListingRecord>> {
        Ok(self.select(|_| true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::listing::Field;

    fn record(id: u32, price: f64) -> ListingRecord {
        let mut record = ListingRecord::new("ali", "杭州");
        record.title = Field::Known(format!("拍卖房源{}", id));
        record.canonical_url = format!("https://sf-item.taobao.com/sf_item/{}.htm", id);
        record.total_price = Field::Known(price);
        record
    }

    #[tokio::test]
    async fn test_upsert_and_price_query() {
        let repo = InMemoryListingRepository::new();
        repo.store_batch(&[record(1, 300.0), record(2, 120.0)])
            .await
            .unwrap();
        repo.store(&record(1, 250.0)).await.unwrap();

        let all = repo.fetch_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].total_price, Field::Known(120.0));
        assert_eq!(all[1].total_price, Field::Known(250.0));

        let cheap = repo.query_by_price_range(0.0, 200.0).await.unwrap();
        assert_eq!(cheap.len(), 1);
        assert!(repo.query_by_layout("3室2厅").await.unwrap().is_empty());
    }
}
