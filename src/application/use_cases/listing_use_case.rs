// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::listing_query::{ListingFilter, ListingQueryDto};
use crate::domain::models::listing::ListingRecord;
use crate::domain::repositories::listing_repository::ListingRepository;
use anyhow::Result;
use std::sync::Arc;

/// 房源查询用例
pub struct ListingUseCase {
    repository: Arc<dyn ListingRepository>,
}

impl ListingUseCase {
    pub fn new(repository: Arc<dyn ListingRepository>) -> Self {
        Self { repository }
    }

    pub async fn query(&self, query: &ListingQueryDto) -> Result<Vec<ListingRecord>> {
        match query.filter() {
            ListingFilter::PriceRange(min, max) => self.repository.query_by_price_range(min, max).await,
            ListingFilter::Layout(layout) => self.repository.query_by_layout(&layout).await,
            ListingFilter::AreaRange(min, max) => self.repository.query_by_area_range(min, max).await,
            ListingFilter::All => self.repository.fetch_all().await,
        }
    }
}
