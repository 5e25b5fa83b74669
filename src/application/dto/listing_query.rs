// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// 房源查询参数
///
/// 价格区间、户型和面积区间三选一，都不传时返回全部。
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_ranges"))]
pub struct ListingQueryDto {
    /// 最低总价（万元）
    #[validate(range(min = 0.0))]
    pub min_price: Option<f64>,
    /// 最高总价（万元）
    #[validate(range(min = 0.0))]
    pub max_price: Option<f64>,
    /// 户型标签，如 "3室2厅"
    #[validate(length(min = 1, max = 32))]
    pub layout: Option<String>,
    #[validate(range(min = 0.0))]
    pub min_area: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_area: Option<f64>,
}

fn validate_ranges(query: &ListingQueryDto) -> Result<(), ValidationError> {
    let inverted = |min: Option<f64>, max: Option<f64>| matches!((min, max), (Some(a), Some(b)) if a > b);
    if inverted(query.min_price, query.max_price) || inverted(query.min_area, query.max_area) {
        return Err(ValidationError::new("min_greater_than_max"));
    }
    Ok(())
}

/// 查询条件
#[derive(Debug, Clone, PartialEq)]
pub enum ListingFilter {
    PriceRange(f64, f64),
    Layout(String),
    AreaRange(f64, f64),
    All,
}

impl ListingQueryDto {
    /// 转换为查询条件，缺失的上下界视为不限
    pub fn filter(&self) -> ListingFilter {
        if self.min_price.is_some() || self.max_price.is_some() {
            return ListingFilter::PriceRange(
                self.min_price.unwrap_or(0.0),
                self.max_price.unwrap_or(f64::MAX),
            );
        }
        if let Some(layout) = &self.layout {
            return ListingFilter::Layout(layout.clone());
        }
        if self.min_area.is_some() || self.max_area.is_some() {
            return ListingFilter::AreaRange(
                self.min_area.unwrap_or(0.0),
                self.max_area.unwrap_or(f64::MAX),
            );
        }
        ListingFilter::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_filter_takes_precedence() {
        let query = ListingQueryDto {
            max_price: Some(500.0),
            layout: Some("2室1厅".to_string()),
            ..Default::default()
        };
        assert_eq!(query.filter(), ListingFilter::PriceRange(0.0, 500.0));
    }

    #[test]
    fn test_inverted_range_is_invalid() {
        let query = ListingQueryDto {
            min_area: Some(120.0),
            max_area: Some(60.0),
            ..Default::default()
        };
        assert!(query.validate().is_err());
        assert_eq!(ListingQueryDto::default().filter(), ListingFilter::All);
    }
}
