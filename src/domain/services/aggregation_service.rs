// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingRecord;
use crate::domain::models::report::{AggregateReport, LayoutBucket, MeanValue};
use std::cmp::Ordering;
use std::collections::HashMap;

/// 汇总服务
pub struct AggregationService;

impl AggregationService {
    /// 生成汇总报告
    ///
    /// 记录按总价稳定升序排列，总价未知的排在最后但不会被剔除；
    /// 均值只统计已知样本；户型分布按首次出现的顺序记录，键为原始户型文本。
    pub fn aggregate(records: Vec<ListingRecord>) -> AggregateReport {
        let mut layout_distribution: Vec<LayoutBucket> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in &records {
            let key = record.layout_key();
            match positions.get(&key) {
                Some(&pos) => layout_distribution[pos].count += 1,
                None => {
                    positions.insert(key.clone(), layout_distribution.len());
                    layout_distribution.push(LayoutBucket {
                        layout: key,
                        count: 1,
                    });
                }
            }
        }

        let average_total_price =
            MeanValue::from_samples(records.iter().filter_map(|r| r.total_price.known().copied()));
        let average_unit_price = MeanValue::from_samples(
            records
                .iter()
                .filter_map(|r| r.unit_price.known().map(|u| u.yuan_per_sqm)),
        );

        let mut records = records;
        records.sort_by(compare_by_total_price);

        AggregateReport {
            total_count: records.len(),
            records,
            average_total_price,
            average_unit_price,
            layout_distribution,
        }
    }
}

/// 已知总价升序，未知总价视为最大
fn compare_by_total_price(a: &ListingRecord, b: &ListingRecord) -> Ordering {
    match (a.total_price.known(), b.total_price.known()) {
        (Some(x), Some(y)) => x.total_cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::listing::{Field, Layout, UnitPrice};

    fn record(id: usize, price: Option<f64>, layout: Option<&str>) -> ListingRecord {
        let mut record = ListingRecord::new("ke", "北京");
        record.title = Field::Known(format!("房源{}", id));
        record.canonical_url = format!("https://bj.ke.com/ershoufang/{}.html", id);
        record.total_price = price.into();
        record.layout = layout
            .map(|label| Layout {
                bedrooms: 2,
                living_rooms: 1,
                label: label.to_string(),
            })
            .into();
        record
    }

    #[test]
    fn test_sort_puts_unknown_prices_last() {
        let report = AggregationService::aggregate(vec![
            record(1, Some(300.0), Some("2室1厅")),
            record(2, None, Some("2室1厅")),
            record(3, Some(120.0), Some("1室1厅")),
            record(4, None, None),
            record(5, Some(560.0), Some("3室2厅")),
        ]);

        let order: Vec<&str> = report
            .records
            .iter()
            .map(|r| r.canonical_url.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "https://bj.ke.com/ershoufang/3.html",
                "https://bj.ke.com/ershoufang/1.html",
                "https://bj.ke.com/ershoufang/5.html",
                "https://bj.ke.com/ershoufang/2.html",
                "https://bj.ke.com/ershoufang/4.html",
            ]
        );
        assert_eq!(report.total_count, 5);
    }

    #[test]
    fn test_means_use_known_samples_only() {
        let mut with_unit = record(1, Some(300.0), None);
        with_unit.unit_price = Field::Known(UnitPrice::direct(50000.0));
        let mut derived = record(2, Some(100.0), None);
        derived.unit_price = Field::Known(UnitPrice::derived(20000.0));

        let report = AggregationService::aggregate(vec![with_unit, derived, record(3, None, None)]);

        assert_eq!(report.average_total_price.value, Some(200.0));
        assert_eq!(report.average_total_price.samples, 2);
        assert_eq!(report.average_unit_price.value, Some(35000.0));
        assert_eq!(report.average_unit_price.samples, 2);
    }

    #[test]
    fn test_layout_distribution_keeps_insertion_order() {
        let report = AggregationService::aggregate(vec![
            record(1, Some(500.0), Some("3室2厅")),
            record(2, Some(100.0), Some("1室1厅")),
            record(3, Some(300.0), Some("3室2厅")),
            record(4, Some(200.0), Some("3室1厅")),
        ]);

        let buckets: Vec<(&str, usize)> = report
            .layout_distribution
            .iter()
            .map(|b| (b.layout.as_str(), b.count))
            .collect();
        assert_eq!(buckets, vec![("3室2厅", 2), ("1室1厅", 1), ("3室1厅", 1)]);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let records = vec![
            record(1, Some(300.0), None),
            record(2, None, None),
            record(3, Some(300.0), None),
            record(4, Some(120.0), None),
            record(5, None, None),
        ];
        let first = AggregationService::aggregate(records);
        let second = AggregationService::aggregate(first.records.clone());
        assert_eq!(first.records, second.records);
        assert_eq!(first.average_total_price, second.average_total_price);
    }

    #[test]
    fn test_empty_input() {
        let report = AggregationService::aggregate(Vec::new());
        assert_eq!(report.total_count, 0);
        assert_eq!(report.average_total_price.value, None);
        assert!(report.layout_distribution.is_empty());
    }
}
