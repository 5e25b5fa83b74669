// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{coordinator, source, SiteBehavior};
use housecrawl::domain::models::event::{EventKind, LifecycleEvent};
use housecrawl::domain::models::report::JobReport;
use housecrawl::domain::repositories::listing_repository::ListingRepository;
use housecrawl::infrastructure::repositories::memory_listing_repo::InMemoryListingRepository;
use housecrawl::workers::{JobOutcome, Submission};
use std::collections::HashSet;
use std::sync::Arc;

const EXCLUSION_KEYWORDS: [&str; 4] = ["车位", "店面", "商铺", "写字楼"];

async fn run(submission: Submission) -> (Vec<JobOutcome>, Vec<LifecycleEvent>) {
    let Submission { jobs, mut events, .. } = submission;
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        collected.push(event);
    }
    let mut outcomes = Vec::new();
    for job in jobs {
        outcomes.push(job.join().await.unwrap());
    }
    (outcomes, collected)
}

fn completed(outcome: &JobOutcome) -> &JobReport {
    outcome.report().expect("job should complete")
}

#[tokio::test]
async fn test_two_pages_yield_36_unique_residential_listings() {
    let repository = Arc::new(InMemoryListingRepository::new());
    let coordinator = coordinator(vec![source("ke", SiteBehavior::Healthy)], repository.clone());

    let (outcomes, events) = run(coordinator.submit("北京", 2).unwrap()).await;
    let job = completed(&outcomes[0]);
    let report = &job.report;

    assert_eq!(report.total_count, 36);
    assert_eq!(report.records.len(), 36);

    let urls: HashSet<&str> = report
        .records
        .iter()
        .map(|r| r.canonical_url.as_str())
        .collect();
    assert_eq!(urls.len(), 36);
    assert!(urls.iter().all(|u| u.starts_with("https://bj.ke.com/ershoufang/")));
    assert!(urls.iter().all(|u| !u.contains('?')));

    for record in &report.records {
        let title = record.title.known().unwrap();
        assert!(EXCLUSION_KEYWORDS.iter().all(|k| !title.contains(k)));
        assert_eq!(record.community_name.known().map(String::as_str), Some("阳光花园"));
    }

    let prices: Vec<f64> = report
        .records
        .iter()
        .filter_map(|r| r.total_price.known().copied())
        .collect();
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));

    // 每页 200..=370 步长 10，两页相同
    let expected_mean = (0..18).map(|i| 200.0 + 10.0 * i as f64).sum::<f64>() / 18.0;
    assert_eq!(report.average_total_price.samples, 36);
    let mean = report.average_total_price.value.unwrap();
    assert!((mean - expected_mean).abs() < 1e-9);
    assert_eq!(report.average_unit_price.samples, 36);

    let layouts: Vec<(&str, usize)> = report
        .layout_distribution
        .iter()
        .map(|b| (b.layout.as_str(), b.count))
        .collect();
    assert_eq!(layouts.iter().map(|(_, c)| c).sum::<usize>(), 36);
    assert!(layouts.contains(&("3室2厅", 12)));
    assert!(layouts.contains(&("2室1厅", 24)));

    assert_eq!(job.diagnostics.containers, 40);
    assert_eq!(job.diagnostics.excluded, 4);
    assert_eq!(job.diagnostics.duplicates, 0);

    assert_eq!(events.iter().filter(|e| e.kind() == EventKind::RecordFound).count(), 36);
    assert_eq!(repository.fetch_all().await.unwrap().len(), 36);
}

#[tokio::test]
async fn test_out_of_range_page_counts_are_clamped() {
    let repository = Arc::new(InMemoryListingRepository::new());
    let coordinator = coordinator(vec![source("ke", SiteBehavior::Healthy)], repository);

    let (zero, _) = run(coordinator.submit("北京", 0).unwrap()).await;
    let (one, _) = run(coordinator.submit("北京", 1).unwrap()).await;
    assert_eq!(completed(&zero[0]).pages_completed, 1);
    assert_eq!(
        completed(&zero[0]).report.total_count,
        completed(&one[0]).report.total_count
    );

    let (many, _) = run(coordinator.submit("北京", 99).unwrap()).await;
    let (max, _) = run(coordinator.submit("北京", 5).unwrap()).await;
    assert_eq!(completed(&many[0]).pages_completed, 5);
    assert_eq!(
        completed(&many[0]).report.total_count,
        completed(&max[0]).report.total_count
    );
    assert_eq!(completed(&max[0]).report.total_count, 90);
}

#[tokio::test]
async fn test_aggregating_report_again_keeps_order() {
    use housecrawl::domain::services::aggregation_service::AggregationService;

    let repository = Arc::new(InMemoryListingRepository::new());
    let coordinator = coordinator(vec![source("ke", SiteBehavior::Healthy)], repository);
    let (outcomes, _) = run(coordinator.submit("北京", 2).unwrap()).await;
    let report = completed(&outcomes[0]).report.clone();

    let again = AggregationService::aggregate(report.records.clone());
    assert_eq!(again.records, report.records);
    assert_eq!(again.layout_distribution, report.layout_distribution);
}

#[tokio::test]
async fn test_risk_block_is_isolated_per_source() {
    let repository = Arc::new(InMemoryListingRepository::new());
    let coordinator = coordinator(
        vec![
            source("ke", SiteBehavior::Captcha),
            source("ke_backup", SiteBehavior::Healthy),
        ],
        repository.clone(),
    );

    let (outcomes, events) = run(coordinator.submit("北京", 2).unwrap()).await;

    assert!(matches!(outcomes[0], JobOutcome::Blocked { .. }));
    assert_eq!(completed(&outcomes[1]).report.total_count, 36);

    let blocked: Vec<&LifecycleEvent> = events
        .iter()
        .filter(|e| e.kind() == EventKind::Blocked)
        .collect();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].source_id, "ke");
    assert!(events
        .iter()
        .filter(|e| e.source_id == "ke")
        .all(|e| e.kind() != EventKind::RecordFound));

    // 只有未被拦截的数据源入库
    let stored = repository.fetch_all().await.unwrap();
    assert_eq!(stored.len(), 36);
    assert!(stored.iter().all(|r| r.source_id == "ke_backup"));
}
