// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{coordinator, source, SiteBehavior};
use housecrawl::config::settings::DatabaseSettings;
use housecrawl::domain::repositories::listing_repository::ListingRepository;
use housecrawl::infrastructure::database::connection;
use housecrawl::infrastructure::repositories::listing_repo_impl::ListingRepositoryImpl;
use std::sync::Arc;

async fn sqlite_repository() -> Arc<ListingRepositoryImpl> {
    let settings = DatabaseSettings {
        enabled: true,
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
        min_connections: Some(1),
        connect_timeout: Some(5),
        idle_timeout: None,
    };
    let db = connection::connect_and_migrate(&settings).await.unwrap();
    Arc::new(ListingRepositoryImpl::new(Arc::new(db)))
}

/// 流水线结果写入 SQLite 后可按价格、户型和面积查询
#[tokio::test]
async fn test_pipeline_results_are_queryable_in_database() {
    let repository = sqlite_repository().await;
    let coordinator = coordinator(vec![source("ke", SiteBehavior::Healthy)], repository.clone());

    let submission = coordinator.submit("北京", 2).unwrap();
    for job in submission.jobs {
        job.join().await.unwrap();
    }

    let all = repository.fetch_all().await.unwrap();
    assert_eq!(all.len(), 36);

    let by_price = repository.query_by_price_range(300.0, 350.0).await.unwrap();
    assert_eq!(by_price.len(), 12);
    assert!(by_price
        .windows(2)
        .all(|w| w[0].total_price.known() <= w[1].total_price.known()));

    let three_rooms = repository.query_by_layout("3室2厅").await.unwrap();
    assert_eq!(three_rooms.len(), 12);

    let by_area = repository.query_by_area_range(80.0, 84.0).await.unwrap();
    assert_eq!(by_area.len(), 10);

    // 重复抓取同一范围不会产生重复行
    let submission = coordinator.submit("北京", 2).unwrap();
    for job in submission.jobs {
        job.join().await.unwrap();
    }
    assert_eq!(repository.fetch_all().await.unwrap().len(), 36);
}
