// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, source, SiteBehavior};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::time::Duration;

/// 轮询任务直到进入终止状态
async fn wait_for_terminal(server: &TestServer, job_id: &str) -> Value {
    for _ in 0..500 {
        let view: Value = server.get(&format!("/v1/crawl/{}", job_id)).await.json();
        let state = view["state"].as_str().unwrap_or_default().to_string();
        if ["completed", "risk_blocked", "fetch_exhausted", "cancelled"].contains(&state.as_str()) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}

fn job_ids(body: &Value) -> Vec<(String, String)> {
    body["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| {
            (
                j["job_id"].as_str().unwrap().to_string(),
                j["source_id"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

/// 提交两页抓取，完成后报告、入库和摘要都可用
#[tokio::test]
async fn test_crawl_lifecycle_over_http() {
    let app = create_test_app(vec![source("ke", SiteBehavior::Healthy)]);

    let response = app
        .server
        .post("/v1/crawl")
        .json(&json!({ "scope": "北京", "pages": 2 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let jobs = job_ids(&response.json());
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].1, "ke");

    let view = wait_for_terminal(&app.server, &jobs[0].0).await;
    assert_eq!(view["state"], "completed");
    assert_eq!(view["percent"], 100);
    assert_eq!(view["records_found"], 36);
    assert_eq!(view["report"]["report"]["total_count"], 36);
    assert_eq!(view["report"]["pages_completed"], 2);
    assert_eq!(view["report"]["diagnostics"]["excluded"], 4);

    let listings: Value = app.server.get("/v1/listings").await.json();
    assert_eq!(listings.as_array().unwrap().len(), 36);

    let cheap: Value = app
        .server
        .get("/v1/listings")
        .add_query_param("max_price", 250)
        .await
        .json();
    // 每页 200、210 … 250 共 6 套
    assert_eq!(cheap.as_array().unwrap().len(), 12);

    let summary = app
        .server
        .post(&format!("/v1/crawl/{}/summary", jobs[0].0))
        .json(&json!({ "instruction": "只看三居" }))
        .await;
    assert_eq!(summary.status_code(), StatusCode::OK);
    let summary: Value = summary.json();
    assert_eq!(summary["summary"], "36套房源；只看三居");

    let default_summary = app
        .server
        .post(&format!("/v1/crawl/{}/summary", jobs[0].0))
        .await;
    assert_eq!(default_summary.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_empty_scope_is_rejected() {
    let app = create_test_app(vec![source("ke", SiteBehavior::Healthy)]);

    let response = app
        .server
        .post("/v1/crawl")
        .json(&json!({ "scope": "", "pages": 2 }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_scope_is_rejected_synchronously() {
    let app = create_test_app(vec![source("ke", SiteBehavior::Healthy)]);

    let response = app
        .server
        .post("/v1/crawl")
        .json(&json!({ "scope": "火星#1", "pages": 1 }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("火星#1"));
    assert!(app.repository.is_empty());
}

#[tokio::test]
async fn test_no_sources_is_unavailable() {
    let app = create_test_app(vec![]);

    let response = app
        .server
        .post("/v1/crawl")
        .json(&json!({ "scope": "北京" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_cancel_running_job() {
    let app = create_test_app(vec![source("ke", SiteBehavior::Stall)]);

    let response = app
        .server
        .post("/v1/crawl")
        .json(&json!({ "scope": "北京", "pages": 3 }))
        .await;
    let jobs = job_ids(&response.json());

    let summary = app
        .server
        .post(&format!("/v1/crawl/{}/summary", jobs[0].0))
        .expect_failure()
        .await;
    assert_eq!(summary.status_code(), StatusCode::CONFLICT);

    let cancel = app.server.delete(&format!("/v1/crawl/{}", jobs[0].0)).await;
    assert_eq!(cancel.status_code(), StatusCode::NO_CONTENT);

    let view = wait_for_terminal(&app.server, &jobs[0].0).await;
    assert_eq!(view["state"], "cancelled");
    assert_eq!(view["failure"]["reason"], "cancelled");
}

#[tokio::test]
async fn test_blocked_job_reports_url() {
    let app = create_test_app(vec![
        source("ke", SiteBehavior::Captcha),
        source("ke_backup", SiteBehavior::Healthy),
    ]);

    let response = app
        .server
        .post("/v1/crawl")
        .json(&json!({ "scope": "上海", "pages": 1 }))
        .await;
    let jobs = job_ids(&response.json());
    assert_eq!(jobs.len(), 2);

    for (job_id, source_id) in jobs {
        let view = wait_for_terminal(&app.server, &job_id).await;
        if source_id == "ke" {
            assert_eq!(view["state"], "risk_blocked");
            assert_eq!(
                view["blocked_url"],
                "https://hip.ke.com/captcha?origin=ershoufang"
            );
            assert!(view["report"].is_null());
        } else {
            assert_eq!(view["state"], "completed");
            assert_eq!(view["report"]["report"]["total_count"], 18);
        }
    }
}

#[tokio::test]
async fn test_unknown_job_returns_404() {
    let app = create_test_app(vec![source("ke", SiteBehavior::Healthy)]);

    let response = app
        .server
        .get(&format!("/v1/crawl/{}", uuid::Uuid::new_v4()))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = app
        .server
        .delete(&format!("/v1/crawl/{}", uuid::Uuid::new_v4()))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inverted_listing_range_is_rejected() {
    let app = create_test_app(vec![source("ke", SiteBehavior::Healthy)]);

    let response = app
        .server
        .get("/v1/listings")
        .add_query_param("min_area", 120)
        .add_query_param("max_area", 60)
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
