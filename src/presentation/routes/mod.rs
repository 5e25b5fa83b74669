// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::crawl_use_case::CrawlUseCase;
use crate::application::use_cases::listing_use_case::ListingUseCase;
use crate::presentation::handlers::{crawl_handler, listing_handler};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
pub fn routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version))
        .route("/v1/crawl", post(crawl_handler::create_crawl))
        .route(
            "/v1/crawl/{id}",
            get(crawl_handler::get_crawl).delete(crawl_handler::cancel_crawl),
        )
        .route("/v1/crawl/{id}/summary", post(crawl_handler::summarize_crawl))
        .route("/v1/listings", get(listing_handler::list_listings))
}

/// 挂载用例后的完整应用
pub fn app(crawl: Arc<CrawlUseCase>, listings: Arc<ListingUseCase>) -> Router {
    routes()
        .layer(Extension(crawl))
        .layer(Extension(listings))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
