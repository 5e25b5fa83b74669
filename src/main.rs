// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use housecrawl::application::job_registry::{JobRegistry, RetentionPolicy};
use housecrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use housecrawl::application::use_cases::listing_use_case::ListingUseCase;
use housecrawl::config::settings::Settings;
use housecrawl::domain::repositories::listing_repository::ListingRepository;
use housecrawl::domain::services::llm_service::LlmSummaryService;
use housecrawl::infrastructure::database::connection;
use housecrawl::infrastructure::repositories::listing_repo_impl::ListingRepositoryImpl;
use housecrawl::infrastructure::repositories::memory_listing_repo::InMemoryListingRepository;
use housecrawl::presentation::routes;
use housecrawl::utils::telemetry;
use housecrawl::workers::MultiSourceCoordinator;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting housecrawl...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // Initialize Prometheus metrics
    housecrawl::infrastructure::metrics::init_metrics(&settings.metrics);

    // 3. Listing store
    let repository: Arc<dyn ListingRepository> = if settings.database.enabled {
        let db = connection::connect_and_migrate(&settings.database).await?;
        Arc::new(ListingRepositoryImpl::new(Arc::new(db)))
    } else {
        warn!("Database disabled, listings are kept in memory only");
        Arc::new(InMemoryListingRepository::new())
    };

    // 4. Sources
    let coordinator = MultiSourceCoordinator::from_settings(&settings, Some(repository.clone()))?;
    let source_ids = coordinator.source_ids();
    if source_ids.is_empty() {
        warn!("No enabled sources configured, crawl submissions will be rejected");
    } else {
        info!(sources = ?source_ids, "Sources ready");
    }

    let summarizer = LlmSummaryService::from_settings(&settings.llm);
    if !summarizer.is_configured() {
        warn!("LLM API key not configured, report summaries are unavailable");
    }

    // 5. Use cases
    let registry = Arc::new(JobRegistry::with_retention(RetentionPolicy::from_settings(
        &settings.registry,
    )));
    registry.spawn_sweeper(settings.registry.sweep_interval());
    let crawl_use_case = Arc::new(CrawlUseCase::new(
        Arc::new(coordinator),
        registry,
        Arc::new(summarizer),
    ));
    let listing_use_case = Arc::new(ListingUseCase::new(repository));

    // 6. Start HTTP server
    let app = routes::app(crawl_use_case, listing_use_case);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
