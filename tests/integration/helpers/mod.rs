// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use async_trait::async_trait;
use axum_test::TestServer;
use housecrawl::application::job_registry::JobRegistry;
use housecrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use housecrawl::application::use_cases::listing_use_case::ListingUseCase;
use housecrawl::domain::models::fetch::{FetchPurpose, FetchRequest};
use housecrawl::domain::models::listing::ListingRecord;
use housecrawl::domain::models::rule_set::ExtractionRuleSet;
use housecrawl::domain::repositories::listing_repository::ListingRepository;
use housecrawl::domain::services::anti_detection_service::{
    AntiDetectionScheduler, PacingProfile, DEFAULT_RISK_MARKERS,
};
use housecrawl::domain::services::extraction_service::CompiledRuleSet;
use housecrawl::domain::services::llm_service::SummaryGenerator;
use housecrawl::engines::traits::{EngineError, PageRenderer, RenderedPage};
use housecrawl::infrastructure::repositories::memory_listing_repo::InMemoryListingRepository;
use housecrawl::presentation::routes;
use housecrawl::utils::retry_policy::RetryPolicy;
use housecrawl::workers::{MultiSourceCoordinator, SourcePipeline};
use std::sync::Arc;
use std::time::Duration;

/// 模拟站点的行为
#[derive(Clone, Copy, Debug)]
pub enum SiteBehavior {
    /// 每页 20 个容器，18 套住宅加 2 个车位
    Healthy,
    /// 结果页跳转到验证页
    Captcha,
    /// 结果页一直不返回
    Stall,
}

pub struct FakeSite {
    behavior: SiteBehavior,
}

#[async_trait]
impl PageRenderer for FakeSite {
    async fn fetch(&self, request: &FetchRequest) -> Result<RenderedPage, EngineError> {
        let page = match request.purpose {
            FetchPurpose::Bootstrap => {
                return Ok(RenderedPage {
                    final_url: request.url.clone(),
                    status_code: 200,
                    content: "<html><body>首页</body></html>".to_string(),
                })
            }
            FetchPurpose::ResultPage(page) => page,
        };
        match self.behavior {
            SiteBehavior::Healthy => Ok(RenderedPage {
                final_url: request.url.clone(),
                status_code: 200,
                content: result_page(page as usize),
            }),
            SiteBehavior::Captcha => Ok(RenderedPage {
                final_url: "https://hip.ke.com/captcha?origin=ershoufang".to_string(),
                status_code: 200,
                content: String::new(),
            }),
            SiteBehavior::Stall => {
                futures::future::pending::<()>().await;
                Err(EngineError::Timeout)
            }
        }
    }

    fn name(&self) -> &'static str {
        "fake-site"
    }
}

fn container(id: usize, title: &str, total: usize, area: f64, layout: &str) -> String {
    format!(
        r#"<li class="clear">
  <a class="img" href="//bj.ke.com/ershoufang/{id}.html"><img src="/p/{id}.jpg"></a>
  <div class="info clear">
    <div class="title"><a href="//bj.ke.com/ershoufang/{id}.html?fb_expo_id={id}" title="{title}">{title}</a></div>
    <div class="positionInfo"><a href="/xiaoqu/{id}/">" 阳光 花园 "</a></div>
    <div class="houseInfo">高楼层 (共26层) | 2015年建 | {layout} | {area}平米 | 东南 北</div>
    <div class="totalPrice"><span>{total}</span><i>万</i></div>
  </div>
</li>"#
    )
}

/// 生成一页结果，房源编号按页错开
pub fn result_page(page: usize) -> String {
    let mut items = Vec::with_capacity(20);
    for i in 0..18 {
        let id = page * 1000 + i;
        let layout = if i % 3 == 0 { "3室2厅" } else { "2室1厅" };
        items.push(container(id, "南北通透 满五唯一", 200 + i * 10, 80.0 + i as f64, layout));
    }
    items.push(container(page * 1000 + 90, "地下车位 急售", 15, 12.0, "0室0厅"));
    items.push(container(page * 1000 + 91, "底商 店面 出售", 500, 120.0, "1室"));
    format!(
        "<html><body><ul class=\"sellListContent\">{}</ul></body></html>",
        items.join("\n")
    )
}

pub fn load_rules(name: &str) -> ExtractionRuleSet {
    let path = format!("{}/config/rules/{}", env!("CARGO_MANIFEST_DIR"), name);
    ExtractionRuleSet::load(path).unwrap()
}

pub fn source(source_id: &str, behavior: SiteBehavior) -> SourcePipeline {
    let mut rules = load_rules("ke.yaml");
    rules.source_id = source_id.to_string();
    let scheduler = AntiDetectionScheduler::new(
        vec![],
        Some("lianjia_uuid=integration".to_string()),
        None,
        DEFAULT_RISK_MARKERS.iter().map(|m| m.to_string()).collect(),
        PacingProfile::immediate(),
    )
    .unwrap();
    let factory = move || -> Result<Box<dyn PageRenderer>, EngineError> {
        Ok(Box::new(FakeSite { behavior }))
    };
    SourcePipeline::new(
        CompiledRuleSet::compile(rules).unwrap(),
        scheduler,
        Arc::new(factory),
    )
}

pub fn coordinator(
    sources: Vec<SourcePipeline>,
    repository: Arc<dyn ListingRepository>,
) -> MultiSourceCoordinator {
    let mut coordinator =
        MultiSourceCoordinator::new(RetryPolicy::immediate(2), Duration::from_secs(30), 5)
            .with_repository(repository);
    for source in sources {
        coordinator.add_source(source);
    }
    coordinator
}

/// 返回固定文本并记录收到的记录数
pub struct StubSummarizer;

#[async_trait]
impl SummaryGenerator for StubSummarizer {
    async fn summarize(
        &self,
        records: &[ListingRecord],
        instruction: Option<&str>,
    ) -> Result<String> {
        Ok(format!(
            "{}套房源；{}",
            records.len(),
            instruction.unwrap_or("默认分析")
        ))
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub repository: Arc<InMemoryListingRepository>,
}

pub fn create_test_app(sources: Vec<SourcePipeline>) -> TestApp {
    let repository = Arc::new(InMemoryListingRepository::new());
    let coordinator = coordinator(sources, repository.clone());
    let crawl = Arc::new(CrawlUseCase::new(
        Arc::new(coordinator),
        Arc::new(JobRegistry::new()),
        Arc::new(StubSummarizer),
    ));
    let listings = Arc::new(ListingUseCase::new(repository.clone()));
    let server = TestServer::new(routes::app(crawl, listings)).unwrap();
    TestApp { server, repository }
}
