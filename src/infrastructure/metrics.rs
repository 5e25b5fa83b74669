// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const PAGES_FETCHED: &str = "housecrawl_pages_fetched_total";
pub const FETCH_FAILURES: &str = "housecrawl_fetch_failures_total";
pub const FETCH_DURATION: &str = "housecrawl_fetch_duration_seconds";
pub const RISK_BLOCKS: &str = "housecrawl_risk_blocks_total";
pub const RECORDS_ACCEPTED: &str = "housecrawl_records_accepted_total";
pub const RECORDS_REJECTED: &str = "housecrawl_records_rejected_total";
pub const STORE_FAILURES: &str = "housecrawl_store_failures_total";
pub const JOBS_FINISHED: &str = "housecrawl_jobs_finished_total";

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册各项指标说明
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(
                "Invalid metrics address {}: {}. Metrics exporter not started.",
                settings.listen_address, e
            );
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!(PAGES_FETCHED, "Total number of page fetches issued");
    describe_counter!(FETCH_FAILURES, "Total number of failed page fetches");
    describe_histogram!(FETCH_DURATION, "Duration of page fetches in seconds");
    describe_counter!(RISK_BLOCKS, "Total number of jobs stopped by risk control");
    describe_counter!(RECORDS_ACCEPTED, "Total number of listing records accepted");
    describe_counter!(
        RECORDS_REJECTED,
        "Total number of candidate records rejected as duplicate or incomplete"
    );
    describe_counter!(STORE_FAILURES, "Total number of failed listing store writes");
    describe_counter!(JOBS_FINISHED, "Total number of crawl jobs finished, by outcome");

    info!("Metrics exporter listening on {}", addr);
}
