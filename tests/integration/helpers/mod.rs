// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

use websurvey::domain::models::survey::DomainSurveyRecord;
use websurvey::domain::models::target::Domain;
use websurvey::domain::repositories::result_sink::{ResultSink, SinkError};
use websurvey::domain::services::domain_matcher::DomainMatcher;
use websurvey::domain::services::legal_classifier::LegalClassifier;
use websurvey::engines::reqwest_engine::ReqwestEngine;
use websurvey::engines::router::{FetchRouter, ShellHeuristic};
use websurvey::engines::traits::{BrowserCapability, RenderError, RenderRequest, RenderedPage};
use websurvey::infrastructure::resolver::StaticResolver;
use websurvey::infrastructure::sink::BatchingSink;
use websurvey::queue::control::RunControl;
use websurvey::queue::scheduler::SurveyScheduler;
use websurvey::utils::retry_policy::RetryPolicy;
use websurvey::workers::survey_worker::{SurveyConfig, SurveyWorker};

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// 通过语法匹配器构造域名
pub fn domain(name: &str) -> Domain {
    DomainMatcher::syntactic().accept(name).unwrap()
}

/// 把全部名称固定到模拟服务器
pub fn resolver_for(server: &MockServer, names: &[&str]) -> StaticResolver {
    let port = server.address().port();
    names
        .iter()
        .fold(StaticResolver::new(), |r, name| r.with(name, LOCALHOST, "http", port))
}

/// `http://{name}:{port}` 前缀
pub fn origin(server: &MockServer, name: &str) -> String {
    format!("http://{}:{}", name, server.address().port())
}

/// 测试用配置：无请求间隔，重试退避极短
pub fn fast_config() -> SurveyConfig {
    SurveyConfig {
        max_workers: 4,
        default_crawl_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        domain_timeout: Duration::from_secs(30),
        retry: RetryPolicy::for_fetch(2, Duration::from_millis(10), Duration::from_millis(50)),
        user_agent: "websurvey-test/1.0".to_string(),
        ..SurveyConfig::default()
    }
}

/// 计数的浏览器替身
#[derive(Default)]
pub struct StubBrowser {
    pub renders: AtomicUsize,
}

impl StubBrowser {
    pub fn count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserCapability for StubBrowser {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(RenderedPage {
            final_url: request.url.clone(),
            html: "<html><head><title>Store</title></head><body><main>Rendered application content</main></body></html>"
                .to_string(),
            observed_requests: vec![format!("{}static/bundle.js", request.url)],
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "stub-browser"
    }
}

/// 收集记录并统计 `put_batch` 调用的接收器
#[derive(Default)]
pub struct CollectingSink {
    pub batches: Mutex<Vec<usize>>,
    pub records: Mutex<Vec<DomainSurveyRecord>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<DomainSurveyRecord> {
        self.records.lock().clone()
    }

    pub fn record_for(&self, name: &str) -> DomainSurveyRecord {
        self.records
            .lock()
            .iter()
            .find(|r| r.domain.as_str() == name)
            .cloned()
            .unwrap_or_else(|| panic!("no record for {}", name))
    }
}

#[async_trait]
impl ResultSink for CollectingSink {
    async fn put_batch(&self, records: &[DomainSurveyRecord]) -> Result<(), SinkError> {
        self.batches.lock().push(records.len());
        self.records.lock().extend_from_slice(records);
        Ok(())
    }
}

pub struct Harness {
    pub scheduler: SurveyScheduler,
    pub worker: Arc<SurveyWorker>,
    pub sink: Arc<CollectingSink>,
}

/// 用真实的 reqwest 抓取器组装调度器
pub fn harness(
    resolver: StaticResolver,
    browser: Option<Arc<StubBrowser>>,
    config: SurveyConfig,
    push_every: usize,
) -> Harness {
    let browser = browser.map(|b| b as Arc<dyn BrowserCapability>);
    let router = FetchRouter::new(Arc::new(ReqwestEngine), browser, ShellHeuristic::default());
    let worker = Arc::new(SurveyWorker::new(
        config,
        Arc::new(resolver),
        Arc::new(router),
        Arc::new(LegalClassifier::default()),
    ));
    let sink = Arc::new(CollectingSink::default());
    let batching = Arc::new(BatchingSink::new(
        sink.clone(),
        push_every,
        RetryPolicy::for_flush(2, Duration::from_millis(5)),
    ));
    let scheduler = SurveyScheduler::new(worker.clone(), batching, RunControl::new());
    Harness {
        scheduler,
        worker,
        sink,
    }
}

/// 服务器收到的请求路径（按到达顺序）
pub async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.url.path().to_string())
        .collect()
}
