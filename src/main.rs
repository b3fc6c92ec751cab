// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use uuid::Uuid;

use websurvey::config::settings::Settings;
use websurvey::domain::repositories::name_resolver::NameResolver;
use websurvey::domain::services::domain_matcher::DomainMatcher;
use websurvey::domain::services::legal_classifier::LegalClassifier;
use websurvey::engines::chromium_engine::ChromiumEngine;
use websurvey::engines::reqwest_engine::ReqwestEngine;
use websurvey::engines::router::FetchRouter;
use websurvey::engines::traits::BrowserCapability;
use websurvey::infrastructure::resolver::HybridResolver;
use websurvey::infrastructure::sink::{BatchingSink, ObjectStoreSink};
use websurvey::infrastructure::storage::create_storage_repository;
use websurvey::queue::control::RunControl;
use websurvey::queue::scheduler::SurveyScheduler;
use websurvey::utils::telemetry;
use websurvey::workers::survey_worker::SurveyWorker;

/// 主函数
///
/// 读取域名列表，装配解析器、抓取器、浏览器与结果接收器后执行一次调查运行。
/// 运行级致命错误以非零状态退出。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new().context("failed to load configuration")?;
    telemetry::init_telemetry(settings.logging.json);
    info!("Starting websurvey...");

    // 2. Domain list
    let raw = tokio::fs::read_to_string(&settings.survey.domains_path)
        .await
        .with_context(|| format!("failed to read domain list {}", settings.survey.domains_path))?;
    let matcher = match &settings.survey.domain_trie_path {
        Some(path) => DomainMatcher::load(path).with_context(|| format!("failed to load domain set {}", path))?,
        None => DomainMatcher::syntactic(),
    };
    let lines = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));
    let (domains, rejected) = matcher.dedupe(lines);
    for (input, reason) in &rejected {
        warn!("Skipping input {:?}: {}", input, reason);
    }
    info!("{} domains accepted, {} rejected", domains.len(), rejected.len());

    // 3. Resolver, engines and classifier
    let resolver: Arc<dyn NameResolver> = Arc::new(HybridResolver::new(settings.resolver.options()));
    let browser: Option<Arc<dyn BrowserCapability>> = if settings.render.enabled {
        Some(Arc::new(ChromiumEngine::new(settings.render.remote_debugging_url.clone())))
    } else {
        None
    };
    let router = Arc::new(FetchRouter::new(
        Arc::new(ReqwestEngine),
        browser,
        settings.render.heuristic(),
    ));
    let classifier = Arc::new(LegalClassifier::new(settings.classifier.config()));
    let worker = Arc::new(SurveyWorker::new(settings.survey_config(), resolver, router, classifier));

    // 4. Result sink
    let run_id = Uuid::new_v4();
    let storage = create_storage_repository(&settings.storage)
        .await
        .context("failed to initialize storage")?;
    let sink = Arc::new(ObjectStoreSink::new(storage, settings.sink.key_prefix.clone(), run_id));
    let batching = Arc::new(BatchingSink::new(
        sink,
        settings.sink.push_every,
        settings.sink.retry_policy(),
    ));

    // 5. Run
    let control = RunControl::new();
    let scheduler = SurveyScheduler::new(worker, batching, control.clone()).with_run_id(run_id);

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, letting in-flight domains finish");
                control.cancel();
            }
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    match scheduler.run(domains).await {
        Ok(summary) => {
            info!(
                "Run {} finished: {} records (complete={}, partial={}, failed={}, not started={})",
                summary.run_id,
                summary.records,
                summary.complete,
                summary.partial,
                summary.failed,
                summary.not_started
            );
            Ok(())
        }
        Err(e) => {
            error!("Run {} aborted ({}): {}", run_id, e.kind(), e);
            Err(e.into())
        }
    }
}
