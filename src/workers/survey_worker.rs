// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::models::fetch::{FetchResult, FetchStrategy};
use crate::domain::models::survey::{
    ClassifiedPage, DomainSurveyRecord, ResourceEntry, StageError, SurveyState, SurveyStatus,
};
use crate::domain::models::target::{Domain, FetchTarget, ResourceRole, MANDATORY_PATHS, ROBOTS_PATH};
use crate::domain::repositories::name_resolver::{NameResolver, Resolution, ResolutionError};
use crate::domain::services::legal_classifier::LegalClassifier;
use crate::domain::services::page_signals::extract_signals;
use crate::engines::router::FetchRouter;
use crate::engines::traits::{FetchError, FetchRequest, RenderError, RenderRequest};
use crate::engines::validators::same_site;
use crate::infrastructure::metrics;
use crate::queue::control::RunControl;
use crate::queue::politeness::PolitenessGates;
use crate::utils::retry_policy::{is_retryable_status, RetryPolicy};
use crate::utils::robots::RobotsPolicy;
use crate::utils::sitemap::{maybe_gunzip, parse_sitemap, SitemapEntry};
use crate::utils::text_encoding::decode_body;
use crate::utils::url_utils::{build_url, path_and_query, resolve_url, strip_www};

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = "websurvey-bot/0.1 (+legal resource survey)";

/// 调查运行时配置
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// 全局并发域名数
    pub max_workers: usize,
    /// 每个主机的并发请求数
    pub per_host_concurrency: usize,
    pub request_timeout: Duration,
    /// 单个域名的总耗时上限
    pub domain_timeout: Duration,
    pub max_candidates: usize,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
    /// robots 未声明 Crawl-delay 时的请求间隔
    pub default_crawl_delay: Duration,
    pub max_crawl_delay: Duration,
    /// 抓取的站点地图数上限（含索引子地图）
    pub max_sitemaps: usize,
    pub max_sitemap_entries: usize,
    /// robots 未声明站点地图时探测 `/sitemap.xml`
    pub probe_default_sitemap: bool,
    pub retry: RetryPolicy,
    pub user_agent: String,
    /// 是否在记录中保存压缩后的响应内容
    pub store_content: bool,
    pub render_timeout: Duration,
    pub render_idle: Duration,
    /// 浏览器不可用时是否终止运行
    pub render_required: bool,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            max_workers: 16,
            per_host_concurrency: 1,
            request_timeout: Duration::from_secs(10),
            domain_timeout: Duration::from_secs(60),
            max_candidates: 50,
            max_body_bytes: 2 * 1024 * 1024,
            max_redirects: 5,
            default_crawl_delay: Duration::from_secs(1),
            max_crawl_delay: Duration::from_secs(30),
            max_sitemaps: 10,
            max_sitemap_entries: 50_000,
            probe_default_sitemap: false,
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            store_content: true,
            render_timeout: Duration::from_secs(15),
            render_idle: Duration::from_millis(500),
            render_required: false,
        }
    }
}

/// 中止流水线其余步骤的原因
#[derive(Debug)]
enum Halt {
    Unresolved(ResolutionError),
    Cancelled,
}

/// 已抓取页面中的链接（绝对URL, 锚文本）
struct DiscoveredLink {
    url: Url,
    text: String,
}

/// 单个域名的流水线进度
///
/// 各阶段把结果累积在这里；超时或取消时，已有的部分结果照样产出记录。
struct SurveyProgress {
    run_id: Uuid,
    domain: Domain,
    state: SurveyState,
    started_at: DateTime<Utc>,
    resolution: Option<Resolution>,
    robots: Option<RobotsPolicy>,
    crawl_delay: Option<Duration>,
    links: Vec<DiscoveredLink>,
    sitemap_entries: Vec<SitemapEntry>,
    candidates: Vec<ClassifiedPage>,
    candidates_attempted: usize,
    resources: Vec<ResourceEntry>,
    errors: Vec<StageError>,
}

impl SurveyProgress {
    fn new(run_id: Uuid, domain: Domain) -> Self {
        Self {
            run_id,
            domain,
            state: SurveyState::Pending,
            started_at: Utc::now(),
            resolution: None,
            robots: None,
            crawl_delay: None,
            links: Vec::new(),
            sitemap_entries: Vec::new(),
            candidates: Vec::new(),
            candidates_attempted: 0,
            resources: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn enter(&mut self, state: SurveyState) {
        debug_assert!(state.is_terminal() || self.state.next() == state);
        debug!("{} -> {}", self.state, state);
        self.state = state;
    }

    fn error(&mut self, kind: &str, path: Option<&str>, detail: Option<String>) {
        self.errors.push(StageError {
            stage: self.state,
            kind: kind.to_string(),
            path: path.map(str::to_string),
            detail,
        });
    }

    fn mandatory_succeeded(&self) -> bool {
        MANDATORY_PATHS.iter().all(|path| {
            self.resources
                .iter()
                .any(|r| r.role == ResourceRole::Mandatory && r.path == *path && r.succeeded())
        })
    }

    fn finish(self, terminal: SurveyState) -> DomainSurveyRecord {
        let resolved = self.resolution.is_some();
        let status = if !resolved {
            SurveyStatus::Failed
        } else if terminal == SurveyState::Complete && self.mandatory_succeeded() {
            SurveyStatus::Complete
        } else {
            SurveyStatus::Partial
        };

        DomainSurveyRecord {
            run_id: self.run_id,
            domain: self.domain,
            resolved,
            status,
            final_state: terminal,
            resolution: self.resolution.as_ref().map(Resolution::summary),
            crawl_delay_ms: self.crawl_delay.map(|d| d.as_millis() as u64),
            candidates_attempted: self.candidates_attempted,
            resources: self.resources,
            errors: self.errors,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// 域名调查工作器
///
/// 对一个域名按固定顺序执行各阶段：
/// 解析 → robots → 根路径与 ai/humans/security → 站点地图 → 候选页 → 分类。
/// 域内请求严格串行，全部经过该主机的礼貌闸门。
pub struct SurveyWorker {
    config: SurveyConfig,
    resolver: Arc<dyn NameResolver>,
    router: Arc<FetchRouter>,
    classifier: Arc<LegalClassifier>,
    gates: Arc<PolitenessGates>,
}

impl SurveyWorker {
    pub fn new(
        config: SurveyConfig,
        resolver: Arc<dyn NameResolver>,
        router: Arc<FetchRouter>,
        classifier: Arc<LegalClassifier>,
    ) -> Self {
        let gates = Arc::new(PolitenessGates::new(
            config.per_host_concurrency,
            config.default_crawl_delay,
            config.max_crawl_delay,
        ));
        Self {
            config,
            resolver,
            router,
            classifier,
            gates,
        }
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<FetchRouter> {
        &self.router
    }

    /// 按解析主机划分的礼貌闸门表
    pub fn gates(&self) -> &Arc<PolitenessGates> {
        &self.gates
    }

    /// 调查一个域名，总是返回一条记录
    #[instrument(skip_all, fields(domain = %domain, run_id = %run_id))]
    pub async fn survey(&self, run_id: Uuid, domain: Domain, control: &RunControl) -> DomainSurveyRecord {
        let started = Instant::now();
        let mut progress = SurveyProgress::new(run_id, domain);

        let outcome = tokio::time::timeout(
            self.config.domain_timeout,
            self.run_pipeline(&mut progress, control),
        )
        .await;

        let terminal = match outcome {
            Ok(Ok(())) => SurveyState::Complete,
            Ok(Err(Halt::Unresolved(e))) => {
                warn!("域名解析失败: {}", e);
                progress.error(e.kind(), None, Some(e.to_string()));
                SurveyState::Error
            }
            Ok(Err(Halt::Cancelled)) => {
                info!("运行已取消，停止于 {}", progress.state);
                progress.error("cancelled", None, None);
                SurveyState::Error
            }
            Err(_) => {
                warn!("域名调查超时 ({:?})，停止于 {}", self.config.domain_timeout, progress.state);
                progress.error("domain_timeout", None, None);
                SurveyState::Error
            }
        };
        // candidates fetched before a timeout or cancellation still count
        if !progress.candidates.is_empty() {
            self.classify_candidates(&mut progress);
        }
        progress.enter(terminal);

        let record = progress.finish(terminal);
        metrics::record_domain(record.status, started.elapsed().as_secs_f64());
        info!(
            "调查结束: status={}, resources={}, errors={}",
            record.status,
            record.resources.len(),
            record.errors.len()
        );
        record
    }

    fn checkpoint(&self, control: &RunControl) -> Result<(), Halt> {
        if control.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn run_pipeline(&self, progress: &mut SurveyProgress, control: &RunControl) -> Result<(), Halt> {
        self.checkpoint(control)?;
        progress.enter(SurveyState::Resolving);
        let resolution = self
            .resolver
            .resolve(&progress.domain)
            .await
            .map_err(Halt::Unresolved)?;
        debug!(
            "解析结果: {} via {:?} ({}://:{})",
            resolution.primary, resolution.method, resolution.scheme, resolution.port
        );
        progress.resolution = Some(resolution);

        self.checkpoint(control)?;
        progress.enter(SurveyState::FetchingRobots);
        self.fetch_robots(progress).await;

        self.checkpoint(control)?;
        progress.enter(SurveyState::FetchingRoot);
        self.fetch_mandatory(progress).await;

        self.checkpoint(control)?;
        progress.enter(SurveyState::ExpandingSitemap);
        self.expand_sitemaps(progress).await;

        self.checkpoint(control)?;
        progress.enter(SurveyState::FetchingCandidates);
        self.fetch_candidates(progress).await;

        self.checkpoint(control)?;
        progress.enter(SurveyState::Classifying);
        self.classify_candidates(progress);

        Ok(())
    }

    fn url_for(&self, progress: &SurveyProgress, path: &str) -> Option<Url> {
        let resolution = progress.resolution.as_ref()?;
        build_url(&resolution.scheme, progress.domain.as_str(), resolution.port, path).ok()
    }

    fn robots(&self, progress: &SurveyProgress) -> RobotsPolicy {
        progress
            .robots
            .clone()
            .unwrap_or_else(|| RobotsPolicy::allow_all(&self.config.user_agent))
    }

    /// 经过礼貌闸门的原始抓取，按重试策略重试超时、连接失败、5xx 与 429
    async fn fetch_with_retry(&self, progress: &SurveyProgress, url: &Url) -> Result<FetchResult, FetchError> {
        let Some(resolution) = progress.resolution.as_ref() else {
            return Err(FetchError::Other("domain not resolved".to_string()));
        };
        let host_key = resolution.host_key();
        let pin = (url.host_str() == Some(progress.domain.as_str())).then_some(resolution.primary);

        let request = FetchRequest {
            url: url.clone(),
            site: progress.domain.as_str().to_string(),
            pin,
            timeout: self.config.request_timeout,
            max_body_bytes: self.config.max_body_bytes,
            max_redirects: self.config.max_redirects,
            user_agent: self.config.user_agent.clone(),
        };

        let retry: &RetryPolicy = &self.config.retry;
        let mut attempt = 0;
        loop {
            let outcome = {
                let _permit = self
                    .gates
                    .acquire(&host_key)
                    .await
                    .map_err(|e| FetchError::Other(e.to_string()))?;
                self.router.fetch_raw(&request).await
            };

            let retry_kind = match &outcome {
                Ok(result) if is_retryable_status(result.status) && retry.should_retry(attempt) => {
                    format!("http_{}", result.status)
                }
                Err(e) if e.is_retryable() && retry.should_retry(attempt) => e.kind().to_string(),
                Ok(result) => {
                    let label = if result.is_success() { "ok" } else { "http_error" };
                    metrics::record_fetch(FetchStrategy::Raw, label);
                    return outcome;
                }
                Err(e) => {
                    warn!("抓取 {} 失败: {}", url, e);
                    metrics::record_fetch(FetchStrategy::Raw, e.kind());
                    return outcome;
                }
            };

            attempt += 1;
            let backoff = retry.calculate_backoff(attempt);
            debug!("{} 第 {} 次重试 ({})，等待 {:?}", url, attempt, retry_kind, backoff);
            metrics::record_retry(&retry_kind);
            tokio::time::sleep(backoff).await;
        }
    }

    /// 需要时渲染一次；不需要渲染时返回 `Ok(None)`
    async fn render_if_shell(
        &self,
        progress: &SurveyProgress,
        target: &FetchTarget,
        raw: &FetchResult,
    ) -> Result<Option<FetchResult>, RenderError> {
        if !self.router.needs_render(target, raw) {
            return Ok(None);
        }
        let Some(resolution) = progress.resolution.as_ref() else {
            return Ok(None);
        };

        let request = RenderRequest {
            url: raw.url.clone(),
            timeout: self.config.render_timeout,
            idle: self.config.render_idle,
            user_agent: self.config.user_agent.clone(),
        };

        let rendered = {
            let _permit = self
                .gates
                .acquire(&resolution.host_key())
                .await
                .map_err(|e| RenderError::BrowserUnavailable(e.to_string()))?;
            self.router.render(&request).await
        };
        match &rendered {
            Ok(_) => metrics::record_fetch(FetchStrategy::Rendered, "ok"),
            Err(e) => metrics::record_fetch(FetchStrategy::Rendered, e.kind()),
        }
        rendered.map(Some)
    }

    /// 分类（只对成功响应打分，分类失败记为未标注）
    fn label(&self, result: &FetchResult, anchors: &[String]) -> (bool, f64) {
        if !result.is_success() {
            return (false, 0.0);
        }
        match self.classifier.classify(result, anchors) {
            Ok(c) => (c.is_legal_page, c.confidence),
            Err(e) => {
                debug!("{} 未分类: {}", result.url, e);
                (false, 0.0)
            }
        }
    }

    fn record_links(&self, progress: &mut SurveyProgress, result: &FetchResult) {
        if !result.is_success() || !result.is_html() {
            return;
        }
        let signals = extract_signals(&result.text());
        for link in signals.links {
            let Ok(mut url) = resolve_url(&result.final_url, &link.href) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            url.set_fragment(None);
            progress.links.push(DiscoveredLink { url, text: link.text });
        }
    }

    async fn fetch_robots(&self, progress: &mut SurveyProgress) {
        let target = FetchTarget::mandatory(&progress.domain, ROBOTS_PATH);
        let Some(url) = self.url_for(progress, ROBOTS_PATH) else {
            progress.resources.push(ResourceEntry::failed(&target, "", "invalid_url"));
            return;
        };

        let policy = match self.fetch_with_retry(progress, &url).await {
            Ok(result) => {
                let policy = if result.is_success() && result.is_textual() {
                    RobotsPolicy::parse(&result.text(), &self.config.user_agent)
                } else {
                    debug!("robots.txt 返回 {}，视为允许全部", result.status);
                    RobotsPolicy::allow_all(&self.config.user_agent)
                };
                let (is_legal_page, confidence) = self.label(&result, &[]);
                let page = ClassifiedPage {
                    target,
                    result,
                    is_legal_page,
                    confidence,
                    render_error: None,
                };
                progress
                    .resources
                    .push(ResourceEntry::from_page(&page, self.config.store_content));
                policy
            }
            Err(e) => {
                progress.error(e.kind(), Some(ROBOTS_PATH), Some(e.to_string()));
                progress
                    .resources
                    .push(ResourceEntry::failed(&target, url.as_str(), e.kind()));
                RobotsPolicy::allow_all(&self.config.user_agent)
            }
        };

        if let Some(resolution) = progress.resolution.as_ref() {
            let effective = self
                .gates
                .apply_crawl_delay(&resolution.host_key(), policy.crawl_delay());
            progress.crawl_delay = Some(effective);
        }
        progress.robots = Some(policy);
    }

    async fn fetch_mandatory(&self, progress: &mut SurveyProgress) {
        let robots = self.robots(progress);

        for path in MANDATORY_PATHS.iter().filter(|p| **p != ROBOTS_PATH) {
            let target = FetchTarget::mandatory(&progress.domain, path);
            let Some(url) = self.url_for(progress, path) else {
                progress.resources.push(ResourceEntry::failed(&target, "", "invalid_url"));
                continue;
            };

            if !robots.allows(url.as_str()) {
                info!("robots.txt 禁止 {}，跳过", path);
                metrics::record_skipped_by_policy();
                progress.resources.push(ResourceEntry::skipped(&target, url.as_str()));
                continue;
            }

            let raw = match self.fetch_with_retry(progress, &url).await {
                Ok(result) => result,
                Err(e) => {
                    progress.error(e.kind(), Some(path), Some(e.to_string()));
                    progress
                        .resources
                        .push(ResourceEntry::failed(&target, url.as_str(), e.kind()));
                    continue;
                }
            };

            // render failure on the root keeps the raw response
            let (result, render_error) = match self.render_if_shell(progress, &target, &raw).await {
                Ok(Some(rendered)) => (rendered, None),
                Ok(None) => (raw, None),
                Err(e) => {
                    warn!("渲染 {} 失败: {}", path, e);
                    progress.error(e.kind(), Some(path), Some(e.to_string()));
                    (raw, Some(e.kind().to_string()))
                }
            };

            self.record_links(progress, &result);
            let (is_legal_page, confidence) = self.label(&result, &[]);
            let page = ClassifiedPage {
                target,
                result,
                is_legal_page,
                confidence,
                render_error,
            };
            progress
                .resources
                .push(ResourceEntry::from_page(&page, self.config.store_content));
        }
    }

    fn is_same_site(&self, progress: &SurveyProgress, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| same_site(host, progress.domain.as_str()))
    }

    async fn expand_sitemaps(&self, progress: &mut SurveyProgress) {
        let robots = self.robots(progress);

        let mut queue: VecDeque<Url> = VecDeque::new();
        for declared in robots.sitemaps() {
            match Url::parse(declared) {
                Ok(url) if self.is_same_site(progress, &url) => queue.push_back(url),
                Ok(url) => debug!("忽略站外站点地图 {}", url),
                Err(_) => debug!("忽略无效的站点地图URL {}", declared),
            }
        }
        if queue.is_empty() && self.config.probe_default_sitemap {
            if let Some(url) = self.url_for(progress, "/sitemap.xml") {
                queue.push_back(url);
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut fetched = 0;
        while let Some(url) = queue.pop_front() {
            if fetched >= self.config.max_sitemaps {
                debug!("站点地图数达到上限 {}，剩余 {} 个未抓取", self.config.max_sitemaps, queue.len());
                break;
            }
            if !seen.insert(url.to_string()) {
                continue;
            }
            let target = FetchTarget::sitemap(&progress.domain, path_and_query(&url));
            if !robots.allows(url.as_str()) {
                metrics::record_skipped_by_policy();
                progress.resources.push(ResourceEntry::skipped(&target, url.as_str()));
                continue;
            }
            fetched += 1;

            let result = match self.fetch_with_retry(progress, &url).await {
                Ok(result) => result,
                Err(e) => {
                    progress.error(e.kind(), Some(&target.path), Some(e.to_string()));
                    progress
                        .resources
                        .push(ResourceEntry::failed(&target, url.as_str(), e.kind()));
                    continue;
                }
            };

            if result.is_success() {
                let remaining = self
                    .config
                    .max_sitemap_entries
                    .saturating_sub(progress.sitemap_entries.len());
                let parsed = maybe_gunzip(&result.content, self.config.max_body_bytes)
                    .and_then(|body| parse_sitemap(&decode_body(&body, Some(&result.content_type)), remaining));
                match parsed {
                    Ok(parsed) => {
                        debug!(
                            "站点地图 {}: {} 个条目, {} 个子地图",
                            url,
                            parsed.entries.len(),
                            parsed.children.len()
                        );
                        progress.sitemap_entries.extend(parsed.entries);
                        for child in parsed.children {
                            match Url::parse(&child) {
                                Ok(child) if self.is_same_site(progress, &child) => queue.push_back(child),
                                _ => debug!("忽略子地图 {}", child),
                            }
                        }
                    }
                    Err(e) => {
                        debug!("站点地图 {} 无法解析: {}", url, e);
                        progress.error(e.kind(), Some(&target.path), Some(e.to_string()));
                    }
                }
            }

            let page = ClassifiedPage {
                target,
                result,
                is_legal_page: false,
                confidence: 0.0,
                render_error: None,
            };
            progress.resources.push(ResourceEntry::from_page(&page, false));
        }
    }

    fn is_mandatory_url(&self, progress: &SurveyProgress, url: &Url) -> bool {
        let same_host = url
            .host_str()
            .is_some_and(|host| strip_www(host) == strip_www(progress.domain.as_str()));
        same_host && url.query().is_none() && MANDATORY_PATHS.contains(&url.path())
    }

    /// 选出候选页
    ///
    /// 顺序：带法律信号的页面链接，然后是URL带信号的站点地图条目，最后是其余条目；
    /// 去重、排除必抓路径后截断到 `max_candidates`。
    fn select_candidates(&self, progress: &SurveyProgress) -> Vec<Url> {
        let mut signalled_links = Vec::new();
        for link in &progress.links {
            if self.classifier.url_signal(&link.url) > 0.0 || self.classifier.text_matches(&link.text) {
                signalled_links.push(link.url.clone());
            }
        }

        let mut signalled_entries = Vec::new();
        let mut other_entries = Vec::new();
        for entry in &progress.sitemap_entries {
            let Ok(mut url) = Url::parse(entry.loc.trim()) else {
                continue;
            };
            url.set_fragment(None);
            if self.classifier.url_signal(&url) > 0.0 {
                signalled_entries.push(url);
            } else {
                other_entries.push(url);
            }
        }

        let mut seen = HashSet::new();
        signalled_links
            .into_iter()
            .chain(signalled_entries)
            .chain(other_entries)
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .filter(|url| self.is_same_site(progress, url))
            .filter(|url| !self.is_mandatory_url(progress, url))
            .filter(|url| seen.insert(url.to_string()))
            .take(self.config.max_candidates)
            .collect()
    }

    async fn fetch_candidates(&self, progress: &mut SurveyProgress) {
        let robots = self.robots(progress);
        let candidates = self.select_candidates(progress);
        info!("候选页 {} 个", candidates.len());

        for url in candidates {
            progress.candidates_attempted += 1;
            let target = FetchTarget::candidate(&progress.domain, path_and_query(&url));

            if !robots.allows(url.as_str()) {
                debug!("robots.txt 禁止候选页 {}", url);
                metrics::record_skipped_by_policy();
                continue;
            }

            let raw = match self.fetch_with_retry(progress, &url).await {
                Ok(result) => result,
                Err(e) => {
                    progress.error(e.kind(), Some(&target.path), Some(e.to_string()));
                    continue;
                }
            };

            // a failed render leaves the candidate unavailable
            let result = match self.render_if_shell(progress, &target, &raw).await {
                Ok(Some(rendered)) => rendered,
                Ok(None) => raw,
                Err(e) => {
                    warn!("候选页 {} 渲染失败: {}", url, e);
                    progress.error(e.kind(), Some(&target.path), Some(e.to_string()));
                    continue;
                }
            };

            progress.candidates.push(ClassifiedPage {
                target,
                result,
                is_legal_page: false,
                confidence: 0.0,
                render_error: None,
            });
        }
    }

    fn classify_candidates(&self, progress: &mut SurveyProgress) {
        let mut anchors: HashMap<String, Vec<String>> = HashMap::new();
        for link in &progress.links {
            if !link.text.is_empty() {
                anchors.entry(link.url.to_string()).or_default().push(link.text.clone());
            }
        }

        let pages = std::mem::take(&mut progress.candidates);
        for mut page in pages {
            let page_anchors = anchors
                .get(page.result.url.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let (is_legal_page, confidence) = self.label(&page.result, page_anchors);
            page.is_legal_page = is_legal_page;
            page.confidence = confidence;

            if page.should_persist() {
                debug!("法律页面 {} (confidence {:.2})", page.result.url, confidence);
                metrics::record_legal_page();
                progress
                    .resources
                    .push(ResourceEntry::from_page(&page, self.config.store_content));
            }
        }
    }
}

#[cfg(test)]
#[path = "survey_worker_test.rs"]
mod tests;
