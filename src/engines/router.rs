// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::domain::models::fetch::{FetchResult, FetchStrategy};
use crate::domain::models::target::FetchTarget;
use crate::domain::services::page_signals::extract_signals;
use crate::engines::traits::{
    BrowserCapability, FetchError, FetchRequest, RawFetcher, RenderError, RenderRequest,
};

/// 引擎使用统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// 使用次数
    pub usage_count: u64,
    /// 失败次数
    pub failure_count: u64,
    /// 累计耗时
    pub total_time: Duration,
}

/// 应用外壳判定阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellHeuristic {
    /// 小于该字节数的HTML视为外壳
    pub body_bytes: usize,
    /// 含脚本且可见文本少于该字符数时视为外壳
    pub min_text_chars: usize,
}

impl Default for ShellHeuristic {
    fn default() -> Self {
        Self {
            body_bytes: 1024,
            min_text_chars: 200,
        }
    }
}

impl ShellHeuristic {
    /// 原始响应是否像一个需要执行 JavaScript 的应用外壳
    pub fn is_application_shell(&self, result: &FetchResult) -> bool {
        if !result.is_success() || !result.is_html() {
            return false;
        }
        if result.content.len() < self.body_bytes {
            return true;
        }
        let signals = extract_signals(&result.text());
        let script_dominant = signals.script_count > 0 || signals.noscript_requires_js;
        script_dominant && signals.text_chars() < self.min_text_chars
    }
}

/// 抓取路由器
///
/// 按能力集 {raw, rendered} 分派：先原始抓取，只有结果被判定为应用外壳时才渲染。
pub struct FetchRouter {
    raw: Arc<dyn RawFetcher>,
    browser: Option<Arc<dyn BrowserCapability>>,
    heuristic: ShellHeuristic,
    engine_stats: parking_lot::RwLock<HashMap<&'static str, EngineStats>>,
}

impl FetchRouter {
    pub fn new(
        raw: Arc<dyn RawFetcher>,
        browser: Option<Arc<dyn BrowserCapability>>,
        heuristic: ShellHeuristic,
    ) -> Self {
        Self {
            raw,
            browser,
            heuristic,
            engine_stats: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// 浏览器能力是否可用（未配置时为 false）
    pub async fn browser_available(&self) -> bool {
        match &self.browser {
            Some(browser) => browser.is_available().await,
            None => false,
        }
    }

    fn record(&self, engine: &'static str, ok: bool, elapsed: Duration) {
        let mut stats = self.engine_stats.write();
        let entry = stats.entry(engine).or_default();
        entry.usage_count += 1;
        entry.total_time += elapsed;
        if !ok {
            entry.failure_count += 1;
        }
    }

    pub fn stats(&self) -> HashMap<&'static str, EngineStats> {
        self.engine_stats.read().clone()
    }

    /// 原始抓取
    pub async fn fetch_raw(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        let start = Instant::now();
        let result = self.raw.fetch(request).await;
        self.record(self.raw.name(), result.is_ok(), start.elapsed());
        result
    }

    /// 该目标的原始结果是否需要渲染
    pub fn needs_render(&self, target: &FetchTarget, result: &FetchResult) -> bool {
        self.browser.is_some() && target.allows_render() && self.heuristic.is_application_shell(result)
    }

    /// 渲染抓取
    pub async fn render(&self, request: &RenderRequest) -> Result<FetchResult, RenderError> {
        let Some(browser) = &self.browser else {
            return Err(RenderError::BrowserUnavailable("rendering disabled".to_string()));
        };

        info!("渲染 {}", request.url);
        let start = Instant::now();
        let rendered = browser.render(request).await;
        self.record(browser.name(), rendered.is_ok(), start.elapsed());
        let page = rendered?;
        debug!("渲染完成，观察到 {} 个请求", page.observed_requests.len());

        Ok(FetchResult {
            url: request.url.clone(),
            final_url: page.final_url,
            status: 200,
            content: Bytes::from(page.html),
            content_type: "text/html; charset=utf-8".to_string(),
            strategy: FetchStrategy::Rendered,
            fetched_at: Utc::now(),
            truncated: false,
            redirects: Vec::new(),
            offsite_redirect: None,
            remote_addr: None,
            last_modified: None,
            observed_requests: page.observed_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::target::Domain;
    use crate::engines::traits::RenderedPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    fn html_result(body: &str) -> FetchResult {
        let url = Url::parse("https://example.com/").unwrap();
        FetchResult {
            url: url.clone(),
            final_url: url,
            status: 200,
            content: Bytes::from(body.to_string()),
            content_type: "text/html".to_string(),
            strategy: FetchStrategy::Raw,
            fetched_at: Utc::now(),
            truncated: false,
            redirects: vec![],
            offsite_redirect: None,
            remote_addr: None,
            last_modified: None,
            observed_requests: vec![],
        }
    }

    fn long_text_page() -> String {
        format!(
            "<html><head><title>Acme</title></head><body><p>{}</p></body></html>",
            "Plenty of server rendered text about our products. ".repeat(40)
        )
    }

    fn spa_shell() -> String {
        format!(
            "<html><head><script>{}</script></head><body><div id=\"root\"></div>\
             <noscript>You need to enable JavaScript to run this app.</noscript></body></html>",
            "window.__bundle = 1;".repeat(100)
        )
    }

    struct NullRaw;

    #[async_trait]
    impl RawFetcher for NullRaw {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchResult, FetchError> {
            Err(FetchError::Timeout)
        }
        fn name(&self) -> &'static str {
            "null"
        }
    }

    struct CountingBrowser(AtomicUsize);

    #[async_trait]
    impl BrowserCapability for CountingBrowser {
        async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(RenderedPage {
                final_url: request.url.clone(),
                html: "<html><body>rendered</body></html>".to_string(),
                observed_requests: vec!["https://example.com/app.js".to_string()],
            })
        }
        async fn is_available(&self) -> bool {
            true
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_shell_heuristic() {
        let heuristic = ShellHeuristic::default();
        assert!(heuristic.is_application_shell(&html_result(&spa_shell())));
        assert!(heuristic.is_application_shell(&html_result("<html><body></body></html>")));
        assert!(!heuristic.is_application_shell(&html_result(&long_text_page())));

        let mut not_html = html_result("{}");
        not_html.content_type = "application/json".to_string();
        assert!(!heuristic.is_application_shell(&not_html));
    }

    #[test]
    fn test_needs_render_only_for_root_and_candidates() {
        let browser: Arc<dyn BrowserCapability> = Arc::new(CountingBrowser(AtomicUsize::new(0)));
        let router = FetchRouter::new(Arc::new(NullRaw), Some(browser), ShellHeuristic::default());
        let domain = Domain::new_unchecked("example.com".into());
        let shell = html_result(&spa_shell());

        assert!(router.needs_render(&FetchTarget::mandatory(&domain, "/"), &shell));
        assert!(!router.needs_render(&FetchTarget::mandatory(&domain, "/humans.txt"), &shell));

        let no_browser = FetchRouter::new(Arc::new(NullRaw), None, ShellHeuristic::default());
        assert!(!no_browser.needs_render(&FetchTarget::mandatory(&domain, "/"), &shell));
    }

    #[tokio::test]
    async fn test_render_produces_rendered_result() {
        let browser = Arc::new(CountingBrowser(AtomicUsize::new(0)));
        let router = FetchRouter::new(Arc::new(NullRaw), Some(browser.clone()), ShellHeuristic::default());
        let request = RenderRequest {
            url: Url::parse("https://example.com/").unwrap(),
            timeout: Duration::from_secs(1),
            idle: Duration::from_millis(10),
            user_agent: "ua".to_string(),
        };

        let result = router.render(&request).await.unwrap();
        assert_eq!(result.strategy, FetchStrategy::Rendered);
        assert_eq!(result.observed_requests.len(), 1);
        assert_eq!(browser.0.load(Ordering::SeqCst), 1);
        assert_eq!(router.stats()["counting"].usage_count, 1);
    }

    #[tokio::test]
    async fn test_render_without_browser_is_unavailable() {
        let router = FetchRouter::new(Arc::new(NullRaw), None, ShellHeuristic::default());
        let request = RenderRequest {
            url: Url::parse("https://example.com/").unwrap(),
            timeout: Duration::from_secs(1),
            idle: Duration::from_millis(10),
            user_agent: "ua".to_string(),
        };
        let err = router.render(&request).await.unwrap_err();
        assert_eq!(err.kind(), "browser_unavailable");
        assert!(!router.browser_available().await);
    }
}
