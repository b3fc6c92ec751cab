// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::engines::traits::{BrowserCapability, RenderError, RenderRequest, RenderedPage};

const IDLE_POLL: Duration = Duration::from_millis(100);

/// 随作用域结束中止的任务句柄
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 浏览器渲染引擎
///
/// 基于chromiumoxide。浏览器在首次使用时启动（或连接到远程调试地址），之后复用；
/// 每次渲染都在独立的浏览器上下文中进行，结束后销毁。
pub struct ChromiumEngine {
    remote_debugging_url: Option<String>,
    browser: OnceCell<Browser>,
}

impl ChromiumEngine {
    pub fn new(remote_debugging_url: Option<String>) -> Self {
        Self {
            remote_debugging_url,
            browser: OnceCell::new(),
        }
    }

    /// 获取或初始化共享的浏览器实例
    async fn get_browser(&self) -> Result<&Browser, RenderError> {
        self.browser
            .get_or_try_init(|| async {
                let (browser, mut handler) = if let Some(ref url) = self.remote_debugging_url {
                    info!("Connecting to remote Chrome instance at: {}", url);
                    Browser::connect(url.as_str())
                        .await
                        .map_err(|e| RenderError::BrowserUnavailable(e.to_string()))?
                } else {
                    let config = BrowserConfig::builder()
                        .no_sandbox()
                        .request_timeout(Duration::from_secs(30))
                        .arg("--disable-gpu")
                        .arg("--disable-dev-shm-usage")
                        .build()
                        .map_err(RenderError::BrowserUnavailable)?;
                    Browser::launch(config)
                        .await
                        .map_err(|e| RenderError::BrowserUnavailable(e.to_string()))?
                };

                // Spawn a handler to process browser events
                tokio::spawn(async move {
                    while let Some(h) = handler.next().await {
                        if h.is_err() {
                            break;
                        }
                    }
                });

                Ok(browser)
            })
            .await
    }

    /// 在页面上导航并等待网络空闲
    async fn load(
        &self,
        page: &Page,
        request: &RenderRequest,
    ) -> Result<RenderedPage, RenderError> {
        let observed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let mut events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        // stopped on every exit path, including timeout and navigation errors
        let _listener = {
            let observed = observed.clone();
            let last_activity = last_activity.clone();
            AbortOnDrop(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    observed.lock().push(event.request.url.clone());
                    *last_activity.lock() = Instant::now();
                }
            }))
        };

        page.set_user_agent(request.user_agent.as_str())
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        page.goto(request.url.as_str())
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        // 网络空闲：最近一个请求之后 `idle` 时间内没有新请求
        loop {
            let quiet_for = last_activity.lock().elapsed();
            if quiet_for >= request.idle {
                break;
            }
            tokio::time::sleep(IDLE_POLL.min(request.idle - quiet_for)).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| request.url.clone());

        let observed_requests = observed.lock().clone();

        Ok(RenderedPage {
            final_url,
            html,
            observed_requests,
        })
    }
}

#[async_trait]
impl BrowserCapability for ChromiumEngine {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        let browser = self.get_browser().await?;

        let context = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| RenderError::BrowserUnavailable(e.to_string()))?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(RenderError::Navigation)?;

        let outcome = match browser.new_page(target).await {
            Ok(page) => {
                let loaded = tokio::time::timeout(request.timeout, self.load(&page, request))
                    .await
                    .unwrap_or(Err(RenderError::Timeout));
                if let Err(e) = page.close().await {
                    debug!("关闭页面失败: {}", e);
                }
                loaded
            }
            Err(e) => Err(RenderError::Navigation(e.to_string())),
        };

        if let Err(e) = browser.execute(DisposeBrowserContextParams::new(context)).await {
            warn!("销毁浏览器上下文失败: {}", e);
        }

        outcome
    }

    async fn is_available(&self) -> bool {
        match self.get_browser().await {
            Ok(_) => true,
            Err(e) => {
                warn!("浏览器不可用: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}
