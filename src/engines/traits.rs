// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::domain::models::fetch::FetchResult;

/// 传输层抓取错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 连接被拒绝或无法建立
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),
    /// 重定向次数超过上限
    #[error("Too many redirects ({0})")]
    TooManyRedirects(usize),
    /// 声明的响应长度超过上限
    #[error("Body too large: {0} bytes")]
    BodyTooLarge(u64),
    /// TLS 握手或证书错误
    #[error("TLS error: {0}")]
    Tls(String),
    /// URL 无效
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// 其他传输错误
    #[error("Other error: {0}")]
    Other(String),
}

impl FetchError {
    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::ConnectionRefused(_) | FetchError::Other(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::ConnectionRefused(_) => "connection_refused",
            FetchError::TooManyRedirects(_) => "too_many_redirects",
            FetchError::BodyTooLarge(_) => "body_too_large",
            FetchError::Tls(_) => "tls_error",
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::Other(_) => "transport_error",
        }
    }
}

/// 浏览器渲染错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Render timeout")]
    Timeout,
    #[error("Navigation error: {0}")]
    Navigation(String),
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),
}

impl RenderError {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Timeout => "render_timeout",
            RenderError::Navigation(_) => "navigation_error",
            RenderError::BrowserUnavailable(_) => "browser_unavailable",
        }
    }
}

/// 原始抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: Url,
    /// 调查中的域名，用于判断重定向是否离站
    pub site: String,
    /// 将站点主机固定到该地址（解析结果）
    pub pin: Option<IpAddr>,
    /// 超时时间
    pub timeout: Duration,
    /// 响应体上限
    pub max_body_bytes: usize,
    /// 重定向跳数上限
    pub max_redirects: usize,
    pub user_agent: String,
}

/// 渲染请求
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: Url,
    /// 导航超时
    pub timeout: Duration,
    /// 网络空闲窗口
    pub idle: Duration,
    pub user_agent: String,
}

/// 渲染后的页面
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub final_url: Url,
    /// 渲染后的 DOM 序列化结果
    pub html: String,
    /// 页面加载期间观察到的请求URL（只用于审计）
    pub observed_requests: Vec<String>,
}

/// 原始HTTP抓取器
///
/// 不自动重试，重试策略由调度流水线负责。
#[async_trait]
pub trait RawFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 无头浏览器能力
#[async_trait]
pub trait BrowserCapability: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError>;

    /// 浏览器能否启动或连接
    async fn is_available(&self) -> bool;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
