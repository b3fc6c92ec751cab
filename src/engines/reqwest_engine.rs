// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use std::error::Error as _;
use std::net::SocketAddr;
use tracing::debug;

use crate::domain::models::fetch::{FetchResult, FetchStrategy};
use crate::engines::traits::{FetchError, FetchRequest, RawFetcher};
use crate::engines::validators::same_site;

/// 抓取引擎
///
/// 基于reqwest实现的原始HTTP抓取器。手动跟随重定向以便限制跳数并识别离站跳转，
/// 站点主机被固定到解析器给出的地址。
pub struct ReqwestEngine;

/// 将 reqwest 错误映射为抓取错误
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }
    if err.is_builder() {
        return FetchError::InvalidUrl(err.to_string());
    }

    // 遍历错误链识别TLS错误
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }
    let lowered = chain.to_ascii_lowercase();
    if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("handshake") {
        return FetchError::Tls(chain);
    }
    if err.is_connect() {
        return FetchError::ConnectionRefused(chain);
    }
    FetchError::Other(chain)
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

impl ReqwestEngine {
    fn build_client(&self, request: &FetchRequest) -> Result<reqwest::Client, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(request.user_agent.as_str())
            .timeout(request.timeout)
            .connect_timeout(request.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();

        if let (Some(ip), Some(host)) = (request.pin, request.url.host_str()) {
            // port 0 keeps the scheme's conventional port
            builder = builder.resolve(host, SocketAddr::new(ip, 0));
        }

        builder.build().map_err(map_reqwest_error)
    }

    async fn read_capped(
        &self,
        mut response: reqwest::Response,
        max_body_bytes: usize,
    ) -> Result<(Bytes, bool), FetchError> {
        if let Some(len) = response.content_length() {
            if len > max_body_bytes as u64 {
                return Err(FetchError::BodyTooLarge(len));
            }
        }

        let mut buf = BytesMut::new();
        let mut truncated = false;
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            let remaining = max_body_bytes - buf.len();
            if chunk.len() > remaining {
                buf.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                break;
            }
            buf.extend_from_slice(&chunk);
        }
        Ok((buf.freeze(), truncated))
    }
}

#[async_trait]
impl RawFetcher for ReqwestEngine {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(request.url.to_string()));
        }

        let client = self.build_client(request)?;
        let mut current = request.url.clone();
        let mut redirects: Vec<String> = Vec::new();

        loop {
            let response = client.get(current.clone()).send().await.map_err(map_reqwest_error)?;
            let status = response.status().as_u16();

            let location = if is_redirect(status) {
                response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| current.join(loc).ok())
            } else {
                None
            };

            let mut offsite_redirect = None;
            if let Some(next) = location {
                let onsite = matches!(next.scheme(), "http" | "https")
                    && next.host_str().is_some_and(|h| same_site(h, &request.site));
                if onsite {
                    if redirects.len() >= request.max_redirects {
                        return Err(FetchError::TooManyRedirects(redirects.len()));
                    }
                    debug!("重定向 {} -> {}", current, next);
                    redirects.push(current.to_string());
                    current = next;
                    continue;
                }
                // 离站重定向：记录，不跟随
                offsite_redirect = Some(next.to_string());
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or("application/octet-stream")
                .to_string();
            let last_modified = response
                .headers()
                .get(LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
                .map(|dt| dt.with_timezone(&Utc));
            let remote_addr = response.remote_addr().map(|a| a.to_string());

            let (content, truncated) = self.read_capped(response, request.max_body_bytes).await?;

            return Ok(FetchResult {
                url: request.url.clone(),
                final_url: current,
                status,
                content,
                content_type,
                strategy: FetchStrategy::Raw,
                fetched_at: Utc::now(),
                truncated,
                redirects,
                offsite_redirect,
                remote_addr,
                last_modified,
                observed_requests: Vec::new(),
            });
        }
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
