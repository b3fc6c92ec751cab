// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

use crate::utils::text_encoding;

/// 抓取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// 直接HTTP请求
    Raw,
    /// 无头浏览器渲染
    Rendered,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FetchStrategy::Raw => write!(f, "raw"),
            FetchStrategy::Rendered => write!(f, "rendered"),
        }
    }
}

/// 单个抓取目标的成功结果
///
/// 由一次抓取器调用产生，之后不可变。传输层错误不在此处表示，
/// 见 `engines::traits::FetchError`。
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// 请求的URL
    pub url: Url,
    /// 跟随重定向后的最终URL
    pub final_url: Url,
    /// HTTP状态码
    pub status: u16,
    /// 响应内容（已按上限截断）
    pub content: Bytes,
    /// 内容类型
    pub content_type: String,
    /// 使用的抓取策略
    pub strategy: FetchStrategy,
    /// 抓取时间
    pub fetched_at: DateTime<Utc>,
    /// 内容是否因超过上限而被截断
    pub truncated: bool,
    /// 跟随过的重定向链（不含最终URL）
    pub redirects: Vec<String>,
    /// 指向其他站点的重定向目标（记录但不跟随）
    pub offsite_redirect: Option<String>,
    /// 实际连接的对端地址
    pub remote_addr: Option<String>,
    /// Last-Modified 头
    pub last_modified: Option<DateTime<Utc>>,
    /// 渲染期间观察到的网络请求（仅用于审计）
    pub observed_requests: Vec<String>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.contains("text/html") || ct.contains("application/xhtml")
    }

    pub fn is_textual(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        self.is_html() || ct.starts_with("text/") || ct.contains("xml") || ct.contains("json")
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// 内容的 SHA-256 十六进制摘要
    pub fn content_sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.content))
    }

    /// 按响应字符集解码内容
    pub fn text(&self) -> String {
        text_encoding::decode_body(&self.content, Some(&self.content_type))
    }
}
