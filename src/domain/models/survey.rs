// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::models::fetch::{FetchResult, FetchStrategy};
use crate::domain::models::target::{Domain, FetchTarget, ResourceRole};

/// 单个域名调查流水线的状态
///
/// `Error` 可从任意阶段到达；`Complete` 与 `Error` 为终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyState {
    Pending,
    Resolving,
    FetchingRobots,
    FetchingRoot,
    ExpandingSitemap,
    FetchingCandidates,
    Classifying,
    Complete,
    Error,
}

impl SurveyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SurveyState::Complete | SurveyState::Error)
    }

    /// 流水线中的下一阶段
    pub fn next(&self) -> SurveyState {
        match self {
            SurveyState::Pending => SurveyState::Resolving,
            SurveyState::Resolving => SurveyState::FetchingRobots,
            SurveyState::FetchingRobots => SurveyState::FetchingRoot,
            SurveyState::FetchingRoot => SurveyState::ExpandingSitemap,
            SurveyState::ExpandingSitemap => SurveyState::FetchingCandidates,
            SurveyState::FetchingCandidates => SurveyState::Classifying,
            SurveyState::Classifying => SurveyState::Complete,
            SurveyState::Complete => SurveyState::Complete,
            SurveyState::Error => SurveyState::Error,
        }
    }
}

impl fmt::Display for SurveyState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SurveyState::Pending => "pending",
            SurveyState::Resolving => "resolving",
            SurveyState::FetchingRobots => "fetching_robots",
            SurveyState::FetchingRoot => "fetching_root",
            SurveyState::ExpandingSitemap => "expanding_sitemap",
            SurveyState::FetchingCandidates => "fetching_candidates",
            SurveyState::Classifying => "classifying",
            SurveyState::Complete => "complete",
            SurveyState::Error => "error",
        };
        f.write_str(s)
    }
}

/// 域名记录的总体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    /// 所有必抓资源都成功
    Complete,
    /// 已解析，但部分必抓资源失败或流水线被截断
    Partial,
    /// 解析失败
    Failed,
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SurveyStatus::Complete => write!(f, "complete"),
            SurveyStatus::Partial => write!(f, "partial"),
            SurveyStatus::Failed => write!(f, "failed"),
        }
    }
}

/// 名称解析方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// 本地解析器 + DNSSEC 验证
    Dnssec,
    /// DNS-over-HTTPS 回退
    DnsOverHttps,
    /// 由调用方注入（测试或静态映射）
    Static,
}

/// 写入记录的解析元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub addresses: Vec<IpAddr>,
    pub method: ResolutionMethod,
    /// 应答是否经过 DNSSEC 认证
    pub authenticated: bool,
    pub scheme: String,
    pub port: u16,
}

/// 阶段错误 `[stage, kind]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: SurveyState,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// 分类后的页面
///
/// 只有当标签为正、或目标为必抓资源时才会被持久化。
#[derive(Debug, Clone)]
pub struct ClassifiedPage {
    pub target: FetchTarget,
    pub result: FetchResult,
    pub is_legal_page: bool,
    pub confidence: f64,
    pub render_error: Option<String>,
}

impl ClassifiedPage {
    pub fn should_persist(&self) -> bool {
        self.is_legal_page || self.target.is_mandatory()
    }
}

/// 记录中的单条资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub path: String,
    pub url: String,
    pub role: ResourceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub skipped_by_policy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<FetchStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    pub is_legal_page: bool,
    pub confidence: f64,
    #[serde(default)]
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offsite_redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observed_requests: Vec<String>,
    /// gzip 压缩后 base64 编码的响应内容
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ResourceEntry {
    fn blank(target: &FetchTarget, url: &str) -> Self {
        Self {
            path: target.path.clone(),
            url: url.to_string(),
            role: target.role,
            status_code: None,
            error: None,
            skipped_by_policy: false,
            strategy: None,
            content_type: None,
            fetched_at: None,
            final_url: None,
            is_legal_page: false,
            confidence: 0.0,
            size: 0,
            content_sha256: None,
            truncated: false,
            offsite_redirect: None,
            remote_addr: None,
            last_modified: None,
            render_error: None,
            observed_requests: Vec::new(),
            content: None,
        }
    }

    /// 由 robots 策略跳过的资源
    pub fn skipped(target: &FetchTarget, url: &str) -> Self {
        let mut entry = Self::blank(target, url);
        entry.skipped_by_policy = true;
        entry
    }

    /// 重试预算耗尽后仍失败的资源
    pub fn failed(target: &FetchTarget, url: &str, kind: &str) -> Self {
        let mut entry = Self::blank(target, url);
        entry.error = Some(kind.to_string());
        entry
    }

    /// 由分类结果构造
    pub fn from_page(page: &ClassifiedPage, store_content: bool) -> Self {
        let result = &page.result;
        let mut entry = Self::blank(&page.target, result.url.as_str());
        entry.status_code = Some(result.status);
        entry.strategy = Some(result.strategy);
        entry.content_type = Some(result.content_type.clone());
        entry.fetched_at = Some(result.fetched_at);
        entry.final_url = Some(result.final_url.to_string());
        entry.is_legal_page = page.is_legal_page;
        entry.confidence = page.confidence;
        entry.size = result.size();
        entry.content_sha256 = Some(result.content_sha256());
        entry.truncated = result.truncated;
        entry.offsite_redirect = result.offsite_redirect.clone();
        entry.remote_addr = result.remote_addr.clone();
        entry.last_modified = result.last_modified;
        entry.render_error = page.render_error.clone();
        entry.observed_requests = result.observed_requests.clone();
        if store_content && !result.content.is_empty() {
            entry.content = encode_content(&result.content);
        }
        entry
    }

    /// 必抓资源是否算作成功（得到任意HTTP响应，或被策略跳过）
    pub fn succeeded(&self) -> bool {
        self.skipped_by_policy || (self.status_code.is_some() && self.error.is_none())
    }
}

/// gzip + base64
fn encode_content(content: &[u8]) -> Option<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).ok()?;
    let compressed = encoder.finish().ok()?;
    Some(BASE64.encode(compressed))
}

/// 单个域名在一次运行中的调查记录
///
/// 每个域名每次运行恰好产生一条，是交给结果接收器的最小单位。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSurveyRecord {
    pub run_id: Uuid,
    pub domain: Domain,
    pub resolved: bool,
    pub status: SurveyStatus,
    /// 流水线结束时所处的终止状态
    pub final_state: SurveyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl_delay_ms: Option<u64>,
    pub candidates_attempted: usize,
    pub resources: Vec<ResourceEntry>,
    pub errors: Vec<StageError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DomainSurveyRecord {
    /// 任务异常终止时合成的失败记录
    pub fn failed(run_id: Uuid, domain: Domain, stage: SurveyState, kind: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            domain,
            resolved: false,
            status: SurveyStatus::Failed,
            final_state: SurveyState::Error,
            resolution: None,
            crawl_delay_ms: None,
            candidates_attempted: 0,
            resources: Vec::new(),
            errors: vec![StageError {
                stage,
                kind: kind.to_string(),
                path: None,
                detail: None,
            }],
            started_at: now,
            finished_at: now,
        }
    }

    pub fn resource(&self, path: &str) -> Option<&ResourceEntry> {
        self.resources.iter().find(|r| r.path == path)
    }

    pub fn legal_pages(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources.iter().filter(|r| r.is_legal_page)
    }
}
