// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::services::legal_classifier::{ClassifierConfig, ClassifierWeights, DEFAULT_TERMS};
use crate::engines::router::ShellHeuristic;
use crate::infrastructure::resolver::ResolverOptions;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::survey_worker::{SurveyConfig, DEFAULT_USER_AGENT};

/// 应用程序配置设置
///
/// 按 默认值 → `config/default.*` → `config/{APP_ENVIRONMENT}.*` → `WEBSURVEY__*` 环境变量 的顺序叠加
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 调查流水线配置
    pub survey: SurveySettings,
    /// 名称解析配置
    pub resolver: ResolverSettings,
    /// 渲染配置
    pub render: RenderSettings,
    /// 分类器配置
    pub classifier: ClassifierSettings,
    /// 结果接收器配置
    pub sink: SinkSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 调查配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SurveySettings {
    /// 全局并发域名数
    pub max_workers: usize,
    /// 每个主机的并发请求数
    pub per_host_concurrency: usize,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 单个域名的总超时（秒）
    pub domain_timeout_secs: u64,
    pub max_candidates_per_domain: usize,
    /// 响应体上限（字节）
    pub max_body_bytes: usize,
    pub max_redirects: usize,
    /// 默认请求间隔（毫秒）
    pub default_crawl_delay_ms: u64,
    /// Crawl-delay 上限（秒）
    pub max_crawl_delay_secs: u64,
    pub max_sitemaps: usize,
    pub max_sitemap_entries: usize,
    pub probe_default_sitemap: bool,
    /// 抓取重试次数
    pub retry_max: u32,
    pub retry_base_ms: u64,
    pub retry_max_backoff_ms: u64,
    pub user_agent: String,
    pub store_content: bool,
    /// 域名列表文件（每行一个，`#` 开头为注释）
    pub domains_path: String,
    /// 已知域名集合文件（`.fst` 或文本列表）
    pub domain_trie_path: Option<String>,
}

/// 名称解析配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSettings {
    pub timeout_secs: u64,
    pub dnssec: bool,
    pub doh_servers: Vec<String>,
    /// 存活探测端口，按顺序尝试
    pub probe_ports: Vec<u16>,
    /// 允许私有地址（仅测试环境）
    pub allow_private: bool,
}

/// 渲染配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RenderSettings {
    pub enabled: bool,
    /// 浏览器不可用时终止运行
    pub required: bool,
    pub timeout_secs: u64,
    /// 网络空闲窗口（毫秒）
    pub idle_ms: u64,
    /// 已运行浏览器的调试地址；为空时自行启动
    pub remote_debugging_url: Option<String>,
    pub shell_body_bytes: usize,
    pub shell_min_text_chars: usize,
}

/// 分类器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSettings {
    pub url_weight: f64,
    pub anchor_weight: f64,
    pub title_weight: f64,
    pub heading_weight: f64,
    pub body_weight: f64,
    pub threshold: f64,
    pub terms: Vec<String>,
}

/// 结果接收器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SinkSettings {
    /// 每批记录数
    pub push_every: usize,
    pub flush_retries: u32,
    pub flush_backoff_ms: u64,
    /// 对象键前缀
    pub key_prefix: String,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 存储类型 (local, s3)
    pub storage_type: String,
    /// 本地存储路径 (当 type=local 时使用)
    pub local_path: Option<String>,
    /// S3 区域
    pub s3_region: Option<String>,
    /// S3 存储桶名称
    pub s3_bucket: Option<String>,
    /// S3 访问密钥
    pub s3_access_key: Option<String>,
    /// S3 密钥
    pub s3_secret_key: Option<String>,
    /// S3 端点 (可选，用于 MinIO 等兼容服务)
    pub s3_endpoint: Option<String>,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 输出 JSON 格式日志
    pub json: bool,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("WEBSURVEY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("resolver.doh_servers")
                    .with_list_parse_key("resolver.probe_ports")
                    .with_list_parse_key("classifier.terms"),
            )
            .build()?
            .try_deserialize()
    }

    /// 只含默认值的配置
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let terms: Vec<String> = DEFAULT_TERMS.iter().map(|t| t.to_string()).collect();
        let doh_servers: Vec<String> = ResolverOptions::default().doh_servers;
        let probe_ports: Vec<i64> = vec![443, 80];

        Config::builder()
            // Survey
            .set_default("survey.max_workers", 16)?
            .set_default("survey.per_host_concurrency", 1)?
            .set_default("survey.request_timeout_secs", 10)?
            .set_default("survey.domain_timeout_secs", 60)?
            .set_default("survey.max_candidates_per_domain", 50)?
            .set_default("survey.max_body_bytes", 2 * 1024 * 1024)?
            .set_default("survey.max_redirects", 5)?
            .set_default("survey.default_crawl_delay_ms", 1000)?
            .set_default("survey.max_crawl_delay_secs", 30)?
            .set_default("survey.max_sitemaps", 10)?
            .set_default("survey.max_sitemap_entries", 50_000)?
            .set_default("survey.probe_default_sitemap", false)?
            .set_default("survey.retry_max", 2)?
            .set_default("survey.retry_base_ms", 500)?
            .set_default("survey.retry_max_backoff_ms", 8000)?
            .set_default("survey.user_agent", DEFAULT_USER_AGENT)?
            .set_default("survey.store_content", true)?
            .set_default("survey.domains_path", "domains.txt")?
            // Resolver
            .set_default("resolver.timeout_secs", 5)?
            .set_default("resolver.dnssec", true)?
            .set_default("resolver.doh_servers", doh_servers)?
            .set_default("resolver.probe_ports", probe_ports)?
            .set_default("resolver.allow_private", false)?
            // Render
            .set_default("render.enabled", true)?
            .set_default("render.required", false)?
            .set_default("render.timeout_secs", 15)?
            .set_default("render.idle_ms", 500)?
            .set_default("render.shell_body_bytes", 1024)?
            .set_default("render.shell_min_text_chars", 200)?
            // Classifier
            .set_default("classifier.url_weight", 0.35)?
            .set_default("classifier.anchor_weight", 0.25)?
            .set_default("classifier.title_weight", 0.25)?
            .set_default("classifier.heading_weight", 0.10)?
            .set_default("classifier.body_weight", 0.05)?
            .set_default("classifier.threshold", 0.30)?
            .set_default("classifier.terms", terms)?
            // Sink
            .set_default("sink.push_every", 1000)?
            .set_default("sink.flush_retries", 3)?
            .set_default("sink.flush_backoff_ms", 1000)?
            .set_default("sink.key_prefix", "surveys")?
            // Storage
            .set_default("storage.storage_type", "local")?
            .set_default("storage.local_path", "./storage")?
            // Logging
            .set_default("logging.json", false)
    }

    /// 运行时调查配置
    pub fn survey_config(&self) -> SurveyConfig {
        let s = &self.survey;
        SurveyConfig {
            max_workers: s.max_workers.max(1),
            per_host_concurrency: s.per_host_concurrency.max(1),
            request_timeout: Duration::from_secs(s.request_timeout_secs),
            domain_timeout: Duration::from_secs(s.domain_timeout_secs),
            max_candidates: s.max_candidates_per_domain,
            max_body_bytes: s.max_body_bytes,
            max_redirects: s.max_redirects,
            default_crawl_delay: Duration::from_millis(s.default_crawl_delay_ms),
            max_crawl_delay: Duration::from_secs(s.max_crawl_delay_secs),
            max_sitemaps: s.max_sitemaps,
            max_sitemap_entries: s.max_sitemap_entries,
            probe_default_sitemap: s.probe_default_sitemap,
            retry: RetryPolicy::for_fetch(
                s.retry_max,
                Duration::from_millis(s.retry_base_ms),
                Duration::from_millis(s.retry_max_backoff_ms),
            ),
            user_agent: s.user_agent.clone(),
            store_content: s.store_content,
            render_timeout: Duration::from_secs(self.render.timeout_secs),
            render_idle: Duration::from_millis(self.render.idle_ms),
            render_required: self.render.required,
        }
    }
}

impl ResolverSettings {
    pub fn options(&self) -> ResolverOptions {
        let timeout = Duration::from_secs(self.timeout_secs);
        ResolverOptions {
            timeout,
            dnssec: self.dnssec,
            doh_servers: self.doh_servers.clone(),
            probe_ports: self.probe_ports.clone(),
            probe_timeout: timeout,
            allow_private: self.allow_private,
        }
    }
}

impl RenderSettings {
    pub fn heuristic(&self) -> ShellHeuristic {
        ShellHeuristic {
            body_bytes: self.shell_body_bytes,
            min_text_chars: self.shell_min_text_chars,
        }
    }
}

impl ClassifierSettings {
    pub fn config(&self) -> ClassifierConfig {
        ClassifierConfig {
            weights: ClassifierWeights {
                url: self.url_weight,
                anchor: self.anchor_weight,
                title: self.title_weight,
                heading: self.heading_weight,
                body: self.body_weight,
            },
            threshold: self.threshold,
            terms: self.terms.clone(),
        }
    }
}

impl SinkSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::for_flush(self.flush_retries, Duration::from_millis(self.flush_backoff_ms))
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;
