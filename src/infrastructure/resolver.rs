// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioAsyncResolver;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::domain::models::survey::ResolutionMethod;
use crate::domain::models::target::Domain;
use crate::domain::repositories::name_resolver::{NameResolver, Resolution, ResolutionError};
use crate::engines::validators::is_private_ip;

/// DNS 记录类型
const RECORD_A: u16 = 1;
const RECORD_AAAA: u16 = 28;

/// DoH JSON 状态码
const RCODE_SERVFAIL: u32 = 2;
const RCODE_NXDOMAIN: u32 = 3;

/// 解析器配置
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub timeout: Duration,
    /// 首先尝试本地 DNSSEC 验证解析
    pub dnssec: bool,
    /// DoH JSON 端点，按顺序尝试
    pub doh_servers: Vec<String>,
    /// 按顺序探测的端口，443 映射为 https，其余为 http
    pub probe_ports: Vec<u16>,
    pub probe_timeout: Duration,
    /// 允许私有地址（仅用于测试环境）
    pub allow_private: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            dnssec: true,
            doh_servers: vec![
                "https://cloudflare-dns.com/dns-query".to_string(),
                "https://dns.google/resolve".to_string(),
            ],
            probe_ports: vec![443, 80],
            probe_timeout: Duration::from_secs(3),
            allow_private: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "AD", default)]
    authenticated: bool,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// 混合解析器
///
/// 先用本地解析器做 DNSSEC 验证查询；验证失败或本地解析不可用时，
/// 回退到 DNS-over-HTTPS。解析成功后探测端口以选择协议。
pub struct HybridResolver {
    validating: Option<TokioAsyncResolver>,
    client: reqwest::Client,
    options: ResolverOptions,
}

impl HybridResolver {
    pub fn new(options: ResolverOptions) -> Self {
        let validating = options.dnssec.then(|| {
            let (config, mut opts) = read_system_conf().unwrap_or_else(|e| {
                warn!("读取系统DNS配置失败，使用默认配置: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            });
            opts.validate = true;
            opts.timeout = options.timeout;
            opts.attempts = 1;
            TokioAsyncResolver::tokio(config, opts)
        });

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("DoH 客户端构建失败，使用默认客户端: {}", e);
                reqwest::Client::new()
            });

        Self {
            validating,
            client,
            options,
        }
    }

    /// 本地 DNSSEC 验证查询
    async fn lookup_validated(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError> {
        let Some(resolver) = &self.validating else {
            return Err(ResolutionError::ValidationFailed("dnssec disabled".to_string()));
        };

        let lookup = tokio::time::timeout(self.options.timeout, resolver.lookup_ip(name))
            .await
            .map_err(|_| ResolutionError::Timeout)?;

        match lookup {
            Ok(ips) => Ok(ips.iter().collect()),
            Err(e) => Err(match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => ResolutionError::Unresolvable(e.to_string()),
                ResolveErrorKind::Timeout => ResolutionError::Timeout,
                _ => ResolutionError::ValidationFailed(e.to_string()),
            }),
        }
    }

    async fn doh_query(&self, server: &str, name: &str, record_type: &str) -> Result<DohResponse, ResolutionError> {
        let response = self
            .client
            .get(server)
            .query(&[("name", name), ("type", record_type)])
            .header("Accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResolutionError::Timeout
                } else {
                    ResolutionError::Unresolvable(format!("DoH {}: {}", server, e))
                }
            })?;

        // 一些服务器返回 application/dns-json 而非 application/json
        let body = response
            .bytes()
            .await
            .map_err(|e| ResolutionError::Unresolvable(format!("DoH {}: {}", server, e)))?;
        serde_json::from_slice(&body).map_err(|e| ResolutionError::Unresolvable(format!("DoH {}: {}", server, e)))
    }

    /// 在单个 DoH 服务器上查询 A 与 AAAA
    async fn lookup_doh_on(&self, server: &str, name: &str) -> Result<(Vec<IpAddr>, bool), ResolutionError> {
        let v4 = self.doh_query(server, name, "A").await?;
        match v4.status {
            0 => {}
            RCODE_NXDOMAIN => return Err(ResolutionError::NoSuchDomain(format!("NXDOMAIN via {}", server))),
            RCODE_SERVFAIL => return Err(ResolutionError::ValidationFailed(format!("SERVFAIL via {}", server))),
            other => return Err(ResolutionError::Unresolvable(format!("rcode {} via {}", other, server))),
        }

        let mut authenticated = v4.authenticated;
        let mut answers = v4.answer;
        match self.doh_query(server, name, "AAAA").await {
            Ok(v6) if v6.status == 0 => {
                authenticated &= v6.authenticated;
                answers.extend(v6.answer);
            }
            Ok(_) => {}
            Err(e) => debug!("AAAA 查询失败 {}: {}", name, e),
        }

        let addresses: Vec<IpAddr> = answers
            .iter()
            .filter(|a| a.record_type == RECORD_A || a.record_type == RECORD_AAAA)
            .filter_map(|a| a.data.trim().parse().ok())
            .collect();
        Ok((addresses, authenticated))
    }

    /// 依次尝试 DoH 服务器
    async fn lookup_doh(&self, name: &str) -> Result<(Vec<IpAddr>, bool), ResolutionError> {
        let mut last_error = ResolutionError::Unresolvable("no DoH servers configured".to_string());
        for server in &self.options.doh_servers {
            match self.lookup_doh_on(server, name).await {
                Ok(found) => return Ok(found),
                // 权威的否定应答无需再问其他服务器
                Err(e @ ResolutionError::NoSuchDomain(_)) => return Err(e),
                Err(e) => {
                    debug!("DoH 查询 {} 失败: {}", server, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// 探测端口，返回首个可连接的 (地址, 端口)
    async fn probe(&self, addresses: &[IpAddr]) -> Option<(IpAddr, u16)> {
        for &port in &self.options.probe_ports {
            for &ip in addresses {
                let addr = SocketAddr::new(ip, port);
                match tokio::time::timeout(self.options.probe_timeout, TcpStream::connect(addr)).await {
                    Ok(Ok(_)) => return Some((ip, port)),
                    Ok(Err(e)) => debug!("探测 {} 失败: {}", addr, e),
                    Err(_) => debug!("探测 {} 超时", addr),
                }
            }
        }
        None
    }
}

#[async_trait]
impl NameResolver for HybridResolver {
    async fn resolve(&self, domain: &Domain) -> Result<Resolution, ResolutionError> {
        let name = domain.as_str();

        let (addresses, method, authenticated) = match self.lookup_validated(name).await {
            Ok(addresses) if !addresses.is_empty() => (addresses, ResolutionMethod::Dnssec, true),
            validated => {
                if let Err(e) = &validated {
                    debug!("本地验证解析 {} 失败，回退到 DoH: {}", name, e);
                }
                let (addresses, ad) = self.lookup_doh(name).await?;
                (addresses, ResolutionMethod::DnsOverHttps, ad)
            }
        };

        let addresses: Vec<IpAddr> = addresses
            .into_iter()
            .filter(|ip| self.options.allow_private || !is_private_ip(*ip))
            .collect();
        if addresses.is_empty() {
            return Err(ResolutionError::Unresolvable(format!("{} has no public addresses", name)));
        }

        let (primary, port) = self
            .probe(&addresses)
            .await
            .ok_or_else(|| ResolutionError::Unreachable(name.to_string()))?;
        let scheme = if port == 443 { "https" } else { "http" };

        info!("{} -> {} ({}:{}, {:?})", name, primary, scheme, port, method);
        Ok(Resolution {
            addresses,
            primary,
            scheme: scheme.to_string(),
            port,
            method,
            authenticated,
        })
    }
}

/// 静态解析器：从固定映射返回结果
pub struct StaticResolver {
    entries: HashMap<String, Resolution>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// 将域名映射到给定地址
    pub fn with(mut self, domain: &str, ip: IpAddr, scheme: &str, port: u16) -> Self {
        self.entries.insert(
            domain.to_string(),
            Resolution {
                addresses: vec![ip],
                primary: ip,
                scheme: scheme.to_string(),
                port,
                method: ResolutionMethod::Static,
                authenticated: false,
            },
        );
        self
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameResolver for StaticResolver {
    async fn resolve(&self, domain: &Domain) -> Result<Resolution, ResolutionError> {
        self.entries
            .get(domain.as_str())
            .cloned()
            .ok_or_else(|| ResolutionError::Unresolvable(domain.to_string()))
    }
}
