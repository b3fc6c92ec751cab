// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

use crate::domain::models::survey::{ResolutionMethod, ResolutionSummary};
use crate::domain::models::target::Domain;

/// 名称解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("域名无法解析: {0}")]
    Unresolvable(String),

    /// 权威的否定应答（NXDOMAIN）
    #[error("域名不存在: {0}")]
    NoSuchDomain(String),

    #[error("DNSSEC 验证失败: {0}")]
    ValidationFailed(String),

    #[error("解析超时")]
    Timeout,

    /// 已解析，但 443 与 80 端口都不可连接
    #[error("主机不可达: {0}")]
    Unreachable(String),
}

impl ResolutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionError::Unresolvable(_) | ResolutionError::NoSuchDomain(_) => "unresolvable",
            ResolutionError::ValidationFailed(_) => "validation_failed",
            ResolutionError::Timeout => "timeout",
            ResolutionError::Unreachable(_) => "unreachable",
        }
    }
}

/// 解析得到的可用端点
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// 全部公网地址（已过滤私有地址）
    pub addresses: Vec<IpAddr>,
    /// 选中的连接地址（固定连接与礼貌闸门的键）
    pub primary: IpAddr,
    /// `https` 或 `http`
    pub scheme: String,
    pub port: u16,
    pub method: ResolutionMethod,
    pub authenticated: bool,
}

impl Resolution {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.primary, self.port)
    }

    /// 礼貌闸门的键：解析后的主机而非输入域名
    pub fn host_key(&self) -> String {
        self.socket_addr().to_string()
    }

    pub fn summary(&self) -> ResolutionSummary {
        ResolutionSummary {
            addresses: self.addresses.clone(),
            method: self.method,
            authenticated: self.authenticated,
            scheme: self.scheme.clone(),
            port: self.port,
        }
    }
}

/// 名称解析器
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, domain: &Domain) -> Result<Resolution, ResolutionError>;
}
