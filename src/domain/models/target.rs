// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 始终抓取的资源路径（与分类结果无关）
///
/// robots.txt 必须排在首位，其余资源在解析 robots 之后抓取。
pub const MANDATORY_PATHS: [&str; 5] = ["/robots.txt", "/", "/ai.txt", "/humans.txt", "/security.txt"];

/// robots.txt 路径
pub const ROBOTS_PATH: &str = "/robots.txt";

/// 根路径
pub const ROOT_PATH: &str = "/";

/// 可注册域名
///
/// 只能通过 `DomainMatcher` 构造，进入调查运行后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// 由已规范化的名称构造（仅限匹配器使用）
    pub(crate) fn new_unchecked(name: String) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 资源在调查中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRole {
    /// 五个必抓资源之一
    Mandatory,
    /// robots 声明的站点地图（或站点地图索引的子地图）
    Sitemap,
    /// 通过站点地图或页面链接发现的候选页
    Candidate,
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResourceRole::Mandatory => write!(f, "mandatory"),
            ResourceRole::Sitemap => write!(f, "sitemap"),
            ResourceRole::Candidate => write!(f, "candidate"),
        }
    }
}

/// HTTP 方法（只允许 GET）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FetchMethod {
    #[default]
    Get,
}

/// 抓取目标
///
/// (域名, 路径, 方法) 三元组。每次调查尝试中至多消费一次（重试除外）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTarget {
    pub domain: Domain,
    /// 路径（含查询串），始终以 `/` 开头
    pub path: String,
    pub method: FetchMethod,
    pub role: ResourceRole,
}

impl FetchTarget {
    pub fn mandatory(domain: &Domain, path: &str) -> Self {
        Self {
            domain: domain.clone(),
            path: path.to_string(),
            method: FetchMethod::Get,
            role: ResourceRole::Mandatory,
        }
    }

    pub fn sitemap(domain: &Domain, path: String) -> Self {
        Self {
            domain: domain.clone(),
            path,
            method: FetchMethod::Get,
            role: ResourceRole::Sitemap,
        }
    }

    pub fn candidate(domain: &Domain, path: String) -> Self {
        Self {
            domain: domain.clone(),
            path,
            method: FetchMethod::Get,
            role: ResourceRole::Candidate,
        }
    }

    pub fn is_mandatory(&self) -> bool {
        self.role == ResourceRole::Mandatory
    }

    /// 是否允许对该目标使用渲染抓取（仅根路径与候选页）
    pub fn allows_render(&self) -> bool {
        match self.role {
            ResourceRole::Mandatory => self.path == ROOT_PATH,
            ResourceRole::Candidate => true,
            ResourceRole::Sitemap => false,
        }
    }
}
