// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use fst::Set;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::models::target::Domain;
use crate::utils::errors::DomainError;

/// 域名匹配器
///
/// 校验并去重输入域名列表。可选地加载一个紧凑的前缀集合（fst），
/// 键为反转后的标签序列（`com.example`），因此某个已知可注册域名的子域也被接受。
/// 未加载集合时只做语法校验。
pub struct DomainMatcher {
    known: Option<Set<Vec<u8>>>,
}

impl DomainMatcher {
    /// 仅语法校验
    pub fn syntactic() -> Self {
        Self { known: None }
    }

    /// 从预先构建的 fst 字节加载
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DomainError> {
        let set = Set::new(bytes).map_err(|e| DomainError::Load(e.to_string()))?;
        Ok(Self { known: Some(set) })
    }

    /// 从域名列表构建集合
    pub fn from_domains<I, S>(domains: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = domains
            .into_iter()
            .filter_map(|d| normalize(d.as_ref()).ok())
            .map(|d| reverse_labels(&d))
            .collect();
        keys.sort();
        keys.dedup();

        let set = Set::from_iter(keys).map_err(|e| DomainError::Load(e.to_string()))?;
        Ok(Self { known: Some(set) })
    }

    /// 加载集合文件：`.fst` 为二进制产物，其他扩展名按每行一个域名处理
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| DomainError::Load(format!("{}: {}", path.display(), e)))?;

        let matcher = if path.extension().is_some_and(|ext| ext == "fst") {
            Self::from_bytes(bytes)?
        } else {
            let text = String::from_utf8_lossy(&bytes);
            Self::from_domains(text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')))?
        };
        info!("已加载域名集合: {} ({} 项)", path.display(), matcher.len());
        Ok(matcher)
    }

    /// 序列化为 fst 字节
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        self.known.as_ref().map(|set| set.as_fst().as_bytes().to_vec())
    }

    pub fn len(&self) -> usize {
        self.known.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 名称（已规范化）是否属于已知集合
    ///
    /// 在任一标签边界上命中集合即为已知。未加载集合时总是返回 true。
    pub fn is_known(&self, name: &str) -> bool {
        let Some(set) = &self.known else {
            return true;
        };
        let reversed = reverse_labels(name);
        let mut end = 0;
        for (i, label) in reversed.split('.').enumerate() {
            end += label.len() + usize::from(i > 0);
            if set.contains(&reversed[..end]) {
                return true;
            }
        }
        false
    }

    /// 校验单个输入
    pub fn accept(&self, input: &str) -> Result<Domain, DomainError> {
        let name = normalize(input)?;
        if !self.is_known(&name) {
            return Err(DomainError::Unknown(name));
        }
        Ok(Domain::new_unchecked(name))
    }

    /// 校验并按首次出现顺序去重
    ///
    /// 返回被接受的域名与被拒绝的输入。
    pub fn dedupe<I, S>(&self, inputs: I) -> (Vec<Domain>, Vec<(String, DomainError)>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for input in inputs {
            let input = input.as_ref();
            if input.trim().is_empty() {
                continue;
            }
            match self.accept(input) {
                Ok(domain) => {
                    if seen.insert(domain.clone()) {
                        accepted.push(domain);
                    } else {
                        debug!("重复域名: {}", input);
                    }
                }
                Err(e) => rejected.push((input.to_string(), e)),
            }
        }

        (accepted, rejected)
    }
}

/// 规范化输入域名
///
/// 去掉协议、路径、端口与末尾的点，转为小写 ASCII（IDN 转为 punycode），再做语法校验。
pub fn normalize(input: &str) -> Result<String, DomainError> {
    let invalid = || DomainError::Invalid(input.to_string());

    let mut s = input.trim();
    if let Some(idx) = s.find("://") {
        s = &s[idx + 3..];
    }
    let s = s.split(['/', '?', '#']).next().unwrap_or_default();
    let s = match s.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => s,
    };
    let s = s.trim_end_matches('.');
    if s.is_empty() {
        return Err(invalid());
    }

    let name = match url::Host::parse(s).map_err(|_| invalid())? {
        url::Host::Domain(d) => d.to_ascii_lowercase(),
        // IP 字面量不是可注册域名
        _ => return Err(invalid()),
    };

    if name.len() > 253 {
        return Err(invalid());
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    for label in &labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(invalid());
        }
    }
    if labels.last().is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit())) {
        return Err(invalid());
    }
    Ok(name)
}

fn reverse_labels(name: &str) -> String {
    name.split('.').rev().collect::<Vec<_>>().join(".")
}
