// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 构造某个域名下指定路径的URL
pub fn build_url(scheme: &str, host: &str, port: u16, path: &str) -> Result<Url, ParseError> {
    let default_port = matches!((scheme, port), ("https", 443) | ("http", 80));
    let base = if default_port {
        format!("{}://{}", scheme, host)
    } else {
        format!("{}://{}:{}", scheme, host, port)
    };
    Url::parse(&base)?.join(path)
}

/// 返回URL的路径与查询串部分（去除片段）
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

/// 去除主机名中的 `www.` 前缀并转为小写
pub fn strip_www(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}
