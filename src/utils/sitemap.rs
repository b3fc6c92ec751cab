// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::io::Read;
use tracing::debug;

use crate::utils::errors::ParseError;

/// 站点地图中的一个URL条目
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// 站点地图解析结果
///
/// `urlset` 产生 `entries`，`sitemapindex` 产生 `children`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSitemap {
    pub entries: Vec<SitemapEntry>,
    pub children: Vec<String>,
}

/// 解析 urlset 或 sitemapindex
///
/// 条目数超过 `max_entries` 后停止收集，文档其余部分仍需良构。
/// 只读取 `url`/`sitemap` 的直接子元素 `loc`/`lastmod`，且须位于站点地图命名空间
/// （或未声明命名空间）；`image:loc`、`video:*` 等扩展元素被忽略。
pub fn parse_sitemap(xml: &str, max_entries: usize) -> Result<ParsedSitemap, ParseError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedSitemap::default();
    let mut buf = Vec::new();

    let mut saw_root = false;
    let mut depth: usize = 0;
    // 当前 url/sitemap 元素所在深度
    let mut url_depth: Option<usize> = None;
    let mut sitemap_depth: Option<usize> = None;
    let mut field = Field::None;
    let mut current_loc = String::new();
    let mut current_lastmod = String::new();

    loop {
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let in_ns = is_sitemap_namespace(&ns);

        match event {
            Event::Start(e) => {
                depth += 1;
                field = Field::None;
                let entry_depth = url_depth.or(sitemap_depth);
                match e.local_name().as_ref() {
                    _ if !in_ns => {}
                    b"urlset" | b"sitemapindex" if depth == 1 => saw_root = true,
                    b"url" if entry_depth.is_none() => {
                        url_depth = Some(depth);
                        current_loc.clear();
                        current_lastmod.clear();
                    }
                    b"sitemap" if entry_depth.is_none() => {
                        sitemap_depth = Some(depth);
                        current_loc.clear();
                    }
                    b"loc" if entry_depth.map(|d| d + 1) == Some(depth) => field = Field::Loc,
                    b"lastmod" if url_depth.map(|d| d + 1) == Some(depth) => field = Field::Lastmod,
                    _ => {}
                }
            }
            Event::End(_) => {
                if url_depth == Some(depth) {
                    if !current_loc.is_empty() && parsed.entries.len() < max_entries {
                        parsed.entries.push(SitemapEntry {
                            loc: current_loc.clone(),
                            lastmod: parse_date(&current_lastmod),
                        });
                    }
                    url_depth = None;
                } else if sitemap_depth == Some(depth) {
                    if !current_loc.is_empty() {
                        parsed.children.push(current_loc.clone());
                    }
                    sitemap_depth = None;
                }
                depth = depth.saturating_sub(1);
                field = Field::None;
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| ParseError::Malformed(e.to_string()))?;
                field.capture(text.trim(), &mut current_loc, &mut current_lastmod);
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = String::from_utf8_lossy(&raw);
                field.capture(text.trim(), &mut current_loc, &mut current_lastmod);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // quick-xml does not report unclosed elements at EOF
    if depth != 0 {
        return Err(ParseError::Malformed("unexpected end of document".to_string()));
    }
    if !saw_root {
        return Err(ParseError::Malformed("missing urlset or sitemapindex".to_string()));
    }
    debug!("站点地图: {} 条目, {} 个子地图", parsed.entries.len(), parsed.children.len());
    Ok(parsed)
}

#[derive(Clone, Copy)]
enum Field {
    None,
    Loc,
    Lastmod,
}

impl Field {
    fn capture(self, text: &str, loc: &mut String, lastmod: &mut String) {
        match self {
            Field::Loc => loc.push_str(text),
            Field::Lastmod => lastmod.push_str(text),
            Field::None => {}
        }
    }
}

/// sitemaps.org 0.9 与旧版 google 0.84 命名空间；扩展命名空间（sitemap-image 等）不匹配
fn is_sitemap_namespace(ns: &ResolveResult) -> bool {
    match ns {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(uri)) => String::from_utf8_lossy(uri).contains("/schemas/sitemap/"),
        ResolveResult::Unknown(_) => false,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// 若内容为 gzip 则解压（解压后大小不超过 `limit`）
pub fn maybe_gunzip(body: &[u8], limit: usize) -> Result<Vec<u8>, ParseError> {
    if body.len() < 2 || body[0] != 0x1f || body[1] != 0x8b {
        return Ok(body.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(body)
        .take(limit as u64)
        .read_to_end(&mut out)
        .map_err(|e| ParseError::Malformed(format!("gzip: {}", e)))?;
    Ok(out)
}
