// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// 从完整 User-Agent 中提取产品标记（用于 robots 组匹配）
///
/// `websurvey-bot/1.0 (+https://example.org)` -> `websurvey-bot`
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .find(|s| !s.is_empty())
        .unwrap_or(user_agent)
}

/// 已解析的 robots.txt 策略
///
/// 路径判断委托给 `robotstxt` 匹配器，Crawl-delay 与 Sitemap 指令在此单独解析。
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    body: String,
    agent: String,
    crawl_delay: Option<Duration>,
    sitemaps: Vec<String>,
}

impl RobotsPolicy {
    /// 解析 robots.txt 内容
    pub fn parse(body: &str, user_agent: &str) -> Self {
        let agent = product_token(user_agent).to_string();
        Self {
            crawl_delay: parse_crawl_delay(body, &agent),
            sitemaps: parse_sitemaps(body),
            body: body.to_string(),
            agent,
        }
    }

    /// 不存在或不可获取的 robots.txt：允许全部
    pub fn allow_all(user_agent: &str) -> Self {
        Self::parse("", user_agent)
    }

    /// 判断URL是否允许抓取
    pub fn allows(&self, url: &str) -> bool {
        if self.body.trim().is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.body, &self.agent, url)
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }

    /// 声明的站点地图URL（按出现顺序，已去重）
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

fn directive<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(name) {
        Some(value.trim())
    } else {
        None
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

/// 解析 Crawl-delay 指令
///
/// 匹配产品标记的组优先，否则使用 `*` 组。同一组内连续的多行 User-agent 共享规则。
fn parse_crawl_delay(content: &str, agent: &str) -> Option<Duration> {
    let agent = agent.to_ascii_lowercase();
    let mut specific: Option<f64> = None;
    let mut wildcard: Option<f64> = None;

    let mut group_specific = false;
    let mut group_wildcard = false;
    let mut in_agent_lines = false;

    for raw in content.lines() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(ua) = directive(line, "user-agent") {
            if !in_agent_lines {
                group_specific = false;
                group_wildcard = false;
                in_agent_lines = true;
            }
            let ua = ua.to_ascii_lowercase();
            if ua == "*" {
                group_wildcard = true;
            } else if !ua.is_empty() && agent.starts_with(&ua) {
                group_specific = true;
            }
            continue;
        }
        in_agent_lines = false;

        if let Some(value) = directive(line, "crawl-delay") {
            let Ok(delay) = value.parse::<f64>() else {
                continue;
            };
            if !delay.is_finite() || delay < 0.0 {
                continue;
            }
            if group_specific && specific.is_none() {
                specific = Some(delay);
            } else if group_wildcard && wildcard.is_none() {
                wildcard = Some(delay);
            }
        }
    }

    specific.or(wildcard).map(Duration::from_secs_f64)
}

fn parse_sitemaps(content: &str) -> Vec<String> {
    let mut sitemaps: Vec<String> = Vec::new();
    for raw in content.lines() {
        // URLs may contain '#', so no comment stripping here
        if let Some(url) = directive(raw.trim(), "sitemap") {
            if !url.is_empty() && !sitemaps.iter().any(|s| s == url) {
                sitemaps.push(url.to_string());
            }
        }
    }
    sitemaps
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "websurvey-bot/1.0 (+https://example.org/bot)";

    #[test]
    fn test_product_token() {
        assert_eq!(product_token(UA), "websurvey-bot");
        assert_eq!(product_token("plain"), "plain");
    }

    #[test]
    fn test_empty_allows_everything() {
        let policy = RobotsPolicy::allow_all(UA);
        assert!(policy.allows("https://example.com/"));
        assert!(policy.crawl_delay().is_none());
        assert!(policy.sitemaps().is_empty());
    }

    #[test]
    fn test_disallow_root_for_all() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /\n", UA);
        assert!(!policy.allows("https://example.com/"));
        assert!(!policy.allows("https://example.com/terms"));
    }

    #[test]
    fn test_specific_group_overrides_wildcard() {
        let body = "User-agent: *\nDisallow: /\nCrawl-delay: 10\n\nUser-agent: websurvey-bot\nAllow: /\nCrawl-delay: 2\n";
        let policy = RobotsPolicy::parse(body, UA);
        assert!(policy.allows("https://example.com/legal"));
        assert_eq!(policy.crawl_delay(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_wildcard_crawl_delay_and_grouped_agents() {
        let body = "User-agent: otherbot\nUser-agent: *\nCrawl-delay: 1.5\n";
        let policy = RobotsPolicy::parse(body, UA);
        assert_eq!(policy.crawl_delay(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_other_agent_delay_ignored() {
        let body = "User-agent: otherbot\nCrawl-delay: 30\n";
        let policy = RobotsPolicy::parse(body, UA);
        assert!(policy.crawl_delay().is_none());
    }

    #[test]
    fn test_sitemaps_collected_in_order() {
        let body = "Sitemap: https://example.com/a.xml\nUser-agent: *\nDisallow:\nsitemap: https://example.com/b.xml\nSitemap: https://example.com/a.xml\n";
        let policy = RobotsPolicy::parse(body, UA);
        assert_eq!(
            policy.sitemaps(),
            &["https://example.com/a.xml".to_string(), "https://example.com/b.xml".to_string()]
        );
    }
}
