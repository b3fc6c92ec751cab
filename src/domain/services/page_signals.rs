// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html, Selector};

/// 页面中的一个链接
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub href: String,
    /// 锚文本（含 `title`/`aria-label` 属性）
    pub text: String,
}

/// 从HTML中提取的分类与启发式信号
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSignals {
    pub title: Option<String>,
    /// h1/h2 文本
    pub headings: Vec<String>,
    /// 按文档顺序排列的链接
    pub links: Vec<PageLink>,
    /// 可见文本（不含脚本、样式与标题元素）
    pub text: String,
    pub script_count: usize,
    /// 内联脚本字符数
    pub script_chars: usize,
    /// noscript 中是否要求启用 JavaScript
    pub noscript_requires_js: bool,
}

impl PageSignals {
    pub fn text_chars(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

const HIDDEN: [&str; 5] = ["script", "style", "noscript", "template", "title"];

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef) -> String {
    collapse(&el.text().collect::<String>())
}

/// 解析HTML并提取信号
pub fn extract_signals(html: &str) -> PageSignals {
    let doc = Html::parse_document(html);
    let mut signals = PageSignals::default();

    if let Ok(sel) = Selector::parse("title") {
        signals.title = doc
            .select(&sel)
            .map(|el| element_text(&el))
            .find(|t| !t.is_empty());
    }

    if let Ok(sel) = Selector::parse("h1, h2") {
        signals.headings = doc
            .select(&sel)
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .collect();
    }

    if let Ok(sel) = Selector::parse("a[href]") {
        for el in doc.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let mut text = element_text(&el);
            for attr in ["title", "aria-label"] {
                if let Some(extra) = el.value().attr(attr) {
                    text.push(' ');
                    text.push_str(extra.trim());
                }
            }
            signals.links.push(PageLink {
                href: href.trim().to_string(),
                text: text.trim().to_string(),
            });
        }
    }

    if let Ok(sel) = Selector::parse("script") {
        for el in doc.select(&sel) {
            signals.script_count += 1;
            signals.script_chars += el.text().map(str::len).sum::<usize>();
        }
    }

    if let Ok(sel) = Selector::parse("noscript") {
        signals.noscript_requires_js = doc.select(&sel).any(|el| {
            let text = el.text().collect::<String>().to_ascii_lowercase();
            text.contains("javascript") || text.contains("enable js")
        });
    }

    let mut text = String::new();
    for node in doc.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN.contains(&e.name()))
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    signals.text = collapse(&text);

    signals
}
