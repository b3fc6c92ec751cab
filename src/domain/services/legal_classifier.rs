// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::models::fetch::FetchResult;
use crate::domain::services::page_signals::{extract_signals, PageSignals};
use crate::utils::errors::ClassificationError;

/// 默认的法律相关术语
pub const DEFAULT_TERMS: &[&str] = &[
    "terms of service",
    "terms of use",
    "terms and conditions",
    "terms",
    "tos",
    "legal",
    "privacy policy",
    "privacy",
    "conditions of use",
    "user agreement",
    "eula",
    "impressum",
    "agb",
    "cookie policy",
    "acceptable use",
    "disclaimer",
    "copyright",
];

/// 各信号的权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierWeights {
    pub url: f64,
    pub anchor: f64,
    pub title: f64,
    pub heading: f64,
    pub body: f64,
}

impl Default for ClassifierWeights {
    fn default() -> Self {
        Self {
            url: 0.35,
            anchor: 0.25,
            title: 0.25,
            heading: 0.10,
            body: 0.05,
        }
    }
}

impl ClassifierWeights {
    fn total(&self) -> f64 {
        self.url + self.anchor + self.title + self.heading + self.body
    }
}

/// 分类器配置
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub weights: ClassifierWeights,
    /// 置信度不低于该值即标为法律页面
    pub threshold: f64,
    pub terms: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights: ClassifierWeights::default(),
            threshold: 0.30,
            terms: DEFAULT_TERMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// 分类结果
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_legal_page: bool,
    pub confidence: f64,
}

/// 法律页面分类器
///
/// 置信度为命中信号的加权和除以权重总和，落在 [0,1]。
/// 每个信号强度只会随命中增多而增大，因此命中更多信号的文档得分不会更低。
/// 分类是内容、URL与锚文本的纯函数。
#[derive(Debug, Clone)]
pub struct LegalClassifier {
    config: ClassifierConfig,
    /// 规范化后的短语
    phrases: Vec<String>,
    /// 去掉空格的短语，用于 `/termsofuse` 这类路径
    compact: Vec<String>,
}

impl Default for LegalClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// 小写化并把非字母数字字符替换为单个空格
fn normalize_text(s: &str) -> String {
    let lowered: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl LegalClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let mut phrases: Vec<String> = config
            .terms
            .iter()
            .map(|t| normalize_text(t))
            .filter(|t| !t.is_empty())
            .collect();
        phrases.dedup();
        let compact = phrases.iter().map(|p| p.replace(' ', "")).collect();
        Self {
            config,
            phrases,
            compact,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// 文本中出现的不同术语数
    fn phrase_hits(&self, text: &str) -> usize {
        let padded = format!(" {} ", normalize_text(text));
        self.phrases
            .iter()
            .filter(|p| padded.contains(&format!(" {} ", p)))
            .count()
    }

    /// 文本是否包含任一术语
    pub fn text_matches(&self, text: &str) -> bool {
        self.phrase_hits(text) > 0
    }

    /// URL路径信号：路径片段匹配术语时为 1
    pub fn url_signal(&self, url: &Url) -> f64 {
        let path = url.path();
        if self.text_matches(path) {
            return 1.0;
        }
        let normalized = normalize_text(path);
        let hit = normalized
            .split(' ')
            .any(|token| self.compact.iter().any(|c| c == token));
        if hit {
            1.0
        } else {
            0.0
        }
    }

    /// 锚文本信号：任一指向该页的锚文本匹配术语时为 1
    pub fn anchor_signal<S: AsRef<str>>(&self, anchors: &[S]) -> f64 {
        if anchors.iter().any(|a| self.text_matches(a.as_ref())) {
            1.0
        } else {
            0.0
        }
    }

    /// 对已提取的信号打分
    pub fn score_signals<S: AsRef<str>>(&self, url: &Url, anchors: &[S], signals: Option<&PageSignals>, body: &str) -> f64 {
        let w = &self.config.weights;
        let total = w.total();
        if total <= 0.0 {
            return 0.0;
        }

        let mut score = w.url * self.url_signal(url) + w.anchor * self.anchor_signal(anchors);

        if let Some(signals) = signals {
            if signals.title.as_deref().is_some_and(|t| self.text_matches(t)) {
                score += w.title;
            }
            if signals.headings.iter().any(|h| self.text_matches(h)) {
                score += w.heading;
            }
        }

        // 正文强度：命中的不同术语数，3 个封顶
        let body_strength = (self.phrase_hits(body).min(3) as f64) / 3.0;
        score += w.body * body_strength;

        (score / total).clamp(0.0, 1.0)
    }

    /// 对抓取结果分类
    ///
    /// `anchors` 为已抓取页面中指向该URL的锚文本。
    pub fn classify<S: AsRef<str>>(&self, result: &FetchResult, anchors: &[S]) -> Result<Classification, ClassificationError> {
        if !result.is_textual() {
            return Err(ClassificationError::UnsupportedContent(result.content_type.clone()));
        }
        if result.content.is_empty() {
            return Err(ClassificationError::Empty);
        }

        let text = result.text();
        let confidence = if result.is_html() {
            let signals = extract_signals(&text);
            self.score_signals(&result.final_url, anchors, Some(&signals), &signals.text)
        } else {
            self.score_signals(&result.final_url, anchors, None, &text)
        };

        Ok(Classification {
            is_legal_page: confidence >= self.config.threshold,
            confidence,
        })
    }
}
