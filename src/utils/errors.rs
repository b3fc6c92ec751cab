// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// robots/站点地图解析错误
///
/// 从不致命：调用方将其降级为空结果。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("格式错误: {0}")]
    Malformed(String),
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        "parse_error"
    }
}

/// 分类错误：文档无法分析，候选页降级为未标注
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("不支持的内容类型: {0}")]
    UnsupportedContent(String),

    #[error("文档为空")]
    Empty,
}

impl ClassificationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassificationError::UnsupportedContent(_) => "unsupported_content",
            ClassificationError::Empty => "empty_document",
        }
    }
}

/// 输入域名校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("无效域名: {0}")]
    Invalid(String),

    #[error("未知域名: {0}")]
    Unknown(String),

    #[error("域名集合加载失败: {0}")]
    Load(String),
}
