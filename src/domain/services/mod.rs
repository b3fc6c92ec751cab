// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 域名匹配器（domain_matcher）：校验与去重输入域名
/// - 页面信号（page_signals）：从HTML中提取标题、链接与可见文本
/// - 法律页面分类器（legal_classifier）：为候选页打分
pub mod domain_matcher;
pub mod legal_classifier;
pub mod page_signals;
