// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// robots 与站点地图解析、重试策略、文本解码、URL 辅助函数、遥测与错误类型
pub mod errors;
pub mod retry_policy;
pub mod robots;
pub mod sitemap;
pub mod telemetry;
pub mod text_encoding;
pub mod url_utils;
