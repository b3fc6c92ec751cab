// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理调查、解析、渲染、分类、接收器、存储与日志配置
pub mod settings;
