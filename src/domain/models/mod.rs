// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了调查运行的核心数据：
/// - 抓取目标（target）：域名与待抓取路径
/// - 抓取结果（fetch）：单次抓取得到的响应
/// - 调查记录（survey）：每个域名一条的输出记录及其状态机
pub mod fetch;
pub mod survey;
pub mod target;
