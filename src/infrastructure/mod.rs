// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 指标（metrics）：通过 `metrics` 门面记录计数与耗时
/// - 解析（resolver）：DNSSEC 验证解析与 DoH 回退
/// - 接收器（sink）：批量写出调查记录
/// - 存储（storage）：本地、S3 与内存对象存储
pub mod metrics;
pub mod resolver;
pub mod sink;
pub mod storage;
