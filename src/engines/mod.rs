// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 抓取引擎模块
///
/// - 原始HTTP抓取（reqwest_engine）
/// - 无头浏览器渲染（chromium_engine）
/// - 按能力集分派的路由器（router）
pub mod chromium_engine;
pub mod reqwest_engine;
pub mod router;
pub mod traits;
pub mod validators;
