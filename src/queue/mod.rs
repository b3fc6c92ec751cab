// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 运行级取消、按主机划分的礼貌闸门，以及驱动全部域名调查的调度器
pub mod control;
pub mod politeness;
pub mod scheduler;
