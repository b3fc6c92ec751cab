// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理运行配置与环境变量
pub mod config;

/// 领域模块
///
/// 包含数据模型、仓库接口、域名匹配与法律页面分类
pub mod domain;

/// 引擎模块
///
/// 原始抓取、浏览器渲染与抓取策略路由
pub mod engines;

/// 基础设施模块
///
/// 名称解析、对象存储、结果接收器与指标
pub mod infrastructure;

/// 队列模块
///
/// 礼貌闸门与调查调度器
pub mod queue;

/// 工具模块
pub mod utils;

/// 工作器模块
///
/// 单个域名的调查流水线
pub mod workers;
