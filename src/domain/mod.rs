// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含调查运行的核心业务逻辑：
/// - 领域模型（models）：域名、抓取目标、抓取结果与调查记录
/// - 仓库接口（repositories）：名称解析、对象存储与结果接收器的抽象
/// - 服务（services）：域名匹配与法律页面分类
pub mod models;
pub mod repositories;
pub mod services;
