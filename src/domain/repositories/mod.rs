// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义领域层依赖的外部能力：名称解析、对象存储与结果接收器。
pub mod name_resolver;
pub mod result_sink;
pub mod storage_repository;
