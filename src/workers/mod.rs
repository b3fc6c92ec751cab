// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 单个域名的调查流水线（状态机）
pub mod survey_worker;

pub use survey_worker::{SurveyConfig, SurveyWorker};
