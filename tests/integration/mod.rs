// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod helpers;
pub mod politeness_test;
pub mod sink_test;
pub mod survey_run_test;
