// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 运行计数器
//!
//! 通过 `metrics` 门面记录；未安装导出器时这些调用为空操作。

use metrics::{counter, histogram};

use crate::domain::models::fetch::FetchStrategy;
use crate::domain::models::survey::SurveyStatus;

pub fn record_fetch(strategy: FetchStrategy, outcome: &str) {
    counter!("websurvey_fetches_total", "strategy" => strategy.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_retry(kind: &str) {
    counter!("websurvey_fetch_retries_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_skipped_by_policy() {
    counter!("websurvey_skipped_by_policy_total").increment(1);
}

pub fn record_domain(status: SurveyStatus, elapsed_secs: f64) {
    counter!("websurvey_domains_total", "status" => status.to_string()).increment(1);
    histogram!("websurvey_domain_duration_seconds").record(elapsed_secs);
}

pub fn record_legal_page() {
    counter!("websurvey_legal_pages_total").increment(1);
}

pub fn record_flush(records: usize, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("websurvey_sink_flushes_total", "outcome" => outcome).increment(1);
    if ok {
        counter!("websurvey_sink_records_total").increment(records as u64);
    }
}
