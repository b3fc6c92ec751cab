// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::survey::DomainSurveyRecord;
use crate::domain::repositories::storage_repository::StorageError;

/// 结果接收器错误
#[derive(Error, Debug)]
pub enum SinkError {
    /// 可重试（如网络抖动）
    #[error("retryable sink error: {0}")]
    Retryable(String),

    /// 不可恢复：终止运行
    #[error("fatal sink error: {0}")]
    Fatal(String),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Retryable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SinkError::Retryable(_) => "sink_retryable",
            SinkError::Fatal(_) => "sink_fatal",
        }
    }
}

impl From<StorageError> for SinkError {
    fn from(err: StorageError) -> Self {
        if err.is_transient() {
            SinkError::Retryable(err.to_string())
        } else {
            SinkError::Fatal(err.to_string())
        }
    }
}

/// 持久化接收器：一次调用写入一个批次
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn put_batch(&self, records: &[DomainSurveyRecord]) -> Result<(), SinkError>;
}
