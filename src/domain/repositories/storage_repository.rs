// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 暂时性错误（网络、限流、5xx）
    #[error("Transient storage error: {0}")]
    Transient(String),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    /// 是否值得重试
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            StorageError::Transient(_) => true,
            StorageError::Other(_) => false,
        }
    }
}

/// 对象存储特质
///
/// 结果接收器只需要写入；`get` 用于本地校验与测试。
#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// 使用指定键保存数据
    async fn save(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// 根据键读取数据
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
