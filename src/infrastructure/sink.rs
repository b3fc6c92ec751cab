// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::models::survey::DomainSurveyRecord;
use crate::domain::repositories::result_sink::{ResultSink, SinkError};
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::infrastructure::metrics;
use crate::utils::retry_policy::RetryPolicy;

/// 对象存储接收器
///
/// 每个批次写成一个 gzip 压缩的 JSON Lines 对象：
/// `{prefix}/{run_id}/batch-{seq:06}.jsonl.gz`
pub struct ObjectStoreSink {
    storage: Arc<dyn StorageRepository>,
    key_prefix: String,
    run_id: Uuid,
    seq: AtomicU64,
}

impl ObjectStoreSink {
    pub fn new(storage: Arc<dyn StorageRepository>, key_prefix: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            storage,
            key_prefix: key_prefix.into().trim_end_matches('/').to_string(),
            run_id,
            seq: AtomicU64::new(0),
        }
    }

    fn next_key(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}/{}/batch-{:06}.jsonl.gz", self.key_prefix, self.run_id, seq)
    }
}

/// 记录编码为 gzip JSON Lines
pub fn encode_batch(records: &[DomainSurveyRecord]) -> Result<Vec<u8>, SinkError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for record in records {
        serde_json::to_writer(&mut encoder, record).map_err(|e| SinkError::Fatal(e.to_string()))?;
        encoder.write_all(b"\n").map_err(|e| SinkError::Fatal(e.to_string()))?;
    }
    encoder.finish().map_err(|e| SinkError::Fatal(e.to_string()))
}

#[async_trait]
impl ResultSink for ObjectStoreSink {
    async fn put_batch(&self, records: &[DomainSurveyRecord]) -> Result<(), SinkError> {
        let body = encode_batch(records)?;
        let key = self.next_key();
        self.storage.save(&key, &body).await?;
        info!("写入批次 {} ({} 条记录, {} 字节)", key, records.len(), body.len());
        Ok(())
    }
}

/// 批量接收器适配器
///
/// 在内存中累积记录，达到 `push_every` 条时作为一个写入集刷新。
/// 刷新失败按退避重试；重试耗尽后记录保留在缓冲区并返回致命错误，不会被静默丢弃。
pub struct BatchingSink {
    inner: Arc<dyn ResultSink>,
    push_every: usize,
    retry: RetryPolicy,
    buffer: Mutex<Vec<DomainSurveyRecord>>,
    flush_lock: Mutex<()>,
    flushed: AtomicUsize,
}

impl BatchingSink {
    pub fn new(inner: Arc<dyn ResultSink>, push_every: usize, retry: RetryPolicy) -> Self {
        Self {
            inner,
            push_every: push_every.max(1),
            retry,
            buffer: Mutex::new(Vec::new()),
            flush_lock: Mutex::new(()),
            flushed: AtomicUsize::new(0),
        }
    }

    /// 缓冲区中的记录数
    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// 已成功刷新的记录数
    pub fn flushed(&self) -> usize {
        self.flushed.load(Ordering::SeqCst)
    }

    /// 追加一条记录，缓冲区满时刷新
    pub async fn push(&self, record: DomainSurveyRecord) -> Result<(), SinkError> {
        let full = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(record);
            buffer.len() >= self.push_every
        };
        if full {
            self.drain(false).await?;
        }
        Ok(())
    }

    /// 只追加不刷新（接收器已报告致命错误后使用）
    pub async fn hold(&self, record: DomainSurveyRecord) {
        self.buffer.lock().await.push(record);
    }

    /// 刷新缓冲区中的全部记录
    pub async fn flush(&self) -> Result<(), SinkError> {
        self.drain(true).await
    }

    /// 以 `push_every` 为单位刷新；`all` 为 false 时只刷新满批
    async fn drain(&self, all: bool) -> Result<(), SinkError> {
        let _guard = self.flush_lock.lock().await;

        loop {
            let batch: Vec<DomainSurveyRecord> = {
                let mut buffer = self.buffer.lock().await;
                if buffer.is_empty() || (!all && buffer.len() < self.push_every) {
                    return Ok(());
                }
                let take = buffer.len().min(self.push_every);
                buffer.drain(..take).collect()
            };

            if let Err(e) = self.put_with_retry(&batch).await {
                error!("批次刷新失败，{} 条记录保留在缓冲区: {}", batch.len(), e);
                let mut buffer = self.buffer.lock().await;
                buffer.splice(0..0, batch);
                return Err(e);
            }
            self.flushed.fetch_add(batch.len(), Ordering::SeqCst);
        }
    }

    async fn put_with_retry(&self, batch: &[DomainSurveyRecord]) -> Result<(), SinkError> {
        let mut attempt = 0;
        loop {
            match self.inner.put_batch(batch).await {
                Ok(()) => {
                    metrics::record_flush(batch.len(), true);
                    return Ok(());
                }
                Err(e) => {
                    metrics::record_flush(batch.len(), false);
                    if !e.is_retryable() || !self.retry.should_retry(attempt) {
                        return Err(SinkError::Fatal(format!(
                            "flush failed after {} attempt(s): {}",
                            attempt + 1,
                            e
                        )));
                    }
                    attempt += 1;
                    let backoff = self.retry.calculate_backoff(attempt);
                    warn!("刷新失败（第 {} 次），{:?} 后重试: {}", attempt, backoff, e);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::survey::SurveyState;
    use crate::domain::models::target::Domain;
    use crate::infrastructure::storage::InMemoryStorage;
    use flate2::read::GzDecoder;
    use parking_lot::Mutex as SyncMutex;
    use std::io::Read;
    use std::time::Duration;

    fn record(i: usize) -> DomainSurveyRecord {
        DomainSurveyRecord::failed(
            Uuid::nil(),
            Domain::new_unchecked(format!("d{}.example.com", i)),
            SurveyState::Resolving,
            "unresolvable",
        )
    }

    #[derive(Default)]
    struct RecordingSink {
        batches: SyncMutex<Vec<usize>>,
        failures_left: AtomicUsize,
        fatal: bool,
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        async fn put_batch(&self, records: &[DomainSurveyRecord]) -> Result<(), SinkError> {
            if self.fatal {
                return Err(SinkError::Fatal("bucket gone".into()));
            }
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SinkError::Retryable("503".into()));
            }
            self.batches.lock().push(records.len());
            Ok(())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::for_flush(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_flushes_exactly_at_push_every() {
        let inner = Arc::new(RecordingSink::default());
        let sink = BatchingSink::new(inner.clone(), 1000, fast_retry());

        for i in 0..999 {
            sink.push(record(i)).await.unwrap();
        }
        assert!(inner.batches.lock().is_empty());

        sink.push(record(999)).await.unwrap();
        assert_eq!(*inner.batches.lock(), vec![1000]);
        assert_eq!(sink.pending().await, 0);
        assert_eq!(sink.flushed(), 1000);
    }

    #[tokio::test]
    async fn test_final_flush_writes_remainder() {
        let inner = Arc::new(RecordingSink::default());
        let sink = BatchingSink::new(inner.clone(), 10, fast_retry());
        for i in 0..25 {
            sink.push(record(i)).await.unwrap();
        }
        sink.flush().await.unwrap();
        assert_eq!(*inner.batches.lock(), vec![10, 10, 5]);
        assert_eq!(sink.pending().await, 0);
    }

    #[tokio::test]
    async fn test_retryable_errors_are_retried() {
        let inner = Arc::new(RecordingSink {
            failures_left: AtomicUsize::new(2),
            ..Default::default()
        });
        let sink = BatchingSink::new(inner.clone(), 2, fast_retry());
        sink.push(record(0)).await.unwrap();
        sink.push(record(1)).await.unwrap();
        assert_eq!(*inner.batches.lock(), vec![2]);
    }

    #[tokio::test]
    async fn test_persistent_failure_keeps_records() {
        let inner = Arc::new(RecordingSink {
            failures_left: AtomicUsize::new(100),
            ..Default::default()
        });
        let sink = BatchingSink::new(inner.clone(), 2, fast_retry());
        sink.push(record(0)).await.unwrap();
        let err = sink.push(record(1)).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(sink.pending().await, 2);
        // 3 retries + first attempt
        assert_eq!(inner.failures_left.load(Ordering::SeqCst), 96);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let inner = Arc::new(RecordingSink {
            fatal: true,
            ..Default::default()
        });
        let sink = BatchingSink::new(inner, 1, fast_retry());
        assert!(sink.push(record(0)).await.is_err());
        assert_eq!(sink.pending().await, 1);
    }

    #[tokio::test]
    async fn test_object_store_sink_writes_jsonl_gz() {
        let storage = Arc::new(InMemoryStorage::new());
        let run_id = Uuid::new_v4();
        let sink = ObjectStoreSink::new(storage.clone(), "surveys/", run_id);

        sink.put_batch(&[record(0), record(1)]).await.unwrap();

        let keys = storage.keys().await;
        assert_eq!(keys, vec![format!("surveys/{}/batch-000001.jsonl.gz", run_id)]);

        let body = storage.get(&keys[0]).await.unwrap().unwrap();
        let mut text = String::new();
        GzDecoder::new(&body[..]).read_to_string(&mut text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: DomainSurveyRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.domain.as_str(), "d1.example.com");
    }
}
