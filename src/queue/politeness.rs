// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn limiter_for(delay: Duration) -> Option<Arc<DirectLimiter>> {
    Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)))
}

/// 单个主机的礼貌闸门
///
/// 并发数由信号量限制，请求间隔由 governor 限流器保证。
pub struct HostGate {
    key: String,
    slots: Arc<Semaphore>,
    limiter: RwLock<Option<Arc<DirectLimiter>>>,
    delay: RwLock<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: AtomicU64,
}

impl HostGate {
    fn new(key: String, concurrency: usize, delay: Duration) -> Self {
        Self {
            key,
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            limiter: RwLock::new(limiter_for(delay)),
            delay: RwLock::new(delay),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            requests: AtomicU64::new(0),
        }
    }

    /// 等待并发槽位与最小间隔，返回的许可在释放前占用槽位
    pub async fn acquire(self: &Arc<Self>) -> Result<HostPermit, AcquireError> {
        let slot = self.slots.clone().acquire_owned().await?;
        let limiter = self.limiter.read().clone();
        if let Some(limiter) = limiter {
            limiter.until_ready().await;
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.fetch_add(1, Ordering::SeqCst);

        Ok(HostPermit {
            gate: self.clone(),
            _slot: slot,
        })
    }

    /// 只升不降；新限流器的首个令牌立即消耗，使下一个请求等待完整间隔
    fn raise_delay(&self, delay: Duration) -> Duration {
        let mut current = self.delay.write();
        if delay <= *current {
            return *current;
        }
        *current = delay;

        let limiter = limiter_for(delay);
        if let Some(limiter) = &limiter {
            let _ = limiter.check();
        }
        *self.limiter.write() = limiter;
        debug!("主机 {} 请求间隔调整为 {:?}", self.key, delay);
        delay
    }

    pub fn delay(&self) -> Duration {
        *self.delay.read()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 观察到的最大并发请求数
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

/// 主机许可，析构时归还槽位
pub struct HostPermit {
    gate: Arc<HostGate>,
    _slot: OwnedSemaphorePermit,
}

impl Drop for HostPermit {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 礼貌闸门表
///
/// 以解析后的主机（`ip:port`）为键，解析到同一主机的域名别名共享同一闸门。
pub struct PolitenessGates {
    gates: DashMap<String, Arc<HostGate>>,
    per_host_concurrency: usize,
    default_delay: Duration,
    max_delay: Duration,
}

impl PolitenessGates {
    /// 创建闸门表
    ///
    /// # 参数
    ///
    /// * `per_host_concurrency` - 每个主机的并发请求上限
    /// * `default_delay` - robots 未给出 Crawl-delay 时的最小请求间隔
    /// * `max_delay` - Crawl-delay 的上限
    pub fn new(per_host_concurrency: usize, default_delay: Duration, max_delay: Duration) -> Self {
        Self {
            gates: DashMap::new(),
            per_host_concurrency: per_host_concurrency.max(1),
            default_delay,
            max_delay: max_delay.max(default_delay),
        }
    }

    /// 获取或创建主机闸门
    pub fn gate(&self, host_key: &str) -> Arc<HostGate> {
        self.gates
            .entry(host_key.to_string())
            .or_insert_with(|| {
                Arc::new(HostGate::new(
                    host_key.to_string(),
                    self.per_host_concurrency,
                    self.default_delay,
                ))
            })
            .clone()
    }

    pub async fn acquire(&self, host_key: &str) -> Result<HostPermit, AcquireError> {
        self.gate(host_key).acquire().await
    }

    /// 应用 robots 的 Crawl-delay，返回生效的间隔
    ///
    /// 取当前间隔与新值的较大者，并受 `max_delay` 限制；
    /// 别名域名给出的较小值不会放宽已有间隔。
    pub fn apply_crawl_delay(&self, host_key: &str, crawl_delay: Option<Duration>) -> Duration {
        let gate = self.gate(host_key);
        match crawl_delay {
            Some(delay) => gate.raise_delay(delay.min(self.max_delay)),
            None => gate.delay(),
        }
    }

    pub fn get(&self, host_key: &str) -> Option<Arc<HostGate>> {
        self.gates.get(host_key).map(|g| g.clone())
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_gate_serializes_same_host() {
        let gates = Arc::new(PolitenessGates::new(1, Duration::ZERO, Duration::from_secs(30)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gates = gates.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gates.acquire("10.0.0.1:443").await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let gate = gates.get("10.0.0.1:443").unwrap();
        assert_eq!(gate.peak_in_flight(), 1);
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.requests(), 8);
    }

    #[tokio::test]
    async fn test_distinct_hosts_do_not_share_gate() {
        let gates = PolitenessGates::new(1, Duration::ZERO, Duration::from_secs(30));
        let a = gates.acquire("10.0.0.1:443").await.unwrap();
        let b = gates.acquire("10.0.0.2:443").await.unwrap();
        assert_eq!(gates.len(), 2);
        drop((a, b));
    }

    #[tokio::test]
    async fn test_minimum_interval_enforced() {
        let gates = PolitenessGates::new(1, Duration::from_millis(100), Duration::from_secs(30));
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = gates.acquire("10.0.0.1:80").await.unwrap();
        }
        // first request is immediate, the next two wait a full interval each
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[test]
    fn test_crawl_delay_only_raises_and_is_capped() {
        let gates = PolitenessGates::new(1, Duration::from_secs(1), Duration::from_secs(30));
        let key = "10.0.0.1:443";

        assert_eq!(gates.apply_crawl_delay(key, None), Duration::from_secs(1));
        assert_eq!(gates.apply_crawl_delay(key, Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(
            gates.apply_crawl_delay(key, Some(Duration::from_millis(500))),
            Duration::from_secs(5)
        );
        assert_eq!(
            gates.apply_crawl_delay(key, Some(Duration::from_secs(999_999))),
            Duration::from_secs(30)
        );
    }
}
