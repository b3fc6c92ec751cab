// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::models::survey::{DomainSurveyRecord, SurveyState, SurveyStatus};
use crate::domain::models::target::Domain;
use crate::domain::repositories::result_sink::SinkError;
use crate::infrastructure::sink::BatchingSink;
use crate::queue::control::RunControl;
use crate::workers::survey_worker::SurveyWorker;

/// 运行级致命错误
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 结果接收器持续失败
    #[error("Result sink failed: {0}")]
    Sink(#[from] SinkError),
    /// 要求渲染但浏览器能力不可用
    #[error("Browser capability unavailable while rendering is required")]
    BrowserUnavailable,
}

impl SchedulerError {
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::Sink(e) => e.kind(),
            SchedulerError::BrowserUnavailable => "browser_unavailable",
        }
    }
}

/// 一次运行的汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// 交给接收器的记录数
    pub records: usize,
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
    /// 因取消而未开始的域名数
    pub not_started: usize,
    /// 任务异常终止后合成失败记录的域名数
    pub panicked: usize,
}

impl RunSummary {
    fn count(&mut self, record: &DomainSurveyRecord) {
        self.records += 1;
        match record.status {
            SurveyStatus::Complete => self.complete += 1,
            SurveyStatus::Partial => self.partial += 1,
            SurveyStatus::Failed => self.failed += 1,
        }
    }
}

/// 调查调度器
///
/// 全局信号量限制同时进行的域名数，每个域名的请求再经过按主机划分的礼貌闸门。
/// 每个已开始的域名恰好产生一条记录，包括超时、取消与任务异常终止的情况。
pub struct SurveyScheduler {
    worker: Arc<SurveyWorker>,
    sink: Arc<BatchingSink>,
    control: RunControl,
    run_id: Uuid,
}

impl SurveyScheduler {
    pub fn new(worker: Arc<SurveyWorker>, sink: Arc<BatchingSink>, control: RunControl) -> Self {
        Self {
            worker,
            sink,
            control,
            run_id: Uuid::new_v4(),
        }
    }

    /// 使用指定的运行ID（与接收器的对象键保持一致）
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    /// 调查全部域名并交付记录
    ///
    /// # 参数
    ///
    /// * `domains` - 已去重的域名列表
    ///
    /// # 返回值
    ///
    /// * `Ok(RunSummary)` - 全部记录已写入接收器
    /// * `Err(SchedulerError)` - 运行级致命错误；返回前已尝试刷新缓冲区
    pub async fn run(&self, domains: Vec<Domain>) -> Result<RunSummary, SchedulerError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            run_id: self.run_id,
            ..RunSummary::default()
        };

        let config = self.worker.config();
        if config.render_required && !self.worker.router().browser_available().await {
            error!("渲染被要求，但浏览器能力不可用");
            self.control.cancel();
            return Err(SchedulerError::BrowserUnavailable);
        }

        info!(
            "运行 {} 开始: {} 个域名, max_workers={}",
            self.run_id,
            domains.len(),
            config.max_workers
        );

        let pool = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let mut tasks: JoinSet<DomainSurveyRecord> = JoinSet::new();
        let mut in_flight: HashMap<Id, Domain> = HashMap::new();
        let mut fatal: Option<SchedulerError> = None;

        let total = domains.len();
        let mut queue = domains.into_iter();
        while let Some(domain) = queue.next() {
            let permit = tokio::select! {
                biased;
                _ = self.control.cancelled() => None,
                permit = pool.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                summary.not_started = 1 + queue.len();
                warn!("停止接收新域名，{} 个域名未开始", summary.not_started);
                break;
            };

            let worker = self.worker.clone();
            let control = self.control.clone();
            let run_id = self.run_id;
            let task_domain = domain.clone();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                worker.survey(run_id, task_domain, &control).await
            });
            in_flight.insert(handle.id(), domain);

            while let Some(joined) = tasks.try_join_next_with_id() {
                self.deliver(joined, &mut in_flight, &mut summary, &mut fatal).await;
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            self.deliver(joined, &mut in_flight, &mut summary, &mut fatal).await;
        }

        if let Err(e) = self.sink.flush().await {
            error!("最终刷新失败，{} 条记录未写入: {}", self.sink.pending().await, e);
            fatal.get_or_insert(SchedulerError::Sink(e));
        }

        info!(
            "运行 {} 结束 ({:.1}s): {}/{} 条记录, complete={}, partial={}, failed={}",
            self.run_id,
            started.elapsed().as_secs_f64(),
            summary.records,
            total,
            summary.complete,
            summary.partial,
            summary.failed
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    async fn deliver(
        &self,
        joined: Result<(Id, DomainSurveyRecord), JoinError>,
        in_flight: &mut HashMap<Id, Domain>,
        summary: &mut RunSummary,
        fatal: &mut Option<SchedulerError>,
    ) {
        let record = match joined {
            Ok((id, record)) => {
                in_flight.remove(&id);
                record
            }
            Err(join_error) => {
                let Some(domain) = in_flight.remove(&join_error.id()) else {
                    error!("未知任务异常终止: {}", join_error);
                    return;
                };
                error!("域名 {} 的任务异常终止: {}", domain, join_error);
                summary.panicked += 1;
                DomainSurveyRecord::failed(self.run_id, domain, SurveyState::Pending, "task_panicked")
            }
        };

        summary.count(&record);

        // after a fatal sink error records are only buffered
        if fatal.is_some() {
            self.sink.hold(record).await;
            return;
        }
        if let Err(e) = self.sink.push(record).await {
            error!("结果接收器失败，停止运行: {}", e);
            self.control.cancel();
            *fatal = Some(SchedulerError::Sink(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::fetch::FetchResult;
    use crate::domain::repositories::name_resolver::{NameResolver, Resolution, ResolutionError};
    use crate::domain::repositories::result_sink::ResultSink;
    use crate::domain::services::legal_classifier::LegalClassifier;
    use crate::engines::router::{FetchRouter, ShellHeuristic};
    use crate::engines::traits::{FetchError, FetchRequest, RawFetcher};
    use crate::utils::retry_policy::RetryPolicy;
    use crate::workers::survey_worker::SurveyConfig;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct NoFetch;

    #[async_trait]
    impl RawFetcher for NoFetch {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchResult, FetchError> {
            Err(FetchError::ConnectionRefused("offline".into()))
        }
        fn name(&self) -> &'static str {
            "offline"
        }
    }

    /// 解析 `panic.*` 时触发 panic，其余域名均无法解析
    struct PanickyResolver;

    #[async_trait]
    impl NameResolver for PanickyResolver {
        async fn resolve(&self, domain: &Domain) -> Result<Resolution, ResolutionError> {
            if domain.as_str().starts_with("panic.") {
                panic!("resolver bug");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(ResolutionError::Unresolvable(domain.to_string()))
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        records: Mutex<Vec<DomainSurveyRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl ResultSink for CollectingSink {
        async fn put_batch(&self, records: &[DomainSurveyRecord]) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Fatal("bucket gone".into()));
            }
            self.records.lock().extend_from_slice(records);
            Ok(())
        }
    }

    fn scheduler(sink: Arc<CollectingSink>, config: SurveyConfig, push_every: usize) -> (SurveyScheduler, Arc<BatchingSink>) {
        let router = FetchRouter::new(Arc::new(NoFetch), None, ShellHeuristic::default());
        let worker = SurveyWorker::new(
            config,
            Arc::new(PanickyResolver),
            Arc::new(router),
            Arc::new(LegalClassifier::default()),
        );
        let batching = Arc::new(BatchingSink::new(
            sink,
            push_every,
            RetryPolicy::for_flush(1, Duration::from_millis(1)),
        ));
        (
            SurveyScheduler::new(Arc::new(worker), batching.clone(), RunControl::new()),
            batching,
        )
    }

    fn domains(names: &[&str]) -> Vec<Domain> {
        names.iter().map(|n| Domain::new_unchecked(n.to_string())).collect()
    }

    #[tokio::test]
    async fn test_every_domain_yields_one_record_even_on_panic() {
        let sink = Arc::new(CollectingSink::default());
        let config = SurveyConfig {
            max_workers: 3,
            ..SurveyConfig::default()
        };
        let (scheduler, batching) = scheduler(sink.clone(), config, 4);

        let input = domains(&["a.example", "panic.example", "b.example", "c.example", "d.example"]);
        let summary = scheduler.run(input).await.unwrap();

        let records = sink.records.lock();
        assert_eq!(records.len(), 5);
        let mut names: Vec<&str> = records.iter().map(|r| r.domain.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a.example", "b.example", "c.example", "d.example", "panic.example"]);
        assert_eq!(summary.records, 5);
        assert_eq!(summary.failed, 5);
        assert_eq!(summary.panicked, 1);
        assert_eq!(batching.pending().await, 0);

        let panicked = records.iter().find(|r| r.domain.as_str() == "panic.example").unwrap();
        assert_eq!(panicked.errors[0].kind, "task_panicked");
    }

    #[tokio::test]
    async fn test_cancelled_run_accepts_no_new_domains() {
        let sink = Arc::new(CollectingSink::default());
        let (scheduler, _) = scheduler(sink.clone(), SurveyConfig::default(), 10);
        scheduler.control().cancel();

        let summary = scheduler.run(domains(&["a.example", "b.example"])).await.unwrap();

        assert_eq!(summary.records, 0);
        assert_eq!(summary.not_started, 2);
        assert!(sink.records.lock().is_empty());
    }

    #[tokio::test]
    async fn test_persistent_sink_failure_is_fatal() {
        let sink = Arc::new(CollectingSink {
            fail: true,
            ..Default::default()
        });
        let (scheduler, batching) = scheduler(sink, SurveyConfig::default(), 1);

        let result = scheduler.run(domains(&["a.example", "b.example"])).await;

        assert!(matches!(result, Err(SchedulerError::Sink(_))));
        assert!(scheduler.control().is_cancelled());
        // records are kept, never silently dropped
        assert!(batching.pending().await >= 1);
    }

    #[tokio::test]
    async fn test_required_rendering_without_browser_is_fatal() {
        let sink = Arc::new(CollectingSink::default());
        let config = SurveyConfig {
            render_required: true,
            ..SurveyConfig::default()
        };
        let (scheduler, _) = scheduler(sink, config, 10);

        let result = scheduler.run(domains(&["a.example"])).await;
        assert!(matches!(result, Err(SchedulerError::BrowserUnavailable)));
    }
}
