// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::MockServer;

use websurvey::domain::models::survey::{DomainSurveyRecord, SurveyState};
use websurvey::domain::repositories::storage_repository::StorageRepository;
use websurvey::infrastructure::sink::{BatchingSink, ObjectStoreSink};
use websurvey::infrastructure::storage::LocalStorage;
use websurvey::queue::control::RunControl;
use websurvey::queue::scheduler::SurveyScheduler;
use websurvey::utils::retry_policy::RetryPolicy;

use super::helpers::{domain, fast_config, CollectingSink};

fn record(i: usize) -> DomainSurveyRecord {
    DomainSurveyRecord::failed(
        Uuid::nil(),
        domain(&format!("site-{}.test", i)),
        SurveyState::Resolving,
        "unresolvable",
    )
}

#[tokio::test]
async fn test_thousand_records_flush_as_one_batch() {
    let inner = Arc::new(CollectingSink::default());
    let sink = BatchingSink::new(inner.clone(), 1000, RetryPolicy::for_flush(3, Duration::from_millis(1)));

    for i in 0..1000 {
        sink.push(record(i)).await.unwrap();
    }

    assert_eq!(*inner.batches.lock(), vec![1000]);
    assert_eq!(sink.pending().await, 0);
}

#[tokio::test]
async fn test_run_writes_gzipped_jsonl_to_local_storage() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path()));
    let run_id = Uuid::new_v4();
    let sink = Arc::new(ObjectStoreSink::new(storage.clone(), "surveys", run_id));
    let batching = Arc::new(BatchingSink::new(sink, 2, RetryPolicy::for_flush(1, Duration::from_millis(1))));

    // nothing resolves: every domain yields a failed record without network access
    let server = MockServer::start().await;
    let resolver = super::helpers::resolver_for(&server, &[]);
    let router = websurvey::engines::router::FetchRouter::new(
        Arc::new(websurvey::engines::reqwest_engine::ReqwestEngine),
        None,
        Default::default(),
    );
    let worker = Arc::new(websurvey::workers::SurveyWorker::new(
        fast_config(),
        Arc::new(resolver),
        Arc::new(router),
        Arc::new(Default::default()),
    ));
    let scheduler = SurveyScheduler::new(worker, batching, RunControl::new()).with_run_id(run_id);

    let summary = scheduler
        .run(vec![domain("one.test"), domain("two.test"), domain("three.test")])
        .await
        .unwrap();
    assert_eq!(summary.records, 3);

    let mut lines = 0;
    for seq in 1..=2 {
        let key = format!("surveys/{}/batch-{:06}.jsonl.gz", run_id, seq);
        let body = storage.get(&key).await.unwrap().unwrap();
        let mut text = String::new();
        GzDecoder::new(&body[..]).read_to_string(&mut text).unwrap();
        for line in text.lines() {
            let parsed: DomainSurveyRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.run_id, run_id);
            lines += 1;
        }
    }
    assert_eq!(lines, 3);
}
