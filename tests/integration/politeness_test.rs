// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::{Duration, Instant};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{domain, fast_config, harness, resolver_for};

#[tokio::test]
async fn test_aliases_share_one_politeness_gate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ok")
                .set_delay(Duration::from_millis(40)),
        )
        .mount(&server)
        .await;

    let names = ["alias-a.test", "alias-b.test", "alias-c.test"];
    let mut config = fast_config();
    config.max_workers = names.len();
    config.per_host_concurrency = 1;
    let h = harness(resolver_for(&server, &names), None, config, 10);

    h.scheduler
        .run(names.iter().map(|n| domain(n)).collect())
        .await
        .unwrap();

    let host_key = format!("127.0.0.1:{}", server.address().port());
    let gate = h.worker.gates().get(&host_key).unwrap();
    assert_eq!(h.worker.gates().len(), 1);
    assert_eq!(gate.peak_in_flight(), 1);
    assert_eq!(gate.in_flight(), 0);
    assert_eq!(h.sink.records().len(), names.len());
}

#[tokio::test]
async fn test_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(wiremock::matchers::path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 0.2\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let h = harness(resolver_for(&server, &["paced.test"]), None, fast_config(), 10);
    let start = Instant::now();
    h.scheduler.run(vec![domain("paced.test")]).await.unwrap();

    let record = h.sink.record_for("paced.test");
    assert_eq!(record.crawl_delay_ms, Some(200));
    // four requests after robots.txt, each at least one interval apart
    assert!(start.elapsed() >= Duration::from_millis(750));
}
