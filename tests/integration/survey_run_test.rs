// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use websurvey::domain::models::fetch::FetchStrategy;
use websurvey::domain::models::survey::{SurveyState, SurveyStatus};

use super::helpers::{domain, fast_config, harness, origin, received_paths, resolver_for, StubBrowser};

async fn mount_text(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html"))
        .mount(server)
        .await;
}

async fn mount_well_known(server: &MockServer) {
    mount_text(server, "/ai.txt", "User-Agent: *\nDisallow: /").await;
    mount_text(server, "/humans.txt", "/* TEAM */\nDeveloper: someone").await;
    mount_text(server, "/security.txt", "Contact: mailto:security@example.com").await;
}

fn article(words: &str) -> String {
    format!(
        "<html><head><title>Home</title></head><body><main><p>{}</p></main></body></html>",
        words.repeat(30)
    )
}

#[tokio::test]
async fn test_each_domain_yields_exactly_one_record() {
    let server = MockServer::start().await;
    mount_text(&server, "/robots.txt", "User-agent: *\nAllow: /\n").await;
    mount_html(&server, "/", &article("A regular storefront paragraph. ")).await;
    mount_well_known(&server).await;

    let resolvable = ["alpha.test", "beta.test", "gamma.test"];
    let h = harness(resolver_for(&server, &resolvable), None, fast_config(), 2);

    let names = ["alpha.test", "beta.test", "gamma.test", "ghost-one.test", "ghost-two.test"];
    let summary = h
        .scheduler
        .run(names.iter().map(|n| domain(n)).collect())
        .await
        .unwrap();

    let records = h.sink.records();
    assert_eq!(records.len(), names.len());
    let unique: HashSet<&str> = records.iter().map(|r| r.domain.as_str()).collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(summary.records, names.len());

    for name in resolvable {
        let record = h.sink.record_for(name);
        assert_eq!(record.status, SurveyStatus::Complete, "{}", name);
        assert_eq!(record.run_id, h.scheduler.run_id());
        assert!(record.resources.iter().all(|r| r.url.contains(name)));
    }
    for name in ["ghost-one.test", "ghost-two.test"] {
        let record = h.sink.record_for(name);
        assert_eq!(record.status, SurveyStatus::Failed);
        assert_eq!(record.errors[0].stage, SurveyState::Resolving);
    }
}

#[tokio::test]
async fn test_disallowed_root_is_marked_skipped_by_policy() {
    let server = MockServer::start().await;
    mount_text(&server, "/robots.txt", "User-agent: *\nDisallow: /$\n").await;
    mount_html(&server, "/", &article("Should never be fetched. ")).await;
    mount_well_known(&server).await;

    let h = harness(resolver_for(&server, &["alpha.test"]), None, fast_config(), 10);
    h.scheduler.run(vec![domain("alpha.test")]).await.unwrap();

    let record = h.sink.record_for("alpha.test");
    let root = record.resource("/").unwrap();
    assert!(root.skipped_by_policy);
    assert!(root.status_code.is_none());
    assert!(!received_paths(&server).await.iter().any(|p| p == "/"));
    assert!(record.resource("/security.txt").unwrap().status_code == Some(200));
}

#[tokio::test]
async fn test_application_shell_root_renders_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let shell = format!(
        "<html><head><script>{}</script></head><body><div id=\"root\"></div>\
         <noscript>You need to enable JavaScript to run this app.</noscript></body></html>",
        "window.__chunk = [];".repeat(120)
    );
    mount_html(&server, "/", &shell).await;
    mount_well_known(&server).await;

    let browser = Arc::new(StubBrowser::default());
    let h = harness(
        resolver_for(&server, &["shop.test"]),
        Some(browser.clone()),
        fast_config(),
        10,
    );
    h.scheduler.run(vec![domain("shop.test")]).await.unwrap();

    assert_eq!(browser.count(), 1);
    let record = h.sink.record_for("shop.test");
    let root = record.resource("/").unwrap();
    assert_eq!(root.strategy, Some(FetchStrategy::Rendered));
    assert!(!root.observed_requests.is_empty());
    // text resources are never rendered
    assert_eq!(
        record.resource("/humans.txt").unwrap().strategy,
        Some(FetchStrategy::Raw)
    );
}

#[tokio::test]
async fn test_large_sitemap_is_cut_at_max_candidates() {
    let server = MockServer::start().await;
    let base = origin(&server, "alpha.test");
    mount_text(
        &server,
        "/robots.txt",
        &format!("User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n", base),
    )
    .await;
    mount_html(&server, "/", &article("Nothing legal on the home page. ")).await;
    mount_well_known(&server).await;

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
        <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">");
    for i in 0..10_000 {
        xml.push_str(&format!("<url><loc>{}/page-{}</loc></url>", base, i));
    }
    xml.push_str("</urlset>");
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(xml.into_bytes(), "application/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/page-\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(article("Filler. ").into_bytes(), "text/html"))
        .mount(&server)
        .await;

    let mut config = fast_config();
    config.max_candidates = 50;
    let h = harness(resolver_for(&server, &["alpha.test"]), None, config, 10);
    h.scheduler.run(vec![domain("alpha.test")]).await.unwrap();

    let record = h.sink.record_for("alpha.test");
    assert_eq!(record.candidates_attempted, 50);

    let pages: Vec<String> = received_paths(&server)
        .await
        .into_iter()
        .filter(|p| p.starts_with("/page-"))
        .collect();
    let expected: Vec<String> = (0..50).map(|i| format!("/page-{}", i)).collect();
    assert_eq!(pages, expected);
}

#[tokio::test]
async fn test_root_timeout_gives_partial_record_and_later_steps_run() {
    let server = MockServer::start().await;
    let base = origin(&server, "slow.test");
    mount_text(
        &server,
        "/robots.txt",
        &format!("User-agent: *\nSitemap: {}/sitemap.xml\n", base),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    mount_well_known(&server).await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("<urlset><url><loc>{}/terms-of-service</loc></url></urlset>", base).into_bytes(),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/terms-of-service",
        "<html><head><title>Terms of Service</title></head><body><h1>Terms of Service</h1>\
         <p>By using this site you agree to these terms and our privacy policy.</p></body></html>",
    )
    .await;

    let mut config = fast_config();
    config.request_timeout = Duration::from_millis(200);
    let h = harness(resolver_for(&server, &["slow.test"]), None, config, 10);
    h.scheduler.run(vec![domain("slow.test")]).await.unwrap();

    let record = h.sink.record_for("slow.test");
    assert_eq!(record.status, SurveyStatus::Partial);
    assert_eq!(record.final_state, SurveyState::Complete);
    assert_eq!(record.resource("/").unwrap().error.as_deref(), Some("timeout"));

    let root_attempts = received_paths(&server).await.iter().filter(|p| *p == "/").count();
    assert_eq!(root_attempts, 3);

    let tos = record.resource("/terms-of-service").unwrap();
    assert!(tos.is_legal_page);
    assert!(record.legal_pages().count() >= 1);
}
