//! Integration tests for chains running on the HTTP fetcher
//!
//! These tests use wiremock to create mock HTTP servers and drive complete
//! runs end-to-end.

use scrape_chain::config::Config;
use scrape_chain::{
    extract, Chain, ChainError, ExtractError, FetchError, Fetcher, HttpFetcher, RequestOptions,
    RunOutcome,
};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn create_test_fetcher() -> HttpFetcher {
    HttpFetcher::new(&Config::default()).expect("Failed to build fetcher")
}

async fn mount_page(server: &MockServer, route: &str, status: u16, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_status_and_extract_on_matching_page() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/",
        200,
        r#"<html><head><title>Home</title></head><body><a href="/about">About</a></body></html>"#,
    )
    .await;

    let log = Log::default();
    let (status_log, extract_log, done_log) = (log.clone(), log.clone(), log.clone());

    let mut chain = Chain::new(create_test_fetcher())
        .on_status(200, move |_| push(&status_log, "status"))
        .extract(
            |page, _| Ok((extract::title(page), extract::links(page))),
            move |(title, links), _| {
                push(&extract_log, format!("title:{}", title.unwrap_or_default()));
                for link in links {
                    push(&extract_log, format!("link:{}", link));
                }
            },
            vec![],
        )
        .done(move |_| push(&done_log, "done"));

    let outcome = chain
        .get(&format!("{}/", mock_server.uri()))
        .await
        .expect("Chain failed");

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        entries(&log),
        vec![
            "status".to_string(),
            "title:Home".to_string(),
            format!("link:{}/about", mock_server.uri()),
            "done".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_status_mismatch_still_reaches_done() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", 200, "<html></html>").await;

    let log = Log::default();
    let (status_log, done_log) = (log.clone(), log.clone());

    let mut chain = Chain::new(create_test_fetcher())
        .on_status(404, move |_| push(&status_log, "not found"))
        .done(move |_| push(&done_log, "done"));

    let outcome = chain
        .get(&format!("{}/", mock_server.uri()))
        .await
        .expect("Chain failed");

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(entries(&log), vec!["done"]);
}

#[tokio::test]
async fn test_stop_skips_later_steps() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", 200, "<html></html>").await;

    let log = Log::default();
    let (step_log, done_log) = (log.clone(), log.clone());

    let mut chain = Chain::new(create_test_fetcher())
        .then(|context| context.stop())
        .then(move |_| push(&step_log, "skipped"))
        .done(move |_| push(&done_log, "done"));

    let outcome = chain
        .get(&format!("{}/", mock_server.uri()))
        .await
        .expect("Chain failed");

    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(entries(&log), vec!["done"]);
}

#[tokio::test]
async fn test_unhandled_extract_error_surfaces_after_done() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", 200, "<html><body></body></html>").await;

    let log = Log::default();
    let done_log = log.clone();

    let mut chain = Chain::new(create_test_fetcher())
        .extract(|page, _| extract::first_text(page, "h1"), |_, _| {}, vec![])
        .done(move |_| push(&done_log, "done"));

    let result = chain.get(&format!("{}/", mock_server.uri())).await;

    assert_eq!(entries(&log), vec!["done"]);
    assert!(matches!(
        result,
        Err(ChainError::Extract(ExtractError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_failed_initiating_request_skips_steps() {
    let log = Log::default();
    let (step_log, error_log, done_log) = (log.clone(), log.clone(), log.clone());

    let mut chain = Chain::new(create_test_fetcher())
        .then(move |_| push(&step_log, "skipped"))
        .on_error(move |error, _| {
            assert!(matches!(error, ChainError::Fetch(FetchError::InvalidUrl { .. })));
            push(&error_log, "error");
        })
        .done(move |_| push(&done_log, "done"));

    let outcome = chain.get("not a url").await.expect("Error was handled");

    assert_eq!(outcome, RunOutcome::Failed);
    assert_eq!(entries(&log), vec!["error", "done"]);
    assert_eq!(chain.fetcher().status_code(), 0);
}

#[tokio::test]
async fn test_request_with_options() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(header("x-token", "secret"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(201).set_body_string("<p>created</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let log = Log::default();
    let status_log = log.clone();

    let mut chain = Chain::new(create_test_fetcher())
        .inspect_status(move |status, _| push(&status_log, status.to_string()));

    let options = RequestOptions::post(format!("{}/search", mock_server.uri()))
        .query("q", "rust")
        .header("x-token", "secret")
        .body("payload");

    let outcome = chain.request(options).await.expect("Chain failed");

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(entries(&log), vec!["201"]);
}

#[tokio::test]
async fn test_forks_run_independent_targets() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/a",
        200,
        "<html><head><title>A</title></head></html>",
    )
    .await;
    mount_page(
        &mock_server,
        "/b",
        404,
        "<html><head><title>B</title></head></html>",
    )
    .await;

    let titles = Log::default();
    let sink = titles.clone();

    let chain = Chain::new(create_test_fetcher())
        .on_status(404, |context| context.stop())
        .extract(
            |page, _| Ok(extract::title(page).unwrap_or_default()),
            move |title, _| push(&sink, title),
            vec![],
        );

    let mut first = chain.fork();
    let mut second = chain.fork();

    let a = first.get(&format!("{}/a", mock_server.uri())).await.unwrap();
    let b = second.get(&format!("{}/b", mock_server.uri())).await.unwrap();

    assert_eq!(a, RunOutcome::Completed);
    assert_eq!(b, RunOutcome::Stopped);
    assert_eq!(entries(&titles), vec!["A"]);
}

#[tokio::test]
async fn test_param_labels_run() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", 200, "<html></html>").await;

    let log = Log::default();
    let sink = log.clone();

    let mut chain = Chain::new(create_test_fetcher()).done(move |context| {
        push(
            &sink,
            context
                .param::<&'static str>()
                .copied()
                .unwrap_or("unlabeled"),
        )
    });

    chain.set_param("first");
    chain.get(&format!("{}/", mock_server.uri())).await.unwrap();
    chain.get(&format!("{}/", mock_server.uri())).await.unwrap();

    assert_eq!(entries(&log), vec!["first", "unlabeled"]);
}
