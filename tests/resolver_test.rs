//! Integration tests for the direct-call resolver used by downloads.

mod common;

use comic_fetch::CancelFlag;
use comic_fetch::FetchError;
use comic_fetch::HttpExecutor;
use comic_fetch::LazyLinkResolver;
use httpmock::Method::GET;
use httpmock::MockServer;

use common::ScriptedSource;
use common::fast_config;
use common::registry_with;

fn resolver(server: &MockServer, source: ScriptedSource) -> LazyLinkResolver {
    LazyLinkResolver::new(registry_with(source), HttpExecutor::new(&fast_config()))
}

#[tokio::test]
async fn test_chapter_images_direct_call() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/images/s1/c1");
        then.status(200)
            .body("https://img.example/1.jpg\nhttps://img.example/2.jpg");
    });

    let resolver = resolver(&server, ScriptedSource::new(1, server.url("")));
    let images = resolver
        .chapter_images(1, "s1", "c1", &CancelFlag::new())
        .await
        .expect("direct image fetch");
    assert_eq!(images.len(), 2);
}

#[tokio::test]
async fn test_image_server_phase_is_best_effort() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/imgserver");
        then.status(500);
    });
    let images_mock = server.mock(|when, then| {
        when.method(GET).path("/images/s1/c1");
        then.status(200).body("https://img.example/1.jpg");
    });

    let resolver = resolver(
        &server,
        ScriptedSource::new(1, server.url("")).with_image_server(),
    );
    let images = resolver
        .chapter_images(1, "s1", "c1", &CancelFlag::new())
        .await
        .expect("direct image fetch");

    // The failed discovery is logged and skipped; the images phase still ran.
    images_mock.assert();
    assert_eq!(images.len(), 1);
}

#[tokio::test]
async fn test_failed_images_fetch_collapses_to_empty() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/images/s1/c1");
        then.status(502);
    });

    let resolver = resolver(&server, ScriptedSource::new(1, server.url("")));
    let images = resolver
        .chapter_images(1, "s1", "c1", &CancelFlag::new())
        .await
        .expect("swallowed failure");
    assert!(images.is_empty());
}

#[tokio::test]
async fn test_cancellation_propagates_and_skips_network() {
    let server = MockServer::start();
    let catch_all = server.mock(|when, then| {
        when.method(GET);
        then.status(200).body("https://img.example/1.jpg");
    });

    let cancel = CancelFlag::new();
    cancel.cancel();

    let resolver = resolver(
        &server,
        ScriptedSource::new(1, server.url("")).with_image_server(),
    );
    let err = resolver
        .chapter_images(1, "s1", "c1", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Canceled));
    catch_all.assert_hits(0);
}

#[tokio::test]
async fn test_lazy_url_resolution() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/lazy/7");
        then.status(200).body("img=https://img.example/real-7.jpg");
    });

    let resolver = resolver(&server, ScriptedSource::new(1, server.url("")));
    let resolved = resolver
        .lazy_url(1, &server.url("/lazy/7"), &CancelFlag::new())
        .await
        .expect("lazy resolution");
    assert_eq!(resolved.as_deref(), Some("https://img.example/real-7.jpg"));
}

#[tokio::test]
async fn test_lazy_url_failure_keeps_original() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/lazy/7");
        then.status(404);
    });

    let resolver = resolver(&server, ScriptedSource::new(1, server.url("")));
    let resolved = resolver
        .lazy_url(1, &server.url("/lazy/7"), &CancelFlag::new())
        .await
        .expect("swallowed failure");
    assert_eq!(resolved, None);
}

#[tokio::test]
async fn test_lazy_url_cancellation_propagates() {
    let server = MockServer::start();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let resolver = resolver(&server, ScriptedSource::new(1, server.url("")));
    let err = resolver
        .lazy_url(1, &server.url("/lazy/7"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Canceled));
}
