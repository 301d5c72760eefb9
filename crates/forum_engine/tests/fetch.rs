mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{html, init_logging, network_down, quick_retries, ScriptedTransport};
use encoding_rs::GBK;
use forum_core::ObstacleKind;
use forum_engine::{
    CharsetSource, Classifier, DecodeSettings, FailureKind, FetchOutcome, FetchSettings, NoSession,
    ReqwestTransport, ResilientFetcher, StaticSession, Transport, TransportSettings,
    DEFAULT_ACCEPT_LANGUAGE, DESKTOP_USER_AGENT,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scripted_fetcher(transport: Arc<ScriptedTransport>) -> ResilientFetcher {
    ResilientFetcher::new(
        transport,
        Arc::new(NoSession),
        Classifier::default(),
        DecodeSettings::default(),
        quick_retries(),
    )
}

fn http_fetcher(settings: &TransportSettings, cookie: Option<&str>) -> ResilientFetcher {
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new(settings).expect("http client"));
    let session: Arc<dyn forum_engine::SessionStore> = match cookie {
        Some(cookie) => Arc::new(StaticSession::new(cookie)),
        None => Arc::new(NoSession),
    };
    ResilientFetcher::new(
        transport,
        session,
        Classifier::default(),
        DecodeSettings::default(),
        quick_retries(),
    )
}

#[tokio::test]
async fn gbk_page_is_decoded_and_headers_are_sent() {
    init_logging();
    let server = MockServer::start().await;
    let (body, _, _) = GBK.encode("<html><body>欢迎来到论坛</body></html>");
    Mock::given(method("GET"))
        .and(path("/forum/index.php"))
        .and(header_exists("user-agent"))
        .and(header("Cookie", "cdb_auth=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_owned(), "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = http_fetcher(&TransportSettings::default(), Some("cdb_auth=abc"));
    let url = format!("{}/forum/index.php", server.uri());

    let FetchOutcome::Success(page) = fetcher.fetch(&url).await else {
        panic!("expected success");
    };
    assert_eq!(page.status, 200);
    assert_eq!(page.final_url, url);
    assert_eq!(page.document.source, CharsetSource::Fallback);
    assert_eq!(page.document.charset(), "GBK");
    assert!(page.document.text.contains("欢迎来到论坛"));

    let requests = server.received_requests().await.expect("recording enabled");
    let sent = |name: &str| {
        requests[0]
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(sent("user-agent").as_deref(), Some(DESKTOP_USER_AGENT));
    assert_eq!(sent("accept-language").as_deref(), Some(DEFAULT_ACCEPT_LANGUAGE));
}

#[tokio::test]
async fn server_error_is_retried_until_it_clears() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = http_fetcher(&TransportSettings::default(), None);
    let outcome = fetcher.fetch(&format!("{}/flaky", server.uri())).await;

    assert!(outcome.is_success(), "got {outcome:?}");
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn not_found_is_a_client_error_without_retry() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thread"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = http_fetcher(&TransportSettings::default(), None);
    let FetchOutcome::ClientError(failure) = fetcher.fetch(&format!("{}/missing", server.uri())).await
    else {
        panic!("expected a client error");
    };
    assert_eq!(failure.status, Some(404));
    assert_eq!(failure.kind, FailureKind::HttpStatus(404));
    assert_eq!(failure.excerpt.as_deref(), Some("no such thread"));
}

#[tokio::test]
async fn challenge_served_as_503_is_an_obstacle_not_a_retry() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guarded"))
        .respond_with(ResponseTemplate::new(503).set_body_raw(
            "<html><title>Just a moment...</title><p>Checking your browser before accessing</p></html>",
            "text/html; charset=utf-8",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = http_fetcher(&TransportSettings::default(), None);
    let outcome = fetcher.fetch(&format!("{}/guarded", server.uri())).await;

    let FetchOutcome::ObstacleDetected { kind, detail } = outcome else {
        panic!("expected an obstacle, got {outcome:?}");
    };
    assert_eq!(kind, ObstacleKind::AntiBotChallenge);
    assert_eq!(detail.status, Some(503));
}

#[tokio::test]
async fn redirect_loop_stops_at_the_limit() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let fetcher = http_fetcher(&TransportSettings::default(), None);
    let outcome = fetcher.fetch(&format!("{}/loop", server.uri())).await;

    let FetchOutcome::ClientError(failure) = outcome else {
        panic!("expected a client error, got {outcome:?}");
    };
    assert_eq!(failure.kind, FailureKind::RedirectLimitExceeded);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let settings = TransportSettings {
        max_bytes: 1024,
        ..TransportSettings::default()
    };
    let fetcher = http_fetcher(&settings, None);
    let outcome = fetcher.fetch(&format!("{}/huge", server.uri())).await;

    let FetchOutcome::ClientError(failure) = outcome else {
        panic!("expected a client error, got {outcome:?}");
    };
    assert!(matches!(failure.kind, FailureKind::TooLarge { max_bytes: 1024, .. }));
}

#[tokio::test]
async fn connection_failure_uses_every_attempt() {
    init_logging();
    let transport = ScriptedTransport::new(vec![network_down()]);
    let fetcher = scripted_fetcher(transport.clone());

    let outcome = fetcher.fetch("https://forum.test/forumdisplay.php?fid=2").await;

    let FetchOutcome::TransientError(failure) = outcome else {
        panic!("expected a transient error, got {outcome:?}");
    };
    assert_eq!(failure.kind, FailureKind::Network);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts() {
    init_logging();
    let transport = ScriptedTransport::new(vec![network_down()]);
    let fetcher = ResilientFetcher::new(
        transport.clone(),
        Arc::new(NoSession),
        Classifier::default(),
        DecodeSettings::default(),
        FetchSettings {
            initial_backoff: Duration::from_millis(100),
            max_retries: 2,
            ..FetchSettings::default()
        },
    );

    let started = tokio::time::Instant::now();
    let outcome = fetcher.fetch("https://forum.test/forumdisplay.php?fid=2").await;

    assert!(matches!(outcome, FetchOutcome::TransientError(_)), "got {outcome:?}");
    let gaps = transport.gaps();
    assert_eq!(gaps.len(), 2);
    // The paused clock jumps straight to each timer, give or take a tick.
    let tick = Duration::from_millis(5);
    for (gap, expected) in gaps.iter().zip([100, 200].map(Duration::from_millis)) {
        assert!(*gap >= expected && *gap < expected + tick, "{gaps:?}");
    }
    assert!(started.elapsed() < Duration::from_millis(300) + tick);
}

#[tokio::test]
async fn login_wall_is_reported_after_one_attempt() {
    init_logging();
    let transport = ScriptedTransport::new(vec![html(
        200,
        "<html><div class=\"alert_info\">您需要先登录才能继续本操作</div></html>",
    )]);
    let fetcher = scripted_fetcher(transport.clone());

    let outcome = fetcher.fetch("https://forum.test/forumdisplay.php?fid=57").await;

    let FetchOutcome::ObstacleDetected { kind, detail } = outcome else {
        panic!("expected an obstacle, got {outcome:?}");
    };
    assert_eq!(kind, ObstacleKind::AuthenticationRequired);
    assert!(detail.excerpt.unwrap_or_default().contains("您需要先登录"));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn empty_body_counts_as_transient() {
    init_logging();
    let transport = ScriptedTransport::new(vec![html(200, "   "), html(200, "<html>ok</html>")]);
    let fetcher = scripted_fetcher(transport.clone());

    let outcome = fetcher.fetch("https://forum.test/viewthread.php?tid=1").await;

    assert!(outcome.is_success(), "got {outcome:?}");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn invalid_url_is_not_retried() {
    init_logging();
    let transport = Arc::new(ReqwestTransport::new(&TransportSettings::default()).expect("client"));
    let fetcher = ResilientFetcher::new(
        transport,
        Arc::new(NoSession),
        Classifier::default(),
        DecodeSettings::default(),
        quick_retries(),
    );

    let outcome = fetcher.fetch("not a url").await;

    let FetchOutcome::ClientError(failure) = outcome else {
        panic!("expected a client error, got {outcome:?}");
    };
    assert_eq!(failure.kind, FailureKind::InvalidUrl);
}
