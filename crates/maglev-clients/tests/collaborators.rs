//! Wiring of the HTTP collaborators from a resolved configuration.

use std::collections::HashMap;

use maglev_clients::{
    build_http_client, build_redirect_client, Collaborators, GitHubClient, SourceArchive,
};
use maglev_core::{FetchErrorKind, MaglevConfig, SourceControl};

fn config() -> MaglevConfig {
    let env = HashMap::from([
        ("TRAIN_IS_RUNNING", "true"),
        ("HEROKU_APP_NAME", "shop-web"),
        ("SOURCE_BRANCH", "main"),
        ("CIRCLECI_TOKEN", "cci"),
        ("CIRCLECI_PROJECT_SLUG", "gh/acme/shop"),
        ("GITHUB_ACCESS_TOKEN", "gh"),
        ("GITHUB_OWNER", "acme"),
        ("GITHUB_REPO", "shop"),
        ("HEROKU_ACCESS_TOKEN", "heroku"),
        ("SLACK_API_TOKEN", "xoxb"),
        ("MAGLEV_HTTP_TIMEOUT_MS", "500"),
    ]);
    MaglevConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap()
}

#[test]
fn test_builds_every_collaborator_offline() {
    assert!(Collaborators::from_config(&config()).is_ok());
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_error_with_provenance() {
    let cfg = config();
    let http = build_http_client(cfg.retry.timeout_ms).unwrap();
    // Port 9 (discard) on localhost is closed on any sane test host.
    let archive = build_redirect_client(cfg.retry.timeout_ms).unwrap();
    let scm = GitHubClient::new(http, archive, &cfg.github).with_base_url("http://127.0.0.1:9");

    let err = scm.compare("aaa", "bbb").await.unwrap_err();

    assert!(matches!(
        err.kind,
        FetchErrorKind::Transport | FetchErrorKind::Timeout
    ));
    assert_eq!(err.method.as_deref(), Some("GET"));
    assert_eq!(
        err.url.as_deref(),
        Some("http://127.0.0.1:9/repos/acme/shop/compare/aaa...bbb")
    );
}

#[tokio::test]
async fn test_unreachable_archive_host_fails_the_resolution() {
    let cfg = config();
    let scm = GitHubClient::new(
        build_http_client(cfg.retry.timeout_ms).unwrap(),
        build_redirect_client(cfg.retry.timeout_ms).unwrap(),
        &cfg.github,
    )
    .with_base_url("http://127.0.0.1:9");

    let err = scm.archive_url("abc").await.unwrap_err();

    assert_eq!(err.method.as_deref(), Some("GET"));
    assert_eq!(
        err.url.as_deref(),
        Some("http://127.0.0.1:9/repos/acme/shop/tarball/abc")
    );
}
