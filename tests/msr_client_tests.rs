mod common;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use msr_policy_updater::{
    MirrorApi, MirroringPolicy, MsrError, PolicyKind, PolicyUpdater, Repository, UpdateConfig,
    UpdateError,
};

// HTTP-level tests for the MSR client against a mock MSR

#[tokio::test]
async fn test_list_repositories_first_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories"))
        .and(query_param("pageSize", "100"))
        .and(header("authorization", BASIC_AUTH_HEADER))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(repositories_page(0, 2))
                .insert_header("X-Next-Page-Start", "c2"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = msr_client(&server);
    let page = client
        .list_repositories(100, "")
        .await
        .expect("Failed to list repositories");

    assert_eq!(
        page.repositories,
        vec![Repository::new("ns", "repo-0"), Repository::new("ns", "repo-1")]
    );
    assert_eq!(page.next_cursor, "c2");
    assert!(!page.is_last());

    let requests = server.received_requests().await.expect("Request recording is enabled");
    assert!(requests[0].url.query_pairs().all(|(key, _)| key != "pageStart"));
}

#[tokio::test]
async fn test_list_repositories_passes_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories"))
        .and(query_param("pageSize", "5"))
        .and(query_param("pageStart", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repositories_page(5, 7)))
        .expect(1)
        .mount(&server)
        .await;

    let page = msr_client(&server)
        .list_repositories(5, "c2")
        .await
        .expect("Failed to list repositories");

    assert_eq!(page.repositories.len(), 2);
    assert!(page.is_last());
}

#[tokio::test]
async fn test_unauthorized_maps_to_unauthenticated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{ "code": "NOT_AUTHENTICATED", "message": "The client is not authenticated." }]
        })))
        .mount(&server)
        .await;

    let result = msr_client(&server).list_repositories(100, "").await;
    assert_matches!(result, Err(MsrError::Unauthenticated));
}

#[tokio::test]
async fn test_list_poll_policies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories/a/x/pollMirroringPolicies"))
        .and(header("authorization", BASIC_AUTH_HEADER))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([policy_json("p1"), policy_json("p2")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let policies = msr_client(&server)
        .list_poll_policies(&Repository::new("a", "x"))
        .await
        .expect("Failed to list poll policies");

    assert_eq!(policies, vec![MirroringPolicy::new("p1"), MirroringPolicy::new("p2")]);
}

#[tokio::test]
async fn test_list_push_policies_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories/a/x/pushMirroringPolicies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let policies = msr_client(&server)
        .list_push_policies(&Repository::new("a", "x"))
        .await
        .expect("Failed to list push policies");

    assert!(policies.is_empty());
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories/a/x/pushMirroringPolicies"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errors": [{ "code": "INTERNAL_ERROR", "message": "database unavailable" }]
        })))
        .mount(&server)
        .await;

    let err = msr_client(&server)
        .list_push_policies(&Repository::new("a", "x"))
        .await
        .expect_err("500 should fail");

    assert!(err.is_transport());
    assert_matches!(
        err,
        MsrError::UnexpectedStatus { status: 500, ref message }
            if message == "INTERNAL_ERROR: database unavailable"
    );
}

#[tokio::test]
async fn test_update_push_policy_sends_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v0/repositories/b/y/pushMirroringPolicies/q1"))
        .and(header("authorization", BASIC_AUTH_HEADER))
        .and(body_json(json!({ "username": "mirror-bot", "password": "n3w-pa55" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(policy_json("q1")))
        .expect(1)
        .mount(&server)
        .await;

    msr_client(&server)
        .update_push_policy("q1", &Repository::new("b", "y"), &mirror_credentials())
        .await
        .expect("Failed to update push policy");
}

#[tokio::test]
async fn test_update_bad_request_is_credentials_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v0/repositories/b/y/pollMirroringPolicies/p9"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "code": "INVALID_JSON", "message": "password must not be empty" }]
        })))
        .mount(&server)
        .await;

    let err = msr_client(&server)
        .update_poll_policy("p9", &Repository::new("b", "y"), &mirror_credentials())
        .await
        .expect_err("400 should fail");

    assert_matches!(
        err,
        MsrError::MirrorCredentialsRejected { ref policy_id, ref repository, ref message }
            if policy_id == "p9"
                && repository == "b/y"
                && message.contains("password must not be empty")
    );
}

#[tokio::test]
async fn test_update_unauthorized_is_not_credentials_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v0/repositories/b/y/pollMirroringPolicies/p9"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = msr_client(&server)
        .update_poll_policy("p9", &Repository::new("b", "y"), &mirror_credentials())
        .await;

    assert_matches!(result, Err(MsrError::Unauthenticated));
}

// Full runs of the updater against a mock MSR

#[tokio::test]
async fn test_run_pages_through_all_repositories() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories"))
        .and(query_param("pageStart", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repositories_page(100, 105)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories"))
        .and(query_param("pageSize", "100"))
        .and(NoPageStart)
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(repositories_page(0, 100))
                .insert_header("X-Next-Page-Start", "c2"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v0/repositories/ns/repo-\d+/pollMirroringPolicies$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(105)
        .mount(&server)
        .await;

    let updater = PolicyUpdater::new(msr_client(&server));
    let config = UpdateConfig::new(mirror_credentials(), true, false);

    let summary = updater.run(&config).await.expect("run should succeed");

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.repositories, 105);
    assert_eq!(summary.policies_updated(), 0);

    let listings = received_paths(&server)
        .await
        .into_iter()
        .filter(|p| p == "GET /api/v0/repositories")
        .count();
    assert_eq!(listings, 2);
}

#[tokio::test]
async fn test_run_stops_at_rejected_push_policy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "repositories": [
                repository_json("a", "x"),
                repository_json("b", "y"),
                repository_json("c", "z")
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories/a/x/pushMirroringPolicies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([policy_json("q0")])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v0/repositories/b/y/pushMirroringPolicies"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([policy_json("q1"), policy_json("q2")])),
        )
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v0/repositories/a/x/pushMirroringPolicies/q0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v0/repositories/b/y/pushMirroringPolicies/q1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "code": "INVALID_JSON", "message": "invalid mirroring credentials" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let updater = PolicyUpdater::new(msr_client(&server));
    let config = UpdateConfig::new(mirror_credentials(), false, true);

    let err = updater.run(&config).await.expect_err("run should fail");

    assert_matches!(
        &err,
        UpdateError::UpdatePolicy { kind: PolicyKind::Push, policy_id, repository, .. }
            if policy_id == "q1" && repository == "b/y"
    );
    assert_matches!(
        err.client_error(),
        Some(MsrError::MirrorCredentialsRejected { policy_id, repository, .. })
            if policy_id == "q1" && repository == "b/y"
    );

    let paths = received_paths(&server).await;
    assert_eq!(
        paths.last().map(String::as_str),
        Some("PUT /api/v0/repositories/b/y/pushMirroringPolicies/q1")
    );
    assert!(!paths.iter().any(|p| p.contains("/c/z/") || p.ends_with("/q2")));
}
