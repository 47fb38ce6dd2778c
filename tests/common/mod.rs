//! Common test utilities and helpers for MSR policy updater tests

#![allow(dead_code)]

use msr_policy_updater::{Credentials, MsrClient};
use serde_json::{json, Value};
use wiremock::{Match, MockServer, Request};

pub const MSR_USERNAME: &str = "admin";
pub const MSR_PASSWORD: &str = "secret";

/// `Authorization` header value for `admin:secret`
pub const BASIC_AUTH_HEADER: &str = "Basic YWRtaW46c2VjcmV0";

/// Client pointed at the mock server with the standard test credentials
pub fn msr_client(server: &MockServer) -> MsrClient {
    MsrClient::authenticate(MSR_USERNAME, MSR_PASSWORD, &server.uri(), false)
        .expect("Failed to build MSR client")
}

pub fn mirror_credentials() -> Credentials {
    Credentials::new("mirror-bot", "n3w-pa55")
}

/// Repository payload shaped like the MSR API response
pub fn repository_json(namespace: &str, name: &str) -> Value {
    json!({
        "id": format!("{}-{}-id", namespace, name),
        "namespace": namespace,
        "namespaceType": "organization",
        "name": name,
        "shortDescription": "",
        "visibility": "private",
        "scanOnPush": false,
        "immutableTags": false,
        "enableManifestLists": false,
        "pulls": 0,
        "pushes": 0,
        "tagLimit": 0
    })
}

/// `GET /api/v0/repositories` body for repositories `ns/repo-{start..end}`
pub fn repositories_page(start: usize, end: usize) -> Value {
    let repositories: Vec<Value> = (start..end)
        .map(|i| repository_json("ns", &format!("repo-{}", i)))
        .collect();
    json!({ "repositories": repositories })
}

/// Mirroring policy payload with the fields MSR returns
pub fn policy_json(id: &str) -> Value {
    json!({
        "id": id,
        "enabled": true,
        "lastStatus": { "code": "SUCCESS", "detail": "" },
        "remoteHost": "https://upstream.example.com",
        "remoteRepository": "mirror/app",
        "username": "old-user",
        "authType": "password"
    })
}

/// Paths of all requests the server saw, in arrival order
pub async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("Request recording is enabled")
        .iter()
        .map(|request| format!("{} {}", request.method, request.url.path()))
        .collect()
}

/// Matches listing requests for the first page (no `pageStart` parameter)
pub struct NoPageStart;

impl Match for NoPageStart {
    fn matches(&self, request: &Request) -> bool {
        request.url.query_pairs().all(|(key, _)| key != "pageStart")
    }
}
