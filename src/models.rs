//! MSR API data types
//!
//! Only the fields the updater needs are modelled; everything else in the
//! MSR payloads is ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of repositories fetched per page
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Username/password pair written into mirroring policies
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A repository as returned by the repository listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub namespace: String,
    pub name: String,
}

impl Repository {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Get display name (namespace/name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A push or poll mirroring policy attached to a repository
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MirroringPolicy {
    pub id: String,
}

impl MirroringPolicy {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Mirroring policy flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Policies that pull content from a remote registry into MSR
    Poll,
    /// Policies that push content from MSR to a remote registry
    Push,
}

impl PolicyKind {
    /// Path segment of the policy collection under a repository
    pub fn endpoint(&self) -> &'static str {
        match self {
            PolicyKind::Poll => "pollMirroringPolicies",
            PolicyKind::Push => "pushMirroringPolicies",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Poll => write!(f, "poll"),
            PolicyKind::Push => write!(f, "push"),
        }
    }
}

/// One page of the repository listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,
    /// Empty on the last page
    pub next_cursor: String,
}

impl RepositoryPage {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_empty()
    }
}

/// Body of `GET /api/v0/repositories`
#[derive(Debug, Deserialize)]
pub(crate) struct RepositoriesResponse {
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// Error body MSR attaches to non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ApiErrorResponse {
    /// Flatten the error list into one line, falling back to `raw`
    pub fn summarize(raw: &str) -> String {
        match serde_json::from_str::<ApiErrorResponse>(raw) {
            Ok(body) if !body.errors.is_empty() => body
                .errors
                .iter()
                .map(|e| match (e.code.is_empty(), e.message.is_empty()) {
                    (false, false) => format!("{}: {}", e.code, e.message),
                    (false, true) => e.code.clone(),
                    _ => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            _ => raw.trim().to_string(),
        }
    }
}
