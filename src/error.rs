//! Error types for MSR API calls and policy update runs

use thiserror::Error;

use crate::models::PolicyKind;

/// Errors returned by [`MirrorApi`](crate::client::MirrorApi) operations
#[derive(Error, Debug)]
pub enum MsrError {
    /// The caller's own management-API credentials are missing or were rejected
    #[error("failed to authenticate with target MSR: check provided msr-username and msr-password")]
    Unauthenticated,

    /// MSR refused the new mirror credentials written into a policy
    #[error(
        "MSR rejected the mirroring credentials for policy {policy_id:?} on repository {repository:?}: {message}"
    )]
    MirrorCredentialsRejected {
        policy_id: String,
        repository: String,
        message: String,
    },

    #[error("MSR responded with unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The repository listing handed back a page start it had already returned
    #[error("MSR returned page start {cursor:?} more than once")]
    RepeatedCursor { cursor: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid MSR host {0:?}")]
    InvalidHost(String),
}

impl MsrError {
    /// Network, timeout, decoding, unexpected-status and broken-paging failures
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MsrError::Http(_) | MsrError::UnexpectedStatus { .. } | MsrError::RepeatedCursor { .. }
        )
    }
}

/// Errors that abort a policy update run
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("either poll or push mirroring must be requested")]
    NothingToUpdate,

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("failed to list batch of repositories (page start: {cursor:?}, page size: {page_size})")]
    ListRepositories {
        cursor: String,
        page_size: u32,
        #[source]
        source: MsrError,
    },

    #[error("failed to list {kind} mirroring policies for repository {repository:?}")]
    ListPolicies {
        kind: PolicyKind,
        repository: String,
        #[source]
        source: MsrError,
    },

    #[error("failed to update {kind} mirroring policy (id: {policy_id:?}, repository: {repository:?})")]
    UpdatePolicy {
        kind: PolicyKind,
        policy_id: String,
        repository: String,
        #[source]
        source: MsrError,
    },
}

impl UpdateError {
    /// The client error that stopped the run, if the run got that far
    pub fn client_error(&self) -> Option<&MsrError> {
        match self {
            UpdateError::NothingToUpdate | UpdateError::InvalidBatchSize => None,
            UpdateError::ListRepositories { source, .. }
            | UpdateError::ListPolicies { source, .. }
            | UpdateError::UpdatePolicy { source, .. } => Some(source),
        }
    }

    /// Repository being processed when the run stopped
    pub fn repository(&self) -> Option<&str> {
        match self {
            UpdateError::ListPolicies { repository, .. }
            | UpdateError::UpdatePolicy { repository, .. } => Some(repository.as_str()),
            _ => None,
        }
    }
}
