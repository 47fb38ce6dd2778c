//! Policy Updater - walks every repository and rewrites mirroring credentials
//!
//! Repositories are fetched page by page. Each repository's poll policies are
//! updated before its push policies. The first failure of any call stops the
//! run: nothing is retried and nothing after the failing call is touched.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::client::MirrorApi;
use crate::error::{MsrError, UpdateError};
use crate::models::{Credentials, MirroringPolicy, PolicyKind, Repository, DEFAULT_BATCH_SIZE};

/// Everything one run needs besides the client
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// New mirror credentials written into every policy
    pub credentials: Credentials,
    /// Update poll mirroring policies
    pub poll: bool,
    /// Update push mirroring policies
    pub push: bool,
    /// Repositories requested per page
    pub batch_size: u32,
}

impl UpdateConfig {
    pub fn new(credentials: Credentials, poll: bool, push: bool) -> Self {
        Self {
            credentials,
            poll,
            push,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Reject configurations that cannot do any work
    pub fn validate(&self) -> Result<(), UpdateError> {
        if !self.poll && !self.push {
            return Err(UpdateError::NothingToUpdate);
        }
        if self.batch_size == 0 {
            return Err(UpdateError::InvalidBatchSize);
        }
        Ok(())
    }

    /// Policy kinds to process for each repository, in processing order
    pub fn kinds(&self) -> Vec<PolicyKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.poll {
            kinds.push(PolicyKind::Poll);
        }
        if self.push {
            kinds.push(PolicyKind::Push);
        }
        kinds
    }
}

/// Counts from a run that completed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub pages: usize,
    pub repositories: usize,
    pub poll_policies_updated: usize,
    pub push_policies_updated: usize,
}

impl UpdateSummary {
    pub fn policies_updated(&self) -> usize {
        self.poll_policies_updated + self.push_policies_updated
    }

    fn record_update(&mut self, kind: PolicyKind) {
        match kind {
            PolicyKind::Poll => self.poll_policies_updated += 1,
            PolicyKind::Push => self.push_policies_updated += 1,
        }
    }
}

/// Drives a credential rotation over every repository the client can list
pub struct PolicyUpdater<C> {
    client: C,
}

impl<C: MirrorApi> PolicyUpdater<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run the update across all repositories
    ///
    /// Returns on the first error with the cursor, repository or policy that
    /// failed attached. Policies updated before the failure stay updated.
    pub async fn run(&self, config: &UpdateConfig) -> Result<UpdateSummary, UpdateError> {
        config.validate()?;

        info!(
            "Performing policy updates on all repositories in batches of {} (Poll: {}, Push: {})",
            config.batch_size, config.poll, config.push
        );

        let kinds = config.kinds();
        let mut summary = UpdateSummary::default();
        let mut cursor = String::new();
        let mut seen_cursors = HashSet::new();

        loop {
            debug!(
                "Fetching batch of {} repositories (pageStart: {:?})",
                config.batch_size, cursor
            );

            let page = self
                .client
                .list_repositories(config.batch_size, &cursor)
                .await
                .map_err(|source| UpdateError::ListRepositories {
                    cursor: cursor.clone(),
                    page_size: config.batch_size,
                    source,
                })?;
            summary.pages += 1;

            debug!(
                "Fetched {} repositories (nextPageStart: {:?})",
                page.repositories.len(),
                page.next_cursor
            );

            // A cursor MSR already handed out would walk the same pages forever
            if !page.is_last()
                && (page.next_cursor == cursor || seen_cursors.contains(&page.next_cursor))
            {
                return Err(UpdateError::ListRepositories {
                    cursor,
                    page_size: config.batch_size,
                    source: MsrError::RepeatedCursor {
                        cursor: page.next_cursor,
                    },
                });
            }

            for repository in &page.repositories {
                for &kind in &kinds {
                    self.update_repository(repository, kind, &config.credentials, &mut summary)
                        .await?;
                }
                summary.repositories += 1;
            }

            if page.is_last() {
                info!("No additional batches of repositories to process, done");
                break;
            }
            seen_cursors.insert(std::mem::replace(&mut cursor, page.next_cursor));
        }

        info!(
            "Updated {} poll and {} push mirroring policies across {} repositories ({} pages)",
            summary.poll_policies_updated,
            summary.push_policies_updated,
            summary.repositories,
            summary.pages
        );

        Ok(summary)
    }

    /// Rewrite credentials on every `kind` policy of one repository
    async fn update_repository(
        &self,
        repository: &Repository,
        kind: PolicyKind,
        credentials: &Credentials,
        summary: &mut UpdateSummary,
    ) -> Result<(), UpdateError> {
        let repo_name = repository.full_name();

        debug!(
            "Getting list of {} mirror policies for repository: {:?}",
            kind, repo_name
        );

        let policies = self
            .list_policies(kind, repository)
            .await
            .map_err(|source| UpdateError::ListPolicies {
                kind,
                repository: repo_name.clone(),
                source,
            })?;

        for policy in &policies {
            debug!(
                "Updating {} mirror policy (id: {:?}, repository: {:?})",
                kind, policy.id, repo_name
            );

            self.update_policy(kind, &policy.id, repository, credentials)
                .await
                .map_err(|source| UpdateError::UpdatePolicy {
                    kind,
                    policy_id: policy.id.clone(),
                    repository: repo_name.clone(),
                    source,
                })?;

            summary.record_update(kind);
        }

        Ok(())
    }

    async fn list_policies(
        &self,
        kind: PolicyKind,
        repository: &Repository,
    ) -> Result<Vec<MirroringPolicy>, MsrError> {
        match kind {
            PolicyKind::Poll => self.client.list_poll_policies(repository).await,
            PolicyKind::Push => self.client.list_push_policies(repository).await,
        }
    }

    async fn update_policy(
        &self,
        kind: PolicyKind,
        policy_id: &str,
        repository: &Repository,
        credentials: &Credentials,
    ) -> Result<(), MsrError> {
        match kind {
            PolicyKind::Poll => {
                self.client
                    .update_poll_policy(policy_id, repository, credentials)
                    .await
            }
            PolicyKind::Push => {
                self.client
                    .update_push_policy(policy_id, repository, credentials)
                    .await
            }
        }
    }
}
