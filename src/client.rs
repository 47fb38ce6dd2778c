//! MSR management API client
//!
//! [`MirrorApi`] is the narrow interface the policy updater consumes.
//! [`MsrClient`] implements it over HTTPS against the `/api/v0` endpoints,
//! authenticating every request with HTTP basic auth and mapping response
//! statuses onto [`MsrError`] variants.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::MsrError;
use crate::models::{
    ApiErrorResponse, Credentials, MirroringPolicy, PolicyKind, RepositoriesResponse, Repository,
    RepositoryPage,
};

/// Response header carrying the cursor for the next repository page
pub const NEXT_PAGE_HEADER: &str = "X-Next-Page-Start";

/// Operations the policy updater needs from a registry
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorApi: Send + Sync {
    /// Fetch up to `page_size` repositories starting at `page_cursor`
    ///
    /// An empty cursor starts from the beginning. The returned page carries an
    /// empty `next_cursor` when it is the last one.
    async fn list_repositories(
        &self,
        page_size: u32,
        page_cursor: &str,
    ) -> Result<RepositoryPage, MsrError>;

    async fn list_poll_policies(
        &self,
        repository: &Repository,
    ) -> Result<Vec<MirroringPolicy>, MsrError>;

    async fn list_push_policies(
        &self,
        repository: &Repository,
    ) -> Result<Vec<MirroringPolicy>, MsrError>;

    async fn update_poll_policy(
        &self,
        policy_id: &str,
        repository: &Repository,
        credentials: &Credentials,
    ) -> Result<(), MsrError>;

    async fn update_push_policy(
        &self,
        policy_id: &str,
        repository: &Repository,
        credentials: &Credentials,
    ) -> Result<(), MsrError>;
}

pub struct MsrClientBuilder {
    host: String,
    username: String,
    password: String,
    allow_insecure_tls: bool,
    timeout: Option<Duration>,
}

impl MsrClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: String::new(),
            password: String::new(),
            allow_insecure_tls: false,
            timeout: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_insecure_tls(mut self, allow_insecure_tls: bool) -> Self {
        self.allow_insecure_tls = allow_insecure_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client without contacting the registry
    pub fn build(self) -> Result<MsrClient, MsrError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(MsrError::Unauthenticated);
        }

        let base_url = parse_host(&self.host)?;

        let mut builder = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));

        if self.allow_insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build()?;

        debug!(
            "Created MSR client for {} (insecure TLS: {})",
            base_url, self.allow_insecure_tls
        );

        Ok(MsrClient {
            http,
            base_url,
            username: self.username,
            password: self.password,
        })
    }
}

/// HTTPS client for the MSR management API, bound to one host and one user
#[derive(Clone)]
pub struct MsrClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl fmt::Debug for MsrClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsrClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl MsrClient {
    /// Create a client for `host` authenticating as `username`
    ///
    /// Empty credentials fail with [`MsrError::Unauthenticated`]. No request is
    /// made here; MSR only validates the credentials on the first call.
    pub fn authenticate(
        username: &str,
        password: &str,
        host: &str,
        allow_insecure_tls: bool,
    ) -> Result<Self, MsrError> {
        Self::builder(host)
            .with_credentials(username, password)
            .with_insecure_tls(allow_insecure_tls)
            .build()
    }

    pub fn builder(host: impl Into<String>) -> MsrClientBuilder {
        MsrClientBuilder::new(host)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Build `<base>/api/v0/<segments...>`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, MsrError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MsrError::InvalidHost(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v0"])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, MsrError> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(response)
    }

    async fn list_policies(
        &self,
        kind: PolicyKind,
        repository: &Repository,
    ) -> Result<Vec<MirroringPolicy>, MsrError> {
        let url = self.endpoint(&[
            "repositories",
            &repository.namespace,
            &repository.name,
            kind.endpoint(),
        ])?;

        debug!("GET {}", url);

        let response = check_status(self.send(self.http.get(url)).await?).await?;
        let policies: Option<Vec<MirroringPolicy>> = response.json().await?;

        Ok(policies.unwrap_or_default())
    }

    async fn update_policy(
        &self,
        kind: PolicyKind,
        policy_id: &str,
        repository: &Repository,
        credentials: &Credentials,
    ) -> Result<(), MsrError> {
        let url = self.endpoint(&[
            "repositories",
            &repository.namespace,
            &repository.name,
            kind.endpoint(),
            policy_id,
        ])?;

        debug!("PUT {}", url);

        let response = self.send(self.http.put(url).json(credentials)).await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(MsrError::MirrorCredentialsRejected {
                policy_id: policy_id.to_string(),
                repository: repository.full_name(),
                message: ApiErrorResponse::summarize(&body),
            });
        }

        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl MirrorApi for MsrClient {
    async fn list_repositories(
        &self,
        page_size: u32,
        page_cursor: &str,
    ) -> Result<RepositoryPage, MsrError> {
        let url = self.endpoint(&["repositories"])?;

        let mut request = self
            .http
            .get(url)
            .query(&[("pageSize", page_size.to_string())]);
        if !page_cursor.is_empty() {
            request = request.query(&[("pageStart", page_cursor)]);
        }

        debug!(
            "Listing repositories (pageSize: {}, pageStart: {:?})",
            page_size, page_cursor
        );

        let response = check_status(self.send(request).await?).await?;

        let next_cursor = response
            .headers()
            .get(NEXT_PAGE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body: RepositoriesResponse = response.json().await?;

        Ok(RepositoryPage {
            repositories: body.repositories,
            next_cursor,
        })
    }

    async fn list_poll_policies(
        &self,
        repository: &Repository,
    ) -> Result<Vec<MirroringPolicy>, MsrError> {
        self.list_policies(PolicyKind::Poll, repository).await
    }

    async fn list_push_policies(
        &self,
        repository: &Repository,
    ) -> Result<Vec<MirroringPolicy>, MsrError> {
        self.list_policies(PolicyKind::Push, repository).await
    }

    async fn update_poll_policy(
        &self,
        policy_id: &str,
        repository: &Repository,
        credentials: &Credentials,
    ) -> Result<(), MsrError> {
        self.update_policy(PolicyKind::Poll, policy_id, repository, credentials)
            .await
    }

    async fn update_push_policy(
        &self,
        policy_id: &str,
        repository: &Repository,
        credentials: &Credentials,
    ) -> Result<(), MsrError> {
        self.update_policy(PolicyKind::Push, policy_id, repository, credentials)
            .await
    }
}

/// Map 401 to `Unauthenticated` and any other non-2xx to `UnexpectedStatus`
async fn check_status(response: Response) -> Result<Response, MsrError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(MsrError::Unauthenticated);
    }

    let body = response.text().await.unwrap_or_default();
    Err(MsrError::UnexpectedStatus {
        status: status.as_u16(),
        message: ApiErrorResponse::summarize(&body),
    })
}

/// Accept `host`, `host:port` or a full URL; bare hosts get `https`
fn parse_host(host: &str) -> Result<Url, MsrError> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(MsrError::InvalidHost(host.to_string()));
    }

    // Scheme is detected before any trailing-slash trimming so "https://" stays hostless
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_end_matches('/'))
    };

    let url = Url::parse(&candidate).map_err(|_| MsrError::InvalidHost(host.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(MsrError::InvalidHost(host.to_string()));
    }

    Ok(url)
}
