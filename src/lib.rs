//! MSR Policy Updater - bulk credential rotation for MSR mirroring policies
//!
//! Walks every repository of a Mirantis Secure Registry and rewrites the
//! username and password stored on its push and/or poll mirroring policies.
//!
//! ## Modules
//!
//! - [`client`]: MSR management API client and the [`MirrorApi`] trait
//! - [`updater`]: Paginated update loop
//! - [`models`]: Repository, policy and credential types
//! - [`error`]: Client and run error types
//! - [`config`]: YAML configuration file

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod updater;

pub use client::{MirrorApi, MsrClient, MsrClientBuilder};
pub use config::Config;
pub use error::{MsrError, UpdateError};
pub use models::{Credentials, MirroringPolicy, PolicyKind, Repository, RepositoryPage, DEFAULT_BATCH_SIZE};
pub use updater::{PolicyUpdater, UpdateConfig, UpdateSummary};
