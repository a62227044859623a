//! civic-core: Core library for the civic issue reporting service
//!
//! Provides the issue data model, the JSONL record store, and the lifecycle
//! operations (create, query, upvote, status transition).

pub mod access;
pub mod config;
pub mod error;
pub mod id;
pub mod issue;
pub mod service;
pub mod store;

pub use access::{AdminCapability, Caller, Role};
pub use config::{Config, MediaBackend};
pub use error::Error;
pub use id::generate_id;
pub use issue::{
    CATEGORIES, Issue, Location, LocationInput, NewIssue, Status, StatusUpdate, Upvotes,
};
pub use service::{IssueFilter, IssueService};
pub use store::Store;

/// Result type for civic operations
pub type Result<T> = std::result::Result<T, Error>;
