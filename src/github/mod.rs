// GitHub API module.
// Provides the cached client and record types for the GitHub REST API.

pub mod cache;
pub mod client;
pub mod endpoints;
pub mod types;

pub use cache::{CacheEntry, ResponseCache};
pub use client::{ErrorHandler, GitHubClient};
pub use types::*;
