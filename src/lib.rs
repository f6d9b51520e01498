// gh-bulk library.
// Caching GitHub API client, paginated fetch worker, and repository
// pattern filtering for bulk repository and team management.

pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod github;

pub use config::{Settings, settings_path};
pub use error::{BulkError, Result};
pub use fetch::{CancelHandle, FetchEvent, ListSource, PER_PAGE, Pager};
pub use filter::{glob_to_regex, matching_repositories};
pub use github::{GitHubClient, ResponseCache};
