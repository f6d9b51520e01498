// GitHub API record types.
// Typed structs with the fields the tool reads, plus passthrough maps for the rest.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether an identity is an organization or a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OwnerKind {
    #[default]
    Organization,
    User,
}

impl OwnerKind {
    /// Base API path for this identity, e.g. `/orgs/fluidityproject`.
    pub fn identity_path(&self, name: &str) -> String {
        match self {
            OwnerKind::Organization => format!("/orgs/{}", name),
            OwnerKind::User => format!("/users/{}", name),
        }
    }
}

/// Organization or user info, used to size a repository enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    pub public_repos: u64,
    // Only present when the token grants visibility of private repos.
    pub total_private_repos: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identity {
    /// Total repositories the paginated listing is expected to yield.
    pub fn repo_count(&self) -> u64 {
        self.public_repos + self.total_private_repos.unwrap_or(0)
    }
}

/// A repository record. Fields beyond the ones the filter and the
/// bulk operations need are carried opaquely in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub archived: bool,
    pub html_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A team within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub html_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Permission granted when adding a team to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamPermission {
    #[default]
    Pull,
    Push,
    Admin,
}

impl TeamPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamPermission::Pull => "pull",
            TeamPermission::Push => "push",
            TeamPermission::Admin => "admin",
        }
    }
}

/// Status check context for the CI the original tool targeted.
pub const TRAVIS_CONTEXT: &str = "continuous-integration/travis-ci";

/// Branch protection payload.
///
/// The protection endpoint requires all four top-level fields to be present,
/// with explicit `null` for the ones being cleared, so none of these use
/// `skip_serializing_if`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchProtection {
    pub required_status_checks: Option<RequiredStatusChecks>,
    pub enforce_admins: Option<bool>,
    pub required_pull_request_reviews: Option<PullRequestReviews>,
    pub restrictions: Option<Value>,
}

impl BranchProtection {
    /// Require pull-request review before merging.
    pub fn require_pull_requests(mut self) -> Self {
        self.required_pull_request_reviews = Some(PullRequestReviews {
            dismissal_restrictions: Map::new(),
            dismiss_stale_reviews: true,
            require_code_owner_reviews: false,
        });
        self
    }

    /// Require the given status checks to pass before merging.
    pub fn require_status_checks(mut self, contexts: Vec<String>) -> Self {
        self.required_status_checks = Some(RequiredStatusChecks {
            strict: true,
            contexts,
        });
        self
    }
}

/// Required status checks section of a branch protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredStatusChecks {
    pub strict: bool,
    pub contexts: Vec<String>,
}

/// Required pull-request reviews section of a branch protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestReviews {
    pub dismissal_restrictions: Map<String, Value>,
    pub dismiss_stale_reviews: bool,
    pub require_code_owner_reviews: bool,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_path() {
        assert_eq!(
            OwnerKind::Organization.identity_path("fluidityproject"),
            "/orgs/fluidityproject"
        );
        assert_eq!(OwnerKind::User.identity_path("octocat"), "/users/octocat");
    }

    #[test]
    fn test_identity_repo_count() {
        let with_private: Identity = serde_json::from_value(json!({
            "login": "octocat",
            "public_repos": 8,
            "total_private_repos": 4
        }))
        .unwrap();
        assert_eq!(with_private.repo_count(), 12);

        let public_only: Identity = serde_json::from_value(json!({
            "login": "octocat",
            "public_repos": 8
        }))
        .unwrap();
        assert_eq!(public_only.repo_count(), 8);
    }

    #[test]
    fn test_repository_decode_keeps_extra_fields() {
        let repo: Repository = serde_json::from_value(json!({
            "id": 1296269,
            "name": "Hello-World",
            "archived": false,
            "html_url": "https://github.com/octocat/Hello-World",
            "full_name": "octocat/Hello-World",
            "fork": false
        }))
        .unwrap();

        assert_eq!(repo.name, "Hello-World");
        assert_eq!(repo.extra.get("fork"), Some(&json!(false)));
    }

    #[test]
    fn test_repository_decode_missing_required_field() {
        // No `archived` field: decoding must fail up front, not at first use.
        let result: serde_json::Result<Repository> = serde_json::from_value(json!({
            "id": 1,
            "name": "incomplete",
            "html_url": "https://github.com/octocat/incomplete"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_protection_serializes_absent_sections_as_null() {
        let protection = BranchProtection::default().require_pull_requests();
        let value = serde_json::to_value(&protection).unwrap();

        assert_eq!(value["required_status_checks"], Value::Null);
        assert_eq!(value["enforce_admins"], Value::Null);
        assert_eq!(value["restrictions"], Value::Null);
        assert_eq!(
            value["required_pull_request_reviews"]["dismiss_stale_reviews"],
            json!(true)
        );
        assert_eq!(
            value["required_pull_request_reviews"]["require_code_owner_reviews"],
            json!(false)
        );
    }

    #[test]
    fn test_protection_status_checks() {
        let protection =
            BranchProtection::default().require_status_checks(vec![TRAVIS_CONTEXT.to_string()]);
        let value = serde_json::to_value(&protection).unwrap();

        assert_eq!(value["required_status_checks"]["strict"], json!(true));
        assert_eq!(
            value["required_status_checks"]["contexts"],
            json!([TRAVIS_CONTEXT])
        );
        assert_eq!(value["required_pull_request_reviews"], Value::Null);
    }

    #[test]
    fn test_team_permission_as_str() {
        assert_eq!(TeamPermission::Pull.as_str(), "pull");
        assert_eq!(TeamPermission::Push.as_str(), "push");
        assert_eq!(TeamPermission::Admin.as_str(), "admin");
    }
}
