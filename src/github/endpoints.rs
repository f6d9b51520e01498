// GitHub API endpoint functions.
// Typed wrappers over the raw client for the operations the tool performs.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{BulkError, Result};

use super::client::GitHubClient;
use super::types::{BranchProtection, Identity, OwnerKind, Repository, Team, TeamPermission};

/// Decode a response body into a typed record, treating an absent body as
/// an error for endpoints that must return one.
fn decode<T: DeserializeOwned>(body: Option<Value>, endpoint: &str) -> Result<T> {
    match body {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Err(BulkError::Other(format!(
            "empty response from {}",
            endpoint
        ))),
    }
}

/// Decode a list response, treating an absent body as an empty list.
fn decode_list<T: DeserializeOwned>(body: Option<Value>) -> Result<Vec<T>> {
    match body {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Vec::new()),
    }
}

impl GitHubClient {
    /// Get organization or user info for an identity.
    pub async fn get_identity(&mut self, kind: OwnerKind, name: &str) -> Result<Identity> {
        let endpoint = kind.identity_path(name);
        let body = self.get(&endpoint).await?;
        decode(body, &endpoint)
    }

    /// Archive a repository. Archiving can only be undone by hand on GitHub.
    pub async fn archive_repo(&mut self, owner: &str, repo: &str) -> Result<Option<Repository>> {
        let endpoint = format!("/repos/{}/{}", owner, repo);
        let body = self
            .call(&endpoint, Method::PATCH, Some(&json!({"archived": true})))
            .await?;
        match body {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Replace the protection rules of a branch.
    pub async fn protect_branch(
        &mut self,
        owner: &str,
        repo: &str,
        branch: &str,
        protection: &BranchProtection,
    ) -> Result<()> {
        let endpoint = format!("/repos/{}/{}/branches/{}/protection", owner, repo, branch);
        let payload = serde_json::to_value(protection)?;
        self.call(&endpoint, Method::PUT, Some(&payload)).await?;
        Ok(())
    }

    /// List the teams of an identity.
    pub async fn list_teams(&mut self, kind: OwnerKind, name: &str) -> Result<Vec<Team>> {
        let endpoint = format!("{}/teams?per_page=100", kind.identity_path(name));
        let body = self.get(&endpoint).await?;
        decode_list(body)
    }

    /// List the repositories a team already has access to.
    pub async fn team_repos(&mut self, team_id: u64) -> Result<Vec<Repository>> {
        let endpoint = format!("/teams/{}/repos?per_page=200", team_id);
        let body = self.get(&endpoint).await?;
        decode_list(body)
    }

    /// Grant a team access to a repository with the given permission.
    pub async fn add_team_repo(
        &mut self,
        team_id: u64,
        owner: &str,
        repo: &str,
        permission: TeamPermission,
    ) -> Result<()> {
        let endpoint = format!("/teams/{}/repos/{}/{}", team_id, owner, repo);
        self.call(
            &endpoint,
            Method::PUT,
            Some(&json!({"permission": permission.as_str()})),
        )
        .await?;
        Ok(())
    }

    /// Remove a team's access to a repository.
    pub async fn remove_team_repo(&mut self, team_id: u64, owner: &str, repo: &str) -> Result<()> {
        let endpoint = format!("/teams/{}/repos/{}/{}", team_id, owner, repo);
        self.call(&endpoint, Method::DELETE, None).await?;
        Ok(())
    }
}
