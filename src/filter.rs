// Glob-style repository name filtering.
// Translates a shell-style pattern into an anchored regex over record names.

use regex::Regex;

use crate::error::Result;
use crate::github::Repository;

/// Convert a glob pattern to an anchored regular expression.
///
/// All regex metacharacters are escaped, then exactly four glob operators
/// are re-enabled: `*` (any run), `?` (any single character), `[`/`]`
/// (character classes) and `-` (ranges inside classes).
pub fn glob_to_regex(pattern: &str) -> String {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".")
        .replace(r"\[", "[")
        .replace(r"\]", "]")
        .replace(r"\-", "-");
    format!("^{}$", escaped)
}

/// Filter repositories whose name matches the glob pattern.
///
/// Archived repositories are excluded unless `include_archived` is set,
/// regardless of name match. Input order is preserved.
pub fn matching_repositories(
    repos: &[Repository],
    pattern: &str,
    include_archived: bool,
) -> Result<Vec<Repository>> {
    let regex = Regex::new(&glob_to_regex(pattern))?;
    Ok(repos
        .iter()
        .filter(|repo| regex.is_match(&repo.name))
        .filter(|repo| include_archived || !repo.archived)
        .cloned()
        .collect())
}
