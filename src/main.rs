// gh-bulk command-line interface.
// Thin front-end over the library: argument parsing, confirmation prompts,
// progress rendering, and result printing.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::Mutex;

use gh_bulk::error::{BulkError, Result};
use gh_bulk::fetch::{FetchEvent, Pager};
use gh_bulk::filter::matching_repositories;
use gh_bulk::github::{
    BranchProtection, GitHubClient, OwnerKind, Repository, TRAVIS_CONTEXT, Team, TeamPermission,
};
use gh_bulk::{Settings, settings_path};

#[derive(Parser)]
#[command(name = "gh-bulk")]
#[command(version)]
#[command(about = "Bulk-manage GitHub repositories and teams")]
struct Cli {
    /// Access token (overrides GITHUB_TOKEN and the settings file)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Identity and pattern shared by the repository commands.
#[derive(Args)]
struct Target {
    /// Organization or user name (defaults to the configured identity)
    identity: Option<String>,

    /// Treat the identity as a user account instead of an organization
    #[arg(long)]
    user: bool,

    /// Repository name pattern, glob style (defaults to the configured pattern)
    #[arg(short, long)]
    pattern: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List repositories matching the pattern
    Search {
        #[command(flatten)]
        target: Target,
        /// Include archived repositories
        #[arg(long)]
        archived: bool,
    },
    /// Archive matching repositories (cannot be undone from here)
    Archive {
        #[command(flatten)]
        target: Target,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Replace branch protection rules on matching repositories
    Protect {
        #[command(flatten)]
        target: Target,
        /// Branch to protect
        #[arg(long, default_value = "master")]
        branch: String,
        /// Require pull-request review before merging
        #[arg(long)]
        require_reviews: bool,
        /// Require status checks to pass before merging
        #[arg(long)]
        require_checks: bool,
        /// Status check contexts to require (with --require-checks)
        #[arg(long, default_value = TRAVIS_CONTEXT)]
        contexts: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List the teams of an identity
    Teams {
        #[command(flatten)]
        target: Target,
    },
    /// Add a team to matching repositories
    TeamAdd {
        #[command(flatten)]
        target: Target,
        /// Team name
        #[arg(long)]
        team: String,
        /// Permission to grant
        #[arg(long, value_enum, default_value = "pull")]
        permission: PermissionArg,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Remove a team from matching repositories
    TeamRemove {
        #[command(flatten)]
        target: Target,
        /// Team name
        #[arg(long)]
        team: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or update the settings file
    Config {
        /// Update a setting, e.g. --set identity=fluidityproject
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PermissionArg {
    Pull,
    Push,
    Admin,
}

impl From<PermissionArg> for TeamPermission {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Pull => TeamPermission::Pull,
            PermissionArg::Push => TeamPermission::Push,
            PermissionArg::Admin => TeamPermission::Admin,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let path = config_path()?;
    let settings = Settings::load(&path)?;

    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .or_else(|| settings.token.clone());
    let api = Arc::new(Mutex::new(GitHubClient::new(token)?));

    match cli.command {
        Commands::Search { target, archived } => {
            let (kind, name, pattern) = resolve_target(&target, &settings)?;
            let repos = fetch_repositories(&api, kind, &name).await?;
            let matched = sorted(matching_repositories(&repos, &pattern, archived)?);

            println!("{} repositories found.", matched.len());
            for repo in &matched {
                let marker = if repo.archived { " (archived)" } else { "" };
                println!("  {}{}  {}", repo.name, marker, repo.html_url);
            }
        }

        Commands::Archive { target, yes } => {
            let (kind, name, pattern) = resolve_target(&target, &settings)?;
            let repos = fetch_repositories(&api, kind, &name).await?;
            let matched = sorted(matching_repositories(&repos, &pattern, false)?);

            if matched.is_empty() {
                println!("No repositories match.");
                return Ok(());
            }
            print_names(&matched);
            let prompt = format!(
                "Archive {} repositories? This can only be undone by hand.",
                matched.len()
            );
            if !confirm(&prompt, yes)? {
                return Ok(());
            }
            for repo in &matched {
                match api.lock().await.archive_repo(&name, &repo.name).await {
                    Ok(_) => println!("  archived {}", repo.name),
                    Err(error) => eprintln!("  {}: {}", repo.name, error),
                }
            }
        }

        Commands::Protect {
            target,
            branch,
            require_reviews,
            require_checks,
            contexts,
            yes,
        } => {
            let (kind, name, pattern) = resolve_target(&target, &settings)?;
            let repos = fetch_repositories(&api, kind, &name).await?;
            let matched = sorted(matching_repositories(&repos, &pattern, true)?);

            if matched.is_empty() {
                println!("No repositories match.");
                return Ok(());
            }

            let mut protection = BranchProtection::default();
            if require_reviews {
                protection = protection.require_pull_requests();
            }
            if require_checks {
                protection = protection.require_status_checks(contexts);
            }

            print_names(&matched);
            let prompt = format!(
                "Replace protection of branch '{}' on {} repositories?",
                branch,
                matched.len()
            );
            if !confirm(&prompt, yes)? {
                return Ok(());
            }
            for repo in &matched {
                match api
                    .lock()
                    .await
                    .protect_branch(&name, &repo.name, &branch, &protection)
                    .await
                {
                    Ok(()) => println!("  protected {}", repo.name),
                    Err(error) => eprintln!("  {}: {}", repo.name, error),
                }
            }
        }

        Commands::Teams { target } => {
            let (kind, name, _) = resolve_target(&target, &settings)?;
            let mut teams = api.lock().await.list_teams(kind, &name).await?;
            teams.sort_by(|a, b| a.name.cmp(&b.name));
            for team in &teams {
                println!(
                    "  {} (id {})  {}",
                    team.name,
                    team.id,
                    team.html_url.as_deref().unwrap_or("")
                );
            }
        }

        Commands::TeamAdd {
            target,
            team,
            permission,
            yes,
        } => {
            let (kind, name, pattern) = resolve_target(&target, &settings)?;
            let team = find_team(&api, kind, &name, &team).await?;
            let existing = api.lock().await.team_repos(team.id).await?;

            let repos = fetch_repositories(&api, kind, &name).await?;
            let matched = sorted(matching_repositories(&repos, &pattern, false)?);
            let missing: Vec<Repository> = matched
                .into_iter()
                .filter(|repo| !existing.iter().any(|r| r.id == repo.id))
                .collect();

            if missing.is_empty() {
                println!("Team '{}' already covers every matching repository.", team.name);
                return Ok(());
            }
            print_names(&missing);
            let prompt = format!(
                "Add team '{}' to {} repositories?",
                team.name,
                missing.len()
            );
            if !confirm(&prompt, yes)? {
                return Ok(());
            }
            for repo in &missing {
                match api
                    .lock()
                    .await
                    .add_team_repo(team.id, &name, &repo.name, permission.into())
                    .await
                {
                    Ok(()) => println!("  added to {}", repo.name),
                    Err(error) => eprintln!("  {}: {}", repo.name, error),
                }
            }
        }

        Commands::TeamRemove { target, team, yes } => {
            let (kind, name, pattern) = resolve_target(&target, &settings)?;
            let team = find_team(&api, kind, &name, &team).await?;
            let existing = api.lock().await.team_repos(team.id).await?;

            let repos = fetch_repositories(&api, kind, &name).await?;
            let matched = sorted(matching_repositories(&repos, &pattern, false)?);
            let covered: Vec<Repository> = matched
                .into_iter()
                .filter(|repo| existing.iter().any(|r| r.id == repo.id))
                .collect();

            if covered.is_empty() {
                println!("Team '{}' has none of the matching repositories.", team.name);
                return Ok(());
            }
            print_names(&covered);
            let prompt = format!(
                "Remove team '{}' from {} repositories?",
                team.name,
                covered.len()
            );
            if !confirm(&prompt, yes)? {
                return Ok(());
            }
            for repo in &covered {
                match api
                    .lock()
                    .await
                    .remove_team_repo(team.id, &name, &repo.name)
                    .await
                {
                    Ok(()) => println!("  removed from {}", repo.name),
                    Err(error) => eprintln!("  {}: {}", repo.name, error),
                }
            }
        }

        Commands::Config { set } => {
            let mut settings = settings;
            if set.is_empty() {
                show_settings(&settings, &path);
                return Ok(());
            }
            for pair in &set {
                apply_setting(&mut settings, pair)?;
            }
            settings.save(&path)?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

fn config_path() -> Result<PathBuf> {
    settings_path().ok_or_else(|| BulkError::Other("cannot determine config directory".to_string()))
}

/// Combine CLI arguments with configured defaults.
fn resolve_target(target: &Target, settings: &Settings) -> Result<(OwnerKind, String, String)> {
    let kind = if target.user {
        OwnerKind::User
    } else if target.identity.is_some() {
        OwnerKind::Organization
    } else {
        settings.owner_kind
    };
    let name = target
        .identity
        .clone()
        .unwrap_or_else(|| settings.identity.clone());
    if name.is_empty() {
        return Err(BulkError::Other(
            "no GitHub identity given; pass one or set a default with `config`".to_string(),
        ));
    }
    let pattern = target
        .pattern
        .clone()
        .unwrap_or_else(|| settings.pattern.clone());
    Ok((kind, name, pattern))
}

/// Enumerate all repositories of an identity with a progress line on stderr.
/// Ctrl-C cancels the fetch cooperatively and keeps the partial prefix.
async fn fetch_repositories(
    api: &Arc<Mutex<GitHubClient>>,
    kind: OwnerKind,
    name: &str,
) -> Result<Vec<Repository>> {
    let identity = api.lock().await.get_identity(kind, name).await?;
    let total = identity.repo_count() as usize;
    eprintln!("Checking {} repositories", total);

    let data = Arc::new(Mutex::new(Vec::new()));
    let pager = Pager::new(
        Arc::clone(api),
        format!("{}/repos", kind.identity_path(name)),
        Arc::clone(&data),
        total,
    );
    let (handle, mut events, cancel) = pager.spawn();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(FetchEvent::Progress(count)) => {
                    eprint!("\r  {}/{}", count, total);
                    io::stderr().flush()?;
                }
                Some(FetchEvent::Finished(result)) => {
                    eprintln!();
                    result?;
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\ncancelling after current page...");
                cancel.cancel();
            }
        }
    }
    handle
        .await
        .map_err(|e| BulkError::Other(e.to_string()))?;

    let repos = data.lock().await.clone();
    Ok(repos)
}

async fn find_team(
    api: &Arc<Mutex<GitHubClient>>,
    kind: OwnerKind,
    name: &str,
    team_name: &str,
) -> Result<Team> {
    let teams = api.lock().await.list_teams(kind, name).await?;
    teams
        .into_iter()
        .find(|team| team.name == team_name)
        .ok_or_else(|| BulkError::Other(format!("no team named '{}'", team_name)))
}

fn sorted(mut repos: Vec<Repository>) -> Vec<Repository> {
    repos.sort_by(|a, b| a.name.cmp(&b.name));
    repos
}

fn print_names(repos: &[Repository]) {
    for repo in repos {
        println!("  {}  {}", repo.name, repo.html_url);
    }
}

fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    eprint!("{} [y/N] ", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn show_settings(settings: &Settings, path: &PathBuf) {
    println!("Settings file: {}", path.display());
    let token = match &settings.token {
        Some(_) => "(set)",
        None => "(not set)",
    };
    println!("  token: {}", token);
    println!("  owner-kind: {:?}", settings.owner_kind);
    println!("  identity: {}", settings.identity);
    println!("  pattern: {}", settings.pattern);
}

fn apply_setting(settings: &mut Settings, pair: &str) -> Result<()> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| BulkError::Other(format!("expected KEY=VALUE, got '{}'", pair)))?;
    match key {
        "token" => settings.token = Some(value.to_string()),
        "identity" => settings.identity = value.to_string(),
        "pattern" => settings.pattern = value.to_string(),
        "owner-kind" => {
            settings.owner_kind = match value.to_ascii_lowercase().as_str() {
                "organization" | "org" => OwnerKind::Organization,
                "user" => OwnerKind::User,
                other => {
                    return Err(BulkError::Other(format!(
                        "unknown owner kind '{}'; use organization or user",
                        other
                    )));
                }
            }
        }
        other => return Err(BulkError::Other(format!("unknown setting '{}'", other))),
    }
    Ok(())
}
