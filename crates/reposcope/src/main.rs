use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use reposcope_core::auth::{
    check_access, run_login, AuthError, AuthFlowController, GuardDecision, MemoryEphemeralStore,
    SessionClient, SessionStatus,
};
use reposcope_core::config::AppConfig;
use reposcope_core::repos::{filter_repos, RepoSummary, ReposClient};
use textwrap::wrap;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "GitHub repository explorer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in to GitHub via the session backend
    Login(LoginArgs),
    /// Invalidate the server-side session
    Logout,
    /// Show the current session status
    Status(StatusArgs),
    /// List your repositories (signs you in first when needed)
    Repos(ReposArgs),
}

#[derive(Args, Debug)]
struct LoginArgs {
    /// Print the authorization URL instead of launching a browser
    #[arg(long = "no-browser")]
    no_browser: bool,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Output raw JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ReposArgs {
    /// Keep only repositories whose full name contains the term
    #[arg(long)]
    contains: Option<String>,
    /// Print the authorization URL instead of launching a browser
    #[arg(long = "no-browser")]
    no_browser: bool,
    /// Output raw JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Login(args) => login(args).await?,
        Commands::Logout => logout().await?,
        Commands::Status(args) => status(args).await?,
        Commands::Repos(args) => repos(args).await?,
    }
    Ok(())
}

fn build_session() -> Result<(AppConfig, SessionClient)> {
    let config = AppConfig::from_env().context("incomplete REPOSCOPE_* configuration")?;
    let session =
        SessionClient::new(config.api_base.clone()).context("failed to build session client")?;
    Ok((config, session))
}

async fn sign_in(
    session: SessionClient,
    config: AppConfig,
    open_browser: bool,
) -> Result<(SessionClient, SessionStatus)> {
    let mut controller = AuthFlowController::new(MemoryEphemeralStore::default(), session, config);

    let status = match run_login(&mut controller, open_browser, print_authorization_url).await {
        Ok(status) => status,
        Err(AuthError::BrowserLaunch(reason)) => {
            eprintln!("Failed to launch browser ({reason}); open the URL printed above manually.");
            run_login(&mut controller, false, print_authorization_url).await?
        }
        Err(other) => return Err(other).context("login failed; start a new login to retry"),
    };

    Ok((controller.session().clone(), status))
}

fn print_authorization_url(url: &Url) -> Result<(), AuthError> {
    println!("\nAuthorize the application by visiting:\n  {}\n", url);
    Ok(())
}

async fn login(args: LoginArgs) -> Result<()> {
    let (config, session) = build_session()?;
    let (_, status) = sign_in(session, config, !args.no_browser).await?;

    println!("Login succeeded.");
    if let Some(identity) = status.display_identity() {
        println!("Signed in as {identity}");
    }
    Ok(())
}

async fn logout() -> Result<()> {
    let (_, session) = build_session()?;
    session.logout().await;
    println!("Signed out.");
    Ok(())
}

async fn status(args: StatusArgs) -> Result<()> {
    let (_, session) = build_session()?;
    let status = session.status().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if status.authenticated {
        println!(
            "Authenticated as {}",
            status.display_identity().unwrap_or("<unknown>")
        );
    } else {
        println!("Not authenticated. Run `reposcope login`.");
    }
    Ok(())
}

async fn repos(args: ReposArgs) -> Result<()> {
    let (config, session) = build_session()?;

    // Guard first; a denied check routes through the login flow before the
    // protected view is entered.
    let session = match check_access(&session).await {
        GuardDecision::Allow(_) => session,
        GuardDecision::Redirect(_) => {
            eprintln!("Not signed in; starting login.");
            let (session, _) = sign_in(session, config, !args.no_browser).await?;
            session
        }
    };

    let client = ReposClient::from_session(&session)?;
    let repos = client
        .list()
        .await
        .context("unable to load repositories; try again")?;

    let term = args.contains.as_deref().unwrap_or("");
    let filtered = filter_repos(&repos, term);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&filtered)?);
        return Ok(());
    }

    if filtered.is_empty() {
        if term.trim().is_empty() {
            println!("No repositories found.");
        } else {
            println!("No repositories match '{}'.", term.trim());
        }
        return Ok(());
    }

    render_repo_list(&filtered);
    Ok(())
}

fn render_repo_list(repos: &[&RepoSummary]) {
    println!("{:<40} {:<14} {:>7}", "REPOSITORY", "LANGUAGE", "STARS");
    println!("{}", "-".repeat(63));
    for repo in repos {
        println!(
            "{:<40} {:<14} {:>7}",
            truncate(&repo.full_name, 40),
            truncate(repo.language.as_deref().unwrap_or("-"), 14),
            repo.stargazers_count
        );
        if let Some(description) = repo.description.as_deref() {
            let trimmed = description.trim();
            if !trimmed.is_empty() {
                for line in wrap(trimmed, 76) {
                    println!("    {line}");
                }
            }
        }
    }
}

fn truncate(value: &str, max_len: usize) -> String {
    let mut chars = value.chars();
    let mut collected = String::new();
    for _ in 0..max_len.saturating_sub(1) {
        match chars.next() {
            Some(ch) => collected.push(ch),
            None => return value.to_owned(),
        }
    }
    if chars.next().is_some() {
        collected.push('…');
        collected
    } else {
        value.to_owned()
    }
}
