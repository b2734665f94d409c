//! authsession - sign in to an auth service and use the persisted session
//! from the command line.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authsession_core::{
    ApiRequest, AuthApi, Config, ProfileCache, SessionManager, SessionPhase, SignInRequest,
    SignUpRequest, UpdatePasswordRequest,
};

/// Environment variable read instead of prompting for a password
const ENV_PASSWORD: &str = "AUTHSESSION_PASSWORD";

/// Log file name prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "authsession.log";

#[derive(Parser)]
#[command(name = "authsession", version, about = "Sign in and use a persisted bearer session")]
struct Cli {
    /// Auth service base URL (overrides config and AUTHSESSION_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email (or username) and password
    Signin {
        #[arg(long)]
        email: Option<String>,
        #[arg(long, conflicts_with = "email")]
        username: Option<String>,
    },
    /// Create an account and sign in to it
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
    /// Forget the stored credential
    Logout,
    /// Show the session state
    Status,
    /// Print the signed-in user's profile
    Me,
    /// Change the password
    Password,
    /// Authenticated GET of an endpoint path, printing the response
    Get { path: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let loaded = Config::load();
    let log_dir = loaded.as_ref().ok().and_then(|c| c.log_dir.clone());
    let _guard = init_tracing(log_dir.as_deref());

    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    config.apply_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    info!(base_url = %config.base_url, storage = ?config.storage, "authsession starting");

    let session = Arc::new(config.build_session()?);
    session.restore().await;

    match cli.command {
        Command::Signin { email, username } => signin(&session, &mut config, email, username).await,
        Command::Signup { username, email } => signup(&session, &mut config, username, email).await,
        Command::Logout => {
            session.logout();
            println!("Signed out");
            Ok(())
        }
        Command::Status => {
            status(&session, &config);
            Ok(())
        }
        Command::Me => me(&session).await,
        Command::Password => password(&session).await,
        Command::Get { path } => get(&session, &path).await,
    }
}

fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    rpassword::prompt_password(prompt).context("Failed to read password")
}

async fn signin(
    session: &Arc<SessionManager>,
    config: &mut Config,
    email: Option<String>,
    username: Option<String>,
) -> Result<()> {
    let password = read_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password required");
    }

    let request = match (email, username) {
        (_, Some(username)) => SignInRequest::with_username(username, password),
        (Some(email), None) => SignInRequest::with_email(email, password),
        (None, None) => match config.last_email.clone() {
            Some(email) => SignInRequest::with_email(email, password),
            None => anyhow::bail!("Pass --email or --username"),
        },
    };

    AuthApi::new(session.clone()).sign_in(&request).await?;

    if !request.email.is_empty() && config.last_email.as_deref() != Some(request.email.as_str()) {
        config.last_email = Some(request.email.clone());
        if let Err(e) = config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    println!("Signed in");
    Ok(())
}

async fn signup(
    session: &Arc<SessionManager>,
    config: &mut Config,
    username: String,
    email: String,
) -> Result<()> {
    let password = read_password("Password: ")?;
    if std::env::var(ENV_PASSWORD).is_err() {
        let confirm = read_password("Confirm password: ")?;
        if confirm != password {
            anyhow::bail!("Passwords do not match");
        }
    }

    let request = SignUpRequest {
        username,
        email,
        password,
    };
    AuthApi::new(session.clone()).sign_up_and_sign_in(&request).await?;

    config.last_email = Some(request.email.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    println!("Account created, signed in as {}", request.email);
    Ok(())
}

fn status(session: &SessionManager, config: &Config) {
    let phase = match session.phase() {
        SessionPhase::Uninitialized => "uninitialized",
        SessionPhase::Restoring => "restoring",
        SessionPhase::Unauthenticated => "signed out",
        SessionPhase::Authenticated => "signed in",
    };
    println!("Service:  {}", config.base_url);
    println!("Storage:  {:?}", config.storage);
    println!("Session:  {}", phase);

    if let Some(expiry) = session.credential().and_then(|c| c.expires_at()) {
        let remaining = expiry - chrono::Utc::now();
        if remaining.num_seconds() >= 0 {
            println!(
                "Expires:  {} ({}m left)",
                expiry.to_rfc3339(),
                remaining.num_minutes()
            );
        } else {
            println!("Expired:  {}", expiry.to_rfc3339());
        }
    }
}

async fn me(session: &Arc<SessionManager>) -> Result<()> {
    let profiles = ProfileCache::new(session.clone());
    if let Some(fetch) = profiles.sync() {
        fetch.await.context("Profile fetch task failed")?;
    }

    if !session.is_authenticated() {
        anyhow::bail!("Not signed in");
    }
    match profiles.profile() {
        Some(profile) => {
            eprintln!("Signed in as {}", profile.display_name());
            println!("{}", serde_json::to_string_pretty(&profile)?);
            Ok(())
        }
        None => anyhow::bail!("Profile unavailable"),
    }
}

async fn password(session: &Arc<SessionManager>) -> Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!("Not signed in");
    }
    let old_password = rpassword::prompt_password("Current password: ")?;
    let new_password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Confirm new password: ")?;
    if new_password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    AuthApi::new(session.clone())
        .update_password(&UpdatePasswordRequest {
            old_password,
            new_password,
        })
        .await?;
    println!("Password updated");
    Ok(())
}

async fn get(session: &SessionManager, path: &str) -> Result<()> {
    let request = ApiRequest::get(session.endpoint(path)?);
    let response = session.fetch_with_auth(&request).await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    println!("{}", status);
    if !body.is_empty() {
        println!("{}", body);
    }
    Ok(())
}
