//! BekoSIRS command-line client.
//!
//! Drives the session flows from a terminal: sign in, biometric unlock,
//! registration and password reset against a BekoSIRS backend.

mod commands;
mod prompt;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::App;

#[derive(Parser)]
#[command(name = "bekosirs")]
#[command(about = "BekoSIRS client session tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with username and password
    Login {
        /// Username (defaults to the last one used)
        #[arg(long, short = 'u')]
        username: Option<String>,
    },
    /// Sign out. Biometric unlock stays set up.
    Logout,
    /// Create a customer account
    Register,
    /// Exchange the refresh token for a new access token
    Refresh,
    /// Show session and credential store state
    Status,
    /// Show the signed-in user's profile
    Profile,
    /// Password reset
    PasswordReset {
        #[command(subcommand)]
        cmd: PasswordResetCommands,
    },
    /// Biometric unlock
    Biometric {
        #[command(subcommand)]
        cmd: BiometricCommands,
    },
}

#[derive(Subcommand)]
enum PasswordResetCommands {
    /// Send a reset link to an email address
    Request {
        #[arg(long)]
        email: String,
    },
    /// Set a new password using the token from the reset email
    Confirm {
        #[arg(long)]
        token: String,
    },
}

#[derive(Subcommand)]
enum BiometricCommands {
    /// Report whether biometric unlock can be used here
    Check,
    /// Register this device for biometric unlock (requires a session)
    Enable,
    /// Remove the biometric registration
    Disable,
    /// Sign in with the biometric registration
    Unlock,
    /// Ask the backend whether biometric unlock is enabled for this account
    ServerStatus,
}

/// Initialize tracing: stderr filtered by `RUST_LOG` (default `warn`), plus
/// a daily log file at debug level.
fn init_tracing(debug: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = if debug {
        EnvFilter::new("bekosirs_core=debug,bekosirs_cli=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bekosirs")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "bekosirs.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("bekosirs_core=debug,bekosirs_cli=debug,warn")),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.debug);
    info!("BekoSIRS client starting");

    let mut app = App::open(cli.config)?;

    match cli.command {
        Commands::Login { username } => app.login(username).await,
        Commands::Logout => app.logout(),
        Commands::Register => app.register().await,
        Commands::Refresh => app.refresh().await,
        Commands::Status => app.status().await,
        Commands::Profile => app.profile().await,
        Commands::PasswordReset { cmd } => match cmd {
            PasswordResetCommands::Request { email } => app.request_password_reset(&email).await,
            PasswordResetCommands::Confirm { token } => app.confirm_password_reset(&token).await,
        },
        Commands::Biometric { cmd } => match cmd {
            BiometricCommands::Check => app.biometric_check().await,
            BiometricCommands::Enable => app.biometric_enable().await,
            BiometricCommands::Disable => app.biometric_disable().await,
            BiometricCommands::Unlock => app.biometric_unlock().await,
            BiometricCommands::ServerStatus => app.biometric_server_status().await,
        },
    }
}
