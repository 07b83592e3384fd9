//! tutorflow CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP gateway
//! - `chat`     — Run one message through the pipeline
//! - `classify` — Show which tool a message routes to
//! - `tools`    — List the tool registry
//! - `init`     — Write a default config file
//! - `doctor`   — Diagnose configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tutorflow",
    about = "tutorflow — routes student messages to educational tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.tutorflow/config.toml)
    #[arg(short, long, global = true, env = "TUTORFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single message through the pipeline and print the reply
    Chat {
        #[arg(short, long, default_value = "student123")]
        user: String,

        #[arg(short, long, default_value = "cli")]
        session: String,

        message: String,
    },

    /// Show which tool a message would be routed to
    Classify {
        /// Consult the configured model before the keyword rules
        #[arg(long)]
        model: bool,

        message: String,
    },

    /// List registered tools
    Tools,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration and registry problems
    Doctor,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat {
            user,
            session,
            message,
        } => commands::chat::run(config_path, user, session, message).await?,
        Commands::Classify { model, message } => {
            commands::classify::run(config_path, &message, model).await?
        }
        Commands::Tools => commands::tools::run(config_path)?,
        Commands::Init { force } => commands::init::run(config_path, force)?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_with_defaults() {
        let cli = Cli::try_parse_from(["tutorflow", "chat", "quiz me on algebra"]).unwrap();
        match cli.command {
            Commands::Chat {
                user,
                session,
                message,
            } => {
                assert_eq!(user, "student123");
                assert_eq!(session, "cli");
                assert_eq!(message, "quiz me on algebra");
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tutorflow",
            "serve",
            "--port",
            "9100",
            "-v",
            "--config",
            "/tmp/tf.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tf.toml")));
        assert!(matches!(cli.command, Commands::Serve { port: Some(9100) }));
    }

    #[test]
    fn classify_requires_message() {
        assert!(Cli::try_parse_from(["tutorflow", "classify"]).is_err());
    }
}
