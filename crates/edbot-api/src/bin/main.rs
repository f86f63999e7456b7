//! ED Bot operations entry point
//!
//! Serves the health, metrics and flag administration API, and offers the
//! same operations from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand};
use edbot_api::{build_state, create_router, init_tracing, AppState, LogFormat};
use edbot_core::{ComponentType, HealthStatus, Settings};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "edbot-ops")]
#[command(about = "ED Bot operations - feature flags and health monitoring")]
#[command(version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "EDBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides settings)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to (overrides settings)
        #[arg(long)]
        host: Option<String>,
    },

    /// Run health checks once and print the result
    Check {
        /// Check a single component instead of all of them
        #[arg(long)]
        component: Option<ComponentType>,
    },

    /// Inspect and change runtime flag overrides
    Flags {
        #[command(subcommand)]
        command: FlagCommands,
    },
}

#[derive(Subcommand)]
enum FlagCommands {
    /// List every flag with its current value
    List,

    /// Show one flag
    Get { name: String },

    /// Set an override
    Set {
        name: String,

        #[arg(value_parser = clap::builder::BoolishValueParser::new(), action = clap::ArgAction::Set)]
        value: bool,

        /// Override lifetime in minutes (defaults to the configured TTL)
        #[arg(long, conflicts_with = "permanent")]
        ttl_minutes: Option<u32>,

        /// Store the override without expiry
        #[arg(long)]
        permanent: bool,
    },

    /// Remove one override
    Delete { name: String },

    /// Remove every override
    Clear,

    /// Report inconsistent flag combinations
    Validate,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    if matches!(cli.command, Commands::Flags { .. }) && settings.redis.is_in_process() {
        anyhow::bail!(
            "Flag commands need a shared override store; '{}' keeps overrides in this process only",
            settings.redis.url
        );
    }

    let state = build_state(&settings)
        .await
        .context("Failed to initialize components")?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

            tracing::info!(
                environment = %settings.environment,
                version = edbot_core::VERSION,
                "Starting ED Bot operations API on {}",
                addr
            );

            let router = create_router(Arc::new(state));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }

        Commands::Check { component } => {
            let unhealthy = match component {
                Some(component) => {
                    let check = state.monitor.guarded_check(component).await;
                    print_json(&check)?;
                    check.status == HealthStatus::Unhealthy
                }
                None => {
                    let health = state.monitor.perform_comprehensive_health_check().await;
                    print_json(&health)?;
                    health.is_unhealthy()
                }
            };

            if unhealthy {
                std::process::exit(1);
            }
        }

        Commands::Flags { command } => run_flag_command(&state, command).await?,
    }

    Ok(())
}

async fn run_flag_command(state: &AppState, command: FlagCommands) -> anyhow::Result<()> {
    let flags = &state.flags;

    match command {
        FlagCommands::List => print_json(&flags.get_all_flags().await)?,

        FlagCommands::Get { name } => {
            let resolution = flags.resolve_flag(&name).await;
            print_json(&resolution)?;
        }

        FlagCommands::Set {
            name,
            value,
            ttl_minutes,
            permanent,
        } => {
            let ttl = if permanent {
                None
            } else {
                Some(ttl_minutes.unwrap_or_else(|| flags.default_override_ttl_minutes()))
            };
            flags
                .try_set_flag(&name, value, ttl)
                .await
                .with_context(|| format!("Failed to set {}", name))?;
            print_json(&serde_json::json!({
                "name": name,
                "value": value,
                "ttl_minutes": ttl,
            }))?;
        }

        FlagCommands::Delete { name } => {
            let existed = flags
                .try_delete_flag(&name)
                .await
                .with_context(|| format!("Failed to delete {}", name))?;
            print_json(&serde_json::json!({ "name": name, "deleted": existed }))?;
        }

        FlagCommands::Clear => {
            let cleared = flags.try_clear_overrides().await?;
            print_json(&serde_json::json!({ "cleared": cleared }))?;
        }

        FlagCommands::Validate => {
            let warnings = flags.validate_flag_dependencies().await;
            print_json(&serde_json::json!({
                "valid": warnings.is_empty(),
                "warnings": warnings,
            }))?;
            if !warnings.is_empty() {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
