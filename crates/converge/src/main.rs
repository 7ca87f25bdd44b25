mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use converge_cloud::{CloudError, Failure, FailureDetail};
use converge_cloud_hetzner::HetznerError;
use converge_config::ConfigError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Declarative firewall reconciliation for Hetzner Cloud", long_about = None)]
struct Cli {
    /// Hetzner Cloud API token
    #[arg(long, global = true, env = "HCLOUD_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Hetzner Cloud API endpoint
    #[arg(long, global = true, env = "HCLOUD_ENDPOINT")]
    api_endpoint: Option<String>,

    /// Config file (default: ~/.config/converge/config.yaml)
    #[arg(long, global = true, env = "CONVERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Report what would change without changing anything
    #[arg(long, global = true)]
    check: bool,

    /// Seconds to wait for provider actions
    #[arg(long, global = true, default_value = "600")]
    wait_timeout: u64,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage firewalls
    Firewall {
        #[command(subcommand)]
        command: FirewallCommands,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum FirewallCommands {
    /// Converge a firewall to the state described in a manifest
    Apply {
        /// YAML or JSON manifest
        manifest: PathBuf,
    },
    /// Delete a firewall if it exists
    Delete {
        /// Firewall ID
        #[arg(long, required_unless_present = "name")]
        id: Option<u64>,
        /// Firewall name
        #[arg(long)]
        name: Option<String>,
    },
    /// Show a firewall by name or ID
    Show {
        /// Firewall name or numeric ID
        firewall: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

/// Failure for errors raised outside the reconciler
fn failure_for(error: &anyhow::Error) -> Failure {
    if let Some(cloud) = error.downcast_ref::<CloudError>() {
        return cloud.failure();
    }

    let exception = if error.downcast_ref::<ConfigError>().is_some() {
        "ConfigError"
    } else if error.downcast_ref::<HetznerError>().is_some() {
        "ClientError"
    } else {
        "Error"
    };

    Failure {
        failed: true,
        msg: format!("{:#}", error),
        exception: exception.to_string(),
        failure: FailureDetail::default(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let options = commands::Options {
        api_token: cli.api_token,
        api_endpoint: cli.api_endpoint,
        config: cli.config,
        check: cli.check,
        wait_timeout: cli.wait_timeout,
    };

    match cli.command {
        Commands::Firewall { command } => match command {
            FirewallCommands::Apply { manifest } => {
                commands::firewall::apply(&options, &manifest).await
            }
            FirewallCommands::Delete { id, name } => {
                commands::firewall::delete(&options, id, name).await
            }
            FirewallCommands::Show { firewall } => {
                commands::firewall::show(&options, &firewall).await
            }
        },
        Commands::Version => Ok(serde_json::json!({
            "name": "converge",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let failure = failure_for(&e);
            println!("{}", serde_json::to_string_pretty(&failure).unwrap_or_default());
            eprintln!("{} {}", "✗".red().bold(), failure.msg);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "converge",
            "firewall",
            "delete",
            "--name",
            "web",
            "--check",
            "--wait-timeout",
            "30",
        ])
        .unwrap();

        assert!(cli.check);
        assert_eq!(cli.wait_timeout, 30);
        assert!(matches!(
            cli.command,
            Commands::Firewall {
                command: FirewallCommands::Delete { id: None, name: Some(ref n) }
            } if n == "web"
        ));
    }

    #[test]
    fn test_delete_requires_reference() {
        assert!(Cli::try_parse_from(["converge", "firewall", "delete"]).is_err());
    }

    #[test]
    fn test_failure_for_error_kinds() {
        let error = anyhow::Error::new(ConfigError::MissingToken);
        let failure = failure_for(&error);
        assert!(failure.failed);
        assert_eq!(failure.exception, "ConfigError");

        let error = anyhow::Error::new(CloudError::missing(&["id", "name"]));
        assert_eq!(failure_for(&error).exception, "ValidationError");
    }

    #[test]
    fn test_failure_for_client_error_keeps_context() {
        let error = anyhow::Error::new(HetznerError::InvalidEndpoint("api.test".to_string()))
            .context("Failed to create API client");
        let failure = failure_for(&error);
        assert_eq!(failure.exception, "ClientError");
        assert!(failure.msg.starts_with("Failed to create API client: "));
        assert!(failure.msg.contains("api.test"));
    }

    #[test]
    fn test_failure_for_other_error_is_generic() {
        let error = anyhow::anyhow!("unexpected output");
        let failure = failure_for(&error);
        assert_eq!(failure.exception, "Error");
        assert_eq!(failure.msg, "unexpected output");
    }
}
