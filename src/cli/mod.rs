pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::acquirer::AcquisitionStrategy;
use crate::config::{Overrides, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "dinner-notifier", version)]
#[command(
    about = "Announces new dinner posts from an X account on Discord",
    long_about = None
)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Ledger of already-notified post ids
    #[arg(long, env = "NOTIFIED_PATH", global = true)]
    pub notified: Option<PathBuf>,

    /// Session cookie cache
    #[arg(long, env = "COOKIE_CACHE_PATH", global = true)]
    pub cookie_cache: Option<PathBuf>,

    /// How posts are fetched: "api" or "browser"
    #[arg(long, env = "ACQUISITION_STRATEGY", global = true)]
    pub strategy: Option<AcquisitionStrategy>,

    /// Outbound proxy, e.g. "http://host:port" or "host:port"
    #[arg(long, env = "PROXY_SERVER", global = true)]
    pub proxy: Option<String>,

    #[arg(long, env = "PROXY_USERNAME", global = true, hide_env_values = true)]
    pub proxy_username: Option<String>,

    #[arg(long, env = "PROXY_PASSWORD", global = true, hide_env_values = true)]
    pub proxy_password: Option<String>,

    /// Login name of the watching account
    #[arg(long, env = "TWITTER_USERNAME", global = true, hide_env_values = true)]
    pub username: Option<String>,

    #[arg(long, env = "TWITTER_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "DISCORD_TOKEN", global = true, hide_env_values = true)]
    pub discord_token: Option<String>,

    #[arg(long, env = "DISCORD_CHANNEL_ID", global = true)]
    pub discord_channel_id: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fetch, filter and notify once
    Run,
    /// Run a cycle every interval until interrupted
    Watch {
        /// Interval between cycles (e.g., "30s", "10m", "1h")
        #[arg(short, long, default_value = "10m")]
        interval: String,

        /// Wait one interval before the first cycle
        #[arg(long)]
        no_initial_run: bool,
    },
    /// Log in and refresh the session cache
    Login,
    /// Show the session cache and ledger state
    Status,
    /// Write a commented configuration template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            notified_path: self.notified.clone(),
            cookie_cache_path: self.cookie_cache.clone(),
            strategy: self.strategy,
            proxy_server: self.proxy.clone(),
            proxy_username: self.proxy_username.clone(),
            proxy_password: self.proxy_password.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            discord_token: self.discord_token.clone(),
            discord_channel_id: self.discord_channel_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::try_parse_from(["dinner-notifier"]).unwrap();
        assert_eq!(cli.command(), Commands::Run);
    }

    #[test]
    fn test_global_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "dinner-notifier",
            "watch",
            "--interval",
            "5m",
            "--strategy",
            "browser",
            "--notified",
            "/tmp/n.json",
        ])
        .unwrap();

        assert_eq!(
            cli.command(),
            Commands::Watch {
                interval: "5m".into(),
                no_initial_run: false
            }
        );
        let overrides = cli.overrides();
        assert_eq!(overrides.strategy, Some(AcquisitionStrategy::Browser));
        assert_eq!(overrides.notified_path, Some(PathBuf::from("/tmp/n.json")));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["dinner-notifier", "--strategy", "carrier-pigeon"]).is_err());
    }
}
