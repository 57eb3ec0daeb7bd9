//! Definitions of CLI arguments and commands for deploy scripts

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::Level;

use crate::{
    commands::{deploy, history},
    config::DeployConfig,
    constants::{CONFIG_PATH_ENV_VAR, DEFAULT_CONFIG_PATH},
    errors::DeployError,
};

/// Deploy contracts behind ERC1967 upgradeable proxies on any configured network
#[derive(Parser)]
#[command(name = "deploy", version)]
pub struct Cli {
    /// Path of the network configuration file
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV_VAR, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log more detail; repeat for more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The most detailed log level to emit
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// The deploy scripts' commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a contract behind a new upgradeable proxy
    Deploy(DeployArgs),
    /// Print the deployment journal
    History(HistoryArgs),
}

impl Command {
    /// Run the command against the configuration at `config_path`
    pub async fn run(self, config_path: &Path) -> Result<(), DeployError> {
        let config = DeployConfig::load(config_path)?;
        match self {
            Command::Deploy(args) => deploy(args, &config).await,
            Command::History(args) => history(args, &config),
        }
    }
}

/// Deploy a contract behind a new upgradeable proxy.
///
/// The implementation is deployed first, then an `ERC1967Proxy` whose
/// constructor calls the implementation's initializer with the given
/// arguments. The proxy address is printed on success.
#[derive(Args)]
pub struct DeployArgs {
    /// The network to deploy to, as named in the configuration file
    pub network: String,

    /// Arguments to the initializer, in declaration order
    #[arg(allow_hyphen_values = true)]
    pub init_args: Vec<String>,

    /// The contract to deploy, overriding `deploy.contract`
    #[arg(long)]
    pub contract: Option<String>,

    /// The compiler output directory
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// The deployment journal
    #[arg(long)]
    pub deployments: Option<PathBuf>,

    /// Seconds to wait for each transaction to confirm
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Confirmations to wait for on each transaction
    #[arg(long)]
    pub confirmations: Option<u64>,

    /// The initializer to call through the proxy
    #[arg(long)]
    pub initializer: Option<String>,

    /// Deploy even if the journal shows an existing or interrupted deployment
    #[arg(long)]
    pub force: bool,

    /// Finish an interrupted deployment, reusing its implementation
    #[arg(long, conflicts_with = "force")]
    pub resume: bool,
}

/// Print the deployment journal
#[derive(Args)]
pub struct HistoryArgs {
    /// Only show deployments to this network
    pub network: Option<String>,

    /// The deployment journal
    #[arg(long)]
    pub deployments: Option<PathBuf>,
}
