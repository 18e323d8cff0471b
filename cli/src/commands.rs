pub mod init_config;
pub mod ports;
pub mod profiles;
pub mod run;
pub mod show;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gummy_common::config::Config;
use gummy_common::model::InspectionMode;

#[derive(Parser)]
#[command(name = "gummy")]
#[command(about = "Staged LAN reconnaissance with masscan and nmap.")]
#[command(version)]
pub struct CommandLine {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file
    #[arg(long, global = true, default_value = "gummy.toml")]
    pub config: PathBuf,
    /// Workspace name under the results directory
    #[arg(long, global = true)]
    pub workspace: Option<String>,
    /// Target range, e.g. 10.0.0.0/24, 10.0.0.1-50 or auto
    #[arg(long, global = true)]
    pub target: Option<String>,
    /// Addresses to exclude from sweeps
    #[arg(long, global = true)]
    pub exclude: Option<String>,
    /// Port list for manual scans, e.g. 22,80,8000-8100
    #[arg(long, global = true)]
    pub port: Option<String>,
    /// Number of masscan top ports for manual scans
    #[arg(long, global = true)]
    pub top_ports: Option<u32>,
    /// Masscan packet rate
    #[arg(long, global = true)]
    pub rate: Option<u32>,
    /// Nmap scan type: basic, arp or dns
    #[arg(long, global = true)]
    pub scan_type: Option<InspectionMode>,
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scan profile by id or name
    #[command(alias = "r")]
    Run { profile: String },
    /// List the scan profiles
    #[command(alias = "p")]
    Profiles,
    /// Show the inventory of a workspace
    #[command(alias = "s")]
    Show { view: View },
    /// Print the ports ranked start..=end for a protocol
    Ports {
        start: usize,
        end: usize,
        protocol: String,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Hosts,
    Ports,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl GlobalArgs {
    /// Command line values take precedence over the file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(target) = &self.target {
            config.masscan.target = target.clone();
        }
        if let Some(exclude) = &self.exclude {
            config.masscan.target_exclude = Some(exclude.clone());
        }
        if let Some(port) = &self.port {
            config.masscan.port = Some(port.clone());
        }
        if self.top_ports.is_some() {
            config.masscan.top_ports = self.top_ports;
        }
        if self.rate.is_some() {
            config.masscan.rate = self.rate;
        }
        if let Some(scan_type) = self.scan_type {
            config.nmap.scan_type = scan_type;
        }
        if self.verbose {
            config.logging.level = String::from("debug");
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(&self.config)?;
        self.apply(&mut config);
        Ok(config)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
