// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use lima_config::LimaOptions;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "lima-hv")]
#[command(about = "Provision and tear down Lima VMs as SSH-reachable test hosts")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Hosts file with `options` and `hosts` sections
    #[arg(short = 'f', long, global = true, default_value = "hosts.yaml")]
    pub hosts: PathBuf,

    /// limactl binary to use (overrides the hosts file)
    #[arg(long, global = true)]
    pub limactl: Option<String>,

    /// Seconds allowed for `limactl start` (overrides the hosts file)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Forward the local ssh-agent into the VMs
    #[arg(long, global = true)]
    pub forward_ssh_agent: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start or create every host's VM and print the rewired host records
    Provision,
    /// Stop and delete every host's VM
    Cleanup,
    /// Print the status of a VM (empty when it does not exist)
    Status {
        /// VM name
        name: String,
    },
    /// List VMs as JSON, all of them when no names are given
    List {
        /// VM names
        names: Vec<String>,
    },
    /// Print `limactl info`
    Info,
    /// Print the SSH connection descriptor of a VM
    SshInfo {
        /// VM name
        name: String,
    },
}

impl Args {
    /// Command-line flags layered over the options from the hosts file.
    pub fn apply_overrides(&self, mut options: LimaOptions) -> LimaOptions {
        if let Some(limactl) = &self.limactl {
            options.limactl = limactl.clone();
        }
        if let Some(timeout) = self.timeout {
            options.timeout = timeout;
        }
        if self.forward_ssh_agent {
            options.forward_ssh_agent = true;
        }
        options
    }
}
