//! Host provisioning on Lima VMs.
//!
//! [`LimaHypervisor`] exposes the three entry points a test framework calls:
//! `provision`, `cleanup` and `connection_preference`. Hosts are anything that
//! implements [`Host`]; [`SshHost`] is the implementation used by the CLI.

pub mod bootstrap;
pub mod host;
pub mod hypervisor;
pub mod ssh_host;

pub use host::{ConnectionMethod, Host};
pub use hypervisor::{LimaHypervisor, LOOPBACK};
pub use lima_config::SshOptions;
pub use ssh_host::SshHost;
