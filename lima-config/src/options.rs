//! Options recognised by the Lima hypervisor.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LIMACTL: &str = "limactl";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Settings shared by every host in a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimaOptions {
    /// Name or path of the `limactl` binary
    #[serde(default = "default_limactl")]
    pub limactl: String,

    /// Seconds `limactl start` may take, for both new and existing VMs
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Forward the local ssh-agent to the VMs instead of pinning identity files
    #[serde(default)]
    pub forward_ssh_agent: bool,

    /// Run `limactl validate` on inline configurations before creating a VM
    #[serde(default = "default_true")]
    pub validate_config: bool,
}

fn default_limactl() -> String {
    DEFAULT_LIMACTL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Default for LimaOptions {
    fn default() -> Self {
        Self {
            limactl: default_limactl(),
            timeout: default_timeout(),
            forward_ssh_agent: false,
            validate_config: true,
        }
    }
}

impl LimaOptions {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Check if options are at defaults
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
