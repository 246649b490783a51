//! Hosts file model: the per-host records a test run hands to the hypervisor.
//!
//! ```yaml
//! options:
//!   timeout: 900
//! hosts:
//!   - name: ubuntu
//!     lima:
//!       url: template://ubuntu-lts
//!   - name: custom
//!     lima:
//!       config:
//!         images: []
//! ```

use std::path::Path;

use lima_core::error::{LimaError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::options::LimaOptions;
use crate::spec::CreationSpec;

pub const DEFAULT_HOST_USER: &str = "root";

/// SSH client options of a host, named after the generic client's option names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_agent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_agent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_methods: Option<Vec<String>>,
}

impl SshOptions {
    /// Overlay `other` onto `self`: every field set in `other` wins.
    pub fn merge(&mut self, other: SshOptions) {
        if other.forward_agent.is_some() {
            self.forward_agent = other.forward_agent;
        }
        if other.host_name.is_some() {
            self.host_name = other.host_name;
        }
        if !other.keys.is_empty() {
            self.keys = other.keys;
        }
        if other.keys_only.is_some() {
            self.keys_only = other.keys_only;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.use_agent.is_some() {
            self.use_agent = other.use_agent;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.auth_methods.is_some() {
            self.auth_methods = other.auth_methods;
        }
    }
}

/// One target host and how to create its VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// VM name, unique within limactl's namespace
    pub name: String,

    /// Login user for steady-state use
    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default)]
    pub lima: CreationSpec,

    #[serde(default)]
    pub ssh: SshOptions,
}

fn default_user() -> String {
    DEFAULT_HOST_USER.to_string()
}

impl HostConfig {
    pub fn new(name: impl Into<String>, lima: CreationSpec) -> Self {
        Self {
            name: name.into(),
            user: default_user(),
            ip: None,
            port: None,
            lima,
            ssh: SshOptions::default(),
        }
    }
}

/// Root structure of a hosts file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostsFile {
    #[serde(default, skip_serializing_if = "LimaOptions::is_default")]
    pub options: LimaOptions,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl HostsFile {
    /// Read and parse a hosts file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LimaError::Config(format!("Failed to read hosts file {}: {}", path.display(), e))
        })?;
        let file = Self::parse(&content).map_err(|e| {
            LimaError::Config(format!("Failed to parse hosts file {}: {}", path.display(), e))
        })?;
        debug!(
            "loaded {} host(s) from {}",
            file.hosts.len(),
            path.display()
        );
        Ok(file)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: HostsFile = serde_yaml_ng::from_str(content)?;
        file.validate()?;
        Ok(file)
    }

    /// Host names must be non-empty and unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(LimaError::Config("host name must not be empty".into()));
            }
            if !seen.insert(host.name.as_str()) {
                return Err(LimaError::Config(format!(
                    "host '{}' is listed more than once",
                    host.name
                )));
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}
