//! Parsing of `limactl show-ssh --format options` output.
//!
//! The output is one `Key=value` option per line, shell-quoted:
//!
//! ```text
//! IdentityFile="/home/test/.lima/_config/user"
//! IdentityFile="/home/test/.ssh/id_rsa"
//! User=test
//! Hostname=127.0.0.1
//! Port=54321
//! ```

use indexmap::IndexMap;
use lima_core::error::{LimaError, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// SSH connection descriptor of a VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SshInfo {
    pub host_name: Option<String>,
    /// `0` when limactl did not report a usable port
    pub port: u16,
    pub user: Option<String>,
    /// Every `IdentityFile` in output order
    pub identity_files: Vec<String>,
    pub identities_only: Option<bool>,
    pub preferred_authentications: Option<String>,
    /// Remaining options, in output order
    pub extra: IndexMap<String, String>,
}

impl SshInfo {
    pub fn parse(output: &str) -> Result<Self> {
        let words = shell_words::split(output)
            .map_err(|e| LimaError::Serialization(format!("unparseable ssh options: {}", e)))?;

        let mut info = SshInfo::default();
        for word in words {
            let Some((key, value)) = word.split_once('=') else {
                debug!("ignoring ssh option without value: {}", word);
                continue;
            };
            info.set(key, value);
        }
        Ok(info)
    }

    // Option names are case-insensitive in ssh_config.
    fn set(&mut self, key: &str, value: &str) {
        match key.to_ascii_lowercase().as_str() {
            "identityfile" => self.identity_files.push(value.to_string()),
            "hostname" => self.host_name = Some(value.to_string()),
            "port" => self.port = parse_port(value),
            "user" => self.user = Some(value.to_string()),
            "identitiesonly" => self.identities_only = parse_yes_no(value),
            "preferredauthentications" => {
                self.preferred_authentications = Some(value.to_string())
            }
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SshInfo::default()
    }
}

/// Leading digits only; anything else (or an out-of-range value) becomes 0.
fn parse_port(value: &str) -> u16 {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse() {
        Ok(port) => port,
        Err(_) => {
            warn!("ignoring unusable ssh Port value '{}'", value);
            0
        }
    }
}

fn parse_yes_no(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}
