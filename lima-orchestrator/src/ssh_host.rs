//! [`Host`] backed by a [`HostConfig`] and the system `ssh` binary.
//!
//! Connections are multiplexed through an OpenSSH control socket in a private temp
//! directory, so `close` really tears down the live session.

use std::path::PathBuf;
use std::sync::Arc;

use lima_config::{CreationSpec, HostConfig, SshOptions};
use lima_core::command::{CommandRunner, DuctRunner, ToolCommand};
use lima_core::error::{LimaError, Result};
use tempfile::TempDir;
use tracing::debug;

use crate::host::Host;

const SSH: &str = "ssh";

pub struct SshHost {
    config: HostConfig,
    runner: Arc<dyn CommandRunner>,
    control_dir: TempDir,
}

impl SshHost {
    pub fn new(config: HostConfig) -> Result<Self> {
        Self::with_runner(config, Arc::new(DuctRunner))
    }

    pub fn with_runner(config: HostConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let control_dir = tempfile::Builder::new().prefix("lima-hv-ssh").tempdir()?;
        Ok(Self {
            config,
            runner,
            control_dir,
        })
    }

    pub fn into_config(self) -> HostConfig {
        self.config
    }

    fn control_path(&self) -> PathBuf {
        self.control_dir.path().join("%C")
    }

    /// `user@address`, preferring the rewritten IP over the configured host name.
    fn destination(&self) -> String {
        let address = self
            .config
            .ip
            .as_deref()
            .or(self.config.ssh.host_name.as_deref())
            .unwrap_or(self.config.name.as_str());
        format!("{}@{}", self.config.user, address)
    }

    /// `ssh` invocation up to (and including) the destination.
    pub fn ssh_command(&self) -> ToolCommand {
        let ssh = &self.config.ssh;
        let mut command = ToolCommand::new(SSH).args([
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "LogLevel=ERROR",
            "-o",
            "ControlMaster=auto",
            "-o",
            "ControlPersist=60",
        ]);
        command = command.arg("-o").arg(format!(
            "ControlPath={}",
            self.control_path().display()
        ));

        if let Some(port) = self.config.port.or(ssh.port) {
            command = command.arg("-p").arg(port.to_string());
        }
        for key in &ssh.keys {
            command = command.arg("-i").arg(key.as_str());
        }
        if let Some(keys_only) = ssh.keys_only {
            command = command
                .arg("-o")
                .arg(format!("IdentitiesOnly={}", yes_no(keys_only)));
        }
        if ssh.forward_agent == Some(true) {
            command = command.arg("-A");
        }
        if let Some(methods) = &ssh.auth_methods {
            command = command
                .arg("-o")
                .arg(format!("PreferredAuthentications={}", methods.join(",")));
        }
        command.arg(self.destination())
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

impl Host for SshHost {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn creation_spec(&self) -> &CreationSpec {
        &self.config.lima
    }

    fn user(&self) -> &str {
        &self.config.user
    }

    fn set_user(&mut self, user: &str) {
        self.config.user = user.to_string();
    }

    fn ip(&self) -> Option<&str> {
        self.config.ip.as_deref()
    }

    fn set_ip(&mut self, ip: &str) {
        self.config.ip = Some(ip.to_string());
    }

    fn port(&self) -> Option<u16> {
        self.config.port
    }

    fn set_port(&mut self, port: u16) {
        self.config.port = Some(port);
    }

    fn ssh_options(&self) -> &SshOptions {
        &self.config.ssh
    }

    fn ssh_options_mut(&mut self) -> &mut SshOptions {
        &mut self.config.ssh
    }

    fn exec(&mut self, command: &str) -> Result<String> {
        let ssh = self.ssh_command().arg("--").arg(command);
        debug!("{}: {}", self.config.name, command);

        let output = self.runner.run(&ssh)?;
        if !output.success() {
            return Err(LimaError::Command(format!(
                "`{}` on {} failed with status {}: {}",
                command,
                self.config.name,
                output
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".into()),
                output.stderr.trim_end()
            )));
        }
        Ok(output.stdout)
    }

    fn close(&mut self) {
        let exit = ToolCommand::new(SSH)
            .arg("-o")
            .arg(format!("ControlPath={}", self.control_path().display()))
            .args(["-O", "exit"])
            .arg(self.destination());

        // No master running is the common case after a single short command.
        match self.runner.run(&exit) {
            Ok(output) if output.success() => debug!("closed connection to {}", self.config.name),
            Ok(_) => debug!("no open connection to {}", self.config.name),
            Err(e) => debug!("could not close connection to {}: {}", self.config.name, e),
        }
    }
}
