use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lima_config::{normalized_yaml, CreationSpec, LimaOptions};
use lima_core::command::{is_tool_installed, CommandOutput, CommandRunner, DuctRunner, ToolCommand};
use lima_core::error::{LimaError, Result};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::ssh_info::SshInfo;
use crate::status::VmStatus;
use crate::LimaOps;

/// Extra wall-clock time granted on top of limactl's own `--timeout`, so limactl can
/// report its timeout before the process gets killed.
const START_GRACE: Duration = Duration::from_secs(60);

const STATUS_FORMAT: &str = "{{ .Status }}";

/// Wraps the `limactl` CLI.
///
/// `info` and `ssh_info` results are cached for the lifetime of the controller.
pub struct LimaController {
    options: LimaOptions,
    runner: Arc<dyn CommandRunner>,
    lima_info: Mutex<Option<Value>>,
    ssh_info: Mutex<HashMap<String, SshInfo>>,
}

impl LimaController {
    /// Controller running the configured limactl binary, which must be installed.
    pub fn new(options: LimaOptions) -> Result<Self> {
        if !is_tool_installed(&options.limactl) {
            return Err(LimaError::Dependency(format!(
                "limactl ({}); install Lima from https://lima-vm.io",
                options.limactl
            )));
        }
        Ok(Self::with_runner(options, Arc::new(DuctRunner)))
    }

    pub fn with_runner(options: LimaOptions, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            options,
            runner,
            lima_info: Mutex::new(None),
            ssh_info: Mutex::new(HashMap::new()),
        }
    }

    fn limactl(&self) -> ToolCommand {
        ToolCommand::new(self.options.limactl.as_str())
    }

    fn timeout_arg(&self) -> String {
        format!("--timeout={}s", self.options.timeout)
    }

    fn start_wait_limit(&self) -> Duration {
        self.options.timeout_duration().saturating_add(START_GRACE)
    }

    /// Run a command whose non-zero exit is a hard error.
    fn run_checked(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let output = self.runner.run(command)?;
        if !output.success() {
            return Err(LimaError::tool_invocation(command, &output));
        }
        Ok(output)
    }

    /// Raw status token, empty when the VM does not exist.
    pub fn status_raw(&self, name: &str) -> Result<String> {
        let command = self
            .limactl()
            .args(["list", "--format", STATUS_FORMAT, name]);
        let output = self.run_checked(&command)?;
        Ok(output.stdout.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    fn write_config(&self, name: &str, config: &serde_yaml_ng::Value) -> Result<NamedTempFile> {
        let yaml = normalized_yaml(config)?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("lima_{}", safe_file_stem(name)))
            .suffix(".yaml")
            .tempfile()?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;
        debug!("wrote Lima config for '{}' to {}", name, file.path().display());
        Ok(file)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let command = self
            .limactl()
            .arg("validate")
            .arg(path.to_string_lossy());
        self.run_checked(&command)?;
        Ok(())
    }

    /// Log why a soft operation did not reach its expected state.
    fn warn_unconfirmed(&self, command: &ToolCommand, outcome: &Result<CommandOutput>) {
        match outcome {
            Ok(output) => {
                let err = LimaError::tool_invocation(command, output);
                warn!("{}", err);
            }
            Err(e) => warn!("`{}` could not be run: {}", command.command_line(), e),
        }
    }
}

/// Keep only characters that are safe in a file name.
fn safe_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl LimaOps for LimaController {
    fn info(&self) -> Result<Value> {
        let mut cached = self.lima_info.lock().map_err(poisoned)?;
        if let Some(info) = cached.as_ref() {
            return Ok(info.clone());
        }

        let command = self.limactl().arg("info");
        let output = self.run_checked(&command)?;
        let info: Value = serde_json::from_str(&output.stdout)?;
        *cached = Some(info.clone());
        Ok(info)
    }

    fn list(&self, names: &[String]) -> Result<Vec<Value>> {
        let command = self
            .limactl()
            .args(["list", "--json"])
            .args(names.iter().cloned());
        let output = self.run_checked(&command)?;

        output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(LimaError::from))
            .collect()
    }

    fn status(&self, name: &str) -> Result<VmStatus> {
        self.status_raw(name).map(|raw| VmStatus::parse(&raw))
    }

    fn start(&self, name: &str, spec: &CreationSpec) -> Result<bool> {
        match self.status(name)? {
            VmStatus::Absent => return self.create(name, spec),
            VmStatus::Running => {
                debug!("'{}' is running already, skipping...", name);
                return Ok(true);
            }
            VmStatus::Stopped => {}
            VmStatus::Other(status) => {
                debug!("'{}' is in state '{}', trying to start it", name, status);
            }
        }

        info!("Starting Lima VM '{}'", name);
        let command = self
            .limactl()
            .arg("start")
            .arg(self.timeout_arg())
            .arg(name)
            .timeout(self.start_wait_limit());
        self.run_checked(&command)?;
        Ok(true)
    }

    fn create(&self, name: &str, spec: &CreationSpec) -> Result<bool> {
        debug!("Options: {:?}", spec);

        // Dropping the temp file removes it, on every path out of this function.
        let mut staged: Option<NamedTempFile> = None;
        let source = match spec {
            CreationSpec::Unset => {
                return Err(LimaError::Config(
                    "At least one of url/template/config parameters must be specified".into(),
                ))
            }
            CreationSpec::Template(url) => url.clone(),
            CreationSpec::InlineConfig(config) => {
                let file = self.write_config(name, config)?;
                if self.options.validate_config {
                    self.validate(file.path())?;
                }
                let path = file.path().to_string_lossy().into_owned();
                staged = Some(file);
                path
            }
        };

        info!("Creating Lima VM '{}' from {}", name, source);
        let command = self
            .limactl()
            .arg("start")
            .arg(format!("--name={}", name))
            .arg(self.timeout_arg())
            .arg(source)
            .timeout(self.start_wait_limit());
        let outcome = self.runner.run(&command);
        drop(staged);

        let output = outcome?;
        if !output.success() {
            return Err(LimaError::tool_invocation(&command, &output));
        }
        Ok(true)
    }

    fn stop(&self, name: &str) -> bool {
        let command = self.limactl().args(["stop", name]);
        let outcome = self.runner.run(&command);

        // limactl stop may fail even though the VM did stop; the status decides.
        match self.status(name) {
            Ok(VmStatus::Stopped) => true,
            Ok(status) => {
                self.warn_unconfirmed(&command, &outcome);
                warn!("'{}' is {} after stop", name, status);
                false
            }
            Err(e) => {
                self.warn_unconfirmed(&command, &outcome);
                warn!("could not confirm '{}' stopped: {}", name, e);
                false
            }
        }
    }

    fn delete(&self, name: &str) -> bool {
        let command = self.limactl().args(["delete", name]);
        let outcome = self.runner.run(&command);

        // Same as stop: absence after the call is what counts.
        match self.status(name) {
            Ok(VmStatus::Absent) => true,
            Ok(status) => {
                self.warn_unconfirmed(&command, &outcome);
                warn!("'{}' is still {} after delete", name, status);
                false
            }
            Err(e) => {
                self.warn_unconfirmed(&command, &outcome);
                warn!("could not confirm '{}' deleted: {}", name, e);
                false
            }
        }
    }

    fn ssh_info(&self, name: &str) -> Result<SshInfo> {
        if let Some(info) = self.ssh_info.lock().map_err(poisoned)?.get(name) {
            return Ok(info.clone());
        }

        let command = self
            .limactl()
            .args(["show-ssh", "--format", "options", name]);
        let output = self.runner.run(&command)?;

        if output.stdout.trim().is_empty() {
            let err = LimaError::tool_invocation(&command, &output);
            warn!("{}", err);
            return Ok(SshInfo::default());
        }

        let info = SshInfo::parse(&output.stdout)?;
        self.ssh_info
            .lock()
            .map_err(poisoned)?
            .insert(name.to_string(), info.clone());
        Ok(info)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> LimaError {
    LimaError::Command("Lima controller cache lock poisoned".into())
}
