// Standard library
use std::ffi::OsStr;
use std::thread;
use std::time::{Duration, Instant};

// External crates
use duct::cmd;
use tracing::debug;
use which::which;

// Internal imports
use crate::error::{LimaError, Result};

/// A single external tool invocation: program, arguments and an optional wall-clock bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn wait_limit(&self) -> Option<Duration> {
        self.timeout
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Space-joined command line, used in logs and error messages.
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            code: Some(code),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn from_process(output: &std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        }
    }
}

/// Runs external tools. Non-zero exits are reported through [`CommandOutput::code`],
/// not as errors; only spawn failures and expired wait limits are errors.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuctRunner;

impl DuctRunner {
    fn expression<A: AsRef<OsStr>>(program: &str, args: &[A]) -> duct::Expression {
        cmd(program, args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
    }
}

impl CommandRunner for DuctRunner {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        debug!("running `{}`", command.command_line());
        let expression = Self::expression(command.program(), command.arguments());

        let Some(limit) = command.wait_limit() else {
            let output = expression
                .run()
                .map_err(|e| spawn_error(command, e))?;
            return Ok(CommandOutput::from_process(&output));
        };

        let handle = expression.start().map_err(|e| spawn_error(command, e))?;

        let start = Instant::now();
        loop {
            if start.elapsed() >= limit {
                let _ = handle.kill();
                return Err(LimaError::Timeout(format!(
                    "Command timed out after {}s: {}",
                    limit.as_secs(),
                    command.command_line()
                )));
            }

            match handle.try_wait() {
                Ok(Some(output)) => return Ok(CommandOutput::from_process(output)),
                Ok(None) => thread::sleep(Duration::from_millis(100)),
                Err(e) => {
                    return Err(LimaError::Command(format!(
                        "Error waiting for command '{}': {}",
                        command.command_line(),
                        e
                    )));
                }
            }
        }
    }
}

fn spawn_error(command: &ToolCommand, e: std::io::Error) -> LimaError {
    LimaError::Command(format!(
        "Failed to start command '{}': {}",
        command.command_line(),
        e
    ))
}

/// Checks if a command-line tool is available in the system's PATH.
pub fn is_tool_installed(tool_name: &str) -> bool {
    which(tool_name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_program_and_args() {
        let command = ToolCommand::new("limactl")
            .arg("list")
            .args(["--format", "{{ .Status }}", "vm"]);

        assert_eq!(command.command_line(), "limactl list --format {{ .Status }} vm");
        assert_eq!(command.argv().len(), 5);
        assert!(command.wait_limit().is_none());
    }

    #[test]
    fn success_requires_zero_exit() {
        assert!(CommandOutput::ok("").success());
        assert!(!CommandOutput::failed(1, "nope").success());
        assert!(!CommandOutput::default().success());
    }

    #[cfg(unix)]
    #[test]
    fn duct_runner_captures_streams_and_exit_code() {
        let command = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let output = DuctRunner.run(&command).unwrap();

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn duct_runner_kills_process_after_wait_limit() {
        let command = ToolCommand::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(200));

        let err = DuctRunner.run(&command).unwrap_err();
        assert!(matches!(err, LimaError::Timeout(_)));
    }

    #[test]
    fn spawn_failure_is_command_error_with_or_without_wait_limit() {
        let unbounded = ToolCommand::new("definitely-not-a-real-limactl-binary").arg("info");
        let bounded = unbounded.clone().timeout(Duration::from_secs(5));

        for command in [unbounded, bounded] {
            let err = DuctRunner.run(&command).unwrap_err();
            assert!(matches!(err, LimaError::Command(_)), "{err:?}");
            assert!(err.to_string().contains("definitely-not-a-real-limactl-binary"));
        }
    }

    #[test]
    fn missing_tool_is_not_installed() {
        assert!(!is_tool_installed("definitely-not-a-real-limactl-binary"));
    }
}
