//! External command execution
//!
//! Every call into nmcli, dnsmasq, systemctl and friends goes through the
//! [`CommandRunner`] trait so the controllers can be driven by a scripted
//! runner in tests.

use crate::error::{PioneerError, PioneerResult};
use crate::validation::sanitize_error_message;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Arguments whose following value must never reach the logs
const SECRET_ARGS: &[&str] = &["wifi-sec.psk", "802-11-wireless-security.psk", "password"];

/// A program, its arguments and how long it may run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Build from a configured command line (program followed by arguments)
    pub fn from_command_line(command: &[String], timeout: Duration) -> PioneerResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| PioneerError::ConfigError("empty command line".to_string()))?;
        Ok(Self::new(program.clone(), args.iter().cloned(), timeout))
    }

    /// Command line for logs and error messages, secrets masked
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());

        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                parts.push("******".to_string());
                mask_next = false;
            } else {
                parts.push(arg.clone());
                mask_next = SECRET_ARGS.contains(&arg.as_str());
            }
        }

        parts.join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, None when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into `CommandFailed`, returning stdout otherwise
    pub fn into_stdout(self, invocation: &Invocation) -> PioneerResult<String> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(PioneerError::CommandFailed {
                cmd: invocation.display(),
                code: self.code,
                stderr: sanitize_error_message(&self.stderr),
            })
        }
    }
}

/// Executes external programs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion or until the invocation's timeout elapses
    ///
    /// A missing binary is `ToolUnavailable`, an elapsed deadline is
    /// `Timeout`. Non-zero exit codes are returned, not turned into errors.
    async fn run(&self, invocation: &Invocation) -> PioneerResult<CommandOutput>;
}

/// Runs commands on the host with tokio::process
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, invocation: &Invocation) -> PioneerResult<CommandOutput> {
        debug!("Running: {}", invocation.display());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true);

        let output = match timeout(invocation.timeout, command.output()).await {
            Err(_) => {
                return Err(PioneerError::Timeout {
                    cmd: invocation.display(),
                    secs: invocation.timeout.as_secs(),
                })
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PioneerError::ToolUnavailable {
                    tool: invocation.program.clone(),
                    detail: e.to_string(),
                })
            }
            Ok(Err(e)) => {
                return Err(PioneerError::CommandFailed {
                    cmd: invocation.display(),
                    code: None,
                    stderr: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        debug!("Finished: {} (exit {:?})", invocation.program, result.code);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_masks_secrets() {
        let inv = Invocation::new(
            "nmcli",
            ["connection", "modify", "PIONEER_SETUP", "wifi-sec.psk", "hunter22", "802-11-wireless.ssid", "Lab"],
            Duration::from_secs(10),
        );
        let shown = inv.display();
        assert!(!shown.contains("hunter22"));
        assert_eq!(
            shown,
            "nmcli connection modify PIONEER_SETUP wifi-sec.psk ****** 802-11-wireless.ssid Lab"
        );
    }

    #[test]
    fn test_from_command_line() {
        let cmd = vec!["systemctl".to_string(), "reload".to_string(), "dnsmasq".to_string()];
        let inv = Invocation::from_command_line(&cmd, Duration::from_secs(5)).unwrap();
        assert_eq!(inv.program, "systemctl");
        assert_eq!(inv.args, vec!["reload", "dnsmasq"]);

        assert!(Invocation::from_command_line(&[], Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_into_stdout() {
        let inv = Invocation::new("dnsmasq", ["--test"], Duration::from_secs(5));
        let ok = CommandOutput { code: Some(0), stdout: "syntax check OK.\n".into(), stderr: String::new() };
        assert_eq!(ok.into_stdout(&inv).unwrap(), "syntax check OK.\n");

        let bad = CommandOutput { code: Some(1), stdout: String::new(), stderr: "bad option at line 3\n".into() };
        match bad.into_stdout(&inv) {
            Err(PioneerError::CommandFailed { cmd, code, stderr }) => {
                assert_eq!(cmd, "dnsmasq --test");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "bad option at line 3");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_unavailable() {
        let runner = SystemCommandRunner::new();
        let inv = Invocation::new(
            "pioneer-definitely-not-installed",
            Vec::<String>::new(),
            Duration::from_secs(5),
        );
        match runner.run(&inv).await {
            Err(PioneerError::ToolUnavailable { tool, .. }) => {
                assert_eq!(tool, "pioneer-definitely-not-installed");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_and_timeout() {
        let runner = SystemCommandRunner::new();

        let fail = Invocation::new("sh", ["-c", "echo oops >&2; exit 3"], Duration::from_secs(5));
        let output = runner.run(&fail).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");

        let slow = Invocation::new("sleep", ["5"], Duration::from_millis(100));
        assert!(matches!(runner.run(&slow).await, Err(PioneerError::Timeout { .. })));
    }
}
