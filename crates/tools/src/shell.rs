//! Shell execution: the terminal behind `run_command`.
//!
//! Commands are handed to a `ShellExecutor`; the default `ProcessShell`
//! spawns `sh -c` with a timeout. No isolation is attempted here: a
//! sandboxing executor can be plugged in through the trait.
//!
//! `ShellSession` tracks the logical working directory across calls, since
//! every command runs in a fresh process.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::error::ToolError;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one command in a working directory. An empty `cwd` means the
/// executor's own default.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn exec(&self, command: &str, cwd: &str) -> Result<ShellOutput, ToolError>;
}

/// `sh -c` (or `cmd /C` on Windows) via `tokio::process`.
pub struct ProcessShell {
    default_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessShell {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            default_dir: None,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run commands in `dir` when no working directory is tracked yet.
    pub fn with_default_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_dir = Some(dir.into());
        self
    }
}

impl Default for ProcessShell {
    fn default() -> Self {
        Self::new(60)
    }
}

#[async_trait]
impl ShellExecutor for ProcessShell {
    async fn exec(&self, command: &str, cwd: &str) -> Result<ShellOutput, ToolError> {
        debug!(command = %command, cwd = %cwd, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        if !cwd.is_empty() {
            cmd.current_dir(cwd);
        } else if let Some(dir) = &self.default_dir {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "run_command".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: "run_command".into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!(command = %command, exit_code, "Command failed");
        }
        Ok(ShellOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Output of a command run through a session, with the directory it
/// leaves the session in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRun {
    pub output: ShellOutput,
    pub cwd: String,
}

/// A terminal with a persistent logical working directory.
pub struct ShellSession {
    shell: Arc<dyn ShellExecutor>,
    cwd: Mutex<String>,
}

impl ShellSession {
    pub fn new(shell: Arc<dyn ShellExecutor>) -> Self {
        Self {
            shell,
            cwd: Mutex::new(String::new()),
        }
    }

    pub fn with_cwd(self, cwd: impl Into<String>) -> Self {
        Self {
            shell: self.shell,
            cwd: Mutex::new(cwd.into()),
        }
    }

    pub async fn cwd(&self) -> String {
        self.cwd.lock().await.clone()
    }

    /// Run a command. A plain `cd <dir>` is resolved with a probe so the
    /// tracked directory follows it; a failed `cd` returns its stderr as an
    /// error and leaves the directory unchanged.
    pub async fn run(&self, command: &str) -> Result<SessionRun, ToolError> {
        let mut cwd = self.cwd.lock().await;

        let Some(target) = cd_target(command) else {
            let output = self.shell.exec(command, &cwd).await?;
            return Ok(SessionRun {
                output,
                cwd: cwd.clone(),
            });
        };

        let probe = if cwd.is_empty() {
            format!("cd {target} && pwd")
        } else {
            format!("cd {} && cd {target} && pwd", quote(&cwd))
        };
        let output = self.shell.exec(&probe, &cwd).await?;
        if !output.success() {
            let reason = if output.stderr.trim().is_empty() {
                format!("cd: exit code {}", output.exit_code)
            } else {
                output.stderr.trim().to_string()
            };
            return Err(ToolError::ExecutionFailed {
                tool_name: "run_command".into(),
                reason,
            });
        }

        *cwd = output.stdout.trim().to_string();
        debug!(cwd = %cwd, "Working directory changed");
        Ok(SessionRun {
            output: ShellOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: output.stderr,
            },
            cwd: cwd.clone(),
        })
    }
}

/// The directory argument of a standalone `cd` command. Compound commands
/// (`cd x && make`) run as-is and do not move the session.
fn cd_target(command: &str) -> Option<&str> {
    let command = command.trim();
    if command == "cd" {
        return Some("~");
    }
    let rest = command.strip_prefix("cd ")?.trim();
    if rest.is_empty() {
        return Some("~");
    }
    if rest.contains(['&', ';', '|', '\n']) {
        return None;
    }
    Some(rest)
}

/// Single-quote a path for `sh`.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call and answers from a fixed script.
    struct ScriptedShell {
        calls: std::sync::Mutex<Vec<(String, String)>>,
        reply: ShellOutput,
    }

    impl ScriptedShell {
        fn new(reply: ShellOutput) -> Arc<Self> {
            Arc::new(Self {
                calls: std::sync::Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl ShellExecutor for ScriptedShell {
        async fn exec(&self, command: &str, cwd: &str) -> Result<ShellOutput, ToolError> {
            self.calls
                .lock()
                .unwrap()
                .push((command.to_string(), cwd.to_string()));
            Ok(self.reply.clone())
        }
    }

    fn out(code: i32, stdout: &str, stderr: &str) -> ShellOutput {
        ShellOutput {
            exit_code: code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn cd_detection() {
        assert_eq!(cd_target("cd src"), Some("src"));
        assert_eq!(cd_target("  cd ../lib  "), Some("../lib"));
        assert_eq!(cd_target("cd"), Some("~"));
        assert_eq!(cd_target("cd src && npm test"), None);
        assert_eq!(cd_target("cdrom"), None);
        assert_eq!(cd_target("ls"), None);
    }

    #[tokio::test]
    async fn cd_probe_updates_cwd() {
        let shell = ScriptedShell::new(out(0, "/work/app/src\n", ""));
        let session = ShellSession::new(shell.clone()).with_cwd("/work/app");

        let run = session.run("cd src").await.unwrap();
        assert_eq!(run.cwd, "/work/app/src");
        assert_eq!(session.cwd().await, "/work/app/src");

        let calls = shell.calls.lock().unwrap();
        assert_eq!(calls[0].0, "cd '/work/app' && cd src && pwd");
    }

    #[tokio::test]
    async fn failed_cd_keeps_cwd_and_reports_stderr() {
        let shell = ScriptedShell::new(out(1, "", "sh: cd: nope: No such file or directory\n"));
        let session = ShellSession::new(shell).with_cwd("/work/app");

        let err = session.run("cd nope").await.unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));
        assert_eq!(session.cwd().await, "/work/app");
    }

    #[tokio::test]
    async fn commands_run_in_tracked_cwd() {
        let shell = ScriptedShell::new(out(0, "ok\n", ""));
        let session = ShellSession::new(shell.clone()).with_cwd("/work");
        let run = session.run("ls -la").await.unwrap();
        assert_eq!(run.output.stdout, "ok\n");
        assert_eq!(run.cwd, "/work");
        assert_eq!(shell.calls.lock().unwrap()[0], ("ls -la".into(), "/work".into()));
    }

    #[test]
    fn quoting_escapes_single_quotes() {
        assert_eq!(quote("/a b/it's"), r"'/a b/it'\''s'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_echo() {
        let shell = ProcessShell::new(10);
        let output = shell.exec("echo hello", "").await.unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_data_not_error() {
        let shell = ProcessShell::new(10);
        let output = shell.exec("echo oops >&2; exit 3", "").await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert!(output.stderr.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_cd_follows_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let root = dir.path().canonicalize().unwrap();

        let shell = Arc::new(ProcessShell::new(10));
        let session = ShellSession::new(shell).with_cwd(root.to_string_lossy());
        let run = session.run("cd sub").await.unwrap();
        assert!(run.cwd.ends_with("sub"), "{}", run.cwd);

        let run = session.run("pwd").await.unwrap();
        assert_eq!(run.output.stdout.trim(), run.cwd);
    }
}
