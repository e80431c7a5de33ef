//! Remote Session Backend
//!
//! Remote commands run through the system OpenSSH client. A connection is
//! opened per command and closed when the command exits; there is no
//! reconnection. Probes and transfers run under their own timeouts.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::models::settings::SshConfig;
use crate::utils::error::{AppError, AppResult};

/// Exit status `ssh`/`scp` use for their own failures.
const CONNECTION_FAILURE: i32 = 255;

/// Capability to run commands and fetch files on a remote endpoint.
#[async_trait]
pub trait RemoteSessionBackend: Send + Sync {
    /// `user@host:port`, for logs and status messages.
    fn endpoint(&self) -> String;

    /// Command that runs `remote_cmd` on the endpoint when spawned.
    fn command(&self, remote_cmd: &str) -> Command;

    /// Whether a regular file exists at `path` on the endpoint.
    async fn file_exists(&self, path: &str) -> AppResult<bool>;

    /// Copy the remote file at `remote` to the local path `local`.
    async fn fetch_file(&self, remote: &str, local: &Path) -> AppResult<()>;
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Budget of a `file_exists` check unless configured otherwise.
const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenSSH-backed remote sessions.
pub struct OpenSshBackend {
    config: SshConfig,
    check_timeout: Duration,
}

impl OpenSshBackend {
    pub fn new(config: SshConfig) -> AppResult<Self> {
        if config.hostname.trim().is_empty() {
            return Err(AppError::config("ssh.hostname is required"));
        }
        if config.username.trim().is_empty() {
            return Err(AppError::config("ssh.username is required"));
        }
        Ok(Self {
            config,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        })
    }

    /// Budget of `file_exists`.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    fn has_secret(&self) -> bool {
        self.config.password.is_some() || self.config.passphrase.is_some()
    }

    fn common_options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
        ];
        // Without a secret for sshpass to type, a prompt would block forever.
        if !self.has_secret() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        if let Some(key) = &self.config.key_path {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }

    /// Arguments passed to `ssh`.
    pub fn ssh_args(&self, remote_cmd: &str) -> Vec<String> {
        let mut args = self.common_options();
        args.push("-p".to_string());
        args.push(self.config.port.to_string());
        args.push(format!("{}@{}", self.config.username, self.config.hostname));
        args.push(remote_cmd.to_string());
        args
    }

    /// Arguments passed to `scp`.
    pub fn scp_args(&self, remote: &str, local: &Path) -> Vec<String> {
        let mut args = self.common_options();
        args.push("-P".to_string());
        args.push(self.config.port.to_string());
        args.push(format!(
            "{}@{}:{}",
            self.config.username, self.config.hostname, remote
        ));
        args.push(local.display().to_string());
        args
    }

    /// Wrap `program` with `sshpass` when a password or key passphrase is
    /// configured; the secret travels in `SSHPASS`, never on the command line.
    fn base_command(&self, program: &str) -> Command {
        let secret = match (&self.config.password, &self.config.passphrase) {
            (Some(password), _) => Some((password, None)),
            (None, Some(passphrase)) => Some((passphrase, Some("passphrase"))),
            (None, None) => None,
        };
        match secret {
            Some((secret, prompt)) => {
                let mut cmd = Command::new("sshpass");
                if let Some(prompt) = prompt {
                    cmd.arg("-P").arg(prompt);
                }
                cmd.arg("-e").arg(program).env("SSHPASS", secret);
                cmd
            }
            None => Command::new(program),
        }
    }

    /// Run `cmd` to completion, killing it when `limit` elapses.
    async fn run_bounded(&self, mut cmd: Command, program: &str, limit: Duration) -> AppResult<Output> {
        cmd.kill_on_drop(true);
        match tokio::time::timeout(limit, cmd.output()).await {
            Ok(output) => output
                .map_err(|e| AppError::connection(format!("Failed to start {}: {}", program, e))),
            Err(_) => {
                tracing::warn!("[Ssh] {} to {} timed out after {:?}", program, self.endpoint(), limit);
                Err(AppError::connection(format!(
                    "{} to {} timed out after {}s",
                    program,
                    self.endpoint(),
                    limit.as_secs()
                )))
            }
        }
    }
}

#[async_trait]
impl RemoteSessionBackend for OpenSshBackend {
    fn endpoint(&self) -> String {
        format!(
            "{}@{}:{}",
            self.config.username, self.config.hostname, self.config.port
        )
    }

    fn command(&self, remote_cmd: &str) -> Command {
        let mut cmd = self.base_command("ssh");
        cmd.args(self.ssh_args(remote_cmd));
        cmd
    }

    async fn file_exists(&self, path: &str) -> AppResult<bool> {
        let cmd = self.command(&format!("test -f {} && echo 1", shell_quote(path)));
        let output = self.run_bounded(cmd, "ssh", self.check_timeout).await?;

        if output.status.code() == Some(CONNECTION_FAILURE) {
            return Err(AppError::connection(format!(
                "Could not reach {}: {}",
                self.endpoint(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "1")
    }

    async fn fetch_file(&self, remote: &str, local: &Path) -> AppResult<()> {
        let mut cmd = self.base_command("scp");
        cmd.args(self.scp_args(remote, local));
        let limit = Duration::from_secs(self.config.transfer_timeout_secs);
        let output = self.run_bounded(cmd, "scp", limit).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(if output.status.code() == Some(CONNECTION_FAILURE) {
                AppError::connection(format!("Could not reach {}: {}", self.endpoint(), stderr))
            } else {
                AppError::command(format!("scp failed: {}", stderr))
            });
        }
        tracing::debug!("[Ssh] Fetched {} to {}", remote, local.display());
        Ok(())
    }
}
