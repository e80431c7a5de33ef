//! Settings Models
//!
//! Application configuration and settings data structures.

use std::path::PathBuf;

use chat_companion_core::DEFAULT_SIZE_LIMIT;
use serde::{Deserialize, Serialize};

/// Application configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Symbols that introduce a command (e.g. `.ping`, `!ping`)
    #[serde(default = "default_command_prefixes")]
    pub command_prefixes: Vec<char>,
    /// Write a capture log for every failed command
    #[serde(default)]
    pub debug_mode: bool,
    /// Directory holding capture logs
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    /// URL probed by `.ping`
    #[serde(default = "default_ping_url")]
    pub ping_url: String,
    /// Largest file or folder `.upload` will send
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_command_prefixes() -> Vec<char> {
    vec!['.']
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_ping_url() -> String {
    "https://www.google.com".to_string()
}

fn default_max_upload_bytes() -> u64 {
    1_500_000_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command_prefixes: default_command_prefixes(),
            debug_mode: false,
            logs_dir: default_logs_dir(),
            telegram: TelegramConfig::default(),
            exec: ExecConfig::default(),
            ssh: SshConfig::default(),
            ping_url: default_ping_url(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Telegram-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(skip_serializing, default)]
    pub bot_token: Option<String>,
    /// Account whose messages are treated as commands
    #[serde(default)]
    pub operator_user_id: i64,
    /// Handle used to detect mentions of the operator
    #[serde(default)]
    pub operator_username: Option<String>,
    /// Auto-reply to private messages and mentions while away
    #[serde(default)]
    pub afk_auto_reply: bool,
}

/// How terminal output reaches the chat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StreamingPolicy {
    /// Wait for completion, send final result
    Buffered,
    /// Edit the live message as lines arrive; edits closer together than
    /// `throttle_ms` are coalesced
    Incremental { throttle_ms: u64 },
}

impl Default for StreamingPolicy {
    fn default() -> Self {
        Self::Incremental { throttle_ms: 0 }
    }
}

/// Process execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Wall-clock budget of one process, from launch
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Largest report inlined in one message
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,
    #[serde(default)]
    pub streaming: StreamingPolicy,
    /// Bytes of output captured per stream; a process producing more is
    /// killed and the capture is sent as a file
    #[serde(default = "default_output_limit_bytes")]
    pub output_limit_bytes: usize,
    /// Interpreter used by `.exec` (`<interpreter> -c <code>`)
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

fn default_deadline_secs() -> u64 {
    10
}

fn default_size_limit() -> usize {
    DEFAULT_SIZE_LIMIT
}

fn default_output_limit_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_interpreter() -> String {
    "python3".to_string()
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            size_limit: default_size_limit(),
            streaming: StreamingPolicy::default(),
            output_limit_bytes: default_output_limit_bytes(),
            interpreter: default_interpreter(),
        }
    }
}

/// Remote endpoint for `.rterm` / `.rupload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub hostname: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    /// Private key file
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(skip_serializing, default)]
    pub passphrase: Option<String>,
    /// Seconds `ssh`/`scp` wait for the TCP connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Budget of one `.rupload` file transfer
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_transfer_timeout_secs() -> u64 {
    300
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hostname: String::new(),
            port: default_ssh_port(),
            username: String::new(),
            password: None,
            key_path: None,
            passphrase: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Fill secrets from the environment when they are not in the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("COMPANION_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Ok(password) = std::env::var("COMPANION_SSH_PASSWORD") {
            self.ssh.password = Some(password);
        }
        if let Ok(passphrase) = std::env::var("COMPANION_SSH_PASSPHRASE") {
            self.ssh.passphrase = Some(passphrase);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.command_prefixes.is_empty() {
            return Err("command_prefixes must contain at least one symbol".to_string());
        }
        if let Some(c) = self
            .command_prefixes
            .iter()
            .find(|c| c.is_alphanumeric() || c.is_whitespace())
        {
            return Err(format!("Invalid command prefix: {:?}", c));
        }

        if self.exec.deadline_secs == 0 {
            return Err("exec.deadline_secs must be at least 1 second".to_string());
        }
        if self.exec.size_limit < 64 {
            return Err("exec.size_limit must be at least 64 characters".to_string());
        }
        if self.exec.output_limit_bytes < self.exec.size_limit {
            return Err("exec.output_limit_bytes must not be below exec.size_limit".to_string());
        }
        if self.exec.interpreter.trim().is_empty() {
            return Err("exec.interpreter cannot be empty".to_string());
        }

        if self.ssh.enabled {
            if self.ssh.hostname.trim().is_empty() {
                return Err("ssh.hostname is required when ssh is enabled".to_string());
            }
            if self.ssh.username.trim().is_empty() {
                return Err("ssh.username is required when ssh is enabled".to_string());
            }
            if self.ssh.connect_timeout_secs == 0 || self.ssh.transfer_timeout_secs == 0 {
                return Err("ssh timeouts must be at least 1 second".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.command_prefixes, vec!['.']);
        assert_eq!(config.exec.deadline_secs, 10);
        assert_eq!(config.exec.size_limit, 4096);
        assert_eq!(
            config.exec.streaming,
            StreamingPolicy::Incremental { throttle_ms: 0 }
        );
        assert!(!config.debug_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_output_limit_below_size_limit() {
        let mut config = AppConfig::default();
        config.exec.output_limit_bytes = 100;
        assert!(config.validate().unwrap_err().contains("output_limit_bytes"));
    }

    #[test]
    fn test_validate_rejects_empty_prefixes() {
        let config = AppConfig {
            command_prefixes: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_alphanumeric_prefix() {
        let config = AppConfig {
            command_prefixes: vec!['.', 'x'],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("prefix"));
    }

    #[test]
    fn test_validate_ssh_requires_host() {
        let mut config = AppConfig::default();
        config.ssh.enabled = true;
        config.ssh.username = "root".to_string();
        assert!(config.validate().unwrap_err().contains("hostname"));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = AppConfig::default();
        config.telegram.bot_token = Some("123:secret-token".to_string());
        config.ssh.password = Some("hunter2".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let json = r#"{"command_prefixes": [".", "!"], "exec": {"streaming": "Buffered"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.command_prefixes, vec!['.', '!']);
        assert_eq!(config.exec.streaming, StreamingPolicy::Buffered);
        assert_eq!(config.exec.deadline_secs, 10);
        assert_eq!(config.ssh.port, 22);
    }

    #[test]
    fn test_streaming_policy_serialize() {
        let json = serde_json::to_string(&StreamingPolicy::Incremental { throttle_ms: 500 }).unwrap();
        assert_eq!(json, "{\"Incremental\":{\"throttle_ms\":500}}");
    }
}
