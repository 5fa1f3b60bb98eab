//! [`RemoteShell`] backed by the system `ssh` and `scp` clients

use super::{ProbeError, RemoteShell, SshTarget};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// OpenSSH exits with 255 when the session itself failed
const SSH_SESSION_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct OpenSshShell {
    private_key: PathBuf,
    connect_timeout: Duration,
    ssh_program: String,
    scp_program: String,
}

impl OpenSshShell {
    pub fn new(private_key: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            private_key: private_key.into(),
            connect_timeout,
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
        }
    }

    /// Use different client binaries (e.g. a wrapper script)
    pub fn with_programs(mut self, ssh: impl Into<String>, scp: impl Into<String>) -> Self {
        self.ssh_program = ssh.into();
        self.scp_program = scp.into();
        self
    }

    fn common_args(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.private_key.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ]
    }

    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
    }
}

impl RemoteShell for OpenSshShell {
    async fn probe(&self, target: &SshTarget) -> Result<(), ProbeError> {
        let mut args = self.common_args();
        args.push("-p".to_string());
        args.push(target.port.to_string());
        args.push(format!("{}@{}", target.user, target.host));
        args.push("true".to_string());

        // Bound the whole session, not just the TCP connect
        let deadline = self.connect_timeout * 2;
        let output = match tokio::time::timeout(deadline, self.run(&self.ssh_program, &args)).await {
            Err(_) => return Err(ProbeError::TimedOut),
            Ok(Err(e)) => return Err(ProbeError::Launch(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(
            host = %target.host,
            code = ?output.status.code(),
            stderr = %stderr.trim(),
            "SSH probe failed"
        );
        Err(classify_failure(output.status.code(), &stderr))
    }

    async fn copy_file(&self, target: &SshTarget, local: &Path, remote_path: &str) -> Result<()> {
        let mut args = self.common_args();
        args.push("-P".to_string());
        args.push(target.port.to_string());
        args.push(local.display().to_string());
        args.push(format!("{}@{}:{}", target.user, target.host, remote_path));

        let output = self
            .run(&self.scp_program, &args)
            .await
            .with_context(|| format!("Failed to run {}", self.scp_program))?;

        if !output.status.success() {
            bail!(
                "scp to {}:{} failed: {}",
                target.host,
                remote_path,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Map a failed ssh invocation onto a [`ProbeError`].
fn classify_failure(code: Option<i32>, stderr: &str) -> ProbeError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("connection refused") {
        ProbeError::ConnectionRefused
    } else if lower.contains("permission denied") {
        ProbeError::AuthRejected
    } else if lower.contains("timed out") {
        ProbeError::TimedOut
    } else if code == Some(SSH_SESSION_FAILURE) || code.is_none() {
        ProbeError::Handshake(stderr.trim().to_string())
    } else {
        // The session came up but the remote command failed
        ProbeError::Handshake(format!("remote command exited with {code:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(
                Some(255),
                "ssh: connect to host 203.0.113.5 port 22: Connection refused"
            ),
            ProbeError::ConnectionRefused
        );
        assert_eq!(
            classify_failure(Some(255), "root@203.0.113.5: Permission denied (publickey)."),
            ProbeError::AuthRejected
        );
        assert_eq!(
            classify_failure(
                Some(255),
                "ssh: connect to host 203.0.113.5 port 22: Connection timed out"
            ),
            ProbeError::TimedOut
        );
        assert!(matches!(
            classify_failure(
                Some(255),
                "kex_exchange_identification: read: Connection reset by peer"
            ),
            ProbeError::Handshake(_)
        ));
    }

    #[test]
    fn test_common_args() {
        let shell = OpenSshShell::new("/keys/cluster.pem", Duration::from_secs(10));
        let args = shell.common_args();
        assert_eq!(args[1], "/keys/cluster.pem");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
    }

    #[tokio::test]
    async fn test_missing_client_is_launch_error() {
        let shell = OpenSshShell::new("/keys/cluster.pem", Duration::from_secs(1))
            .with_programs("/nonexistent/ssh-client", "/nonexistent/scp-client");
        let err = shell
            .probe(&SshTarget::new("127.0.0.1", "root"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
