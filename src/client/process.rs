use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::session::McpClientSession;
use crate::error::{McpError, McpResult};

/// A tool server running as a child process, spoken to over its stdio.
///
/// The child is killed if this handle is dropped without `shutdown`.
pub struct ServerProcess {
    child: Child,
    command: String,
    shutdown_timeout: Duration,
}

impl ServerProcess {
    pub fn spawn(
        command: &str,
        args: &[String],
        request_timeout: Duration,
        shutdown_timeout: Duration,
    ) -> McpResult<(Self, McpClientSession)> {
        info!("Starting server: {} {}", command, args.join(" "));

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                McpError::Transport(format!("failed to start server '{}': {}", command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("server stdout unavailable".to_string()))?;

        let session = McpClientSession::new(stdout, stdin, request_timeout);

        Ok((
            Self {
                child,
                command: command.to_string(),
                shutdown_timeout,
            },
            session,
        ))
    }

    /// Wait for the server to exit after its stdin closes, killing it on timeout.
    ///
    /// The session must already be dropped so the server sees EOF.
    pub async fn shutdown(mut self) {
        let waited = tokio::time::timeout(self.shutdown_timeout, self.child.wait()).await;
        match waited {
            Ok(Ok(status)) => debug!("Server {} exited with {}", self.command, status),
            Ok(Err(e)) => warn!("Failed to wait for server {}: {}", self.command, e),
            Err(_) => {
                warn!(
                    "Server {} did not exit within {}s, killing it",
                    self.command,
                    self.shutdown_timeout.as_secs()
                );
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill server {}: {}", self.command, e);
                }
            }
        }
    }
}
