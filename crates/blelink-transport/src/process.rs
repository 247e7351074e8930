//! The helper as a child process.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::{LineTransport, PipeTransport, TransportError};

/// Line the helper treats as a request to exit.
const QUIT_LINE: &str = "quit\n";

/// How to start and stop the helper.
#[derive(Debug, Clone)]
pub struct HelperConfig {
    /// Helper executable.
    pub path: PathBuf,

    /// Arguments passed on the command line.
    pub args: Vec<String>,

    /// How long [`HelperProcess::stop`] waits for a clean exit before
    /// killing the process.
    pub stop_grace: Duration,
}

impl HelperConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Appends a command-line argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bluepy-helper"),
            args: Vec::new(),
            stop_grace: Duration::from_secs(2),
        }
    }
}

/// A running helper, driven through its stdin and stdout.
///
/// The child is killed if this value is dropped while it still runs.
pub struct HelperProcess {
    child: Mutex<Child>,
    pipe: PipeTransport<ChildStdout, ChildStdin>,
    pid: Option<u32>,
    config: HelperConfig,
}

impl HelperProcess {
    /// Starts the helper.
    ///
    /// # Errors
    /// [`TransportError::SpawnFailed`] if the executable can't be started.
    pub fn spawn(config: HelperConfig) -> Result<Self, TransportError> {
        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(TransportError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or(TransportError::NotStarted("stdin"))?;
        let stdout = child.stdout.take().ok_or(TransportError::NotStarted("stdout"))?;
        let pid = child.id();

        tracing::info!(path = %config.path.display(), ?pid, "helper started");
        Ok(Self {
            child: Mutex::new(child),
            pipe: PipeTransport::new(stdout, stdin),
            pid,
            config,
        })
    }

    /// OS process id, if known.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    /// Asks the helper to quit and waits for it.
    ///
    /// Sends `quit`, closes stdin and waits up to the configured grace
    /// period; a helper still running after that is killed.
    pub async fn stop(&self) -> Result<ExitStatus, TransportError> {
        if self.pipe.is_alive() {
            if let Err(e) = self.pipe.write_line(QUIT_LINE).await {
                tracing::debug!(error = %e, "quit not delivered");
            }
        }
        if let Err(e) = self.pipe.close().await {
            tracing::debug!(error = %e, "closing helper stdin failed");
        }

        let mut child = self.child.lock().await;
        let status = match tokio::time::timeout(self.config.stop_grace, child.wait()).await {
            Ok(status) => status.map_err(TransportError::ReadFailed)?,
            Err(_) => {
                tracing::warn!(
                    pid = ?self.pid,
                    grace = ?self.config.stop_grace,
                    "helper ignored quit, killing"
                );
                child.kill().await.map_err(TransportError::WriteFailed)?;
                child.wait().await.map_err(TransportError::ReadFailed)?
            }
        };

        tracing::info!(pid = ?self.pid, %status, "helper stopped");
        Ok(status)
    }

    /// Returns `true` if the child has not exited yet.
    fn running(&self) -> bool {
        match self.child.try_lock() {
            Ok(mut child) => matches!(child.try_wait(), Ok(None)),
            // Locked only by `stop`, which is on its way out.
            Err(_) => false,
        }
    }
}

impl LineTransport for HelperProcess {
    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        if !self.running() {
            return Err(TransportError::Exited);
        }
        self.pipe.write_line(line).await
    }

    async fn read_line(&self) -> Result<Option<String>, TransportError> {
        let line = self.pipe.read_line().await?;
        if line.is_none() {
            tracing::info!(pid = ?self.pid, "helper closed its output");
        }
        Ok(line)
    }

    fn is_alive(&self) -> bool {
        self.pipe.is_alive() && self.running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HelperConfig::default();
        assert_eq!(config.path, PathBuf::from("bluepy-helper"));
        assert!(config.args.is_empty());
        assert_eq!(config.stop_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_config_builder() {
        let config = HelperConfig::new("/usr/lib/helper")
            .arg("-i")
            .arg("hci0")
            .stop_grace(Duration::from_millis(300));
        assert_eq!(config.path, PathBuf::from("/usr/lib/helper"));
        assert_eq!(config.args, vec!["-i", "hci0"]);
        assert_eq!(config.stop_grace, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let result = HelperProcess::spawn(HelperConfig::new("/nonexistent/blelink-helper"));
        assert!(matches!(result, Err(TransportError::SpawnFailed(_))));
    }
}
