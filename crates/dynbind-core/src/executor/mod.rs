//! Process-backed transaction executor
//!
//! Runs one short-lived agent process per transaction:
//!
//! 1. Spawn the agent (default `nsupdate`) with stdin and stderr piped
//! 2. Write the rendered script to stdin, then close it
//! 3. Wait for exit, bounded by the configured timeout
//! 4. Map the exit status: 0 is success, anything else is
//!    [`ExecutionFailure`]. A script that never reached the agent is a
//!    failure even when the agent exits 0.
//!
//! On timeout the child is killed when its handle is dropped.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::config::AgentConfig;
use crate::error::{Error, ExecutionFailure, Result};
use crate::traits::TransactionExecutor;
use crate::transaction::TransactionScript;

/// Executor that pipes scripts into an external DNS-update agent
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    /// Create an executor for `program` with no arguments and no timeout
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Create an executor from agent configuration
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    /// Set the agent's arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Bound every agent run by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run(&self, script: &TransactionScript) -> std::result::Result<(), ExecutionFailure> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionFailure::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let program = &self.program;
        let exchange = async move {
            // Keep waiting after a failed write so the child is reaped and a
            // non-zero status, which says more, still wins.
            let mut undelivered = None;
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(script.render().as_bytes()).await {
                    warn!("Failed to write script to {}: {}", program, e);
                    undelivered = Some(e.to_string());
                }
                drop(stdin);
            }
            child
                .wait_with_output()
                .await
                .map(|output| (output, undelivered))
        };

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ExecutionFailure::Timeout(limit))?,
            None => exchange.await,
        };
        let (output, undelivered) = waited.map_err(|e| ExecutionFailure::Wait(e.to_string()))?;

        if output.status.success() {
            return match undelivered {
                None => Ok(()),
                Some(reason) => Err(ExecutionFailure::Stdin(reason)),
            };
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(failure_from_status(output.status, stderr))
    }
}

fn failure_from_status(status: ExitStatus, stderr: String) -> ExecutionFailure {
    if let Some(code) = status.code() {
        return ExecutionFailure::ExitCode { code, stderr };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExecutionFailure::Signal(signal);
        }
    }

    ExecutionFailure::Wait(format!("agent ended without an exit status ({status})"))
}

#[async_trait]
impl TransactionExecutor for ProcessExecutor {
    async fn execute(&self, script: &TransactionScript) -> Result<()> {
        debug!("Running {} with script:\n{}", self.program, script);

        self.run(script).await.map_err(|failure| {
            error!("Agent {} failed: {}", self.program, failure);
            Error::Execution(failure)
        })
    }

    fn executor_name(&self) -> &'static str {
        "process"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::transaction::{RecordOperation, UpdateTarget, build_transaction};
    use crate::validate::validate_hostname;
    use tempfile::tempdir;

    fn script() -> TransactionScript {
        build_transaction(
            RecordOperation::CreateA("203.0.113.5".parse().unwrap()),
            &validate_hostname("myhost").unwrap(),
            &UpdateTarget::new("ns1.example.net", "dyn.example.net"),
        )
    }

    fn shell(command: &str) -> ProcessExecutor {
        ProcessExecutor::new("sh").with_args(["-c", command])
    }

    #[tokio::test]
    async fn test_script_is_fed_on_stdin() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("received");
        let executor = ProcessExecutor::new("sh").with_args([
            "-c".to_string(),
            "cat > \"$0\"".to_string(),
            out.display().to_string(),
        ]);

        executor.execute(&script()).await.unwrap();

        let received = std::fs::read_to_string(&out).unwrap();
        assert_eq!(received, script().render());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let executor = shell("cat > /dev/null; echo 'update failed: REFUSED' >&2; exit 3");

        match executor.execute(&script()).await {
            Err(Error::Execution(ExecutionFailure::ExitCode { code, stderr })) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "update failed: REFUSED");
            }
            other => panic!("expected exit code failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signal_is_failure() {
        let executor = shell("kill -9 $$");

        assert!(matches!(
            executor.execute(&script()).await,
            Err(Error::Execution(ExecutionFailure::Signal(9)))
        ));
    }

    #[tokio::test]
    async fn test_missing_agent_is_failure() {
        let executor = ProcessExecutor::new("/nonexistent/dynbind-agent");

        assert!(matches!(
            executor.execute(&script()).await,
            Err(Error::Execution(ExecutionFailure::Spawn { .. }))
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let executor = shell("sleep 5").with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        assert!(matches!(
            executor.execute(&script()).await,
            Err(Error::Execution(ExecutionFailure::Timeout(_)))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    /// A script larger than a pipe buffer, so the write blocks until the
    /// agent either reads it or closes stdin
    fn oversized_script() -> TransactionScript {
        build_transaction(
            RecordOperation::DeleteAll,
            &validate_hostname("myhost").unwrap(),
            &UpdateTarget::new("ns1.example.net", "z".repeat(256 * 1024)),
        )
    }

    #[tokio::test]
    async fn test_undelivered_script_is_failure() {
        let executor = shell("exec 0<&-; sleep 0.3; exit 0");

        assert!(matches!(
            executor.execute(&oversized_script()).await,
            Err(Error::Execution(ExecutionFailure::Stdin(_)))
        ));
    }

    #[tokio::test]
    async fn test_exit_status_wins_over_undelivered_script() {
        let executor = shell("exec 0<&-; echo 'refused' >&2; exit 4");

        match executor.execute(&oversized_script()).await {
            Err(Error::Execution(ExecutionFailure::ExitCode { code, stderr })) => {
                assert_eq!(code, 4);
                assert_eq!(stderr, "refused");
            }
            other => panic!("expected exit code failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_covers_script_delivery() {
        let executor = shell("sleep 5").with_timeout(Duration::from_millis(100));

        assert!(matches!(
            executor.execute(&oversized_script()).await,
            Err(Error::Execution(ExecutionFailure::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = AgentConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "cat > /dev/null".to_string()],
            timeout_secs: 0,
        };
        let executor = ProcessExecutor::from_config(&config);

        assert_eq!(executor.program, "sh");
        assert_eq!(executor.args, ["-c", "cat > /dev/null"]);
        assert_eq!(executor.timeout, None);
        executor.execute(&script()).await.unwrap();
    }
}
