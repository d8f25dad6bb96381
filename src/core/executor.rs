//! External command execution with a hard time bound.
//!
//! All OS queries go through [`CommandExecutor`] so the rest of the engine can
//! be exercised against canned output.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::constants;
use crate::error::{Error, Result};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    /// `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs an external command and captures its standard output.
///
/// A non-zero exit is not an error; callers inspect `exit_code`.
pub trait CommandExecutor {
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the program cannot start and
    /// [`Error::Timeout`] if it does not finish within the executor's bound.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Executes real processes, killing any that exceed `timeout`.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    timeout: Duration,
}

impl SystemExecutor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(constants::DEFAULT_PROBE_TIMEOUT_MS))
    }
}

impl CommandExecutor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Drain stdout on a side thread so a chatty child cannot block on a
        // full pipe while we poll for exit.
        let (tx, rx) = mpsc::channel();
        if let Some(mut stdout) = child.stdout.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stdout.read_to_end(&mut buf);
                let _ = tx.send(buf);
            });
        } else {
            let _ = tx.send(Vec::new());
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Timeout {
                        program: program.to_string(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(constants::PROBE_POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    return Err(Error::Spawn {
                        program: program.to_string(),
                        source,
                    });
                }
            }
        };

        // The child has exited; give the reader the remainder of the budget
        // to hit EOF (a grandchild may still hold the pipe open).
        let remaining = deadline.saturating_duration_since(Instant::now());
        let stdout = rx
            .recv_timeout(remaining.max(constants::PROBE_POLL_INTERVAL))
            .unwrap_or_default();

        Ok(CommandOutput {
            stdout,
            exit_code: status.code(),
        })
    }
}
