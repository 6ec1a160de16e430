use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::{Error, Result};

/// Something that can put an image file on the panel.
pub trait FrameDisplay {
    fn show(&self, image: &Path) -> impl Future<Output = DisplayReport> + Send;
}

/// Outcome of one display-program run.
#[derive(Debug, Clone)]
pub struct DisplayReport {
    pub command: String,
    pub success: bool,
    /// False when the program could not be launched, timed out, or its
    /// output could not be collected. `stderr` then holds the cause.
    pub completed: bool,
    /// `None` when the program did not complete or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl DisplayReport {
    fn from_output(command: String, output: Output) -> Self {
        Self {
            command,
            success: output.status.success(),
            completed: true,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    fn not_run(command: String, err: &Error) -> Self {
        Self {
            command,
            success: false,
            completed: false,
            exit_code: None,
            stdout: String::new(),
            stderr: err.to_string(),
        }
    }

    /// Converts a failed run into an error for the frame loop.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let reason = match (self.completed, self.exit_code) {
            (false, _) => self.stderr.trim().to_string(),
            (true, Some(code)) => format!("exit code {code}"),
            (true, None) => "terminated by signal".to_string(),
        };
        Err(Error::Display {
            command: self.command,
            reason,
        })
    }
}

/// Runs `<interpreter> <script> <image>` and waits for it to exit.
#[derive(Debug, Clone)]
pub struct ScriptDisplay {
    interpreter: String,
    script: PathBuf,
    timeout: Option<Duration>,
}

impl ScriptDisplay {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(cfg: &Configuration) -> Self {
        Self::new(cfg.display_interpreter.clone(), cfg.display_script.clone())
            .with_timeout(cfg.display_timeout)
    }

    fn command_line(&self, image: &Path) -> String {
        format!(
            "{} {} \"{}\"",
            self.interpreter,
            self.script.display(),
            image.display()
        )
    }

    async fn run(&self, image: &Path, command: &str) -> Result<Output> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|err| Error::Display {
            command: command.to_string(),
            reason: format!("failed to launch: {err}"),
        })?;

        // wait_with_output drains stdout and stderr concurrently before reaping.
        let finished = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, finished)
                .await
                .map_err(|_| Error::DisplayTimeout {
                    command: command.to_string(),
                    timeout: limit,
                })?,
            None => finished.await,
        };
        output.map_err(|err| Error::Display {
            command: command.to_string(),
            reason: format!("failed to collect output: {err}"),
        })
    }
}

impl FrameDisplay for ScriptDisplay {
    async fn show(&self, image: &Path) -> DisplayReport {
        let command = self.command_line(image);
        debug!(command = %command, "running display program");

        let report = match self.run(image, &command).await {
            Ok(output) => DisplayReport::from_output(command, output),
            Err(err) => DisplayReport::not_run(command, &err),
        };

        if !report.stdout.trim().is_empty() {
            info!(output = report.stdout.trim_end(), "display program output");
        }
        if report.success {
            if !report.stderr.trim().is_empty() {
                info!(stderr = report.stderr.trim_end(), "display program stderr");
            }
        } else {
            warn!(
                command = %report.command,
                exit_code = ?report.exit_code,
                stderr = report.stderr.trim_end(),
                "display program failed"
            );
        }
        report
    }
}
