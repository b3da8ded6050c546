//! Captured output of one client round trip.

use crate::error::{YbError, YbResult};
use crate::object_path::quote_object_paths;
use colored::*;
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use tracing::debug;

/// Typed value returned by a transpiled procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProcReturn {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for ProcReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Exit code, stdout and stderr of a finished command.
///
/// Procedure calls additionally carry the recovered return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    exit_code: i32,
    stdout: String,
    stderr: String,
    proc_return: Option<ProcReturn>,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            proc_return: None,
        }
    }

    pub(crate) fn with_proc_return(mut self, proc_return: Option<ProcReturn>) -> Self {
        self.proc_return = proc_return;
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn proc_return(&self) -> Option<ProcReturn> {
        self.proc_return
    }

    /// Anything on stderr or a non-zero exit code counts as a failure.
    pub fn is_error(&self) -> bool {
        !self.stderr.is_empty() || self.exit_code != 0
    }

    /// Turn a failed result into [`YbError::Execution`].
    pub fn into_result(self) -> YbResult<Self> {
        if self.is_error() {
            Err(YbError::Execution {
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        } else {
            Ok(self)
        }
    }

    /// Write stdout and stderr to the given streams.
    ///
    /// `head` is always written first. `tail` is only written when stderr
    /// is empty so a completion banner never follows a partial failure.
    pub fn write_to(
        &self,
        out: &mut impl Write,
        err: &mut impl Write,
        head: &str,
        tail: &str,
        quote: bool,
    ) -> io::Result<()> {
        out.write_all(head.as_bytes())?;
        if !self.stdout.is_empty() {
            if quote {
                out.write_all(quote_object_paths(&self.stdout).as_bytes())?;
            } else {
                out.write_all(self.stdout.as_bytes())?;
            }
        }
        if !self.stderr.is_empty() {
            out.flush()?;
            writeln!(err, "{}", error_line(&self.stderr))?;
        } else {
            out.write_all(tail.as_bytes())?;
        }
        out.flush()
    }

    /// Write to the process stdout/stderr.
    pub fn write(&self, head: &str, tail: &str, quote: bool) {
        let stdout = io::stdout();
        let stderr = io::stderr();
        if let Err(e) = self.write_to(&mut stdout.lock(), &mut stderr.lock(), head, tail, quote) {
            debug!("failed to write command output: {}", e);
        }
    }

    /// On failure write the output and terminate with the exit code.
    pub fn on_error_exit(&self) {
        if self.is_error() {
            self.write("", "", false);
            std::process::exit(self.exit_code);
        }
    }
}

/// Name of the running utility, used to prefix error messages.
pub fn util_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(std::path::Path::new)
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Format an error message as `<util>: <message>`.
pub fn error_line(msg: &str) -> String {
    format!("{}: {}", util_name().bold(), msg.trim_end().red())
}
