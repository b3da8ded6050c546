//! Blocking shell command execution.
//!
//! One child process per call; the caller waits until it exits. There is
//! no timeout here, the database client enforces its own connect timeout.

use crate::error::YbResult;
use crate::result::CommandResult;
use std::borrow::Cow;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, trace};

/// A command line handed to `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    text: String,
    escape_dollar: bool,
    env: Vec<(String, Option<String>)>,
}

impl ShellCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            escape_dollar: true,
            env: Vec::new(),
        }
    }

    /// Place a backslash before each `$` so the shell leaves it alone.
    /// On by default.
    pub fn escape_dollar(mut self, escape: bool) -> Self {
        self.escape_dollar = escape;
        self
    }

    /// Set (`Some`) or remove (`None`) an environment variable for the
    /// child only. The parent environment is never modified.
    pub fn env(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.env.push((key.into(), value));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text as the shell receives it.
    pub fn shell_text(&self) -> Cow<'_, str> {
        if self.escape_dollar {
            Cow::Owned(self.text.replace('$', "\\$"))
        } else {
            Cow::Borrowed(&self.text)
        }
    }
}

/// Runs shell commands and numbers each call.
#[derive(Debug, Default)]
pub struct Executor {
    call_count: u64,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands run so far.
    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Run `command` and wait for it to exit.
    ///
    /// Output that is not valid UTF-8 is dropped rather than failing the call.
    pub fn run(&mut self, command: &ShellCommand) -> YbResult<CommandResult> {
        self.call_count += 1;
        let cmd_id = self.call_count;

        info!("Executing: {}", command.text());
        debug!(cmd_id, "--Cmd Id({}) Executing--\n{}", cmd_id, command.text());

        let mut child = Command::new("sh");
        child.arg("-c").arg(command.shell_text().as_ref());
        for (key, value) in &command.env {
            match value {
                Some(value) => child.env(key, value),
                None => child.env_remove(key),
            };
        }

        let start = Instant::now();
        let output = child.output()?;
        // killed by a signal
        let exit_code = output.status.code().unwrap_or(1);
        let result = CommandResult::new(exit_code, decode(&output.stdout), decode(&output.stderr));

        debug!(
            cmd_id,
            exit_code,
            "--Cmd Id({}) Execution duration {:?}",
            cmd_id,
            start.elapsed()
        );
        trace!(cmd_id, "--Stdout--\n{}", result.stdout().trim_end());
        trace!(cmd_id, "--Stderr--\n{}", result.stderr().trim_end());

        Ok(result)
    }
}

fn decode(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dollar() {
        let cmd = ShellCommand::new("echo $HOME");
        assert_eq!(cmd.shell_text(), "echo \\$HOME");
        let cmd = ShellCommand::new("echo $HOME").escape_dollar(false);
        assert_eq!(cmd.shell_text(), "echo $HOME");
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        assert_eq!(decode(b"ab\xffc\xfe"), "abc");
        assert_eq!(decode("héllo".as_bytes()), "héllo");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_output() {
        let mut executor = Executor::new();
        let result = executor
            .run(&ShellCommand::new("echo out; echo err 1>&2; exit 3"))
            .unwrap();
        assert_eq!(result.exit_code(), 3);
        assert_eq!(result.stdout(), "out\n");
        assert_eq!(result.stderr(), "err\n");
        assert_eq!(executor.call_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_dollar_reaches_program_literally() {
        let mut executor = Executor::new();
        let result = executor.run(&ShellCommand::new("echo $$A$$")).unwrap();
        assert_eq!(result.stdout(), "$$A$$\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_child_env() {
        let mut executor = Executor::new();
        let cmd = ShellCommand::new("echo \"${YBEASY_TEST_HOST}\"")
            .escape_dollar(false)
            .env("YBEASY_TEST_HOST", Some("yb89".into()));
        assert_eq!(executor.run(&cmd).unwrap().stdout(), "yb89\n");
        assert!(std::env::var("YBEASY_TEST_HOST").is_err());
        assert_eq!(executor.call_count(), 1);
    }
}
