//! `@file` argument files.
//!
//! An argument file holds command line arguments, one or more per line:
//!
//! ```text
//! # connection
//! --host yb89 --dbuser dze
//! --dml """DELETE FROM sales
//! WHERE <chunk_where_clause>"""
//! ```
//!
//! Lines starting with `#` are comments. Text between a pair of `"""` is
//! one argument, newlines included. Everything else is split like a shell
//! would split it.

use crate::error::{YbError, YbResult};
use crate::parser::shell_words;
use std::collections::VecDeque;
use std::path::Path;

const HARD_QUOTE: &str = "\"\"\"";

/// Nesting limit for argument files that reference other argument files.
const MAX_DEPTH: usize = 16;

/// Line-at-a-time lexer for argument files.
#[derive(Debug, Default)]
pub struct ArgFileLexer {
    in_quote: bool,
    buffer: String,
    pending: VecDeque<String>,
}

impl ArgFileLexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any state from a previous file.
    pub fn reset(&mut self) {
        self.in_quote = false;
        self.buffer.clear();
        self.pending.clear();
    }

    /// Feed one line (without its newline) and take the completed arguments.
    pub fn feed(&mut self, line: &str) -> YbResult<Vec<String>> {
        if !self.in_quote && line.starts_with('#') {
            return Ok(self.pending.drain(..).collect());
        }

        if self.in_quote {
            self.buffer.push('\n');
        }

        let mut rest = line;
        let mut args_str = String::new();
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix(HARD_QUOTE) {
                rest = after;
                self.in_quote = !self.in_quote;
                if self.in_quote {
                    self.buffer.clear();
                    self.push_words(&args_str)?;
                    args_str.clear();
                } else if !self.buffer.is_empty() {
                    let literal = std::mem::take(&mut self.buffer);
                    self.pending.push_back(literal);
                }
                continue;
            }

            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                if self.in_quote {
                    self.buffer.push(ch);
                } else {
                    args_str.push(ch);
                }
            }
            rest = chars.as_str();
        }
        self.push_words(&args_str)?;

        Ok(self.pending.drain(..).collect())
    }

    /// Check that the file did not end inside a `"""` literal.
    pub fn finish(&mut self) -> YbResult<()> {
        if self.in_quote {
            self.reset();
            return Err(YbError::MalformedInput(
                "unterminated \"\"\" argument".to_string(),
            ));
        }
        Ok(())
    }

    fn push_words(&mut self, text: &str) -> YbResult<()> {
        if !text.is_empty() {
            self.pending.extend(shell_words(text)?);
        }
        Ok(())
    }
}

/// Read an argument file into its arguments.
pub fn read_arg_file(path: &Path) -> YbResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| YbError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut lexer = ArgFileLexer::new();
    let mut args = Vec::new();
    for line in content.lines() {
        args.extend(lexer.feed(line)?);
    }
    lexer.finish()?;

    Ok(args)
}

/// Replace every `@path` argument with the contents of that file.
///
/// The first argument (the program name) is never expanded.
pub fn expand_args<I>(args: I) -> YbResult<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut out: Vec<String> = args.next().into_iter().collect();
    expand_into(args, &mut out, 0)?;
    Ok(out)
}

fn expand_into<I>(args: I, out: &mut Vec<String>, depth: usize) -> YbResult<()>
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        match arg.strip_prefix('@') {
            Some(path) if !path.is_empty() => {
                if depth >= MAX_DEPTH {
                    return Err(YbError::MalformedInput(format!(
                        "argument files nested too deeply at @{}",
                        path
                    )));
                }
                let nested = read_arg_file(Path::new(path))?;
                expand_into(nested, out, depth + 1)?;
            }
            _ => out.push(arg),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(lines: &[&str]) -> Vec<String> {
        let mut lexer = ArgFileLexer::new();
        let mut args = Vec::new();
        for line in lines {
            args.extend(lexer.feed(line).unwrap());
        }
        lexer.finish().unwrap();
        args
    }

    #[test]
    fn test_plain_lines() {
        assert_eq!(
            lex(&["--host yb89", "# comment", "--dbuser 'd z'"]),
            vec!["--host", "yb89", "--dbuser", "d z"]
        );
    }

    #[test]
    fn test_multi_line_literal() {
        assert_eq!(
            lex(&[
                "--dml \"\"\"DELETE FROM sales",
                "# not a comment",
                "WHERE <chunk_where_clause>\"\"\" --execute_chunk_dml",
            ]),
            vec![
                "--dml",
                "DELETE FROM sales\n# not a comment\nWHERE <chunk_where_clause>",
                "--execute_chunk_dml",
            ]
        );
    }

    #[test]
    fn test_literals_do_not_accumulate() {
        assert_eq!(
            lex(&["--a \"\"\"one\"\"\" --b \"\"\"two\"\"\""]),
            vec!["--a", "one", "--b", "two"]
        );
    }

    #[test]
    fn test_unterminated_literal() {
        let mut lexer = ArgFileLexer::new();
        assert!(lexer.feed("--dml \"\"\"DELETE").unwrap() == vec!["--dml"]);
        assert!(lexer.in_quote);
        assert!(lexer.finish().is_err());
        assert!(!lexer.in_quote);
    }

    #[test]
    fn test_reset() {
        let mut lexer = ArgFileLexer::new();
        lexer.feed("\"\"\"open").unwrap();
        lexer.reset();
        assert_eq!(lexer.feed("--x y").unwrap(), vec!["--x", "y"]);
    }

    #[test]
    fn test_expand_args() {
        let dir = tempfile::tempdir().unwrap();
        let conn = dir.path().join("conn.args");
        std::fs::write(&conn, "--host yb89\n--dbuser dze\n").unwrap();

        let argv = vec![
            "ybeasy".to_string(),
            format!("@{}", conn.display()),
            "query".to_string(),
            "SELECT 1".to_string(),
        ];
        assert_eq!(
            expand_args(argv).unwrap(),
            vec!["ybeasy", "--host", "yb89", "--dbuser", "dze", "query", "SELECT 1"]
        );
    }

    #[test]
    fn test_expand_missing_file() {
        let argv = vec!["ybeasy".to_string(), "@/nonexistent/args".to_string()];
        assert!(matches!(expand_args(argv), Err(YbError::ReadFile { .. })));
    }
}
