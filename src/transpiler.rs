//! Stored procedure to anonymous block transpiler.
//!
//! Turns a procedure source file into a one-shot `DO $$ ... $$;` block so
//! the procedure can be run without being installed. Arguments become
//! `DECLARE` assignments and the `RETURN` becomes a `RAISE INFO` tagged
//! with [`RETURN_MARKER`], which [`recover_return`] picks back out of the
//! client's stderr.

use crate::error::{YbError, YbResult};
use crate::procedure::{ProcedureSignature, ReturnType};
use crate::result::{CommandResult, ProcReturn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tags the diagnostic line carrying the procedure return value.
pub const RETURN_MARKER: &str = ">!>RETURN<!<:";

const INFO_PREFIX: &str = "INFO:  ";

/// Rendering of a NULL value in `RAISE INFO` output.
const NULL_VALUE: &str = "<NULL>";

/// Argument types bound as bare literals.
const LITERAL_TYPES: [&str; 5] = ["BOOLEAN", "BIGINT", "INT", "INTEGER", "SMALLINT"];

/// Value bound to a procedure argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    /// Emitted as-is: dollar-quoted for VARCHAR, bare otherwise.
    Str(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        ArgValue::Int(v as i64)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

/// Caller supplied argument values keyed by argument name.
pub type ProcArgs = BTreeMap<String, ArgValue>;

/// A transpiled procedure ready to send to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousBlock {
    pub procedure: String,
    pub return_type: ReturnType,
    pub sql: String,
}

/// Loads procedure sources from `<install_dir>/sql/<name>.sql`.
#[derive(Debug, Clone)]
pub struct Transpiler {
    sql_dir: PathBuf,
}

impl Transpiler {
    pub fn new(install_dir: impl AsRef<Path>) -> Self {
        Self {
            sql_dir: install_dir.as_ref().join("sql"),
        }
    }

    pub fn procedure_path(&self, procedure: &str) -> PathBuf {
        self.sql_dir.join(format!("{}.sql", procedure))
    }

    /// Read and parse a procedure source file.
    pub fn load(&self, procedure: &str) -> YbResult<ProcedureSignature> {
        let path = self.procedure_path(procedure);
        let source = std::fs::read_to_string(&path)
            .map_err(|source| YbError::ReadFile { path, source })?;
        ProcedureSignature::parse(procedure, &source)
    }

    /// Build the anonymous block for `procedure` with `args` bound.
    pub fn transpile(
        &self,
        procedure: &str,
        args: &ProcArgs,
        pre_sql: &str,
        post_sql: &str,
    ) -> YbResult<AnonymousBlock> {
        let signature = self.load(procedure)?;
        let sql = anonymous_block(&signature, args, pre_sql, post_sql)?;
        debug!(procedure, "transpiled to {} bytes", sql.len());

        Ok(AnonymousBlock {
            procedure: signature.name,
            return_type: signature.return_type,
            sql,
        })
    }
}

/// Emit the anonymous block for a parsed procedure.
pub fn anonymous_block(
    signature: &ProcedureSignature,
    args: &ProcArgs,
    pre_sql: &str,
    post_sql: &str,
) -> YbResult<String> {
    let mut block = format!(
        "{}--proc: {}\nDO $$\nDECLARE\n    --arguments\n",
        pre_sql, signature.name
    );

    for arg in &signature.args {
        match (args.get(&arg.name), &arg.default) {
            (Some(value), _) => {
                let arg_type = arg.arg_type.to_ascii_uppercase();
                if arg_type == "VARCHAR" {
                    block.push_str(&format!(
                        "    {} {}{} = $A${}$A$;\n",
                        arg.name, arg.arg_type, arg.type_size, value
                    ));
                } else if LITERAL_TYPES.contains(&arg_type.as_str()) {
                    block.push_str(&format!("    {} {} = {};\n", arg.name, arg.arg_type, value));
                } else {
                    return Err(YbError::UnsupportedArgType(arg.arg_type.clone()));
                }
            }
            (None, Some(default)) => {
                block.push_str(&format!("    {} {} = {};\n", arg.name, arg.arg_type, default));
            }
            (None, None) => {
                return Err(YbError::MissingArgument {
                    arg: arg.name.clone(),
                    procedure: signature.name.clone(),
                });
            }
        }
    }

    block.push_str(&format!(
        "    --variables\n    {}RAISE INFO '{}%', {};{}$$;{}",
        signature.before_return, RETURN_MARKER, signature.return_expr, signature.after_return, post_sql
    ));

    Ok(block)
}

/// Pull the procedure return value out of the client's stderr.
///
/// `RAISE INFO` output arrives on stderr. The marker line yields the
/// return value, other `INFO:` lines lose their prefix and every stderr
/// line is appended to stdout. Without a marker line the stderr is a real
/// error.
pub fn recover_return(result: CommandResult, return_type: ReturnType) -> YbResult<CommandResult> {
    if result.stderr().trim().is_empty() {
        return Ok(result);
    }

    let sentinel = format!("{}{}", INFO_PREFIX, RETURN_MARKER);
    let mut return_value: Option<&str> = None;
    let mut stdout_lines: Vec<&str> = Vec::new();
    for line in result.stderr().split('\n') {
        if let Some(value) = line.strip_prefix(&sentinel) {
            return_value = Some(value.trim());
        } else if let Some(info) = line.strip_prefix(INFO_PREFIX) {
            stdout_lines.push(info);
        } else {
            stdout_lines.push(line);
        }
    }

    let Some(return_value) = return_value.filter(|v| !v.is_empty()) else {
        return Err(YbError::Execution {
            exit_code: result.exit_code(),
            stderr: result.stderr().to_string(),
        });
    };

    let proc_return = coerce_return(return_value, return_type)?;
    let stdout = format!("{}{}", result.stdout(), stdout_lines.join("\n"));

    Ok(CommandResult::new(result.exit_code(), stdout, "").with_proc_return(proc_return))
}

fn coerce_return(value: &str, return_type: ReturnType) -> YbResult<Option<ProcReturn>> {
    if return_type.is_integer() {
        if value == NULL_VALUE {
            return Ok(None);
        }
        return value
            .parse::<i64>()
            .map(|n| Some(ProcReturn::Int(n)))
            .map_err(|_| YbError::InvalidReturnValue(value.to_string()));
    }

    Ok(match value {
        "t" => Some(ProcReturn::Bool(true)),
        "f" => Some(ProcReturn::Bool(false)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FLAG_PROC: &str = "CREATE OR REPLACE PROCEDURE flag_p(a_x BOOLEAN DEFAULT TRUE)
    RETURNS BOOLEAN
    LANGUAGE plpgsql
    AS $$
BEGIN
    RETURN a_x;
END $$;";

    fn flag_signature() -> ProcedureSignature {
        ProcedureSignature::parse("flag_p", FLAG_PROC).unwrap()
    }

    #[test]
    fn test_default_argument() {
        let block = anonymous_block(&flag_signature(), &ProcArgs::new(), "", "").unwrap();
        assert_eq!(
            block,
            "--proc: flag_p\nDO $$\nDECLARE\n    --arguments\n    a_x BOOLEAN = TRUE;\n    \
             --variables\n    RAISE INFO '>!>RETURN<!<:%', a_x;\nEND $$;"
        );
    }

    #[test]
    fn test_supplied_argument() {
        let args = ProcArgs::from([("a_x".to_string(), ArgValue::from(false))]);
        let block = anonymous_block(&flag_signature(), &args, "", "").unwrap();
        assert!(block.contains("    a_x BOOLEAN = FALSE;\n"));
        assert!(!block.contains("= TRUE"));
    }

    #[test]
    fn test_varchar_is_dollar_quoted() {
        let source = "CREATE PROCEDURE dml_p(a_dml VARCHAR(64000), a_rows BIGINT)
RETURNS INT LANGUAGE plpgsql AS $$
DECLARE
    v_ct INT := 0;
BEGIN
    EXECUTE a_dml;
    RETURN a_rows;
END $$;";
        let signature = ProcedureSignature::parse("dml_p", source).unwrap();
        let args = ProcArgs::from([
            ("a_dml".to_string(), ArgValue::from("DELETE FROM t WHERE c = 'x'")),
            ("a_rows".to_string(), ArgValue::from(100)),
        ]);
        let block = anonymous_block(&signature, &args, "SET x TO 1;\n", "\nSELECT 1;").unwrap();

        assert!(block.starts_with("SET x TO 1;\n--proc: dml_p\nDO $$\n"));
        assert!(block.contains("    a_dml VARCHAR(64000) = $A$DELETE FROM t WHERE c = 'x'$A$;\n"));
        assert!(block.contains("    a_rows BIGINT = 100;\n"));
        assert!(block.contains("    --variables\n    v_ct INT := 0;\nBEGIN\n    EXECUTE a_dml;\n    RAISE INFO '>!>RETURN<!<:%', a_rows;"));
        assert!(block.ends_with("END $$;\nSELECT 1;"));
    }

    #[test]
    fn test_missing_argument() {
        let source = "CREATE PROCEDURE p(a_t VARCHAR) RETURNS BOOLEAN LANGUAGE plpgsql AS $$ BEGIN RETURN TRUE; END $$;";
        let signature = ProcedureSignature::parse("p", source).unwrap();
        assert!(matches!(
            anonymous_block(&signature, &ProcArgs::new(), "", ""),
            Err(YbError::MissingArgument { arg, .. }) if arg == "a_t"
        ));
    }

    #[test]
    fn test_unsupported_argument_type() {
        let source = "CREATE PROCEDURE p(a_d DATE) RETURNS BOOLEAN LANGUAGE plpgsql AS $$ BEGIN RETURN TRUE; END $$;";
        let signature = ProcedureSignature::parse("p", source).unwrap();
        let args = ProcArgs::from([("a_d".to_string(), ArgValue::from("'2021-01-01'"))]);
        assert!(matches!(
            anonymous_block(&signature, &args, "", ""),
            Err(YbError::UnsupportedArgType(t)) if t == "DATE"
        ));
    }

    #[test]
    fn test_recover_integer_return() {
        let result = CommandResult::new(0, "rows\n", "INFO:  >!>RETURN<!<:5");
        let recovered = recover_return(result, ReturnType::Int).unwrap();
        assert_eq!(recovered.proc_return(), Some(ProcReturn::Int(5)));
        assert_eq!(recovered.stdout(), "rows\n");
        assert_eq!(recovered.stderr(), "");
    }

    #[test]
    fn test_recover_moves_info_to_stdout() {
        let stderr = "INFO:  chunk 1\nINFO:  >!>RETURN<!<:t\nNOTICE:  done\n";
        let result = CommandResult::new(0, "", stderr);
        let recovered = recover_return(result, ReturnType::Boolean).unwrap();
        assert_eq!(recovered.proc_return(), Some(ProcReturn::Bool(true)));
        assert_eq!(recovered.stdout(), "chunk 1\nNOTICE:  done\n");
    }

    #[test]
    fn test_recover_null_returns() {
        let result = CommandResult::new(0, "", "INFO:  >!>RETURN<!<:<NULL>\n");
        let recovered = recover_return(result, ReturnType::Boolean).unwrap();
        assert_eq!(recovered.proc_return(), None);

        let result = CommandResult::new(0, "", "INFO:  >!>RETURN<!<:<NULL>\n");
        let recovered = recover_return(result, ReturnType::BigInt).unwrap();
        assert_eq!(recovered.proc_return(), None);

        let result = CommandResult::new(0, "", "INFO:  >!>RETURN<!<:f");
        let recovered = recover_return(result, ReturnType::Boolean).unwrap();
        assert_eq!(recovered.proc_return(), Some(ProcReturn::Bool(false)));
    }

    #[test]
    fn test_recover_genuine_error() {
        let result = CommandResult::new(3, "", "ERROR:  relation \"t\" does not exist\n");
        let err = recover_return(result, ReturnType::Boolean).unwrap_err();
        assert!(matches!(err, YbError::Execution { exit_code: 3, .. }));
    }

    #[test]
    fn test_recover_bad_integer() {
        let result = CommandResult::new(0, "", "INFO:  >!>RETURN<!<:abc");
        assert!(matches!(
            recover_return(result, ReturnType::Integer),
            Err(YbError::InvalidReturnValue(v)) if v == "abc"
        ));
    }

    #[test]
    fn test_recover_empty_stderr_passthrough() {
        let result = CommandResult::new(0, "x", "  \n");
        let recovered = recover_return(result.clone(), ReturnType::Boolean).unwrap();
        assert_eq!(recovered, result);
    }
}
