//! Stored procedure source parsing.
//!
//! Procedures shipped with the tools follow one fixed shape:
//!
//! ```sql
//! CREATE OR REPLACE PROCEDURE name(a_x BOOLEAN DEFAULT TRUE, a_t VARCHAR(128))
//!     RETURNS BOOLEAN
//!     LANGUAGE plpgsql
//!     AS $$
//! DECLARE
//!     ...
//! BEGIN
//!     ...
//!     RETURN <expr>;
//! END $$;
//! ```
//!
//! This is not a general SQL parser; anything else fails to parse.

use crate::error::{YbError, YbResult};
use crate::parser::parse_arg_definition;
use crate::tokenizer;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static PROCEDURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)\s*(?:CREATE\s*(?:OR\s*REPLACE)?\s*)?PROCEDURE\s*([a-z0-9_]+)\s*\((.*?)\)\s*RETURNS\s*([a-z]*).*?\s+LANGUAGE.+?(?:DECLARE\s*(.+))?RETURN\s*([^;]*);(.*)\$\$;",
    )
    .expect("procedure pattern is valid")
});

static DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(.*)\bDEFAULT\b(.*)$").expect("default pattern is valid")
});

/// Scalar return types a transpiled procedure may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Boolean,
    BigInt,
    Int,
    Integer,
    SmallInt,
}

impl ReturnType {
    pub fn is_integer(&self) -> bool {
        !matches!(self, Self::Boolean)
    }
}

impl FromStr for ReturnType {
    type Err = YbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BOOLEAN" => Ok(Self::Boolean),
            "BIGINT" => Ok(Self::BigInt),
            "INT" => Ok(Self::Int),
            "INTEGER" => Ok(Self::Integer),
            "SMALLINT" => Ok(Self::SmallInt),
            _ => Err(YbError::UnsupportedReturnType(s.to_string())),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "BOOLEAN",
            Self::BigInt => "BIGINT",
            Self::Int => "INT",
            Self::Integer => "INTEGER",
            Self::SmallInt => "SMALLINT",
        };
        f.write_str(name)
    }
}

/// One entry of the procedure parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcArg {
    pub name: String,
    pub arg_type: String,
    pub type_size: String,
    pub default: Option<String>,
}

impl ProcArg {
    fn parse(procedure: &str, token: &str) -> YbResult<Self> {
        let (definition, default) = match DEFAULT_RE.captures(token) {
            Some(caps) => {
                let default = caps[2].trim();
                (
                    caps.get(1).map_or("", |m| m.as_str()),
                    (!default.is_empty()).then(|| default.to_string()),
                )
            }
            None => (token, None),
        };

        let def = parse_arg_definition(procedure, definition)?;
        Ok(Self {
            name: def.name.to_string(),
            arg_type: def.arg_type.to_string(),
            type_size: def.type_size.to_string(),
            default,
        })
    }
}

/// A parsed stored procedure, split around its `RETURN` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureSignature {
    pub name: String,
    pub args: Vec<ProcArg>,
    pub return_type: ReturnType,
    /// Body text after `DECLARE` up to the `RETURN`.
    pub before_return: String,
    pub return_expr: String,
    /// Body text after the `RETURN` statement up to the closing `$$;`.
    pub after_return: String,
}

impl ProcedureSignature {
    /// Parse procedure source text.
    ///
    /// `procedure` names the source in error messages.
    pub fn parse(procedure: &str, source: &str) -> YbResult<Self> {
        let caps = PROCEDURE_RE
            .captures(source)
            .ok_or_else(|| YbError::proc_parse(procedure, "regex parse failed"))?;

        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());

        let return_type: ReturnType = group(3).parse()?;

        let arg_list = group(2);
        let args = if arg_list.trim().is_empty() {
            Vec::new()
        } else {
            tokenizer::split(arg_list, ',')?
                .iter()
                .map(|token| ProcArg::parse(procedure, token))
                .collect::<YbResult<Vec<_>>>()?
        };

        Ok(Self {
            name: group(1).to_string(),
            args,
            return_type,
            before_return: group(4).to_string(),
            return_expr: group(5).to_string(),
            after_return: group(6).to_string(),
        })
    }
}
