//! Small nom parsers.
//!
//! - procedure argument definitions: `a_table VARCHAR(128)` into name,
//!   type and type size
//! - shell style word splitting for argument files
//!
//! ```text
//! a_name   VARCHAR   (128)
//! ──┬───   ───┬───   ──┬──
//!   │         │        └── size (everything after the type words)
//!   │         └── type (letters and spaces)
//!   └── name (letters, digits, underscores)
//! ```

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while, take_while1},
    character::complete::{anychar, char, multispace0},
    combinator::map,
    multi::{many0, many1},
    sequence::{delimited, preceded, terminated},
    IResult,
};

use crate::error::{YbError, YbResult};

/// A procedure argument definition without its `DEFAULT` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDefinition<'a> {
    pub name: &'a str,
    pub arg_type: &'a str,
    pub type_size: &'a str,
}

/// Parse `name type[size]` from a procedure parameter list entry.
pub fn parse_arg_definition<'a>(procedure: &str, input: &'a str) -> YbResult<ArgDefinition<'a>> {
    match arg_definition(input.trim()) {
        Ok((_, def)) => Ok(def),
        Err(e) => Err(YbError::proc_parse(
            procedure,
            format!("invalid argument definition '{}': {:?}", input.trim(), e),
        )),
    }
}

fn arg_definition(input: &str) -> IResult<&str, ArgDefinition<'_>> {
    let (input, name) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, arg_type) = take_while1(|c: char| c.is_ascii_alphabetic() || c == ' ')(input)?;

    Ok((
        "",
        ArgDefinition {
            name,
            arg_type: arg_type.trim(),
            type_size: input.trim(),
        },
    ))
}

/// Split a line into words the way a POSIX shell would.
///
/// Single quotes are literal, double quotes honour `\\`, `\"`, `\$` and
/// `` \` `` escapes, and a bare backslash escapes the next character.
pub fn shell_words(input: &str) -> YbResult<Vec<String>> {
    match words(input) {
        Ok(("", words)) => Ok(words),
        Ok((remaining, _)) => Err(YbError::MalformedInput(format!(
            "No closing quotation: {}",
            remaining
        ))),
        Err(e) => Err(YbError::MalformedInput(format!("{:?}", e))),
    }
}

fn words(input: &str) -> IResult<&str, Vec<String>> {
    preceded(multispace0, many0(terminated(word, multispace0)))(input)
}

fn word(input: &str) -> IResult<&str, String> {
    map(
        many1(alt((single_quoted, double_quoted, bare_escape, bare))),
        |pieces: Vec<String>| pieces.concat(),
    )(input)
}

fn single_quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        String::from,
    )(input)
}

fn double_quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            many0(alt((map(is_not("\\\""), String::from), double_quoted_escape))),
            char('"'),
        ),
        |pieces: Vec<String>| pieces.concat(),
    )(input)
}

fn double_quoted_escape(input: &str) -> IResult<&str, String> {
    map(preceded(char('\\'), anychar), |c| match c {
        '\\' | '"' | '$' | '`' | '\n' => c.to_string(),
        other => format!("\\{}", other),
    })(input)
}

fn bare_escape(input: &str) -> IResult<&str, String> {
    map(preceded(char('\\'), anychar), |c| c.to_string())(input)
}

fn bare(input: &str) -> IResult<&str, String> {
    map(is_not(" \t\r\n'\"\\"), String::from)(input)
}
