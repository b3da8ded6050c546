//! Delimited list splitting that respects quote and bracket nesting.
//!
//! Used to split stored procedure parameter lists such as
//! `a_name VARCHAR(128), a_sizes VARCHAR DEFAULT '(1,2)'` on top-level
//! commas only.
//!
//! Escape characters are not supported: `'it\'s'` is read as a closed
//! quote followed by an unterminated one.

use crate::error::{YbError, YbResult};

/// Opening character and its matching closer.
const PAIRS: [(char, char); 5] = [('\'', '\''), ('"', '"'), ('(', ')'), ('[', ']'), ('{', '}')];

fn closer_for(open: char) -> Option<char> {
    PAIRS.iter().find(|(o, _)| *o == open).map(|(_, c)| *c)
}

fn is_closer(ch: char) -> bool {
    PAIRS.iter().any(|(_, c)| *c == ch)
}

fn is_quote(ch: char) -> bool {
    matches!(ch, '\'' | '"')
}

/// Split `text` on `delim`, ignoring delimiters inside open pairs.
///
/// Every token is trimmed. The final token is always emitted, so
/// `"a,"` yields `["a", ""]` and an empty string yields `[""]`.
/// Unbalanced input fails without returning partial tokens.
pub fn split(text: &str, delim: char) -> YbResult<Vec<String>> {
    let mut open: Vec<char> = Vec::new();
    let mut tokens = Vec::new();
    let mut token = String::new();

    for ch in text.chars() {
        if open.is_empty() && ch == delim {
            tokens.push(token.trim().to_string());
            token.clear();
        } else {
            token.push(ch);
        }

        // a quote already on top of the stack closes itself
        let toggles_quote = is_quote(ch) && open.last() == Some(&ch);

        if closer_for(ch).is_some() && !toggles_quote {
            open.push(ch);
        } else if is_closer(ch) {
            match open.last().and_then(|top| closer_for(*top)) {
                Some(expected) if expected == ch => {
                    open.pop();
                }
                _ => return Err(YbError::MalformedInput(text.to_string())),
            }
        }
    }

    if !open.is_empty() {
        return Err(YbError::MalformedInput(text.to_string()));
    }
    tokens.push(token.trim().to_string());

    Ok(tokens)
}
