//! SQL filter clause construction.
//!
//! Sub-clauses are emitted in role order (required single, optional
//! single, optional multi) and joined with `AND` on a new line, so the
//! clause can be dropped straight after a `WHERE`:
//!
//! ```text
//! tablename = 'orders'
//!     AND (owner IN ('dze') OR owner LIKE 'etl%')
//!     AND schemaname = CURRENT_SCHEMA
//! ```

use super::{ColumnMapping, FilterArgs, MultiFilter, ObjectType};
use std::collections::BTreeSet;

impl FilterArgs {
    /// Build the SQL filter clause for the mapped object types.
    ///
    /// Only object types present in both the configured roles and
    /// `columns` contribute. An unconstrained result is the literal `TRUE`.
    /// With `escape_quotes` every `'` is doubled for embedding the clause
    /// in a single-quoted SQL string.
    pub fn build_sql_filter(&self, columns: &ColumnMapping, indent: &str, escape_quotes: bool) -> String {
        let mut and_clauses: Vec<String> = Vec::new();

        let singles = self
            .roles
            .required_single()
            .iter()
            .chain(self.roles.optional_single());
        for otype in singles {
            if let Some(column) = columns.get(otype) {
                and_clauses.push(single_clause(column, self.single_value(*otype)));
            }
        }

        for otype in self.roles.optional_multi() {
            if let Some(column) = columns.get(otype) {
                let multi = self.selection(*otype).and_then(|s| s.multi());
                and_clauses.push(multi_clause(column, multi, indent));
            }
        }

        if let Some(column) = columns.get(&ObjectType::Schema) {
            if self.uses_current_schema() {
                and_clauses.push(format!("{} = CURRENT_SCHEMA", column));
            }
        }

        let clause = if and_clauses.is_empty() {
            "TRUE".to_string()
        } else {
            and_clauses.join(&and_joiner(indent))
        };

        if escape_quotes {
            clause.replace('\'', "''")
        } else {
            clause
        }
    }

    /// Build the filter clause with the default four space indent.
    pub fn sql_filter(&self, columns: &ColumnMapping) -> String {
        self.build_sql_filter(columns, "    ", false)
    }

    /// No schema filter of any kind was given.
    fn uses_current_schema(&self) -> bool {
        if self.has_multi_set(ObjectType::Schema) {
            return false;
        }
        let single_role = self.roles.required_single().contains(&ObjectType::Schema)
            || self.roles.optional_single().contains(&ObjectType::Schema);
        !(single_role && self.single_value(ObjectType::Schema).is_some())
    }
}

fn and_joiner(indent: &str) -> String {
    format!("\n{}AND ", indent)
}

fn single_clause(column: &str, value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => format!("{} = '{}'", column, value),
        _ => "TRUE".to_string(),
    }
}

fn multi_clause(column: &str, multi: Option<&MultiFilter>, indent: &str) -> String {
    let Some(multi) = multi else {
        return "TRUE".to_string();
    };

    let mut or_clauses: Vec<String> = Vec::new();
    let mut and_clauses: Vec<String> = Vec::new();

    if !multi.in_list.is_empty() {
        or_clauses.push(format!("{} IN ({})", column, quote_list(&multi.in_list)));
    }
    for pattern in &multi.like_patterns {
        or_clauses.push(format!("{} LIKE '{}'", column, pattern));
    }
    if !or_clauses.is_empty() {
        and_clauses.push(format!("({})", or_clauses.join(" OR ")));
    }

    if !multi.not_in_list.is_empty() {
        and_clauses.push(format!(
            "{} NOT IN ({})",
            column,
            quote_list(&multi.not_in_list)
        ));
    }
    for pattern in &multi.not_like_patterns {
        and_clauses.push(format!("{} NOT LIKE '{}'", column, pattern));
    }

    if and_clauses.is_empty() {
        "TRUE".to_string()
    } else {
        and_clauses.join(&and_joiner(indent))
    }
}

/// Quote list members as string literals.
///
/// A member given as a double-quoted identifier (`"MixedCase"`) is passed
/// through with its double quotes turned into single quotes.
fn quote_list(names: &BTreeSet<String>) -> String {
    names
        .iter()
        .map(|name| {
            if name.starts_with('"') {
                name.replace('"', "'")
            } else {
                format!("'{}'", name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
