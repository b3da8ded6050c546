//! Database object filters.
//!
//! A utility declares which object types it can filter and in which role
//! (required single value, optional single value, optional multi value).
//! The argument layer then records the selections in [`FilterArgs`], and
//! [`FilterArgs::build_sql_filter`] compiles them into a SQL predicate.

pub mod builder;

use crate::error::{YbError, YbResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A kind of database object that can be filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Database,
    Schema,
    Owner,
    Table,
    View,
    Column,
    Sequence,
    StoredProc,
    Object,
}

impl ObjectType {
    pub const ALL: [ObjectType; 9] = [
        Self::Database,
        Self::Schema,
        Self::Owner,
        Self::Table,
        Self::View,
        Self::Column,
        Self::Sequence,
        Self::StoredProc,
        Self::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Schema => "schema",
            Self::Owner => "owner",
            Self::Table => "table",
            Self::View => "view",
            Self::Column => "column",
            Self::Sequence => "sequence",
            Self::StoredProc => "stored_proc",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = YbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "db" => Ok(Self::Database),
            other => Self::ALL
                .into_iter()
                .find(|otype| otype.as_str() == other)
                .ok_or_else(|| YbError::InvalidFilter(format!("unknown object type '{}'", s))),
        }
    }
}

/// Filter role assignment for a utility.
///
/// Each object type belongs to at most one role. `schema` listed as
/// required or multi is dropped from the optional single role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRoles {
    required_single: Vec<ObjectType>,
    optional_single: Vec<ObjectType>,
    optional_multi: Vec<ObjectType>,
}

impl Default for FilterRoles {
    /// Every utility can be scoped to a single schema unless told otherwise.
    fn default() -> Self {
        Self {
            required_single: Vec::new(),
            optional_single: vec![ObjectType::Schema],
            optional_multi: Vec::new(),
        }
    }
}

impl FilterRoles {
    pub fn new(
        required_single: impl IntoIterator<Item = ObjectType>,
        optional_single: impl IntoIterator<Item = ObjectType>,
        optional_multi: impl IntoIterator<Item = ObjectType>,
    ) -> YbResult<Self> {
        let required_single: Vec<ObjectType> = dedup(required_single);
        let optional_multi: Vec<ObjectType> = dedup(optional_multi);
        let schema_claimed = required_single.contains(&ObjectType::Schema)
            || optional_multi.contains(&ObjectType::Schema);
        let optional_single: Vec<ObjectType> = dedup(optional_single)
            .into_iter()
            .filter(|otype| !(schema_claimed && *otype == ObjectType::Schema))
            .collect();

        for otype in ObjectType::ALL {
            let roles = [&required_single, &optional_single, &optional_multi]
                .iter()
                .filter(|role| role.contains(&otype))
                .count();
            if roles > 1 {
                return Err(YbError::InvalidFilter(format!(
                    "object type '{}' is assigned to more than one filter role",
                    otype
                )));
            }
        }

        Ok(Self {
            required_single,
            optional_single,
            optional_multi,
        })
    }

    pub fn required_single(&self) -> &[ObjectType] {
        &self.required_single
    }

    pub fn optional_single(&self) -> &[ObjectType] {
        &self.optional_single
    }

    pub fn optional_multi(&self) -> &[ObjectType] {
        &self.optional_multi
    }

    pub fn is_single(&self, otype: ObjectType) -> bool {
        self.required_single.contains(&otype) || self.optional_single.contains(&otype)
    }

    pub fn is_multi(&self, otype: ObjectType) -> bool {
        self.optional_multi.contains(&otype)
    }
}

fn dedup(types: impl IntoIterator<Item = ObjectType>) -> Vec<ObjectType> {
    let mut out = Vec::new();
    for otype in types {
        if !out.contains(&otype) {
            out.push(otype);
        }
    }
    out
}

/// The four multi-valued filter sets. Each set is sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiFilter {
    pub in_list: BTreeSet<String>,
    pub not_in_list: BTreeSet<String>,
    pub like_patterns: BTreeSet<String>,
    pub not_like_patterns: BTreeSet<String>,
}

impl MultiFilter {
    pub fn is_set(&self) -> bool {
        !(self.in_list.is_empty()
            && self.not_in_list.is_empty()
            && self.like_patterns.is_empty()
            && self.not_like_patterns.is_empty())
    }
}

/// Which of the four multi-valued sets a value goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiKind {
    In,
    NotIn,
    Like,
    NotLike,
}

/// The requested filter for one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSelection {
    Single(Option<String>),
    Multi(MultiFilter),
}

impl FilterSelection {
    /// Single value, `None` when unset or when this is a multi selection.
    pub fn single_value(&self) -> Option<&str> {
        match self {
            Self::Single(value) => value.as_deref(),
            Self::Multi(_) => None,
        }
    }

    pub fn multi(&self) -> Option<&MultiFilter> {
        match self {
            Self::Multi(multi) => Some(multi),
            Self::Single(_) => None,
        }
    }
}

/// Object type to the SQL column it is matched against.
pub type ColumnMapping<'a> = BTreeMap<ObjectType, &'a str>;

/// Filter selections recorded for one utility invocation.
#[derive(Debug, Clone, Default)]
pub struct FilterArgs {
    roles: FilterRoles,
    selections: BTreeMap<ObjectType, FilterSelection>,
}

impl FilterArgs {
    pub fn new(roles: FilterRoles) -> Self {
        Self {
            roles,
            selections: BTreeMap::new(),
        }
    }

    pub fn selection(&self, otype: ObjectType) -> Option<&FilterSelection> {
        self.selections.get(&otype)
    }

    /// Set the exact-match value of a single-valued object type.
    pub fn set_single(&mut self, otype: ObjectType, value: impl Into<String>) -> YbResult<()> {
        if !self.roles.is_single(otype) {
            return Err(YbError::InvalidFilter(format!(
                "object type '{}' does not accept a single value",
                otype
            )));
        }
        self.selections
            .insert(otype, FilterSelection::Single(Some(value.into())));
        Ok(())
    }

    /// Add values to one of the multi-valued sets of an object type.
    ///
    /// Repeated calls accumulate, matching repeated command line flags.
    pub fn add_multi<I, S>(&mut self, otype: ObjectType, kind: MultiKind, values: I) -> YbResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.roles.is_multi(otype) {
            return Err(YbError::InvalidFilter(format!(
                "object type '{}' does not accept multiple values",
                otype
            )));
        }
        self.insert_multi(otype, kind, values);
        Ok(())
    }

    fn insert_multi<I, S>(&mut self, otype: ObjectType, kind: MultiKind, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .selections
            .entry(otype)
            .or_insert_with(|| FilterSelection::Multi(MultiFilter::default()));
        // a single value is never replaced by a multi filter
        let FilterSelection::Multi(multi) = entry else {
            return;
        };
        let set = match kind {
            MultiKind::In => &mut multi.in_list,
            MultiKind::NotIn => &mut multi.not_in_list,
            MultiKind::Like => &mut multi.like_patterns,
            MultiKind::NotLike => &mut multi.not_like_patterns,
        };
        set.extend(values.into_iter().map(Into::into));
    }

    /// Single value of `otype`, if one was set.
    pub fn single_value(&self, otype: ObjectType) -> Option<&str> {
        self.selections.get(&otype).and_then(FilterSelection::single_value)
    }

    /// Whether any of the four multi-valued sets is non-empty for `otype`.
    pub fn has_multi_set(&self, otype: ObjectType) -> bool {
        self.selections
            .get(&otype)
            .and_then(FilterSelection::multi)
            .is_some_and(MultiFilter::is_set)
    }

    /// Scope to every schema instead of falling back to `CURRENT_SCHEMA`.
    ///
    /// Must be called before [`FilterArgs::build_sql_filter`]; has no
    /// effect when a schema value or multi schema filter was already given.
    pub fn schema_set_all_if_none(&mut self) {
        if self.single_value(ObjectType::Schema).is_some() {
            return;
        }
        if !self.has_multi_set(ObjectType::Schema) {
            self.insert_multi(ObjectType::Schema, MultiKind::Like, ["%"]);
        }
    }

    /// Check that every required object type has a non-empty value.
    pub fn validate(&self) -> YbResult<()> {
        for otype in self.roles.required_single() {
            if self.single_value(*otype).is_none_or(str::is_empty) {
                return Err(YbError::missing_filter(*otype));
            }
        }
        Ok(())
    }
}
