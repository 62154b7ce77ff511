
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{RagError, Result};

/// Columns a filter may reference
pub const FILTERABLE_FIELDS: &[&str] = &[
    "document_id",
    "source",
    "document_type",
    "age_group",
    "region",
    "category",
];

/// Age groups the corpus is tagged with
pub const KNOWN_AGE_GROUPS: &[&str] = &["15-20", "21-28", "29-35"];
/// Regions the corpus is tagged with, lower-case
pub const KNOWN_REGIONS: &[&str] = &["india", "international"];
const ANY_AUDIENCE: &str = "all";

/// Closed metadata predicate language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFilter {
    Equals { field: String, value: String },
    /// Matches when the field equals any of `values`; empty matches nothing
    OneOf { field: String, values: Vec<String> },
    /// Conjunction; empty matches everything
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    #[inline]
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn one_of<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check every referenced field is filterable
    #[inline]
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Equals { field, .. } | Self::OneOf { field, .. } => check_field(field),
            Self::And(filters) => filters.iter().try_for_each(Self::validate),
        }
    }

    /// Compile into a SQL predicate over the store's columns
    #[inline]
    pub fn to_predicate(&self) -> Result<String> {
        self.validate()?;
        Ok(self.compile())
    }

    /// True when the filter cannot exclude any row
    #[inline]
    pub fn is_trivial(&self) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(Self::is_trivial),
            _ => false,
        }
    }

    fn compile(&self) -> String {
        match self {
            Self::Equals { field, value } => format!("{field} = {}", quote(value)),
            Self::OneOf { values, .. } if values.is_empty() => "FALSE".to_string(),
            Self::OneOf { field, values } => {
                format!("{field} IN ({})", values.iter().map(|v| quote(v)).join(", "))
            }
            Self::And(filters) => {
                let parts: Vec<String> = filters
                    .iter()
                    .filter(|f| !f.is_trivial())
                    .map(Self::compile)
                    .collect();
                match parts.len() {
                    0 => "TRUE".to_string(),
                    1 => parts.into_iter().next().unwrap_or_default(),
                    _ => parts.iter().map(|p| format!("({p})")).join(" AND "),
                }
            }
        }
    }
}

fn check_field(field: &str) -> Result<()> {
    if FILTERABLE_FIELDS.contains(&field) {
        Ok(())
    } else {
        Err(RagError::InvalidFilter(format!(
            "'{field}' is not filterable (allowed: {})",
            FILTERABLE_FIELDS.join(", ")
        )))
    }
}

/// Single-quote a SQL string literal
#[inline]
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Restrict results to content aimed at the caller's age group and region
///
/// Unknown values are ignored; content tagged "all" always matches.
#[inline]
pub fn audience_filter(age_group: Option<&str>, region: Option<&str>) -> Option<MetadataFilter> {
    let mut clauses = Vec::new();

    if let Some(group) = age_group.filter(|g| KNOWN_AGE_GROUPS.contains(g)) {
        clauses.push(MetadataFilter::one_of("age_group", [group, ANY_AUDIENCE]));
    }

    if let Some(region) = region
        .map(str::to_ascii_lowercase)
        .filter(|r| KNOWN_REGIONS.contains(&r.as_str()))
    {
        clauses.push(MetadataFilter::one_of(
            "region",
            [region, ANY_AUDIENCE.to_string()],
        ));
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(MetadataFilter::And(clauses)),
    }
}
