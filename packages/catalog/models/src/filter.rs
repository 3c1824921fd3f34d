//! List filters evaluated by catalog stores.
//!
//! A [`ListFilter`] either pins a list endpoint to a precomputed id set
//! (the result of a cross filter) or narrows it with simple per-field
//! predicates. The `PostGIS` store renders these to SQL; the in-memory
//! store evaluates them with [`ListFilter::matches`].

use std::collections::BTreeSet;

use strum_macros::{AsRefStr, Display, EnumString};

use crate::CatalogRow;

/// Comparison operator for a simple field filter.
///
/// Parsed from the `__op` suffix of a query-string key, so `name__icontains`
/// maps to [`FilterOp::Icontains`]. A bare field name means
/// [`FilterOp::Exact`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum FilterOp {
    /// Equal.
    Exact,
    /// Equal, ignoring case.
    Iexact,
    /// Substring match.
    Contains,
    Icontains,
    /// Prefix match.
    Startswith,
    Istartswith,
    /// Suffix match.
    Endswith,
    Iendswith,
    /// Equal to any value of a comma-separated list.
    In,
    /// Lexically greater than.
    Gt,
    Gte,
    /// Lexically less than.
    Lt,
    Lte,
}

impl FilterOp {
    /// Every operator, for fields that allow all of them.
    pub const ALL: &[Self] = &[
        Self::Exact,
        Self::Iexact,
        Self::Contains,
        Self::Icontains,
        Self::Startswith,
        Self::Istartswith,
        Self::Endswith,
        Self::Iendswith,
        Self::In,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
    ];

    /// Whether the comparison ignores ASCII case.
    #[must_use]
    pub const fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Self::Iexact | Self::Icontains | Self::Istartswith | Self::Iendswith
        )
    }
}

/// A single `field <op> value` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    /// Column name. Always taken from a resource's allow-list, never
    /// straight from user input.
    pub field: &'static str,
    /// Comparison operator.
    pub op: FilterOp,
    /// Operand(s). Holds exactly one value except for [`FilterOp::In`].
    pub values: Vec<String>,
}

impl FieldFilter {
    /// Builds a filter from a raw query-string value. For
    /// [`FilterOp::In`] the value is split on commas.
    #[must_use]
    pub fn new(field: &'static str, op: FilterOp, raw: &str) -> Self {
        let values = if op == FilterOp::In {
            raw.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
                .collect()
        } else {
            vec![raw.to_string()]
        };

        Self { field, op, values }
    }

    /// Evaluates the predicate against a field value. Null fields never
    /// match.
    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };

        if self.op == FilterOp::In {
            return self.values.iter().any(|v| v == value);
        }

        let Some(operand) = self.values.first() else {
            return false;
        };

        if self.op.is_case_insensitive() {
            let value = value.to_lowercase();
            let operand = operand.to_lowercase();
            return match self.op {
                FilterOp::Iexact => value == operand,
                FilterOp::Icontains => value.contains(&operand),
                FilterOp::Istartswith => value.starts_with(&operand),
                FilterOp::Iendswith => value.ends_with(&operand),
                _ => false,
            };
        }

        let operand = operand.as_str();
        match self.op {
            FilterOp::Exact => value == operand,
            FilterOp::Contains => value.contains(operand),
            FilterOp::Startswith => value.starts_with(operand),
            FilterOp::Endswith => value.ends_with(operand),
            FilterOp::Gt => value > operand,
            FilterOp::Gte => value >= operand,
            FilterOp::Lt => value < operand,
            FilterOp::Lte => value <= operand,
            FilterOp::Iexact
            | FilterOp::Icontains
            | FilterOp::Istartswith
            | FilterOp::Iendswith
            | FilterOp::In => false,
        }
    }
}

/// Restriction applied to a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListFilter {
    /// No restriction.
    #[default]
    All,
    /// Primary key must be in the set.
    Ids(BTreeSet<i32>),
    /// Every predicate must hold.
    Fields(Vec<FieldFilter>),
}

impl ListFilter {
    /// Evaluates the filter against a row.
    #[must_use]
    pub fn matches<T: CatalogRow>(&self, row: &T) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(&row.id()),
            Self::Fields(filters) => filters
                .iter()
                .all(|f| f.matches(row.text_field(f.field))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parktype;

    fn parktype(id: i32, name: &str) -> Parktype {
        Parktype {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn parses_operator_suffixes() {
        assert_eq!("icontains".parse::<FilterOp>().unwrap(), FilterOp::Icontains);
        assert_eq!("in".parse::<FilterOp>().unwrap(), FilterOp::In);
        assert_eq!("gte".parse::<FilterOp>().unwrap(), FilterOp::Gte);
        assert!("regex".parse::<FilterOp>().is_err());
    }

    #[test]
    fn exact_is_case_sensitive() {
        let filter = FieldFilter::new("name", FilterOp::Exact, "Boston Common");
        assert!(filter.matches(Some("Boston Common")));
        assert!(!filter.matches(Some("boston common")));
        assert!(!filter.matches(None));
    }

    #[test]
    fn case_insensitive_operators() {
        let filter = FieldFilter::new("name", FilterOp::Icontains, "COMMON");
        assert!(filter.matches(Some("Boston Common")));

        let filter = FieldFilter::new("name", FilterOp::Istartswith, "boston");
        assert!(filter.matches(Some("Boston Common")));
        assert!(!filter.matches(Some("Franklin Park")));
    }

    #[test]
    fn in_splits_on_commas_and_skips_blanks() {
        let filter = FieldFilter::new("name", FilterOp::In, "Playground, ,Urban Wild,");
        assert_eq!(filter.values, vec!["Playground", "Urban Wild"]);
        assert!(filter.matches(Some("Urban Wild")));
        assert!(!filter.matches(Some("Cemetery")));
    }

    #[test]
    fn range_operators_compare_lexically() {
        let filter = FieldFilter::new("name", FilterOp::Lt, "M");
        assert!(filter.matches(Some("Franklin Park")));
        assert!(!filter.matches(Some("Public Garden")));
    }

    #[test]
    fn list_filter_by_ids_and_fields() {
        let playground = parktype(1, "Playground");
        let wild = parktype(2, "Urban Wild");

        let ids = ListFilter::Ids([2].into_iter().collect());
        assert!(!ids.matches(&playground));
        assert!(ids.matches(&wild));

        let fields = ListFilter::Fields(vec![FieldFilter::new("name", FilterOp::Endswith, "Wild")]);
        assert!(fields.matches(&wild));
        assert!(!fields.matches(&playground));

        assert!(ListFilter::All.matches(&playground));
    }

    #[test]
    fn unknown_field_never_matches() {
        let filter = ListFilter::Fields(vec![FieldFilter::new("color", FilterOp::Exact, "green")]);
        assert!(!filter.matches(&parktype(1, "Playground")));
    }
}
