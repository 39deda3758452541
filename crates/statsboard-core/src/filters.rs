//! Dimension filters, filter sets and the display-label cache.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CoreError;

/// Key prefix shared by every custom property dimension (`props:<name>`).
pub const EVENT_PROPS_PREFIX: &str = "props:";

/// Placeholder value the API reports for rows with no recorded dimension.
pub const NOT_SET: &str = "(not set)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperation {
    Is,
    IsNot,
    Contains,
    ContainsNot,
}

impl FilterOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::Contains => "contains",
            Self::ContainsNot => "contains_not",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw {
            "is" => Ok(Self::Is),
            "is_not" => Ok(Self::IsNot),
            "contains" => Ok(Self::Contains),
            "contains_not" => Ok(Self::ContainsNot),
            other => Err(CoreError::UnknownOperation(other.to_string())),
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Is)
    }
}

/// An attribute visits and events can be grouped and filtered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Source,
    Channel,
    Referrer,
    UtmMedium,
    UtmSource,
    UtmCampaign,
    UtmContent,
    UtmTerm,
    Screen,
    Browser,
    BrowserVersion,
    Os,
    OsVersion,
    Country,
    Region,
    City,
    Page,
    EntryPage,
    ExitPage,
    Hostname,
    Goal,
    Prop(String),
}

const BUILTIN_DIMENSIONS: &[(&str, Dimension)] = &[
    ("source", Dimension::Source),
    ("channel", Dimension::Channel),
    ("referrer", Dimension::Referrer),
    ("utm_medium", Dimension::UtmMedium),
    ("utm_source", Dimension::UtmSource),
    ("utm_campaign", Dimension::UtmCampaign),
    ("utm_content", Dimension::UtmContent),
    ("utm_term", Dimension::UtmTerm),
    ("screen", Dimension::Screen),
    ("browser", Dimension::Browser),
    ("browser_version", Dimension::BrowserVersion),
    ("os", Dimension::Os),
    ("os_version", Dimension::OsVersion),
    ("country", Dimension::Country),
    ("region", Dimension::Region),
    ("city", Dimension::City),
    ("page", Dimension::Page),
    ("entry_page", Dimension::EntryPage),
    ("exit_page", Dimension::ExitPage),
    ("hostname", Dimension::Hostname),
    ("goal", Dimension::Goal),
];

impl Dimension {
    fn builtin_key(&self) -> Option<&'static str> {
        BUILTIN_DIMENSIONS
            .iter()
            .find(|(_, dimension)| dimension == self)
            .map(|(key, _)| *key)
    }

    /// `true` when the dimension's key starts with `prefix`, so `"os"`
    /// matches both `os` and `os_version`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        match self.builtin_key() {
            Some(key) => key.starts_with(prefix),
            None => self.to_string().starts_with(prefix),
        }
    }

    /// Location dimensions filter on a code and keep a display label for it.
    pub fn carries_labels(&self) -> bool {
        matches!(self, Self::Country | Self::Region | Self::City)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prop(name) => write!(f, "{EVENT_PROPS_PREFIX}{name}"),
            other => f.write_str(other.builtin_key().unwrap_or_default()),
        }
    }
}

impl FromStr for Dimension {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if let Some(name) = raw.strip_prefix(EVENT_PROPS_PREFIX) {
            if name.is_empty() {
                return Err(CoreError::UnknownDimension(raw.to_string()));
            }
            return Ok(Self::Prop(name.to_string()));
        }
        BUILTIN_DIMENSIONS
            .iter()
            .find(|(key, _)| *key == raw)
            .map(|(_, dimension)| dimension.clone())
            .ok_or_else(|| CoreError::UnknownDimension(raw.to_string()))
    }
}

/// A single dimension predicate, e.g. `("is", "browser", ["Chrome"])`.
///
/// On the wire a filter is the JSON triple `[operation, key, values]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFilter", into = "RawFilter")]
pub struct Filter {
    operation: FilterOperation,
    dimension: Dimension,
    values: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct RawFilter(String, String, Vec<String>);

impl TryFrom<RawFilter> for Filter {
    type Error = CoreError;

    fn try_from(RawFilter(operation, key, values): RawFilter) -> Result<Self, Self::Error> {
        Filter::new(FilterOperation::parse(&operation)?, key.parse()?, values)
    }
}

impl From<Filter> for RawFilter {
    fn from(filter: Filter) -> Self {
        RawFilter(
            filter.operation.as_str().to_string(),
            filter.dimension.to_string(),
            filter.values,
        )
    }
}

impl Filter {
    pub fn new(
        operation: FilterOperation,
        dimension: Dimension,
        values: Vec<String>,
    ) -> Result<Self, CoreError> {
        if values.is_empty() {
            return Err(CoreError::EmptyFilter(dimension.to_string()));
        }
        Ok(Self {
            operation,
            dimension,
            values,
        })
    }

    /// Equality filter binding exactly one value.
    pub fn is(dimension: Dimension, value: impl Into<String>) -> Self {
        Self {
            operation: FilterOperation::Is,
            dimension,
            values: vec![value.into()],
        }
    }

    pub fn operation(&self) -> FilterOperation {
        self.operation
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn to_json(&self) -> Value {
        json!([
            self.operation.as_str(),
            self.dimension.to_string(),
            self.values
        ])
    }
}

/// Ordered filters of a query.
///
/// New sets are derived with [`FilterSet::replace_by_prefix`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(Vec<Filter>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.0.iter()
    }

    pub fn by_prefix(&self, prefix: &str) -> Vec<&Filter> {
        self.0
            .iter()
            .filter(|filter| filter.dimension.matches_prefix(prefix))
            .collect()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0
            .iter()
            .any(|filter| filter.dimension.matches_prefix(prefix))
    }

    /// The value `key` is pinned to: exactly one filter on that exact key,
    /// an equality filter binding a single value. `os_version` filters do
    /// not count against `os`.
    pub fn fixed_value(&self, key: &str) -> Option<&str> {
        let mut on_key = self
            .0
            .iter()
            .filter(|filter| filter.dimension.to_string() == key);
        let (Some(filter), None) = (on_key.next(), on_key.next()) else {
            return None;
        };
        match filter.values.as_slice() {
            [value] if filter.operation.is_equality() => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_filtering_on_fixed_value(&self, key: &str) -> bool {
        self.fixed_value(key).is_some()
    }

    /// Drop every filter matching `prefix` and append `filter`.
    pub fn replace_by_prefix(&self, prefix: &str, filter: Filter) -> FilterSet {
        self.0
            .iter()
            .filter(|existing| !existing.dimension.matches_prefix(prefix))
            .cloned()
            .chain(std::iter::once(filter))
            .collect()
    }

    pub fn has_goal_filter(&self) -> bool {
        self.0
            .iter()
            .any(|filter| filter.dimension == Dimension::Goal)
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.0.iter().map(Filter::to_json).collect())
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FilterSet {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Display text for raw filter values (country code -> country name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self(BTreeMap::from([(value.into(), label.into())]))
    }

    pub fn get(&self, value: &str) -> Option<&str> {
        self.0.get(value).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Labels to carry alongside `filters`.
    ///
    /// Entries survive only while their key is bound by some location
    /// filter in `filters`; `additions` are merged when `prefix` names a
    /// labelled dimension.
    pub fn clean(&self, filters: &FilterSet, prefix: &str, additions: &Labels) -> Labels {
        let filtered_by: BTreeSet<&str> = filters
            .iter()
            .filter(|filter| filter.dimension.carries_labels())
            .flat_map(|filter| filter.values.iter().map(String::as_str))
            .collect();

        let mut kept: BTreeMap<String, String> = self
            .0
            .iter()
            .filter(|(value, _)| filtered_by.contains(value.as_str()))
            .map(|(value, label)| (value.clone(), label.clone()))
            .collect();

        let merges = prefix
            .parse::<Dimension>()
            .map(|dimension| dimension.carries_labels())
            .unwrap_or(false);
        if merges {
            kept.extend(additions.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Labels(kept)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for Labels {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(op: FilterOperation, key: &str, values: &[&str]) -> Filter {
        Filter::new(
            op,
            key.parse().expect("dimension"),
            values.iter().map(|v| v.to_string()).collect(),
        )
        .expect("filter")
    }

    #[test]
    fn prefix_matches_dimension_family() {
        let set: FilterSet = [
            filter(FilterOperation::Is, "os", &["Windows"]),
            filter(FilterOperation::Is, "os_version", &["11"]),
            filter(FilterOperation::Is, "browser", &["Chrome"]),
        ]
        .into_iter()
        .collect();

        let keys: Vec<String> = set
            .by_prefix("os")
            .iter()
            .map(|f| f.dimension().to_string())
            .collect();
        assert_eq!(keys, vec!["os", "os_version"]);
        assert_eq!(set.by_prefix("os_version").len(), 1);
        assert!(set.by_prefix("city").is_empty());
    }

    #[test]
    fn replace_by_prefix_is_exhaustive_and_leaves_original_untouched() {
        let set: FilterSet = [
            filter(FilterOperation::Is, "browser", &["Chrome"]),
            filter(FilterOperation::Is, "browser_version", &["120"]),
            filter(FilterOperation::Is, "country", &["US"]),
        ]
        .into_iter()
        .collect();
        let replacement = Filter::is(Dimension::Browser, "Firefox");

        let replaced = set.replace_by_prefix("browser", replacement.clone());

        assert_eq!(replaced.by_prefix("browser"), vec![&replacement]);
        assert_eq!(replaced.len(), 2);
        assert_eq!(replaced.iter().last(), Some(&replacement));
        assert_eq!(set.len(), 3, "source set must not change");
    }

    #[test]
    fn fixed_value_requires_single_equality_binding() {
        let single: FilterSet = [filter(FilterOperation::Is, "os", &["Windows"])]
            .into_iter()
            .collect();
        let multi: FilterSet = [filter(FilterOperation::Is, "os", &["Windows", "macOS"])]
            .into_iter()
            .collect();
        let negated: FilterSet = [filter(FilterOperation::IsNot, "os", &["Windows"])]
            .into_iter()
            .collect();

        assert!(single.is_filtering_on_fixed_value("os"));
        assert!(!multi.is_filtering_on_fixed_value("os"));
        assert!(!negated.is_filtering_on_fixed_value("os"));
        assert!(!FilterSet::new().is_filtering_on_fixed_value("os"));
        assert_eq!(single.fixed_value("os"), Some("Windows"));
        assert_eq!(negated.fixed_value("os"), None);
    }

    #[test]
    fn goal_filter_detection() {
        let set: FilterSet = [filter(FilterOperation::Is, "goal", &["Signup"])]
            .into_iter()
            .collect();
        assert!(set.has_goal_filter());
        assert!(!FilterSet::new().has_goal_filter());
    }

    #[test]
    fn clean_labels_prunes_removed_values_and_merges_new_ones() {
        let old: Labels = [
            ("US".to_string(), "United States".to_string()),
            ("DE".to_string(), "Germany".to_string()),
        ]
        .into_iter()
        .collect();
        let filters: FilterSet = [Filter::is(Dimension::Country, "FR")].into_iter().collect();

        let cleaned = old.clean(&filters, "country", &Labels::single("FR", "France"));

        assert_eq!(cleaned.get("FR"), Some("France"));
        assert_eq!(cleaned.get("US"), None);
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn clean_labels_ignores_additions_for_unlabelled_prefix() {
        let filters: FilterSet = [Filter::is(Dimension::Browser, "Chrome")]
            .into_iter()
            .collect();
        let cleaned = Labels::new().clean(&filters, "browser", &Labels::single("x", "y"));
        assert!(cleaned.is_empty());
    }

    #[test]
    fn filter_wire_format_is_a_triple() {
        let parsed: Filter =
            serde_json::from_str(r#"["is","props:plan",["Business"]]"#).expect("parse");
        assert_eq!(parsed.dimension(), &Dimension::Prop("plan".to_string()));
        assert_eq!(
            serde_json::to_string(&parsed).expect("serialize"),
            r#"["is","props:plan",["Business"]]"#
        );
    }

    #[test]
    fn filter_wire_format_rejects_bad_shapes() {
        assert!(serde_json::from_str::<Filter>(r#"["is","nonsense",["x"]]"#).is_err());
        assert!(serde_json::from_str::<Filter>(r#"["equals","browser",["x"]]"#).is_err());
        assert!(serde_json::from_str::<Filter>(r#"["is","browser",[]]"#).is_err());
        assert!(serde_json::from_str::<Filter>(r#"{"op":"is"}"#).is_err());
    }
}
