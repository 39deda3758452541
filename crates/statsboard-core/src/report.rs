//! Catalogue of breakdown reports.
//!
//! Every report the dashboard can render is one [`Report`] variant; the
//! endpoint, filter key, labels, icons and columns are looked up here so a
//! single fetch cycle can serve all of them.

use serde::Serialize;

use crate::breakdown::BreakdownRow;
use crate::filters::{Dimension, EVENT_PROPS_PREFIX};
use crate::metrics::{
    compose_metrics, with_revenue, Capabilities, Metric, CR_METRIC, EVENTS_METRIC,
    PERCENTAGE_METRIC, VISITORS_METRIC,
};
use crate::query::Query;

/// Rows shown by the compact list variant of location and goal reports.
pub const LIST_LIMIT: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Report {
    Browsers,
    BrowserVersions,
    OperatingSystems,
    OperatingSystemVersions,
    ScreenSizes,
    CountryMap,
    Countries,
    Regions,
    Cities,
    Conversions,
    CustomPropValues(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Icon {
    Flag(String),
    Device(DeviceIcon),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceIcon {
    Mobile,
    Tablet,
    Laptop,
    Desktop,
}

impl DeviceIcon {
    pub fn for_screen_size(name: &str) -> Option<Self> {
        match name {
            "Mobile" => Some(Self::Mobile),
            "Tablet" => Some(Self::Tablet),
            "Laptop" => Some(Self::Laptop),
            "Desktop" => Some(Self::Desktop),
            _ => None,
        }
    }
}

impl Report {
    /// Path below `/api/stats/<domain>`.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Browsers => "/browsers".to_string(),
            Self::BrowserVersions => "/browser-versions".to_string(),
            Self::OperatingSystems => "/operating-systems".to_string(),
            Self::OperatingSystemVersions => "/operating-system-versions".to_string(),
            Self::ScreenSizes => "/screen-sizes".to_string(),
            Self::CountryMap | Self::Countries => "/countries".to_string(),
            Self::Regions => "/regions".to_string(),
            Self::Cities => "/cities".to_string(),
            Self::Conversions => "/conversions".to_string(),
            Self::CustomPropValues(key) => format!("/custom-prop-values/{key}"),
        }
    }

    /// Dimension a drill-down on this report filters by.
    pub fn filter_dimension(&self) -> Dimension {
        match self {
            Self::Browsers => Dimension::Browser,
            Self::BrowserVersions => Dimension::BrowserVersion,
            Self::OperatingSystems => Dimension::Os,
            Self::OperatingSystemVersions => Dimension::OsVersion,
            Self::ScreenSizes => Dimension::Screen,
            Self::CountryMap | Self::Countries => Dimension::Country,
            Self::Regions => Dimension::Region,
            Self::Cities => Dimension::City,
            Self::Conversions => Dimension::Goal,
            Self::CustomPropValues(key) => Dimension::Prop(key.clone()),
        }
    }

    /// Prefix of the filters a drill-down replaces. Custom properties
    /// replace every `props:` filter, not just their own key.
    pub fn filter_prefix(&self) -> String {
        match self {
            Self::CustomPropValues(_) => EVENT_PROPS_PREFIX.to_string(),
            other => other.filter_dimension().to_string(),
        }
    }

    /// For version reports, the dimension that must be pinned first.
    pub fn parent_dimension(&self) -> Option<Dimension> {
        match self {
            Self::BrowserVersions => Some(Dimension::Browser),
            Self::OperatingSystemVersions => Some(Dimension::Os),
            _ => None,
        }
    }

    pub fn key_label(&self) -> String {
        match self {
            Self::Browsers => "Browser".to_string(),
            Self::BrowserVersions => "Browser version".to_string(),
            Self::OperatingSystems => "Operating system".to_string(),
            Self::OperatingSystemVersions => "Operating system version".to_string(),
            Self::ScreenSizes => "Screen size".to_string(),
            Self::CountryMap | Self::Countries => "Country".to_string(),
            Self::Regions => "Region".to_string(),
            Self::Cities => "City".to_string(),
            Self::Conversions => "Goal".to_string(),
            Self::CustomPropValues(key) => key.clone(),
        }
    }

    pub fn carries_labels(&self) -> bool {
        self.filter_dimension().carries_labels()
    }

    /// The value a drill-down filters on: the location code for location
    /// reports, the display name everywhere else.
    pub fn identifier<'a>(&self, row: &'a BreakdownRow) -> Option<&'a str> {
        if self.carries_labels() {
            row.code.as_deref()
        } else {
            Some(row.name.as_str())
        }
    }

    pub fn icon(&self, row: &BreakdownRow) -> Option<Icon> {
        match self {
            Self::CountryMap | Self::Countries => row.flag.clone().map(Icon::Flag),
            Self::Regions | Self::Cities => row.country_flag.clone().map(Icon::Flag),
            Self::ScreenSizes => DeviceIcon::for_screen_size(&row.name).map(Icon::Device),
            _ => None,
        }
    }

    /// Extra API params the compact list variant sends.
    pub fn default_params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Countries | Self::Regions | Self::Cities | Self::Conversions => {
                vec![("limit", LIST_LIMIT.to_string())]
            }
            _ => Vec::new(),
        }
    }

    /// Full-page view behind the compact list, below the site path.
    pub fn details_path(&self) -> Option<String> {
        match self {
            Self::Countries | Self::Regions | Self::Cities | Self::Conversions => {
                Some(self.endpoint())
            }
            Self::CustomPropValues(key) => Some(format!("/custom-prop-values/{key}")),
            _ => None,
        }
    }

    pub fn metrics(&self, query: &Query, capabilities: &Capabilities) -> Vec<Metric> {
        match self {
            Self::Browsers
            | Self::BrowserVersions
            | Self::OperatingSystems
            | Self::OperatingSystemVersions
            | Self::ScreenSizes => compose_metrics(&[VISITORS_METRIC, PERCENTAGE_METRIC], query),
            Self::CountryMap | Self::Countries | Self::Regions | Self::Cities => {
                compose_metrics(&[VISITORS_METRIC], query)
            }
            Self::Conversions => with_revenue(
                vec![
                    VISITORS_METRIC.labelled("Uniques"),
                    EVENTS_METRIC.labelled("Total").hidden_on_mobile(),
                    CR_METRIC,
                ],
                capabilities,
            ),
            Self::CustomPropValues(_) => compose_metrics(
                &[VISITORS_METRIC, EVENTS_METRIC, PERCENTAGE_METRIC],
                query,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricKey;

    #[test]
    fn version_reports_name_their_parent() {
        assert_eq!(
            Report::OperatingSystemVersions.parent_dimension(),
            Some(Dimension::Os)
        );
        assert_eq!(Report::OperatingSystemVersions.filter_prefix(), "os_version");
        assert_eq!(Report::Browsers.parent_dimension(), None);
    }

    #[test]
    fn custom_props_replace_the_whole_props_family() {
        let report = Report::CustomPropValues("plan".to_string());
        assert_eq!(report.endpoint(), "/custom-prop-values/plan");
        assert_eq!(report.filter_prefix(), "props:");
        assert_eq!(report.filter_dimension().to_string(), "props:plan");
        assert_eq!(report.key_label(), "plan");
        assert_eq!(
            report.details_path().as_deref(),
            Some("/custom-prop-values/plan")
        );
        assert_eq!(Report::ScreenSizes.details_path(), None);
    }

    #[test]
    fn identifiers_use_code_for_locations() {
        let mut row = BreakdownRow::named("United States", 5);
        assert_eq!(Report::Countries.identifier(&row), None);
        row.code = Some("US".to_string());
        assert_eq!(Report::Countries.identifier(&row), Some("US"));
        assert_eq!(Report::Browsers.identifier(&row), Some("United States"));
    }

    #[test]
    fn icons() {
        let mut row = BreakdownRow::named("Tablet", 1);
        assert_eq!(
            Report::ScreenSizes.icon(&row),
            Some(Icon::Device(DeviceIcon::Tablet))
        );
        row.country_flag = Some("🇩🇪".to_string());
        assert_eq!(
            Report::Cities.icon(&row),
            Some(Icon::Flag("🇩🇪".to_string()))
        );
        assert_eq!(Report::Countries.icon(&row), None);
        assert_eq!(
            Report::ScreenSizes.icon(&BreakdownRow::named("(not set)", 1)),
            None
        );
    }

    #[test]
    fn list_variants_limit_rows() {
        assert_eq!(
            Report::Regions.default_params(),
            vec![("limit", "9".to_string())]
        );
        assert!(Report::CountryMap.default_params().is_empty());
        assert!(Report::Browsers.default_params().is_empty());
    }

    #[test]
    fn conversions_columns_are_fixed() {
        let metrics = Report::Conversions.metrics(&Query::default(), &Capabilities::default());
        let keys: Vec<MetricKey> = metrics.iter().map(|m| m.key).collect();
        assert_eq!(
            keys,
            vec![
                MetricKey::Visitors,
                MetricKey::Events,
                MetricKey::ConversionRate
            ]
        );
        assert_eq!(metrics[0].label, "Uniques");
    }
}
