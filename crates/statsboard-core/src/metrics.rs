//! Metric column sets per report.

use serde::Serialize;
use serde_json::Value;

use crate::breakdown::BreakdownRow;
use crate::query::Query;

/// Deployment capabilities that change which columns exist at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub revenue_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Visitors,
    Events,
    Percentage,
    ConversionRate,
    TotalVisitors,
    TotalRevenue,
    AverageRevenue,
}

impl MetricKey {
    /// The row's value for this column, `null` when the row lacks it.
    pub fn value_of(self, row: &BreakdownRow) -> Value {
        match self {
            Self::Visitors => Value::from(row.visitors),
            Self::Events => row.events.map(Value::from).unwrap_or(Value::Null),
            Self::Percentage => row.percentage.map(Value::from).unwrap_or(Value::Null),
            Self::ConversionRate => row.conversion_rate.map(Value::from).unwrap_or(Value::Null),
            Self::TotalVisitors => row.total_visitors.map(Value::from).unwrap_or(Value::Null),
            Self::TotalRevenue => row.total_revenue.clone().unwrap_or(Value::Null),
            Self::AverageRevenue => row.average_revenue.clone().unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub key: MetricKey,
    pub label: &'static str,
    pub plot: bool,
    pub hidden_on_mobile: bool,
}

impl Metric {
    pub const fn new(key: MetricKey, label: &'static str) -> Self {
        Self {
            key,
            label,
            plot: false,
            hidden_on_mobile: false,
        }
    }

    pub const fn plotted(self) -> Self {
        Self { plot: true, ..self }
    }

    pub const fn hidden_on_mobile(self) -> Self {
        Self {
            hidden_on_mobile: true,
            ..self
        }
    }

    pub const fn labelled(self, label: &'static str) -> Self {
        Self { label, ..self }
    }
}

pub const VISITORS_METRIC: Metric = Metric::new(MetricKey::Visitors, "Visitors").plotted();
pub const EVENTS_METRIC: Metric = Metric::new(MetricKey::Events, "Events");
pub const PERCENTAGE_METRIC: Metric = Metric::new(MetricKey::Percentage, "%");
pub const CR_METRIC: Metric = Metric::new(MetricKey::ConversionRate, "CR");
pub const TOTAL_VISITORS_METRIC: Metric = Metric::new(MetricKey::TotalVisitors, "Total Visitors");
pub const TOTAL_REVENUE_METRIC: Metric =
    Metric::new(MetricKey::TotalRevenue, "Revenue").hidden_on_mobile();
pub const AVERAGE_REVENUE_METRIC: Metric =
    Metric::new(MetricKey::AverageRevenue, "Average").hidden_on_mobile();

/// Swap percentage for conversion rate when the query filters on a goal.
///
/// The conversion-rate column takes the percentage column's position, or is
/// appended when `base` has no percentage. Without a goal filter the
/// conversion-rate column never appears.
pub fn compose_metrics(base: &[Metric], query: &Query) -> Vec<Metric> {
    if !query.has_goal_filter() {
        return base
            .iter()
            .copied()
            .filter(|metric| metric.key != MetricKey::ConversionRate)
            .collect();
    }

    let mut metrics: Vec<Metric> = base
        .iter()
        .map(|metric| match metric.key {
            MetricKey::Percentage => CR_METRIC,
            _ => *metric,
        })
        .collect();
    if !metrics.iter().any(|m| m.key == MetricKey::ConversionRate) {
        metrics.push(CR_METRIC);
    }
    metrics
}

/// Append the revenue columns when the deployment supports them. Decided
/// once per report, independent of what the rows contain.
pub fn with_revenue(mut metrics: Vec<Metric>, capabilities: &Capabilities) -> Vec<Metric> {
    if capabilities.revenue_enabled {
        metrics.extend([TOTAL_REVENUE_METRIC, AVERAGE_REVENUE_METRIC]);
    }
    metrics
}

/// Columns of the full-page table behind the location reports.
pub fn detail_table_metrics(query: &Query, show_percentage: bool) -> Vec<Metric> {
    let goal = query.has_goal_filter();
    let visitors_label = if query.is_realtime() {
        "Current visitors"
    } else if goal {
        "Conversions"
    } else {
        "Visitors"
    };

    let mut metrics = Vec::with_capacity(3);
    if goal {
        metrics.push(TOTAL_VISITORS_METRIC);
    }
    metrics.push(VISITORS_METRIC.labelled(visitors_label));
    if goal {
        metrics.push(CR_METRIC);
    } else if show_percentage {
        metrics.push(PERCENTAGE_METRIC);
    }
    metrics
}

/// Columns of the paginated custom-property table.
///
/// Unlike [`with_revenue`], revenue here also depends on the data: the
/// columns appear only if some loaded row actually carries revenue.
pub fn prop_breakdown_metrics(
    query: &Query,
    capabilities: &Capabilities,
    rows: &[BreakdownRow],
) -> Vec<Metric> {
    let mut metrics = compose_metrics(&[VISITORS_METRIC, EVENTS_METRIC, PERCENTAGE_METRIC], query);
    if capabilities.revenue_enabled && rows.iter().any(BreakdownRow::has_revenue) {
        metrics.extend([TOTAL_REVENUE_METRIC, AVERAGE_REVENUE_METRIC]);
    }
    metrics
}
