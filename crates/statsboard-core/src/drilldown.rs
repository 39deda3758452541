//! Turning a clicked breakdown row into the next query.

use tracing::debug;

use crate::breakdown::BreakdownRow;
use crate::filters::{Filter, Labels, NOT_SET};
use crate::query::{Query, QueryUpdate, Site};
use crate::report::Report;

/// The filter (and label) a row click adds. Resolving never fetches; the
/// caller merges it into the next query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrillDown {
    pub prefix: String,
    pub filter: Filter,
    pub labels: Labels,
}

/// Resolve the drill-down for `row` of `report` under `query`.
///
/// Returns `None` when the row is not clickable: a version report whose
/// parent dimension is not pinned to one known value, or a location row
/// without a code.
pub fn resolve_drill_down(report: &Report, row: &BreakdownRow, query: &Query) -> Option<DrillDown> {
    if let Some(parent) = report.parent_dimension() {
        let parent_key = parent.to_string();
        let pinned = matches!(
            query.filters.fixed_value(&parent_key),
            Some(value) if value != NOT_SET
        );
        if !pinned {
            debug!(parent = %parent_key, row = %row.name, "Version drill-down without pinned parent");
            return None;
        }
    }

    let identifier = report.identifier(row)?;
    let labels = if report.carries_labels() {
        Labels::single(identifier, row.name.as_str())
    } else {
        Labels::new()
    };

    Some(DrillDown {
        prefix: report.filter_prefix(),
        filter: Filter::is(report.filter_dimension(), identifier),
        labels,
    })
}

impl DrillDown {
    /// `query` with this filter swapped in and its labels cleaned.
    pub fn apply(&self, query: &Query) -> Query {
        let filters = query
            .filters
            .replace_by_prefix(&self.prefix, self.filter.clone());
        let labels = query.labels.clean(&filters, &self.prefix, &self.labels);
        query.merged(QueryUpdate {
            filters: Some(filters),
            labels: Some(labels),
            ..QueryUpdate::default()
        })
    }

    /// Dashboard link (path plus serialized query) for the drilled-down view.
    pub fn link(&self, query: &Query, site: &Site) -> String {
        format!("{}?{}", site.base_path(), self.apply(query).to_query_string())
    }
}
