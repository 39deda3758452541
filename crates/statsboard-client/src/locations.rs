use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use statsboard_core::breakdown::BreakdownRow;
use statsboard_core::drilldown::resolve_drill_down;
use statsboard_core::metrics::{Capabilities, Metric};
use statsboard_core::query::{Query, Site};
use statsboard_core::report::Report;
use statsboard_core::storage::KeyValueStore;
use statsboard_core::tabs::{LocationsMode, LocationsTabs};

use crate::api::StatsApi;
use crate::breakdown::{imported_flag_hook, BreakdownView, FetchOutcome};

/// Map / countries / regions / cities breakdown.
///
/// Every query change runs the tab snap-back first, so a removed country or
/// region filter lands on the right tab before the next fetch.
pub struct LocationsReport<A: ?Sized = dyn StatsApi> {
    tabs: LocationsTabs,
    view: Arc<BreakdownView<A>>,
    imported_unsupported: Arc<AtomicBool>,
    capabilities: Capabilities,
    query: Query,
}

impl<A: StatsApi + ?Sized> LocationsReport<A> {
    pub fn new(
        api: Arc<A>,
        site: Site,
        store: Arc<dyn KeyValueStore>,
        capabilities: Capabilities,
        query: Query,
    ) -> Self {
        let imported_unsupported = Arc::new(AtomicBool::new(false));
        let tabs = LocationsTabs::restore(&site, store);
        let view = BreakdownView::new(api, site)
            .with_after_fetch(imported_flag_hook(&imported_unsupported));
        Self {
            tabs,
            view: Arc::new(view),
            imported_unsupported,
            capabilities,
            query,
        }
    }

    pub fn view(&self) -> &Arc<BreakdownView<A>> {
        &self.view
    }

    pub fn mode(&self) -> LocationsMode {
        self.tabs.mode()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn active_report(&self) -> Report {
        self.tabs.active_report()
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.active_report().metrics(&self.query, &self.capabilities)
    }

    pub fn imported_query_unsupported(&self) -> bool {
        self.imported_unsupported.load(Ordering::Relaxed)
    }

    pub async fn load(&self) -> FetchOutcome {
        self.view.fetch(&self.active_report(), &self.query).await
    }

    pub async fn select_tab(&mut self, mode: LocationsMode) -> FetchOutcome {
        self.tabs.select(mode);
        self.load().await
    }

    pub async fn set_query(&mut self, query: Query) -> FetchOutcome {
        let previous = std::mem::replace(&mut self.query, query);
        self.tabs.observe(&previous, &self.query);
        self.load().await
    }

    /// Resolve a click on `row` and move to the next tab down.
    ///
    /// Returns the query to navigate to; the caller hands it back through
    /// [`LocationsReport::set_query`].
    pub fn drill_down(&mut self, row: &BreakdownRow) -> Option<Query> {
        let drill = resolve_drill_down(&self.active_report(), row, &self.query)?;
        match self.tabs.mode() {
            origin @ (LocationsMode::Map | LocationsMode::Countries) => {
                self.tabs.on_country_drill_down(origin)
            }
            LocationsMode::Regions => self.tabs.on_region_drill_down(),
            LocationsMode::Cities => debug!(city = %row.name, "City drill-down keeps the tab"),
        }
        Some(drill.apply(&self.query))
    }
}
