use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use statsboard_core::breakdown::BreakdownRow;
use statsboard_core::drilldown::resolve_drill_down;
use statsboard_core::metrics::{Capabilities, Metric};
use statsboard_core::query::{Query, Site};
use statsboard_core::report::Report;
use statsboard_core::storage::KeyValueStore;
use statsboard_core::tabs::{DevicesMode, DevicesTabs};

use crate::api::StatsApi;
use crate::breakdown::{imported_flag_hook, BreakdownView, FetchOutcome};

/// Browser / OS / screen size breakdown with persisted tab choice.
pub struct DevicesReport<A: ?Sized = dyn StatsApi> {
    tabs: DevicesTabs,
    view: Arc<BreakdownView<A>>,
    imported_unsupported: Arc<AtomicBool>,
    capabilities: Capabilities,
    query: Query,
}

impl<A: StatsApi + ?Sized> DevicesReport<A> {
    pub fn new(
        api: Arc<A>,
        site: Site,
        store: Arc<dyn KeyValueStore>,
        capabilities: Capabilities,
        query: Query,
    ) -> Self {
        let imported_unsupported = Arc::new(AtomicBool::new(false));
        let tabs = DevicesTabs::restore(&site, store);
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

    pub fn mode(&self) -> DevicesMode {
        self.tabs.mode()
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn active_report(&self) -> Report {
        self.tabs.active_report(&self.query)
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

    pub async fn select_tab(&mut self, mode: DevicesMode) -> FetchOutcome {
        self.tabs.select(mode);
        self.load().await
    }

    pub async fn set_query(&mut self, query: Query) -> FetchOutcome {
        self.query = query;
        self.load().await
    }

    /// The query a click on `row` leads to, or `None` if the row is not
    /// clickable.
    pub fn drill_down(&self, row: &BreakdownRow) -> Option<Query> {
        resolve_drill_down(&self.active_report(), row, &self.query)
            .map(|drill| drill.apply(&self.query))
    }
}
