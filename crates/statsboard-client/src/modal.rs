//! Full-page views behind the compact breakdown lists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use statsboard_core::breakdown::{BreakdownRow, FetchResult};
use statsboard_core::drilldown::resolve_drill_down;
use statsboard_core::metrics::{detail_table_metrics, prop_breakdown_metrics, Capabilities, Metric};
use statsboard_core::query::{Query, Site};
use statsboard_core::report::{Icon, Report};

use crate::api::{api_path, decode, StatsApi};
use crate::breakdown::{BreakdownView, FetchOutcome};

/// Rows per request for the non-paginated detail table.
pub const DETAIL_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page loaded and this many rows were appended.
    Appended(usize),
    /// A page fetch is still outstanding; nothing was issued.
    AlreadyLoading,
    /// The last page came back short; there is nothing more to load.
    Exhausted,
    Failed(String),
}

#[derive(Default)]
struct PageInner {
    rows: Vec<BreakdownRow>,
    pages_loaded: usize,
    more_results_available: bool,
    last_result: Option<FetchResult>,
}

/// Clears the loading flag however the page fetch ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Incrementally paginated breakdown, used for custom property values.
///
/// Pages are appended, never replaced. Whether another page exists is
/// guessed from the size of the last one: a full page means "maybe more",
/// so a final page of exactly `page_size` rows yields one empty extra load.
/// A page size of zero is treated as one.
pub struct PagedList<A: ?Sized = dyn StatsApi> {
    api: Arc<A>,
    site: Site,
    report: Report,
    query: Query,
    capabilities: Capabilities,
    page_size: usize,
    loading: AtomicBool,
    inner: Mutex<PageInner>,
}

impl<A: StatsApi + ?Sized> PagedList<A> {
    pub fn new(
        api: Arc<A>,
        site: Site,
        report: Report,
        query: Query,
        capabilities: Capabilities,
        page_size: usize,
    ) -> Self {
        Self {
            api,
            site,
            report,
            query,
            capabilities,
            page_size: page_size.max(1),
            loading: AtomicBool::new(false),
            inner: Mutex::new(PageInner::default()),
        }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub async fn rows(&self) -> Vec<BreakdownRow> {
        self.inner.lock().await.rows.clone()
    }

    pub async fn more_results_available(&self) -> bool {
        self.inner.lock().await.more_results_available
    }

    pub async fn pages_loaded(&self) -> usize {
        self.inner.lock().await.pages_loaded
    }

    pub async fn imported_query_unsupported(&self) -> bool {
        self.inner
            .lock()
            .await
            .last_result
            .as_ref()
            .is_some_and(|result| result.imported_query_unsupported(&self.query))
    }

    /// Columns for the rows loaded so far. Revenue columns need both the
    /// capability and at least one row that carries revenue.
    pub async fn columns(&self) -> Vec<Metric> {
        match &self.report {
            Report::CustomPropValues(_) => {
                let inner = self.inner.lock().await;
                prop_breakdown_metrics(&self.query, &self.capabilities, &inner.rows)
            }
            other => other.metrics(&self.query, &self.capabilities),
        }
    }

    /// Dashboard link a click on `row` navigates to.
    pub fn drill_down_link(&self, row: &BreakdownRow) -> Option<String> {
        resolve_drill_down(&self.report, row, &self.query)
            .map(|drill| drill.link(&self.query, &self.site))
    }

    /// Load the next page. A call made while another page is in flight is a
    /// no-op.
    pub async fn load_next_page(&self) -> PageOutcome {
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(endpoint = %self.report.endpoint(), "Page load already in flight");
            return PageOutcome::AlreadyLoading;
        }
        let _guard = LoadingGuard(&self.loading);

        let page = {
            let inner = self.inner.lock().await;
            if inner.pages_loaded > 0 && !inner.more_results_available {
                return PageOutcome::Exhausted;
            }
            inner.pages_loaded + 1
        };

        let path = api_path(&self.site, &self.report.endpoint());
        let extra = [
            ("limit", self.page_size.to_string()),
            ("page", page.to_string()),
        ];
        let result = match self.api.get(&path, &self.query, &extra).await {
            Ok(payload) => decode(payload),
            Err(e) => Err(e),
        };

        match result {
            Ok(result) => {
                let appended = result.results.len();
                let mut inner = self.inner.lock().await;
                inner.pages_loaded = page;
                inner.more_results_available = appended >= self.page_size;
                inner.rows.extend(result.results.iter().cloned());
                inner.last_result = Some(result);
                debug!(%path, page, appended, "Page appended");
                PageOutcome::Appended(appended)
            }
            Err(e) => {
                warn!(%path, page, error = %e, "Page fetch failed");
                PageOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Top rows of a location breakdown in one request, with the goal-aware
/// column set.
pub struct DetailTable<A: ?Sized = dyn StatsApi> {
    view: BreakdownView<A>,
    report: Report,
    show_percentage: bool,
}

impl<A: StatsApi + ?Sized> DetailTable<A> {
    pub fn new(api: Arc<A>, site: Site, report: Report, show_percentage: bool) -> Self {
        Self {
            view: BreakdownView::new(api, site),
            report,
            show_percentage,
        }
    }

    pub fn view(&self) -> &BreakdownView<A> {
        &self.view
    }

    pub async fn load(&self, query: &Query) -> FetchOutcome {
        self.view
            .fetch_with(
                &self.report.endpoint(),
                query,
                &[("limit", DETAIL_LIMIT.to_string())],
            )
            .await
    }

    pub fn columns(&self, query: &Query) -> Vec<Metric> {
        detail_table_metrics(query, self.show_percentage)
    }

    pub fn icon(&self, row: &BreakdownRow) -> Option<Icon> {
        self.report.icon(row)
    }

    /// Dashboard link a click on `row` navigates to, built from the query
    /// the table was loaded with.
    pub fn drill_down_link(&self, row: &BreakdownRow, query: &Query) -> Option<String> {
        resolve_drill_down(&self.report, row, query)
            .map(|drill| drill.link(query, self.view.site()))
    }
}
