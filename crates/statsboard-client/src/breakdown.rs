//! The fetch cycle shared by every breakdown view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use statsboard_core::breakdown::{BreakdownRow, FetchResult};
use statsboard_core::query::{Query, Site};
use statsboard_core::report::Report;

use crate::api::{api_path, decode, StatsApi};

/// Called with every result that wins the last-request race.
pub type AfterFetchHook = Arc<dyn Fn(&FetchResult, &Query) + Send + Sync>;

/// Hook that records whether the latest result left imported data out.
pub fn imported_flag_hook(flag: &Arc<AtomicBool>) -> AfterFetchHook {
    let flag = Arc::clone(flag);
    Arc::new(move |result: &FetchResult, query: &Query| {
        flag.store(result.imported_query_unsupported(query), Ordering::Relaxed);
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Loaded(FetchResult),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded,
    Failed,
    /// A newer request started before this one resolved; its result was
    /// dropped.
    Superseded,
    /// Same endpoint and serialized query as the current request.
    Unchanged,
}

#[derive(Default)]
struct ViewInner {
    state: FetchState,
    generation: u64,
    last_request: Option<String>,
}

/// `Idle -> Loading -> Loaded | Failed` for one breakdown.
///
/// Requests are numbered; only the latest one may write the state, so a slow
/// response for an old query never overwrites a newer result. In-flight
/// calls are not cancelled.
pub struct BreakdownView<A: ?Sized = dyn StatsApi> {
    api: Arc<A>,
    site: Site,
    after_fetch: Option<AfterFetchHook>,
    inner: Mutex<ViewInner>,
}

impl<A: StatsApi + ?Sized> BreakdownView<A> {
    pub fn new(api: Arc<A>, site: Site) -> Self {
        Self {
            api,
            site,
            after_fetch: None,
            inner: Mutex::new(ViewInner::default()),
        }
    }

    pub fn with_after_fetch(mut self, hook: AfterFetchHook) -> Self {
        self.after_fetch = Some(hook);
        self
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub async fn state(&self) -> FetchState {
        self.inner.lock().await.state.clone()
    }

    /// Rows of the last successful fetch; empty while loading or failed.
    pub async fn rows(&self) -> Vec<BreakdownRow> {
        match &self.inner.lock().await.state {
            FetchState::Loaded(result) => result.results.clone(),
            _ => Vec::new(),
        }
    }

    /// Fetch `report` for `query` unless that exact request is already the
    /// current one.
    pub async fn fetch(&self, report: &Report, query: &Query) -> FetchOutcome {
        self.fetch_with(&report.endpoint(), query, &report.default_params())
            .await
    }

    pub async fn fetch_with(
        &self,
        endpoint: &str,
        query: &Query,
        extra_params: &[(&str, String)],
    ) -> FetchOutcome {
        self.run(endpoint, query, extra_params, false).await
    }

    /// Fetch even if the request matches the current one.
    pub async fn refresh(&self, report: &Report, query: &Query) -> FetchOutcome {
        self.refresh_with(&report.endpoint(), query, &report.default_params())
            .await
    }

    pub async fn refresh_with(
        &self,
        endpoint: &str,
        query: &Query,
        extra_params: &[(&str, String)],
    ) -> FetchOutcome {
        self.run(endpoint, query, extra_params, true).await
    }

    async fn run(
        &self,
        endpoint: &str,
        query: &Query,
        extra_params: &[(&str, String)],
        force: bool,
    ) -> FetchOutcome {
        let key = request_key(endpoint, query, extra_params);
        let generation = {
            let mut inner = self.inner.lock().await;
            if !force && inner.last_request.as_deref() == Some(key.as_str()) {
                return FetchOutcome::Unchanged;
            }
            inner.generation += 1;
            inner.last_request = Some(key);
            inner.state = FetchState::Loading;
            inner.generation
        };

        let path = api_path(&self.site, endpoint);
        debug!(%path, generation, "Fetching breakdown");
        let result = match self.api.get(&path, query, extra_params).await {
            Ok(payload) => decode(payload),
            Err(e) => Err(e),
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(%path, generation, latest = inner.generation, "Discarding stale breakdown response");
            return FetchOutcome::Superseded;
        }

        match result {
            Ok(result) => {
                debug!(%path, rows = result.results.len(), "Breakdown loaded");
                if let Some(hook) = &self.after_fetch {
                    hook(&result, query);
                }
                inner.state = FetchState::Loaded(result);
                FetchOutcome::Loaded
            }
            Err(e) => {
                warn!(%path, error = %e, "Breakdown fetch failed");
                inner.state = FetchState::Failed(e.to_string());
                FetchOutcome::Failed
            }
        }
    }
}

fn request_key(endpoint: &str, query: &Query, extra_params: &[(&str, String)]) -> String {
    let mut key = format!("{endpoint}?{}", query.to_query_string());
    for (name, value) in extra_params {
        key.push('&');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}
