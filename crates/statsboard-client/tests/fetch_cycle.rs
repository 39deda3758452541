mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use statsboard_client::breakdown::{imported_flag_hook, BreakdownView, FetchOutcome, FetchState};
use statsboard_core::breakdown::FetchResult;
use statsboard_core::query::{Period, Query, Site};
use statsboard_core::report::Report;

use common::FakeApi;

fn query(period: Period) -> Query {
    Query {
        period,
        ..Query::default()
    }
}

#[tokio::test]
async fn test_fetch_loads_rows_from_report_endpoint() {
    let api = FakeApi::new();
    let view = BreakdownView::new(Arc::clone(&api), Site::new("example.com"));

    assert_eq!(view.state().await, FetchState::Idle);
    let outcome = view.fetch(&Report::Countries, &Query::default()).await;
    assert_eq!(outcome, FetchOutcome::Loaded);

    let rows = view.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "30d");

    let calls = api.calls();
    assert_eq!(calls[0].path, "/api/stats/example.com/countries");
    assert_eq!(calls[0].extra, vec![("limit".to_string(), "9".to_string())]);
}

// ============================================================
// Last request wins: a slow response for an old query is dropped
// ============================================================
#[tokio::test]
async fn test_stale_response_does_not_overwrite_newer_result() {
    let api = FakeApi::new();
    let view = Arc::new(BreakdownView::new(
        Arc::clone(&api),
        Site::new("example.com"),
    ));
    let query_a = query(Period::SevenDays);
    let query_b = query(Period::TwelveMonths);
    let gate_a = api.gate(&query_a);

    let slow = tokio::spawn({
        let view = Arc::clone(&view);
        let query_a = query_a.clone();
        async move { view.fetch(&Report::Browsers, &query_a).await }
    });
    api.wait_for_calls(1).await;
    assert_eq!(view.state().await, FetchState::Loading);

    let fast = view.fetch(&Report::Browsers, &query_b).await;
    assert_eq!(fast, FetchOutcome::Loaded);

    gate_a.notify_one();
    let slow = slow.await.expect("join");
    assert_eq!(slow, FetchOutcome::Superseded);

    let rows = view.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "12mo");
}

#[tokio::test]
async fn test_same_query_is_not_refetched() {
    let api = FakeApi::new();
    let view = BreakdownView::new(Arc::clone(&api), Site::new("example.com"));

    assert_eq!(
        view.fetch(&Report::Browsers, &Query::default()).await,
        FetchOutcome::Loaded
    );
    // Equal by serialized form, not identity.
    let copy = Query::parse(&Query::default().to_query_string(), view.site());
    assert_eq!(
        view.fetch(&Report::Browsers, &copy).await,
        FetchOutcome::Unchanged
    );
    assert_eq!(api.calls().len(), 1);

    assert_eq!(
        view.refresh(&Report::Browsers, &copy).await,
        FetchOutcome::Loaded
    );
    assert_eq!(api.calls().len(), 2);
}

#[tokio::test]
async fn test_transport_failure_ends_in_failed_state() {
    let api = FakeApi::new();
    api.fail("/api/stats/example.com/browsers");
    let view = BreakdownView::new(Arc::clone(&api), Site::new("example.com"));

    let outcome = view.fetch(&Report::Browsers, &Query::default()).await;
    assert_eq!(outcome, FetchOutcome::Failed);
    match view.state().await {
        FetchState::Failed(message) => assert!(message.contains("boom")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(view.rows().await.is_empty());
}

#[tokio::test]
async fn test_failure_in_one_view_leaves_siblings_alone() {
    let api = FakeApi::new();
    api.fail("/api/stats/example.com/cities");
    let site = Site::new("example.com");
    let cities = BreakdownView::new(Arc::clone(&api), site.clone());
    let browsers = BreakdownView::new(Arc::clone(&api), site);

    let query = Query::default();
    let (a, b) = tokio::join!(
        cities.fetch(&Report::Cities, &query),
        browsers.fetch(&Report::Browsers, &query),
    );
    assert_eq!(a, FetchOutcome::Failed);
    assert_eq!(b, FetchOutcome::Loaded);
    assert_eq!(browsers.rows().await.len(), 1);
}

#[tokio::test]
async fn test_after_fetch_hook_runs_for_winning_result_only() {
    let api = FakeApi::new();
    api.skip_imported("unsupported_query");
    let calls = Arc::new(AtomicUsize::new(0));
    let warned = Arc::new(AtomicUsize::new(0));

    let view = BreakdownView::new(Arc::clone(&api), Site::new("example.com"))
        .with_after_fetch(Arc::new({
            let calls = Arc::clone(&calls);
            let warned = Arc::clone(&warned);
            move |result: &FetchResult, query: &Query| {
                calls.fetch_add(1, Ordering::SeqCst);
                if result.imported_query_unsupported(query) {
                    warned.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));

    view.fetch(&Report::Browsers, &Query::default()).await;
    view.fetch(&Report::Browsers, &query(Period::Realtime)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        warned.load(Ordering::SeqCst),
        1,
        "realtime never warns about imported data"
    );
}

#[tokio::test]
async fn test_imported_flag_hook_tracks_latest_result() {
    let api = FakeApi::new();
    api.skip_imported("unsupported_query");
    let flag = Arc::new(AtomicBool::new(false));
    let view = BreakdownView::new(Arc::clone(&api), Site::new("example.com"))
        .with_after_fetch(imported_flag_hook(&flag));

    view.fetch(&Report::Browsers, &Query::default()).await;
    assert!(flag.load(Ordering::Relaxed));

    view.fetch(&Report::Browsers, &query(Period::Realtime)).await;
    assert!(!flag.load(Ordering::Relaxed), "the flag follows the newest result");
}
