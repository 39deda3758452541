use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::json;
use tracing::info;

use statsboard_client::breakdown::{imported_flag_hook, BreakdownView, FetchOutcome, FetchState};
use statsboard_client::devices::DevicesReport;
use statsboard_client::locations::LocationsReport;
use statsboard_client::modal::{PageOutcome, PagedList};
use statsboard_client::{HttpStatsApi, StatsApi};
use statsboard_core::breakdown::BreakdownRow;
use statsboard_core::config::Config;
use statsboard_core::metrics::Metric;
use statsboard_core::query::{Query, Site};
use statsboard_core::report::Report;
use statsboard_core::storage::{JsonFileStore, KeyValueStore};

const USAGE: &str = "usage: statsboard <devices|locations|props|REPORT> [query-string] [prop-key]";

fn report_from_slug(slug: &str) -> Option<Report> {
    match slug {
        "browsers" => Some(Report::Browsers),
        "browser-versions" => Some(Report::BrowserVersions),
        "operating-systems" => Some(Report::OperatingSystems),
        "operating-system-versions" => Some(Report::OperatingSystemVersions),
        "screen-sizes" => Some(Report::ScreenSizes),
        "countries" => Some(Report::Countries),
        "regions" => Some(Report::Regions),
        "cities" => Some(Report::Cities),
        "conversions" => Some(Report::Conversions),
        _ => None,
    }
}

/// Turn the final fetch state into rows, or fail the command.
async fn loaded_rows(view: &BreakdownView, outcome: FetchOutcome) -> Result<Vec<BreakdownRow>> {
    match view.state().await {
        FetchState::Loaded(result) => Ok(result.results),
        FetchState::Failed(message) => bail!("fetch failed: {message}"),
        other => bail!("fetch ended in {other:?} ({outcome:?})"),
    }
}

struct Rendered<'a> {
    report: &'a Report,
    query: &'a Query,
    site: &'a Site,
}

impl Rendered<'_> {
    fn to_json(
        &self,
        columns: &[Metric],
        rows: &[BreakdownRow],
        imported_query_unsupported: bool,
    ) -> String {
        let details = self.report.details_path().map(|path| {
            format!(
                "{}{path}?{}",
                self.site.base_path(),
                self.query.to_query_string()
            )
        });
        json!({
            "report": self.report.key_label(),
            "date": self.query.resolved_date(self.site).to_string(),
            "details": details,
            "columns": columns,
            "rows": rows,
            "imported_query_unsupported": imported_query_unsupported,
        })
        .to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(report_arg) = args.get(1) else {
        bail!(USAGE);
    };
    let raw_query = args.get(2).map(String::as_str).unwrap_or("");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("statsboard=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let site = cfg.site();
    let capabilities = cfg.capabilities();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&cfg.state_path));
    let api: Arc<dyn StatsApi> = Arc::new(HttpStatsApi::from_config(&cfg)?);
    let query = Query::parse_with_store(raw_query, &site, store.as_ref());

    info!(site = %site.domain, report = %report_arg, "Rendering breakdown");

    let output = match report_arg.as_str() {
        "devices" => {
            let devices = DevicesReport::new(api, site.clone(), store, capabilities, query);
            let outcome = devices.load().await;
            let rows = loaded_rows(devices.view(), outcome).await?;
            let report = devices.active_report();
            Rendered {
                report: &report,
                query: devices.query(),
                site: &site,
            }
            .to_json(&devices.metrics(), &rows, devices.imported_query_unsupported())
        }
        "locations" => {
            let locations = LocationsReport::new(api, site.clone(), store, capabilities, query);
            let outcome = locations.load().await;
            let rows = loaded_rows(locations.view(), outcome).await?;
            let report = locations.active_report();
            Rendered {
                report: &report,
                query: locations.query(),
                site: &site,
            }
            .to_json(
                &locations.metrics(),
                &rows,
                locations.imported_query_unsupported(),
            )
        }
        "props" => {
            let Some(prop_key) = args.get(3) else {
                bail!(USAGE);
            };
            let report = Report::CustomPropValues(prop_key.clone());
            let list = PagedList::new(
                api,
                site.clone(),
                report.clone(),
                query.clone(),
                capabilities,
                cfg.page_size,
            );
            if let PageOutcome::Failed(message) = list.load_next_page().await {
                bail!("fetch failed: {message}");
            }
            Rendered {
                report: &report,
                query: &query,
                site: &site,
            }
            .to_json(
                &list.columns().await,
                &list.rows().await,
                list.imported_query_unsupported().await,
            )
        }
        slug => {
            let Some(report) = report_from_slug(slug) else {
                bail!("unknown report {slug:?}\n{USAGE}");
            };
            let unsupported = Arc::new(AtomicBool::new(false));
            let view = BreakdownView::new(api, site.clone())
                .with_after_fetch(imported_flag_hook(&unsupported));
            let outcome = view.fetch(&report, &query).await;
            let rows = loaded_rows(&view, outcome).await?;
            Rendered {
                report: &report,
                query: &query,
                site: &site,
            }
            .to_json(
                &report.metrics(&query, &capabilities),
                &rows,
                unsupported.load(Ordering::Relaxed),
            )
        }
    };

    println!("{output}");
    Ok(())
}
