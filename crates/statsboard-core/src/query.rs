//! The analytic query and its flat query-string form.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;
use url::form_urlencoded;

use crate::filters::{Filter, FilterSet, Labels};
use crate::storage::{period_key, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
    Realtime,
    Day,
    Month,
    SevenDays,
    #[default]
    ThirtyDays,
    SixMonths,
    TwelveMonths,
    Year,
    All,
    Custom,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Day => "day",
            Self::Month => "month",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::SixMonths => "6mo",
            Self::TwelveMonths => "12mo",
            Self::Year => "year",
            Self::All => "all",
            Self::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "realtime" => Some(Self::Realtime),
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            "7d" => Some(Self::SevenDays),
            "30d" => Some(Self::ThirtyDays),
            "6mo" => Some(Self::SixMonths),
            "12mo" => Some(Self::TwelveMonths),
            "year" => Some(Self::Year),
            "all" => Some(Self::All),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Custom ranges and realtime are one-off views, not site preferences.
    fn is_remembered(self) -> bool {
        !matches!(self, Self::Custom | Self::Realtime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonMode {
    PreviousPeriod,
    YearOverYear,
    Custom,
}

impl ComparisonMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreviousPeriod => "previous_period",
            Self::YearOverYear => "year_over_year",
            Self::Custom => "custom",
        }
    }

    /// `off` and unknown modes both mean "no comparison".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "previous_period" => Some(Self::PreviousPeriod),
            "year_over_year" => Some(Self::YearOverYear),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// The site a dashboard is rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub domain: String,
    pub timezone: String,
}

impl Site {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            timezone: "UTC".to_string(),
        }
    }

    /// Today's date in the site's timezone, falling back to UTC.
    pub fn today(&self) -> NaiveDate {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => chrono::Utc::now().with_timezone(&tz).date_naive(),
            Err(_) => {
                warn!(timezone = %self.timezone, "Unknown site timezone; using UTC");
                chrono::Utc::now().date_naive()
            }
        }
    }

    /// Dashboard path for the site, `/<encoded domain>`.
    pub fn base_path(&self) -> String {
        let encoded: String = form_urlencoded::byte_serialize(self.domain.as_bytes()).collect();
        format!("/{encoded}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub period: Period,
    /// Anchor date for relative periods; `None` means "today for the site".
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub comparison: Option<ComparisonMode>,
    pub compare_from: Option<NaiveDate>,
    pub compare_to: Option<NaiveDate>,
    pub match_day_of_week: bool,
    pub with_imported: bool,
    pub filters: FilterSet,
    pub labels: Labels,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            period: Period::default(),
            date: None,
            from: None,
            to: None,
            comparison: None,
            compare_from: None,
            compare_to: None,
            match_day_of_week: false,
            with_imported: true,
            filters: FilterSet::new(),
            labels: Labels::new(),
        }
    }
}

/// Fields to overwrite when deriving a new query from the current one.
#[derive(Debug, Clone, Default)]
pub struct QueryUpdate {
    pub period: Option<Period>,
    pub date: Option<NaiveDate>,
    pub comparison: Option<Option<ComparisonMode>>,
    pub with_imported: Option<bool>,
    pub filters: Option<FilterSet>,
    pub labels: Option<Labels>,
}

impl Query {
    /// Parse the serialized form. Unknown keys are ignored, malformed filter
    /// entries are skipped and everything else falls back to defaults.
    pub fn parse(raw: &str, site: &Site) -> Self {
        Self::parse_inner(raw, site, None)
    }

    /// Like [`Query::parse`], but a missing period falls back to the one last
    /// used on this site, and an explicit one is remembered.
    pub fn parse_with_store(raw: &str, site: &Site, store: &dyn KeyValueStore) -> Self {
        Self::parse_inner(raw, site, Some(store))
    }

    fn parse_inner(raw: &str, site: &Site, store: Option<&dyn KeyValueStore>) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut query = Query::default();
        let mut period = None;

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "period" => period = Period::parse(&value),
                "date" => query.date = parse_date(&value, "date"),
                "from" => query.from = parse_date(&value, "from"),
                "to" => query.to = parse_date(&value, "to"),
                "comparison" => query.comparison = ComparisonMode::parse(&value),
                "compare_from" => query.compare_from = parse_date(&value, "compare_from"),
                "compare_to" => query.compare_to = parse_date(&value, "compare_to"),
                "match_day_of_week" => query.match_day_of_week = value == "true",
                "with_imported" => query.with_imported = value != "false",
                "filters" => query.filters = parse_filters(&value),
                "labels" => query.labels = parse_labels(&value),
                _ => {}
            }
        }

        query.period = resolve_period(period, site, store);
        query.normalize();
        query
    }

    fn normalize(&mut self) {
        if self.period == Period::Realtime {
            self.comparison = None;
        }
    }

    pub fn is_realtime(&self) -> bool {
        self.period == Period::Realtime
    }

    pub fn has_goal_filter(&self) -> bool {
        self.filters.has_goal_filter()
    }

    pub fn resolved_date(&self, site: &Site) -> NaiveDate {
        self.date.unwrap_or_else(|| site.today())
    }

    /// Canonical serialized form; `Query::parse` of it yields `self` back.
    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        out.append_pair("period", self.period.as_str());
        self.append_dates(&mut out);
        if self.match_day_of_week {
            out.append_pair("match_day_of_week", "true");
        }
        if !self.with_imported {
            out.append_pair("with_imported", "false");
        }
        if !self.filters.is_empty() {
            out.append_pair("filters", &self.filters.to_json().to_string());
        }
        if !self.labels.is_empty() {
            out.append_pair("labels", &self.labels.to_json().to_string());
        }
        out.finish()
    }

    /// Parameters sent to the stats API. Labels are a display concern and
    /// stay client-side.
    pub fn api_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("period", self.period.as_str().to_string())];
        let optional_dates = [
            ("date", self.date),
            ("from", self.from),
            ("to", self.to),
        ];
        params.extend(
            optional_dates
                .into_iter()
                .filter_map(|(key, date)| date.map(|d| (key, d.to_string()))),
        );
        if let Some(mode) = self.comparison {
            params.push(("comparison", mode.as_str().to_string()));
            let compare_dates = [
                ("compare_from", self.compare_from),
                ("compare_to", self.compare_to),
            ];
            params.extend(
                compare_dates
                    .into_iter()
                    .filter_map(|(key, date)| date.map(|d| (key, d.to_string()))),
            );
            params.push(("match_day_of_week", self.match_day_of_week.to_string()));
        }
        params.push(("with_imported", self.with_imported.to_string()));
        params.push(("filters", self.filters.to_json().to_string()));
        params
    }

    pub fn merged(&self, update: QueryUpdate) -> Query {
        let mut next = self.clone();
        if let Some(period) = update.period {
            next.period = period;
        }
        if let Some(date) = update.date {
            next.date = Some(date);
        }
        if let Some(comparison) = update.comparison {
            next.comparison = comparison;
        }
        if let Some(with_imported) = update.with_imported {
            next.with_imported = with_imported;
        }
        if let Some(filters) = update.filters {
            next.filters = filters;
        }
        if let Some(labels) = update.labels {
            next.labels = labels;
        }
        next.normalize();
        next
    }

    /// Serialized form of this query with `update` applied, for links.
    pub fn updated(&self, update: QueryUpdate) -> String {
        self.merged(update).to_query_string()
    }

    fn append_dates(&self, out: &mut form_urlencoded::Serializer<'_, String>) {
        let dates = [
            ("date", self.date),
            ("from", self.from),
            ("to", self.to),
        ];
        for (key, date) in dates {
            if let Some(date) = date {
                out.append_pair(key, &date.to_string());
            }
        }
        if let Some(mode) = self.comparison {
            out.append_pair("comparison", mode.as_str());
        }
        let compare_dates = [
            ("compare_from", self.compare_from),
            ("compare_to", self.compare_to),
        ];
        for (key, date) in compare_dates {
            if let Some(date) = date {
                out.append_pair(key, &date.to_string());
            }
        }
    }
}

fn resolve_period(
    explicit: Option<Period>,
    site: &Site,
    store: Option<&dyn KeyValueStore>,
) -> Period {
    let key = period_key(&site.domain);
    match (explicit, store) {
        (Some(period), Some(store)) => {
            if period.is_remembered() {
                store.set_item(&key, period.as_str());
            }
            period
        }
        (Some(period), None) => period,
        (None, Some(store)) => store
            .get_item(&key)
            .and_then(|raw| Period::parse(&raw))
            .unwrap_or_default(),
        (None, None) => Period::default(),
    }
}

fn parse_date(raw: &str, field: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(field, value = raw, "Ignoring invalid date (expected YYYY-MM-DD)");
            None
        }
    }
}

fn parse_filters(raw: &str) -> FilterSet {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) | Err(_) => {
            warn!(filters = raw, "Ignoring filters that are not a JSON array");
            return FilterSet::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|entry| {
            let shown = entry.to_string();
            match serde_json::from_value::<Filter>(entry) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    warn!(filter = %shown, error = %e, "Skipping malformed filter");
                    None
                }
            }
        })
        .collect()
}

fn parse_labels(raw: &str) -> Labels {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(value, label)| match label {
                Value::String(label) => Some((value, label)),
                _ => None,
            })
            .collect(),
        Ok(_) | Err(_) => {
            warn!(labels = raw, "Ignoring labels that are not a JSON object");
            Labels::new()
        }
    }
}
