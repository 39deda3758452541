//! Sub-view selection for the composite Devices and Locations reports.

use std::sync::Arc;

use tracing::info;

use crate::query::{Query, Site};
use crate::report::Report;
use crate::storage::{tab_key, KeyValueStore};

const DEVICES_KIND: &str = "device";
const LOCATIONS_KIND: &str = "geo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DevicesMode {
    #[default]
    Browser,
    Os,
    Size,
}

impl DevicesMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Os => "os",
            Self::Size => "size",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "browser" => Some(Self::Browser),
            "os" => Some(Self::Os),
            "size" => Some(Self::Size),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LocationsMode {
    #[default]
    Map,
    Countries,
    Regions,
    Cities,
}

impl LocationsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Countries => "countries",
            Self::Regions => "regions",
            Self::Cities => "cities",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "map" => Some(Self::Map),
            "countries" => Some(Self::Countries),
            "regions" => Some(Self::Regions),
            "cities" => Some(Self::Cities),
            _ => None,
        }
    }
}

/// Browser / OS / screen size tabs.
pub struct DevicesTabs {
    store: Arc<dyn KeyValueStore>,
    key: String,
    mode: DevicesMode,
}

impl DevicesTabs {
    /// Start on the tab last chosen for `site`, else `browser`.
    pub fn restore(site: &Site, store: Arc<dyn KeyValueStore>) -> Self {
        let key = tab_key(DEVICES_KIND, &site.domain);
        let mode = store
            .get_item(&key)
            .and_then(|raw| DevicesMode::parse(&raw))
            .unwrap_or_default();
        Self { store, key, mode }
    }

    pub fn mode(&self) -> DevicesMode {
        self.mode
    }

    pub fn select(&mut self, mode: DevicesMode) {
        self.store.set_item(&self.key, mode.as_str());
        self.mode = mode;
    }

    /// The report behind the active tab. Pinning a browser or OS to a single
    /// value switches its tab to the version breakdown.
    pub fn active_report(&self, query: &Query) -> Report {
        match self.mode {
            DevicesMode::Browser if query.filters.is_filtering_on_fixed_value("browser") => {
                Report::BrowserVersions
            }
            DevicesMode::Browser => Report::Browsers,
            DevicesMode::Os if query.filters.is_filtering_on_fixed_value("os") => {
                Report::OperatingSystemVersions
            }
            DevicesMode::Os => Report::OperatingSystems,
            DevicesMode::Size => Report::ScreenSizes,
        }
    }
}

/// Map / countries / regions / cities tabs with drill-down transitions.
pub struct LocationsTabs {
    store: Arc<dyn KeyValueStore>,
    key: String,
    mode: LocationsMode,
    /// Where a country drill-down came from, to return to when the country
    /// filter goes away.
    restore_mode: Option<LocationsMode>,
}

impl LocationsTabs {
    /// Start on the tab last chosen for `site`, else `map`.
    pub fn restore(site: &Site, store: Arc<dyn KeyValueStore>) -> Self {
        let key = tab_key(LOCATIONS_KIND, &site.domain);
        let mode = store
            .get_item(&key)
            .and_then(|raw| LocationsMode::parse(&raw))
            .unwrap_or_default();
        Self {
            store,
            key,
            mode,
            restore_mode: None,
        }
    }

    pub fn mode(&self) -> LocationsMode {
        self.mode
    }

    pub fn restore_mode(&self) -> Option<LocationsMode> {
        self.restore_mode
    }

    pub fn select(&mut self, mode: LocationsMode) {
        self.store.set_item(&self.key, mode.as_str());
        self.mode = mode;
    }

    pub fn on_country_drill_down(&mut self, origin: LocationsMode) {
        self.restore_mode = Some(origin);
        self.select(LocationsMode::Regions);
    }

    pub fn on_region_drill_down(&mut self) {
        self.select(LocationsMode::Cities);
    }

    /// Snap back to a coarser tab when the filter the current tab depends on
    /// disappeared between `previous` and `current`, however it was removed.
    ///
    /// Both checks look at the mode the observation started in, so at most
    /// one transition happens per query change. Returns the new mode, if any.
    pub fn observe(&mut self, previous: &Query, current: &Query) -> Option<LocationsMode> {
        let removed = |prefix: &str| {
            previous.filters.has_prefix(prefix) && !current.filters.has_prefix(prefix)
        };

        let next = match self.mode {
            LocationsMode::Cities if removed("region") => Some(LocationsMode::Regions),
            LocationsMode::Regions if removed("country") => {
                Some(self.restore_mode.unwrap_or(LocationsMode::Countries))
            }
            _ => None,
        };

        if let Some(mode) = next {
            info!(from = self.mode.as_str(), to = mode.as_str(), "Location filter removed; switching tab");
            self.select(mode);
        }
        next
    }

    pub fn active_report(&self) -> Report {
        match self.mode {
            LocationsMode::Map => Report::CountryMap,
            LocationsMode::Countries => Report::Countries,
            LocationsMode::Regions => Report::Regions,
            LocationsMode::Cities => Report::Cities,
        }
    }
}
