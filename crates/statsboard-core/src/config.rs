use std::time::Duration;

use crate::metrics::Capabilities;
use crate::query::Site;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub site_domain: String,
    pub site_timezone: String,
    /// Build/deployment capability gating the revenue columns.
    pub revenue_enabled: bool,
    pub state_path: String,
    pub page_size: usize,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            api_url: std::env::var("STATSBOARD_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            site_domain: std::env::var("STATSBOARD_SITE")
                .unwrap_or_else(|_| "localhost".to_string()),
            site_timezone: std::env::var("STATSBOARD_SITE_TIMEZONE")
                .unwrap_or_else(|_| "UTC".to_string()),
            revenue_enabled: std::env::var("STATSBOARD_REVENUE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            state_path: std::env::var("STATSBOARD_STATE_PATH")
                .unwrap_or_else(|_| "./statsboard-state.json".to_string()),
            page_size: parse_page_size(
                &std::env::var("STATSBOARD_PAGE_SIZE").unwrap_or_else(|_| "100".to_string()),
            )?,
            request_timeout_secs: parse_timeout_secs(
                &std::env::var("STATSBOARD_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string()),
            )?,
        })
    }

    pub fn site(&self) -> Site {
        Site {
            domain: self.site_domain.clone(),
            timezone: self.site_timezone.clone(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            revenue_enabled: self.revenue_enabled,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Rows per page in paginated lists. Zero would never fill a page.
fn parse_page_size(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("invalid page size: must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(format!("invalid page size: {e}")),
    }
}

fn parse_timeout_secs(raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse()
        .map_err(|e| format!("invalid request timeout: {e}"))
}
