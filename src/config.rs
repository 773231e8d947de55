use std::time::Duration;

use crate::model::SourceId;

/// Tunables for the fetch pipeline.
///
/// The search jitter bound and the local-source threshold mirror behavior
/// observed in the wild rather than anything principled, so both are plain
/// configuration instead of constants.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Transport timeout for regular pipeline requests.
    pub request_timeout: Duration,
    /// Transport timeout for update-check probes. Deliberately much shorter
    /// than `request_timeout`: one probe runs per tracked item and a single
    /// unreachable source must not stall the whole batch.
    pub check_timeout: Duration,
    /// Upper bound (exclusive) of the random pause between streamed search
    /// results.
    pub search_jitter_max: Duration,
    /// Sources with an id at or above this value are local entries, exempt
    /// from update checking.
    pub local_source_min: SourceId,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            check_timeout: Duration::from_millis(1500),
            search_jitter_max: Duration::from_millis(200),
            local_source_min: 100,
            user_agent: concat!("comic-fetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Builds a config from `COMIC_FETCH_*` environment variables, falling
    /// back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            request_timeout: env_millis("COMIC_FETCH_REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout),
            check_timeout: env_millis("COMIC_FETCH_CHECK_TIMEOUT_MS")
                .unwrap_or(defaults.check_timeout),
            search_jitter_max: env_millis("COMIC_FETCH_SEARCH_JITTER_MS")
                .unwrap_or(defaults.search_jitter_max),
            local_source_min: std::env::var("COMIC_FETCH_LOCAL_SOURCE_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.local_source_min),
            user_agent: std::env::var("COMIC_FETCH_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Whether `source` is a local entry the update checker must skip.
    pub fn is_local_source(&self, source: SourceId) -> bool {
        source >= self.local_source_min
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}
