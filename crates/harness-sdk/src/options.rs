use serde::Deserialize;

pub(crate) const DEFAULT_CONFIG_CDN_URI: &str = "https://config-cdn.devcycle.com";
pub(crate) const DEFAULT_EVENTS_API_URI: &str = "https://events.devcycle.com";
pub(crate) const DEFAULT_BUCKETING_API_URI: &str = "https://bucketing-api.devcycle.com";

/// Client construction options as sent by the test driver.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ClientOptions {
    #[serde(rename = "configCDNURI", default)]
    pub config_cdn_uri: Option<String>,
    #[serde(rename = "eventsAPIURI", default)]
    pub events_api_uri: Option<String>,
    #[serde(rename = "bucketingAPIURI", default)]
    pub bucketing_api_uri: Option<String>,
    #[serde(rename = "enableEdgeDB", default)]
    pub enable_edge_db: bool,
    #[serde(rename = "configPollingIntervalMS", default)]
    pub config_polling_interval_ms: Option<u64>,
    #[serde(rename = "eventFlushIntervalMS", default)]
    pub event_flush_interval_ms: Option<u64>,
}

impl ClientOptions {
    pub(crate) fn config_cdn_base(&self) -> &str {
        base_or(&self.config_cdn_uri, DEFAULT_CONFIG_CDN_URI)
    }

    pub(crate) fn events_api_base(&self) -> &str {
        base_or(&self.events_api_uri, DEFAULT_EVENTS_API_URI)
    }

    pub(crate) fn bucketing_api_base(&self) -> &str {
        base_or(&self.bucketing_api_uri, DEFAULT_BUCKETING_API_URI)
    }
}

fn base_or<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback)
        .trim_end_matches('/')
}
