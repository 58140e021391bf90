use std::time::Duration;

use anyhow::Context;
use sync_engine::{ChannelSettings, Credentials, DEFAULT_BASE_URL};

use crate::logging::LogDestination;

pub const ENV_BASE_URL: &str = "SYNC_BASE_URL";
pub const ENV_SESSION_TOKEN: &str = "SYNC_SESSION_TOKEN";
pub const ENV_TENANT_ID: &str = "SYNC_TENANT_ID";
pub const ENV_LOG: &str = "SYNC_LOG";
pub const ENV_WATCH_SECS: &str = "SYNC_WATCH_SECS";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub channel: ChannelSettings,
    /// `None` until the authentication layer has provided a session.
    pub credentials: Option<Credentials>,
    pub log_destination: LogDestination,
    /// Stop watching after this long; run until killed when unset.
    pub watch_for: Option<Duration>,
}

impl AppConfig {
    /// Reads the configuration once from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .with_context(|| format!("{ENV_BASE_URL} is not a valid URL: {base_url}"))?;

        let credentials = match (get(ENV_SESSION_TOKEN), get(ENV_TENANT_ID)) {
            (Some(token), Some(tenant)) => Some(Credentials::new(token, tenant)),
            _ => None,
        };

        let log_destination = get(ENV_LOG)
            .map(|raw| raw.parse::<LogDestination>())
            .transpose()
            .with_context(|| format!("invalid {ENV_LOG}"))?
            .unwrap_or_default();

        let watch_for = get(ENV_WATCH_SECS)
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .with_context(|| format!("{ENV_WATCH_SECS} must be a whole number of seconds"))?
            .map(Duration::from_secs);

        Ok(Self {
            channel: ChannelSettings::with_base_url(base_url),
            credentials,
            log_destination,
            watch_for,
        })
    }
}
