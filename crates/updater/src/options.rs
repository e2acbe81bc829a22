use emote_animation::MEGA_BUNDLE_NAME;
use std::time::Duration;

/// How the updater finds, fetches and schedules bundles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterOptions {
    /// Scheduled attempts run only while enabled; `force()` always runs.
    pub enabled: bool,
    /// URL whose response body is the URL of the current bundle.
    pub endpoint: String,
    /// Asset name the bundle is committed as.
    pub bundle_name: String,
    pub startup_delay: Duration,
    /// Interval between attempts until a bundle has been obtained.
    pub retry_interval: Duration,
    /// Interval between attempts once a bundle has been obtained.
    pub refresh_interval: Duration,
    pub resolve_timeout: Duration,
    pub download_timeout: Duration,
    /// Longest silence tolerated between two body chunks.
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for UpdaterOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            bundle_name: MEGA_BUNDLE_NAME.to_string(),
            startup_delay: Duration::from_secs(5),
            retry_interval: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(3600),
            resolve_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(10),
            user_agent: concat!("emote-updater/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
