use derive_more::Display;
use serde::Serialize;

/// Where an update attempt currently is.
///
/// `Idle` covers both "last attempt succeeded" and "last attempt failed";
/// [`UpdaterStatus::last_error`] tells them apart.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdaterState {
    #[default]
    #[display("idle")]
    Idle,
    #[display("resolving")]
    Resolving,
    #[display("downloading")]
    Downloading,
    #[display("validating")]
    Validating,
    #[display("committing")]
    Committing,
}

/// Link state reported by whatever manages the network interface.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    #[display("online")]
    Online,
    #[display("offline")]
    Offline,
}

/// Snapshot of the updater's counters and flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UpdaterStatus {
    pub state: UpdaterState,
    pub enabled: bool,
    /// The background worker is alive.
    pub running: bool,
    pub online: bool,
    /// A bundle has been committed at some point (persisted in the manifest).
    pub obtained: bool,
    pub check_count: u64,
    pub update_count: u64,
    pub error_count: u64,
    /// Unix timestamp of the last attempt.
    pub last_check_time: Option<u64>,
    /// Unix timestamp of the last commit.
    pub last_update_time: Option<u64>,
    /// Why the last attempt failed; cleared by a successful one.
    pub last_error: Option<String>,
}
