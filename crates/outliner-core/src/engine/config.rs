use std::time::Duration;
use thiserror::Error;

const DEFAULT_VISIBILITY_INTERVAL: Duration = Duration::from_millis(100);
const MAX_VISIBILITY_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Tunables shared by both sync engines and the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Minimum time between two inbound visibility reconciliations.
    pub visibility_min_interval: Duration,
    /// Make an object active when an outliner click leaves it as the only selected object
    /// and nothing is active yet.
    pub activate_sole_selection: bool,
    /// Run inbound selection reconciliation even when the host's selected-object set is the
    /// same as on the previous notification.
    pub reconcile_on_unchanged_snapshot: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            visibility_min_interval: DEFAULT_VISIBILITY_INTERVAL,
            activate_sole_selection: true,
            reconcile_on_unchanged_snapshot: false,
        }
    }
}

#[derive(Default)]
pub struct SyncConfigBuilder {
    visibility_min_interval: Option<Duration>,
    activate_sole_selection: Option<bool>,
    reconcile_on_unchanged_snapshot: Option<bool>,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visibility_min_interval(mut self, interval: Duration) -> Self {
        self.visibility_min_interval = Some(interval);
        self
    }
    pub fn activate_sole_selection(mut self, enabled: bool) -> Self {
        self.activate_sole_selection = Some(enabled);
        self
    }
    pub fn reconcile_on_unchanged_snapshot(mut self, enabled: bool) -> Self {
        self.reconcile_on_unchanged_snapshot = Some(enabled);
        self
    }

    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let defaults = SyncConfig::default();
        let visibility_min_interval = self
            .visibility_min_interval
            .unwrap_or(defaults.visibility_min_interval);
        if visibility_min_interval > MAX_VISIBILITY_INTERVAL {
            return Err(ConfigError::InvalidParameter {
                name: "visibility_min_interval",
                reason: format!(
                    "{visibility_min_interval:?} exceeds the maximum of {MAX_VISIBILITY_INTERVAL:?}"
                ),
            });
        }

        Ok(SyncConfig {
            visibility_min_interval,
            activate_sole_selection: self
                .activate_sole_selection
                .unwrap_or(defaults.activate_sole_selection),
            reconcile_on_unchanged_snapshot: self
                .reconcile_on_unchanged_snapshot
                .unwrap_or(defaults.reconcile_on_unchanged_snapshot),
        })
    }
}
