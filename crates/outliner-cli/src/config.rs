use crate::error::{CliError, Result};
use protein_outliner::core::models::ids::ItemId;
use protein_outliner::engine::config::{SyncConfig, SyncConfigBuilder};
use protein_outliner::workflows::structure::ImportedStructure;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSyncConfig {
    visibility_min_interval_ms: Option<u64>,
    activate_sole_selection: Option<bool>,
    reconcile_on_unchanged_snapshot: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SceneSetup {
    /// Objects present in the host scene before any structure is imported.
    #[serde(default)]
    pub objects: Vec<String>,
}

/// One scripted step of a scenario.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type", deny_unknown_fields)]
pub enum Action {
    /// Click on an item's selection checkbox.
    Select { item: ItemId },
    /// Click on an item's eye icon.
    ToggleVisibility { item: ItemId },
    /// Replace the host selection, as a viewport click would.
    SceneSelect { objects: Vec<String> },
    /// Hide or reveal an object from the host side.
    SceneHide {
        object: String,
        #[serde(default = "default_hidden")]
        hidden: bool,
    },
    /// Delete an object from the host side.
    SceneDelete { object: String },
    /// Move an object from the host side.
    SceneMove {
        object: String,
        location: [f64; 3],
        #[serde(default)]
        rotation: [f64; 3],
        #[serde(default = "unit_scale")]
        scale: [f64; 3],
    },
    CreateDomain {
        chain: ItemId,
        start: i32,
        end: i32,
        #[serde(default)]
        name: Option<String>,
    },
    Split { item: ItemId, at: i32 },
    Merge { a: ItemId, b: ItemId },
    CreateGroup { name: String, members: Vec<ItemId> },
    CreatePuppet { name: String, members: Vec<ItemId> },
    AddMembers { group: ItemId, members: Vec<ItemId> },
    RemoveMembers { group: ItemId, members: Vec<ItemId> },
    Delete { item: ItemId },
    Rename { item: ItemId, name: String },
    /// Save the current transforms of some groups as a new pose.
    CreatePose {
        #[serde(default)]
        name: String,
        groups: Vec<ItemId>,
    },
    /// Positions are zero-based, in creation order.
    ApplyPose { pose: usize },
    CapturePose { pose: usize },
    RenamePose { pose: usize, name: String },
    DeletePose { pose: usize },
    /// Move the session clock forward.
    Advance { ms: u64 },
    /// Assert the state of one item.
    Expect {
        item: ItemId,
        #[serde(default)]
        selected: Option<bool>,
        #[serde(default)]
        visible: Option<bool>,
    },
    /// Assert where a scene object sits.
    ExpectLocation { object: String, location: [f64; 3] },
}

fn default_hidden() -> bool {
    true
}

fn unit_scale() -> [f64; 3] {
    [1.0; 3]
}

impl Action {
    /// Whether the action goes through the host instead of the outliner UI.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Action::SceneSelect { .. }
                | Action::SceneHide { .. }
                | Action::SceneDelete { .. }
                | Action::SceneMove { .. }
        )
    }

    pub fn advance_by(&self) -> Option<Duration> {
        match self {
            Action::Advance { ms } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    sync: Option<PartialSyncConfig>,
    #[serde(default)]
    pub scene: SceneSetup,
    #[serde(default)]
    pub structure: Vec<ImportedStructure>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading scenario from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Resolves the sync configuration from the scenario's `[sync]` table and `-S` overrides.
    pub fn sync_config(&mut self, set_values: &[String]) -> Result<SyncConfig> {
        self.apply_set_values(set_values)?;
        let partial = self.sync.take().unwrap_or_default();

        let mut builder = SyncConfigBuilder::new();
        if let Some(ms) = partial.visibility_min_interval_ms {
            builder = builder.visibility_min_interval(Duration::from_millis(ms));
        }
        if let Some(enabled) = partial.activate_sole_selection {
            builder = builder.activate_sole_selection(enabled);
        }
        if let Some(enabled) = partial.reconcile_on_unchanged_snapshot {
            builder = builder.reconcile_on_unchanged_snapshot(enabled);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let sync = self.sync.get_or_insert_with(Default::default);

            match key {
                "sync.visibility-min-interval-ms" => {
                    sync.visibility_min_interval_ms = Some(value_str.parse().map_err(|_| {
                        CliError::Config(format!(
                            "Invalid integer value for {}: {}",
                            key, value_str
                        ))
                    })?);
                }
                "sync.activate-sole-selection" => {
                    sync.activate_sole_selection = Some(parse_bool(key, value_str)?);
                }
                "sync.reconcile-on-unchanged-snapshot" => {
                    sync.reconcile_on_unchanged_snapshot = Some(parse_bool(key, value_str)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unknown configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid boolean value for {}: {}", key, value)))
}
