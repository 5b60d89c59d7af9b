//! Owns every long-lived piece of the mod and routes host events to them.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::ModConfig;
use crate::logging::{self, MAIN};
use crate::randomizer::{ApplyReport, DoorRandomizer, APPLY_DELAY_FRAMES};
use crate::scanner::{DoorScanner, ScanOutcome, ScanState, WritePolicy};
use crate::store::RecordStore;
use crate::world::SceneSource;

const CONFIG_DIR: &str = "ArchDandara";
const CONFIG_FILE: &str = "ArchDandara.cfg";
const DATABASE_DIR: &str = "Dandara_Doors";
const DATABASE_FILE: &str = "door_database.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModPaths {
    pub config: PathBuf,
    pub database: PathBuf,
}

impl ModPaths {
    pub fn from_user_data(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_DIR).join(CONFIG_FILE),
            database: dir.join(DATABASE_DIR).join(DATABASE_FILE),
        }
    }

    /// Paths under the platform's per-user data directory, falling back to
    /// the working directory when there is none.
    pub fn default_user_data() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::from_user_data(&base.join("Dandara").join("UserData"))
    }
}

/// What one replayed scene load produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    pub scene_name: String,
    pub scan: Option<ScanOutcome>,
    pub applies: Vec<ApplyReport>,
}

pub struct ModRuntime {
    config: ModConfig,
    store: RecordStore,
    scanner: Option<DoorScanner>,
    randomizer: DoorRandomizer,
}

impl ModRuntime {
    /// Full start-up: config, logging, door database, then the scene
    /// subscribers.
    pub fn init(paths: &ModPaths) -> Self {
        let config = ModConfig::load_or_init(&paths.config);
        if let Err(e) = logging::init(&config, None) {
            debug!(target: MAIN, "Keeping existing logger: {e}");
        }
        Self::with_config(config, &paths.database)
    }

    /// Start-up without touching the config file or the global logger.
    pub fn with_config(config: ModConfig, database: &Path) -> Self {
        info!(target: MAIN, "Initializing ArchDandara...");

        let store = RecordStore::open(database);
        info!(target: MAIN, "{store}");

        let scanner = if config.enable_room_scanning {
            let policy = if config.door_database_readonly {
                WritePolicy::InsertOnly
            } else {
                WritePolicy::Upsert
            };
            Some(DoorScanner::new(policy))
        } else {
            info!(target: MAIN, "Room scanning disabled by config");
            None
        };

        let randomizer = DoorRandomizer::new();
        info!(target: MAIN, "Initialization complete");

        Self {
            config,
            store,
            scanner,
            randomizer,
        }
    }

    /// Returns the scan outcome, or `None` when scanning is switched off.
    pub fn on_scene_loaded(
        &mut self,
        source: &mut dyn SceneSource,
        build_index: i32,
        scene_name: &str,
    ) -> Option<ScanOutcome> {
        let outcome = self
            .scanner
            .as_mut()
            .map(|scanner| scanner.on_scene_loaded(source, &mut self.store, build_index, scene_name));
        self.randomizer.on_scene_loaded(build_index, scene_name);
        outcome
    }

    pub fn on_frame_end(&mut self, source: &mut dyn SceneSource) -> Vec<ApplyReport> {
        self.randomizer.on_frame_end(source, &self.store)
    }

    /// Feeds one scene load and then enough frame ends for its overrides to
    /// run.
    pub fn replay_scene(&mut self, source: &mut dyn SceneSource, build_index: i32, scene_name: &str) -> ReplayStep {
        let scan = self.on_scene_loaded(source, build_index, scene_name);
        let mut applies = Vec::new();
        for _ in 0..APPLY_DELAY_FRAMES {
            applies.extend(self.on_frame_end(source));
        }
        ReplayStep {
            scene_name: scene_name.to_string(),
            scan,
            applies,
        }
    }

    pub fn config(&self) -> &ModConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    pub fn scan_state(&self) -> Option<&ScanState> {
        self.scanner.as_ref().map(DoorScanner::state)
    }

    pub fn randomizer(&self) -> &DoorRandomizer {
        &self.randomizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{DynComponent, TypeInfo, ValueType};
    use crate::store::DoorRecord;
    use crate::world::{GameObject, Scene, SceneSet};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn hub() -> SceneSet {
        let door = Arc::new(TypeInfo::new("Door").field("_otherSideScene", ValueType::String));
        let left = DynComponent::new(door).with("_otherSideScene", "Valley").unwrap();
        SceneSet::new(vec![Scene::new(
            "Hub",
            vec![GameObject::new("LeftExit").with_component(left)],
        )])
    }

    #[test]
    fn paths_follow_user_data_layout() {
        let paths = ModPaths::from_user_data(Path::new("/game/UserData"));
        assert_eq!(paths.config, Path::new("/game/UserData/ArchDandara/ArchDandara.cfg"));
        assert_eq!(
            paths.database,
            Path::new("/game/UserData/Dandara_Doors/door_database.json")
        );
    }

    #[test]
    fn init_writes_config_and_database() {
        let dir = tempdir().unwrap();
        let paths = ModPaths::from_user_data(dir.path());

        let runtime = ModRuntime::init(&paths);

        assert!(paths.config.exists());
        assert!(paths.database.exists());
        assert!(runtime.store().is_empty());
        assert_eq!(runtime.scan_state().map(ScanState::last_scene), Some(""));
    }

    #[test]
    fn scan_then_apply_uses_hand_edit() {
        let dir = tempdir().unwrap();
        let database = dir.path().join("doors.json");
        let mut runtime = ModRuntime::with_config(ModConfig::default(), &database);
        let mut scenes = hub();

        let outcome = runtime.on_scene_loaded(&mut scenes, 3, "Hub");
        assert!(matches!(outcome, Some(ScanOutcome::Completed(_))));
        assert_eq!(runtime.store().get("Hub", "LeftExit").unwrap().other_side_scene, "Valley");

        runtime
            .store_mut()
            .add_or_update(DoorRecord::new("Hub", "LeftExit", "Cave"));
        assert!(runtime.on_frame_end(&mut scenes).is_empty());
        let reports = runtime.on_frame_end(&mut scenes);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].redirected(), 1);
    }

    #[test]
    fn disabled_scanning_still_applies() {
        let dir = tempdir().unwrap();
        let database = dir.path().join("doors.json");
        let config = ModConfig {
            enable_room_scanning: false,
            ..ModConfig::default()
        };
        let mut runtime = ModRuntime::with_config(config, &database);
        runtime
            .store_mut()
            .add_or_update(DoorRecord::new("Hub", "LeftExit", "Cave"));
        let mut scenes = hub();

        assert!(runtime.on_scene_loaded(&mut scenes, 3, "Hub").is_none());
        assert!(runtime.scan_state().is_none());
        runtime.on_frame_end(&mut scenes);
        let reports = runtime.on_frame_end(&mut scenes);

        assert_eq!(reports[0].redirected(), 1);
        assert_eq!(runtime.store().len(), 1);
    }
}
