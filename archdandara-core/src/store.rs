//! Door database: the JSON file players edit to reroute doors.
//!
//! On disk the records are grouped by scene:
//!
//! ```json
//! {
//!   "Scenes": [
//!     {
//!       "SceneName": "Hub",
//!       "Doors": [
//!         {
//!           "DoorName": "LeftExit",
//!           "OtherSideScene": "Valley",
//!           "SpawnID": "SpawnA",
//!           "FakeSpawnID": "",
//!           "PosX": 12.5,
//!           "PosY": -3.1,
//!           "PosZ": 0.0
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! In memory the store is a flat, ordered list keyed by
//! `(scene_name, door_name)`. Every mutation rewrites the whole file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::logging::STORE;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DoorRecord {
    /// Carried by the enclosing scene group on disk.
    #[serde(skip)]
    pub scene_name: String,
    pub door_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub other_side_scene: String,
    #[serde(rename = "SpawnID", default, deserialize_with = "null_as_empty")]
    pub spawn_id: String,
    #[serde(rename = "FakeSpawnID", default, deserialize_with = "null_as_empty")]
    pub fake_spawn_id: String,
    #[serde(default)]
    pub pos_x: f32,
    #[serde(default)]
    pub pos_y: f32,
    #[serde(default)]
    pub pos_z: f32,
}

impl DoorRecord {
    pub fn new(
        scene_name: impl Into<String>,
        door_name: impl Into<String>,
        other_side_scene: impl Into<String>,
    ) -> Self {
        Self {
            scene_name: scene_name.into(),
            door_name: door_name.into(),
            other_side_scene: other_side_scene.into(),
            ..Self::default()
        }
    }

    pub fn has_key(&self, scene_name: &str, door_name: &str) -> bool {
        self.scene_name == scene_name && self.door_name == door_name
    }
}

impl fmt::Display for DoorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.door_name, self.other_side_scene)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DoorDatabaseFile {
    #[serde(rename = "Scenes", default)]
    scenes: Vec<SceneDoorGroup>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SceneDoorGroup {
    #[serde(rename = "SceneName")]
    scene_name: String,
    #[serde(rename = "Doors", default)]
    doors: Vec<DoorRecord>,
}

pub struct RecordStore {
    path: PathBuf,
    records: Vec<DoorRecord>,
}

impl RecordStore {
    /// Empty store bound to `path`; nothing is read until [`RecordStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the backing file, falling back to an empty table on any
    /// failure. A missing file (or a file holding JSON `null`) is replaced
    /// with an empty database straight away; an unreadable one is left on
    /// disk untouched until the next save.
    pub fn load(&mut self) {
        self.records.clear();

        if !self.path.exists() {
            warn!(target: STORE, "No JSON found at {}, creating new database", self.path.display());
            self.save();
            return;
        }

        match self.read_file() {
            Ok(Some(file)) => {
                self.records = flatten(file);
                info!(target: STORE, "Loaded door database: {}", self);
            }
            Ok(None) => {
                warn!(target: STORE, "JSON was null, rebuilding database");
                self.save();
            }
            Err(e) => {
                error!(target: STORE, "Failed to load {}: {e}", self.path.display());
            }
        }
    }

    /// Like [`RecordStore::load`] but for offline tools: a file that cannot
    /// be read or parsed is an error, and nothing is written back.
    pub fn try_load(&mut self) -> Result<()> {
        self.records = match self.read_file()? {
            Some(file) => flatten(file),
            None => Vec::new(),
        };
        Ok(())
    }

    fn read_file(&self) -> Result<Option<DoorDatabaseFile>> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes the table, logging instead of returning any failure.
    pub fn save(&self) {
        match self.try_save() {
            Ok(()) => debug!(target: STORE, "Saved grouped database ({})", self),
            Err(e) => error!(target: STORE, "Failed to save {}: {e}", self.path.display()),
        }
    }

    pub fn try_save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, self.to_pretty_json()?)?;
        Ok(())
    }

    /// Replaces any record with the same `(scene_name, door_name)` key,
    /// appends `record` and persists.
    pub fn add_or_update(&mut self, record: DoorRecord) {
        upsert(&mut self.records, record);
        self.save();
    }

    /// Rewrites the destination of each `(scene, door, to)` in place, keeping
    /// record order, and persists once if anything changed. Unknown keys are
    /// skipped. Returns the number of records whose destination changed.
    pub fn set_destinations<I>(&mut self, changes: I) -> usize
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut changed = 0;
        for (scene_name, door_name, to) in changes {
            match self.records.iter_mut().find(|r| r.has_key(&scene_name, &door_name)) {
                Some(record) if record.other_side_scene != to => {
                    record.other_side_scene = to;
                    changed += 1;
                }
                Some(_) => {}
                None => warn!(target: STORE, "No record for {scene_name}/{door_name}, skipping"),
            }
        }
        if changed > 0 {
            self.save();
        }
        changed
    }

    pub fn get(&self, scene_name: &str, door_name: &str) -> Option<&DoorRecord> {
        self.records.iter().find(|r| r.has_key(scene_name, door_name))
    }

    pub fn records(&self) -> &[DoorRecord] {
        &self.records
    }

    pub fn doors_in_scene<'a>(&'a self, scene_name: &'a str) -> impl Iterator<Item = &'a DoorRecord> {
        self.records.iter().filter(move |r| r.scene_name == scene_name)
    }

    /// Scene names in first-seen order.
    pub fn scenes(&self) -> Vec<&str> {
        let mut scenes: Vec<&str> = Vec::new();
        for record in &self.records {
            if !scenes.contains(&record.scene_name.as_str()) {
                scenes.push(&record.scene_name);
            }
        }
        scenes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.grouped())?)
    }

    /// Dumps the whole database at debug level.
    pub fn log_contents(&self) {
        match self.to_pretty_json() {
            Ok(json) => debug!(target: STORE, "Door database contents:\n{json}"),
            Err(e) => error!(target: STORE, "Failed to render door database: {e}"),
        }
    }

    fn grouped(&self) -> DoorDatabaseFile {
        let mut file = DoorDatabaseFile::default();
        for record in &self.records {
            let group = match file.scenes.iter_mut().position(|g| g.scene_name == record.scene_name) {
                Some(idx) => &mut file.scenes[idx],
                None => {
                    file.scenes.push(SceneDoorGroup {
                        scene_name: record.scene_name.clone(),
                        doors: Vec::new(),
                    });
                    let last = file.scenes.len() - 1;
                    &mut file.scenes[last]
                }
            };
            group.doors.push(record.clone());
        }
        file
    }
}

impl fmt::Display for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Door Database: {} scenes, {} doors",
            self.scenes().len(),
            self.records.len()
        )
    }
}

fn upsert(records: &mut Vec<DoorRecord>, record: DoorRecord) {
    records.retain(|r| !r.has_key(&record.scene_name, &record.door_name));
    records.push(record);
}

/// Hand-edited files may repeat a door; the later entry wins.
fn flatten(file: DoorDatabaseFile) -> Vec<DoorRecord> {
    let mut records = Vec::new();
    for group in file.scenes {
        for mut door in group.doors {
            door.scene_name = group.scene_name.clone();
            if records
                .iter()
                .any(|r: &DoorRecord| r.has_key(&door.scene_name, &door.door_name))
            {
                warn!(
                    target: STORE,
                    "Duplicate entry for {}/{}, keeping the later one", door.scene_name, door.door_name
                );
            }
            upsert(&mut records, door);
        }
    }
    records
}
