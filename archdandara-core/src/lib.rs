use thiserror::Error;

pub mod config;
pub mod logging;
pub mod randomizer;
pub mod reflect;
pub mod resolve;
pub mod runtime;
pub mod scanner;
pub mod scheduler;
pub mod shuffle;
pub mod snapshot;
pub mod store;
pub mod world;

pub use config::{ConfigFile, LogSwitches, ModConfig};
pub use randomizer::{apply_overrides, ApplyReport, DoorRandomizer, OverrideAction, SpawnOutcome};
pub use reflect::{DynComponent, EnumType, MemberHandle, Reflect, ReflectError, TypeInfo, Value, ValueType};
pub use runtime::{ModPaths, ModRuntime, ReplayStep};
pub use shuffle::{shuffle_destinations, ShuffleSummary};
pub use snapshot::{load_snapshot, load_snapshots, parse_snapshot, SnapshotError, SnapshotWorld};
pub use scanner::{DoorScanner, ScanOutcome, ScanReport, ScanState, WritePolicy};
pub use store::{DoorRecord, RecordStore};
pub use world::{GameObject, Scene, SceneSet, SceneSource, Vec3};

#[derive(Debug, Error)]
pub enum ModError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
    #[error("logger already installed: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Snapshot(#[from] snapshot::SnapshotError),
    #[error("no door record for {scene_name}/{door_name}")]
    UnknownDoor { scene_name: String, door_name: String },
}

pub type Result<T> = std::result::Result<T, ModError>;
