use std::fs;
use std::path::{Path, PathBuf};

use archdandara_core::scanner::{SkipReason, UNKNOWN_DESTINATION};
use archdandara_core::world::{is_door, visit_components};
use archdandara_core::{
    load_snapshot, DoorRecord, ModConfig, ModPaths, ModRuntime, OverrideAction, RecordStore, ScanOutcome,
    SceneSource, SnapshotWorld, SpawnOutcome,
};
use tempfile::tempdir;

fn fixture() -> SnapshotWorld {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/hub_valley.json");
    load_snapshot(&path).unwrap()
}

/// Current value of `member` on the door component owned by `door`.
fn live_value(world: &mut SnapshotWorld, scene: &str, door: &str, member: &str) -> String {
    let scene = world.scene_by_name(scene).unwrap();
    let mut found = None;
    for root in scene.roots.iter_mut() {
        visit_components(root, true, &mut |site, component| {
            if site.owner == door && is_door(component) {
                let handle = component.type_info().find_field(member).unwrap();
                found = Some(component.get(&handle).to_string());
            }
        });
    }
    found.unwrap()
}

fn hand_edited_db(dir: &Path) -> PathBuf {
    let path = dir.join("Dandara_Doors").join("door_database.json");
    let mut store = RecordStore::open(&path);
    store.add_or_update(DoorRecord {
        fake_spawn_id: "SpawnB".into(),
        ..DoorRecord::new("Hub", "LeftExit", "Valley")
    });
    store.add_or_update(DoorRecord::new("Hub", "RightExit", "Peak"));
    path
}

#[test]
fn replay_keeps_hand_edits_and_applies_them() {
    let dir = tempdir().unwrap();
    let db = hand_edited_db(dir.path());
    let mut world = fixture();
    let mut runtime = ModRuntime::with_config(ModConfig::default(), &db);

    let menu = runtime.replay_scene(&mut world, 0, "MainMenu");
    assert_eq!(menu.scan, Some(ScanOutcome::Skipped(SkipReason::NonGameplay)));
    assert!(runtime.store().get("MainMenu", "StartDoor").is_none());

    let hub = runtime.replay_scene(&mut world, 1, "Hub");
    let Some(ScanOutcome::Completed(scan)) = &hub.scan else {
        panic!("hub scan did not complete: {:?}", hub.scan);
    };
    assert_eq!(scan.doors_found, 3);
    assert_eq!(scan.records_kept, 2);
    assert_eq!(scan.records_written, 1);

    let left = runtime.store().get("Hub", "LeftExit").unwrap();
    assert_eq!(left.other_side_scene, "Valley");
    assert_eq!(left.fake_spawn_id, "SpawnB");
    let secret = runtime.store().get("Hub", "SecretExit").unwrap();
    assert_eq!(secret.other_side_scene, UNKNOWN_DESTINATION);
    assert_eq!(secret.spawn_id, "SpawnB");

    assert_eq!(hub.applies.len(), 1);
    let report = &hub.applies[0];
    let left = report.outcome("LeftExit").unwrap();
    assert_eq!(
        left.action,
        OverrideAction::Redirected {
            from: "OldDest".into(),
            to: "Valley".into()
        }
    );
    assert_eq!(left.spawn, Some(SpawnOutcome::Applied("SpawnB".into())));
    assert_eq!(report.outcome("RightExit").unwrap().action, OverrideAction::SkippedActive);

    assert_eq!(live_value(&mut world, "Hub", "LeftExit", "_otherSideScene"), "Valley");
    assert_eq!(live_value(&mut world, "Hub", "LeftExit", "spawnID"), "SpawnB");
    assert_eq!(live_value(&mut world, "Hub", "RightExit", "_otherSideScene"), "Cave");
}

#[test]
fn writable_database_is_refreshed_by_scans() {
    let dir = tempdir().unwrap();
    let db = hand_edited_db(dir.path());
    let mut world = fixture();
    let config = ModConfig {
        door_database_readonly: false,
        ..ModConfig::default()
    };
    let mut runtime = ModRuntime::with_config(config, &db);

    runtime.replay_scene(&mut world, 1, "Hub");

    let left = runtime.store().get("Hub", "LeftExit").unwrap();
    assert_eq!(left.other_side_scene, "OldDest");
    assert_eq!(left.fake_spawn_id, "");
    assert_eq!(left.pos_x, 12.5);
    assert_eq!(live_value(&mut world, "Hub", "LeftExit", "_otherSideScene"), "OldDest");
}

#[test]
fn rescanning_a_scene_converges() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("doors.json");
    let config = ModConfig {
        door_database_readonly: false,
        ..ModConfig::default()
    };
    let mut runtime = ModRuntime::with_config(config, &db);
    let mut world = fixture();

    runtime.replay_scene(&mut world, 1, "Hub");
    runtime.replay_scene(&mut world, 2, "Valley");
    let first: Vec<DoorRecord> = runtime.store().records().to_vec();
    runtime.replay_scene(&mut world, 1, "Hub");

    let mut second: Vec<DoorRecord> = runtime.store().records().to_vec();
    assert_eq!(second.len(), first.len());
    for record in &first {
        let again = second.iter().position(|r| r.has_key(&record.scene_name, &record.door_name)).unwrap();
        assert_eq!(&second.remove(again), record);
    }
}

#[test]
fn database_file_round_trips() {
    let dir = tempdir().unwrap();
    let db = hand_edited_db(dir.path());
    let mut world = fixture();
    let mut runtime = ModRuntime::with_config(ModConfig::default(), &db);
    runtime.replay_scene(&mut world, 1, "Hub");
    runtime.replay_scene(&mut world, 2, "Valley");

    let reloaded = RecordStore::open(&db);

    assert_eq!(reloaded.records(), runtime.store().records());
    assert_eq!(reloaded.scenes(), ["Hub", "Valley"]);
    let text = fs::read_to_string(&db).unwrap();
    assert!(text.contains("\"SceneName\": \"Valley\""));
    assert!(text.contains("\"DoorName\": \"UpExit\""));
}

#[test]
fn hand_written_file_with_gaps_loads() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("doors.json");
    fs::write(
        &db,
        r#"{ "Scenes": [
            { "SceneName": "Hub", "Doors": [
                { "DoorName": "LeftExit", "OtherSideScene": "Valley", "FakeSpawnID": null },
                { "DoorName": "LeftExit", "OtherSideScene": "Cave" }
            ] },
            { "SceneName": "Valley" }
        ] }"#,
    )
    .unwrap();

    let store = RecordStore::open(&db);

    assert_eq!(store.len(), 1);
    let left = store.get("Hub", "LeftExit").unwrap();
    assert_eq!(left.other_side_scene, "Cave");
    assert_eq!(left.spawn_id, "");
    assert_eq!(left.pos_y, 0.0);
}

#[test]
fn init_bootstraps_user_data() {
    let dir = tempdir().unwrap();
    let paths = ModPaths::from_user_data(dir.path());

    let runtime = ModRuntime::init(&paths);

    assert_eq!(runtime.config(), &ModConfig::default());
    let cfg = fs::read_to_string(&paths.config).unwrap();
    assert!(cfg.contains("door_database_readonly = true"));
    assert!(cfg.contains("log_component_fields = false"));
    let reloaded = RecordStore::open(&paths.database);
    assert!(reloaded.is_empty());
}
