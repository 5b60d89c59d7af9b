//! Room door scanner: records every door found in a freshly loaded scene.
//!
//! Doors are recognised by runtime type name alone, since the game's classes
//! cannot be referenced directly. Each door becomes a [`DoorRecord`] in the
//! [`RecordStore`].

use log::{debug, info, warn};

use crate::logging::{COMPONENT_FIELDS, SCANNER};
use crate::reflect::Reflect;
use crate::resolve::{resolve, resolve_string, DESTINATION_CANDIDATES, FAKE_SPAWN_FIELD, SPAWN_FIELD};
use crate::store::{DoorRecord, RecordStore};
use crate::world::{is_door, visit_components, ComponentSite, SceneSource};

/// Destination recorded when no candidate member resolves.
pub const UNKNOWN_DESTINATION: &str = "UNKNOWN";

/// Menu and loading scenes never contain doors worth recording.
pub const NON_GAMEPLAY_SCENES: &[&str] = &["MainMenu", "LoadingScreen", "InitGame"];

/// Remembers the last scene scanned so repeated load notifications for the
/// same scene are ignored.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    last_scene: String,
}

impl ScanState {
    pub fn last_scene(&self) -> &str {
        &self.last_scene
    }

    /// Returns `false` when `scene_name` is the scene scanned last.
    fn accept(&mut self, scene_name: &str) -> bool {
        if self.last_scene == scene_name {
            return false;
        }
        self.last_scene = scene_name.to_string();
        true
    }
}

/// How scan results are written into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Every door found replaces its stored record.
    Upsert,
    /// Only doors missing from the store are written, so hand-edited
    /// records survive later scans.
    InsertOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyName,
    NonGameplay,
    Repeated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    SceneMissing,
    SceneInvalid,
    NoRoots,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub scene_name: String,
    pub doors_found: usize,
    pub records_written: usize,
    pub records_kept: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Skipped(SkipReason),
    Aborted(AbortReason),
    Completed(ScanReport),
}

pub struct DoorScanner {
    state: ScanState,
    policy: WritePolicy,
}

impl DoorScanner {
    pub fn new(policy: WritePolicy) -> Self {
        info!(target: SCANNER, "is Starting up ({policy:?})");
        Self {
            state: ScanState::default(),
            policy,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn on_scene_loaded(
        &mut self,
        source: &mut dyn SceneSource,
        store: &mut RecordStore,
        build_index: i32,
        scene_name: &str,
    ) -> ScanOutcome {
        if NON_GAMEPLAY_SCENES.contains(&scene_name) {
            warn!(target: SCANNER, "Skipping non-gameplay scene: {scene_name}");
            return ScanOutcome::Skipped(SkipReason::NonGameplay);
        }
        if scene_name.is_empty() {
            warn!(target: SCANNER, "Scene name was empty, skipping scan");
            return ScanOutcome::Skipped(SkipReason::EmptyName);
        }

        info!(target: SCANNER, "Scene Loaded: {scene_name} (build index {build_index})");

        if !self.state.accept(scene_name) {
            debug!(target: SCANNER, "{scene_name} was scanned last, ignoring repeat");
            return ScanOutcome::Skipped(SkipReason::Repeated);
        }

        match scan_room(source, store, scene_name, self.policy) {
            Ok(report) => ScanOutcome::Completed(report),
            Err(reason) => ScanOutcome::Aborted(reason),
        }
    }
}

/// Walks the whole scene, inactive objects included, and writes a record
/// for every door according to `policy`.
pub fn scan_room(
    source: &mut dyn SceneSource,
    store: &mut RecordStore,
    scene_name: &str,
    policy: WritePolicy,
) -> Result<ScanReport, AbortReason> {
    info!(target: SCANNER, "===========================================");
    info!(target: SCANNER, "        ROOM SCAN - {scene_name}");
    info!(target: SCANNER, "===========================================");

    let Some(scene) = source.scene_by_name(scene_name) else {
        warn!(target: SCANNER, "Scene {scene_name} not found, skipping scan");
        return Err(AbortReason::SceneMissing);
    };
    if !scene.valid {
        warn!(target: SCANNER, "Invalid scene, skipping scan");
        return Err(AbortReason::SceneInvalid);
    }
    if scene.roots.is_empty() {
        warn!(target: SCANNER, "Scene has no root objects, skipping");
        return Err(AbortReason::NoRoots);
    }

    let mut found = Vec::new();
    for root in scene.roots.iter_mut() {
        visit_components(root, true, &mut |site, component| {
            if is_door(component) {
                found.push(extract_record(scene_name, site, component));
            }
        });
    }

    let mut report = ScanReport {
        scene_name: scene_name.to_string(),
        doors_found: found.len(),
        records_written: 0,
        records_kept: 0,
    };

    for record in found {
        if policy == WritePolicy::InsertOnly && store.get(&record.scene_name, &record.door_name).is_some() {
            debug!(target: SCANNER, "Keeping stored record for {}", record.door_name);
            report.records_kept += 1;
            continue;
        }
        store.add_or_update(record);
        report.records_written += 1;
    }

    store.save();
    info!(target: SCANNER, "Total Doors Found: {}", report.doors_found);
    store.log_contents();

    Ok(report)
}

fn extract_record(scene_name: &str, site: ComponentSite<'_>, door: &dyn Reflect) -> DoorRecord {
    log_fields(site.owner, door);
    if !site.active_in_hierarchy {
        debug!(target: SCANNER, "Door '{}' is inactive in the hierarchy; recording it anyway", site.owner);
    }

    let other_side_scene = resolve_string(door, DESTINATION_CANDIDATES)
        .map(|r| r.value.to_string())
        .unwrap_or_else(|| UNKNOWN_DESTINATION.to_string());
    let spawn_id = resolve(door, &[SPAWN_FIELD])
        .map(|r| r.value.to_string())
        .unwrap_or_default();
    let fake_spawn_id = resolve(door, &[FAKE_SPAWN_FIELD])
        .map(|r| r.value.to_string())
        .unwrap_or_default();

    info!(target: SCANNER, "------------------------------------------");
    info!(target: SCANNER, " Door: {}", site.owner);
    info!(target: SCANNER, " SpawnID: {spawn_id}");
    info!(target: SCANNER, " FakeSpawnID: {fake_spawn_id}");
    info!(
        target: SCANNER,
        " Position: X = {} Y = {} Z = {}", site.position.x, site.position.y, site.position.z
    );
    info!(target: SCANNER, " Leads To Scene: {other_side_scene}");

    DoorRecord {
        scene_name: scene_name.to_string(),
        door_name: site.owner.to_string(),
        other_side_scene,
        spawn_id,
        fake_spawn_id,
        pos_x: site.position.x,
        pos_y: site.position.y,
        pos_z: site.position.z,
    }
}

fn log_fields(owner: &str, component: &dyn Reflect) {
    if !log::log_enabled!(target: COMPONENT_FIELDS, log::Level::Debug) {
        return;
    }
    for member in component.type_info().all_fields() {
        debug!(
            target: COMPONENT_FIELDS,
            "[FIELD] {owner}.{}::{} = {}",
            member.declaring_type,
            member.name(),
            component.get(&member)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{DynComponent, EnumType, TypeInfo, Value, ValueType};
    use crate::world::{GameObject, Scene, SceneSet, Vec3};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn door_type() -> Arc<TypeInfo> {
        let spawns = Arc::new(EnumType::new("SpawnID", ["SpawnA", "SpawnB"]));
        let base = Arc::new(TypeInfo::new("Interactable").field("_otherSideScene", ValueType::String));
        Arc::new(
            TypeInfo::new("Door")
                .with_base(base)
                .field("spawnID", ValueType::Enum(spawns.clone()))
                .field("fakeSpawnID", ValueType::Enum(spawns)),
        )
    }

    fn door(dest: Option<&str>) -> DynComponent {
        let ty = door_type();
        let spawn = ty.find_field("spawnID").unwrap();
        let mut door = DynComponent::new(ty);
        if let Some(dest) = dest {
            door.set_named("_otherSideScene", dest.into()).unwrap();
        }
        door.set_named("spawnID", crate::resolve::coerce(&spawn, "SpawnB".into()).unwrap())
            .unwrap();
        door
    }

    fn hub() -> SceneSet {
        let decoy = DynComponent::new(Arc::new(TypeInfo::new("DoorTrigger").field("_otherSideScene", ValueType::String)));
        SceneSet::new(vec![Scene::new(
            "Hub",
            vec![
                GameObject::new("Room")
                    .with_component(decoy)
                    .with_child(GameObject::new("LeftExit").at(Vec3::new(1.0, 2.0, 0.0)).with_component(door(Some("Valley"))))
                    .with_child(
                        GameObject::new("Locked")
                            .inactive()
                            .with_child(GameObject::new("SecretExit").with_component(door(None))),
                    ),
            ],
        )])
    }

    fn store() -> (TempDir, RecordStore) {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("doors.json"));
        (dir, store)
    }

    #[test]
    fn scan_records_every_door_including_inactive() {
        let (_dir, mut store) = store();
        let mut scanner = DoorScanner::new(WritePolicy::Upsert);

        let outcome = scanner.on_scene_loaded(&mut hub(), &mut store, 3, "Hub");

        let report = match outcome {
            ScanOutcome::Completed(report) => report,
            other => panic!("scan did not complete: {other:?}"),
        };
        assert_eq!(report.doors_found, 2);
        assert_eq!(store.len(), 2);

        let left = store.get("Hub", "LeftExit").unwrap();
        assert_eq!(left.other_side_scene, "Valley");
        assert_eq!(left.spawn_id, "SpawnB");
        assert_eq!(left.fake_spawn_id, "SpawnA");
        assert_eq!((left.pos_x, left.pos_y, left.pos_z), (1.0, 2.0, 0.0));

        assert_eq!(store.get("Hub", "SecretExit").unwrap().other_side_scene, UNKNOWN_DESTINATION);
    }

    #[test]
    fn numeric_destination_is_recorded_as_unknown() {
        let (_dir, mut store) = store();
        let ty = Arc::new(TypeInfo::new("Door").field("_destination", ValueType::Int));
        let door = DynComponent::new(ty).with("_destination", Value::Int(4)).unwrap();
        let mut scenes = SceneSet::new(vec![Scene::new(
            "Hub",
            vec![GameObject::new("LeftExit").with_component(door)],
        )]);

        DoorScanner::new(WritePolicy::Upsert).on_scene_loaded(&mut scenes, &mut store, 3, "Hub");

        assert_eq!(store.get("Hub", "LeftExit").unwrap().other_side_scene, UNKNOWN_DESTINATION);
    }

    #[test]
    fn menus_empty_names_and_repeats_are_skipped() {
        let (_dir, mut store) = store();
        let mut scanner = DoorScanner::new(WritePolicy::Upsert);
        let mut scenes = hub();

        assert_eq!(
            scanner.on_scene_loaded(&mut scenes, &mut store, 0, "MainMenu"),
            ScanOutcome::Skipped(SkipReason::NonGameplay)
        );
        assert_eq!(
            scanner.on_scene_loaded(&mut scenes, &mut store, 0, ""),
            ScanOutcome::Skipped(SkipReason::EmptyName)
        );
        assert!(matches!(
            scanner.on_scene_loaded(&mut scenes, &mut store, 3, "Hub"),
            ScanOutcome::Completed(_)
        ));
        assert_eq!(
            scanner.on_scene_loaded(&mut scenes, &mut store, 3, "Hub"),
            ScanOutcome::Skipped(SkipReason::Repeated)
        );
        assert_eq!(scanner.state().last_scene(), "Hub");
    }

    #[test]
    fn missing_invalid_and_empty_scenes_abort() {
        let (_dir, mut store) = store();
        let mut scanner = DoorScanner::new(WritePolicy::Upsert);
        let mut broken = Scene::new("Broken", vec![GameObject::new("Root")]);
        broken.valid = false;
        let mut scenes = SceneSet::new(vec![broken, Scene::new("Empty", Vec::new())]);

        assert_eq!(
            scanner.on_scene_loaded(&mut scenes, &mut store, 1, "Nowhere"),
            ScanOutcome::Aborted(AbortReason::SceneMissing)
        );
        assert_eq!(
            scanner.on_scene_loaded(&mut scenes, &mut store, 1, "Broken"),
            ScanOutcome::Aborted(AbortReason::SceneInvalid)
        );
        assert_eq!(
            scanner.on_scene_loaded(&mut scenes, &mut store, 1, "Empty"),
            ScanOutcome::Aborted(AbortReason::NoRoots)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn rescans_converge_to_one_record_per_door() {
        let (_dir, mut store) = store();
        let mut scenes = hub();

        for _ in 0..3 {
            scan_room(&mut scenes, &mut store, "Hub", WritePolicy::Upsert).unwrap();
        }

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn insert_only_keeps_edited_records() {
        let (_dir, mut store) = store();
        store.add_or_update(DoorRecord::new("Hub", "LeftExit", "Tower"));

        let report = scan_room(&mut hub(), &mut store, "Hub", WritePolicy::InsertOnly).unwrap();

        assert_eq!(report.records_kept, 1);
        assert_eq!(report.records_written, 1);
        assert_eq!(store.get("Hub", "LeftExit").unwrap().other_side_scene, "Tower");
        assert!(store.get("Hub", "SecretExit").is_some());
    }
}
