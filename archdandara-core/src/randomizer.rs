//! Door randomizer: writes the door database back onto live doors.
//!
//! Runs a couple of frames after each scene load so the game has finished
//! building the scene's objects. Only changes where doors lead; it never
//! scans or saves.

use log::{error, info, warn};

use crate::logging::RANDOMIZER;
use crate::reflect::{Reflect, ReflectError, ValueType};
use crate::resolve::{
    find_field, find_string_field, resolve, resolve_string, write, DESTINATION_CANDIDATES, ENTERING_PLAYER_FIELD,
    LEAVING_PLAYER_FIELD, SPAWN_FIELD,
};
use crate::scanner::AbortReason;
use crate::scheduler::FrameScheduler;
use crate::store::{DoorRecord, RecordStore};
use crate::world::{is_door, visit_components, SceneSource};

/// Frame boundaries to wait between a scene load and applying overrides.
pub const APPLY_DELAY_FRAMES: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum OverrideAction {
    /// A player is walking through the door; left untouched.
    SkippedActive,
    NoRecord,
    DestinationNotFound,
    DestinationRejected(ReflectError),
    Redirected { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpawnOutcome {
    Applied(String),
    /// The stored value is not a member of the door's spawn enum.
    Invalid(String),
    FieldMissing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoorOutcome {
    pub door_name: String,
    pub action: OverrideAction,
    pub spawn: Option<SpawnOutcome>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplyReport {
    pub scene_name: String,
    pub aborted: Option<AbortReason>,
    pub doors: Vec<DoorOutcome>,
}

impl ApplyReport {
    pub fn redirected(&self) -> usize {
        self.doors
            .iter()
            .filter(|d| matches!(d.action, OverrideAction::Redirected { .. }))
            .count()
    }

    pub fn outcome(&self, door_name: &str) -> Option<&DoorOutcome> {
        self.doors.iter().find(|d| d.door_name == door_name)
    }
}

/// Queues scene loads and applies overrides once their delay has passed.
#[derive(Debug, Default)]
pub struct DoorRandomizer {
    scheduler: FrameScheduler<String>,
}

impl DoorRandomizer {
    pub fn new() -> Self {
        info!(target: RANDOMIZER, "Initializing...");
        Self::default()
    }

    pub fn on_scene_loaded(&mut self, build_index: i32, scene_name: &str) {
        info!(
            target: RANDOMIZER,
            "Scheduling door overrides for scene: {scene_name} (build index {build_index})"
        );
        self.scheduler.schedule(scene_name.to_string(), APPLY_DELAY_FRAMES);
    }

    /// Call once per frame; runs every apply whose delay has elapsed.
    pub fn on_frame_end(&mut self, source: &mut dyn SceneSource, store: &RecordStore) -> Vec<ApplyReport> {
        self.scheduler
            .advance()
            .into_iter()
            .map(|scene_name| apply_overrides(source, store, &scene_name))
            .collect()
    }

    pub fn pending_scenes(&self) -> impl ExactSizeIterator<Item = &String> {
        self.scheduler.pending()
    }
}

pub fn apply_overrides(source: &mut dyn SceneSource, store: &RecordStore, scene_name: &str) -> ApplyReport {
    let mut report = ApplyReport {
        scene_name: scene_name.to_string(),
        ..ApplyReport::default()
    };

    let Some(scene) = source.scene_by_name(scene_name) else {
        warn!(target: RANDOMIZER, "Scene {scene_name} not found, aborting");
        report.aborted = Some(AbortReason::SceneMissing);
        return report;
    };
    if !scene.valid {
        warn!(target: RANDOMIZER, "Scene {scene_name} invalid, aborting");
        report.aborted = Some(AbortReason::SceneInvalid);
        return report;
    }

    for root in scene.roots.iter_mut() {
        visit_components(root, true, &mut |site, component| {
            if is_door(component) {
                let outcome = override_door(component, site.owner, scene_name, store);
                report.doors.push(outcome);
            }
        });
    }

    info!(
        target: RANDOMIZER,
        "{scene_name}: {} of {} doors redirected",
        report.redirected(),
        report.doors.len()
    );
    report
}

fn override_door(door: &mut dyn Reflect, door_name: &str, scene_name: &str, store: &RecordStore) -> DoorOutcome {
    let mut outcome = DoorOutcome {
        door_name: door_name.to_string(),
        action: OverrideAction::NoRecord,
        spawn: None,
    };

    if resolve(door, &[ENTERING_PLAYER_FIELD]).is_some() || resolve(door, &[LEAVING_PLAYER_FIELD]).is_some() {
        info!(target: RANDOMIZER, "Skipping active door '{door_name}' (player interacting)");
        outcome.action = OverrideAction::SkippedActive;
        return outcome;
    }

    let Some(record) = store.get(scene_name, door_name) else {
        return outcome;
    };

    outcome.action = redirect(door, door_name, record);
    if !record.fake_spawn_id.is_empty() {
        outcome.spawn = Some(override_spawn(door, door_name, &record.fake_spawn_id));
    }
    outcome
}

fn redirect(door: &mut dyn Reflect, door_name: &str, record: &DoorRecord) -> OverrideAction {
    // A door whose destination is still null has no resolvable value, so
    // fall back to the first declared candidate.
    let (member, original) = match resolve_string(door, DESTINATION_CANDIDATES) {
        Some(found) => (found.member, found.value.to_string()),
        None => match find_string_field(door, DESTINATION_CANDIDATES) {
            Some(member) => (member, String::new()),
            None => {
                error!(
                    target: RANDOMIZER,
                    "No destination field found on {} '{door_name}'",
                    door.type_info().name()
                );
                return OverrideAction::DestinationNotFound;
            }
        },
    };

    match write(door, &member, record.other_side_scene.as_str()) {
        Ok(()) => {
            info!(
                target: RANDOMIZER,
                "Door '{door_name}' redirected: {original} -> {}", record.other_side_scene
            );
            OverrideAction::Redirected {
                from: original,
                to: record.other_side_scene.clone(),
            }
        }
        Err(e) => {
            error!(target: RANDOMIZER, "Could not redirect '{door_name}': {e}");
            OverrideAction::DestinationRejected(e)
        }
    }
}

fn override_spawn(door: &mut dyn Reflect, door_name: &str, fake_spawn_id: &str) -> SpawnOutcome {
    let Some(member) = find_field(door, &[SPAWN_FIELD]) else {
        error!(target: RANDOMIZER, "{SPAWN_FIELD} field not found on door '{door_name}'");
        return SpawnOutcome::FieldMissing;
    };
    if !matches!(member.ty(), ValueType::Enum(_)) {
        warn!(
            target: RANDOMIZER,
            "{SPAWN_FIELD} on '{door_name}' is {}, not an enum; skipping override to '{fake_spawn_id}'",
            member.ty()
        );
        return SpawnOutcome::Invalid(fake_spawn_id.to_string());
    }

    match write(door, &member, fake_spawn_id) {
        Ok(()) => {
            info!(target: RANDOMIZER, "Spawn override applied for '{door_name}' -> {fake_spawn_id}");
            SpawnOutcome::Applied(fake_spawn_id.to_string())
        }
        Err(e) => {
            warn!(target: RANDOMIZER, "Invalid SpawnID '{fake_spawn_id}' for '{door_name}', skipping override: {e}");
            SpawnOutcome::Invalid(fake_spawn_id.to_string())
        }
    }
}
