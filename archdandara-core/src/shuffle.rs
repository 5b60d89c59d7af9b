//! Seeded door shuffle for the offline tool.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::scanner::UNKNOWN_DESTINATION;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleSummary {
    pub seed: u64,
    pub eligible: usize,
    pub changed: usize,
}

/// Whether a record takes part in a shuffle: its destination must be known.
pub fn is_shufflable(destination: &str) -> bool {
    !destination.is_empty() && destination != UNKNOWN_DESTINATION
}

/// Permutes destinations among every record whose destination is known,
/// optionally limited to `scenes`. The same seed and database always give
/// the same result.
pub fn shuffle_destinations(store: &mut RecordStore, seed: u64, scenes: Option<&[String]>) -> ShuffleSummary {
    let picked: Vec<(String, String, String)> = store
        .records()
        .iter()
        .filter(|r| is_shufflable(&r.other_side_scene))
        .filter(|r| scenes.map_or(true, |s| s.iter().any(|name| *name == r.scene_name)))
        .map(|r| (r.scene_name.clone(), r.door_name.clone(), r.other_side_scene.clone()))
        .collect();

    let mut destinations: Vec<String> = picked.iter().map(|(_, _, to)| to.clone()).collect();
    let mut rng = StdRng::seed_from_u64(seed ^ 0xD00B_E11A_u64);
    destinations.shuffle(&mut rng);

    let eligible = picked.len();
    let changes = picked
        .into_iter()
        .zip(destinations)
        .map(|((scene, door, _), to)| (scene, door, to));
    let changed = store.set_destinations(changes);

    ShuffleSummary {
        seed,
        eligible,
        changed,
    }
}
