use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use archdandara_core::{
    load_snapshots, logging, shuffle_destinations, ModConfig, ModError, ModPaths, ModRuntime, RecordStore,
    ScanOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "ArchDandara-CLI", version, about = "Inspect and edit the ArchDandara door database")]
struct Args {
    /// Print the mod's log output.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every door record, grouped by scene.
    List {
        /// Door database; defaults to the game's user-data location.
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        scene: Option<String>,
    },
    /// Change where a door leads, or which spawn point it uses.
    Set {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        scene: String,
        #[arg(long)]
        door: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        spawn: Option<String>,
    },
    /// Deterministically permute known destinations.
    Shuffle {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        seed: u64,
        /// Only shuffle doors in these scenes (repeatable).
        #[arg(long = "scene-filter")]
        scene_filter: Vec<String>,
    },
    /// Run recorded scene snapshots through the mod.
    Replay {
        #[arg(long)]
        db: Option<PathBuf>,
        /// Snapshot file, or a directory searched recursively for *.json.
        #[arg(long)]
        snapshots: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), ModError> {
    let config = match &args.command {
        Command::Replay {
            config: Some(path), ..
        } => ModConfig::load_or_init(path),
        _ => ModConfig::default(),
    };
    if args.verbose {
        logging::init(&config, None)?;
    }

    match args.command {
        Command::List { db, scene } => list(&db_path(db), scene.as_deref()),
        Command::Set {
            db,
            scene,
            door,
            to,
            spawn,
        } => set(&db_path(db), scene, door, to, spawn),
        Command::Shuffle { db, seed, scene_filter } => shuffle(&db_path(db), seed, &scene_filter),
        Command::Replay { db, snapshots, .. } => replay(&db_path(db), &snapshots, config),
    }
}

fn db_path(db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| ModPaths::default_user_data().database)
}

fn open_existing(db: &Path) -> Result<RecordStore, ModError> {
    if !db.exists() {
        return Err(ModError::Config(format!("{} does not exist", db.display())));
    }
    let mut store = RecordStore::new(db);
    store.try_load()?;
    Ok(store)
}

fn list(db: &Path, scene: Option<&str>) -> Result<(), ModError> {
    let store = open_existing(db)?;
    println!("{store}");
    for scene_name in store.scenes() {
        if scene.is_some_and(|s| s != scene_name) {
            continue;
        }
        println!("{scene_name}:");
        for record in store.doors_in_scene(scene_name) {
            let spawn = if record.fake_spawn_id.is_empty() {
                record.spawn_id.clone()
            } else {
                format!("{} (was {})", record.fake_spawn_id, record.spawn_id)
            };
            println!(
                "  {:<24} -> {:<24} spawn {:<16} at ({:.2}, {:.2}, {:.2})",
                record.door_name, record.other_side_scene, spawn, record.pos_x, record.pos_y, record.pos_z
            );
        }
    }
    Ok(())
}

fn set(db: &Path, scene: String, door: String, to: Option<String>, spawn: Option<String>) -> Result<(), ModError> {
    if to.is_none() && spawn.is_none() {
        return Err(ModError::Config("nothing to change: pass --to and/or --spawn".into()));
    }

    let mut store = open_existing(db)?;
    let mut record = store
        .get(&scene, &door)
        .cloned()
        .ok_or(ModError::UnknownDoor {
            scene_name: scene,
            door_name: door,
        })?;
    if let Some(to) = to {
        record.other_side_scene = to;
    }
    if let Some(spawn) = spawn {
        record.fake_spawn_id = spawn;
    }

    println!("{}/{record}", record.scene_name);
    store.add_or_update(record);
    store.try_save()
}

fn shuffle(db: &Path, seed: u64, scene_filter: &[String]) -> Result<(), ModError> {
    let mut store = open_existing(db)?;
    let scenes = (!scene_filter.is_empty()).then_some(scene_filter);
    let summary = shuffle_destinations(&mut store, seed, scenes);
    if summary.changed > 0 {
        store.try_save()?;
    }
    println!(
        "Seed {}: shuffled {} doors, {} changed destination",
        summary.seed, summary.eligible, summary.changed
    );
    Ok(())
}

fn replay(db: &Path, snapshots: &Path, config: ModConfig) -> Result<(), ModError> {
    let mut world = load_snapshots(snapshots)?;
    let mut runtime = ModRuntime::with_config(config, db);

    for (build_index, scene_name) in world.scene_names().into_iter().enumerate() {
        let step = runtime.replay_scene(&mut world, build_index as i32, &scene_name);
        match &step.scan {
            Some(ScanOutcome::Completed(report)) => println!(
                "{scene_name}: scanned {} doors ({} written, {} kept)",
                report.doors_found, report.records_written, report.records_kept
            ),
            Some(ScanOutcome::Skipped(reason)) => println!("{scene_name}: scan skipped ({reason:?})"),
            Some(ScanOutcome::Aborted(reason)) => println!("{scene_name}: scan aborted ({reason:?})"),
            None => println!("{scene_name}: scanning disabled"),
        }
        for report in &step.applies {
            for door in &report.doors {
                println!("  {:<24} {:?}", door.door_name, door.action);
                if let Some(spawn) = &door.spawn {
                    println!("  {:<24} spawn {:?}", "", spawn);
                }
            }
        }
    }

    println!("{}", runtime.store());
    Ok(())
}
