//! Log targets for each subsystem and the `fern` dispatcher that gates them.

use std::path::Path;

use log::LevelFilter;

use crate::config::{LogSwitches, ModConfig};
use crate::Result;

pub const MAIN: &str = "archdandara::main";
pub const STORE: &str = "archdandara::store";
pub const SCANNER: &str = "archdandara::scanner";
pub const COMPONENT_FIELDS: &str = "archdandara::scanner::fields";
pub const RANDOMIZER: &str = "archdandara::randomizer";

/// Short tag printed in front of every line.
pub fn subsystem_tag(target: &str) -> &str {
    match target {
        MAIN => "MainMod",
        STORE => "DoorJsonManager",
        SCANNER => "RoomDoorScanner",
        COMPONENT_FIELDS => "ComponentFields",
        RANDOMIZER => "DoorRandomizer",
        other => other,
    }
}

/// Whether output for `target` is switched on. Targets outside this crate
/// always pass.
pub fn target_enabled(switches: &LogSwitches, target: &str) -> bool {
    match target {
        MAIN => switches.main,
        STORE => switches.door_json_manager,
        SCANNER => switches.room_door_scanner,
        COMPONENT_FIELDS => switches.component_fields,
        RANDOMIZER => switches.door_randomizer,
        _ => true,
    }
}

/// Installs the global logger: stdout plus an optional log file.
///
/// Fails if a logger is already installed; callers that may initialise more
/// than once can ignore the error.
pub fn init(config: &ModConfig, log_file: Option<&Path>) -> Result<()> {
    let switches = config.log.clone();

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                subsystem_tag(record.target()),
                message
            ))
        })
        .level(LevelFilter::Debug)
        .filter(move |metadata| target_enabled(&switches, metadata.target()))
        .chain(std::io::stdout());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switches_gate_their_own_target_only() {
        let switches = LogSwitches {
            room_door_scanner: false,
            ..LogSwitches::default()
        };

        assert!(!target_enabled(&switches, SCANNER));
        assert!(target_enabled(&switches, STORE));
        assert!(!target_enabled(&switches, COMPONENT_FIELDS));
        assert!(target_enabled(&switches, "some_other_crate"));
    }

    #[test]
    fn tags_name_the_subsystem() {
        assert_eq!(subsystem_tag(RANDOMIZER), "DoorRandomizer");
        assert_eq!(subsystem_tag("archdandara_cli"), "archdandara_cli");
    }
}
