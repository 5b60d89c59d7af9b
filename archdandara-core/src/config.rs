//! `ArchDandara.cfg`: a flat table of switches, stored as TOML.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::logging::MAIN;
use crate::Result;

const HEADER: &str = "\
ArchDandara.cfg - configuration for the ArchDandara mod
Controls whether the room door scanner runs and updates the door database,
and which subsystems write to the log.
Created and updated automatically; edit values as key = true | false";

/// Untyped key/value settings file.
pub struct ConfigFile {
    path: PathBuf,
    values: toml::Table,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: toml::Table::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory table with the file's contents. A missing file
    /// leaves the table empty; an unreadable one is logged and ignored.
    pub fn load(&mut self) {
        self.values.clear();
        if !self.path.exists() {
            return;
        }
        match self.read() {
            Ok(values) => self.values = values,
            Err(e) => warn!(target: MAIN, "Ignoring unreadable config {}: {e}", self.path.display()),
        }
    }

    fn read(&self) -> Result<toml::Table> {
        let text = fs::read_to_string(&self.path)?;
        Ok(text.parse::<toml::Table>()?)
    }

    /// Writes every key, preceded by `header` as `#` comment lines.
    pub fn save(&self, header: Option<&str>) -> Result<()> {
        let mut out = String::new();
        if let Some(header) = header {
            for line in header.lines() {
                out.push_str("# ");
                out.push_str(line.trim_end());
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&toml::to_string(&self.values)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, out)?;
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Missing keys are added with `default` so the next save writes them.
    pub fn get_bool(&mut self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(toml::Value::Boolean(b)) => *b,
            Some(toml::Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(toml::Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
            Some(_) => default,
            None => {
                self.set(key, default);
                default
            }
        }
    }

    pub fn get_int(&mut self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(toml::Value::Integer(i)) => *i,
            Some(toml::Value::String(s)) => s.trim().parse().unwrap_or(default),
            Some(_) => default,
            None => {
                self.set(key, default);
                default
            }
        }
    }

    pub fn get_str(&mut self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(toml::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                self.set(key, default);
                default.to_string()
            }
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<toml::Value>) {
        self.values.insert(key.to_string(), value.into());
    }
}

/// Per-subsystem log output switches. Turning one off silences that
/// subsystem's log lines only; the subsystem keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSwitches {
    pub main: bool,
    pub door_json_manager: bool,
    pub room_door_scanner: bool,
    pub door_randomizer: bool,
    pub component_fields: bool,
}

impl Default for LogSwitches {
    fn default() -> Self {
        Self {
            main: true,
            door_json_manager: true,
            room_door_scanner: true,
            door_randomizer: true,
            component_fields: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModConfig {
    pub enable_room_scanning: bool,
    /// Scanner may add new doors but never replaces an existing record.
    pub door_database_readonly: bool,
    pub log: LogSwitches,
}

impl Default for ModConfig {
    fn default() -> Self {
        Self {
            enable_room_scanning: true,
            door_database_readonly: true,
            log: LogSwitches::default(),
        }
    }
}

impl ModConfig {
    pub fn from_file(file: &mut ConfigFile) -> Self {
        let d = Self::default();
        Self {
            enable_room_scanning: file.get_bool("enable_room_scanning", d.enable_room_scanning),
            door_database_readonly: file.get_bool("door_database_readonly", d.door_database_readonly),
            log: LogSwitches {
                main: file.get_bool("log_main", d.log.main),
                door_json_manager: file.get_bool("log_door_json_manager", d.log.door_json_manager),
                room_door_scanner: file.get_bool("log_room_door_scanner", d.log.room_door_scanner),
                door_randomizer: file.get_bool("log_door_randomizer", d.log.door_randomizer),
                component_fields: file.get_bool("log_component_fields", d.log.component_fields),
            },
        }
    }

    pub fn write_to(&self, file: &mut ConfigFile) {
        file.set("enable_room_scanning", self.enable_room_scanning);
        file.set("door_database_readonly", self.door_database_readonly);
        file.set("log_main", self.log.main);
        file.set("log_door_json_manager", self.log.door_json_manager);
        file.set("log_room_door_scanner", self.log.room_door_scanner);
        file.set("log_door_randomizer", self.log.door_randomizer);
        file.set("log_component_fields", self.log.component_fields);
    }

    /// Loads `path`, fills in any missing keys and writes the file back so
    /// players always see every available switch.
    pub fn load_or_init(path: &Path) -> Self {
        let mut file = ConfigFile::new(path);
        file.load();
        let config = Self::from_file(&mut file);
        config.write_to(&mut file);
        if let Err(e) = file.save(Some(HEADER)) {
            warn!(target: MAIN, "Could not write config {}: {e}", path.display());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_written_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ArchDandara").join("ArchDandara.cfg");

        let config = ModConfig::load_or_init(&path);

        assert_eq!(config, ModConfig::default());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# ArchDandara.cfg"));
        assert!(text.contains("enable_room_scanning = true"));
        assert!(text.contains("log_component_fields = false"));
    }

    #[test]
    fn existing_values_survive_and_gaps_are_filled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ArchDandara.cfg");
        fs::write(&path, "enable_room_scanning = false\nlog_door_randomizer = \"False\"\n").unwrap();

        let config = ModConfig::load_or_init(&path);

        assert!(!config.enable_room_scanning);
        assert!(!config.log.door_randomizer);
        assert!(config.door_database_readonly);

        let mut reread = ConfigFile::new(&path);
        reread.load();
        assert!(reread.contains_key("door_database_readonly"));
        assert!(!reread.get_bool("enable_room_scanning", true));
    }

    #[test]
    fn typed_getters_fall_back_on_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.cfg");
        fs::write(&path, "port = \"not a number\"\nname = 7\n").unwrap();

        let mut file = ConfigFile::new(&path);
        file.load();
        assert_eq!(file.get_int("port", 38281), 38281);
        assert_eq!(file.get_str("name", "Player"), "7");
        assert_eq!(file.get_str("password", ""), "");
        assert!(file.contains_key("password"));
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.cfg");
        fs::write(&path, "this is = = not toml").unwrap();

        let mut file = ConfigFile::new(&path);
        file.load();
        assert!(file.get_bool("enable_room_scanning", true));
    }
}
