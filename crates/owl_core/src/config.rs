//! YAML-backed key/value configuration.
//!
//! A [`ConfigManager`] owns a data folder holding the main `config.yml` and
//! any number of named custom configs. Reads take dotted paths
//! (`database.pool.size`) and fall back to the caller's default; writes
//! persist to disk immediately.

use crate::error::OwlError;
use crate::Result;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the main config inside the data folder
pub const MAIN_CONFIG: &str = "config.yml";

/// An in-memory YAML document addressed by dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlConfig {
    root: Value,
}

impl Default for YamlConfig {
    fn default() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }
}

impl YamlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document. An empty document is an empty config; anything but
    /// a mapping at the top level is rejected.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_yaml::from_str::<Value>(content)? {
            Value::Null => Ok(Self::default()),
            root @ Value::Mapping(_) => Ok(Self { root }),
            _ => Err(OwlError::Configuration(
                "top level of a config file must be a mapping".to_string(),
            )),
        }
    }

    /// Load from disk. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.root, |node, key| node.get(key))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Strings, numbers and booleans are all readable as strings.
    pub fn get_string(&self, path: &str, default: &str) -> String {
        match self.get(path) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }

    /// Floating-point values are truncated.
    pub fn get_int(&self, path: &str, default: i64) -> i64 {
        match self.get(path) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_double(&self, path: &str, default: f64) -> f64 {
        match self.get(path) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        match self.get(path) {
            Some(Value::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Set `path` to `value`, creating intermediate sections. Setting
    /// `Value::Null` removes the key.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut keys: Vec<&str> = path.split('.').collect();
        let Some(last) = keys.pop() else {
            return;
        };

        let mut node = &mut self.root;
        for key in keys {
            let section = ensure_mapping(node);
            let key = Value::from(key);
            if !section.get(&key).is_some_and(Value::is_mapping) {
                section.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            node = match section.get_mut(&key) {
                Some(child) => child,
                None => return,
            };
        }

        let section = ensure_mapping(node);
        if value.is_null() {
            section.remove(last);
        } else {
            section.insert(Value::from(last), value);
        }
    }

    /// Top-level keys, in document order.
    pub fn keys(&self) -> Vec<String> {
        match &self.root {
            Value::Mapping(map) => map
                .keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn ensure_mapping(node: &mut Value) -> &mut Mapping {
    if !node.is_mapping() {
        *node = Value::Mapping(Mapping::new());
    }
    match node {
        Value::Mapping(map) => map,
        _ => unreachable!("node was just replaced with a mapping"),
    }
}

/// Main and custom configs for one data folder.
pub struct ConfigManager {
    data_folder: PathBuf,
    main: RwLock<YamlConfig>,
    custom: DashMap<String, YamlConfig>,
    resources: DashMap<String, String>,
}

impl ConfigManager {
    /// Create a manager rooted at `data_folder`. Nothing is read from disk
    /// until a load or reload call.
    pub fn new(data_folder: impl Into<PathBuf>) -> Self {
        Self {
            data_folder: data_folder.into(),
            main: RwLock::new(YamlConfig::default()),
            custom: DashMap::new(),
            resources: DashMap::new(),
        }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.data_folder.join(file_name)
    }

    /// Register the bundled default contents for `file_name`; used when the
    /// file does not exist yet in the data folder.
    pub fn register_default_resource(&self, file_name: &str, contents: impl Into<String>) {
        self.resources.insert(file_name.to_string(), contents.into());
    }

    /// Copy a registered default resource into the data folder. An existing
    /// file is only overwritten when `replace` is set. Returns whether a
    /// file was written.
    pub fn save_resource(&self, file_name: &str, replace: bool) -> Result<bool> {
        let path = self.path_of(file_name);
        if path.exists() && !replace {
            return Ok(false);
        }
        let Some(contents) = self.resources.get(file_name).map(|r| r.value().clone()) else {
            return Err(OwlError::Configuration(format!(
                "no default resource registered for '{file_name}'"
            )));
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        info!("Created default configuration file: {}", path.display());
        Ok(true)
    }

    /// Write the default main config if none exists yet. Without a
    /// registered default an empty file is created.
    pub fn save_default_config(&self) -> Result<()> {
        if self.path_of(MAIN_CONFIG).exists() {
            return Ok(());
        }
        if self.resources.contains_key(MAIN_CONFIG) {
            self.save_resource(MAIN_CONFIG, false)?;
        } else {
            YamlConfig::default().save(&self.path_of(MAIN_CONFIG))?;
        }
        Ok(())
    }

    /// Re-read `config.yml` from disk.
    pub fn reload_main_config(&self) -> Result<()> {
        let config = YamlConfig::load(&self.path_of(MAIN_CONFIG))?;
        *self.main.write() = config;
        Ok(())
    }

    /// Snapshot of the main config.
    pub fn main_config(&self) -> YamlConfig {
        self.main.read().clone()
    }

    /// Load (or reload) a custom config, creating it from its default
    /// resource when the file does not exist yet.
    pub fn load_custom_config(&self, file_name: &str) -> Result<YamlConfig> {
        let path = self.path_of(file_name);
        if !path.exists() && self.resources.contains_key(file_name) {
            self.save_resource(file_name, false)?;
        }
        let config = YamlConfig::load(&path)?;
        self.custom.insert(file_name.to_string(), config.clone());
        Ok(config)
    }

    /// Persist a loaded custom config.
    pub fn save_custom_config(&self, file_name: &str) -> Result<()> {
        let Some(config) = self.custom.get(file_name).map(|c| c.value().clone()) else {
            warn!("Cannot save config '{}' because it was not loaded", file_name);
            return Err(OwlError::ConfigNotLoaded(file_name.to_string()));
        };
        config.save(&self.path_of(file_name)).inspect_err(|e| {
            warn!("Could not save config '{}': {}", file_name, e);
        })
    }

    pub fn custom_config(&self, file_name: &str) -> Option<YamlConfig> {
        self.custom.get(file_name).map(|c| c.value().clone())
    }

    pub fn get_string(&self, path: &str, default: &str) -> String {
        self.main.read().get_string(path, default)
    }

    pub fn get_int(&self, path: &str, default: i64) -> i64 {
        self.main.read().get_int(path, default)
    }

    pub fn get_double(&self, path: &str, default: f64) -> f64 {
        self.main.read().get_double(path, default)
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.main.read().get_bool(path, default)
    }

    /// String read from a custom config; `default` when it is not loaded.
    pub fn get_custom_string(&self, file_name: &str, path: &str, default: &str) -> String {
        self.custom
            .get(file_name)
            .map_or_else(|| default.to_string(), |c| c.get_string(path, default))
    }

    /// Set a main config value and save `config.yml`.
    pub fn set_value(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let snapshot = {
            let mut main = self.main.write();
            main.set(path, value);
            main.clone()
        };
        snapshot.save(&self.path_of(MAIN_CONFIG))
    }

    /// Set a custom config value and save that file.
    pub fn set_custom_value(&self, file_name: &str, path: &str, value: impl Into<Value>) -> Result<()> {
        match self.custom.get_mut(file_name) {
            Some(mut config) => config.set(path, value),
            None => {
                warn!(
                    "Cannot set value in config '{}' because it was not loaded",
                    file_name
                );
                return Err(OwlError::ConfigNotLoaded(file_name.to_string()));
            }
        }
        self.save_custom_config(file_name)
    }

    /// The main config's `debug` flag.
    pub fn is_debug(&self) -> bool {
        self.get_bool("debug", false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEFAULTS: &str = "debug: false\nserver:\n  motd: Welcome\n  max-players: 20\n  view-distance: 8.5\n";

    fn manager() -> (TempDir, ConfigManager) {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().join("owl"));
        (dir, manager)
    }

    #[test]
    fn test_dotted_reads_with_defaults() {
        let config = YamlConfig::parse(DEFAULTS).unwrap();
        assert_eq!(config.get_string("server.motd", "x"), "Welcome");
        assert_eq!(config.get_int("server.max-players", 0), 20);
        assert_eq!(config.get_double("server.view-distance", 0.0), 8.5);
        assert_eq!(config.get_int("server.view-distance", 0), 8);
        assert!(!config.get_bool("debug", true));

        assert_eq!(config.get_string("server.missing", "fallback"), "fallback");
        assert_eq!(config.get_int("server.motd", 7), 7);
        assert!(config.get_bool("server.motd", true));
        assert_eq!(config.get_string("server.max-players", ""), "20");
        assert_eq!(config.keys(), vec!["debug".to_string(), "server".to_string()]);
    }

    #[test]
    fn test_set_creates_sections_and_null_removes() {
        let mut config = YamlConfig::new();
        config.set("a.b.c", 3);
        config.set("a.name", "owl");
        assert_eq!(config.get_int("a.b.c", 0), 3);
        assert_eq!(config.get_string("a.name", ""), "owl");

        config.set("a.name", Value::Null);
        assert!(!config.contains("a.name"));

        // A scalar in the way is replaced by a section.
        config.set("a.name", "x");
        config.set("a.name.inner", true);
        assert!(config.get_bool("a.name.inner", false));
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        assert!(YamlConfig::parse("").unwrap().keys().is_empty());
        assert!(YamlConfig::parse("~").unwrap().keys().is_empty());
        assert!(matches!(
            YamlConfig::parse("- a\n- b\n"),
            Err(OwlError::Configuration(_))
        ));
    }

    #[test]
    fn test_save_default_config_and_set_value_persist() {
        let (_dir, manager) = manager();
        manager.register_default_resource(MAIN_CONFIG, DEFAULTS);
        manager.save_default_config().unwrap();
        manager.reload_main_config().unwrap();
        assert_eq!(manager.get_string("server.motd", ""), "Welcome");

        manager.set_value("server.motd", "Hello").unwrap();
        manager.set_value("debug", true).unwrap();

        let on_disk = YamlConfig::load(&manager.path_of(MAIN_CONFIG)).unwrap();
        assert_eq!(on_disk.get_string("server.motd", ""), "Hello");
        assert!(manager.is_debug());

        // An existing file is not replaced by the default.
        manager.save_default_config().unwrap();
        manager.reload_main_config().unwrap();
        assert_eq!(manager.get_string("server.motd", ""), "Hello");
    }

    #[test]
    fn test_save_default_config_without_resource_creates_empty_file() {
        let (_dir, manager) = manager();
        manager.save_default_config().unwrap();
        assert!(manager.path_of(MAIN_CONFIG).exists());
        manager.reload_main_config().unwrap();
        assert!(manager.main_config().keys().is_empty());
    }

    #[test]
    fn test_custom_configs() {
        let (_dir, manager) = manager();
        manager.register_default_resource("lang/en.yml", "greeting: Hi\n");

        assert_eq!(manager.get_custom_string("lang/en.yml", "greeting", "none"), "none");
        assert!(matches!(
            manager.set_custom_value("lang/en.yml", "greeting", "Yo"),
            Err(OwlError::ConfigNotLoaded(_))
        ));
        assert!(matches!(
            manager.save_custom_config("lang/en.yml"),
            Err(OwlError::ConfigNotLoaded(_))
        ));

        let loaded = manager.load_custom_config("lang/en.yml").unwrap();
        assert_eq!(loaded.get_string("greeting", ""), "Hi");
        assert!(manager.path_of("lang/en.yml").exists());

        manager
            .set_custom_value("lang/en.yml", "greeting", "Yo")
            .unwrap();
        let reloaded = manager.load_custom_config("lang/en.yml").unwrap();
        assert_eq!(reloaded.get_string("greeting", ""), "Yo");
        assert_eq!(manager.get_custom_string("lang/en.yml", "greeting", ""), "Yo");
    }

    #[test]
    fn test_custom_config_without_resource_starts_empty() {
        let (_dir, manager) = manager();
        let config = manager.load_custom_config("stats.yml").unwrap();
        assert!(config.keys().is_empty());
        manager.set_custom_value("stats.yml", "kills", 3).unwrap();
        assert_eq!(
            YamlConfig::load(&manager.path_of("stats.yml")).unwrap().get_int("kills", 0),
            3
        );
    }

    #[test]
    fn test_save_resource_without_registration_fails() {
        let (_dir, manager) = manager();
        assert!(matches!(
            manager.save_resource("nope.yml", false),
            Err(OwlError::Configuration(_))
        ));
    }
}
