//! Drag-degrade switch and its persisted opt-out.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Preference key for the persisted "never degrade while dragging" flag.
pub const DRAG_DEGRADE_DISABLED_KEY: &str = "exploritaire.we.dragDegradeDisabled";

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("failed to read preferences from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write preferences to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed preferences file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode preferences")]
    Encode(#[source] serde_json::Error),
}

/// Key/value persistence for user preferences.
pub trait PreferenceStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferenceError>;
    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), PreferenceError>;
}

/// Process-lifetime store. Values vanish on exit.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferenceStore {
    values: HashMap<String, bool>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferenceError> {
        Ok(self.values.get(key).copied())
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Flat JSON object on disk, rewritten on every change.
///
/// Unknown keys and non-boolean values written by other tools are preserved.
#[derive(Debug, Clone)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, serde_json::Value>,
}

impl JsonFilePreferenceStore {
    /// Loads `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| PreferenceError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(PreferenceError::Read { path, source }),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PreferenceError> {
        let text = serde_json::to_string_pretty(&self.values).map_err(PreferenceError::Encode)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| PreferenceError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, text).map_err(|source| PreferenceError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PreferenceError> {
        Ok(self.values.get(key).and_then(serde_json::Value::as_bool))
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.values.insert(key.to_owned(), serde_json::Value::Bool(value));
        self.flush()
    }
}

/// Global quality switch consulted once per scheduler tick.
///
/// Degrade is active while an interaction (a pointer drag elsewhere in the
/// app) is in progress, unless the user opted out. A diagnostics override
/// beats the persisted opt-out without touching it.
pub struct DegradeController {
    interaction_degraded: bool,
    drag_degrade_disabled: bool,
    diagnostic_override: Option<bool>,
    store: Box<dyn PreferenceStore>,
}

impl DegradeController {
    /// Reads the persisted opt-out from `store`; read errors count as "not disabled".
    pub fn new(store: Box<dyn PreferenceStore>) -> Self {
        let drag_degrade_disabled = match store.get_bool(DRAG_DEGRADE_DISABLED_KEY) {
            Ok(v) => v.unwrap_or(false),
            Err(e) => {
                log::warn!("could not read drag-degrade preference: {e}");
                false
            }
        };
        Self {
            interaction_degraded: false,
            drag_degrade_disabled,
            diagnostic_override: None,
            store,
        }
    }

    pub fn set_interaction_degraded(&mut self, degraded: bool) {
        if self.interaction_degraded != degraded {
            log::debug!("interaction degrade {}", if degraded { "on" } else { "off" });
        }
        self.interaction_degraded = degraded;
    }

    #[inline]
    pub fn is_interaction_degraded(&self) -> bool {
        self.interaction_degraded
    }

    /// Applies and persists the opt-out. A failed write is logged; the
    /// in-memory value still takes effect.
    pub fn set_drag_degrade_disabled(&mut self, disabled: bool) {
        self.drag_degrade_disabled = disabled;
        if let Err(e) = self.store.set_bool(DRAG_DEGRADE_DISABLED_KEY, disabled) {
            log::warn!("could not persist drag-degrade preference: {e}");
        }
    }

    /// Effective opt-out: the diagnostics override if set, else the stored flag.
    #[inline]
    pub fn is_drag_degrade_disabled(&self) -> bool {
        self.diagnostic_override.unwrap_or(self.drag_degrade_disabled)
    }

    pub fn set_diagnostic_override(&mut self, value: Option<bool>) {
        self.diagnostic_override = value;
    }

    #[inline]
    pub fn is_degrade_active(&self) -> bool {
        self.interaction_degraded && !self.is_drag_degrade_disabled()
    }
}

impl Default for DegradeController {
    fn default() -> Self {
        Self::new(Box::new(MemoryPreferenceStore::new()))
    }
}

impl std::fmt::Debug for DegradeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DegradeController")
            .field("interaction_degraded", &self.interaction_degraded)
            .field("drag_degrade_disabled", &self.drag_degrade_disabled)
            .field("diagnostic_override", &self.diagnostic_override)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "watercolor-prefs-{}-{n}-{name}.json",
            std::process::id()
        ))
    }

    struct FailingStore;

    impl PreferenceStore for FailingStore {
        fn get_bool(&self, _key: &str) -> Result<Option<bool>, PreferenceError> {
            Err(PreferenceError::Read {
                path: PathBuf::from("nowhere"),
                source: io::Error::other("boom"),
            })
        }

        fn set_bool(&mut self, _key: &str, _value: bool) -> Result<(), PreferenceError> {
            Err(PreferenceError::Write {
                path: PathBuf::from("nowhere"),
                source: io::Error::other("boom"),
            })
        }
    }

    #[test]
    fn active_only_while_interacting_and_not_disabled() {
        let mut d = DegradeController::default();
        assert!(!d.is_degrade_active());
        d.set_interaction_degraded(true);
        assert!(d.is_degrade_active());
        d.set_drag_degrade_disabled(true);
        assert!(!d.is_degrade_active());
    }

    #[test]
    fn diagnostic_override_wins() {
        let mut d = DegradeController::default();
        d.set_interaction_degraded(true);
        d.set_drag_degrade_disabled(true);
        d.set_diagnostic_override(Some(false));
        assert!(!d.is_drag_degrade_disabled());
        assert!(d.is_degrade_active());
        d.set_diagnostic_override(None);
        assert!(d.is_drag_degrade_disabled());
    }

    #[test]
    fn json_store_survives_reopen() {
        let path = temp_path("roundtrip");
        {
            let store = JsonFilePreferenceStore::open(&path).unwrap();
            let mut d = DegradeController::new(Box::new(store));
            d.set_drag_degrade_disabled(true);
        }
        let reopened = JsonFilePreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.get_bool(DRAG_DEGRADE_DISABLED_KEY).unwrap(), Some(true));
        assert!(DegradeController::new(Box::new(reopened)).is_drag_degrade_disabled());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn json_store_keeps_foreign_keys() {
        let path = temp_path("foreign");
        fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let mut store = JsonFilePreferenceStore::open(&path).unwrap();
        store.set_bool(DRAG_DEGRADE_DISABLED_KEY, false).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["theme"], "dark");
        assert_eq!(v[DRAG_DEGRADE_DISABLED_KEY], false);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_empty_and_garbage_is_an_error() {
        let path = temp_path("missing");
        let store = JsonFilePreferenceStore::open(&path).unwrap();
        assert_eq!(store.get_bool(DRAG_DEGRADE_DISABLED_KEY).unwrap(), None);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFilePreferenceStore::open(&path),
            Err(PreferenceError::Parse { .. })
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn store_failures_do_not_block_the_flag() {
        let mut d = DegradeController::new(Box::new(FailingStore));
        assert!(!d.is_drag_degrade_disabled());
        d.set_drag_degrade_disabled(true);
        assert!(d.is_drag_degrade_disabled());
    }
}
