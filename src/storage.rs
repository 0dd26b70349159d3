use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::visual::Theme;

pub const THEME_KEY: &str = "theme:dark";
pub const SOUND_CONSENT_KEY: &str = "sound:consented";

/// String key/value persistence. Callers treat every error as "absent".
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.entries.borrow_mut().insert(key.to_string(), value.to_string());
        store
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// `key=value` lines on disk, rewritten atomically on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStore {
    /// Loads `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = load_entries(&path)?;
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    /// Empty store bound to `path`, ignoring whatever is there now.
    pub fn fresh(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let mut body = String::from("# nordic_aurora prefs v1\n");
        for (k, v) in entries {
            body.push_str(k);
            body.push('=');
            body.push_str(v);
            body.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &body).map_err(|e| StorageError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StorageError::Io(e.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key.is_empty() || key.contains(['=', '\n', '#']) || value.contains('\n') {
            return Err(StorageError::Unavailable(format!("cannot store key {key:?}")));
        }
        // Memory only changes once the file does.
        let mut next = self.entries.borrow().clone();
        next.insert(key.to_string(), value.to_string());
        self.write_entries(&next)?;
        *self.entries.borrow_mut() = next;
        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    let text = match std::fs::read_to_string(path) {
        Ok(v) => v,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(StorageError::Io(err.to_string())),
    };

    let mut entries = BTreeMap::new();
    for (line_idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(StorageError::Parse {
                line: line_idx + 1,
                message: "expected <key>=<value>".to_string(),
            });
        };
        entries.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(entries)
}

pub fn prefs_storage_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("nordic_aurora").join("prefs.txt"));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("nordic_aurora")
            .join("prefs.txt"),
    )
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_flag(store: &dyn KeyValueStore, key: &str) -> Option<bool> {
    match store.get(key) {
        Ok(Some(v)) => parse_bool(&v),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(key, %err, "storage read failed");
            None
        }
    }
}

fn write_flag(store: &dyn KeyValueStore, key: &str, value: bool) {
    if let Err(err) = store.set(key, if value { "1" } else { "0" }) {
        tracing::warn!(key, %err, "storage write failed");
    }
}

pub fn load_theme(store: &dyn KeyValueStore) -> Option<Theme> {
    read_flag(store, THEME_KEY).map(|dark| if dark { Theme::Dark } else { Theme::Light })
}

pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) {
    write_flag(store, THEME_KEY, theme.is_dark());
}

/// Consent defaults to "not consented" when absent or unreadable.
pub fn load_sound_consent(store: &dyn KeyValueStore) -> bool {
    read_flag(store, SOUND_CONSENT_KEY).unwrap_or(false)
}

pub fn save_sound_consent(store: &dyn KeyValueStore, consented: bool) {
    write_flag(store, SOUND_CONSENT_KEY, consented);
}
