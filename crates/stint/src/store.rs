//! Session storage
//!
//! All sessions of a working directory live in one JSON document,
//! `.stint-sessions.json`, keyed by session name. The document is read in
//! full and written in full on every operation; writes go through a
//! temporary file and a rename so a crash never leaves half a document.
//!
//! Writers are not coordinated: at most one live `stint` per directory is
//! assumed.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::{resolve_name, Session};

/// Session store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no such session: {0}")]
    NotFound(String),

    #[error("session {name} is malformed: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to access session store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What was found at the store path
enum Contents {
    Missing,
    Document(Map<String, Value>),
    /// Present but not a JSON object
    Corrupt,
}

/// Decode one record and repair anything that breaks the session invariants
fn decode_session(value: Value) -> Result<Session, serde_json::Error> {
    let mut session: Session = serde_json::from_value(value)?;
    session.normalize();
    Ok(session)
}

/// Per-directory session store
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the store for a working directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(stint_core::paths::session_file(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Where a corrupt store is copied before it is replaced
    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    fn read_contents(&self) -> Result<Contents, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Contents::Missing),
            Err(e) => return Err(self.io_error(e)),
        };

        if content.trim().is_empty() {
            return Ok(Contents::Document(Map::new()));
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(Contents::Document(map)),
            Ok(_) => {
                warn!("session store {} is not an object; ignoring it", self.path.display());
                Ok(Contents::Corrupt)
            }
            Err(e) => {
                warn!("failed to parse session store {}: {}; ignoring it", self.path.display(), e);
                Ok(Contents::Corrupt)
            }
        }
    }

    /// Read the whole document; `None` if the file does not exist.
    ///
    /// A document that is not a JSON object is treated as empty.
    fn read_document(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        Ok(match self.read_contents()? {
            Contents::Missing => None,
            Contents::Document(map) => Some(map),
            Contents::Corrupt => Some(Map::new()),
        })
    }

    fn persist(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let content = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    /// Load a session by name (empty name means "default")
    pub fn load(&self, name: &str) -> Result<Session, StoreError> {
        let key = resolve_name(name);
        let document = self
            .read_document()?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let value = document
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        decode_session(value.clone()).map_err(|source| StoreError::Malformed {
            name: key.to_string(),
            source,
        })
    }

    /// Insert or replace a session, keeping every other session in the store.
    ///
    /// A corrupt store is copied to [`backup_path`](Self::backup_path)
    /// before it is replaced.
    pub fn write(&self, session: &Session) -> Result<(), StoreError> {
        let mut document = match self.read_contents()? {
            Contents::Missing => Map::new(),
            Contents::Document(map) => map,
            Contents::Corrupt => {
                let backup = self.backup_path();
                fs::copy(&self.path, &backup).map_err(|e| self.io_error(e))?;
                warn!("kept unreadable session store as {}", backup.display());
                Map::new()
            }
        };
        document.insert(session.key().to_string(), serde_json::to_value(session)?);
        self.persist(&document)?;

        debug!(session = session.key(), elapsed = ?session.elapsed, "session written");
        Ok(())
    }

    /// All readable sessions, sorted by key.
    ///
    /// Records that fail to decode are skipped with a warning.
    pub fn list(&self) -> Result<Vec<(String, Session)>, StoreError> {
        let Some(document) = self.read_document()? else {
            return Ok(Vec::new());
        };

        let mut sessions: Vec<(String, Session)> = document
            .into_iter()
            .filter_map(|(key, value)| match decode_session(value) {
                Ok(session) => Some((key, session)),
                Err(e) => {
                    warn!("skipping malformed session {}: {}", key, e);
                    None
                }
            })
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(sessions)
    }

    /// Remove a session by name
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let key = resolve_name(name);
        let mut document = self
            .read_document()?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if document.remove(key).is_none() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.persist(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Mode, STAMP_FORMAT};
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_store() -> (SessionStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::in_dir(dir.path());
        (store, dir)
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let (store, _dir) = temp_store();
        assert!(matches!(store.load("work"), Err(StoreError::NotFound(name)) if name == "work"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_load_existing_document() {
        let (store, _dir) = temp_store();
        fs::write(
            store.path(),
            r#"{
                "default": {
                    "start": "2024-01-01:00-00-00",
                    "current": "2024-01-01:00-00-05",
                    "elapsed": "5.0s",
                    "paused": false,
                    "mode": "timer",
                    "name": "default",
                    "finished": false,
                    "inline": false
                },
                "named": {
                    "start": "2024-01-01:00-00-00",
                    "current": "2024-01-01:00-00-10",
                    "elapsed": "10.0s",
                    "paused": true,
                    "mode": "counter",
                    "name": "named",
                    "finished": false,
                    "inline": true
                }
            }"#,
        )
        .unwrap();

        let default = store.load("").unwrap();
        assert_eq!(default.elapsed, Duration::from_secs(5));
        assert_eq!(default.mode, Mode::Timer);
        assert_eq!(
            default.current.format(STAMP_FORMAT).to_string(),
            "2024-01-01:00-00-05"
        );

        let named = store.load("named").unwrap();
        assert!(named.paused);
        assert!(named.inline);
        assert_eq!(named.mode, Mode::Counter);

        assert!(matches!(store.load("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_write_then_load() {
        let (store, _dir) = temp_store();

        let mut session = Session::timer("", Duration::from_secs(10));
        session.advance(Duration::from_secs(10));
        session.inline = true;
        store.write(&session).unwrap();

        let loaded = store.load("").unwrap();
        assert_eq!(loaded.elapsed, session.elapsed);
        assert_eq!(loaded.mode, session.mode);
        assert_eq!(loaded.finished, session.finished);
        assert!(loaded.finished);

        let by_key = store.load("default").unwrap();
        assert_eq!(by_key, loaded);
    }

    #[test]
    fn test_write_keeps_other_sessions() {
        let (store, _dir) = temp_store();

        store.write(&Session::counter("a")).unwrap();
        store.write(&Session::timer("b", Duration::from_secs(60))).unwrap();

        let mut a = store.load("a").unwrap();
        a.advance(Duration::from_millis(2500));
        store.write(&a).unwrap();

        let keys: Vec<String> = store.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.load("a").unwrap().elapsed, Duration::from_millis(2500));
        assert_eq!(store.load("b").unwrap().target, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let (store, _dir) = temp_store();
        fs::write(
            store.path(),
            r#"{"x": {"mode": "counter", "name": "x", "elapsed": "1.0s", "label": "deep work"}}"#,
        )
        .unwrap();

        let mut session = store.load("x").unwrap();
        session.advance(Duration::from_secs(1));
        store.write(&session).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["x"]["label"], "deep work");
        assert_eq!(raw["x"]["elapsed"], "2.0s");
    }

    #[test]
    fn test_corrupt_store_is_treated_as_empty() {
        let (store, _dir) = temp_store();
        fs::write(store.path(), "{{{ nope").unwrap();

        assert!(matches!(store.load(""), Err(StoreError::NotFound(_))));

        store.write(&Session::counter("fresh")).unwrap();
        assert_eq!(store.load("fresh").unwrap().name, "fresh");
    }

    #[test]
    fn test_corrupt_store_is_backed_up_before_rewrite() {
        let (store, _dir) = temp_store();
        fs::write(store.path(), "{\"a\": {\"mode\": \"counter\"").unwrap();

        store.write(&Session::counter("b")).unwrap();

        let backup = fs::read_to_string(store.backup_path()).unwrap();
        assert_eq!(backup, "{\"a\": {\"mode\": \"counter\"");
        assert_eq!(store.load("b").unwrap().name, "b");
    }

    #[test]
    fn test_legacy_timer_without_target_loads_finished() {
        let (store, _dir) = temp_store();
        fs::write(
            store.path(),
            r#"{"default": {
                "start": "2024-01-01:00-00-00",
                "current": "2024-01-01:00-00-05",
                "elapsed": "5.0s",
                "paused": false,
                "mode": "timer",
                "name": "default",
                "finished": false,
                "inline": false
            }}"#,
        )
        .unwrap();

        let mut session = store.load("").unwrap();
        assert!(session.finished);
        assert_eq!(session.elapsed, Duration::from_secs(5));

        assert!(!session.advance(Duration::from_millis(100)));
        assert_eq!(session.elapsed, Duration::from_secs(5));
    }

    #[test]
    fn test_finished_counter_is_repaired_on_load() {
        let (store, _dir) = temp_store();
        fs::write(
            store.path(),
            r#"{"c": {"mode": "counter", "name": "c", "elapsed": "4.0s", "finished": true}}"#,
        )
        .unwrap();

        let session = store.load("c").unwrap();
        assert_eq!(session.state(), crate::session::SessionState::Running);
        assert_eq!(store.list().unwrap()[0].1.state(), crate::session::SessionState::Running);
    }

    #[test]
    fn test_malformed_record() {
        let (store, _dir) = temp_store();
        fs::write(store.path(), r#"{"bad": {"mode": "sideways"}, "ok": {"mode": "counter"}}"#).unwrap();

        assert!(matches!(store.load("bad"), Err(StoreError::Malformed { .. })));
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "ok");
    }

    #[test]
    fn test_remove() {
        let (store, _dir) = temp_store();
        store.write(&Session::counter("a")).unwrap();
        store.write(&Session::counter("b")).unwrap();

        store.remove("a").unwrap();
        assert!(matches!(store.load("a"), Err(StoreError::NotFound(_))));
        assert!(store.load("b").is_ok());
        assert!(matches!(store.remove("a"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (store, dir) = temp_store();
        store.write(&Session::counter("a")).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![".stint-sessions.json"]);
    }
}
