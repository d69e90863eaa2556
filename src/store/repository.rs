use crate::tlog;

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use super::records::{RecentFiles, Settings};
use super::StoreError;
use crate::search::{FilterSet, SearchHistory};
use crate::session::SessionSnapshot;

const SESSION_KEY: &str = "session";
const RECENT_FILES_KEY: &str = "recentFiles";
const SEARCH_HISTORY_KEY: &str = "searchHistory";
const SETTINGS_KEY: &str = "settings";
const FILTER_SET_KEY: &str = "filterSet";

/// Keyed state store. Each logical record lives under its own key as JSON
/// text; callers go through the typed accessors.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )?;
        Ok(())
    }

    pub fn retrieve(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM state WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')",
            rusqlite::params![key, blob],
        )?;
        Ok(())
    }

    /// A missing record, or one written by an incompatible version, reads
    /// as the default value.
    fn load_record<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        let Some(blob) = self.retrieve(key)? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&blob) {
            Ok(record) => Ok(record),
            Err(e) => {
                tlog!(warn, "discarding unreadable {} record: {}", key, e);
                Ok(T::default())
            }
        }
    }

    fn save_record<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StoreError> {
        let blob = serde_json::to_string(record)?;
        self.save(key, &blob)
    }

    pub fn session(&self) -> Result<SessionSnapshot, StoreError> {
        self.load_record(SESSION_KEY)
    }

    pub fn save_session(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.save_record(SESSION_KEY, snapshot)
    }

    pub fn recent_files(&self) -> Result<RecentFiles, StoreError> {
        self.load_record(RECENT_FILES_KEY)
    }

    pub fn save_recent_files(&self, recent: &RecentFiles) -> Result<(), StoreError> {
        self.save_record(RECENT_FILES_KEY, recent)
    }

    pub fn search_history(&self) -> Result<SearchHistory, StoreError> {
        self.load_record(SEARCH_HISTORY_KEY)
    }

    pub fn save_search_history(&self, history: &SearchHistory) -> Result<(), StoreError> {
        self.save_record(SEARCH_HISTORY_KEY, history)
    }

    pub fn settings(&self) -> Result<Settings, StoreError> {
        self.load_record(SETTINGS_KEY)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.save_record(SETTINGS_KEY, settings)
    }

    pub fn filter_set(&self) -> Result<FilterSet, StoreError> {
        self.load_record(FILTER_SET_KEY)
    }

    pub fn save_filter_set(&self, filters: &FilterSet) -> Result<(), StoreError> {
        self.save_record(FILTER_SET_KEY, filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Filter;
    use crate::session::SessionFile;
    use std::path::PathBuf;

    #[test]
    fn test_retrieve_missing_key() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.retrieve("nothing").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites() {
        let store = Store::open_in_memory().unwrap();
        store.save("k", "1").unwrap();
        store.save("k", "2").unwrap();
        assert_eq!(store.retrieve("k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_session_record_keeps_order() {
        let store = Store::open_in_memory().unwrap();
        let snapshot = SessionSnapshot {
            files: vec![
                SessionFile {
                    path: PathBuf::from("/logs/z.log"),
                    scroll_position: 7,
                    view_state: None,
                },
                SessionFile {
                    path: PathBuf::from("/logs/a.log"),
                    scroll_position: 42,
                    view_state: Some("{}".to_string()),
                },
            ],
        };
        store.save_session(&snapshot).unwrap();
        assert_eq!(store.session().unwrap(), snapshot);
    }

    #[test]
    fn test_unreadable_record_reads_as_default() {
        let store = Store::open_in_memory().unwrap();
        store.save(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(store.settings().unwrap(), Settings::default());
        assert_eq!(store.session().unwrap(), SessionSnapshot::default());
    }

    #[test]
    fn test_sibling_records_are_independent() {
        let store = Store::open_in_memory().unwrap();

        let mut recent = RecentFiles::default();
        recent.add_recent("/var/log/syslog", 5);
        store.save_recent_files(&recent).unwrap();

        let mut history = SearchHistory::default();
        history.add_recent("timeout");
        store.save_search_history(&history).unwrap();

        let filters = FilterSet {
            filters: vec![Filter {
                pattern: "ERROR".to_string(),
                ignore_case: false,
                fore_color: "red".to_string(),
                back_color: "black".to_string(),
            }],
        };
        store.save_filter_set(&filters).unwrap();

        let settings = Settings {
            main_line_numbers_visible: true,
            ..Settings::default()
        };
        store.save_settings(&settings).unwrap();

        assert_eq!(store.recent_files().unwrap(), recent);
        assert_eq!(store.search_history().unwrap(), history);
        assert_eq!(store.filter_set().unwrap(), filters);
        assert_eq!(store.settings().unwrap(), settings);
        assert!(store.session().unwrap().files.is_empty());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.db");
        {
            let store = Store::open(&db).unwrap();
            store.save("k", "v").unwrap();
        }
        let store = Store::open(&db).unwrap();
        assert_eq!(store.retrieve("k").unwrap().as_deref(), Some("v"));
    }
}
