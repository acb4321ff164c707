//! Saved-filter store: one pretty-printed JSON document per filter.
//!
//! Saving replaces the whole document. There is no locking; concurrent
//! writers race and the last one wins.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rowscope_engine::SavedFilter;

use crate::store::StoreError;

const EXTENSION: &str = "json";

pub struct FilterStore {
    dir: PathBuf,
}

impl FilterStore {
    /// Use `dir` for filter documents, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every readable filter, newest `createdAt` first.
    pub fn list(&self) -> Result<Vec<SavedFilter>, StoreError> {
        let mut filters = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match read_document(&path) {
                Ok(filter) => filters.push(filter),
                Err(e) => log::warn!("skipping unreadable filter {}: {e}", path.display()),
            }
        }
        filters.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(filters)
    }

    pub fn get(&self, id: &str) -> Result<Option<SavedFilter>, StoreError> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        read_document(&path).map(Some)
    }

    /// Write the whole document. Assigns an id and `createdAt` when missing
    /// and always stamps `updatedAt`.
    pub fn save(&self, mut filter: SavedFilter) -> Result<SavedFilter, StoreError> {
        let now = timestamp();
        if filter.id.is_empty() {
            filter.id = uuid::Uuid::new_v4().to_string();
        }
        if filter.created_at.is_empty() {
            filter.created_at = now.clone();
        }
        filter.updated_at = Some(now);
        self.write(&filter)?;
        log::info!("saved filter {} ({})", filter.id, filter.name);
        Ok(filter)
    }

    /// Remove a filter. Missing ids are not an error.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Import one document or an array of documents. Each imported filter
    /// gets a fresh id; entries without `selectedColumns` and `conditions`
    /// are skipped. Returns the number imported.
    pub fn import(&self, json: &str) -> Result<usize, StoreError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let entries = match value {
            serde_json::Value::Array(items) => items,
            single => vec![single],
        };

        let stamp = Utc::now().timestamp_millis();
        let mut imported = 0;
        let mut seq = 0;
        for entry in entries {
            let complete = ["selectedColumns", "conditions"]
                .iter()
                .all(|key| entry.get(key).is_some_and(|v| !v.is_null()));
            if !complete {
                log::warn!("skipping filter without selectedColumns/conditions");
                continue;
            }
            let mut filter: SavedFilter = match serde_json::from_value(entry) {
                Ok(filter) => filter,
                Err(e) => {
                    log::warn!("skipping malformed filter: {e}");
                    continue;
                }
            };
            // Two imports within the same millisecond must not collide.
            filter.id = loop {
                let id = format!("imported_{stamp}_{seq}");
                seq += 1;
                if !self.path_for(&id)?.exists() {
                    break id;
                }
            };
            if filter.name.trim().is_empty() {
                filter.name = format!("Imported filter {}", imported + 1);
            }
            self.save(filter)?;
            imported += 1;
        }
        Ok(imported)
    }

    /// All filters as one pretty-printed JSON array.
    pub fn export_all(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.list()?)?)
    }

    fn write(&self, filter: &SavedFilter) -> Result<(), StoreError> {
        let path = self.path_for(&filter.id)?;
        std::fs::write(path, serde_json::to_string_pretty(filter)?)?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(StoreError::InvalidFilterId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }
}

fn read_document(path: &Path) -> Result<SavedFilter, StoreError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
