//! Instance definition store
//!
//! The stage driver only needs to look definitions up by uuid. The JSON file
//! store reads an array of definitions; it is re-read on every lookup because
//! each stage runs in its own short-lived process. Each definition is parsed
//! on its own, so a malformed entry only affects its own uuid.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::InstanceDefinition;

/// Lookup of instance definitions
pub trait InstanceStore {
    /// The definition with this uuid, or `None` when the store has none
    fn get_instance_definition(&self, uuid: &str) -> Result<Option<InstanceDefinition>>;
}

/// Store backed by a JSON file holding an array of definitions
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry in the store, each parsed on its own
    pub fn load_all(&self) -> Result<Vec<StoreEntry>> {
        Ok(self
            .raw_entries()?
            .into_iter()
            .map(|value| StoreEntry {
                uuid: entry_uuid(&value).unwrap_or_default().to_string(),
                definition: serde_json::from_value(value).map_err(Into::into),
            })
            .collect())
    }

    fn raw_entries(&self) -> Result<Vec<Value>> {
        let content = fs::read_to_string(&self.path)?;
        let entries: Vec<Value> = serde_json::from_str(&content)?;
        Ok(entries)
    }
}

/// One store entry and the outcome of parsing it
#[derive(Debug)]
pub struct StoreEntry {
    /// Empty when the entry has no string `uuid`
    pub uuid: String,
    pub definition: Result<InstanceDefinition>,
}

fn entry_uuid(value: &Value) -> Option<&str> {
    value.get("uuid").and_then(Value::as_str)
}

impl InstanceStore for JsonFileStore {
    fn get_instance_definition(&self, uuid: &str) -> Result<Option<InstanceDefinition>> {
        match self
            .raw_entries()?
            .into_iter()
            .find(|value| entry_uuid(value) == Some(uuid))
        {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageScriptError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const STORE_JSON: &str = r#"[
        {
            "uuid": "a",
            "type": "dev",
            "group": "g",
            "deployment": {
                "type": "docker",
                "host": { "type": "ssh", "value": { "user": "u", "ip": "1.2.3.4", "port": "22" } },
                "hostDir": "/var/a",
                "value": { "image": "app", "tag": "1" }
            }
        },
        {
            "uuid": "b",
            "type": "prod",
            "group": "g",
            "deployment": {
                "type": "docker",
                "host": { "type": "ssh", "value": { "user": "u", "ip": "1.2.3.5", "port": "22" } },
                "hostDir": "/var/b",
                "value": { "image": "app", "tag": "2" }
            }
        }
    ]"#;

    fn store_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_lookup_by_uuid() {
        let file = store_file(STORE_JSON);
        let store = JsonFileStore::new(file.path());

        let b = store.get_instance_definition("b").unwrap().expect("b exists");
        assert_eq!(b.kind, "prod");
        assert!(store.get_instance_definition("c").unwrap().is_none());

        let entries = store.load_all().unwrap();
        let uuids: Vec<&str> = entries.iter().map(|e| e.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["a", "b"]);
        assert!(entries.iter().all(|e| e.definition.is_ok()));
    }

    #[test]
    fn test_malformed_neighbour_does_not_hide_others() {
        let broken = STORE_JSON.replacen("\"type\": \"docker\"", "\"type\": 7", 1);
        let file = store_file(&broken);
        let store = JsonFileStore::new(file.path());

        assert!(store.get_instance_definition("b").unwrap().is_some());
        let err = store.get_instance_definition("a").unwrap_err();
        assert!(matches!(err, StageScriptError::Json(_)));

        let entries = store.load_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].definition.is_err());
        assert!(entries[1].definition.is_ok());
    }

    #[test]
    fn test_unknown_execution_stage_is_kept_inert() {
        let json = STORE_JSON.replacen(
            "\"uuid\": \"a\",",
            r#""uuid": "a",
            "scripts": [
                { "type": "shell", "value": "echo", "conditions": ["data"], "executionStage": "pre-start" }
            ],"#,
            1,
        );
        let file = store_file(&json);
        let store = JsonFileStore::new(file.path());

        let a = store.get_instance_definition("a").unwrap().expect("a exists");
        assert_eq!(a.scripts[0].execution_stage, None);
        assert!(store.get_instance_definition("b").unwrap().is_some());
    }

    #[test]
    fn test_missing_store_file() {
        let store = JsonFileStore::new("/nonexistent/stagescript/instances.json");
        let err = store.get_instance_definition("a").unwrap_err();
        assert!(matches!(err, StageScriptError::Io(_)));
    }

    #[test]
    fn test_malformed_store_file() {
        let file = store_file("{ \"uuid\": \"a\" }");
        let store = JsonFileStore::new(file.path());
        let err = store.get_instance_definition("a").unwrap_err();
        assert!(matches!(err, StageScriptError::Json(_)));
        assert!(matches!(store.load_all(), Err(StageScriptError::Json(_))));
    }
}
