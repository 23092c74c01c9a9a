//! One JSON file per record in a directory

use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::core::error::Result;
use crate::persistence::{Record, RecordStore};

pub struct JsonDirStore<R> {
    dir: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> JsonDirStore<R> {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            _record: PhantomData,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let file_name: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl<R: Record> RecordStore<R> for JsonDirStore<R> {
    fn load_all(&self) -> Result<Vec<R>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(crate::core::error::ConflictError::from)
                .and_then(|content| Ok(serde_json::from_str::<R>(&content)?));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping unreadable record {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }

    fn save(&self, record: &R) -> Result<()> {
        let path = self.path_for(&record.record_id());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl Record for Note {
        fn record_id(&self) -> String {
            self.id.clone()
        }
    }

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: id.into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_save_replaces_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::<Note>::open(dir.path()).unwrap();
        store.save(&note("a", "first")).unwrap();
        store.save(&note("a", "second")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![note("a", "second")]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::<Note>::open(dir.path()).unwrap();
        store.save(&note("a", "x")).unwrap();
        store.delete("a").unwrap();
        store.delete("a").unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::<Note>::open(dir.path()).unwrap();
        store.save(&note("good", "ok")).unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        fs::write(dir.path().join("ignored.txt"), "whatever").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![note("good", "ok")]);
    }

    #[test]
    fn test_ids_are_sanitized_for_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::<Note>::open(dir.path()).unwrap();
        store.save(&note("../escape", "x")).unwrap();
        assert!(dir.path().join("___escape.json").exists());
    }
}
