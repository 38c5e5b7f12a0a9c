// Blob store collaborators: the narrow named-object interface the
// orchestrator needs, a local-directory implementation, and an in-memory
// implementation for tests.

use log::{debug, warn};

use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(display("I/O failure on stored object {path}"))]
    ObjectIo {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Stored object {path} does not exist"))]
    MissingObject { path: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Named-object storage, the only thing the orchestrator knows about its
/// backing bucket. Object names use `/` separators regardless of platform.
pub trait BlobStore {
    fn exists(&self, path: &str) -> StoreResult<bool>;
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
    fn write(&self, path: &str, bytes: &[u8], content_type: &str) -> StoreResult<()>;
    fn read(&self, path: &str) -> StoreResult<Vec<u8>>;
}

/// Bounded retry for store calls. Failures are worth one warning each; the
/// last error is surfaced with its object context intact.
pub fn with_retry<T, F>(attempts: u32, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> StoreResult<T>,
{
    let mut last: Option<StoreError> = None;
    for attempt in 1..=attempts.max(1) {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("store call failed on attempt {}: {}", attempt, e);
                last = Some(e);
            }
        }
    }
    Err(last.expect("at least one attempt was made"))
}

/// Store backed by a directory tree. Object names map to relative file
/// paths; intermediate directories are created on write.
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> LocalDirStore {
        LocalDirStore { root: root.into() }
    }

    fn object_path(&self, path: &str) -> PathBuf {
        let mut p = self.root.clone();
        for part in path.split('/').filter(|s| !s.is_empty()) {
            p.push(part);
        }
        p
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> StoreResult<()> {
        let entries = fs::read_dir(dir).context(ObjectIoSnafu {
            path: dir.display().to_string(),
        })?;
        for entry in entries {
            let entry = entry.context(ObjectIoSnafu {
                path: dir.display().to_string(),
            })?;
            let p = entry.path();
            if p.is_dir() {
                self.collect(&p, out)?;
            } else if let Ok(rel) = p.strip_prefix(&self.root) {
                let name: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect();
                out.push(name.join("/"));
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalDirStore {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.object_path(path).is_file())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut all = Vec::new();
        self.collect(&self.root.clone(), &mut all)?;
        all.retain(|name| name.starts_with(prefix));
        all.sort();
        Ok(all)
    }

    fn write(&self, path: &str, bytes: &[u8], content_type: &str) -> StoreResult<()> {
        let p = self.object_path(path);
        debug!("write {} ({} bytes, {})", path, bytes.len(), content_type);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).context(ObjectIoSnafu {
                path: path.to_string(),
            })?;
        }
        fs::write(&p, bytes).context(ObjectIoSnafu {
            path: path.to_string(),
        })
    }

    fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        let p = self.object_path(path);
        if !p.is_file() {
            return MissingObjectSnafu {
                path: path.to_string(),
            }
            .fail();
        }
        fs::read(&p).context(ObjectIoSnafu {
            path: path.to_string(),
        })
    }
}

/// In-memory store used by tests and usable as a scratch target.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl BlobStore for MemoryStore {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn write(&self, path: &str, bytes: &[u8], _content_type: &str) -> StoreResult<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::MissingObject {
                path: path.to_string(),
            })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(!store.exists("lists/foo/a.csv").unwrap());
        store.write("lists/foo/a.csv", b"x,y\n", "text/csv").unwrap();
        assert!(store.exists("lists/foo/a.csv").unwrap());
        assert_eq!(store.read("lists/foo/a.csv").unwrap(), b"x,y\n");
        assert_eq!(store.list("lists/foo/").unwrap().len(), 1);
        assert!(store.list("lists/bar/").unwrap().is_empty());
        assert!(matches!(
            store.read("lists/bar/a.csv").unwrap_err(),
            StoreError::MissingObject { .. }
        ));
    }

    #[test]
    fn local_dir_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirStore::new(dir.path());
        assert!(store.list("lists/").unwrap().is_empty());
        store
            .write("lists/foo/control_group.csv", b"a\n1\n", "text/csv")
            .unwrap();
        store
            .write("lists/foo/sample_results/lift.json", b"{}", "application/json")
            .unwrap();
        assert!(store.exists("lists/foo/control_group.csv").unwrap());
        assert_eq!(store.read("lists/foo/control_group.csv").unwrap(), b"a\n1\n");
        let names = store.list("lists/foo/").unwrap();
        assert_eq!(
            names,
            vec![
                "lists/foo/control_group.csv".to_string(),
                "lists/foo/sample_results/lift.json".to_string()
            ]
        );
    }

    #[test]
    fn retry_returns_first_success() {
        let calls = Cell::new(0);
        let result: StoreResult<u32> = with_retry(3, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                MissingObjectSnafu { path: "p" }.fail()
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_surfaces_the_last_error() {
        let result: StoreResult<u32> = with_retry(2, || MissingObjectSnafu { path: "p" }.fail());
        assert!(matches!(
            result.unwrap_err(),
            StoreError::MissingObject { .. }
        ));
    }
}
