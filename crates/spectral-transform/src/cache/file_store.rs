//! File-backed blob publication.
//!
//! A blob is published by creating `<name>.lock` exclusively, writing the
//! framed bytes to a temporary file and renaming it to `<name>`. Rename is
//! atomic, so readers see either nothing or a complete blob. A lock older
//! than five minutes belongs to a publisher that died and is reclaimed.
//!
//! Frame: `b"RBLB"`, key length `u32`, key bytes, payload length `u64`,
//! payload CRC-32 `u32`, payload.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use regrid_common::{RegridError, Result};

use super::{BlobBuilder, KeyedBlobCache};

const FRAME_MAGIC: &[u8; 4] = b"RBLB";

/// Age past which a publication lock is taken to be abandoned.
const STALE_LOCK_AGE: Duration = Duration::from_secs(300);

fn frame(key: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + key.len() + payload.len());
    out.extend_from_slice(FRAME_MAGIC);
    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Payload of a frame if it belongs to `key` and is intact.
fn unframe(key: &str, bytes: &[u8]) -> Option<Vec<u8>> {
    let rest = bytes.strip_prefix(FRAME_MAGIC)?;
    let key_len = u32::from_le_bytes(rest.get(..4)?.try_into().ok()?) as usize;
    let rest = &rest[4..];
    if rest.get(..key_len)? != key.as_bytes() {
        return None;
    }
    let rest = &rest[key_len..];
    let len = u64::from_le_bytes(rest.get(..8)?.try_into().ok()?) as usize;
    let crc = u32::from_le_bytes(rest.get(8..12)?.try_into().ok()?);
    let payload = rest.get(12..)?;
    if payload.len() != len || crc32fast::hash(payload) != crc {
        return None;
    }
    Some(payload.to_vec())
}

/// Directory of framed blobs with a naming rule.
#[derive(Debug, Clone)]
struct FileStore {
    dir: PathBuf,
    backend: &'static str,
    hashed_names: bool,
    stale_after: Duration,
}

impl FileStore {
    fn path_for(&self, key: &str) -> PathBuf {
        let name = if self.hashed_names {
            format!("regrid-{:08x}-{}", crc32fast::hash(key.as_bytes()), key.len())
        } else {
            let safe: String = key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || "+-._".contains(c) { c } else { '_' })
                .collect();
            format!("{}.blob", safe)
        };
        self.dir.join(name)
    }

    fn read(&self, key: &str, path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => match unframe(key, &bytes) {
                Some(payload) => Ok(Some(payload)),
                None => {
                    warn!(backend = self.backend, path = %path.display(), key, "Ignoring foreign or corrupt cache blob");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegridError::resource_unavailable(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn publish(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("tmp{}", std::process::id()));
        let mut file = fs::File::create(&tmp)
            .map_err(|e| RegridError::resource_unavailable(format!("cannot create {}: {}", tmp.display(), e)))?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
            .map_err(|e| RegridError::resource_unavailable(format!("cannot publish {}: {}", path.display(), e)))?;
        Ok(())
    }

    fn get_or_create(&self, key: &str, build: BlobBuilder<'_>) -> Result<Arc<Vec<u8>>> {
        let path = self.path_for(key);
        if let Some(payload) = self.read(key, &path)? {
            debug!(backend = self.backend, key, "Blob cache hit");
            return Ok(Arc::new(payload));
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            RegridError::resource_unavailable(format!("cannot create cache directory {}: {}", self.dir.display(), e))
        })?;
        let lock = path.with_extension("lock");
        let mut reclaimed = false;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    // Another publisher may have finished between the read and the lock.
                    let result = match self.read(key, &path) {
                        Ok(Some(payload)) => Ok(payload),
                        Ok(None) => build().and_then(|payload| {
                            self.publish(&path, &frame(key, &payload))?;
                            debug!(backend = self.backend, key, path = %path.display(), bytes = payload.len(), "Published blob");
                            Ok(payload)
                        }),
                        Err(e) => Err(e),
                    };
                    let _ = fs::remove_file(&lock);
                    return result.map(Arc::new);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(payload) = self.read(key, &path)? {
                        return Ok(Arc::new(payload));
                    }
                    if !reclaimed && self.is_stale(&lock) {
                        warn!(backend = self.backend, key, lock = %lock.display(), "Reclaiming stale publication lock");
                        match fs::remove_file(&lock) {
                            Ok(()) => {}
                            Err(e) if e.kind() == ErrorKind::NotFound => {}
                            Err(e) => return Err(e.into()),
                        }
                        reclaimed = true;
                        continue;
                    }
                    warn!(backend = self.backend, key, "Blob publication in progress elsewhere, building locally");
                    return build().map(Arc::new);
                }
                Err(e) => {
                    return Err(RegridError::resource_unavailable(format!(
                        "cannot lock {}: {}",
                        lock.display(),
                        e
                    )))
                }
            }
        }
    }

    /// A lock untouched for longer than any publication takes was left by
    /// a publisher that died.
    fn is_stale(&self, lock: &Path) -> bool {
        fs::metadata(lock)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .is_some_and(|age| age >= self.stale_after)
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Blobs kept as readable files in a cache directory.
#[derive(Debug, Clone)]
pub struct MappedFileCache {
    store: FileStore,
}

impl MappedFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            store: FileStore {
                dir: dir.into(),
                backend: "mapped",
                hashed_names: false,
                stale_after: STALE_LOCK_AGE,
            },
        }
    }

    pub fn dir(&self) -> &Path {
        &self.store.dir
    }
}

impl KeyedBlobCache for MappedFileCache {
    fn name(&self) -> &'static str {
        self.store.backend
    }

    fn get_or_create(&self, key: &str, build: BlobBuilder<'_>) -> Result<Arc<Vec<u8>>> {
        self.store.get_or_create(key, build)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }
}

/// Blobs kept as named segments visible to every process on the host.
#[derive(Debug, Clone)]
pub struct SharedSegmentCache {
    store: FileStore,
}

impl SharedSegmentCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            store: FileStore {
                dir: dir.into(),
                backend: "shared",
                hashed_names: true,
                stale_after: STALE_LOCK_AGE,
            },
        }
    }

    /// `/dev/shm` when present, else the OS temp directory.
    pub fn default_dir() -> PathBuf {
        let shm = Path::new("/dev/shm");
        if shm.is_dir() {
            shm.to_path_buf()
        } else {
            std::env::temp_dir()
        }
    }

    pub fn dir(&self) -> &Path {
        &self.store.dir
    }
}

impl KeyedBlobCache for SharedSegmentCache {
    fn name(&self) -> &'static str {
        self.store.backend
    }

    fn get_or_create(&self, key: &str, build: BlobBuilder<'_>) -> Result<Arc<Vec<u8>>> {
        self.store.get_or_create(key, build)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_frame_rejects_other_key() {
        let bytes = frame("a", b"payload");
        assert_eq!(unframe("a", &bytes).as_deref(), Some(&b"payload"[..]));
        assert!(unframe("b", &bytes).is_none());
    }

    #[test]
    fn test_frame_rejects_corruption() {
        let mut bytes = frame("k", b"payload");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(unframe("k", &bytes).is_none());
    }

    #[test]
    fn test_second_call_reads_published_blob() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MappedFileCache::new(dir.path());
        let builds = AtomicUsize::new(0);
        let build = || -> Result<Vec<u8>> {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1, 2, 3])
        };
        assert_eq!(*cache.get_or_create("T21_N16", &build).unwrap(), vec![1, 2, 3]);
        assert_eq!(*cache.get_or_create("T21_N16", &build).unwrap(), vec![1, 2, 3]);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("T21_N16.blob").exists());
    }

    #[test]
    fn test_held_lock_builds_locally() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SharedSegmentCache::new(dir.path());
        let path = cache.store.path_for("key");
        fs::write(path.with_extension("lock"), b"").unwrap();
        let blob = cache.get_or_create("key", &|| Ok(vec![9])).unwrap();
        assert_eq!(*blob, vec![9]);
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SharedSegmentCache::new(dir.path());
        let path = cache.store.path_for("key");
        let lock = path.with_extension("lock");
        let file = fs::File::create(&lock).unwrap();
        file.set_modified(SystemTime::now() - 2 * STALE_LOCK_AGE).unwrap();
        drop(file);

        let blob = cache.get_or_create("key", &|| Ok(vec![7])).unwrap();
        assert_eq!(*blob, vec![7]);
        assert!(path.exists());
        assert!(!lock.exists());

        let again = cache
            .get_or_create("key", &|| Err(RegridError::not_implemented("rebuilt")))
            .unwrap();
        assert_eq!(*again, vec![7]);
    }

    #[test]
    fn test_contended_key_publishes_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(MappedFileCache::new(dir.path()));
        let builds = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let builds = builds.clone();
                std::thread::spawn(move || {
                    let build = || -> Result<Vec<u8>> {
                        builds.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        Ok(vec![4, 2])
                    };
                    cache.get_or_create("T42_N32", &build).unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(*h.join().unwrap(), vec![4, 2]);
        }
        assert!(builds.load(Ordering::SeqCst) >= 1);
        assert!(dir.path().join("T42_N32.blob").exists());
        assert!(!dir.path().join("T42_N32.lock").exists());
        assert_eq!(*cache.get_or_create("T42_N32", &|| Ok(vec![0])).unwrap(), vec![4, 2]);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SharedSegmentCache::new(dir.path());
        assert!(cache.remove("nothing").is_ok());
    }
}
