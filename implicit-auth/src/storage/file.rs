//! JSON file storage that outlives the process.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fd_lock::RwLock as FileLock;
use tracing::debug;

use super::KeyValueStorage;
use crate::error::Error;

/// File permissions for the store and its lock file (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Permissions for a parent directory this storage creates (Unix only).
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Key/value storage persisted as a single JSON object on disk.
///
/// Every mutation rewrites the file through a sibling temp file and a rename,
/// so a crash never leaves a half-written document behind. Each operation holds an
/// exclusive advisory lock on a sibling `.lock` file, which keeps `take` and every
/// read-modify-write atomic across handles and processes sharing the path.
/// On Unix the files are created owner-only, since they hold access tokens.
pub struct FileStorage {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }

    /// Run `op` while holding the process mutex and the file lock.
    fn locked<T>(&self, op: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_parent()?;
        let mut lock = FileLock::new(open_private(&self.sibling(".lock"))?);
        let _file_guard = lock.write()?;
        op()
    }

    fn ensure_parent(&self) -> Result<(), Error> {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if parent.exists() {
            return Ok(());
        }
        fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(DIR_MODE))?;
        }
        Ok(())
    }

    fn read(&self) -> Result<BTreeMap<String, String>, Error> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), Error> {
        let tmp = self.sibling(".tmp");
        let mut file = open_private(&tmp)?;
        file.set_len(0)?;
        file.write_all(serde_json::to_string_pretty(entries)?.as_bytes())?;
        drop(file);
        // A leftover temp file keeps its old mode, so set it explicitly.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(FILE_MODE))?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!("Wrote {} storage entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

fn open_private(path: &Path) -> Result<File, Error> {
    let mut options = OpenOptions::new();
    options.create(true).truncate(false).read(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    Ok(options.open(path)?)
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        self.locked(|| Ok(self.read()?.remove(key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.locked(|| {
            let mut entries = self.read()?;
            entries.insert(key.to_string(), value.to_string());
            self.write(&entries)
        })
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.locked(|| {
            let mut entries = self.read()?;
            if entries.remove(key).is_some() {
                self.write(&entries)?;
            }
            Ok(())
        })
    }

    fn take(&self, key: &str) -> Result<Option<String>, Error> {
        self.locked(|| {
            let mut entries = self.read()?;
            let value = entries.remove(key);
            if value.is_some() {
                self.write(&entries)?;
            }
            Ok(value)
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Error> {
        self.locked(|| {
            Ok(self
                .read()?
                .into_keys()
                .filter(|key| key.starts_with(prefix))
                .collect())
        })
    }
}
