pub mod error;
pub mod models;
pub mod queries;

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};

pub use error::{Result, StoreError};
pub use models::{Account, AccountId, Post, PostId, Tables, TokenStatus};

/// Single-file JSON record store.
///
/// The whole dataset lives in one file. Every call loads it, optionally
/// mutates it and writes it back, all while holding one lock over the entire
/// structure: shared for reads, exclusive for the full load-mutate-save of a
/// write. Nothing is cached between calls.
pub struct Database {
    path: PathBuf,
    lock: RwLock<()>,
}

impl Database {
    /// Open the store at `path`, creating an empty one if the file is absent.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Self {
            path: path.to_path_buf(),
            lock: RwLock::new(()),
        };

        {
            let _guard = db.lock.write().map_err(|_| StoreError::LockPoisoned)?;
            if !db.path.try_exists()? {
                db.save(&Tables::default())?;
                info!("Initialised empty store at {}", db.path.display());
            }
        }

        info!("Store opened at {}", db.path.display());
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a freshly loaded snapshot under the shared lock.
    pub fn with_read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tables) -> Result<T>,
    {
        let _guard = self.lock.read().map_err(|_| StoreError::LockPoisoned)?;
        let tables = self.load()?;
        f(&tables)
    }

    /// Run `f` against a freshly loaded snapshot under the exclusive lock and
    /// persist the result. If `f` fails nothing is written beyond recreating
    /// a missing backing file as an empty store.
    pub fn with_write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T>,
    {
        let _guard = self.lock.write().map_err(|_| StoreError::LockPoisoned)?;
        if !self.path.try_exists()? {
            self.save(&Tables::default())?;
            info!("Recreated empty store at {}", self.path.display());
        }
        let mut tables = self.load()?;
        let out = f(&mut tables)?;
        self.save(&tables)?;
        Ok(out)
    }

    fn load(&self) -> Result<Tables> {
        match fs::read(&self.path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            // Removed underneath us. Readers see an empty store and the next
            // write recreates the file.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Tables::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the backing file with the full snapshot via a sibling temp
    /// file and a rename.
    fn save(&self, tables: &Tables) -> Result<()> {
        let data = serde_json::to_vec(tables)?;

        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &self.path)?;

        debug!(bytes = data.len(), "store saved");
        Ok(())
    }
}
