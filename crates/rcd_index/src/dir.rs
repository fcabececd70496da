//! Index directory management.
//!
//! Every entity type owns one directory under the configured root:
//!
//! ```text
//! <root>/<entity type>/
//! ├─ CURRENT           # Name of the live generation
//! ├─ gen-000001/       # Search engine files of one generation
//! │  └─ .tantivy-writer.lock
//! └─ gen-000002/       # Generation being rebuilt, if any
//! ```
//!
//! Rebuild writes a fresh generation and swaps `CURRENT` atomically, so a
//! reader never observes a half-built index. Generations not named by
//! `CURRENT` are orphans of an interrupted rebuild and are removed on open.

use crate::error::{IndexError, IndexResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pointer to the live generation.
const CURRENT_FILE: &str = "CURRENT";
/// Temporary file for atomic pointer writes.
const CURRENT_TEMP: &str = "CURRENT.tmp";
/// Prefix of generation directories.
const GENERATION_PREFIX: &str = "gen-";
/// Writer lock file of the search engine.
pub const WRITER_LOCK_FILE: &str = ".tantivy-writer.lock";

/// Manages the generations of one index.
#[derive(Debug)]
pub struct IndexDirectory {
    /// Directory of the index.
    path: PathBuf,
    /// Stable index name.
    name: String,
    /// Live generation.
    current: u64,
}

impl IndexDirectory {
    /// Opens or creates the directory of index `name` under `root`.
    ///
    /// A missing `CURRENT` pointer starts generation 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or `CURRENT`
    /// is unreadable.
    pub fn open(root: &Path, name: &str) -> IndexResult<Self> {
        let path = root.join(name);
        fs::create_dir_all(&path)?;
        if !path.is_dir() {
            return Err(IndexError::configuration(
                name,
                format!("index path is not a directory: {}", path.display()),
            ));
        }

        let mut dir = Self {
            path,
            name: name.to_string(),
            current: 0,
        };
        dir.current = match dir.read_current()? {
            Some(generation) => generation,
            None => {
                fs::create_dir_all(dir.generation_path(1))?;
                dir.write_current(1)?;
                debug!("created index directory {}", dir.path.display());
                1
            }
        };
        fs::create_dir_all(dir.current_path())?;
        Ok(dir)
    }

    /// Returns the directory of the index.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stable index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the live generation.
    #[must_use]
    pub const fn current(&self) -> u64 {
        self.current
    }

    /// Returns the directory of the live generation.
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.generation_path(self.current)
    }

    /// Returns the directory of `generation`.
    #[must_use]
    pub fn generation_path(&self, generation: u64) -> PathBuf {
        self.path.join(format!("{GENERATION_PREFIX}{generation:06}"))
    }

    /// Lists the generations present on disk, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn generations(&self) -> IndexResult<Vec<u64>> {
        let mut generations = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(generation) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix(GENERATION_PREFIX))
                .and_then(|number| number.parse::<u64>().ok())
            {
                generations.push(generation);
            }
        }
        generations.sort_unstable();
        Ok(generations)
    }

    /// Creates an empty generation numbered after every existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_generation(&self) -> IndexResult<(u64, PathBuf)> {
        let latest = self.generations()?.last().copied().unwrap_or(0);
        let generation = latest.max(self.current) + 1;
        let path = self.generation_path(generation);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        self.sync_directory()?;
        Ok((generation, path))
    }

    /// Makes `generation` the live one and returns the previous generation.
    ///
    /// Uses the write-then-rename pattern:
    /// 1. Write to a temporary file
    /// 2. Sync the temporary file
    /// 3. Rename it to `CURRENT`
    /// 4. Fsync the directory
    ///
    /// # Errors
    ///
    /// Returns an error if the generation is missing or the pointer cannot
    /// be written.
    pub fn swap(&mut self, generation: u64) -> IndexResult<u64> {
        if !self.generation_path(generation).is_dir() {
            return Err(IndexError::configuration(
                &self.name,
                format!("generation {generation} does not exist"),
            ));
        }
        self.write_current(generation)?;
        let previous = std::mem::replace(&mut self.current, generation);
        info!(
            "index {} switched from generation {} to {}",
            self.name, previous, generation
        );
        Ok(previous)
    }

    /// Removes a generation that is not live.
    ///
    /// # Errors
    ///
    /// Returns an error if `generation` is live or cannot be removed.
    pub fn remove_generation(&self, generation: u64) -> IndexResult<()> {
        if generation == self.current {
            return Err(IndexError::configuration(
                &self.name,
                format!("cannot remove live generation {generation}"),
            ));
        }
        let path = self.generation_path(generation);
        if path.exists() {
            fs::remove_dir_all(&path)?;
            self.sync_directory()?;
        }
        Ok(())
    }

    /// Removes every generation that is not live.
    ///
    /// Returns the number of generations removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a generation cannot be removed.
    pub fn sweep_orphans(&self) -> IndexResult<usize> {
        let mut removed = 0;
        for generation in self.generations()? {
            if generation != self.current {
                warn!(
                    "removing orphan generation {} of index {}",
                    generation, self.name
                );
                fs::remove_dir_all(self.generation_path(generation))?;
                removed += 1;
            }
        }
        if removed > 0 {
            self.sync_directory()?;
        }
        Ok(removed)
    }

    /// Removes a writer lock left behind by a crashed process.
    ///
    /// A lock file that can be locked exclusively has no live holder.
    /// Returns true if a stale lock was removed.
    ///
    /// # Errors
    ///
    /// Returns `WriteConflict` if another process holds the lock.
    pub fn clear_stale_lock(&self, generation_path: &Path) -> IndexResult<bool> {
        let lock_path = generation_path.join(WRITER_LOCK_FILE);
        if !lock_path.exists() {
            return Ok(false);
        }
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(IndexError::WriteConflict {
                index: self.name.clone(),
                message: format!("writer lock {} is held", lock_path.display()),
            });
        }
        FileExt::unlock(&lock_file)?;
        drop(lock_file);
        fs::remove_file(&lock_path)?;
        warn!("cleared stale writer lock of index {}", self.name);
        Ok(true)
    }

    fn read_current(&self) -> IndexResult<Option<u64>> {
        let pointer = self.path.join(CURRENT_FILE);
        if !pointer.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&pointer)?;
        let content = content.trim();
        content
            .strip_prefix(GENERATION_PREFIX)
            .and_then(|number| number.parse::<u64>().ok())
            .map(Some)
            .ok_or_else(|| {
                IndexError::configuration(
                    &self.name,
                    format!("malformed CURRENT pointer '{content}'"),
                )
            })
    }

    fn write_current(&self, generation: u64) -> IndexResult<()> {
        let temp_path = self.path.join(CURRENT_TEMP);
        let mut file = File::create(&temp_path)?;
        writeln!(file, "{GENERATION_PREFIX}{generation:06}")?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path.join(CURRENT_FILE))?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> IndexResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> IndexResult<()> {
        Ok(())
    }
}
