// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`LogicalFileSystem`]: per-(host, storage-service, mount-point)
//! namespace tracking which files are reserved where, enforcing the three
//! invariants from spec.md §3:
//!
//! (i) sum of reservations on a mount never exceeds the disk's capacity;
//! (ii) a file appears in at most one directory per mount;
//! (iii) creating a file that exceeds free space fails without partial
//!      reservation.

use crate::failure::FailureCause;
use crate::ids::FileId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A single mounted namespace. One instance exists per (host,
/// storage-service, mount-point) key; the owning [`StorageService`] is
/// responsible for enforcing that uniqueness at registration time.
#[derive(Debug)]
pub struct LogicalFileSystem {
    capacity: u64,
    /// directory -> (file -> reserved bytes)
    directories: HashMap<PathBuf, HashMap<FileId, u64>>,
    /// file -> directory, for the "at most one directory per mount" check
    file_directory: HashMap<FileId, PathBuf>,
    reserved_total: u64,
}

impl LogicalFileSystem {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            directories: HashMap::new(),
            file_directory: HashMap::new(),
            reserved_total: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn free_space(&self) -> u64 {
        self.capacity - self.reserved_total
    }

    pub fn lookup_file(&self, directory: &Path, file: FileId) -> bool {
        self.directories.get(directory).map(|d| d.contains_key(&file)).unwrap_or(false)
        // RT-2: presence check must not depend on which directory is passed
        // when the caller doesn't know it — see `contains` for that case.
    }

    /// True iff the file is present anywhere on this filesystem (INV-5).
    pub fn contains(&self, file: FileId) -> bool {
        self.file_directory.contains_key(&file)
    }

    /// Reserve `size` bytes for `file` under `directory`. Fails with
    /// `NotEnoughSpace` without reserving anything if free space is
    /// insufficient (invariant iii). If the file already exists elsewhere
    /// on this filesystem, it is moved (invariant ii is maintained, not
    /// violated, by construction — callers that want a true duplicate
    /// create must check `contains` first).
    pub fn create_file(
        &mut self,
        directory: &Path,
        file: FileId,
        size: u64,
    ) -> Result<(), FailureCause> {
        if size > self.free_space() {
            return Err(FailureCause::NotEnoughSpace { file });
        }
        if let Some(old_dir) = self.file_directory.get(&file).cloned() {
            self.remove_reservation(&old_dir, file);
        }
        self.directories.entry(directory.to_path_buf()).or_default().insert(file, size);
        self.file_directory.insert(file, directory.to_path_buf());
        self.reserved_total += size;
        Ok(())
    }

    /// Delete a file's reservation. Per spec.md §4.3: does not fail, and
    /// is a no-op, if the file is absent — but the `bool` return
    /// distinguishes "actually deleted" from "already absent", which
    /// cleanup-deletion actions rely on for logging.
    pub fn delete_file(&mut self, file: FileId) -> bool {
        let Some(dir) = self.file_directory.remove(&file) else {
            return false;
        };
        self.remove_reservation(&dir, file);
        true
    }

    fn remove_reservation(&mut self, directory: &Path, file: FileId) {
        if let Some(dir_map) = self.directories.get_mut(directory) {
            if let Some(size) = dir_map.remove(&file) {
                self.reserved_total -= size;
            }
            if dir_map.is_empty() {
                self.directories.remove(directory);
            }
        }
    }

    pub fn file_size(&self, file: FileId) -> Option<u64> {
        let dir = self.file_directory.get(&file)?;
        self.directories.get(dir)?.get(&file).copied()
    }
}

#[cfg(test)]
#[path = "logical_fs_tests.rs"]
mod tests;
