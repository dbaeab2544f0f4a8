// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`FileLocation`]: identifies where a [`DataFile`] lives — a concrete
//! storage-service mount, the late-binding `SCRATCH` sentinel, or the set
//! produced by a file-registry lookup.

use crate::datafile::DataFile;
use crate::ids::{FileId, ServiceId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a file lives, or will be resolved to live.
///
/// Equality is structural on `(storage_service, absolute path, file)` for
/// [`FileLocation::Concrete`]; `Scratch` and `RegistryIndirected` compare by
/// the file alone since their concrete path is not known until resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileLocation {
    /// Bound to a service and an absolute path under one of its mount
    /// points.
    Concrete { storage_service: ServiceId, mount_point: PathBuf, path_at_mount: PathBuf, file: FileId },
    /// Late-binds to whichever compute service is running the action that
    /// references it; resolved via [`FileLocation::resolve_scratch`].
    Scratch { file: FileId },
    /// Produced by a file-registry lookup: a set of candidate concrete
    /// locations, any of which may satisfy the read.
    RegistryIndirected { file: FileId, candidates: Vec<FileLocation> },
}

impl FileLocation {
    pub fn concrete(
        storage_service: ServiceId,
        mount_point: impl Into<PathBuf>,
        path_at_mount: impl Into<PathBuf>,
        file: FileId,
    ) -> Self {
        FileLocation::Concrete {
            storage_service,
            mount_point: mount_point.into(),
            path_at_mount: path_at_mount.into(),
            file,
        }
    }

    pub fn scratch(file: FileId) -> Self {
        FileLocation::Scratch { file }
    }

    pub fn file(&self) -> FileId {
        match self {
            FileLocation::Concrete { file, .. }
            | FileLocation::Scratch { file }
            | FileLocation::RegistryIndirected { file, .. } => *file,
        }
    }

    pub fn is_scratch(&self) -> bool {
        matches!(self, FileLocation::Scratch { .. })
    }

    pub fn storage_service(&self) -> Option<ServiceId> {
        match self {
            FileLocation::Concrete { storage_service, .. } => Some(*storage_service),
            _ => None,
        }
    }

    /// Absolute path under the mount point, for concrete locations.
    pub fn absolute_path(&self) -> Option<PathBuf> {
        match self {
            FileLocation::Concrete { mount_point, path_at_mount, .. } => {
                Some(mount_point.join(path_at_mount))
            }
            _ => None,
        }
    }

    /// Late-bind a `Scratch` location against the storage service backing
    /// a running compute service's scratch space. No-op for other variants.
    pub fn resolve_scratch(&self, scratch_service: ServiceId, scratch_mount: &std::path::Path) -> Self {
        match self {
            FileLocation::Scratch { file } => FileLocation::Concrete {
                storage_service: scratch_service,
                mount_point: scratch_mount.to_path_buf(),
                path_at_mount: PathBuf::from(file.as_str()),
                file: *file,
            },
            other => other.clone(),
        }
    }
}

/// A black-box collaborator: out of core scope (spec.md §1), modeled only
/// through this one-method interface so `RegistryIndirected` locations can
/// be produced in tests without a real registry implementation.
pub trait FileRegistry {
    fn entries_for(&self, file: &DataFile) -> Vec<FileLocation>;
}

#[cfg(test)]
#[path = "file_location_tests.rs"]
mod tests;
