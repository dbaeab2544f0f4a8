// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`StorageDirectory`]: the process-wide registry a compute service, a
//! [`crate::action_executor::ActionExecutor`], or a
//! `DataMovementManager` uses to resolve a [`wrench_core::FileLocation`]'s
//! `storage_service` id to the actual [`StorageService`] instance, and a
//! [`FileId`] to its size. Mirrors the "one process-wide file/host arena"
//! design note (spec.md §9): every storage service and every file's size
//! is registered here exactly once, by whoever creates it.

use crate::storage_service::StorageService;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use wrench_core::{FileId, ServiceId};

#[derive(Default)]
pub struct StorageDirectory {
    services: RwLock<HashMap<ServiceId, Arc<StorageService>>>,
    file_sizes: RwLock<HashMap<FileId, u64>>,
}

impl StorageDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_service(&self, service: Arc<StorageService>) {
        self.services.write().insert(service.id(), service);
    }

    pub fn register_file(&self, file: FileId, size: u64) {
        self.file_sizes.write().insert(file, size);
    }

    pub fn service(&self, id: ServiceId) -> Option<Arc<StorageService>> {
        self.services.read().get(&id).cloned()
    }

    pub fn file_size(&self, file: FileId) -> Option<u64> {
        self.file_sizes.read().get(&file).copied()
    }
}

#[cfg(test)]
#[path = "storage_directory_tests.rs"]
mod tests;
