// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`DataMovementManager`]: file copies issued directly by an
//! `ExecutionController` rather than synthesized into a job's action DAG
//! (spec.md §4.8). Reuses the same location-resolution and transfer
//! billing an `ActionKind::FileCopy` action runs through.

use std::sync::Arc;

use wrench_core::{FileId, FileLocation, ServiceId, WrenchResult};
use wrench_kernel::{ActorRegistry, CommPort, Platform, SimClock};
use wrench_services::action_executor;
use wrench_services::storage_directory::StorageDirectory;
use wrench_services::storage_service;

use crate::event::ExecutionEvent;

pub struct DataMovementManager {
    #[allow(dead_code)]
    clock: SimClock,
    controller_port: Arc<CommPort<ExecutionEvent>>,
    registry: ActorRegistry,
    platform: Arc<Platform>,
    storage: Arc<StorageDirectory>,
}

impl DataMovementManager {
    pub fn new(
        clock: SimClock,
        controller_port: Arc<CommPort<ExecutionEvent>>,
        platform: Arc<Platform>,
        storage: Arc<StorageDirectory>,
    ) -> Self {
        Self { clock, controller_port, registry: ActorRegistry::new(), platform, storage }
    }

    /// `doSynchronousFileCopy`: blocks the calling controller until the
    /// copy finishes or fails.
    pub async fn do_synchronous_file_copy(&self, src: &FileLocation, dst: &FileLocation) -> WrenchResult<()> {
        let (src_service, src_dir, file, size) = action_executor::resolve_location(&self.storage, src)?;
        let (dst_service, dst_dir, _, _) = action_executor::resolve_location(&self.storage, dst)?;
        let link = self.platform.route(src_service.host(), dst_service.host());
        storage_service::copy_file(&src_service, &src_dir, &dst_service, &dst_dir, file, size, link).await
    }

    /// `initiateAsynchronousFileCopy`: starts the copy on a background
    /// actor and returns immediately; the eventual outcome arrives on the
    /// controller's port as `FileCopyCompleted`/`FileCopyFailed`.
    pub fn initiate_asynchronous_file_copy(&self, src: FileLocation, dst: FileLocation) -> WrenchResult<(FileId, ServiceId, ServiceId)> {
        let (src_service, src_dir, file, size) = action_executor::resolve_location(&self.storage, &src)?;
        let (dst_service, dst_dir, _, _) = action_executor::resolve_location(&self.storage, &dst)?;
        let src_id = src_service.id();
        let dst_id = dst_service.id();

        let platform = Arc::clone(&self.platform);
        let controller_port = Arc::clone(&self.controller_port);
        self.registry.spawn(move |_kill_switch| async move {
            let link = platform.route(src_service.host(), dst_service.host());
            let result = storage_service::copy_file(&src_service, &src_dir, &dst_service, &dst_dir, file, size, link).await;
            let event = match result {
                Ok(()) => ExecutionEvent::FileCopyCompleted { file, src: src_id, dst: dst_id },
                Err(e) => ExecutionEvent::FileCopyFailed { file, src: src_id, dst: dst_id, failure_cause: e.0 },
            };
            let _ = controller_port.put(event);
        });

        Ok((file, src_id, dst_id))
    }
}

#[cfg(test)]
#[path = "data_movement_manager_tests.rs"]
mod tests;
