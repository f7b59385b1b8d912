// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The single entry point for GPU resource uploads, reuse, and eviction.
//!
//! The [`RendererMemoryManager`] owns the mesh and model pools and the
//! per-frame uniform stream, and is what the rendering backend and asset
//! loaders call. It also implements the one recovery policy of the memory
//! core: when an upload exhausts a pool, the manager defragments that pool
//! and retries the upload exactly once before surfacing the failure. The
//! allocator itself never retries; this is ordinary control flow here, not
//! hidden in the allocation path.

use crate::residency::{
    config::MemoryConfig,
    error::MemoryError,
    handle::{MeshHandle, ModelHandle},
    mesh::{MeshPool, MeshUpload},
    model::{ModelPool, ModelUpload},
    PersistencePolicy,
};
use sable_core::renderer::{
    api::{BufferId, PerFrameUniformStream},
    error::ResourceError,
    traits::GraphicsDevice,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// A snapshot of pool occupancy and per-frame stream usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    /// Capacity of the shared vertex buffer in bytes.
    pub vertex_capacity: u64,
    /// Free bytes in the vertex buffer (possibly fragmented).
    pub vertex_free: u64,
    /// Capacity of the shared index buffer in bytes.
    pub index_capacity: u64,
    /// Free bytes in the index buffer (possibly fragmented).
    pub index_free: u64,
    /// Capacity of the model uniform buffer in bytes.
    pub uniform_capacity: u64,
    /// Free bytes in the model uniform buffer (possibly fragmented).
    pub uniform_free: u64,
    /// Registered mesh entries (held and cached).
    pub mesh_entries: usize,
    /// Mesh entries currently held by at least one handle.
    pub meshes_held: usize,
    /// Registered model entries (held and cached).
    pub model_entries: usize,
    /// Model entries currently held by at least one handle.
    pub models_held: usize,
    /// Capacity of one per-frame stream slot in bytes.
    pub per_frame_capacity: u64,
    /// The largest per-frame usage observed so far.
    pub per_frame_high_water: u64,
}

/// Owns the renderer's GPU memory: shared geometry buffers, the persistent
/// model uniform buffer, and the rotating per-frame stream.
#[derive(Debug)]
pub struct RendererMemoryManager {
    device: Arc<dyn GraphicsDevice>,
    meshes: Rc<RefCell<MeshPool>>,
    models: Rc<RefCell<ModelPool>>,
    frame_stream: PerFrameUniformStream,
}

impl RendererMemoryManager {
    /// Creates the manager and every GPU buffer it owns, sized by `config`.
    ///
    /// # Errors
    ///
    /// Propagates buffer-creation failures from the device.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &MemoryConfig) -> Result<Self, MemoryError> {
        let meshes = MeshPool::new(device.as_ref(), config)?;
        let models = ModelPool::new(device.as_ref(), config)?;
        let frame_stream = PerFrameUniformStream::new(
            device.as_ref(),
            config.per_frame_uniform_bytes,
            "PerFrameUniforms",
        )?;

        log::info!(
            "RendererMemoryManager: initialized on '{}' (vertex {} KiB, index {} KiB, uniforms {} KiB, per-frame {} KiB)",
            device.adapter_info().name,
            config.vertex_buffer_bytes >> 10,
            config.index_buffer_bytes >> 10,
            config.model_uniform_bytes >> 10,
            config.per_frame_uniform_bytes >> 10,
        );

        Ok(Self {
            device,
            meshes: Rc::new(RefCell::new(meshes)),
            models: Rc::new(RefCell::new(models)),
            frame_stream,
        })
    }

    /// Uploads a mesh and returns the initial handle to it (the upload's
    /// reference).
    ///
    /// Uploading a key that is already resident skips the transfer and just
    /// returns another handle. On pool exhaustion the mesh pool is
    /// defragmented and the upload retried once.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::InvalidArgument`] for empty vertex or index data.
    /// * [`MemoryError::OutOfMemory`] if the retry also fails.
    pub fn add_mesh(
        &self,
        key: &str,
        data: &MeshUpload<'_>,
        policy: PersistencePolicy,
    ) -> Result<MeshHandle, MemoryError> {
        let mut meshes = self.meshes.borrow_mut();
        match meshes.upload(self.device.as_ref(), key, data, policy) {
            Ok(()) => {}
            Err(MemoryError::OutOfMemory { requested, free }) => {
                log::warn!(
                    "RendererMemoryManager: mesh pool exhausted uploading '{key}' \
                     ({requested} bytes requested, {free} free), defragmenting and retrying"
                );
                meshes.defragment(self.device.as_ref())?;
                meshes.upload(self.device.as_ref(), key, data, policy)?;
            }
            Err(e) => return Err(e),
        }
        meshes.acquire(key)?;
        drop(meshes);
        Ok(MeshHandle::new(Rc::clone(&self.meshes), key.to_string()))
    }

    /// Acquires a handle to an already-uploaded mesh.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NotFound`] if the key was never uploaded or its
    /// backing was reclaimed while unused; the caller recovers by calling
    /// [`add_mesh`](Self::add_mesh) again (a cache miss, not a failure).
    pub fn get_mesh(&self, key: &str) -> Result<MeshHandle, MemoryError> {
        self.meshes.borrow_mut().acquire(key)?;
        Ok(MeshHandle::new(Rc::clone(&self.meshes), key.to_string()))
    }

    /// Uploads a model's packed uniform block and returns the initial handle.
    ///
    /// Same semantics as [`add_mesh`](Self::add_mesh): redundant uploads are
    /// skipped, and exhaustion triggers one defragment-and-retry.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::InvalidArgument`] for empty uniform data.
    /// * [`MemoryError::OutOfMemory`] if the retry also fails.
    pub fn add_model(
        &self,
        key: &str,
        data: &ModelUpload<'_>,
        policy: PersistencePolicy,
    ) -> Result<ModelHandle, MemoryError> {
        let mut models = self.models.borrow_mut();
        match models.upload(self.device.as_ref(), key, data, policy) {
            Ok(()) => {}
            Err(MemoryError::OutOfMemory { requested, free }) => {
                log::warn!(
                    "RendererMemoryManager: model pool exhausted uploading '{key}' \
                     ({requested} bytes requested, {free} free), defragmenting and retrying"
                );
                models.defragment(self.device.as_ref())?;
                models.upload(self.device.as_ref(), key, data, policy)?;
            }
            Err(e) => return Err(e),
        }
        models.acquire(key)?;
        drop(models);
        Ok(ModelHandle::new(Rc::clone(&self.models), key.to_string()))
    }

    /// Acquires a handle to an already-uploaded model.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NotFound`] on unknown keys and on eviction-while-unused
    /// cache misses.
    pub fn get_model(&self, key: &str) -> Result<ModelHandle, MemoryError> {
        self.models.borrow_mut().acquire(key)?;
        Ok(ModelHandle::new(Rc::clone(&self.models), key.to_string()))
    }

    /// Appends per-frame uniform bytes to the active frame slot and returns
    /// the absolute offset to bind.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfMemory`] if the frame's budget is exhausted.
    /// There is no safe way to partially render a frame, so callers treat
    /// this as fatal; size `per_frame_uniform_bytes` from a scan of all
    /// per-frame consumers instead of relying on recovery.
    pub fn write_per_frame_uniforms(&mut self, bytes: &[u8]) -> Result<u64, MemoryError> {
        match self.frame_stream.write(self.device.as_ref(), bytes) {
            Err(ResourceError::OutOfMemory {
                requested,
                available,
            }) => Err(MemoryError::OutOfMemory {
                requested,
                free: available,
            }),
            result => result.map_err(MemoryError::from),
        }
    }

    /// Rotates the per-frame stream into the next frame slot.
    ///
    /// Call once at the start of every frame, before any per-frame writes.
    pub fn begin_frame(&mut self) {
        self.frame_stream.reset_for_new_frame();
    }

    /// The buffer backing the per-frame stream, for binding.
    pub fn per_frame_buffer(&self) -> BufferId {
        self.frame_stream.buffer()
    }

    /// Compacts every pool now, instead of waiting for an exhausted upload.
    ///
    /// # Errors
    ///
    /// Propagates device write failures from the re-upload passes.
    pub fn defragment(&self) -> Result<(), MemoryError> {
        self.meshes.borrow_mut().defragment(self.device.as_ref())?;
        self.models.borrow_mut().defragment(self.device.as_ref())?;
        Ok(())
    }

    /// Takes a snapshot of pool occupancy and per-frame usage.
    pub fn stats(&self) -> MemoryStats {
        let meshes = self.meshes.borrow();
        let models = self.models.borrow();
        MemoryStats {
            vertex_capacity: meshes.vertex_capacity(),
            vertex_free: meshes.vertex_free_bytes(),
            index_capacity: meshes.index_capacity(),
            index_free: meshes.index_free_bytes(),
            uniform_capacity: models.capacity(),
            uniform_free: models.free_bytes(),
            mesh_entries: meshes.entry_count(),
            meshes_held: meshes.held_count(),
            model_entries: models.entry_count(),
            models_held: models.held_count(),
            per_frame_capacity: self.frame_stream.per_frame_capacity(),
            per_frame_high_water: self.frame_stream.high_water_mark(),
        }
    }

    /// The device every pool uploads through.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Destroys every GPU buffer the manager owns. Outstanding handles keep
    /// their bookkeeping alive but must not be used for binding afterwards.
    pub fn destroy(&self) {
        self.meshes.borrow().destroy(self.device.as_ref());
        self.models.borrow().destroy(self.device.as_ref());
        self.frame_stream.destroy(self.device.as_ref());
    }
}
