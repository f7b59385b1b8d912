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

//! Keyed residency pool for mesh geometry.
//!
//! All meshes share one vertex buffer and one index buffer; each named mesh
//! owns a sub-range of both, handed out by a [`FreeListAllocator`] per
//! buffer. The pool keeps the CPU-side source bytes of every resident mesh
//! so it can re-upload ranges whose offsets change when the allocators are
//! defragmented.

use crate::allocators::{FreeListAllocator, RegionHandle};
use crate::residency::{config::MemoryConfig, error::MemoryError, PersistencePolicy};
use sable_core::renderer::{
    api::{BufferDescriptor, BufferId, BufferUsage, IndexFormat},
    traits::GraphicsDevice,
};
use std::borrow::Cow;
use std::collections::HashMap;

/// Vertex ranges start on a float boundary.
const VERTEX_ALIGNMENT: u64 = 4;

/// The raw geometry handed to [`MeshPool::upload`].
#[derive(Debug, Clone, Copy)]
pub struct MeshUpload<'a> {
    /// Interleaved vertex data, ready for the vertex buffer.
    pub vertex_bytes: &'a [u8],
    /// Index data matching `index_format`.
    pub index_bytes: &'a [u8],
    /// The format of `index_bytes`.
    pub index_format: IndexFormat,
}

impl<'a> MeshUpload<'a> {
    /// Builds an upload from a typed vertex slice and 16-bit indices.
    pub fn with_u16_indices<V: bytemuck::Pod>(vertices: &'a [V], indices: &'a [u16]) -> Self {
        Self {
            vertex_bytes: bytemuck::cast_slice(vertices),
            index_bytes: bytemuck::cast_slice(indices),
            index_format: IndexFormat::Uint16,
        }
    }

    /// Builds an upload from a typed vertex slice and 32-bit indices.
    pub fn with_u32_indices<V: bytemuck::Pod>(vertices: &'a [V], indices: &'a [u32]) -> Self {
        Self {
            vertex_bytes: bytemuck::cast_slice(vertices),
            index_bytes: bytemuck::cast_slice(indices),
            index_format: IndexFormat::Uint32,
        }
    }
}

/// Where a resident mesh currently lives, for binding and drawing.
///
/// Offsets are only stable until the next defragmentation; read them each
/// time a draw is recorded rather than caching them outside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshLocation {
    /// The shared vertex buffer.
    pub vertex_buffer: BufferId,
    /// Byte offset of this mesh's vertex data.
    pub vertex_offset: u64,
    /// Size of this mesh's vertex data in bytes.
    pub vertex_size: u64,
    /// The shared index buffer.
    pub index_buffer: BufferId,
    /// Byte offset of this mesh's index data.
    pub index_offset: u64,
    /// The number of indices to draw.
    pub index_count: u32,
    /// The format of the index data.
    pub index_format: IndexFormat,
}

#[derive(Debug)]
struct MeshEntry {
    vertex_region: RegionHandle,
    index_region: RegionHandle,
    /// Last-known offsets, compared after defragmentation to decide which
    /// ranges must be re-uploaded.
    vertex_start: u64,
    index_start: u64,
    /// Source bytes retained for defragmentation re-upload.
    vertex_bytes: Vec<u8>,
    index_bytes: Vec<u8>,
    index_format: IndexFormat,
    refs: u32,
    policy: PersistencePolicy,
}

/// Tracks named meshes resident in the shared vertex/index buffers.
#[derive(Debug)]
pub struct MeshPool {
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    vertex_alloc: FreeListAllocator,
    index_alloc: FreeListAllocator,
    entries: HashMap<String, MeshEntry>,
}

impl MeshPool {
    /// Creates the pool and its two shared GPU buffers.
    ///
    /// # Errors
    ///
    /// Propagates buffer-creation failures from the device.
    pub fn new(device: &dyn GraphicsDevice, config: &MemoryConfig) -> Result<Self, MemoryError> {
        let vertex_buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("MeshPool vertices")),
            size: config.vertex_buffer_bytes,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        let index_buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("MeshPool indices")),
            size: config.index_buffer_bytes,
            usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_alloc: FreeListAllocator::new(config.vertex_buffer_bytes),
            index_alloc: FreeListAllocator::new(config.index_buffer_bytes),
            entries: HashMap::new(),
        })
    }

    /// Uploads a mesh under `key`, allocating ranges in both shared buffers.
    ///
    /// If the key is already resident (its regions were not reclaimed), the
    /// call is a no-op: the registry detects and skips redundant uploads. A
    /// key whose backing was evicted while unused behaves like a fresh
    /// upload.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::InvalidArgument`] for empty vertex or index data.
    /// * [`MemoryError::OutOfMemory`] when either allocator is exhausted;
    ///   nothing is left allocated in that case, so the caller may
    ///   defragment and retry.
    pub fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        key: &str,
        data: &MeshUpload<'_>,
        policy: PersistencePolicy,
    ) -> Result<(), MemoryError> {
        if data.vertex_bytes.is_empty() || data.index_bytes.is_empty() {
            return Err(MemoryError::InvalidArgument(format!(
                "mesh '{key}' has empty vertex or index data"
            )));
        }

        if let Some(entry) = self.entries.get(key) {
            if self.vertex_alloc.is_live(entry.vertex_region)
                && self.index_alloc.is_live(entry.index_region)
            {
                log::debug!("MeshPool: '{key}' already resident, skipping upload");
                return Ok(());
            }
            // The backing was reclaimed while the entry sat unused.
            self.entries.remove(key);
        }

        let vertex_region = self
            .vertex_alloc
            .allocate(data.vertex_bytes.len() as u64, VERTEX_ALIGNMENT)
            .map_err(|e| MemoryError::from_alloc(key, e))?;
        let index_region = match self
            .index_alloc
            .allocate(data.index_bytes.len() as u64, data.index_format.byte_size())
        {
            Ok(region) => region,
            Err(e) => {
                // Roll the vertex range back so a failed upload leaves the
                // pool exactly as it was.
                if let Err(rollback) = self.vertex_alloc.mark_unused(vertex_region) {
                    log::warn!("MeshPool: rollback of '{key}' vertex range failed: {rollback}");
                }
                return Err(MemoryError::from_alloc(key, e));
            }
        };

        let vertex_start = self
            .vertex_alloc
            .get(vertex_region)
            .map_err(|e| MemoryError::from_alloc(key, e))?
            .start;
        let index_start = self
            .index_alloc
            .get(index_region)
            .map_err(|e| MemoryError::from_alloc(key, e))?
            .start;

        device.write_buffer(self.vertex_buffer, vertex_start, data.vertex_bytes)?;
        device.write_buffer(self.index_buffer, index_start, data.index_bytes)?;

        log::debug!(
            "MeshPool: uploaded '{}' ({} vertex bytes at {}, {} index bytes at {})",
            key,
            data.vertex_bytes.len(),
            vertex_start,
            data.index_bytes.len(),
            index_start
        );

        self.entries.insert(
            key.to_string(),
            MeshEntry {
                vertex_region,
                index_region,
                vertex_start,
                index_start,
                vertex_bytes: data.vertex_bytes.to_vec(),
                index_bytes: data.index_bytes.to_vec(),
                index_format: data.index_format,
                refs: 0,
                policy,
            },
        );
        Ok(())
    }

    /// Takes a reference on `key`, reviving a cached entry if its backing
    /// survived.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NotFound`] if the key was never uploaded, or if the
    /// allocator reclaimed the entry's regions while it was unused (a cache
    /// miss: the entry is removed and the caller re-uploads).
    pub fn acquire(&mut self, key: &str) -> Result<(), MemoryError> {
        let entry = self.entries.get_mut(key).ok_or_else(|| MemoryError::NotFound {
            key: key.to_string(),
        })?;

        if entry.refs == 0 {
            // An unused entry's regions are free records; check they were
            // not consumed before trusting the cached placement.
            if !self.vertex_alloc.is_live(entry.vertex_region)
                || !self.index_alloc.is_live(entry.index_region)
            {
                log::debug!("MeshPool: '{key}' was evicted while unused, treating as cache miss");
                self.entries.remove(key);
                return Err(MemoryError::NotFound {
                    key: key.to_string(),
                });
            }
            let vertex = self
                .vertex_alloc
                .reacquire(entry.vertex_region)
                .map_err(|e| MemoryError::from_alloc(key, e))?;
            let index = self
                .index_alloc
                .reacquire(entry.index_region)
                .map_err(|e| MemoryError::from_alloc(key, e))?;
            entry.vertex_start = vertex.start;
            entry.index_start = index.start;
        }
        entry.refs += 1;
        Ok(())
    }

    /// Bumps the reference count of an entry that is already held.
    ///
    /// Used by handle clones, which by construction reference a resident
    /// entry with `refs >= 1`.
    pub(crate) fn retain(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            debug_assert!(entry.refs > 0, "retain on an unheld mesh entry");
            entry.refs += 1;
        } else {
            debug_assert!(false, "retain on an unknown mesh key '{key}'");
        }
    }

    /// Drops one reference on `key`. At zero the persistence policy decides:
    /// transient entries free their regions and disappear, cached entries
    /// stay revivable until the allocator reclaims their space.
    pub fn release(&mut self, key: &str) {
        let Some(entry) = self.entries.get_mut(key) else {
            debug_assert!(false, "release on an unknown mesh key '{key}'");
            return;
        };
        debug_assert!(entry.refs > 0, "release on an unheld mesh entry");
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return;
        }

        let vertex_region = entry.vertex_region;
        let index_region = entry.index_region;
        if let Err(e) = self.vertex_alloc.mark_unused(vertex_region) {
            log::warn!("MeshPool: releasing '{key}' vertex range failed: {e}");
        }
        if let Err(e) = self.index_alloc.mark_unused(index_region) {
            log::warn!("MeshPool: releasing '{key}' index range failed: {e}");
        }
        match entry.policy {
            PersistencePolicy::Transient => {
                log::debug!("MeshPool: '{key}' released, evicting immediately");
                self.entries.remove(key);
            }
            PersistencePolicy::Cached => {
                log::debug!("MeshPool: '{key}' released, kept warm until memory pressure");
            }
        }
    }

    /// Reads the current placement of a resident mesh.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NotFound`] for an unknown key.
    pub fn location(&self, key: &str) -> Result<MeshLocation, MemoryError> {
        let entry = self.entries.get(key).ok_or_else(|| MemoryError::NotFound {
            key: key.to_string(),
        })?;
        let vertex = self
            .vertex_alloc
            .get(entry.vertex_region)
            .map_err(|e| MemoryError::from_alloc(key, e))?;
        let index = self
            .index_alloc
            .get(entry.index_region)
            .map_err(|e| MemoryError::from_alloc(key, e))?;

        Ok(MeshLocation {
            vertex_buffer: self.vertex_buffer,
            vertex_offset: vertex.start,
            vertex_size: entry.vertex_bytes.len() as u64,
            index_buffer: self.index_buffer,
            index_offset: index.start,
            index_count: (entry.index_bytes.len() as u64 / entry.index_format.byte_size()) as u32,
            index_format: entry.index_format,
        })
    }

    /// Compacts both allocators and re-uploads every range whose offset
    /// changed.
    ///
    /// Cached entries with no references lose their free regions to the
    /// compaction and are dropped; held entries keep their handles and get
    /// their bytes rewritten at the new offsets.
    ///
    /// # Errors
    ///
    /// Propagates device write failures from the re-upload pass.
    pub fn defragment(&mut self, device: &dyn GraphicsDevice) -> Result<(), MemoryError> {
        self.entries.retain(|key, entry| {
            if entry.refs == 0 {
                log::debug!("MeshPool: evicting unused mesh '{key}' during defragmentation");
                false
            } else {
                true
            }
        });

        self.vertex_alloc.defragment();
        self.index_alloc.defragment();

        for (key, entry) in self.entries.iter_mut() {
            let vertex = self
                .vertex_alloc
                .get(entry.vertex_region)
                .map_err(|e| MemoryError::from_alloc(key, e))?;
            if vertex.start != entry.vertex_start {
                device.write_buffer(self.vertex_buffer, vertex.start, &entry.vertex_bytes)?;
                entry.vertex_start = vertex.start;
            }
            let index = self
                .index_alloc
                .get(entry.index_region)
                .map_err(|e| MemoryError::from_alloc(key, e))?;
            if index.start != entry.index_start {
                device.write_buffer(self.index_buffer, index.start, &entry.index_bytes)?;
                entry.index_start = index.start;
            }
        }
        Ok(())
    }

    /// Returns `true` if `key` is resident with its backing intact.
    pub fn is_resident(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| {
            self.vertex_alloc.is_live(entry.vertex_region)
                && self.index_alloc.is_live(entry.index_region)
        })
    }

    /// The reference count of `key`, if registered.
    pub fn ref_count(&self, key: &str) -> Option<u32> {
        self.entries.get(key).map(|entry| entry.refs)
    }

    /// The number of registered entries (held and cached).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The number of entries currently held by at least one handle.
    pub fn held_count(&self) -> usize {
        self.entries.values().filter(|e| e.refs > 0).count()
    }

    /// Free bytes remaining in the vertex allocator.
    pub fn vertex_free_bytes(&self) -> u64 {
        self.vertex_alloc.free_bytes()
    }

    /// Free bytes remaining in the index allocator.
    pub fn index_free_bytes(&self) -> u64 {
        self.index_alloc.free_bytes()
    }

    /// Total capacity of the shared vertex buffer.
    pub fn vertex_capacity(&self) -> u64 {
        self.vertex_alloc.capacity()
    }

    /// Total capacity of the shared index buffer.
    pub fn index_capacity(&self) -> u64 {
        self.index_alloc.capacity()
    }

    /// Destroys the shared GPU buffers. The pool must not be used afterwards.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_buffer(self.vertex_buffer) {
            log::warn!("MeshPool: failed to destroy vertex buffer: {e:?}");
        }
        if let Err(e) = device.destroy_buffer(self.index_buffer) {
            log::warn!("MeshPool: failed to destroy index buffer: {e:?}");
        }
    }
}
