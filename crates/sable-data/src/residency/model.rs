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

//! Keyed residency pool for persistent model/material uniform blocks.
//!
//! Every model's packed uniform bytes live in one shared uniform buffer,
//! sub-allocated by a [`FreeListAllocator`]. Range sizes are rounded up to
//! the device's minimum uniform-buffer offset alignment before allocation;
//! since compaction packs ranges back to offset 0 in order, offsets remain
//! bindable after every defragmentation.

use crate::allocators::{FreeListAllocator, RegionHandle};
use crate::residency::{config::MemoryConfig, error::MemoryError, PersistencePolicy};
use sable_core::renderer::{
    api::{BufferDescriptor, BufferId, BufferUsage},
    traits::GraphicsDevice,
};
use std::borrow::Cow;
use std::collections::HashMap;

/// Identifies the descriptor-set-like slot a model's uniform range binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UniformBinding {
    /// The bind group (descriptor set) index.
    pub group: u32,
    /// The binding index within the group.
    pub binding: u32,
}

/// The packed uniform data handed to [`ModelPool::upload`].
#[derive(Debug, Clone, Copy)]
pub struct ModelUpload<'a> {
    /// The packed uniform block bytes (see
    /// [`UniformBlock`](sable_core::renderer::api::UniformBlock)).
    pub uniform_bytes: &'a [u8],
    /// Where the range binds in the pipeline layout.
    pub binding: UniformBinding,
}

/// Where a resident model's uniform range currently lives.
///
/// Offsets are only stable until the next defragmentation; read them each
/// time a draw is recorded rather than caching them outside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLocation {
    /// The shared uniform buffer.
    pub uniform_buffer: BufferId,
    /// Byte offset of this model's uniform data, a multiple of the device's
    /// minimum uniform-buffer offset alignment.
    pub uniform_offset: u64,
    /// Size of the packed uniform data in bytes (unpadded).
    pub uniform_size: u64,
    /// Where the range binds in the pipeline layout.
    pub binding: UniformBinding,
}

#[derive(Debug)]
struct ModelEntry {
    region: RegionHandle,
    /// Last-known offset, compared after defragmentation to decide whether
    /// the range must be re-uploaded.
    start: u64,
    /// Source bytes retained for defragmentation re-upload.
    uniform_bytes: Vec<u8>,
    binding: UniformBinding,
    refs: u32,
    policy: PersistencePolicy,
}

/// Tracks named model/material uniform blocks resident in the shared
/// uniform buffer.
#[derive(Debug)]
pub struct ModelPool {
    uniform_buffer: BufferId,
    alloc: FreeListAllocator,
    /// The device's minimum uniform-buffer offset alignment; every range
    /// size is rounded up to it.
    alignment: u64,
    entries: HashMap<String, ModelEntry>,
}

impl ModelPool {
    /// Creates the pool and its shared uniform buffer.
    ///
    /// # Errors
    ///
    /// Propagates buffer-creation failures from the device.
    pub fn new(device: &dyn GraphicsDevice, config: &MemoryConfig) -> Result<Self, MemoryError> {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("ModelPool uniforms")),
            size: config.model_uniform_bytes,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;

        Ok(Self {
            uniform_buffer,
            alloc: FreeListAllocator::new(config.model_uniform_bytes),
            alignment,
            entries: HashMap::new(),
        })
    }

    /// Uploads a model's packed uniform bytes under `key`.
    ///
    /// Redundant uploads of a still-resident key are skipped; a key whose
    /// backing was reclaimed while unused behaves like a fresh upload.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::InvalidArgument`] for empty uniform data.
    /// * [`MemoryError::OutOfMemory`] when the allocator is exhausted; the
    ///   caller may defragment and retry.
    pub fn upload(
        &mut self,
        device: &dyn GraphicsDevice,
        key: &str,
        data: &ModelUpload<'_>,
        policy: PersistencePolicy,
    ) -> Result<(), MemoryError> {
        if data.uniform_bytes.is_empty() {
            return Err(MemoryError::InvalidArgument(format!(
                "model '{key}' has empty uniform data"
            )));
        }

        if let Some(entry) = self.entries.get(key) {
            if self.alloc.is_live(entry.region) {
                log::debug!("ModelPool: '{key}' already resident, skipping upload");
                return Ok(());
            }
            self.entries.remove(key);
        }

        // Round the range up to the binding alignment so repacking from
        // offset 0 keeps every surviving offset aligned.
        let padded = (data.uniform_bytes.len() as u64).div_ceil(self.alignment) * self.alignment;
        let region = self
            .alloc
            .allocate(padded, self.alignment)
            .map_err(|e| MemoryError::from_alloc(key, e))?;
        let start = self
            .alloc
            .get(region)
            .map_err(|e| MemoryError::from_alloc(key, e))?
            .start;

        device.write_buffer(self.uniform_buffer, start, data.uniform_bytes)?;

        log::debug!(
            "ModelPool: uploaded '{}' ({} uniform bytes at {})",
            key,
            data.uniform_bytes.len(),
            start
        );

        self.entries.insert(
            key.to_string(),
            ModelEntry {
                region,
                start,
                uniform_bytes: data.uniform_bytes.to_vec(),
                binding: data.binding,
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
    /// [`MemoryError::NotFound`] if the key was never uploaded or was
    /// evicted while unused (cache miss: the entry is removed and the caller
    /// re-uploads).
    pub fn acquire(&mut self, key: &str) -> Result<(), MemoryError> {
        let entry = self.entries.get_mut(key).ok_or_else(|| MemoryError::NotFound {
            key: key.to_string(),
        })?;

        if entry.refs == 0 {
            if !self.alloc.is_live(entry.region) {
                log::debug!("ModelPool: '{key}' was evicted while unused, treating as cache miss");
                self.entries.remove(key);
                return Err(MemoryError::NotFound {
                    key: key.to_string(),
                });
            }
            let region = self
                .alloc
                .reacquire(entry.region)
                .map_err(|e| MemoryError::from_alloc(key, e))?;
            entry.start = region.start;
        }
        entry.refs += 1;
        Ok(())
    }

    /// Bumps the reference count of an entry that is already held.
    pub(crate) fn retain(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            debug_assert!(entry.refs > 0, "retain on an unheld model entry");
            entry.refs += 1;
        } else {
            debug_assert!(false, "retain on an unknown model key '{key}'");
        }
    }

    /// Drops one reference on `key`, applying the persistence policy at zero.
    pub fn release(&mut self, key: &str) {
        let Some(entry) = self.entries.get_mut(key) else {
            debug_assert!(false, "release on an unknown model key '{key}'");
            return;
        };
        debug_assert!(entry.refs > 0, "release on an unheld model entry");
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return;
        }

        let region = entry.region;
        if let Err(e) = self.alloc.mark_unused(region) {
            log::warn!("ModelPool: releasing '{key}' uniform range failed: {e}");
        }
        match entry.policy {
            PersistencePolicy::Transient => {
                log::debug!("ModelPool: '{key}' released, evicting immediately");
                self.entries.remove(key);
            }
            PersistencePolicy::Cached => {
                log::debug!("ModelPool: '{key}' released, kept warm until memory pressure");
            }
        }
    }

    /// Reads the current placement of a resident model.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NotFound`] for an unknown key.
    pub fn location(&self, key: &str) -> Result<ModelLocation, MemoryError> {
        let entry = self.entries.get(key).ok_or_else(|| MemoryError::NotFound {
            key: key.to_string(),
        })?;
        let region = self
            .alloc
            .get(entry.region)
            .map_err(|e| MemoryError::from_alloc(key, e))?;

        Ok(ModelLocation {
            uniform_buffer: self.uniform_buffer,
            uniform_offset: region.start,
            uniform_size: entry.uniform_bytes.len() as u64,
            binding: entry.binding,
        })
    }

    /// Compacts the allocator and re-uploads every range whose offset
    /// changed; unused cached entries are dropped.
    ///
    /// # Errors
    ///
    /// Propagates device write failures from the re-upload pass.
    pub fn defragment(&mut self, device: &dyn GraphicsDevice) -> Result<(), MemoryError> {
        self.entries.retain(|key, entry| {
            if entry.refs == 0 {
                log::debug!("ModelPool: evicting unused model '{key}' during defragmentation");
                false
            } else {
                true
            }
        });

        self.alloc.defragment();

        for (key, entry) in self.entries.iter_mut() {
            let region = self
                .alloc
                .get(entry.region)
                .map_err(|e| MemoryError::from_alloc(key, e))?;
            if region.start != entry.start {
                device.write_buffer(self.uniform_buffer, region.start, &entry.uniform_bytes)?;
                entry.start = region.start;
            }
        }
        Ok(())
    }

    /// Returns `true` if `key` is resident with its backing intact.
    pub fn is_resident(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| self.alloc.is_live(entry.region))
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

    /// Free bytes remaining in the uniform allocator.
    pub fn free_bytes(&self) -> u64 {
        self.alloc.free_bytes()
    }

    /// Total capacity of the shared uniform buffer.
    pub fn capacity(&self) -> u64 {
        self.alloc.capacity()
    }

    /// Destroys the shared GPU buffer. The pool must not be used afterwards.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_buffer(self.uniform_buffer) {
            log::warn!("ModelPool: failed to destroy uniform buffer: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residency::test_device::TestDevice;

    fn config() -> MemoryConfig {
        MemoryConfig {
            vertex_buffer_bytes: 256,
            index_buffer_bytes: 256,
            model_uniform_bytes: 1024,
            per_frame_uniform_bytes: 256,
        }
    }

    fn material(fill: u8) -> Vec<u8> {
        vec![fill; 80]
    }

    fn upload(bytes: &[u8]) -> ModelUpload<'_> {
        ModelUpload {
            uniform_bytes: bytes,
            binding: UniformBinding { group: 1, binding: 0 },
        }
    }

    #[test]
    fn offsets_are_binding_aligned() {
        let device = TestDevice::new();
        let mut pool = ModelPool::new(&device, &config()).unwrap();

        let a = material(1);
        let b = material(2);
        pool.upload(&device, "a", &upload(&a), PersistencePolicy::Cached)
            .unwrap();
        pool.upload(&device, "b", &upload(&b), PersistencePolicy::Cached)
            .unwrap();
        pool.acquire("a").unwrap();
        pool.acquire("b").unwrap();

        let loc_a = pool.location("a").unwrap();
        let loc_b = pool.location("b").unwrap();
        assert_eq!(loc_a.uniform_offset, 0);
        // An 80-byte block still occupies a full 256-byte aligned range.
        assert_eq!(loc_b.uniform_offset, 256);
        assert_eq!(loc_b.uniform_size, 80);
        assert_eq!(device.bytes(loc_b.uniform_buffer, 256, 80), b);
        assert_eq!(loc_b.binding, UniformBinding { group: 1, binding: 0 });
    }

    #[test]
    fn transient_models_evict_at_zero_references() {
        let device = TestDevice::new();
        let mut pool = ModelPool::new(&device, &config()).unwrap();
        pool.upload(&device, "fx", &upload(&material(3)), PersistencePolicy::Transient)
            .unwrap();
        pool.acquire("fx").unwrap();
        pool.release("fx");
        assert_eq!(pool.entry_count(), 0);
        assert_eq!(pool.free_bytes(), 1024);
    }

    #[test]
    fn cached_models_survive_release_until_pressure() {
        let device = TestDevice::new();
        let mut pool = ModelPool::new(&device, &config()).unwrap();
        pool.upload(&device, "stone", &upload(&material(4)), PersistencePolicy::Cached)
            .unwrap();
        pool.acquire("stone").unwrap();
        pool.release("stone");
        assert!(pool.is_resident("stone"));

        // Consume the whole buffer: 4 ranges of 256 bytes.
        for key in ["m0", "m1", "m2", "m3"] {
            pool.upload(&device, key, &upload(&material(9)), PersistencePolicy::Cached)
                .unwrap();
            pool.acquire(key).unwrap();
        }

        assert!(matches!(
            pool.acquire("stone"),
            Err(MemoryError::NotFound { .. })
        ));
    }

    #[test]
    fn defragment_keeps_offsets_aligned() {
        let device = TestDevice::new();
        let mut pool = ModelPool::new(&device, &config()).unwrap();
        let a = material(5);
        let b = material(6);
        pool.upload(&device, "a", &upload(&a), PersistencePolicy::Cached)
            .unwrap();
        pool.upload(&device, "b", &upload(&b), PersistencePolicy::Cached)
            .unwrap();
        pool.acquire("a").unwrap();
        pool.acquire("b").unwrap();
        pool.release("a");

        pool.defragment(&device).unwrap();

        assert_eq!(pool.entry_count(), 1);
        let loc = pool.location("b").unwrap();
        assert_eq!(loc.uniform_offset, 0);
        assert_eq!(loc.uniform_offset % 256, 0);
        assert_eq!(device.bytes(loc.uniform_buffer, 0, 80), b);
    }
}
