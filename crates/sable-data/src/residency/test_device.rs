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

//! A recording in-memory graphics device shared by the residency tests.

use sable_core::renderer::{
    api::{AdapterInfo, BackendKind, BufferDescriptor, BufferId, DeviceKind, DeviceLimits},
    error::ResourceError,
    traits::GraphicsDevice,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Stores buffer contents in host memory so tests can assert what landed
/// where after uploads, defragmentation, and per-frame writes.
#[derive(Debug)]
pub(crate) struct TestDevice {
    buffers: Mutex<HashMap<usize, Vec<u8>>>,
    next_id: AtomicUsize,
}

impl TestDevice {
    pub(crate) fn new() -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Reads back `len` bytes at `offset` of a buffer.
    pub(crate) fn bytes(&self, id: BufferId, offset: u64, len: usize) -> Vec<u8> {
        let buffers = self.buffers.lock().unwrap();
        let data = buffers.get(&id.0).expect("unknown buffer");
        data[offset as usize..offset as usize + len].to_vec()
    }

    /// The number of currently live buffers.
    pub(crate) fn buffer_count(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }
}

impl GraphicsDevice for TestDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.buffers
            .lock()
            .unwrap()
            .insert(id, vec![0u8; descriptor.size as usize]);
        Ok(BufferId(id))
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let id = self.create_buffer(descriptor)?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock().unwrap();
        let buffer = buffers.get_mut(&id.0).ok_or(ResourceError::NotFound)?;
        let end = offset as usize + data.len();
        if end > buffer.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.buffers
            .lock()
            .unwrap()
            .remove(&id.0)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn limits(&self) -> DeviceLimits {
        DeviceLimits {
            min_uniform_buffer_offset_alignment: 256,
            max_buffer_size: 1 << 30,
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "TestDevice".to_string(),
            backend: BackendKind::Headless,
            device_kind: DeviceKind::Cpu,
        }
    }
}
