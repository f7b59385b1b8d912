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

//! A [`GraphicsDevice`] that lives entirely in host memory.
//!
//! Buffers are plain byte vectors behind a mutex, and every write is
//! bounds-checked the way a validating driver would. The allocator, the
//! residency pools, and the per-frame stream run unmodified against this
//! device, which is what makes the whole memory core testable on machines
//! with no GPU at all (CI, asset-pipeline tools, headless servers).

use sable_core::renderer::{
    api::{AdapterInfo, BackendKind, BufferDescriptor, BufferId, DeviceKind, DeviceLimits},
    error::ResourceError,
    traits::GraphicsDevice,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// The largest buffer the headless device will create.
const MAX_BUFFER_SIZE: u64 = 256 << 20;

#[derive(Debug)]
struct HeadlessBuffer {
    data: Vec<u8>,
    label: Option<String>,
}

#[derive(Debug, Default)]
struct DeviceState {
    buffers: HashMap<usize, HeadlessBuffer>,
    next_id: usize,
}

/// A host-memory graphics device.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: Mutex<DeviceState>,
}

impl HeadlessDevice {
    /// Creates an empty device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads back `len` bytes at `offset` of a buffer.
    ///
    /// Readback is a headless-only affordance (a real backend would need a
    /// mapped staging copy); tests and tools use it to verify what uploads
    /// actually produced.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NotFound`] for an unknown buffer and
    /// [`ResourceError::OutOfBounds`] for a range past its end.
    pub fn read_buffer(
        &self,
        id: BufferId,
        offset: u64,
        len: usize,
    ) -> Result<Vec<u8>, ResourceError> {
        let state = self.state.lock().expect("headless device mutex poisoned");
        let buffer = state.buffers.get(&id.0).ok_or(ResourceError::NotFound)?;
        let end = offset as usize + len;
        if end > buffer.data.len() {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(buffer.data[offset as usize..end].to_vec())
    }

    /// The number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.state
            .lock()
            .expect("headless device mutex poisoned")
            .buffers
            .len()
    }

    /// The total bytes held across all live buffers.
    pub fn allocated_bytes(&self) -> u64 {
        self.state
            .lock()
            .expect("headless device mutex poisoned")
            .buffers
            .values()
            .map(|b| b.data.len() as u64)
            .sum()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        if descriptor.size > MAX_BUFFER_SIZE {
            return Err(ResourceError::OutOfMemory {
                requested: descriptor.size,
                available: MAX_BUFFER_SIZE,
            });
        }
        let mut state = self.state.lock().expect("headless device mutex poisoned");
        state.next_id += 1;
        let id = state.next_id;
        state.buffers.insert(
            id,
            HeadlessBuffer {
                data: vec![0u8; descriptor.size as usize],
                label: descriptor.label.as_ref().map(|l| l.to_string()),
            },
        );
        log::trace!(
            "HeadlessDevice: created buffer {} ('{}', {} bytes, {:?})",
            id,
            descriptor.label.as_deref().unwrap_or("unnamed"),
            descriptor.size,
            descriptor.usage
        );
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
        let mut state = self.state.lock().expect("headless device mutex poisoned");
        let buffer = state.buffers.get_mut(&id.0).ok_or(ResourceError::NotFound)?;
        let end = offset as usize + data.len();
        if end > buffer.data.len() {
            log::error!(
                "HeadlessDevice: write of {} bytes at {} overruns buffer {} ('{}', {} bytes)",
                data.len(),
                offset,
                id.0,
                buffer.label.as_deref().unwrap_or("unnamed"),
                buffer.data.len()
            );
            return Err(ResourceError::OutOfBounds);
        }
        buffer.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state.lock().expect("headless device mutex poisoned");
        match state.buffers.remove(&id.0) {
            Some(buffer) => {
                log::trace!(
                    "HeadlessDevice: destroyed buffer {} ('{}')",
                    id.0,
                    buffer.label.as_deref().unwrap_or("unnamed")
                );
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn limits(&self) -> DeviceLimits {
        DeviceLimits {
            min_uniform_buffer_offset_alignment: 256,
            max_buffer_size: MAX_BUFFER_SIZE,
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Sable Headless".to_string(),
            backend: BackendKind::Headless,
            device_kind: DeviceKind::Cpu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::renderer::api::BufferUsage;
    use std::borrow::Cow;

    fn descriptor(size: u64) -> BufferDescriptor<'static> {
        BufferDescriptor {
            label: Some(Cow::Borrowed("test")),
            size,
            usage: BufferUsage::COPY_DST,
            mapped_at_creation: false,
        }
    }

    #[test]
    fn create_write_read_destroy() {
        let device = HeadlessDevice::new();
        let id = device.create_buffer(&descriptor(64)).unwrap();

        device.write_buffer(id, 16, &[7u8; 8]).unwrap();
        assert_eq!(device.read_buffer(id, 16, 8).unwrap(), vec![7u8; 8]);
        // Untouched bytes stay zeroed.
        assert_eq!(device.read_buffer(id, 0, 16).unwrap(), vec![0u8; 16]);

        device.destroy_buffer(id).unwrap();
        assert_eq!(device.buffer_count(), 0);
        assert_eq!(device.destroy_buffer(id), Err(ResourceError::NotFound));
    }

    #[test]
    fn initialized_buffers_carry_their_data() {
        let device = HeadlessDevice::new();
        let id = device
            .create_buffer_with_data(&descriptor(8), &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(device.read_buffer(id, 0, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn writes_past_the_end_are_rejected() {
        let device = HeadlessDevice::new();
        let id = device.create_buffer(&descriptor(32)).unwrap();
        assert_eq!(
            device.write_buffer(id, 30, &[0u8; 4]),
            Err(ResourceError::OutOfBounds)
        );
        assert_eq!(
            device.read_buffer(id, 32, 1),
            Err(ResourceError::OutOfBounds)
        );
    }

    #[test]
    fn oversized_buffers_are_rejected() {
        let device = HeadlessDevice::new();
        let err = device
            .create_buffer(&descriptor(device.limits().max_buffer_size + 1))
            .unwrap_err();
        assert!(matches!(err, ResourceError::OutOfMemory { .. }));
    }

    #[test]
    fn accounting_tracks_live_buffers() {
        let device = HeadlessDevice::new();
        let a = device.create_buffer(&descriptor(100)).unwrap();
        let _b = device.create_buffer(&descriptor(50)).unwrap();
        assert_eq!(device.buffer_count(), 2);
        assert_eq!(device.allocated_bytes(), 150);
        device.destroy_buffer(a).unwrap();
        assert_eq!(device.allocated_bytes(), 50);
    }
}
