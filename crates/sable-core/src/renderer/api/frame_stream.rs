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

//! Rotating per-frame stream for transient uniform data.
//!
//! The [`PerFrameUniformStream`] owns a single persistent GPU buffer divided
//! into [`MAX_FRAMES_IN_FLIGHT`] equally sized slots. Per-object and
//! per-screen uniforms that do not survive the frame are appended to the
//! active slot; at the start of each frame the stream advances to the next
//! slot, so the GPU can still read the previous frame's data while the CPU
//! overwrites the oldest slot.
//!
//! ```text
//! Frame N:     [Slot 0: GPU reads] ← draw calls bind offsets in here
//! Frame N+1:   [Slot 1: CPU writes] → write() appends at the cursor
//! Frame N+2:   [Slot 0: CPU writes] → cycle back, GPU finished reading
//! ```

use crate::renderer::{
    api::{
        buffer::{BufferDescriptor, BufferId, BufferUsage},
        common::MAX_FRAMES_IN_FLIGHT,
    },
    error::ResourceError,
    traits::GraphicsDevice,
};
use std::borrow::Cow;

/// A rotating, frame-indexed uniform region for data that is rewritten
/// every frame.
///
/// Writes return the absolute byte offset to bind; the internal cursor
/// advances by the written size rounded up to the device's minimum
/// uniform-buffer offset alignment. Overflowing a frame slot is an
/// [`ResourceError::OutOfMemory`]: the per-frame capacity must be sized up
/// front from a scan of all per-frame uniform consumers, so running out
/// mid-frame is unrecoverable.
#[derive(Debug)]
pub struct PerFrameUniformStream {
    /// The single backing GPU buffer covering all frame slots.
    buffer: BufferId,
    /// The capacity of one frame slot in bytes.
    per_frame_capacity: u64,
    /// The minimum uniform-buffer offset alignment reported by the backend.
    alignment: u64,
    /// The active frame-slot index (cycles 0..MAX_FRAMES_IN_FLIGHT).
    frame_slot: usize,
    /// The write cursor within the active slot.
    cursor: u64,
    /// The largest cursor value observed in any frame, for capacity tuning.
    high_water: u64,
    /// Debug label for logging.
    label: &'static str,
}

impl PerFrameUniformStream {
    /// Creates the stream and its backing buffer.
    ///
    /// The buffer is sized `per_frame_capacity × MAX_FRAMES_IN_FLIGHT`, with
    /// the capacity first rounded up to the device's minimum uniform-buffer
    /// offset alignment so every slot starts on a bindable boundary.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if buffer creation fails.
    pub fn new(
        device: &dyn GraphicsDevice,
        per_frame_capacity: u64,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let per_frame_capacity = per_frame_capacity.div_ceil(alignment) * alignment;

        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(label)),
            size: per_frame_capacity * MAX_FRAMES_IN_FLIGHT as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;

        Ok(Self {
            buffer,
            per_frame_capacity,
            alignment,
            frame_slot: 0,
            cursor: 0,
            high_water: 0,
            label,
        })
    }

    /// Appends `data` at the cursor of the active frame slot and returns the
    /// absolute byte offset to bind.
    ///
    /// The cursor advances by `data.len()` rounded up to the device's
    /// minimum uniform-buffer offset alignment, so every returned offset is
    /// bindable.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::OutOfMemory`] if the write does not fit in
    /// the remainder of the active slot, and propagates backend write
    /// failures.
    pub fn write(
        &mut self,
        device: &dyn GraphicsDevice,
        data: &[u8],
    ) -> Result<u64, ResourceError> {
        let len = data.len() as u64;
        let offset = self.frame_slot as u64 * self.per_frame_capacity + self.cursor;
        if len == 0 {
            return Ok(offset);
        }
        if self.cursor + len > self.per_frame_capacity {
            return Err(ResourceError::OutOfMemory {
                requested: len,
                available: self.per_frame_capacity - self.cursor,
            });
        }

        device.write_buffer(self.buffer, offset, data)?;

        self.cursor += len.div_ceil(self.alignment) * self.alignment;
        self.high_water = self.high_water.max(self.cursor.min(self.per_frame_capacity));
        Ok(offset)
    }

    /// Advances to the next frame slot and resets the cursor to 0.
    ///
    /// Call once at the start of each frame, before the frame's first
    /// per-frame write. The slot being reused was last written
    /// [`MAX_FRAMES_IN_FLIGHT`] frames ago, which is the ordering guarantee
    /// that prevents overwriting data the GPU is still reading.
    pub fn reset_for_new_frame(&mut self) {
        self.frame_slot = (self.frame_slot + 1) % MAX_FRAMES_IN_FLIGHT;
        self.cursor = 0;
    }

    /// The backing buffer, for binding.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// The capacity of one frame slot in bytes.
    pub fn per_frame_capacity(&self) -> u64 {
        self.per_frame_capacity
    }

    /// The active frame-slot index (for debugging/telemetry).
    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    /// The number of bytes consumed in the active slot so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// The largest per-frame usage observed, for sizing the capacity.
    pub fn high_water_mark(&self) -> u64 {
        self.high_water
    }

    /// Destroys the backing GPU buffer.
    ///
    /// This must be called during shutdown to release GPU memory. After
    /// calling this method, the stream should not be used again.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_buffer(self.buffer) {
            log::warn!(
                "PerFrameUniformStream({}): Failed to destroy buffer: {:?}",
                self.label,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{AdapterInfo, BackendKind, DeviceKind, DeviceLimits};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A mock graphics device that produces unique resource IDs and records
    /// every buffer write.
    #[derive(Debug)]
    struct MockGraphicsDevice {
        next_id: AtomicUsize,
        writes: Mutex<Vec<(BufferId, u64, usize)>>,
        created: Mutex<Vec<u64>>,
    }

    impl MockGraphicsDevice {
        fn new() -> Self {
            Self {
                next_id: AtomicUsize::new(1),
                writes: Mutex::new(Vec::new()),
                created: Mutex::new(Vec::new()),
            }
        }
    }

    impl GraphicsDevice for MockGraphicsDevice {
        fn create_buffer(&self, d: &BufferDescriptor) -> Result<BufferId, ResourceError> {
            self.created.lock().unwrap().push(d.size);
            Ok(BufferId(self.next_id.fetch_add(1, Ordering::Relaxed)))
        }
        fn create_buffer_with_data(
            &self,
            d: &BufferDescriptor,
            _data: &[u8],
        ) -> Result<BufferId, ResourceError> {
            self.create_buffer(d)
        }
        fn write_buffer(
            &self,
            id: BufferId,
            offset: u64,
            data: &[u8],
        ) -> Result<(), ResourceError> {
            self.writes.lock().unwrap().push((id, offset, data.len()));
            Ok(())
        }
        fn destroy_buffer(&self, _id: BufferId) -> Result<(), ResourceError> {
            Ok(())
        }
        fn limits(&self) -> DeviceLimits {
            DeviceLimits {
                min_uniform_buffer_offset_alignment: 256,
                max_buffer_size: 1 << 30,
            }
        }
        fn adapter_info(&self) -> AdapterInfo {
            AdapterInfo {
                name: "MockDevice".to_string(),
                backend: BackendKind::Unknown,
                device_kind: DeviceKind::Unknown,
            }
        }
    }

    #[test]
    fn backing_buffer_covers_all_frame_slots() {
        let device = MockGraphicsDevice::new();
        let stream = PerFrameUniformStream::new(&device, 1024, "Test").unwrap();
        assert_eq!(stream.per_frame_capacity(), 1024);
        assert_eq!(
            device.created.lock().unwrap()[0],
            1024 * MAX_FRAMES_IN_FLIGHT as u64
        );
    }

    #[test]
    fn capacity_rounds_up_to_the_alignment() {
        let device = MockGraphicsDevice::new();
        let stream = PerFrameUniformStream::new(&device, 1000, "Test").unwrap();
        assert_eq!(stream.per_frame_capacity(), 1024);
    }

    #[test]
    fn cursor_advances_by_aligned_stride() {
        let device = MockGraphicsDevice::new();
        let mut stream = PerFrameUniformStream::new(&device, 1024, "Test").unwrap();

        let first = stream.write(&device, &[1u8; 4]).unwrap();
        let second = stream.write(&device, &[2u8; 300]).unwrap();
        let third = stream.write(&device, &[3u8; 4]).unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 256);
        // 300 bytes round up to two alignment units.
        assert_eq!(third, 256 + 512);
        assert_eq!(stream.cursor(), 256 + 512 + 256);
    }

    #[test]
    fn reset_rotates_into_the_next_slot() {
        let device = MockGraphicsDevice::new();
        let mut stream = PerFrameUniformStream::new(&device, 1024, "Test").unwrap();

        assert_eq!(stream.write(&device, &[0u8; 8]).unwrap(), 0);

        stream.reset_for_new_frame();
        assert_eq!(stream.frame_slot(), 1);
        // Writes now land in slot 1's region.
        assert_eq!(stream.write(&device, &[0u8; 8]).unwrap(), 1024);

        // Cycling through every slot returns to the first region.
        for _ in 1..MAX_FRAMES_IN_FLIGHT {
            stream.reset_for_new_frame();
        }
        assert_eq!(stream.frame_slot(), 0);
        assert_eq!(stream.write(&device, &[0u8; 8]).unwrap(), 0);
    }

    #[test]
    fn slot_overflow_is_out_of_memory() {
        let device = MockGraphicsDevice::new();
        let mut stream = PerFrameUniformStream::new(&device, 512, "Test").unwrap();

        stream.write(&device, &[0u8; 300]).unwrap();
        let err = stream.write(&device, &[0u8; 300]).unwrap_err();
        assert!(matches!(err, ResourceError::OutOfMemory { .. }));

        // The failed write must not have reached the device.
        assert_eq!(device.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_writes_do_not_move_the_cursor() {
        let device = MockGraphicsDevice::new();
        let mut stream = PerFrameUniformStream::new(&device, 512, "Test").unwrap();
        assert_eq!(stream.write(&device, &[]).unwrap(), 0);
        assert_eq!(stream.cursor(), 0);
        assert!(device.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn high_water_mark_tracks_peak_usage() {
        let device = MockGraphicsDevice::new();
        let mut stream = PerFrameUniformStream::new(&device, 1024, "Test").unwrap();

        stream.write(&device, &[0u8; 700]).unwrap();
        stream.reset_for_new_frame();
        stream.write(&device, &[0u8; 10]).unwrap();

        assert_eq!(stream.high_water_mark(), 768);
    }
}
