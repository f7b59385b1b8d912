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

//! Free-list sub-allocation of a single fixed-size backing buffer.
//!
//! The [`FreeListAllocator`] tracks the buffer as an ordered list of records
//! that always partitions `[0, capacity)` with no gaps and no overlaps.
//! Allocation uses a next-fit scan: a cursor remembers where the last
//! allocation ended and the search resumes there, wrapping once, so the
//! front of the buffer is not fragmented preferentially. Adjacent free
//! records are merged lazily, only when an allocation consumes them or when
//! [`defragment`](FreeListAllocator::defragment) compacts the buffer.
//!
//! Records live in an arena owned by the allocator. Callers hold
//! [`RegionHandle`]s (index plus generation) instead of references; any
//! operation through a handle whose record has since been consumed or
//! compacted away reports [`AllocError::StaleHandle`] instead of touching
//! another allocation's bytes.

use std::fmt;

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
#[inline]
const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// An error reported by the [`FreeListAllocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No free or mergeable run of records can satisfy the request, even
    /// after scanning the whole record list once.
    OutOfMemory {
        /// The number of bytes the request asked for.
        requested: u64,
        /// The total number of free bytes (possibly fragmented).
        free: u64,
    },
    /// The request itself is malformed (zero size, bad alignment).
    InvalidArgument(String),
    /// The handle's record was evicted; the holder must drop the handle and
    /// re-upload through a fresh allocation.
    StaleHandle,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory { requested, free } => {
                write!(
                    f,
                    "No free range of {requested} bytes available ({free} bytes free in total)"
                )
            }
            AllocError::InvalidArgument(msg) => write!(f, "Invalid allocation request: {msg}"),
            AllocError::StaleHandle => {
                write!(f, "Region handle refers to an evicted record")
            }
        }
    }
}

impl std::error::Error for AllocError {}

/// A stable handle to one allocation record.
///
/// Handles stay valid across [`defragment`](FreeListAllocator::defragment)
/// for records that were in use (their `start` changes, so it must be
/// re-read); handles to free records become stale the moment the allocator
/// reclaims them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionHandle {
    index: u32,
    generation: u32,
}

/// A snapshot of one record's current placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// The byte offset of the region inside the backing buffer.
    pub start: u64,
    /// The size of the region in bytes.
    pub size: u64,
    /// Whether the owner still holds data in this region.
    pub in_use: bool,
}

/// One arena slot. A slot is recycled (with a bumped generation) whenever
/// its record is consumed by an allocation or removed by defragmentation.
#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    start: u64,
    size: u64,
    in_use: bool,
    live: bool,
}

/// Sub-allocates one fixed-size backing buffer into variable-sized regions.
#[derive(Debug)]
pub struct FreeListAllocator {
    capacity: u64,
    slots: Vec<Slot>,
    /// Recycled arena indices, reused before the arena grows.
    spare_slots: Vec<u32>,
    /// Live slot indices ordered by ascending `start`; treated as circular
    /// by the next-fit scan.
    order: Vec<u32>,
    /// Position in `order` where the next scan resumes.
    cursor: usize,
}

impl FreeListAllocator {
    /// Creates an allocator managing `capacity` bytes, initially one free record.
    pub fn new(capacity: u64) -> Self {
        assert!(capacity > 0, "allocator capacity must be non-zero");
        let slots = vec![Slot {
            generation: 0,
            start: 0,
            size: capacity,
            in_use: false,
            live: true,
        }];
        Self {
            capacity,
            slots,
            spare_slots: Vec::new(),
            order: vec![0],
            cursor: 0,
        }
    }

    /// The total number of bytes managed by this allocator.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The number of live records (free and in-use).
    pub fn record_count(&self) -> usize {
        self.order.len()
    }

    /// The total number of free bytes, counting every free record.
    pub fn free_bytes(&self) -> u64 {
        self.order
            .iter()
            .filter(|&&i| !self.slots[i as usize].in_use)
            .map(|&i| self.slots[i as usize].size)
            .sum()
    }

    /// The size of the largest contiguous run of free records.
    pub fn largest_free_run(&self) -> u64 {
        let mut largest = 0u64;
        let mut run = 0u64;
        for &i in &self.order {
            let slot = &self.slots[i as usize];
            if slot.in_use {
                run = 0;
            } else {
                run += slot.size;
                largest = largest.max(run);
            }
        }
        largest
    }

    /// Iterates over the live records in buffer order.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.order.iter().map(|&i| {
            let slot = &self.slots[i as usize];
            Region {
                start: slot.start,
                size: slot.size,
                in_use: slot.in_use,
            }
        })
    }

    /// Returns `true` if `handle` still refers to a live record.
    pub fn is_live(&self, handle: RegionHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Reads the current placement of `handle`'s record.
    ///
    /// `start` must be re-read after every [`defragment`](Self::defragment),
    /// which shifts in-use records.
    ///
    /// # Errors
    ///
    /// [`AllocError::StaleHandle`] if the record was evicted.
    pub fn get(&self, handle: RegionHandle) -> Result<Region, AllocError> {
        self.slot(handle)
            .map(|slot| Region {
                start: slot.start,
                size: slot.size,
                in_use: slot.in_use,
            })
            .ok_or(AllocError::StaleHandle)
    }

    /// Allocates `size` bytes at a multiple of `alignment`.
    ///
    /// The scan resumes at the cursor left by the previous allocation and
    /// wraps around the record list once. Contiguous free records are merged
    /// to satisfy the request; any excess is split off as a new trailing
    /// free record, and a sliver created in front of an aligned start stays
    /// free for smaller requests. Consumed free records are evicted, so
    /// handles to them (from earlier releases) become stale.
    ///
    /// # Errors
    ///
    /// * [`AllocError::InvalidArgument`] for a zero `size` or an `alignment`
    ///   that is not a power of two.
    /// * [`AllocError::OutOfMemory`] when no run of free records fits, which
    ///   a full wraparound scan has then proven.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Result<RegionHandle, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidArgument(
                "zero-size allocation".to_string(),
            ));
        }
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(AllocError::InvalidArgument(format!(
                "alignment {alignment} is not a power of two"
            )));
        }
        if size > self.capacity {
            return Err(AllocError::OutOfMemory {
                requested: size,
                free: self.free_bytes(),
            });
        }

        let count = self.order.len();
        let mut pos = self.cursor % count;
        let mut scanned = 0;

        while scanned < count {
            let idx = self.order[pos] as usize;
            if self.slots[idx].in_use {
                pos = (pos + 1) % count;
                scanned += 1;
                continue;
            }

            // Found a free record: accumulate the contiguous free run that
            // follows it. Runs never wrap past the end of the record list.
            let run_start = self.slots[idx].start;
            let aligned = align_up(run_start, alignment);
            let mut run_end = run_start + self.slots[idx].size;
            let mut run_len = 1;
            while aligned + size > run_end {
                let next = pos + run_len;
                if next >= count {
                    break;
                }
                let next_idx = self.order[next] as usize;
                if self.slots[next_idx].in_use {
                    break;
                }
                run_end += self.slots[next_idx].size;
                run_len += 1;
            }

            if aligned + size <= run_end {
                let handle = self.commit(pos, run_len, aligned, size, run_end);
                #[cfg(debug_assertions)]
                self.assert_partition();
                return Ok(handle);
            }

            // The run cannot hold the request (too small, or the alignment
            // padding consumed it). Leave it free and keep scanning.
            pos = (pos + run_len) % count;
            scanned += run_len;
        }

        Err(AllocError::OutOfMemory {
            requested: size,
            free: self.free_bytes(),
        })
    }

    /// Marks the record as no longer holding data.
    ///
    /// The space is not reclaimed here: it stays a free record and is merged
    /// lazily by a later [`allocate`](Self::allocate) that scans over it, or
    /// by [`defragment`](Self::defragment). Until then the handle can be
    /// re-activated with [`reacquire`](Self::reacquire).
    ///
    /// # Errors
    ///
    /// [`AllocError::StaleHandle`] if the record was already evicted.
    pub fn mark_unused(&mut self, handle: RegionHandle) -> Result<(), AllocError> {
        let slot = self.slot_mut(handle).ok_or(AllocError::StaleHandle)?;
        slot.in_use = false;
        Ok(())
    }

    /// Re-activates a released record whose space has not been reclaimed.
    ///
    /// Returns the record's current placement so the caller can rebind it.
    ///
    /// # Errors
    ///
    /// [`AllocError::StaleHandle`] if the allocator consumed the record in
    /// the meantime; the caller must treat this as a cache miss and allocate
    /// anew.
    pub fn reacquire(&mut self, handle: RegionHandle) -> Result<Region, AllocError> {
        let slot = self.slot_mut(handle).ok_or(AllocError::StaleHandle)?;
        slot.in_use = true;
        let region = Region {
            start: slot.start,
            size: slot.size,
            in_use: true,
        };
        Ok(region)
    }

    /// Compacts all in-use records to the front of the buffer.
    ///
    /// In-use records keep their handles and relative order but are repacked
    /// contiguously from offset 0, so every holder must re-read `start` and
    /// re-upload or remap anything that encoded the old offset. Every free
    /// record is evicted and replaced by a single trailing free record.
    /// Returns the number of in-use records whose offset changed.
    pub fn defragment(&mut self) -> usize {
        let order = std::mem::take(&mut self.order);
        let mut packed = Vec::with_capacity(order.len());
        let mut offset = 0u64;
        let mut moved = 0;

        for idx in order {
            let slot = &mut self.slots[idx as usize];
            if slot.in_use {
                if slot.start != offset {
                    slot.start = offset;
                    moved += 1;
                }
                offset += slot.size;
                packed.push(idx);
            } else {
                self.retire(idx);
            }
        }

        if offset < self.capacity {
            let tail = self.new_slot(offset, self.capacity - offset, false);
            packed.push(tail);
            // Resume scanning at the reclaimed tail.
            self.cursor = packed.len() - 1;
        } else {
            self.cursor = 0;
        }
        self.order = packed;

        log::debug!(
            "FreeListAllocator: defragment moved {} records, {} bytes free at tail",
            moved,
            self.capacity - offset
        );

        #[cfg(debug_assertions)]
        self.assert_partition();
        moved
    }

    // --- internals ---

    fn slot(&self, handle: RegionHandle) -> Option<&Slot> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.live && slot.generation == handle.generation).then_some(slot)
    }

    fn slot_mut(&mut self, handle: RegionHandle) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.live && slot.generation == handle.generation).then_some(slot)
    }

    /// Retires a slot: bumps its generation so outstanding handles go stale
    /// and queues the index for reuse.
    fn retire(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.live);
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.spare_slots.push(index);
    }

    /// Creates a live slot, reusing a retired arena index when available.
    fn new_slot(&mut self, start: u64, size: u64, in_use: bool) -> u32 {
        debug_assert!(size > 0);
        if let Some(index) = self.spare_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.start = start;
            slot.size = size;
            slot.in_use = in_use;
            slot.live = true;
            index
        } else {
            self.slots.push(Slot {
                generation: 0,
                start,
                size,
                in_use,
                live: true,
            });
            (self.slots.len() - 1) as u32
        }
    }

    /// Replaces the free run at `order[pos..pos + run_len]` with (optional
    /// leading sliver, allocated record, optional trailing free record) and
    /// advances the cursor past the allocation.
    fn commit(
        &mut self,
        pos: usize,
        run_len: usize,
        aligned: u64,
        size: u64,
        run_end: u64,
    ) -> RegionHandle {
        let run_start = self.slots[self.order[pos] as usize].start;
        for k in 0..run_len {
            let idx = self.order[pos + k];
            self.retire(idx);
        }

        let mut replacement = Vec::with_capacity(3);
        if aligned > run_start {
            // Alignment sliver: stays free for a smaller request later.
            replacement.push(self.new_slot(run_start, aligned - run_start, false));
        }
        let alloc_index = self.new_slot(aligned, size, true);
        let alloc_pos_in_replacement = replacement.len();
        replacement.push(alloc_index);
        if aligned + size < run_end {
            replacement.push(self.new_slot(aligned + size, run_end - (aligned + size), false));
        }

        let alloc_pos = pos + alloc_pos_in_replacement;
        self.order.splice(pos..pos + run_len, replacement);
        self.cursor = (alloc_pos + 1) % self.order.len();

        RegionHandle {
            index: alloc_index,
            generation: self.slots[alloc_index as usize].generation,
        }
    }

    /// Checks that the live records exactly partition `[0, capacity)`.
    #[cfg(debug_assertions)]
    fn assert_partition(&self) {
        let mut expected = 0u64;
        for &i in &self.order {
            let slot = &self.slots[i as usize];
            debug_assert!(slot.live, "retired slot left in record order");
            debug_assert_eq!(slot.start, expected, "gap or overlap in record list");
            debug_assert!(slot.size > 0, "zero-size record");
            expected += slot.size;
        }
        debug_assert_eq!(expected, self.capacity, "records do not cover the buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects `(start, size, in_use)` triples and verifies the partition
    /// invariant on the way.
    fn snapshot(alloc: &FreeListAllocator) -> Vec<(u64, u64, bool)> {
        let mut expected = 0;
        let mut out = Vec::new();
        for region in alloc.regions() {
            assert_eq!(region.start, expected, "gap or overlap in record list");
            expected += region.size;
            out.push((region.start, region.size, region.in_use));
        }
        assert_eq!(expected, alloc.capacity());
        out
    }

    #[test]
    fn fills_exactly_then_reuses_a_freed_region() {
        let mut alloc = FreeListAllocator::new(100);

        let regions: Vec<_> = (0..5).map(|_| alloc.allocate(20, 1).unwrap()).collect();
        for (i, &handle) in regions.iter().enumerate() {
            assert_eq!(alloc.get(handle).unwrap().start, i as u64 * 20);
        }

        // The buffer is exactly full.
        assert!(matches!(
            alloc.allocate(1, 1),
            Err(AllocError::OutOfMemory { requested: 1, .. })
        ));

        // Free the second region and allocate something smaller into it.
        alloc.mark_unused(regions[1]).unwrap();
        let reuse = alloc.allocate(15, 1).unwrap();
        assert_eq!(alloc.get(reuse).unwrap().start, 20);
        // 5 bytes stay free at that location.
        assert!(snapshot(&alloc).contains(&(35, 5, false)));
        // The consumed free record is gone for its old holder.
        assert_eq!(alloc.get(regions[1]), Err(AllocError::StaleHandle));
    }

    #[test]
    fn zero_size_is_invalid() {
        let mut alloc = FreeListAllocator::new(64);
        assert!(matches!(
            alloc.allocate(0, 1),
            Err(AllocError::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_requests_fail_even_after_defragment() {
        let mut alloc = FreeListAllocator::new(64);
        assert!(matches!(
            alloc.allocate(65, 1),
            Err(AllocError::OutOfMemory { .. })
        ));
        alloc.defragment();
        assert!(matches!(
            alloc.allocate(65, 1),
            Err(AllocError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn next_fit_resumes_after_the_last_allocation() {
        let mut alloc = FreeListAllocator::new(100);
        let a = alloc.allocate(10, 1).unwrap();
        let _b = alloc.allocate(10, 1).unwrap();
        alloc.mark_unused(a).unwrap();

        // The cursor sits after b, so the next allocation does not return to
        // the freed front of the buffer.
        let c = alloc.allocate(10, 1).unwrap();
        assert_eq!(alloc.get(c).unwrap().start, 20);

        // Wrapping still finds the freed region once the tail is exhausted.
        let _d = alloc.allocate(70, 1).unwrap();
        let e = alloc.allocate(10, 1).unwrap();
        assert_eq!(alloc.get(e).unwrap().start, 0);
    }

    #[test]
    fn contiguous_free_records_merge_on_allocation() {
        let mut alloc = FreeListAllocator::new(60);
        let a = alloc.allocate(20, 1).unwrap();
        let b = alloc.allocate(20, 1).unwrap();
        let _c = alloc.allocate(20, 1).unwrap();

        alloc.mark_unused(a).unwrap();
        alloc.mark_unused(b).unwrap();

        // 40 contiguous bytes exist only if the two freed records merge.
        let merged = alloc.allocate(40, 1).unwrap();
        assert_eq!(alloc.get(merged).unwrap().start, 0);
        assert_eq!(alloc.get(a), Err(AllocError::StaleHandle));
        assert_eq!(alloc.get(b), Err(AllocError::StaleHandle));
        snapshot(&alloc);
    }

    #[test]
    fn alignment_splits_off_a_free_sliver() {
        let mut alloc = FreeListAllocator::new(32);
        let _a = alloc.allocate(10, 1).unwrap();

        let b = alloc.allocate(8, 16).unwrap();
        assert_eq!(alloc.get(b).unwrap().start, 16);
        // The sliver in front of the aligned start stays free.
        assert!(snapshot(&alloc).contains(&(10, 6, false)));

        // Fill the tail, then confirm the sliver is still claimable.
        let _c = alloc.allocate(8, 1).unwrap();
        let d = alloc.allocate(6, 1).unwrap();
        assert_eq!(alloc.get(d).unwrap().start, 10);
    }

    #[test]
    fn alignment_that_overflows_a_sliver_keeps_scanning() {
        let mut alloc = FreeListAllocator::new(64);
        let _a = alloc.allocate(4, 1).unwrap();
        let b = alloc.allocate(4, 1).unwrap();
        let _c = alloc.allocate(56, 1).unwrap();
        alloc.mark_unused(b).unwrap();

        // [4, 8) is free, but aligning to 8 leaves no room: the scan must
        // move on and report exhaustion instead of stalling on the sliver.
        assert!(matches!(
            alloc.allocate(4, 8),
            Err(AllocError::OutOfMemory { .. })
        ));

        // The sliver survived and still serves an unaligned request.
        let d = alloc.allocate(4, 1).unwrap();
        assert_eq!(alloc.get(d).unwrap().start, 4);
    }

    #[test]
    fn defragment_compacts_in_prior_relative_order() {
        let mut alloc = FreeListAllocator::new(100);
        let a = alloc.allocate(10, 1).unwrap();
        let b = alloc.allocate(20, 1).unwrap();
        let c = alloc.allocate(30, 1).unwrap();
        let d = alloc.allocate(10, 1).unwrap();
        alloc.mark_unused(a).unwrap();
        alloc.mark_unused(c).unwrap();

        // In use: [10, 30) and [60, 70).
        let moved = alloc.defragment();
        assert_eq!(moved, 2);

        // Repacked with zero gaps, prior order kept, one trailing free record.
        assert_eq!(
            snapshot(&alloc),
            vec![(0, 20, true), (20, 10, true), (30, 70, false)]
        );
        assert_eq!(alloc.get(b).unwrap().start, 0);
        assert_eq!(alloc.get(d).unwrap().start, 20);

        // Every free record holder lost its reference.
        assert_eq!(alloc.get(a), Err(AllocError::StaleHandle));
        assert_eq!(alloc.get(c), Err(AllocError::StaleHandle));
    }

    #[test]
    fn defragment_with_full_buffer_has_no_tail() {
        let mut alloc = FreeListAllocator::new(40);
        let _a = alloc.allocate(20, 1).unwrap();
        let _b = alloc.allocate(20, 1).unwrap();
        assert_eq!(alloc.defragment(), 0);
        assert_eq!(alloc.record_count(), 2);
        assert_eq!(alloc.free_bytes(), 0);
    }

    #[test]
    fn released_records_can_be_reacquired_until_consumed() {
        let mut alloc = FreeListAllocator::new(64);
        let a = alloc.allocate(32, 1).unwrap();
        alloc.mark_unused(a).unwrap();

        // Nothing touched the record: same bytes, same placement.
        let region = alloc.reacquire(a).unwrap();
        assert_eq!(region.start, 0);
        assert!(alloc.get(a).unwrap().in_use);

        // Release again and let another allocation consume the space.
        alloc.mark_unused(a).unwrap();
        let big = alloc.allocate(64, 1).unwrap();
        assert_eq!(alloc.get(big).unwrap().start, 0);
        assert_eq!(alloc.reacquire(a), Err(AllocError::StaleHandle));
    }

    #[test]
    fn wraparound_finds_space_behind_the_cursor() {
        let mut alloc = FreeListAllocator::new(90);
        let a = alloc.allocate(30, 1).unwrap();
        let _b = alloc.allocate(30, 1).unwrap();
        let _c = alloc.allocate(20, 1).unwrap();
        alloc.mark_unused(a).unwrap();

        // The cursor sits at the 10-byte tail record, which is too small;
        // only wrapping reaches the freed record at the front.
        let d = alloc.allocate(25, 1).unwrap();
        assert_eq!(alloc.get(d).unwrap().start, 0);
        snapshot(&alloc);
    }

    #[test]
    fn free_byte_accounting() {
        let mut alloc = FreeListAllocator::new(100);
        let a = alloc.allocate(40, 1).unwrap();
        let _b = alloc.allocate(40, 1).unwrap();
        assert_eq!(alloc.free_bytes(), 20);
        alloc.mark_unused(a).unwrap();
        assert_eq!(alloc.free_bytes(), 60);
        // Fragmented: the free space is split across two records.
        assert_eq!(alloc.largest_free_run(), 40);
        alloc.defragment();
        assert_eq!(alloc.largest_free_run(), 60);
    }
}
