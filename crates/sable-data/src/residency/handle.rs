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

//! Reference-counted handles to resident GPU resources.
//!
//! A handle is proof that the named resource is resident: while at least
//! one handle exists the entry's reference count is positive and the
//! allocator will not reclaim its regions. Cloning a handle is cheap (one
//! count bump); dropping the last one hands the entry to its persistence
//! policy. Handles are not `Send`: all residency bookkeeping belongs to
//! the single renderer/upload thread.

use crate::residency::{
    error::MemoryError,
    mesh::{MeshLocation, MeshPool},
    model::{ModelLocation, ModelPool, UniformBinding},
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A counted reference to a resident mesh.
pub struct MeshHandle {
    pool: Rc<RefCell<MeshPool>>,
    key: String,
}

impl MeshHandle {
    /// Wraps an already-acquired entry. The caller must have bumped the
    /// entry's reference count.
    pub(crate) fn new(pool: Rc<RefCell<MeshPool>>, key: String) -> Self {
        Self { pool, key }
    }

    /// The key this handle refers to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The mesh's current buffer placement, re-read from the allocator so
    /// post-defragmentation offsets are always fresh.
    pub fn location(&self) -> Result<MeshLocation, MemoryError> {
        self.pool.borrow().location(&self.key)
    }
}

impl Clone for MeshHandle {
    fn clone(&self) -> Self {
        self.pool.borrow_mut().retain(&self.key);
        Self {
            pool: Rc::clone(&self.pool),
            key: self.key.clone(),
        }
    }
}

impl Drop for MeshHandle {
    fn drop(&mut self) {
        self.pool.borrow_mut().release(&self.key);
    }
}

impl fmt::Debug for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshHandle").field("key", &self.key).finish()
    }
}

/// A counted reference to a resident model/material uniform block.
pub struct ModelHandle {
    pool: Rc<RefCell<ModelPool>>,
    key: String,
}

impl ModelHandle {
    /// Wraps an already-acquired entry. The caller must have bumped the
    /// entry's reference count.
    pub(crate) fn new(pool: Rc<RefCell<ModelPool>>, key: String) -> Self {
        Self { pool, key }
    }

    /// The key this handle refers to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The model's current uniform-range placement.
    pub fn location(&self) -> Result<ModelLocation, MemoryError> {
        self.pool.borrow().location(&self.key)
    }

    /// The descriptor-set-like binding the range targets.
    pub fn binding(&self) -> Result<UniformBinding, MemoryError> {
        self.location().map(|location| location.binding)
    }
}

impl Clone for ModelHandle {
    fn clone(&self) -> Self {
        self.pool.borrow_mut().retain(&self.key);
        Self {
            pool: Rc::clone(&self.pool),
            key: self.key.clone(),
        }
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.pool.borrow_mut().release(&self.key);
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle").field("key", &self.key).finish()
    }
}
