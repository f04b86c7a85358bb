// Copyright 2024 Saptak Santra
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

//! Object pool with an allocation bitmap.
//!
//! The pool keeps three columns in lock-step: the handle list, the "in use"
//! bitmap and the transform of every instance. Instances are only ever added
//! or removed at the tail, so an index stays valid until the pool shrinks
//! past it. Pipeline stages borrow the transform column directly; the bitmap
//! is only touched by pool methods.

use glam::{Quat, Vec3};
use slotmap::SlotMap;

use crate::bitset::BitSet;
use crate::entity::{ObjectHandle, Poolable, SceneNode};
use crate::error::{Result, SimError};
use crate::transform::Transform;

/// Per-instance bookkeeping
#[derive(Debug)]
struct Instance<T> {
    index: usize,
    active: bool,
    parent: Option<SceneNode>,
    body: T,
}

/// Pool of reusable simulation objects
pub struct EntityPool<T: Poolable> {
    name: &'static str,
    expandable: bool,
    handles: Vec<ObjectHandle>,
    used: BitSet,
    transforms: Vec<Transform>,
    instances: SlotMap<ObjectHandle, Instance<T>>,
}

impl<T: Poolable> EntityPool<T> {
    /// Create a pool holding `count` inactive instances
    pub fn new(name: &'static str, count: usize, expandable: bool) -> Self {
        let mut pool = Self {
            name,
            expandable,
            handles: Vec::with_capacity(count),
            used: BitSet::with_len(0),
            transforms: Vec::with_capacity(count),
            instances: SlotMap::with_key(),
        };
        pool.init(count);
        pool
    }

    /// Allocate `count` more inactive instances
    pub fn init(&mut self, count: usize) {
        self.add_instances(count);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of instances (capacity)
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of instances currently handed out
    pub fn in_use(&self) -> usize {
        self.used.count_ones()
    }

    pub fn free(&self) -> usize {
        self.len() - self.in_use()
    }

    pub fn is_expandable(&self) -> bool {
        self.expandable
    }

    /// Grow (`delta > 0`) or shrink (`delta < 0`) the pool.
    ///
    /// Shrinking removes instances from the tail, forcibly reclaiming any
    /// that are in use, and stops at zero. Returns how many instances were
    /// added or removed.
    pub fn expand(&mut self, delta: i64) -> usize {
        let amount = delta.unsigned_abs() as usize;
        if delta >= 0 {
            self.add_instances(amount);
            amount
        } else {
            self.remove_instances(amount)
        }
    }

    fn add_instances(&mut self, count: usize) {
        for _ in 0..count {
            let index = self.handles.len();
            let handle = self.instances.insert(Instance {
                index,
                active: false,
                parent: None,
                body: T::default(),
            });
            self.handles.push(handle);
            self.used.push(false);
            self.transforms.push(Transform::IDENTITY);
        }
        if count > 0 {
            tracing::debug!(pool = self.name, added = count, len = self.len(), "pool grown");
        }
    }

    fn remove_instances(&mut self, count: usize) -> usize {
        let removed = count.min(self.handles.len());
        let new_len = self.handles.len() - removed;
        let mut reclaimed = 0;

        for handle in self.handles.drain(new_len..) {
            if let Some(instance) = self.instances.remove(handle) {
                if instance.active {
                    reclaimed += 1;
                }
            }
        }
        self.used.truncate(new_len);
        self.transforms.truncate(new_len);

        if removed > 0 {
            tracing::debug!(
                pool = self.name,
                removed,
                reclaimed,
                len = self.len(),
                "pool shrunk"
            );
        }
        removed
    }

    /// Hand out the first free instance at `position`/`rotation`
    pub fn spawn(&mut self, position: Vec3, rotation: Quat) -> Result<ObjectHandle> {
        self.spawn_under(position, rotation, None)
    }

    /// Like [`spawn`](Self::spawn), attaching the instance to `parent`
    pub fn spawn_under(
        &mut self,
        position: Vec3,
        rotation: Quat,
        parent: Option<SceneNode>,
    ) -> Result<ObjectHandle> {
        let index = match self.used.first_zero() {
            Some(index) => index,
            None if self.expandable => {
                self.add_instances(1);
                self.used.first_zero().ok_or(SimError::PoolExhausted {
                    pool: self.name,
                    capacity: self.len(),
                })?
            }
            None => {
                return Err(SimError::PoolExhausted {
                    pool: self.name,
                    capacity: self.len(),
                })
            }
        };

        let handle = self.handles[index];
        let instance = self
            .instances
            .get_mut(handle)
            .ok_or(SimError::InvalidHandle { pool: self.name })?;

        instance.body.restart();
        instance.parent = parent;
        instance.active = true;
        self.transforms[index] = Transform { position, rotation };
        self.used.assign(index, true);
        Ok(handle)
    }

    /// Give an instance back. Unknown handles are logged and ignored.
    pub fn return_to_pool(&mut self, handle: ObjectHandle) -> Result<()> {
        let Some(instance) = self.instances.get_mut(handle) else {
            tracing::warn!(pool = self.name, "returning to the wrong pool");
            return Err(SimError::InvalidHandle { pool: self.name });
        };

        instance.parent = None;
        instance.active = false;
        self.used.assign(instance.index, false);
        Ok(())
    }

    /// Slot index of `handle`, used to find its structure-of-arrays row
    pub fn index_of(&self, handle: ObjectHandle) -> Option<usize> {
        self.instances.get(handle).map(|instance| instance.index)
    }

    pub fn handle_at(&self, index: usize) -> Option<ObjectHandle> {
        self.handles.get(index).copied()
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.used.contains(index)
    }

    pub fn is_active(&self, handle: ObjectHandle) -> bool {
        self.instances.get(handle).is_some_and(|i| i.active)
    }

    pub fn parent(&self, handle: ObjectHandle) -> Option<SceneNode> {
        self.instances.get(handle).and_then(|i| i.parent)
    }

    pub fn body(&self, handle: ObjectHandle) -> Option<&T> {
        self.instances.get(handle).map(|i| &i.body)
    }

    pub fn transform(&self, handle: ObjectHandle) -> Option<&Transform> {
        self.index_of(handle).map(|index| &self.transforms[index])
    }

    /// Transform column, co-indexed with the handle list
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut [Transform] {
        &mut self.transforms
    }

    /// Indices of instances currently in use
    pub fn used_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.used.ones()
    }

    /// True when all per-slot columns have the same length
    pub fn is_consistent(&self) -> bool {
        self.handles.len() == self.used.len() && self.handles.len() == self.transforms.len()
    }
}
