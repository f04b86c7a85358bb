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

//! Pooled object handles and payload contract.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a pooled object, backed by slotmap's generational keys.
    ///
    /// Handles are weak: a handle outlives its object once the pool shrinks
    /// past it, and lookups then simply fail.
    pub struct ObjectHandle;
}

/// Opaque id of an external scene node a pooled object can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneNode(pub u32);

/// Payload carried by every pooled instance.
pub trait Poolable: Default + Send + Sync + 'static {
    /// Reset to the rest state before the instance is handed out again.
    fn restart(&mut self) {
        *self = Self::default();
    }
}

/// Mob instance body. Mobs keep all behavioural data in the SoA store.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MobBody;

impl Poolable for MobBody {}

/// Spear instance body. Flight state lives in the SoA store.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpearBody;

impl Poolable for SpearBody {}
