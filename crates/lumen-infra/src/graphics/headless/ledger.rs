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

//! Bookkeeping of every native object the headless backend allocates.

use std::collections::HashMap;
use std::fmt;

/// Identifier of one emulated native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub u64);

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native#{}", self.0)
    }
}

/// The kinds of native objects an immediate-mode API hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeKind {
    Buffer,
    Texture,
    ShaderResourceView,
    RenderTargetView,
    DepthStencilView,
    Shader,
    InputLayout,
    RasterizerState,
    BlendState,
    DepthStencilState,
    Sampler,
    SwapChain,
}

/// Tracks live native objects so that leaks and double releases are visible.
#[derive(Debug, Default)]
pub struct NativeLedger {
    next_id: u64,
    live: HashMap<NativeId, NativeKind>,
    allocated: u64,
    released: u64,
}

impl NativeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh native object of `kind`.
    pub fn allocate(&mut self, kind: NativeKind) -> NativeId {
        self.next_id += 1;
        let id = NativeId(self.next_id);
        self.live.insert(id, kind);
        self.allocated += 1;
        log::trace!("NativeLedger: allocated {id} ({kind:?})");
        id
    }

    /// Releases a native object.
    ///
    /// # Panics
    /// If `id` is not live: releasing twice is the bug this ledger exists to catch.
    pub fn release(&mut self, id: NativeId) {
        match self.live.remove(&id) {
            Some(kind) => {
                self.released += 1;
                log::trace!("NativeLedger: released {id} ({kind:?})");
            }
            None => panic!("native object {id} released twice or never allocated"),
        }
    }

    pub fn release_all(&mut self, ids: impl IntoIterator<Item = NativeId>) {
        for id in ids {
            self.release(id);
        }
    }

    pub fn is_live(&self, id: NativeId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn kind_of(&self, id: NativeId) -> Option<NativeKind> {
        self.live.get(&id).copied()
    }

    /// Number of live native objects.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of live native objects of `kind`.
    pub fn live_of(&self, kind: NativeKind) -> usize {
        self.live.values().filter(|&&live| live == kind).count()
    }

    /// Live objects grouped by kind, sorted for stable output.
    pub fn census(&self) -> Vec<(NativeKind, usize)> {
        let mut counts: HashMap<NativeKind, usize> = HashMap::new();
        for kind in self.live.values() {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        let mut census: Vec<_> = counts.into_iter().collect();
        census.sort();
        census
    }

    pub fn total_allocated(&self) -> u64 {
        self.allocated
    }

    pub fn total_released(&self) -> u64 {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_release_balance() {
        let mut ledger = NativeLedger::new();
        let buffer = ledger.allocate(NativeKind::Buffer);
        let texture = ledger.allocate(NativeKind::Texture);
        let view = ledger.allocate(NativeKind::ShaderResourceView);
        assert_ne!(buffer, texture);
        assert_eq!(ledger.live_count(), 3);
        assert_eq!(ledger.live_of(NativeKind::Texture), 1);

        ledger.release_all([texture, view]);
        assert_eq!(ledger.census(), vec![(NativeKind::Buffer, 1)]);
        ledger.release(buffer);
        assert_eq!(ledger.live_count(), 0);
        assert_eq!(ledger.total_allocated(), ledger.total_released());
    }

    #[test]
    #[should_panic(expected = "released twice")]
    fn test_double_release_panics() {
        let mut ledger = NativeLedger::new();
        let id = ledger.allocate(NativeKind::Sampler);
        ledger.release(id);
        ledger.release(id);
    }
}
