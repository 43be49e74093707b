// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generationed maps of shared state nodes.
//!
//! Every published state node is held behind an `Arc`; a map owns `Arc`s
//! to its children and is itself held behind an `Arc` by its parent.
//! Copy-on-write works by cloning the map (cheap, the children are
//! shared) and swapping individual children for freshly built ones. A map
//! cloned for modification advances its generation by one; untouched
//! children keep their identity, which is what lets the state delta skip
//! unchanged subtrees in O(1).

use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// A node that can live in a [NodeMap].
pub trait StateNode: Clone {
    type Id: Copy + Ord + Display + Debug;

    fn id(&self) -> Self::Id;
    fn generation(&self) -> u64;
    fn set_generation(&mut self, generation: u64);

    /// Structural comparison, generation excluded. Two nodes that are
    /// `same_as` are interchangeable in a snapshot.
    fn same_as(&self, other: &Self) -> bool;
}

#[derive(Debug, Clone)]
pub struct NodeMap<V: StateNode> {
    nodes: BTreeMap<V::Id, Arc<V>>,
    generation: u64,
}

impl<V: StateNode> Default for NodeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: StateNode> NodeMap<V> {
    pub fn new() -> Self {
        Self { nodes: BTreeMap::new(), generation: 0 }
    }

    pub(crate) fn from_entries(
        nodes: impl IntoIterator<Item = V>,
        generation: u64,
    ) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|n| (n.id(), Arc::new(n)))
                .collect(),
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: V::Id) -> Option<&Arc<V>> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: V::Id) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn insert(&mut self, node: Arc<V>) {
        self.nodes.insert(node.id(), node);
    }

    pub fn remove(&mut self, id: V::Id) -> Option<Arc<V>> {
        self.nodes.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<V>> {
        self.nodes.values()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<V::Id, Arc<V>> {
        &self.nodes
    }

    /// Copy-on-write entry point: a clone with the generation advanced.
    pub fn clone_for_modify(&self) -> Self {
        Self { nodes: self.nodes.clone(), generation: self.generation + 1 }
    }

    /// Rebuild this map from freshly constructed desired nodes (as the
    /// config applier produces), reusing base nodes that are
    /// structurally unchanged. Returns the successor map and whether
    /// anything differed; when nothing did, callers keep the base map's
    /// `Arc` so identity is preserved.
    pub fn rebuild(&self, desired: Vec<V>) -> (Self, bool) {
        let mut nodes = BTreeMap::new();
        let mut changed = false;
        for mut node in desired {
            match self.nodes.get(&node.id()) {
                Some(old) if old.same_as(&node) => {
                    nodes.insert(node.id(), old.clone());
                }
                Some(old) => {
                    node.set_generation(old.generation() + 1);
                    nodes.insert(node.id(), Arc::new(node));
                    changed = true;
                }
                None => {
                    nodes.insert(node.id(), Arc::new(node));
                    changed = true;
                }
            }
        }
        if nodes.len() != self.nodes.len() {
            changed = true;
        }
        let generation =
            if changed { self.generation + 1 } else { self.generation };
        (Self { nodes, generation }, changed)
    }

    /// Structural comparison against another map: same key set, and every
    /// node either identical (`Arc::ptr_eq`) or `same_as`.
    pub fn same_as(&self, other: &Self) -> bool {
        if self.nodes.len() != other.nodes.len() {
            return false;
        }
        self.nodes.iter().zip(other.nodes.iter()).all(
            |((ka, va), (kb, vb))| {
                ka == kb && (Arc::ptr_eq(va, vb) || va.same_as(vb))
            },
        )
    }
}
