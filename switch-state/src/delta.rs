// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural diff of two snapshots.
//!
//! Sub-maps are ordered, so the diff is a single merge of two sorted
//! sequences. Structural sharing makes the common case cheap: a child
//! present in both snapshots with the same identity is skipped without
//! looking inside it.

use crate::acl::AclEntry;
use crate::interface::Interface;
use crate::port::{AggregatePort, Port};
use crate::route::Route;
use crate::route_table::{RibAf, RouteTable};
use crate::state::SwitchState;
use crate::vlan::Vlan;
use itertools::{EitherOrBoth, Itertools};
use std::collections::BTreeMap;
use std::sync::Arc;
use switch_types::RouterId;

#[derive(Debug)]
pub enum DeltaItem<'a, T> {
    Added(&'a Arc<T>),
    Removed(&'a Arc<T>),
    Changed { old: &'a Arc<T>, new: &'a Arc<T> },
}

/// Merge two ordered maps of shared nodes into a delta stream. Entries
/// with identical `Arc`s are dropped.
fn btree_delta<'a, K: Ord + Copy, V>(
    old: &'a BTreeMap<K, Arc<V>>,
    new: &'a BTreeMap<K, Arc<V>>,
) -> impl Iterator<Item = DeltaItem<'a, V>> {
    old.iter()
        .merge_join_by(new.iter(), |(ka, _), (kb, _)| ka.cmp(kb))
        .filter_map(|entry| match entry {
            EitherOrBoth::Left((_, o)) => Some(DeltaItem::Removed(o)),
            EitherOrBoth::Right((_, n)) => Some(DeltaItem::Added(n)),
            EitherOrBoth::Both((_, o), (_, n)) => {
                if Arc::ptr_eq(o, n) {
                    None
                } else {
                    Some(DeltaItem::Changed { old: o, new: n })
                }
            }
        })
}

/// The full structural difference between two published snapshots.
pub struct StateDelta {
    old: Arc<SwitchState>,
    new: Arc<SwitchState>,
}

impl StateDelta {
    pub fn new(old: Arc<SwitchState>, new: Arc<SwitchState>) -> Self {
        Self { old, new }
    }

    pub fn old_state(&self) -> &Arc<SwitchState> {
        &self.old
    }

    pub fn new_state(&self) -> &Arc<SwitchState> {
        &self.new
    }

    pub fn ports_delta(&self) -> impl Iterator<Item = DeltaItem<'_, Port>> {
        btree_delta(self.old.ports.entries(), self.new.ports.entries())
    }

    pub fn aggregate_ports_delta(
        &self,
    ) -> impl Iterator<Item = DeltaItem<'_, AggregatePort>> {
        btree_delta(
            self.old.aggregate_ports.entries(),
            self.new.aggregate_ports.entries(),
        )
    }

    pub fn vlans_delta(&self) -> impl Iterator<Item = DeltaItem<'_, Vlan>> {
        btree_delta(self.old.vlans.entries(), self.new.vlans.entries())
    }

    pub fn interfaces_delta(
        &self,
    ) -> impl Iterator<Item = DeltaItem<'_, Interface>> {
        btree_delta(
            self.old.interfaces.entries(),
            self.new.interfaces.entries(),
        )
    }

    pub fn acls_delta(&self) -> impl Iterator<Item = DeltaItem<'_, AclEntry>> {
        btree_delta(self.old.acls.entries(), self.new.acls.entries())
    }

    pub fn route_tables_delta(
        &self,
    ) -> impl Iterator<Item = RouteTableDelta<'_>> {
        btree_delta(
            self.old.route_tables.entries(),
            self.new.route_tables.entries(),
        )
        .map(|item| match item {
            DeltaItem::Added(t) => {
                RouteTableDelta { old: None, new: Some(t) }
            }
            DeltaItem::Removed(t) => {
                RouteTableDelta { old: Some(t), new: None }
            }
            DeltaItem::Changed { old, new } => {
                RouteTableDelta { old: Some(old), new: Some(new) }
            }
        })
    }
}

/// The difference of one VRF's route table between two snapshots. At
/// least one side is present.
pub struct RouteTableDelta<'a> {
    old: Option<&'a Arc<RouteTable>>,
    new: Option<&'a Arc<RouteTable>>,
}

impl<'a> RouteTableDelta<'a> {
    pub fn router_id(&self) -> RouterId {
        self.old
            .or(self.new)
            .map(|t| t.router_id())
            .expect("delta with neither side")
    }

    pub fn old_table(&self) -> Option<&'a Arc<RouteTable>> {
        self.old
    }

    pub fn new_table(&self) -> Option<&'a Arc<RouteTable>> {
        self.new
    }

    /// Per-route delta for one family of this table.
    pub fn routes_delta<A: RibAf>(
        &self,
    ) -> Box<dyn Iterator<Item = DeltaItem<'a, Route<A>>> + 'a> {
        match (self.old, self.new) {
            (Some(o), Some(n)) => {
                let (o, n) = (A::rib(o), A::rib(n));
                if Arc::ptr_eq(o, n) {
                    Box::new(std::iter::empty())
                } else {
                    Box::new(btree_delta(o.entries(), n.entries()))
                }
            }
            (None, Some(n)) => Box::new(
                A::rib(n).entries().values().map(DeltaItem::Added),
            ),
            (Some(o), None) => Box::new(
                A::rib(o).entries().values().map(DeltaItem::Removed),
            ),
            (None, None) => Box::new(std::iter::empty()),
        }
    }
}
