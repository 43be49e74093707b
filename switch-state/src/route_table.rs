// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-VRF route tables and their container.

use crate::rib::Rib;
use crate::route::Route;
use std::collections::BTreeMap;
use std::sync::Arc;
use switch_types::{Af, ForwardAction, Ipv4, Ipv6, Prefix, RouterId};

/// Family selector for code generic over a [RouteTable]'s two RIBs.
pub trait RibAf: Af {
    fn rib(table: &RouteTable) -> &Arc<Rib<Self>>;
    fn rib_mut(table: &mut RouteTable) -> &mut Arc<Rib<Self>>;
}

impl RibAf for Ipv4 {
    fn rib(table: &RouteTable) -> &Arc<Rib<Ipv4>> {
        &table.rib_v4
    }

    fn rib_mut(table: &mut RouteTable) -> &mut Arc<Rib<Ipv4>> {
        &mut table.rib_v4
    }
}

impl RibAf for Ipv6 {
    fn rib(table: &RouteTable) -> &Arc<Rib<Ipv6>> {
        &table.rib_v6
    }

    fn rib_mut(table: &mut RouteTable) -> &mut Arc<Rib<Ipv6>> {
        &mut table.rib_v6
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    pub(crate) router_id: RouterId,
    pub(crate) rib_v4: Arc<Rib<Ipv4>>,
    pub(crate) rib_v6: Arc<Rib<Ipv6>>,
    pub(crate) generation: u64,
}

impl RouteTable {
    pub fn new(router_id: RouterId) -> Self {
        Self {
            router_id,
            rib_v4: Arc::new(Rib::new()),
            rib_v6: Arc::new(Rib::new()),
            generation: 0,
        }
    }

    pub fn router_id(&self) -> RouterId {
        self.router_id
    }

    pub fn rib_v4(&self) -> &Arc<Rib<Ipv4>> {
        &self.rib_v4
    }

    pub fn rib_v6(&self) -> &Arc<Rib<Ipv6>> {
        &self.rib_v6
    }

    pub fn rib<A: RibAf>(&self) -> &Arc<Rib<A>> {
        A::rib(self)
    }

    pub fn is_empty(&self) -> bool {
        self.rib_v4.is_empty() && self.rib_v6.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// All VRFs' route tables.
///
/// When `alpm_enabled` is set, the map keeps a synthetic drop default
/// route (`0.0.0.0/0`, `::/0`) present in the default VRF: some
/// forwarding pipelines require the default to be programmed before any
/// other route, so a user deletion of it is answered by re-inserting the
/// synthetic one.
#[derive(Debug, Clone)]
pub struct RouteTableMap {
    tables: BTreeMap<RouterId, Arc<RouteTable>>,
    alpm_enabled: bool,
    generation: u64,
}

impl Default for RouteTableMap {
    fn default() -> Self {
        Self::new(false)
    }
}

impl RouteTableMap {
    pub fn new(alpm_enabled: bool) -> Self {
        Self { tables: BTreeMap::new(), alpm_enabled, generation: 0 }
    }

    pub(crate) fn from_parts(
        tables: BTreeMap<RouterId, Arc<RouteTable>>,
        alpm_enabled: bool,
        generation: u64,
    ) -> Self {
        Self { tables, alpm_enabled, generation }
    }

    pub fn alpm_enabled(&self) -> bool {
        self.alpm_enabled
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, router_id: RouterId) -> Option<&Arc<RouteTable>> {
        self.tables.get(&router_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteTable>> {
        self.tables.values()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<RouterId, Arc<RouteTable>> {
        &self.tables
    }

    pub(crate) fn insert(&mut self, table: Arc<RouteTable>) {
        self.tables.insert(table.router_id(), table);
    }

    pub(crate) fn remove(
        &mut self,
        router_id: RouterId,
    ) -> Option<Arc<RouteTable>> {
        self.tables.remove(&router_id)
    }

    /// The synthetic default route installed under ALPM.
    pub fn synthetic_default<A: Af>() -> Route<A> {
        // with_action only fails for the nexthops action
        Route::with_action(Prefix::<A>::default_route(), ForwardAction::Drop)
            .expect("drop action")
    }
}
