// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The switch-state snapshot.
//!
//! A `SwitchState` bundles all derived switch configuration into one
//! immutable tree. Mutation follows the copy-on-write protocol: clone
//! the state with [SwitchState::clone_for_modify] (which advances its
//! generation), swap in rebuilt children, wrap the result in an `Arc`
//! and hand it to the coordinator for publication. Children that were
//! not rebuilt keep their identity, so readers and the delta machinery
//! can detect unchanged subtrees by pointer comparison.

use crate::acl::AclMap;
use crate::error::Error;
use crate::interface::InterfaceMap;
use crate::port::{AggregatePortMap, PortMap};
use crate::route::Route;
use crate::route_table::{RibAf, RouteTable, RouteTableMap};
use crate::vlan::VlanMap;
use std::sync::Arc;
use std::time::Duration;
use switch_types::{RouterId, VlanId};

#[derive(Debug, Clone)]
pub struct SwitchState {
    pub(crate) ports: Arc<PortMap>,
    pub(crate) aggregate_ports: Arc<AggregatePortMap>,
    pub(crate) vlans: Arc<VlanMap>,
    pub(crate) interfaces: Arc<InterfaceMap>,
    pub(crate) acls: Arc<AclMap>,
    pub(crate) route_tables: Arc<RouteTableMap>,
    pub(crate) default_vlan: VlanId,
    pub(crate) arp_timeout: Duration,
    pub(crate) ndp_timeout: Duration,
    pub(crate) arp_ager_interval: Duration,
    pub(crate) max_neighbor_probes: u32,
    pub(crate) stale_entry_interval: Duration,
    pub(crate) generation: u64,
}

impl Default for SwitchState {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchState {
    pub fn new() -> Self {
        Self {
            ports: Arc::new(PortMap::new()),
            aggregate_ports: Arc::new(AggregatePortMap::new()),
            vlans: Arc::new(VlanMap::new()),
            interfaces: Arc::new(InterfaceMap::new()),
            acls: Arc::new(AclMap::new()),
            route_tables: Arc::new(RouteTableMap::default()),
            default_vlan: VlanId(0),
            arp_timeout: Duration::from_secs(60),
            ndp_timeout: Duration::from_secs(60),
            arp_ager_interval: Duration::from_secs(5),
            max_neighbor_probes: 300,
            stale_entry_interval: Duration::from_secs(10),
            generation: 0,
        }
    }

    pub fn ports(&self) -> &Arc<PortMap> {
        &self.ports
    }

    pub fn aggregate_ports(&self) -> &Arc<AggregatePortMap> {
        &self.aggregate_ports
    }

    pub fn vlans(&self) -> &Arc<VlanMap> {
        &self.vlans
    }

    pub fn interfaces(&self) -> &Arc<InterfaceMap> {
        &self.interfaces
    }

    pub fn acls(&self) -> &Arc<AclMap> {
        &self.acls
    }

    pub fn route_tables(&self) -> &Arc<RouteTableMap> {
        &self.route_tables
    }

    pub fn default_vlan(&self) -> VlanId {
        self.default_vlan
    }

    pub fn arp_timeout(&self) -> Duration {
        self.arp_timeout
    }

    pub fn ndp_timeout(&self) -> Duration {
        self.ndp_timeout
    }

    pub fn arp_ager_interval(&self) -> Duration {
        self.arp_ager_interval
    }

    pub fn max_neighbor_probes(&self) -> u32 {
        self.max_neighbor_probes
    }

    pub fn stale_entry_interval(&self) -> Duration {
        self.stale_entry_interval
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Copy-on-write entry point: a clone with the generation advanced.
    /// Children are shared until individually replaced.
    pub fn clone_for_modify(&self) -> Self {
        let mut next = self.clone();
        next.generation += 1;
        next
    }

    pub fn reset_route_tables(&mut self, tables: Arc<RouteTableMap>) {
        self.route_tables = tables;
    }

    /// Undo the installation of one route entry after the downstream
    /// programming of a published snapshot failed.
    ///
    /// With `old_route` the entry reverts to it verbatim; without, the
    /// entry is erased. Generations along the spine advance so that
    /// subscribers observe the revert like any other update.
    pub fn revert_new_route_entry<A: RibAf>(
        self: &Arc<Self>,
        vrf: RouterId,
        new_route: &Arc<Route<A>>,
        old_route: Option<Arc<Route<A>>>,
    ) -> Result<Arc<Self>, Error> {
        let tables = &self.route_tables;
        let table =
            tables.get(vrf).ok_or(Error::NoRouteTable(vrf))?;

        let mut rib = A::rib(table.as_ref()).clone_for_modify();
        match old_route {
            Some(old) => rib.insert(old),
            None => {
                rib.erase(new_route.prefix());
            }
        }

        let mut new_table = RouteTable {
            router_id: table.router_id,
            rib_v4: table.rib_v4.clone(),
            rib_v6: table.rib_v6.clone(),
            generation: table.generation + 1,
        };
        *A::rib_mut(&mut new_table) = Arc::new(rib);

        let mut new_tables = tables.entries().clone();
        new_tables.insert(vrf, Arc::new(new_table));
        let new_map = RouteTableMap::from_parts(
            new_tables,
            tables.alpm_enabled(),
            tables.generation() + 1,
        );

        let mut next = self.clone_for_modify();
        next.reset_route_tables(Arc::new(new_map));
        Ok(Arc::new(next))
    }
}
