// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative switch configuration and the config applier.
//!
//! The applier translates a [SwitchConfig] into the successor snapshot:
//! node maps are rebuilt with unchanged nodes keeping their identity,
//! and the route tables are carried through a [RouteUpdater] pass that
//! synthesizes one connected route per interface address plus the
//! link-local service route per IPv6-capable VRF. Re-applying the same
//! config is a no-op and reports `None`.

use crate::acl::{AclAction, AclEntry};
use crate::error::Error;
use crate::interface::{Interface, InterfaceAddress};
use crate::port::{AggregatePort, Port};
use crate::state::SwitchState;
use crate::updater::RouteUpdater;
use crate::vlan::Vlan;
use serde::{Deserialize, Serialize};
use slog::{info, Logger};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use switch_types::{
    AclEntryId, AggregatePortId, InterfaceId, IpPrefix, MacAddress, PortId,
    RouterId, VlanId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanConfig {
    pub id: VlanId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub id: InterfaceId,
    pub vlan: VlanId,
    pub router_id: RouterId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    #[serde(default)]
    pub addresses: Vec<InterfaceAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    pub id: PortId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub speed_mbps: u32,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatePortConfig {
    pub id: AggregatePortId,
    #[serde(default)]
    pub name: Option<String>,
    pub members: Vec<PortId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclConfig {
    pub id: AclEntryId,
    pub action: AclAction,
    #[serde(default)]
    pub src_ip: Option<IpPrefix>,
    #[serde(default)]
    pub dst_ip: Option<IpPrefix>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchConfig {
    #[serde(default)]
    pub vlans: Vec<VlanConfig>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub aggregate_ports: Vec<AggregatePortConfig>,
    #[serde(default)]
    pub acls: Vec<AclConfig>,
    #[serde(default)]
    pub default_vlan: Option<VlanId>,
    #[serde(default)]
    pub alpm_enabled: bool,
    #[serde(default)]
    pub arp_timeout_secs: Option<u64>,
    #[serde(default)]
    pub ndp_timeout_secs: Option<u64>,
    #[serde(default)]
    pub arp_ager_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_neighbor_probes: Option<u32>,
    #[serde(default)]
    pub stale_entry_interval_secs: Option<u64>,
}

/// Apply `config` to `base`, producing the successor snapshot or `None`
/// when nothing changes.
pub fn apply_config(
    base: &Arc<SwitchState>,
    config: &SwitchConfig,
    log: &Logger,
) -> Result<Option<Arc<SwitchState>>, Error> {
    // Reject configs where two interfaces claim the same subnet in one
    // VRF before any state is built.
    let mut claims: BTreeMap<(RouterId, IpPrefix), InterfaceId> =
        BTreeMap::new();
    for ic in &config.interfaces {
        for address in &ic.addresses {
            let prefix = IpPrefix::new(address.addr, address.length)?;
            if let Some(&first) = claims.get(&(ic.router_id, prefix)) {
                if first != ic.id {
                    return Err(Error::DuplicateInterfacePrefix {
                        vrf: ic.router_id,
                        prefix,
                        first,
                        second: ic.id,
                    });
                }
            }
            claims.insert((ic.router_id, prefix), ic.id);
        }
    }

    let (vlans, vlans_changed) = base.vlans.rebuild(
        config
            .vlans
            .iter()
            .map(|c| {
                Vlan::new(
                    c.id,
                    c.name.clone().unwrap_or_else(|| format!("vlan{}", c.id)),
                )
            })
            .collect(),
    );

    let (interfaces, interfaces_changed) = base.interfaces.rebuild(
        config
            .interfaces
            .iter()
            .map(|c| {
                Interface::new(
                    c.id,
                    c.router_id,
                    c.vlan,
                    c.name
                        .clone()
                        .unwrap_or_else(|| format!("interface{}", c.id)),
                    c.mac.unwrap_or(MacAddress::ZERO),
                    c.addresses.clone(),
                )
            })
            .collect(),
    );

    let (ports, ports_changed) = base.ports.rebuild(
        config
            .ports
            .iter()
            .map(|c| {
                let mut p = Port::new(
                    c.id,
                    c.name.clone().unwrap_or_else(|| format!("port{}", c.id)),
                );
                p.speed_mbps = c.speed_mbps;
                p.enabled = c.enabled;
                p
            })
            .collect(),
    );

    let (aggregate_ports, aggregate_ports_changed) =
        base.aggregate_ports.rebuild(
            config
                .aggregate_ports
                .iter()
                .map(|c| {
                    AggregatePort::new(
                        c.id,
                        c.name
                            .clone()
                            .unwrap_or_else(|| format!("agg{}", c.id)),
                        c.members.iter().copied().collect(),
                    )
                })
                .collect(),
        );

    let (acls, acls_changed) = base.acls.rebuild(
        config
            .acls
            .iter()
            .map(|c| AclEntry::new(c.id, c.action, c.src_ip, c.dst_ip))
            .collect(),
    );

    // Route synthesis: drop connected routes whose subnet is gone, drop
    // link-local entries from VRFs that lost IPv6, then (re-)register
    // everything the new interface map implies.
    let mut updater =
        RouteUpdater::new(base.route_tables.clone(), log.clone());
    updater.set_alpm_enabled(config.alpm_enabled);

    let mut old_claims = BTreeSet::new();
    let mut old_v6_vrfs = BTreeSet::new();
    for intf in base.interfaces.iter() {
        for address in &intf.addresses {
            old_claims
                .insert((intf.router_id, IpPrefix::new(address.addr, address.length)?));
            if address.is_v6() {
                old_v6_vrfs.insert(intf.router_id);
            }
        }
    }
    let new_claims: BTreeSet<_> = claims.keys().copied().collect();
    let new_v6_vrfs: BTreeSet<_> = config
        .interfaces
        .iter()
        .filter(|c| c.addresses.iter().any(|a| a.is_v6()))
        .map(|c| c.router_id)
        .collect();

    for &(vrf, prefix) in old_claims.difference(&new_claims) {
        updater.del_connected_route(vrf, prefix)?;
    }
    for vrf in old_v6_vrfs.difference(&new_v6_vrfs) {
        updater.del_link_local_routes(*vrf);
    }
    updater.add_interface_and_link_local_routes(&interfaces)?;
    let route_tables = updater.update_done()?;

    let default_vlan = config.default_vlan.unwrap_or(base.default_vlan);
    let arp_timeout = config
        .arp_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(base.arp_timeout);
    let ndp_timeout = config
        .ndp_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(base.ndp_timeout);
    let arp_ager_interval = config
        .arp_ager_interval_secs
        .map(Duration::from_secs)
        .unwrap_or(base.arp_ager_interval);
    let max_neighbor_probes =
        config.max_neighbor_probes.unwrap_or(base.max_neighbor_probes);
    let stale_entry_interval = config
        .stale_entry_interval_secs
        .map(Duration::from_secs)
        .unwrap_or(base.stale_entry_interval);

    let settings_changed = default_vlan != base.default_vlan
        || arp_timeout != base.arp_timeout
        || ndp_timeout != base.ndp_timeout
        || arp_ager_interval != base.arp_ager_interval
        || max_neighbor_probes != base.max_neighbor_probes
        || stale_entry_interval != base.stale_entry_interval;

    let changed = vlans_changed
        || interfaces_changed
        || ports_changed
        || aggregate_ports_changed
        || acls_changed
        || route_tables.is_some()
        || settings_changed;
    if !changed {
        return Ok(None);
    }

    let mut next = base.clone_for_modify();
    if vlans_changed {
        next.vlans = Arc::new(vlans);
    }
    if interfaces_changed {
        next.interfaces = Arc::new(interfaces);
    }
    if ports_changed {
        next.ports = Arc::new(ports);
    }
    if aggregate_ports_changed {
        next.aggregate_ports = Arc::new(aggregate_ports);
    }
    if acls_changed {
        next.acls = Arc::new(acls);
    }
    if let Some(tables) = route_tables {
        next.route_tables = tables;
    }
    next.default_vlan = default_vlan;
    next.arp_timeout = arp_timeout;
    next.ndp_timeout = ndp_timeout;
    next.arp_ager_interval = arp_ager_interval;
    next.max_neighbor_probes = max_neighbor_probes;
    next.stale_entry_interval = stale_entry_interval;

    info!(
        log,
        "applied switch config";
        "interfaces" => config.interfaces.len(),
        "vlans" => config.vlans.len(),
        "generation" => next.generation,
    );
    Ok(Some(Arc::new(next)))
}
