// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Warm-boot snapshot serialization.
//!
//! Snapshots serialize to a self-describing object form (JSON for the
//! on-disk handoff file, CBOR via [to_buf]/[from_buf] for compact
//! transport) and deserialize back to an identical state tree,
//! generations included. [FibRecord] is the per-route record the
//! hardware backend writes alongside: the compiled action plus the
//! egress object id it programmed, which a warm-booting agent reads back
//! to adopt the tables already in the ASIC.

use crate::acl::AclEntry;
use crate::error::Error;
use crate::interface::Interface;
use crate::map::{NodeMap, StateNode};
use crate::nexthop::{ForwardInfo, NextHopsMulti, ResolvedNextHop};
use crate::port::{AggregatePort, Port};
use crate::rib::Rib;
use crate::route::{Route, RouteFlags};
use crate::route_table::{RouteTable, RouteTableMap};
use crate::state::SwitchState;
use crate::vlan::Vlan;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use switch_common::guard::CleanupGuard;
use switch_types::{
    Af, ForwardAction, Ipv4, Ipv6, IpPrefix, NextHop, Prefix, RouterId,
    VlanId,
};

#[derive(Serialize, Deserialize)]
pub struct NodeMapWire<T> {
    pub nodes: Vec<T>,
    pub generation: u64,
}

#[derive(Serialize, Deserialize)]
pub struct RouteWire {
    pub network: String,
    #[serde(rename = "maskLen")]
    pub mask_len: u8,
    pub action: ForwardAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nexthops: Option<Vec<ResolvedNextHop>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nexthopsmulti: BTreeMap<u16, Vec<NextHop>>,
    pub flags: u8,
    pub generation: u64,
}

#[derive(Serialize, Deserialize)]
pub struct RibWire {
    pub routes: Vec<RouteWire>,
    pub generation: u64,
}

#[derive(Serialize, Deserialize)]
pub struct RouteTableWire {
    #[serde(rename = "routerId")]
    pub router_id: RouterId,
    pub v4: RibWire,
    pub v6: RibWire,
    pub generation: u64,
}

#[derive(Serialize, Deserialize)]
pub struct RouteTableMapWire {
    pub tables: Vec<RouteTableWire>,
    #[serde(rename = "alpmEnabled")]
    pub alpm_enabled: bool,
    pub generation: u64,
}

#[derive(Serialize, Deserialize)]
pub struct SwitchStateWire {
    pub interfaces: NodeMapWire<Interface>,
    pub ports: NodeMapWire<Port>,
    #[serde(rename = "aggregatePorts")]
    pub aggregate_ports: NodeMapWire<AggregatePort>,
    pub vlans: NodeMapWire<Vlan>,
    pub acls: NodeMapWire<AclEntry>,
    #[serde(rename = "routeTables")]
    pub route_tables: RouteTableMapWire,
    #[serde(rename = "defaultVlan")]
    pub default_vlan: VlanId,
    #[serde(rename = "arpTimeout")]
    pub arp_timeout_secs: u64,
    #[serde(rename = "ndpTimeout")]
    pub ndp_timeout_secs: u64,
    #[serde(rename = "arpAgerInterval")]
    pub arp_ager_interval_secs: u64,
    #[serde(rename = "maxNeighborProbes")]
    pub max_neighbor_probes: u32,
    #[serde(rename = "staleEntryInterval")]
    pub stale_entry_interval_secs: u64,
    pub generation: u64,
}

fn map_to_wire<T: StateNode>(map: &NodeMap<T>) -> NodeMapWire<T> {
    NodeMapWire {
        nodes: map.iter().map(|n| (**n).clone()).collect(),
        generation: map.generation(),
    }
}

fn map_from_wire<T: StateNode>(wire: NodeMapWire<T>) -> NodeMap<T> {
    NodeMap::from_entries(wire.nodes, wire.generation)
}

fn route_to_wire<A: Af>(route: &Route<A>) -> RouteWire {
    RouteWire {
        network: route.prefix().network.to_string(),
        mask_len: route.prefix().length,
        action: route.forward_info().action(),
        nexthops: route
            .forward_info()
            .nexthops()
            .map(|set| set.iter().copied().collect()),
        nexthopsmulti: route.nexthops_multi().to_wire(),
        flags: route.flags().bits(),
        generation: route.generation(),
    }
}

fn route_from_wire<A: Af>(wire: RouteWire) -> Result<Route<A>, Error> {
    let network = wire.network.parse::<A::Addr>().map_err(|_| {
        Error::SnapshotDecode(format!(
            "malformed {} network '{}'",
            A::NAME,
            wire.network
        ))
    })?;
    if wire.mask_len > A::WIDTH {
        return Err(Error::SnapshotDecode(format!(
            "mask length {} out of range for {}",
            wire.mask_len,
            A::NAME
        )));
    }
    let prefix = Prefix::<A>::new(network, wire.mask_len);

    let flags = RouteFlags::from_bits(wire.flags).ok_or_else(|| {
        Error::SnapshotDecode(format!("unknown route flags {:#x}", wire.flags))
    })?;
    if flags.contains(RouteFlags::PROCESSING) {
        return Err(Error::SnapshotDecode(format!(
            "route {prefix} serialized mid-resolution"
        )));
    }

    let fwd = match wire.action {
        ForwardAction::Drop => ForwardInfo::Drop,
        ForwardAction::ToCpu => ForwardInfo::ToCpu,
        ForwardAction::Nexthops => ForwardInfo::Nexthops(
            wire.nexthops
                .unwrap_or_default()
                .into_iter()
                .collect::<BTreeSet<_>>(),
        ),
    };

    Ok(Route {
        prefix,
        nexthops_multi: NextHopsMulti::from_wire(wire.nexthopsmulti)?,
        fwd,
        flags,
        generation: wire.generation,
    })
}

fn rib_to_wire<A: Af>(rib: &Rib<A>) -> RibWire {
    RibWire {
        routes: rib.iter().map(|r| route_to_wire(r.as_ref())).collect(),
        generation: rib.generation(),
    }
}

fn rib_from_wire<A: Af>(wire: RibWire) -> Result<Rib<A>, Error> {
    let mut routes = BTreeMap::new();
    for route in wire.routes {
        let route = route_from_wire::<A>(route)?;
        routes.insert(*route.prefix(), Arc::new(route));
    }
    Ok(Rib::from_parts(routes, wire.generation))
}

fn tables_to_wire(map: &RouteTableMap) -> RouteTableMapWire {
    RouteTableMapWire {
        tables: map
            .iter()
            .map(|t| RouteTableWire {
                router_id: t.router_id(),
                v4: rib_to_wire(t.rib_v4()),
                v6: rib_to_wire(t.rib_v6()),
                generation: t.generation(),
            })
            .collect(),
        alpm_enabled: map.alpm_enabled(),
        generation: map.generation(),
    }
}

fn tables_from_wire(
    wire: RouteTableMapWire,
) -> Result<RouteTableMap, Error> {
    let mut tables: BTreeMap<RouterId, Arc<RouteTable>> = BTreeMap::new();
    for t in wire.tables {
        let table = RouteTable {
            router_id: t.router_id,
            rib_v4: Arc::new(rib_from_wire::<Ipv4>(t.v4)?),
            rib_v6: Arc::new(rib_from_wire::<Ipv6>(t.v6)?),
            generation: t.generation,
        };
        tables.insert(t.router_id, Arc::new(table));
    }
    Ok(RouteTableMap::from_parts(
        tables,
        wire.alpm_enabled,
        wire.generation,
    ))
}

pub fn state_to_wire(state: &SwitchState) -> SwitchStateWire {
    SwitchStateWire {
        interfaces: map_to_wire(state.interfaces()),
        ports: map_to_wire(state.ports()),
        aggregate_ports: map_to_wire(state.aggregate_ports()),
        vlans: map_to_wire(state.vlans()),
        acls: map_to_wire(state.acls()),
        route_tables: tables_to_wire(state.route_tables()),
        default_vlan: state.default_vlan(),
        arp_timeout_secs: state.arp_timeout().as_secs(),
        ndp_timeout_secs: state.ndp_timeout().as_secs(),
        arp_ager_interval_secs: state.arp_ager_interval().as_secs(),
        max_neighbor_probes: state.max_neighbor_probes(),
        stale_entry_interval_secs: state.stale_entry_interval().as_secs(),
        generation: state.generation(),
    }
}

pub fn state_from_wire(
    wire: SwitchStateWire,
) -> Result<Arc<SwitchState>, Error> {
    let mut state = SwitchState::new();
    state.interfaces = Arc::new(map_from_wire(wire.interfaces));
    state.ports = Arc::new(map_from_wire(wire.ports));
    state.aggregate_ports = Arc::new(map_from_wire(wire.aggregate_ports));
    state.vlans = Arc::new(map_from_wire(wire.vlans));
    state.acls = Arc::new(map_from_wire(wire.acls));
    state.route_tables = Arc::new(tables_from_wire(wire.route_tables)?);
    state.default_vlan = wire.default_vlan;
    state.arp_timeout = Duration::from_secs(wire.arp_timeout_secs);
    state.ndp_timeout = Duration::from_secs(wire.ndp_timeout_secs);
    state.arp_ager_interval =
        Duration::from_secs(wire.arp_ager_interval_secs);
    state.max_neighbor_probes = wire.max_neighbor_probes;
    state.stale_entry_interval =
        Duration::from_secs(wire.stale_entry_interval_secs);
    state.generation = wire.generation;
    Ok(Arc::new(state))
}

/// Compact binary form of a snapshot.
pub fn to_buf(state: &SwitchState) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    ciborium::into_writer(&state_to_wire(state), &mut buf)
        .map_err(|e| Error::Internal(format!("snapshot encode: {e}")))?;
    Ok(buf)
}

pub fn from_buf(buf: &[u8]) -> Result<Arc<SwitchState>, Error> {
    let wire: SwitchStateWire = ciborium::from_reader(buf)
        .map_err(|e| Error::SnapshotDecode(e.to_string()))?;
    state_from_wire(wire)
}

/// Write a snapshot to `path`, atomically: the JSON goes to a temp file
/// first and is renamed over the target. The temp file is cleaned up if
/// anything fails along the way.
pub fn write_snapshot(path: &Path, state: &SwitchState) -> Result<(), Error> {
    let json = serde_json::to_vec_pretty(&state_to_wire(state))?;
    let tmp = path.with_extension("tmp");
    let guard = CleanupGuard::new(|| {
        let _ = std::fs::remove_file(&tmp);
    });
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    guard.dismiss();
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Arc<SwitchState>, Error> {
    let bytes = std::fs::read(path)?;
    let wire: SwitchStateWire = serde_json::from_slice(&bytes)?;
    state_from_wire(wire)
}

/// What the hardware backend records for one programmed route. Exactly
/// one of the egress keys is present: `ecmpEgressId` when the compiled
/// forward info was multipath, `egressId` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FibRecordRepr", into = "FibRecordRepr")]
pub struct FibRecord {
    pub network: IpAddr,
    pub mask_len: u8,
    pub action: ForwardAction,
    pub ecmp: bool,
    pub egress_id: i64,
}

impl FibRecord {
    pub fn new(prefix: IpPrefix, fwd: &ForwardInfo, egress_id: i64) -> Self {
        Self {
            network: prefix.network(),
            mask_len: prefix.length(),
            action: fwd.action(),
            ecmp: fwd.is_ecmp(),
            egress_id,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FibRecordRepr {
    network: IpAddr,
    #[serde(rename = "maskLen")]
    mask_len: u8,
    action: ForwardAction,
    ecmp: bool,
    #[serde(
        rename = "ecmpEgressId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    ecmp_egress_id: Option<i64>,
    #[serde(
        rename = "egressId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    egress_id: Option<i64>,
}

impl TryFrom<FibRecordRepr> for FibRecord {
    type Error = Error;

    fn try_from(value: FibRecordRepr) -> Result<Self, Self::Error> {
        let (ecmp, egress_id) =
            match (value.ecmp_egress_id, value.egress_id) {
                (Some(id), None) => (true, id),
                (None, Some(id)) => (false, id),
                _ => {
                    return Err(Error::SnapshotDecode(format!(
                        "fib record for {}/{} must carry exactly one of \
                         ecmpEgressId and egressId",
                        value.network, value.mask_len
                    )))
                }
            };
        if ecmp != value.ecmp {
            return Err(Error::SnapshotDecode(format!(
                "fib record for {}/{} has mismatched ecmp flag",
                value.network, value.mask_len
            )));
        }
        Ok(Self {
            network: value.network,
            mask_len: value.mask_len,
            action: value.action,
            ecmp,
            egress_id,
        })
    }
}

impl From<FibRecord> for FibRecordRepr {
    fn from(value: FibRecord) -> Self {
        Self {
            network: value.network,
            mask_len: value.mask_len,
            action: value.action,
            ecmp: value.ecmp,
            ecmp_egress_id: value.ecmp.then_some(value.egress_id),
            egress_id: (!value.ecmp).then_some(value.egress_id),
        }
    }
}
