// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The route updater: the single authorized mutator of RIBs.
//!
//! An updater is built from an immutable [RouteTableMap] snapshot and
//! accumulates add/delete operations against private working copies of
//! the touched VRFs. [RouteUpdater::update_done] runs the resolution
//! pass over every touched VRF, compiles forward info for each route,
//! and produces the successor map. Routes whose compiled form is
//! structurally identical to the base keep their identity in the
//! successor; if nothing changed at all, `update_done` reports `None`.
//!
//! Resolution is recursive: a next hop is looked up by longest match in
//! the working RIB of the next hop's family, and the matched route is
//! resolved on demand before its result is adopted. A `PROCESSING` mark
//! on the lookup target means the recursion re-entered a route on the
//! current stack: a resolution cycle. Cyclic routes contribute nothing
//! and end the pass `UNRESOLVABLE`.

use crate::error::Error;
use crate::interface::InterfaceMap;
use crate::nexthop::{ForwardInfo, ResolvedNextHop};
use crate::rib::{longest_match_in, Rib};
use crate::route::{Route, RouteFlags};
use crate::route_table::{RibAf, RouteTable, RouteTableMap};
use slog::{debug, Logger};
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;
use switch_types::{
    ClientId, ForwardAction, InterfaceId, IpPrefix, Ipv4, Ipv6, NextHop,
    NextHopSet, Prefix, Prefix6, RouterId,
};

/// Bound on recursive next-hop chains. Deeper chains than this are
/// pathological and resolve to `UNRESOLVABLE` rather than risking the
/// stack.
const MAX_RESOLUTION_DEPTH: usize = 32;

/// The IPv6 link-local service prefix installed per VRF.
pub fn link_local_prefix() -> Prefix6 {
    Prefix6::new(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 64)
}

type WorkMap<A> = BTreeMap<Prefix<A>, Arc<Route<A>>>;

/// Working copies of one VRF's RIBs.
struct VrfWork {
    v4: WorkMap<Ipv4>,
    v6: WorkMap<Ipv6>,
}

/// Family selector into a [VrfWork].
trait WorkAf: RibAf {
    fn work(w: &mut VrfWork) -> &mut WorkMap<Self>;
    fn work_ref(w: &VrfWork) -> &WorkMap<Self>;
}

impl WorkAf for Ipv4 {
    fn work(w: &mut VrfWork) -> &mut WorkMap<Ipv4> {
        &mut w.v4
    }

    fn work_ref(w: &VrfWork) -> &WorkMap<Ipv4> {
        &w.v4
    }
}

impl WorkAf for Ipv6 {
    fn work(w: &mut VrfWork) -> &mut WorkMap<Ipv6> {
        &mut w.v6
    }

    fn work_ref(w: &VrfWork) -> &WorkMap<Ipv6> {
        &w.v6
    }
}

pub struct RouteUpdater {
    base: Arc<RouteTableMap>,
    work: BTreeMap<RouterId, VrfWork>,
    /// Connected prefixes registered in this pass, for duplicate
    /// detection across interfaces.
    connected_claims: BTreeMap<(RouterId, IpPrefix), InterfaceId>,
    alpm_enabled: bool,
    log: Logger,
}

impl RouteUpdater {
    pub fn new(base: Arc<RouteTableMap>, log: Logger) -> Self {
        let alpm_enabled = base.alpm_enabled();
        Self {
            base,
            work: BTreeMap::new(),
            connected_claims: BTreeMap::new(),
            alpm_enabled,
            log,
        }
    }

    /// Change the default-route policy for the successor map.
    pub fn set_alpm_enabled(&mut self, alpm_enabled: bool) {
        self.alpm_enabled = alpm_enabled;
    }

    /// Register `client`'s next hops for a prefix. An empty set is
    /// rejected and leaves the updater untouched.
    pub fn add_route(
        &mut self,
        vrf: RouterId,
        addr: IpAddr,
        length: u8,
        client: ClientId,
        next_hops: NextHopSet,
    ) -> Result<(), Error> {
        let prefix = IpPrefix::new(addr, length)?;
        if next_hops.is_empty() {
            return Err(Error::EmptyNextHops { vrf, prefix, client });
        }
        match prefix {
            IpPrefix::V4(p) => {
                self.add_route_af::<Ipv4>(vrf, p, client, next_hops)
            }
            IpPrefix::V6(p) => {
                self.add_route_af::<Ipv6>(vrf, p, client, next_hops)
            }
        }
    }

    /// Register a client-less terminal route (`Drop` or `ToCpu`).
    pub fn add_route_action(
        &mut self,
        vrf: RouterId,
        addr: IpAddr,
        length: u8,
        action: ForwardAction,
    ) -> Result<(), Error> {
        if action == ForwardAction::Nexthops {
            return Err(Error::Internal(format!(
                "terminal route {addr}/{length} registered with action \
                 nexthops"
            )));
        }
        match IpPrefix::new(addr, length)? {
            IpPrefix::V4(p) => self.add_action_af::<Ipv4>(vrf, p, action),
            IpPrefix::V6(p) => self.add_action_af::<Ipv6>(vrf, p, action),
        }
    }

    /// Register the connected route for an interface address.
    pub fn add_connected_route(
        &mut self,
        vrf: RouterId,
        interface: InterfaceId,
        addr: IpAddr,
        length: u8,
    ) -> Result<(), Error> {
        let prefix = IpPrefix::new(addr, length)?;
        if let Some(&first) =
            self.connected_claims.get(&(vrf, prefix))
        {
            if first != interface {
                return Err(Error::DuplicateInterfacePrefix {
                    vrf,
                    prefix,
                    first,
                    second: interface,
                });
            }
        }
        self.connected_claims.insert((vrf, prefix), interface);
        match prefix {
            IpPrefix::V4(p) => {
                self.add_connected_af::<Ipv4>(vrf, p, interface, addr)
            }
            IpPrefix::V6(p) => {
                self.add_connected_af::<Ipv6>(vrf, p, interface, addr)
            }
        }
        Ok(())
    }

    /// Bulk-register the connected route for every interface address,
    /// plus the `fe80::/64 -> ToCpu` service route for each VRF with an
    /// IPv6-capable interface.
    pub fn add_interface_and_link_local_routes(
        &mut self,
        interfaces: &InterfaceMap,
    ) -> Result<(), Error> {
        let mut v6_vrfs = BTreeSet::new();
        for intf in interfaces.iter() {
            for address in &intf.addresses {
                self.add_connected_route(
                    intf.router_id,
                    intf.id,
                    address.addr,
                    address.length,
                )?;
                if address.is_v6() {
                    v6_vrfs.insert(intf.router_id);
                }
            }
        }
        for vrf in v6_vrfs {
            let ll = link_local_prefix();
            self.add_route_action(
                vrf,
                IpAddr::V6(ll.network),
                ll.length,
                ForwardAction::ToCpu,
            )?;
        }
        Ok(())
    }

    /// Remove `client`'s contribution from a route. The route itself is
    /// erased once no client, interface or terminal registration keeps
    /// it alive.
    pub fn del_nexthops_for_client(
        &mut self,
        vrf: RouterId,
        addr: IpAddr,
        length: u8,
        client: ClientId,
    ) -> Result<(), Error> {
        match IpPrefix::new(addr, length)? {
            IpPrefix::V4(p) => self.del_client_af::<Ipv4>(vrf, p, client),
            IpPrefix::V6(p) => self.del_client_af::<Ipv6>(vrf, p, client),
        }
    }

    /// Remove every route contribution `client` has in `vrf`.
    pub fn remove_all_routes_for_client(
        &mut self,
        vrf: RouterId,
        client: ClientId,
    ) -> Result<(), Error> {
        let work = self.vrf_work(vrf);
        let v4: Vec<_> = work
            .v4
            .iter()
            .filter(|(_, r)| r.has_nexthops_for_client(client))
            .map(|(p, _)| *p)
            .collect();
        let v6: Vec<_> = work
            .v6
            .iter()
            .filter(|(_, r)| r.has_nexthops_for_client(client))
            .map(|(p, _)| *p)
            .collect();
        for p in v4 {
            self.del_client_af::<Ipv4>(vrf, p, client)?;
        }
        for p in v6 {
            self.del_client_af::<Ipv6>(vrf, p, client)?;
        }
        Ok(())
    }

    /// Erase a route that has no client next hops (a terminal route).
    /// Fails when clients still register next hops for the prefix.
    pub fn del_route_with_no_nexthops(
        &mut self,
        vrf: RouterId,
        addr: IpAddr,
        length: u8,
    ) -> Result<(), Error> {
        match IpPrefix::new(addr, length)? {
            IpPrefix::V4(p) => self.del_no_nexthops_af::<Ipv4>(vrf, p),
            IpPrefix::V6(p) => self.del_no_nexthops_af::<Ipv6>(vrf, p),
        }
    }

    /// Remove the synthetic link-local entry from `vrf`; no-op when it
    /// is not present.
    pub fn del_link_local_routes(&mut self, vrf: RouterId) {
        let work = self.vrf_work(vrf);
        work.v6.remove(&link_local_prefix());
    }

    /// Drop the connected registration of a prefix, erasing the route if
    /// nothing else keeps it alive. Used when an interface address goes
    /// away.
    pub fn del_connected_route(
        &mut self,
        vrf: RouterId,
        prefix: IpPrefix,
    ) -> Result<(), Error> {
        match prefix {
            IpPrefix::V4(p) => self.del_connected_af::<Ipv4>(vrf, p),
            IpPrefix::V6(p) => self.del_connected_af::<Ipv6>(vrf, p),
        }
        Ok(())
    }

    /// Resolve everything touched and produce the successor map, or
    /// `None` when the result is structurally identical to the base.
    pub fn update_done(mut self) -> Result<Option<Arc<RouteTableMap>>, Error> {
        if self.alpm_enabled {
            self.ensure_default_routes();
        }

        for work in self.work.values_mut() {
            mark_for_resolve::<Ipv4>(work);
            mark_for_resolve::<Ipv6>(work);
            resolve_all(work, &self.log);
        }

        let mut tables = self.base.entries().clone();
        let mut map_changed = self.alpm_enabled != self.base.alpm_enabled();

        for (vrf, work) in std::mem::take(&mut self.work) {
            let base_table = self.base.get(vrf);

            let (v4, v4_changed) = dedup_family::<Ipv4>(
                base_table.map(|t| t.rib_v4()),
                work.v4,
            )?;
            let (v6, v6_changed) = dedup_family::<Ipv6>(
                base_table.map(|t| t.rib_v6()),
                work.v6,
            )?;

            let empty = v4.as_ref().map(|r| r.is_empty()).unwrap_or(true)
                && v6.as_ref().map(|r| r.is_empty()).unwrap_or(true);
            if empty {
                if base_table.is_some() {
                    tables.remove(&vrf);
                    map_changed = true;
                }
                continue;
            }

            if v4_changed || v6_changed {
                let table = RouteTable {
                    router_id: vrf,
                    rib_v4: v4.unwrap_or_else(|| Arc::new(Rib::new())),
                    rib_v6: v6.unwrap_or_else(|| Arc::new(Rib::new())),
                    generation: base_table
                        .map(|t| t.generation() + 1)
                        .unwrap_or(0),
                };
                tables.insert(vrf, Arc::new(table));
                map_changed = true;
            }
        }

        if !map_changed {
            return Ok(None);
        }

        debug!(
            self.log,
            "route update produced new tables";
            "tables" => tables.len(),
            "generation" => self.base.generation() + 1,
        );
        Ok(Some(Arc::new(RouteTableMap::from_parts(
            tables,
            self.alpm_enabled,
            self.base.generation() + 1,
        ))))
    }

    fn vrf_work(&mut self, vrf: RouterId) -> &mut VrfWork {
        let base = &self.base;
        self.work.entry(vrf).or_insert_with(|| match base.get(vrf) {
            Some(t) => VrfWork {
                v4: t.rib_v4().entries().clone(),
                v6: t.rib_v6().entries().clone(),
            },
            None => VrfWork { v4: BTreeMap::new(), v6: BTreeMap::new() },
        })
    }

    fn add_route_af<A: WorkAf>(
        &mut self,
        vrf: RouterId,
        prefix: Prefix<A>,
        client: ClientId,
        next_hops: NextHopSet,
    ) -> Result<(), Error> {
        let map = A::work(self.vrf_work(vrf));
        match map.get_mut(&prefix) {
            Some(route) => Arc::make_mut(route).update(client, next_hops),
            None => {
                let route =
                    Route::with_next_hops(prefix, client, next_hops)?;
                map.insert(prefix, Arc::new(route));
                Ok(())
            }
        }
    }

    fn add_action_af<A: WorkAf>(
        &mut self,
        vrf: RouterId,
        prefix: Prefix<A>,
        action: ForwardAction,
    ) -> Result<(), Error> {
        let map = A::work(self.vrf_work(vrf));
        match map.get_mut(&prefix) {
            Some(route) => {
                Arc::make_mut(route).set_terminal(action);
                Ok(())
            }
            None => {
                let route = Route::with_action(prefix, action)?;
                map.insert(prefix, Arc::new(route));
                Ok(())
            }
        }
    }

    fn add_connected_af<A: WorkAf>(
        &mut self,
        vrf: RouterId,
        prefix: Prefix<A>,
        interface: InterfaceId,
        addr: IpAddr,
    ) {
        let map = A::work(self.vrf_work(vrf));
        match map.get_mut(&prefix) {
            Some(route) => {
                Arc::make_mut(route).set_connected(interface, addr);
            }
            None => {
                map.insert(
                    prefix,
                    Arc::new(Route::connected(prefix, interface, addr)),
                );
            }
        }
    }

    fn del_client_af<A: WorkAf>(
        &mut self,
        vrf: RouterId,
        prefix: Prefix<A>,
        client: ClientId,
    ) -> Result<(), Error> {
        let map = A::work(self.vrf_work(vrf));
        let Some(route) = map.get_mut(&prefix) else {
            return Err(Error::NoRoute { vrf, prefix: prefix.to_ip_prefix() });
        };
        let r = Arc::make_mut(route);
        r.delete_client(client);
        if !r.is_with_nexthops()
            && !r.is_connected()
            && !r.is_drop()
            && !r.is_to_cpu()
        {
            map.remove(&prefix);
        }
        Ok(())
    }

    fn del_no_nexthops_af<A: WorkAf>(
        &mut self,
        vrf: RouterId,
        prefix: Prefix<A>,
    ) -> Result<(), Error> {
        let map = A::work(self.vrf_work(vrf));
        let Some(route) = map.get(&prefix) else {
            return Err(Error::NoRoute { vrf, prefix: prefix.to_ip_prefix() });
        };
        if route.is_with_nexthops() {
            return Err(Error::RouteHasNextHops {
                vrf,
                prefix: prefix.to_ip_prefix(),
            });
        }
        map.remove(&prefix);
        Ok(())
    }

    fn del_connected_af<A: WorkAf>(&mut self, vrf: RouterId, prefix: Prefix<A>) {
        let map = A::work(self.vrf_work(vrf));
        let Some(route) = map.get_mut(&prefix) else {
            return;
        };
        if !route.is_connected() {
            return;
        }
        let r = Arc::make_mut(route);
        r.clear_connected();
        if !r.is_with_nexthops() && !r.is_drop() && !r.is_to_cpu() {
            map.remove(&prefix);
        }
    }

    fn ensure_default_routes(&mut self) {
        let work = self.vrf_work(RouterId::DEFAULT);
        work.v4.entry(Prefix::<Ipv4>::default_route()).or_insert_with(|| {
            Arc::new(RouteTableMap::synthetic_default::<Ipv4>())
        });
        work.v6.entry(Prefix::<Ipv6>::default_route()).or_insert_with(|| {
            Arc::new(RouteTableMap::synthetic_default::<Ipv6>())
        });
    }
}

/// Put every route of a touched VRF back into the unresolved state so
/// the pass recomputes it against the updated RIB contents.
fn mark_for_resolve<A: WorkAf>(work: &mut VrfWork) {
    for route in A::work(work).values_mut() {
        let r = Arc::make_mut(route);
        r.flags.remove(
            RouteFlags::RESOLVED
                | RouteFlags::UNRESOLVABLE
                | RouteFlags::PROCESSING,
        );
        r.flags.insert(RouteFlags::NEEDS_RESOLVE);
    }
}

fn resolve_all(work: &mut VrfWork, log: &Logger) {
    let v4: Vec<_> = work.v4.keys().copied().collect();
    for prefix in v4 {
        resolve_route::<Ipv4>(work, prefix, 0, log);
    }
    let v6: Vec<_> = work.v6.keys().copied().collect();
    for prefix in v6 {
        resolve_route::<Ipv6>(work, prefix, 0, log);
    }
}

/// Resolve one route, recursing into the routes its next hops depend
/// on. On return the route is `RESOLVED` or `UNRESOLVABLE` and no
/// longer `PROCESSING`.
fn resolve_route<A: WorkAf>(
    work: &mut VrfWork,
    prefix: Prefix<A>,
    depth: usize,
    log: &Logger,
) {
    {
        let map = A::work(work);
        let Some(route) = map.get_mut(&prefix) else {
            return;
        };
        let r = Arc::make_mut(route);
        if !r.needs_resolve() {
            return;
        }
        if depth > MAX_RESOLUTION_DEPTH {
            debug!(
                log,
                "resolution depth limit hit";
                "prefix" => %r.prefix(),
            );
            r.flags.remove(RouteFlags::NEEDS_RESOLVE | RouteFlags::PROCESSING);
            r.flags.insert(RouteFlags::UNRESOLVABLE);
            r.fwd = ForwardInfo::default();
            return;
        }
        // Connected and terminal routes have fixed forward info.
        if r.is_connected() {
            r.flags.remove(
                RouteFlags::NEEDS_RESOLVE
                    | RouteFlags::PROCESSING
                    | RouteFlags::UNRESOLVABLE,
            );
            r.flags.insert(RouteFlags::RESOLVED);
            return;
        }
        if r.is_drop() || r.is_to_cpu() {
            r.fwd = if r.is_drop() {
                ForwardInfo::Drop
            } else {
                ForwardInfo::ToCpu
            };
            r.flags.remove(
                RouteFlags::NEEDS_RESOLVE
                    | RouteFlags::PROCESSING
                    | RouteFlags::UNRESOLVABLE,
            );
            r.flags.insert(RouteFlags::RESOLVED);
            return;
        }
        r.flags.insert(RouteFlags::PROCESSING);
    }

    let hops: Vec<NextHop> = {
        let map = A::work_ref(work);
        match map.get(&prefix).map(|r| r.best_next_hop_list()) {
            Some(Ok(set)) => set.iter().copied().collect(),
            _ => Vec::new(),
        }
    };

    let mut pairs = BTreeSet::new();
    let mut saw_drop = false;
    let mut saw_to_cpu = false;
    for nh in hops {
        match nh.addr() {
            IpAddr::V4(a) => resolve_via::<Ipv4>(
                work,
                a,
                nh.addr(),
                depth,
                log,
                &mut pairs,
                &mut saw_drop,
                &mut saw_to_cpu,
            ),
            IpAddr::V6(a) => resolve_via::<Ipv6>(
                work,
                a,
                nh.addr(),
                depth,
                log,
                &mut pairs,
                &mut saw_drop,
                &mut saw_to_cpu,
            ),
        }
    }

    let map = A::work(work);
    let Some(route) = map.get_mut(&prefix) else {
        return;
    };
    let r = Arc::make_mut(route);
    r.flags.remove(
        RouteFlags::PROCESSING
            | RouteFlags::NEEDS_RESOLVE
            | RouteFlags::RESOLVED
            | RouteFlags::UNRESOLVABLE,
    );
    if !pairs.is_empty() {
        r.fwd = ForwardInfo::Nexthops(pairs);
        r.flags.insert(RouteFlags::RESOLVED);
    } else if saw_drop {
        r.fwd = ForwardInfo::Drop;
        r.flags.insert(RouteFlags::RESOLVED);
    } else if saw_to_cpu {
        r.fwd = ForwardInfo::ToCpu;
        r.flags.insert(RouteFlags::RESOLVED);
    } else {
        debug!(log, "route unresolvable"; "prefix" => %r.prefix());
        r.fwd = ForwardInfo::default();
        r.flags.insert(RouteFlags::UNRESOLVABLE);
    }
}

/// Resolve one next-hop address and merge its contribution. The lookup
/// runs in the RIB of the address's family within the same VRF.
#[allow(clippy::too_many_arguments)]
fn resolve_via<A: WorkAf>(
    work: &mut VrfWork,
    addr: A::Addr,
    original: IpAddr,
    depth: usize,
    log: &Logger,
    pairs: &mut BTreeSet<ResolvedNextHop>,
    saw_drop: &mut bool,
    saw_to_cpu: &mut bool,
) {
    let dep_prefix = {
        let map = A::work_ref(work);
        match longest_match_in(map, addr) {
            Some(route) => *route.prefix(),
            // No covering route: this next hop contributes nothing.
            None => return,
        }
    };

    {
        let map = A::work_ref(work);
        let Some(dep) = map.get(&dep_prefix) else {
            return;
        };
        if dep.is_processing() {
            // Cycle: the dependency is on the current resolution stack.
            debug!(
                log,
                "resolution cycle";
                "via" => %dep.prefix(),
                "nexthop" => %original,
            );
            return;
        }
        if dep.needs_resolve() {
            resolve_route::<A>(work, dep_prefix, depth + 1, log);
        }
    }

    let map = A::work_ref(work);
    let Some(dep) = map.get(&dep_prefix) else {
        return;
    };
    if dep.is_connected() {
        // The next hop lives on a directly attached subnet; pair it
        // with that subnet's interface.
        if let Some(intf) = dep
            .forward_info()
            .nexthops()
            .and_then(|set| set.iter().next())
            .map(|p| p.interface)
        {
            pairs.insert(ResolvedNextHop::new(intf, original));
        }
    } else if dep.is_resolved() {
        match dep.forward_info() {
            ForwardInfo::Nexthops(set) => pairs.extend(set.iter().copied()),
            ForwardInfo::Drop => *saw_drop = true,
            ForwardInfo::ToCpu => *saw_to_cpu = true,
        }
    }
    // An unresolvable dependency contributes nothing.
}

/// Compare the resolved working map against the base RIB. Unchanged
/// routes get their base node back (identity preserved); changed routes
/// advance their generation past the base node's.
fn dedup_family<A: WorkAf>(
    base: Option<&Arc<Rib<A>>>,
    mut work: WorkMap<A>,
) -> Result<(Option<Arc<Rib<A>>>, bool), Error> {
    let empty = BTreeMap::new();
    let base_map = base.map(|r| r.entries()).unwrap_or(&empty);
    let mut changed = work.len() != base_map.len();

    for (prefix, route) in work.iter_mut() {
        if route.is_processing() || route.needs_resolve() {
            return Err(Error::Internal(format!(
                "route {} left pass in transient state",
                route.prefix()
            )));
        }
        match base_map.get(prefix) {
            Some(old) => {
                if old.same_as(route) {
                    *route = old.clone();
                } else {
                    let Some(r) = Arc::get_mut(route) else {
                        return Err(Error::Internal(format!(
                            "shared working route {}",
                            route.prefix()
                        )));
                    };
                    r.generation = old.generation() + 1;
                    changed = true;
                }
            }
            None => {
                changed = true;
            }
        }
    }

    if !changed {
        return Ok((base.cloned(), false));
    }
    let generation = base.map(|r| r.generation() + 1).unwrap_or(0);
    Ok((Some(Arc::new(Rib::from_parts(work, generation))), true))
}
