// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Route updater and resolver behavior.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use switch_state::config::{apply_config, InterfaceConfig, VlanConfig};
use switch_state::delta::{DeltaItem, StateDelta};
use switch_state::error::Error;
use switch_state::nexthop::{NextHopsMulti, ResolvedNextHop};
use switch_state::route::Route;
use switch_state::route_table::RouteTableMap;
use switch_state::state::SwitchState;
use switch_state::test::{
    logger, make_next_hops, route_v4, route_v6, two_interface_config,
    two_interface_state,
};
use switch_state::updater::RouteUpdater;
use switch_types::{
    Af, ClientId, ForwardAction, InterfaceId, Ipv4, Ipv6, Prefix4, RouterId,
    VlanId,
};

const CLIENT_A: ClientId = ClientId(1001);
const CLIENT_B: ClientId = ClientId(1002);
const CLIENT_C: ClientId = ClientId(1003);
const RID: RouterId = RouterId(0);

fn addr(s: &str) -> IpAddr {
    s.parse().expect("ip address")
}

fn expect_resolved<A: Af>(rt: &Arc<Route<A>>) {
    assert!(rt.is_resolved(), "{rt} should be resolved");
    assert!(!rt.is_unresolvable(), "{rt} should not be unresolvable");
    assert!(!rt.needs_resolve(), "{rt} should not need resolve");
}

fn expect_fwd<A: Af>(rt: &Arc<Route<A>>, pairs: &[(u32, &str)]) {
    let expected: BTreeSet<_> = pairs
        .iter()
        .map(|(i, a)| ResolvedNextHop::new(InterfaceId(*i), addr(a)))
        .collect();
    assert_eq!(rt.forward_info().nexthops(), Some(&expected), "{rt}");
}

/// Utility to build a list of n next hops 10-deep under a prefix, as in
/// `10.1.1.10`, `10.1.1.11`, ...
fn numbered_next_hops(n: usize, prefix: &str) -> switch_types::NextHopSet {
    (0..n)
        .map(|i| format!("{prefix}{}", i + 10))
        .map(|s| switch_types::NextHop::from_addr(s.parse().expect("addr")))
        .collect()
}

#[test]
fn dedup() {
    let state1 = two_interface_state();
    let tables1 = state1.route_tables().clone();

    let nhop1 = make_next_hops(&["1.1.1.10"]);
    let nhop2 = make_next_hops(&["2.2.2.10"]);

    let mut u2 = RouteUpdater::new(tables1.clone(), logger());
    u2.add_route(RID, addr("10.1.1.0"), 24, CLIENT_A, nhop1.clone()).unwrap();
    u2.add_route(RID, addr("20.1.1.0"), 24, CLIENT_A, nhop2.clone()).unwrap();
    u2.add_route(RID, addr("1001::0"), 48, CLIENT_A, nhop1.clone()).unwrap();
    u2.add_route(RID, addr("2001::0"), 48, CLIENT_A, nhop2.clone()).unwrap();
    let tables2 = u2.update_done().unwrap().expect("changed tables");

    // Re-adding the identical routes (interface routes included) is a
    // no-op.
    let mut u3 = RouteUpdater::new(tables2.clone(), logger());
    u3.add_interface_and_link_local_routes(state1.interfaces()).unwrap();
    u3.add_route(RID, addr("10.1.1.0"), 24, CLIENT_A, nhop1.clone()).unwrap();
    u3.add_route(RID, addr("20.1.1.0"), 24, CLIENT_A, nhop2.clone()).unwrap();
    u3.add_route(RID, addr("1001::0"), 48, CLIENT_A, nhop1.clone()).unwrap();
    u3.add_route(RID, addr("2001::0"), 48, CLIENT_A, nhop2.clone()).unwrap();
    assert!(u3.update_done().unwrap().is_none());

    // One route differs; only that route gets a new node.
    let mut u4 = RouteUpdater::new(tables2.clone(), logger());
    u4.add_interface_and_link_local_routes(state1.interfaces()).unwrap();
    u4.add_route(RID, addr("10.1.1.0"), 24, CLIENT_A, nhop1.clone()).unwrap();
    u4.add_route(RID, addr("20.1.1.0"), 24, CLIENT_A, nhop1.clone()).unwrap();
    u4.add_route(RID, addr("1001::0"), 48, CLIENT_A, nhop1.clone()).unwrap();
    u4.add_route(RID, addr("2001::0"), 48, CLIENT_A, nhop2.clone()).unwrap();
    let tables4 = u4.update_done().unwrap().expect("changed tables");

    let t2r1 = route_v4(&tables2, RID, "10.1.1.0/24");
    let t2r2 = route_v4(&tables2, RID, "20.1.1.0/24");
    let t2r3 = route_v6(&tables2, RID, "1001::/48");
    let t2r4 = route_v6(&tables2, RID, "2001::/48");
    let t4r1 = route_v4(&tables4, RID, "10.1.1.0/24");
    let t4r2 = route_v4(&tables4, RID, "20.1.1.0/24");
    let t4r3 = route_v6(&tables4, RID, "1001::/48");
    let t4r4 = route_v6(&tables4, RID, "2001::/48");

    assert!(Arc::ptr_eq(&t2r1, &t4r1));
    assert!(!Arc::ptr_eq(&t2r2, &t4r2));
    assert_eq!(t2r2.generation() + 1, t4r2.generation());
    assert!(Arc::ptr_eq(&t2r3, &t4r3));
    assert!(Arc::ptr_eq(&t2r4, &t4r4));
}

#[test]
fn recursive_resolution() {
    let state1 = two_interface_state();

    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route(RID, addr("1.1.3.0"), 24, CLIENT_A, make_next_hops(&["1.1.1.10"]))
        .unwrap();
    u1.add_route(RID, addr("8.8.8.0"), 24, CLIENT_A, make_next_hops(&["1.1.3.10"]))
        .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    let r21 = route_v4(&tables2, RID, "1.1.3.0/24");
    expect_resolved(&r21);
    assert!(!r21.is_connected());
    assert!(r21.is_with_nexthops());

    let r22 = route_v4(&tables2, RID, "8.8.8.0/24");
    expect_resolved(&r22);
    assert!(!r22.is_connected());

    // Both compile to the directly reachable pair through interface 1.
    expect_fwd(&r21, &[(1, "1.1.1.10")]);
    expect_fwd(&r22, &[(1, "1.1.1.10")]);
}

#[test]
fn resolution_loop() {
    let state1 = two_interface_state();

    // 30/8 -> 20.1.1.1, 20/8 -> 10.1.1.1, 10/8 -> 30.1.1.1 form a
    // lookup loop; all three end the pass unresolvable.
    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route(RID, addr("30.0.0.0"), 8, CLIENT_A, make_next_hops(&["20.1.1.1"]))
        .unwrap();
    u1.add_route(RID, addr("20.0.0.0"), 8, CLIENT_A, make_next_hops(&["10.1.1.1"]))
        .unwrap();
    u1.add_route(RID, addr("10.0.0.0"), 8, CLIENT_A, make_next_hops(&["30.1.1.1"]))
        .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    for prefix in ["10.0.0.0/8", "20.0.0.0/8", "30.0.0.0/8"] {
        let rt = route_v4(&tables2, RID, prefix);
        assert!(!rt.is_resolved(), "{rt}");
        assert!(rt.is_unresolvable(), "{rt}");
        assert!(!rt.is_connected(), "{rt}");
        assert!(rt.is_with_nexthops(), "{rt}");
        assert!(!rt.needs_resolve(), "{rt}");
        assert!(!rt.is_processing(), "{rt}");
    }
}

#[test]
fn resolution_across_updates() {
    let state1 = two_interface_state();

    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route(RID, addr("40.0.0.0"), 8, CLIENT_A, make_next_hops(&["50.0.0.1"]))
        .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    let r21 = route_v4(&tables2, RID, "40.0.0.0/8");
    assert!(!r21.is_resolved());
    assert!(r21.is_unresolvable());
    assert!(!r21.needs_resolve());

    // Installing 50/8 makes 40/8 resolvable in the next pass.
    let mut u2 = RouteUpdater::new(tables2, logger());
    u2.add_route(RID, addr("50.0.0.0"), 8, CLIENT_A, make_next_hops(&["1.1.1.1"]))
        .unwrap();
    let tables3 = u2.update_done().unwrap().expect("changed tables");

    let r31 = route_v4(&tables3, RID, "40.0.0.0/8");
    expect_resolved(&r31);
    assert!(!r31.is_connected());

    let r33 = route_v4(&tables3, RID, "50.0.0.0/8");
    expect_resolved(&r33);
    assert!(!r33.is_connected());

    let best = r31.best_next_hop_list().unwrap();
    assert_eq!(best.len(), 1);
    let rib3 = tables3.get(RID).unwrap().rib_v4();
    let via = match best.iter().next().unwrap().addr() {
        IpAddr::V4(a) => rib3.longest_match(a).unwrap(),
        IpAddr::V6(_) => panic!("v4 next hop expected"),
    };
    expect_resolved(via);
}

#[test]
fn add_del() {
    let state1 = two_interface_state();

    // One unresolvable member drops out of the forward set silently;
    // the v6 next hop resolves through the v6 connected route.
    let nexthops = make_next_hops(&["1.1.1.10", "2::2", "1.1.2.10"]);
    let nexthops2 = make_next_hops(&["1.1.3.10", "11:11::1"]);

    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route(RID, addr("10.1.1.1"), 24, CLIENT_A, nexthops.clone())
        .unwrap();
    u1.add_route(RID, addr("2001::1"), 48, CLIENT_A, nexthops.clone())
        .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    let r2 = route_v4(&tables2, RID, "10.1.1.0/24");
    expect_resolved(&r2);
    assert!(!r2.is_drop());
    assert!(!r2.is_to_cpu());
    assert!(!r2.is_connected());
    let r2v6 = route_v6(&tables2, RID, "2001::/48");
    expect_resolved(&r2v6);
    assert_eq!(r2.forward_info().action(), ForwardAction::Nexthops);
    assert_eq!(r2v6.forward_info().action(), ForwardAction::Nexthops);
    expect_fwd(&r2, &[(1, "1.1.1.10"), (2, "2::2")]);
    expect_fwd(&r2v6, &[(1, "1.1.1.10"), (2, "2::2")]);

    // Replace the v4 route's next hops with all-unresolvable ones.
    let mut u2 = RouteUpdater::new(tables2.clone(), logger());
    u2.add_route(RID, addr("10.1.1.1"), 24, CLIENT_A, nexthops2.clone())
        .unwrap();
    let tables3 = u2.update_done().unwrap().expect("changed tables");

    let r3 = route_v4(&tables3, RID, "10.1.1.0/24");
    assert!(!r3.is_resolved());
    assert!(r3.is_unresolvable());
    assert!(!r3.is_connected());
    assert!(!r3.needs_resolve());

    // Re-adding the same route is a no-op.
    let mut u3 = RouteUpdater::new(tables3.clone(), logger());
    u3.add_route(RID, addr("10.1.1.1"), 24, CLIENT_A, nexthops2).unwrap();
    assert!(u3.update_done().unwrap().is_none());

    // Deleting the only client's next hops erases the route.
    let mut u4 = RouteUpdater::new(tables3.clone(), logger());
    u4.del_nexthops_for_client(RID, addr("10.1.1.1"), 24, CLIENT_A).unwrap();
    let tables5 = u4.update_done().unwrap().expect("changed tables");
    let p: Prefix4 = "10.1.1.0/24".parse().unwrap();
    assert!(tables5.get(RID).unwrap().rib_v4().exact_match(&p).is_none());

    // Re-register an old route as TO_CPU and add a fresh DROP route.
    let mut u5 = RouteUpdater::new(tables3, logger());
    u5.add_route_action(RID, addr("10.1.1.0"), 24, ForwardAction::ToCpu)
        .unwrap();
    u5.add_route_action(RID, addr("10.1.2.0"), 24, ForwardAction::Drop)
        .unwrap();
    let tables6 = u5.update_done().unwrap().expect("changed tables");

    let r6_1 = route_v4(&tables6, RID, "10.1.1.0/24");
    expect_resolved(&r6_1);
    assert!(!r6_1.is_connected());
    assert!(!r6_1.is_with_nexthops());
    assert!(r6_1.is_to_cpu());
    assert!(!r6_1.is_drop());
    assert_eq!(r6_1.forward_info().action(), ForwardAction::ToCpu);

    let r6_2 = route_v4(&tables6, RID, "10.1.2.0/24");
    expect_resolved(&r6_2);
    assert!(!r6_2.is_connected());
    assert!(!r6_2.is_with_nexthops());
    assert!(!r6_2.is_to_cpu());
    assert!(r6_2.is_drop());
    assert_eq!(r6_2.forward_info().action(), ForwardAction::Drop);
}

#[test]
fn interface_routes() {
    let state0 = Arc::new(SwitchState::new());
    let tables0 = state0.route_tables().clone();
    let mut config = two_interface_config();

    let state1 = apply_config(&state0, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables1 = state1.route_tables().clone();
    assert!(!Arc::ptr_eq(&tables0, &tables1));
    assert_eq!(tables1.generation(), 1);
    assert_eq!(tables1.len(), 1);
    assert_eq!(tables1.get(RID).unwrap().rib_v4().len(), 2);
    assert_eq!(tables1.get(RID).unwrap().rib_v6().len(), 3);

    let rt = route_v4(&tables1, RID, "1.1.1.0/24");
    assert_eq!(rt.generation(), 0);
    expect_resolved(&rt);
    assert!(rt.is_connected());
    assert!(!rt.is_with_nexthops());
    assert!(!rt.is_to_cpu());
    assert!(!rt.is_drop());
    assert_eq!(rt.forward_info().action(), ForwardAction::Nexthops);
    expect_fwd(&rt, &[(1, "1.1.1.1")]);

    let rt = route_v6(&tables1, RID, "2::/48");
    assert_eq!(rt.generation(), 0);
    expect_resolved(&rt);
    assert!(rt.is_connected());
    expect_fwd(&rt, &[(2, "2::1")]);

    // The synthetic link-local service route.
    let rt = route_v6(&tables1, RID, "fe80::/64");
    assert_eq!(rt.generation(), 0);
    expect_resolved(&rt);
    assert!(!rt.is_connected());
    assert!(!rt.is_with_nexthops());
    assert!(rt.is_to_cpu());
    assert_eq!(rt.forward_info().action(), ForwardAction::ToCpu);
    assert_eq!(rt.forward_info().nexthop_count(), 0);

    // Swap the interface addresses; the connected routes move.
    config.interfaces[0].addresses =
        vec!["2.2.2.2/24".parse().unwrap(), "2::1/48".parse().unwrap()];
    config.interfaces[1].addresses =
        vec!["1.1.1.1/24".parse().unwrap(), "1::1/48".parse().unwrap()];

    let state2 = apply_config(&state1, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables2 = state2.route_tables().clone();
    assert_eq!(tables2.generation(), 2);
    assert_eq!(tables2.len(), 1);
    assert_eq!(tables2.get(RID).unwrap().rib_v4().len(), 2);
    assert_eq!(tables2.get(RID).unwrap().rib_v6().len(), 3);

    let rt = route_v4(&tables2, RID, "1.1.1.0/24");
    assert_eq!(rt.generation(), 1);
    expect_fwd(&rt, &[(2, "1.1.1.1")]);
    let rt = route_v6(&tables2, RID, "2::/48");
    assert_eq!(rt.generation(), 1);
    expect_fwd(&rt, &[(1, "2::1")]);
}

#[test]
fn multiple_addresses_in_one_subnet() {
    let state0 = Arc::new(SwitchState::new());
    let mut config = two_interface_config();
    config.vlans.truncate(1);
    config.interfaces.truncate(1);
    config.interfaces[0].addresses = vec![
        "1.1.1.1/24".parse().unwrap(),
        "1.1.1.2/24".parse().unwrap(),
        "1::1/48".parse().unwrap(),
        "1::2/48".parse().unwrap(),
    ];

    let state1 = apply_config(&state0, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables1 = state1.route_tables().clone();
    assert_eq!(tables1.get(RID).unwrap().rib_v4().len(), 1);
    assert_eq!(tables1.get(RID).unwrap().rib_v6().len(), 2);

    // The last address registered for the subnet wins the forward pair.
    let rt = route_v4(&tables1, RID, "1.1.1.0/24");
    expect_resolved(&rt);
    assert!(rt.is_connected());
    expect_fwd(&rt, &[(1, "1.1.1.2")]);
    let rt = route_v6(&tables1, RID, "1::/48");
    expect_resolved(&rt);
    assert!(rt.is_connected());
    expect_fwd(&rt, &[(1, "1::2")]);
}

type DeltaSets =
    (BTreeSet<(u32, String)>, BTreeSet<(u32, String)>, BTreeSet<(u32, String)>);

/// Collect per-route delta membership as (changed, added, removed) sets
/// of (vrf, prefix).
fn route_delta_sets(
    old: &Arc<RouteTableMap>,
    new: &Arc<RouteTableMap>,
) -> DeltaSets {
    let mut old_state = SwitchState::new();
    old_state.reset_route_tables(old.clone());
    let mut new_state = SwitchState::new();
    new_state.reset_route_tables(new.clone());
    let delta = StateDelta::new(Arc::new(old_state), Arc::new(new_state));

    let mut changed = BTreeSet::new();
    let mut added = BTreeSet::new();
    let mut removed = BTreeSet::new();
    for td in delta.route_tables_delta() {
        let id = td.router_id().0;
        let mut sort4 = |item: DeltaItem<'_, Route<Ipv4>>| match item {
            DeltaItem::Added(r) => {
                assert!(added.insert((id, r.prefix().to_string())));
            }
            DeltaItem::Removed(r) => {
                assert!(removed.insert((id, r.prefix().to_string())));
            }
            DeltaItem::Changed { old, new } => {
                assert_eq!(old.prefix(), new.prefix());
                assert!(!Arc::ptr_eq(old, new));
                assert!(changed.insert((id, new.prefix().to_string())));
            }
        };
        td.routes_delta::<Ipv4>().for_each(&mut sort4);
        let mut sort6 = |item: DeltaItem<'_, Route<Ipv6>>| match item {
            DeltaItem::Added(r) => {
                assert!(added.insert((id, r.prefix().to_string())));
            }
            DeltaItem::Removed(r) => {
                assert!(removed.insert((id, r.prefix().to_string())));
            }
            DeltaItem::Changed { old, new } => {
                assert_eq!(old.prefix(), new.prefix());
                assert!(!Arc::ptr_eq(old, new));
                assert!(changed.insert((id, new.prefix().to_string())));
            }
        };
        td.routes_delta::<Ipv6>().for_each(&mut sort6);
    }
    (changed, added, removed)
}

fn table_delta_sets(
    old: &Arc<RouteTableMap>,
    new: &Arc<RouteTableMap>,
) -> (BTreeSet<u32>, BTreeSet<u32>, BTreeSet<u32>) {
    let mut old_state = SwitchState::new();
    old_state.reset_route_tables(old.clone());
    let mut new_state = SwitchState::new();
    new_state.reset_route_tables(new.clone());
    let delta = StateDelta::new(Arc::new(old_state), Arc::new(new_state));

    let mut changed = BTreeSet::new();
    let mut added = BTreeSet::new();
    let mut removed = BTreeSet::new();
    for td in delta.route_tables_delta() {
        match (td.old_table(), td.new_table()) {
            (Some(o), Some(n)) => {
                assert_eq!(o.router_id(), n.router_id());
                assert!(!Arc::ptr_eq(o, n));
                changed.insert(o.router_id().0);
            }
            (None, Some(n)) => {
                added.insert(n.router_id().0);
            }
            (Some(o), None) => {
                removed.insert(o.router_id().0);
            }
            (None, None) => unreachable!(),
        }
    }
    (changed, added, removed)
}

fn set_of(items: &[(u32, &str)]) -> BTreeSet<(u32, String)> {
    items.iter().map(|(v, p)| (*v, p.to_string())).collect()
}

#[test]
fn apply_config_across_vrfs() {
    let state0 = Arc::new(SwitchState::new());
    let mut config = two_interface_config();
    config.interfaces[0].addresses.clear();
    config.interfaces[1].addresses.clear();
    config.interfaces[1].router_id = RouterId(1);

    // Interfaces without addresses produce no route tables at all.
    let state1 = apply_config(&state0, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables1 = state1.route_tables().clone();
    assert!(Arc::ptr_eq(&tables1, state0.route_tables()));
    assert_eq!(tables1.generation(), 0);
    assert_eq!(tables1.len(), 0);

    config.interfaces[0].addresses = vec![
        "1.1.1.1/24".parse().unwrap(),
        "1.1.1.2/24".parse().unwrap(),
        "1.1.1.10/24".parse().unwrap(),
        "::1/48".parse().unwrap(),
    ];
    config.interfaces[1].addresses =
        vec!["1.1.1.1/24".parse().unwrap(), "::1/48".parse().unwrap()];

    let state2 = apply_config(&state1, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables2 = state2.route_tables().clone();
    assert_eq!(tables2.generation(), 1);
    assert_eq!(tables2.len(), 2);
    assert!(tables2.get(RouterId(0)).is_some());
    assert!(tables2.get(RouterId(1)).is_some());

    let (changed, added, removed) = table_delta_sets(&tables1, &tables2);
    assert!(changed.is_empty());
    assert_eq!(added, BTreeSet::from([0, 1]));
    assert!(removed.is_empty());
    let (changed, added, removed) = route_delta_sets(&tables1, &tables2);
    assert!(changed.is_empty());
    assert_eq!(
        added,
        set_of(&[
            (0, "1.1.1.0/24"),
            (0, "::/48"),
            (0, "fe80::/64"),
            (1, "1.1.1.0/24"),
            (1, "::/48"),
            (1, "fe80::/64"),
        ])
    );
    assert!(removed.is_empty());

    // Change one v6 interface address.
    config.interfaces[0].addresses[3] = "11::11/48".parse().unwrap();
    let state3 = apply_config(&state2, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables3 = state3.route_tables().clone();
    assert_eq!(tables3.generation(), 2);
    assert_eq!(tables3.len(), 2);

    let (changed, added, removed) = table_delta_sets(&tables2, &tables3);
    assert_eq!(changed, BTreeSet::from([0]));
    assert!(added.is_empty());
    assert!(removed.is_empty());
    let (changed, added, removed) = route_delta_sets(&tables2, &tables3);
    assert!(changed.is_empty());
    assert_eq!(added, set_of(&[(0, "11::/48")]));
    assert_eq!(removed, set_of(&[(0, "::/48")]));

    // Moving interface 2 into vrf 0 collides with interface 1's subnet.
    let mut conflicted = config.clone();
    conflicted.interfaces[1].router_id = RouterId(0);
    let err = apply_config(&state3, &conflicted, &logger()).unwrap_err();
    assert!(matches!(err, Error::DuplicateInterfacePrefix { .. }));

    // Add a third interface in a new VRF and move interface 2 to vrf 0
    // with non-conflicting addresses.
    config.vlans.push(VlanConfig { id: VlanId(3), name: None });
    config.interfaces.push(InterfaceConfig {
        id: InterfaceId(3),
        vlan: VlanId(3),
        router_id: RouterId(2),
        name: None,
        mac: Some("00:00:00:00:00:33".parse().unwrap()),
        addresses: vec![
            "1.1.1.1/24".parse().unwrap(),
            "::1/48".parse().unwrap(),
        ],
    });
    config.interfaces[1].router_id = RouterId(0);
    config.interfaces[1].addresses =
        vec!["2.2.2.1/24".parse().unwrap(), "1::2/48".parse().unwrap()];

    let state4 = apply_config(&state3, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables4 = state4.route_tables().clone();
    assert_eq!(tables4.generation(), 3);
    assert_eq!(tables4.len(), 2);
    assert!(tables4.get(RouterId(0)).is_some());
    assert!(tables4.get(RouterId(1)).is_none());
    assert!(tables4.get(RouterId(2)).is_some());

    let (changed, added, removed) = table_delta_sets(&tables3, &tables4);
    assert_eq!(changed, BTreeSet::from([0]));
    assert_eq!(added, BTreeSet::from([2]));
    assert_eq!(removed, BTreeSet::from([1]));
    let (changed, added, removed) = route_delta_sets(&tables3, &tables4);
    assert!(changed.is_empty());
    assert_eq!(
        added,
        set_of(&[
            (0, "2.2.2.0/24"),
            (0, "1::/48"),
            (2, "1.1.1.0/24"),
            (2, "::/48"),
            (2, "fe80::/64"),
        ])
    );
    assert_eq!(
        removed,
        set_of(&[
            (1, "1.1.1.0/24"),
            (1, "::/48"),
            (1, "fe80::/64"),
        ])
    );

    // Re-applying the same config is a no-op.
    assert!(apply_config(&state4, &config, &logger()).unwrap().is_none());
}

#[test]
fn changed_routes_post_update() {
    let state0 = Arc::new(SwitchState::new());
    let mut config = two_interface_config();
    config.vlans.truncate(1);
    config.interfaces.truncate(1);

    let state1 = apply_config(&state0, &config, &logger())
        .unwrap()
        .expect("new state");
    let tables1 = state1.route_tables().clone();

    let nexthops = make_next_hops(&["1.1.1.10", "2::2"]);

    let mut u1 = RouteUpdater::new(tables1.clone(), logger());
    u1.add_route(RID, addr("10.1.1.0"), 24, CLIENT_A, nexthops.clone())
        .unwrap();
    u1.add_route(RID, addr("2001::0"), 48, CLIENT_A, nexthops.clone())
        .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    let (changed, added, removed) = route_delta_sets(&tables1, &tables2);
    assert!(changed.is_empty());
    assert_eq!(added, set_of(&[(0, "10.1.1.0/24"), (0, "2001::/48")]));
    assert!(removed.is_empty());
    let (changed, ..) = table_delta_sets(&tables1, &tables2);
    assert_eq!(changed, BTreeSet::from([0]));

    let mut u2 = RouteUpdater::new(tables2.clone(), logger());
    u2.add_route(RID, addr("10.10.1.0"), 24, CLIENT_A, nexthops.clone())
        .unwrap();
    u2.add_route(RID, addr("2001:10::0"), 48, CLIENT_A, nexthops.clone())
        .unwrap();
    let tables3 = u2.update_done().unwrap().expect("changed tables");

    let (changed, added, removed) = route_delta_sets(&tables2, &tables3);
    assert!(changed.is_empty());
    assert_eq!(added, set_of(&[(0, "10.10.1.0/24"), (0, "2001:10::/48")]));
    assert!(removed.is_empty());
}

#[test]
fn revert_added_route() {
    let state0 = Arc::new(SwitchState::new());
    let mut config = two_interface_config();
    config.vlans.truncate(1);
    config.vlans[0].id = VlanId(21);
    config.interfaces.truncate(1);
    config.interfaces[0].id = InterfaceId(21);
    config.interfaces[0].vlan = VlanId(21);
    config.interfaces[0].mac = Some("fa:ce:b0:0c:21:00".parse().unwrap());
    config.interfaces[0].addresses = vec![
        "10.0.21.1/24".parse().unwrap(),
        "face:b00c:0:21::1/64".parse().unwrap(),
    ];

    let state1 = apply_config(&state0, &config, &logger())
        .unwrap()
        .expect("new state");

    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route(
        RID,
        addr("20.0.1.51"),
        24,
        CLIENT_A,
        make_next_hops(&["10.0.21.51", "30.0.21.51"]),
    )
    .unwrap();
    u1.add_route(
        RID,
        addr("facf:b00c::52"),
        96,
        CLIENT_A,
        make_next_hops(&["30.0.21.52", "face:b00c:0:21::52"]),
    )
    .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    let mut state2 = state1.clone_for_modify();
    state2.reset_route_tables(tables2);
    let state2 = Arc::new(state2);

    let target: Prefix4 = "20.0.1.51/24".parse().unwrap();
    let new_entry = state2
        .route_tables()
        .get(RID)
        .unwrap()
        .rib_v4()
        .longest_match(target.network)
        .expect("installed route")
        .clone();

    let state3 = state2
        .revert_new_route_entry::<Ipv4>(RID, &new_entry, None)
        .unwrap();
    assert!(!Arc::ptr_eq(&state2, &state3));
    assert!(state3
        .route_tables()
        .get(RID)
        .unwrap()
        .rib_v4()
        .longest_match(target.network)
        .is_none());
}

#[test]
fn revert_changed_route() {
    let state0 = Arc::new(SwitchState::new());
    let mut config = two_interface_config();
    config.vlans.truncate(1);
    config.vlans[0].id = VlanId(21);
    config.interfaces.truncate(1);
    config.interfaces[0].id = InterfaceId(21);
    config.interfaces[0].vlan = VlanId(21);
    config.interfaces[0].addresses = vec![
        "10.0.21.1/24".parse().unwrap(),
        "face:b00c:0:21::1/64".parse().unwrap(),
    ];

    let state1 = apply_config(&state0, &config, &logger())
        .unwrap()
        .expect("new state");

    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route_action(
        RID,
        addr("facf:b00c:0:21::42"),
        96,
        ForwardAction::ToCpu,
    )
    .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");
    let mut state2 = state1.clone_for_modify();
    state2.reset_route_tables(tables2);
    let state2 = Arc::new(state2);

    let target: switch_types::Prefix6 =
        "facf:b00c:0:21::42/96".parse().unwrap();
    let old_entry = state2
        .route_tables()
        .get(RID)
        .unwrap()
        .rib_v6()
        .longest_match(target.network)
        .expect("old entry")
        .clone();

    // Re-register the prefix with concrete next hops.
    let mut u2 = RouteUpdater::new(state2.route_tables().clone(), logger());
    u2.add_route(
        RID,
        addr("facf:b00c:0:21::42"),
        96,
        CLIENT_A,
        make_next_hops(&["10.0.21.42", "face:b00c:0:21::42"]),
    )
    .unwrap();
    let tables3 = u2.update_done().unwrap().expect("changed tables");
    let mut state3 = state2.clone_for_modify();
    state3.reset_route_tables(tables3);
    let state3 = Arc::new(state3);

    let new_entry = state3
        .route_tables()
        .get(RID)
        .unwrap()
        .rib_v6()
        .longest_match(target.network)
        .expect("new entry")
        .clone();

    let state4 = state3
        .revert_new_route_entry::<Ipv6>(RID, &new_entry, Some(old_entry))
        .unwrap();
    assert!(!Arc::ptr_eq(&state3, &state4));
    let reverted = state4
        .route_tables()
        .get(RID)
        .unwrap()
        .rib_v6()
        .longest_match(target.network)
        .expect("reverted entry")
        .clone();
    assert!(reverted.is_to_cpu());
}

#[test]
fn mod_routes() {
    let state1 = Arc::new(SwitchState::new());
    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());

    let nexthops1 = numbered_next_hops(3, "1.1.1.");
    let nexthops2 = numbered_next_hops(3, "2.2.2.");
    let nexthops3 = numbered_next_hops(3, "3.3.3.");

    u1.add_route(RID, addr("10.10.10.10"), 32, CLIENT_A, nexthops1.clone())
        .unwrap();
    u1.add_route(RID, addr("10.10.10.10"), 32, CLIENT_B, nexthops2.clone())
        .unwrap();
    u1.add_route(RID, addr("99.99.99.99"), 32, CLIENT_A, nexthops3.clone())
        .unwrap();
    let tables1 = u1.update_done().unwrap().expect("changed tables");

    let mut u2 = RouteUpdater::new(tables1.clone(), logger());
    u2.del_nexthops_for_client(RID, addr("10.10.10.10"), 32, CLIENT_A)
        .unwrap();
    let tables2 = u2.update_done().unwrap().expect("changed tables");

    let t1rt10 = route_v4(&tables1, RID, "10.10.10.10/32");
    let t1rt99 = route_v4(&tables1, RID, "99.99.99.99/32");
    let t2rt10 = route_v4(&tables2, RID, "10.10.10.10/32");
    let t2rt99 = route_v4(&tables2, RID, "99.99.99.99/32");

    assert!(t1rt10.is_same(CLIENT_A, &nexthops1));
    assert!(t1rt10.is_same(CLIENT_B, &nexthops2));
    assert!(t1rt99.is_same(CLIENT_A, &nexthops3));
    assert!(!t2rt10.is_same(CLIENT_A, &nexthops1));
    assert!(t2rt10.is_same(CLIENT_B, &nexthops2));
    assert!(t2rt99.is_same(CLIENT_A, &nexthops3));
    assert!(!t2rt10.has_nexthops_for_client(CLIENT_A));
    assert!(t2rt10.has_nexthops_for_client(CLIENT_B));

    // Removing the last client removes the prefix entirely.
    let mut u3 = RouteUpdater::new(tables2, logger());
    u3.del_nexthops_for_client(RID, addr("10.10.10.10"), 32, CLIENT_B)
        .unwrap();
    let tables3 = u3.update_done().unwrap().expect("changed tables");
    let p: Prefix4 = "10.10.10.10/32".parse().unwrap();
    assert!(tables3.get(RID).unwrap().rib_v4().exact_match(&p).is_none());
}

#[test]
fn disallow_empty_next_hops() {
    let state1 = Arc::new(SwitchState::new());
    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());

    let err = u1
        .add_route(
            RID,
            addr("5.5.5.5"),
            32,
            CLIENT_A,
            numbered_next_hops(0, "20.20.20."),
        )
        .unwrap_err();
    assert!(matches!(err, Error::EmptyNextHops { .. }));

    u1.add_route(
        RID,
        addr("10.10.10.10"),
        32,
        CLIENT_A,
        numbered_next_hops(3, "10.10.10."),
    )
    .unwrap();
    let err = u1
        .add_route(
            RID,
            addr("10.10.10.10"),
            32,
            CLIENT_B,
            numbered_next_hops(0, "20.20.20."),
        )
        .unwrap_err();
    assert!(matches!(err, Error::EmptyNextHops { .. }));

    // The failed calls left the updater usable; the successful add still
    // goes through.
    let tables = u1.update_done().unwrap().expect("changed tables");
    assert!(route_v4(&tables, RID, "10.10.10.10/32")
        .has_nexthops_for_client(CLIENT_A));
}

#[test]
fn del_routes() {
    let state1 = Arc::new(SwitchState::new());
    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());

    u1.add_route(
        RID,
        addr("10.10.10.10"),
        32,
        CLIENT_A,
        numbered_next_hops(3, "1.1.1."),
    )
    .unwrap();
    u1.add_route_action(RID, addr("22.22.22.22"), 32, ForwardAction::ToCpu)
        .unwrap();
    let tables1 = u1.update_done().unwrap().expect("changed tables");

    let p10: Prefix4 = "10.10.10.10/32".parse().unwrap();
    let p22: Prefix4 = "22.22.22.22/32".parse().unwrap();
    let rib = tables1.get(RID).unwrap().rib_v4();
    assert!(rib.exact_match(&p10).is_some());
    assert!(rib.exact_match(&p22).is_some());

    // Deleting a route that still has client next hops is refused; the
    // terminal route deletes fine.
    let mut u2 = RouteUpdater::new(tables1, logger());
    let err = u2
        .del_route_with_no_nexthops(RID, addr("10.10.10.10"), 32)
        .unwrap_err();
    assert!(matches!(err, Error::RouteHasNextHops { .. }));
    u2.del_route_with_no_nexthops(RID, addr("22.22.22.22"), 32).unwrap();
    let tables2 = u2.update_done().unwrap().expect("changed tables");

    let rib = tables2.get(RID).unwrap().rib_v4();
    assert!(rib.exact_match(&p10).is_some());
    assert!(rib.exact_match(&p22).is_none());
}

#[test]
fn multi_equality() {
    let mut nhm1 = NextHopsMulti::new();
    nhm1.update(CLIENT_A, numbered_next_hops(3, "1.1.1.")).unwrap();
    nhm1.update(CLIENT_B, numbered_next_hops(3, "2.2.2.")).unwrap();

    let mut nhm2 = NextHopsMulti::new();
    nhm2.update(CLIENT_A, numbered_next_hops(3, "1.1.1.")).unwrap();
    nhm2.update(CLIENT_B, numbered_next_hops(3, "2.2.2.")).unwrap();

    assert_eq!(nhm1, nhm2);

    // Deleting an absent client changes nothing.
    nhm1.delete(CLIENT_C);
    assert_eq!(nhm1, nhm2);

    nhm1.delete(CLIENT_B);
    assert_ne!(nhm1, nhm2);

    nhm1.update(CLIENT_B, numbered_next_hops(2, "2.2.2.")).unwrap();
    assert_ne!(nhm1, nhm2);

    nhm1.update(CLIENT_B, numbered_next_hops(3, "2.2.2.")).unwrap();
    assert_eq!(nhm1, nhm2);
}

#[test]
fn multi_deep_copy() {
    let mut nhm1 = NextHopsMulti::new();
    let orig_hops = numbered_next_hops(3, "1.1.1.");
    nhm1.update(CLIENT_A, orig_hops.clone()).unwrap();
    nhm1.update(CLIENT_B, numbered_next_hops(3, "2.2.2.")).unwrap();

    let nhm2 = nhm1.clone();
    assert_eq!(nhm1, nhm2);

    let new_hops = numbered_next_hops(4, "10.10.10.");
    nhm1.update(CLIENT_A, new_hops.clone()).unwrap();
    assert_ne!(nhm1, nhm2);
    assert!(nhm1.is_same(CLIENT_A, &new_hops));
    assert!(nhm2.is_same(CLIENT_A, &orig_hops));
}

#[test]
fn multi_serialization() {
    let mut nhm1 = NextHopsMulti::new();
    nhm1.update(CLIENT_A, numbered_next_hops(3, "1.1.1.")).unwrap();
    nhm1.update(CLIENT_B, numbered_next_hops(1, "2.2.2.")).unwrap();
    nhm1.update(CLIENT_C, numbered_next_hops(4, "3.3.3.")).unwrap();

    let wire = nhm1.to_wire();
    let nhm2 = NextHopsMulti::from_wire(wire).unwrap();
    assert_eq!(nhm1, nhm2);
}

#[test]
fn list_ranking() {
    let list00 = numbered_next_hops(3, "0.0.0.");
    let list07 = numbered_next_hops(3, "7.7.7.");
    let list10 = numbered_next_hops(3, "10.10.10.");
    let list20 = numbered_next_hops(3, "20.20.20.");
    let list30 = numbered_next_hops(3, "30.30.30.");

    let mut nhm = NextHopsMulti::new();
    nhm.update(ClientId(20), list20.clone()).unwrap();
    nhm.update(ClientId(10), list10.clone()).unwrap();
    nhm.update(ClientId(30), list30.clone()).unwrap();
    assert_eq!(nhm.best_next_hop_list().unwrap(), &list10);

    nhm.update(ClientId(0), list00.clone()).unwrap();
    nhm.update(ClientId(7), list07.clone()).unwrap();
    assert_eq!(nhm.best_next_hop_list().unwrap(), &list00);

    nhm.delete(ClientId(0));
    assert_eq!(nhm.best_next_hop_list().unwrap(), &list07);
    nhm.delete(ClientId(10));
    assert_eq!(nhm.best_next_hop_list().unwrap(), &list07);
    nhm.delete(ClientId(7));
    assert_eq!(nhm.best_next_hop_list().unwrap(), &list20);
    nhm.delete(ClientId(20));
    assert_eq!(nhm.best_next_hop_list().unwrap(), &list30);
    nhm.delete(ClientId(30));
    assert!(nhm.best_next_hop_list().is_err());
}

#[test]
fn fwd_info_ranking() {
    let state1 = Arc::new(SwitchState::new());
    let mut tables = state1.route_tables().clone();

    let network = addr("22.22.22.22");
    let prefix = "22.22.22.22/32";

    let check_fwd = |tables: &Arc<RouteTableMap>, ip_prefix: &str| {
        let rt = route_v4(tables, RID, prefix);
        let fwd = rt.forward_info().nexthops().expect("nexthops");
        assert_eq!(fwd.len(), 3);
        for pair in fwd {
            assert!(
                pair.addr.to_string().starts_with(ip_prefix),
                "{} does not start with {ip_prefix}",
                pair.addr
            );
        }
    };
    let clients_present =
        |tables: &Arc<RouteTableMap>, ids: &[u16], absent: &[u16]| {
            let rt = route_v4(tables, RID, prefix);
            for id in ids {
                assert!(rt.has_nexthops_for_client(ClientId(*id)));
            }
            for id in absent {
                assert!(!rt.has_nexthops_for_client(ClientId(*id)));
            }
        };

    // Client 30 plus the interface route everything resolves through.
    let mut u1 = RouteUpdater::new(tables.clone(), logger());
    u1.add_connected_route(RID, InterfaceId(9), addr("10.10.0.0"), 16)
        .unwrap();
    u1.add_route(RID, network, 32, ClientId(30), numbered_next_hops(3, "10.10.30."))
        .unwrap();
    tables = u1.update_done().unwrap().expect("changed tables");
    clients_present(&tables, &[30], &[10, 20, 40, 50, 999]);
    check_fwd(&tables, "10.10.30.");

    let add = |tables: &Arc<RouteTableMap>, client: u16, ip_prefix: &str| {
        let mut u = RouteUpdater::new(tables.clone(), logger());
        u.add_route(
            RID,
            network,
            32,
            ClientId(client),
            numbered_next_hops(3, ip_prefix),
        )
        .unwrap();
        u.update_done().unwrap().expect("changed tables")
    };
    let del = |tables: &Arc<RouteTableMap>, client: u16| {
        let mut u = RouteUpdater::new(tables.clone(), logger());
        u.del_nexthops_for_client(RID, network, 32, ClientId(client))
            .unwrap();
        u.update_done().unwrap().expect("changed tables")
    };

    tables = add(&tables, 20, "10.10.20.");
    clients_present(&tables, &[20, 30], &[10, 40, 50, 999]);
    check_fwd(&tables, "10.10.20.");

    tables = add(&tables, 40, "10.10.40.");
    clients_present(&tables, &[20, 30, 40], &[10, 50, 999]);
    check_fwd(&tables, "10.10.20.");

    tables = add(&tables, 10, "10.10.10.");
    clients_present(&tables, &[10, 20, 30, 40], &[50, 999]);
    check_fwd(&tables, "10.10.10.");

    tables = del(&tables, 20);
    clients_present(&tables, &[10, 30, 40], &[20, 50, 999]);
    check_fwd(&tables, "10.10.10.");

    tables = del(&tables, 10);
    clients_present(&tables, &[30, 40], &[10, 20, 50, 999]);
    check_fwd(&tables, "10.10.30.");

    tables = del(&tables, 30);
    clients_present(&tables, &[40], &[10, 20, 30, 50, 999]);
    check_fwd(&tables, "10.10.40.");
}

#[test]
fn drop_routes() {
    let state1 = Arc::new(SwitchState::new());
    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route_action(RID, addr("10.10.10.10"), 32, ForwardAction::Drop)
        .unwrap();
    u1.add_route_action(RID, addr("2001::0"), 128, ForwardAction::Drop)
        .unwrap();
    // Terminal actions propagate through recursive resolution.
    u1.add_route(RID, addr("20.20.20.0"), 24, CLIENT_A, make_next_hops(&["10.10.10.10"]))
        .unwrap();
    u1.add_route(RID, addr("2001:1::"), 64, CLIENT_A, make_next_hops(&["2001::0"]))
        .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    let r1 = route_v4(&tables2, RID, "10.10.10.10/32");
    expect_resolved(&r1);
    assert!(!r1.is_connected());
    assert!(r1.is_same_action(ForwardAction::Drop));

    let r2 = route_v4(&tables2, RID, "20.20.20.0/24");
    expect_resolved(&r2);
    assert!(!r2.is_connected());
    assert!(r2.is_same_action(ForwardAction::Drop));

    let r3 = route_v6(&tables2, RID, "2001::/128");
    expect_resolved(&r3);
    assert!(r3.is_same_action(ForwardAction::Drop));

    let r4 = route_v6(&tables2, RID, "2001:1::/64");
    expect_resolved(&r4);
    assert!(r4.is_same_action(ForwardAction::Drop));
}

#[test]
fn to_cpu_routes() {
    let state1 = Arc::new(SwitchState::new());
    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.add_route_action(RID, addr("10.10.10.10"), 32, ForwardAction::ToCpu)
        .unwrap();
    u1.add_route_action(RID, addr("2001::0"), 128, ForwardAction::ToCpu)
        .unwrap();
    u1.add_route(RID, addr("20.20.20.0"), 24, CLIENT_A, make_next_hops(&["10.10.10.10"]))
        .unwrap();
    u1.add_route(RID, addr("2001:1::"), 64, CLIENT_A, make_next_hops(&["2001::0"]))
        .unwrap();
    let tables2 = u1.update_done().unwrap().expect("changed tables");

    for prefix in ["10.10.10.10/32", "20.20.20.0/24"] {
        let rt = route_v4(&tables2, RID, prefix);
        expect_resolved(&rt);
        assert!(!rt.is_connected());
        assert!(rt.is_same_action(ForwardAction::ToCpu));
    }
    for prefix in ["2001::/128", "2001:1::/64"] {
        let rt = route_v6(&tables2, RID, prefix);
        expect_resolved(&rt);
        assert!(!rt.is_connected());
        assert!(rt.is_same_action(ForwardAction::ToCpu));
    }
}

#[test]
fn alpm_default_routes() {
    let state1 = Arc::new(SwitchState::new());

    // Enabling the policy synthesizes drop defaults in the default VRF.
    let mut u1 = RouteUpdater::new(state1.route_tables().clone(), logger());
    u1.set_alpm_enabled(true);
    let tables1 = u1.update_done().unwrap().expect("changed tables");
    assert!(tables1.alpm_enabled());
    let v4_default = route_v4(&tables1, RID, "0.0.0.0/0");
    expect_resolved(&v4_default);
    assert!(v4_default.is_drop());
    let v6_default = route_v6(&tables1, RID, "::/0");
    expect_resolved(&v6_default);
    assert!(v6_default.is_drop());

    // Deleting a default is answered by re-inserting the synthetic one,
    // so the net update is a no-op.
    let mut u2 = RouteUpdater::new(tables1.clone(), logger());
    u2.del_route_with_no_nexthops(RID, addr("0.0.0.0"), 0).unwrap();
    assert!(u2.update_done().unwrap().is_none());

    // A user default route replaces the synthetic one.
    let mut u3 = RouteUpdater::new(tables1.clone(), logger());
    u3.add_connected_route(RID, InterfaceId(1), addr("10.0.0.1"), 24)
        .unwrap();
    u3.add_route(RID, addr("0.0.0.0"), 0, CLIENT_A, make_next_hops(&["10.0.0.2"]))
        .unwrap();
    let tables3 = u3.update_done().unwrap().expect("changed tables");
    let user_default = route_v4(&tables3, RID, "0.0.0.0/0");
    expect_resolved(&user_default);
    assert!(user_default.is_with_nexthops());
    expect_fwd(&user_default, &[(1, "10.0.0.2")]);
}

#[test]
fn connected_routes_always_resolved() {
    let state1 = two_interface_state();
    for table in state1.route_tables().iter() {
        for rt in table.rib_v4().iter() {
            if rt.is_connected() {
                assert!(rt.is_resolved());
                assert!(!rt.is_unresolvable());
                assert_eq!(
                    rt.forward_info().action(),
                    ForwardAction::Nexthops
                );
            }
        }
        for rt in table.rib_v6().iter() {
            if rt.is_connected() {
                assert!(rt.is_resolved());
                assert!(!rt.is_unresolvable());
                assert_eq!(
                    rt.forward_info().action(),
                    ForwardAction::Nexthops
                );
            }
        }
    }
}

#[test]
fn published_snapshot_is_immutable() {
    let state1 = two_interface_state();
    let tables1 = state1.route_tables().clone();
    let before = route_v4(&tables1, RID, "1.1.1.0/24");
    let before_gen = tables1.generation();

    // Run a mutating update off the same base; the base must not move.
    let mut u = RouteUpdater::new(tables1.clone(), logger());
    u.add_route(RID, addr("10.1.1.0"), 24, CLIENT_A, make_next_hops(&["1.1.1.10"]))
        .unwrap();
    let _tables2 = u.update_done().unwrap().expect("changed tables");

    assert_eq!(tables1.generation(), before_gen);
    let after = route_v4(&tables1, RID, "1.1.1.0/24");
    assert!(Arc::ptr_eq(&before, &after));
    let p: Prefix4 = "10.1.1.0/24".parse().unwrap();
    assert!(tables1.get(RID).unwrap().rib_v4().exact_match(&p).is_none());
}
