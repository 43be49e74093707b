// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for prefix canonicalization and the wire forms.

use crate::nexthop::{ForwardInfo, NextHopsMulti, ResolvedNextHop};
use crate::warmboot::FibRecord;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use switch_types::{
    ClientId, InterfaceId, IpPrefix, NextHop, Prefix4, Prefix6,
};

fn prefix4_strategy() -> impl Strategy<Value = Prefix4> {
    (any::<u32>(), 0u8..=32u8)
        .prop_map(|(bits, length)| Prefix4::new(Ipv4Addr::from(bits), length))
}

fn prefix6_strategy() -> impl Strategy<Value = Prefix6> {
    (any::<u128>(), 0u8..=128u8)
        .prop_map(|(bits, length)| Prefix6::new(Ipv6Addr::from(bits), length))
}

fn next_hop_strategy() -> impl Strategy<Value = NextHop> {
    prop_oneof![
        any::<u32>().prop_map(|bits| NextHop::from_addr(IpAddr::V4(
            Ipv4Addr::from(bits)
        ))),
        any::<u128>().prop_map(|bits| NextHop::from_addr(IpAddr::V6(
            Ipv6Addr::from(bits)
        ))),
    ]
}

fn multi_strategy() -> impl Strategy<Value = NextHopsMulti> {
    proptest::collection::btree_map(
        any::<u16>(),
        proptest::collection::btree_set(next_hop_strategy(), 1..4),
        0..4,
    )
    .prop_map(|clients| {
        let mut multi = NextHopsMulti::new();
        for (client, hops) in clients {
            multi.update(ClientId(client), hops).expect("non-empty set");
        }
        multi
    })
}

proptest! {
    #[test]
    fn prop_prefix4_host_bits_unset(prefix in prefix4_strategy()) {
        prop_assert!(prefix.host_bits_are_unset());
    }

    #[test]
    fn prop_prefix6_host_bits_unset(prefix in prefix6_strategy()) {
        prop_assert!(prefix.host_bits_are_unset());
    }

    #[test]
    fn prop_prefix4_contains_own_network(prefix in prefix4_strategy()) {
        prop_assert!(prefix.contains(prefix.network));
    }

    #[test]
    fn prop_prefix4_parse_round_trip(prefix in prefix4_strategy()) {
        let text = prefix.to_string();
        prop_assert_eq!(text.parse::<Prefix4>().expect("parse"), prefix);
    }

    #[test]
    fn prop_prefix6_parse_round_trip(prefix in prefix6_strategy()) {
        let text = prefix.to_string();
        prop_assert_eq!(text.parse::<Prefix6>().expect("parse"), prefix);
    }

    #[test]
    fn prop_multi_wire_round_trip(multi in multi_strategy()) {
        let wire = multi.to_wire();
        prop_assert_eq!(
            NextHopsMulti::from_wire(wire).expect("decode"),
            multi
        );
    }

    #[test]
    fn prop_fib_record_round_trip(
        bits in any::<u32>(),
        length in 0u8..=32u8,
        nexthops in 1usize..4,
        egress in any::<i64>(),
    ) {
        let prefix = IpPrefix::new(
            IpAddr::V4(Ipv4Addr::from(bits)),
            length,
        ).expect("prefix");
        let set: BTreeSet<_> = (0..nexthops)
            .map(|i| ResolvedNextHop::new(
                InterfaceId(i as u32),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, i as u8 + 1)),
            ))
            .collect();
        let record = FibRecord::new(
            prefix,
            &ForwardInfo::Nexthops(set),
            egress,
        );
        let json = serde_json::to_string(&record).expect("encode");
        prop_assert_eq!(
            serde_json::from_str::<FibRecord>(&json).expect("decode"),
            record
        );
    }
}
