// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core value types for the switch agent.
//!
//! This crate provides the fundamental types used to represent network
//! prefixes, next hops and switch object identifiers. It has minimal
//! dependencies and can be used by clients without pulling in the full
//! state engine.

pub mod af;
pub mod ids;
pub mod mac;
pub mod nexthop;
pub mod prefix;

pub use af::{Af, Ipv4, Ipv6};
pub use ids::{
    AclEntryId, AggregatePortId, ClientId, InterfaceId, PortId, RouterId,
    VlanId,
};
pub use mac::MacAddress;
pub use nexthop::{ForwardAction, NextHop, NextHopSet};
pub use prefix::{IpPrefix, Prefix, Prefix4, Prefix6};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("expected CIDR representation <addr>/<len>")]
    Cidr,

    #[error("malformed ip address '{0}'")]
    Addr(String),

    #[error("prefix length {length} out of range for {family} (max {max})")]
    Length { family: &'static str, length: u8, max: u8 },

    #[error("interface scope on non link-local next hop {0}")]
    Scope(std::net::IpAddr),

    #[error("malformed mac address '{0}'")]
    Mac(String),
}
