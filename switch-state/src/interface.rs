// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer-3 interface nodes.

use crate::map::{NodeMap, StateNode};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;
use switch_types::{
    InterfaceId, MacAddress, RouterId, TypeError, VlanId,
};

/// An address assigned to an interface: the host address plus the subnet
/// length. Unlike a route prefix, host bits are preserved.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceAddress {
    pub addr: IpAddr,
    pub length: u8,
}

impl InterfaceAddress {
    pub fn new(addr: IpAddr, length: u8) -> Result<Self, TypeError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if length > max {
            return Err(TypeError::Length {
                family: if max == 32 { "v4" } else { "v6" },
                length,
                max,
            });
        }
        Ok(Self { addr, length })
    }

    pub fn is_v6(&self) -> bool {
        self.addr.is_ipv6()
    }
}

impl Display for InterfaceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.length)
    }
}

impl FromStr for InterfaceAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, length) = s.split_once('/').ok_or(TypeError::Cidr)?;
        let addr = addr
            .parse::<IpAddr>()
            .map_err(|_| TypeError::Addr(addr.to_string()))?;
        let length = length.parse::<u8>().map_err(|_| TypeError::Cidr)?;
        Self::new(addr, length)
    }
}

impl TryFrom<String> for InterfaceAddress {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InterfaceAddress> for String {
    fn from(value: InterfaceAddress) -> Self {
        value.to_string()
    }
}

// Serializes as its textual form, so that is also its schema.
impl schemars::JsonSchema for InterfaceAddress {
    fn schema_name() -> String {
        "InterfaceAddress".to_string()
    }

    fn json_schema(
        gen: &mut schemars::gen::SchemaGenerator,
    ) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    pub router_id: RouterId,
    pub vlan: VlanId,
    pub name: String,
    pub mac: MacAddress,
    pub addresses: Vec<InterfaceAddress>,
    pub(crate) generation: u64,
}

impl Interface {
    pub fn new(
        id: InterfaceId,
        router_id: RouterId,
        vlan: VlanId,
        name: String,
        mac: MacAddress,
        addresses: Vec<InterfaceAddress>,
    ) -> Self {
        Self { id, router_id, vlan, name, mac, addresses, generation: 0 }
    }

    pub fn has_v6_address(&self) -> bool {
        self.addresses.iter().any(|a| a.is_v6())
    }
}

impl StateNode for Interface {
    type Id = InterfaceId;

    fn id(&self) -> InterfaceId {
        self.id
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    fn same_as(&self, other: &Self) -> bool {
        self.id == other.id
            && self.router_id == other.router_id
            && self.vlan == other.vlan
            && self.name == other.name
            && self.mac == other.mac
            && self.addresses == other.addresses
    }
}

pub type InterfaceMap = NodeMap<Interface>;
