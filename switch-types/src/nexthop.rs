// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Next-hop records and forwarding actions.

use crate::af::is_link_local;
use crate::ids::InterfaceId;
use crate::TypeError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A next hop advertised by a client: an address plus an optional egress
/// interface scope.
///
/// Invariant: the interface scope is only permitted for link-local
/// addresses (`fe80::/10`, `169.254.0.0/16`). For any other address the
/// scope must be absent; constructing or deserializing such a next hop
/// is an error.
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
    JsonSchema,
)]
#[serde(try_from = "NextHopRepr", into = "NextHopRepr")]
pub struct NextHop {
    addr: std::net::IpAddr,
    interface: Option<InterfaceId>,
}

/// Unvalidated serde shape of [NextHop].
#[derive(Serialize, Deserialize, JsonSchema)]
struct NextHopRepr {
    addr: std::net::IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interface: Option<InterfaceId>,
}

impl NextHop {
    /// A next hop without interface scoping.
    pub fn from_addr(addr: std::net::IpAddr) -> Self {
        Self { addr, interface: None }
    }

    /// A next hop with an optional interface scope, validating the
    /// link-local invariant.
    pub fn new(
        addr: std::net::IpAddr,
        interface: Option<InterfaceId>,
    ) -> Result<Self, TypeError> {
        if interface.is_some() && !is_link_local(addr) {
            return Err(TypeError::Scope(addr));
        }
        Ok(Self { addr, interface })
    }

    pub fn addr(&self) -> std::net::IpAddr {
        self.addr
    }

    pub fn interface(&self) -> Option<InterfaceId> {
        self.interface
    }
}

impl Display for NextHop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.interface {
            Some(i) => write!(f, "{}%{}", self.addr, i),
            None => write!(f, "{}", self.addr),
        }
    }
}

impl TryFrom<NextHopRepr> for NextHop {
    type Error = TypeError;

    fn try_from(value: NextHopRepr) -> Result<Self, Self::Error> {
        Self::new(value.addr, value.interface)
    }
}

impl From<NextHop> for NextHopRepr {
    fn from(value: NextHop) -> Self {
        Self { addr: value.addr, interface: value.interface }
    }
}

/// A set of next hops. Order-insensitive; two sets compare equal when
/// their membership does.
pub type NextHopSet = BTreeSet<NextHop>;

/// The terminal classification of a compiled route.
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
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ForwardAction {
    Drop,
    ToCpu,
    Nexthops,
}

impl ForwardAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::ToCpu => "to_cpu",
            Self::Nexthops => "nexthops",
        }
    }
}

impl Display for ForwardAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForwardAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(Self::Drop),
            "to_cpu" => Ok(Self::ToCpu),
            "nexthops" => Ok(Self::Nexthops),
            _ => Err(format!("unknown forward action '{s}'")),
        }
    }
}
