// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-client next-hop bookkeeping and compiled forward info.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use switch_types::{ClientId, ForwardAction, InterfaceId, NextHop, NextHopSet};

/// The next hops proposed for one prefix, keyed by the advertising
/// client. The set belonging to the numerically lowest client id wins
/// when the route is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NextHopsMulti {
    clients: BTreeMap<ClientId, NextHopSet>,
}

impl NextHopsMulti {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace `client`'s proposed set. Empty sets are rejected;
    /// deleting a client is an explicit operation, not an update with
    /// nothing in it.
    pub fn update(
        &mut self,
        client: ClientId,
        next_hops: NextHopSet,
    ) -> Result<(), Error> {
        if next_hops.is_empty() {
            return Err(Error::NoClientNextHops);
        }
        self.clients.insert(client, next_hops);
        Ok(())
    }

    /// Remove `client`'s contribution; no-op when absent.
    pub fn delete(&mut self, client: ClientId) {
        self.clients.remove(&client);
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn has_client(&self, client: ClientId) -> bool {
        self.clients.contains_key(&client)
    }

    /// Membership-equality check of `client`'s set against `next_hops`.
    pub fn is_same(&self, client: ClientId, next_hops: &NextHopSet) -> bool {
        self.clients.get(&client) == Some(next_hops)
    }

    /// The winning set: the one registered by the lowest client id.
    pub fn best_next_hop_list(&self) -> Result<&NextHopSet, Error> {
        self.clients
            .first_key_value()
            .map(|(_, set)| set)
            .ok_or(Error::NoClientNextHops)
    }

    pub fn lowest_client(&self) -> Option<ClientId> {
        self.clients.keys().next().copied()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (ClientId, &NextHopSet)> {
        self.clients.iter().map(|(c, s)| (*c, s))
    }

    /// Serializable form: `{client_id: [next_hops]}`.
    pub fn to_wire(&self) -> BTreeMap<u16, Vec<NextHop>> {
        self.clients
            .iter()
            .map(|(c, set)| (c.0, set.iter().copied().collect()))
            .collect()
    }

    pub fn from_wire(
        wire: BTreeMap<u16, Vec<NextHop>>,
    ) -> Result<Self, Error> {
        let mut multi = Self::new();
        for (client, hops) in wire {
            multi.update(ClientId(client), hops.into_iter().collect())?;
        }
        Ok(multi)
    }
}

/// One resolved forwarding pair: an egress interface and a directly
/// reachable next-hop address.
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
pub struct ResolvedNextHop {
    pub interface: InterfaceId,
    pub addr: IpAddr,
}

impl ResolvedNextHop {
    pub fn new(interface: InterfaceId, addr: IpAddr) -> Self {
        Self { interface, addr }
    }
}

impl Display for ResolvedNextHop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.addr, self.interface)
    }
}

/// The compiled forwarding decision of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardInfo {
    Drop,
    ToCpu,
    Nexthops(BTreeSet<ResolvedNextHop>),
}

impl Default for ForwardInfo {
    fn default() -> Self {
        Self::Drop
    }
}

impl ForwardInfo {
    pub fn from_action(action: ForwardAction) -> Self {
        match action {
            ForwardAction::Drop => Self::Drop,
            ForwardAction::ToCpu => Self::ToCpu,
            ForwardAction::Nexthops => Self::Nexthops(BTreeSet::new()),
        }
    }

    pub fn action(&self) -> ForwardAction {
        match self {
            Self::Drop => ForwardAction::Drop,
            Self::ToCpu => ForwardAction::ToCpu,
            Self::Nexthops(_) => ForwardAction::Nexthops,
        }
    }

    pub fn nexthops(&self) -> Option<&BTreeSet<ResolvedNextHop>> {
        match self {
            Self::Nexthops(set) => Some(set),
            _ => None,
        }
    }

    pub fn nexthop_count(&self) -> usize {
        self.nexthops().map(|s| s.len()).unwrap_or(0)
    }

    /// More than one resolved pair means the hardware needs an ECMP
    /// egress object rather than a single egress.
    pub fn is_ecmp(&self) -> bool {
        self.nexthop_count() > 1
    }
}

impl Display for ForwardInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("drop"),
            Self::ToCpu => f.write_str("to_cpu"),
            Self::Nexthops(set) => {
                f.write_str("nexthops[")?;
                for (i, nh) in set.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{nh}")?;
                }
                f.write_str("]")
            }
        }
    }
}
