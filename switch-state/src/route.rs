// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Route entries.
//!
//! A route couples the per-client next-hop registrations for one prefix
//! with the forwarding decision compiled from them. The flag lifecycle
//! during a resolver pass is
//!
//! ```text
//! NEEDS_RESOLVE -> PROCESSING -> RESOLVED | UNRESOLVABLE
//! ```
//!
//! `PROCESSING` exists only inside a single pass; a published route never
//! carries it. `CONNECTED`, `DROP` and `TO_CPU` record how the route was
//! registered and survive across passes.

use crate::error::Error;
use crate::nexthop::{ForwardInfo, NextHopsMulti, ResolvedNextHop};
use bitflags::bitflags;
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use switch_types::{
    Af, ClientId, ForwardAction, InterfaceId, NextHopSet, Prefix,
};

bitflags! {
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
    pub struct RouteFlags: u8 {
        /// The subnet route implied by an interface address.
        const CONNECTED = 1 << 0;
        /// Registered as a client-less drop route.
        const DROP = 1 << 1;
        /// Registered as a client-less punt-to-cpu route.
        const TO_CPU = 1 << 2;
        /// Forward info is valid.
        const RESOLVED = 1 << 3;
        /// The last resolution pass could not produce forward info.
        const UNRESOLVABLE = 1 << 4;
        /// Resolution is in progress on the current stack; seeing this
        /// during lookup means a resolution cycle.
        const PROCESSING = 1 << 5;
        /// Registration changed since the forward info was computed.
        const NEEDS_RESOLVE = 1 << 6;
    }
}

#[derive(Debug, Clone)]
pub struct Route<A: Af> {
    pub(crate) prefix: Prefix<A>,
    pub(crate) nexthops_multi: NextHopsMulti,
    pub(crate) fwd: ForwardInfo,
    pub(crate) flags: RouteFlags,
    pub(crate) generation: u64,
}

impl<A: Af> Route<A> {
    /// A route registered by `client` with a proposed next-hop set.
    pub fn with_next_hops(
        prefix: Prefix<A>,
        client: ClientId,
        next_hops: NextHopSet,
    ) -> Result<Self, Error> {
        let mut multi = NextHopsMulti::new();
        multi.update(client, next_hops)?;
        Ok(Self {
            prefix,
            nexthops_multi: multi,
            fwd: ForwardInfo::default(),
            flags: RouteFlags::NEEDS_RESOLVE,
            generation: 0,
        })
    }

    /// A client-less terminal route. `action` must be `Drop` or `ToCpu`.
    pub fn with_action(
        prefix: Prefix<A>,
        action: ForwardAction,
    ) -> Result<Self, Error> {
        let flag = match action {
            ForwardAction::Drop => RouteFlags::DROP,
            ForwardAction::ToCpu => RouteFlags::TO_CPU,
            ForwardAction::Nexthops => {
                return Err(Error::Internal(format!(
                    "terminal route {prefix} registered with action nexthops"
                )))
            }
        };
        Ok(Self {
            prefix,
            nexthops_multi: NextHopsMulti::new(),
            fwd: ForwardInfo::default(),
            flags: flag | RouteFlags::NEEDS_RESOLVE,
            generation: 0,
        })
    }

    /// The connected route for an interface subnet.
    pub fn connected(
        prefix: Prefix<A>,
        interface: InterfaceId,
        addr: IpAddr,
    ) -> Self {
        let mut set = std::collections::BTreeSet::new();
        set.insert(ResolvedNextHop::new(interface, addr));
        Self {
            prefix,
            nexthops_multi: NextHopsMulti::new(),
            fwd: ForwardInfo::Nexthops(set),
            flags: RouteFlags::CONNECTED | RouteFlags::NEEDS_RESOLVE,
            generation: 0,
        }
    }

    pub fn prefix(&self) -> &Prefix<A> {
        &self.prefix
    }

    pub fn nexthops_multi(&self) -> &NextHopsMulti {
        &self.nexthops_multi
    }

    pub fn forward_info(&self) -> &ForwardInfo {
        &self.fwd
    }

    pub fn flags(&self) -> RouteFlags {
        self.flags
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_connected(&self) -> bool {
        self.flags.contains(RouteFlags::CONNECTED)
    }

    pub fn is_drop(&self) -> bool {
        self.flags.contains(RouteFlags::DROP)
    }

    pub fn is_to_cpu(&self) -> bool {
        self.flags.contains(RouteFlags::TO_CPU)
    }

    pub fn is_resolved(&self) -> bool {
        self.flags.contains(RouteFlags::RESOLVED)
    }

    pub fn is_unresolvable(&self) -> bool {
        self.flags.contains(RouteFlags::UNRESOLVABLE)
    }

    pub fn is_processing(&self) -> bool {
        self.flags.contains(RouteFlags::PROCESSING)
    }

    pub fn needs_resolve(&self) -> bool {
        self.flags.contains(RouteFlags::NEEDS_RESOLVE)
    }

    /// True when at least one client registers next hops here.
    pub fn is_with_nexthops(&self) -> bool {
        !self.nexthops_multi.is_empty()
    }

    pub fn has_nexthops_for_client(&self, client: ClientId) -> bool {
        self.nexthops_multi.has_client(client)
    }

    pub fn is_same(&self, client: ClientId, next_hops: &NextHopSet) -> bool {
        self.nexthops_multi.is_same(client, next_hops)
    }

    /// Compare the compiled action only.
    pub fn is_same_action(&self, action: ForwardAction) -> bool {
        self.fwd.action() == action
    }

    pub fn best_next_hop_list(&self) -> Result<&NextHopSet, Error> {
        self.nexthops_multi.best_next_hop_list()
    }

    /// Structural comparison, generation excluded. Snapshot dedup keeps
    /// the old node whenever the new one is `same_as` it.
    pub fn same_as(&self, other: &Self) -> bool {
        self.prefix == other.prefix
            && self.nexthops_multi == other.nexthops_multi
            && self.fwd == other.fwd
            && self.flags == other.flags
    }

    /// Register client next hops. A terminal (drop / to-cpu)
    /// registration on the same prefix is superseded, mirroring how a
    /// terminal registration supersedes client next hops.
    pub(crate) fn update(
        &mut self,
        client: ClientId,
        next_hops: NextHopSet,
    ) -> Result<(), Error> {
        self.nexthops_multi.update(client, next_hops)?;
        self.flags.remove(RouteFlags::DROP | RouteFlags::TO_CPU);
        self.flags.insert(RouteFlags::NEEDS_RESOLVE);
        Ok(())
    }

    pub(crate) fn delete_client(&mut self, client: ClientId) {
        self.nexthops_multi.delete(client);
        self.flags.insert(RouteFlags::NEEDS_RESOLVE);
    }

    pub(crate) fn set_connected(
        &mut self,
        interface: InterfaceId,
        addr: IpAddr,
    ) {
        let mut set = std::collections::BTreeSet::new();
        set.insert(ResolvedNextHop::new(interface, addr));
        self.fwd = ForwardInfo::Nexthops(set);
        self.flags.insert(RouteFlags::CONNECTED | RouteFlags::NEEDS_RESOLVE);
    }

    pub(crate) fn clear_connected(&mut self) {
        self.flags.remove(RouteFlags::CONNECTED);
        self.flags.insert(RouteFlags::NEEDS_RESOLVE);
    }

    /// Re-register the route as a client-less terminal route. Client
    /// next hops registered earlier are superseded and dropped.
    pub(crate) fn set_terminal(&mut self, action: ForwardAction) {
        self.nexthops_multi = NextHopsMulti::new();
        match action {
            ForwardAction::Drop => {
                self.flags.remove(RouteFlags::TO_CPU);
                self.flags.insert(RouteFlags::DROP);
            }
            ForwardAction::ToCpu => {
                self.flags.remove(RouteFlags::DROP);
                self.flags.insert(RouteFlags::TO_CPU);
            }
            ForwardAction::Nexthops => {}
        }
        self.flags.insert(RouteFlags::NEEDS_RESOLVE);
    }
}

impl<A: Af> Display for Route<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.prefix, self.fwd)
    }
}
