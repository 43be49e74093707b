// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use switch_types::{ClientId, InterfaceId, IpPrefix, RouterId};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed value: {0}")]
    InvalidInput(#[from] switch_types::TypeError),

    #[error("empty next-hop set for {prefix} from client {client} in vrf {vrf}")]
    EmptyNextHops { vrf: RouterId, prefix: IpPrefix, client: ClientId },

    #[error("no next hops registered for any client")]
    NoClientNextHops,

    #[error("no route table for vrf {0}")]
    NoRouteTable(RouterId),

    #[error("no route at {prefix} in vrf {vrf}")]
    NoRoute { vrf: RouterId, prefix: IpPrefix },

    #[error("no interface {0}")]
    NoInterface(InterfaceId),

    #[error(
        "cannot delete route {prefix} in vrf {vrf}: \
         clients still register next hops for it"
    )]
    RouteHasNextHops { vrf: RouterId, prefix: IpPrefix },

    #[error(
        "interfaces {first} and {second} both claim {prefix} in vrf {vrf}"
    )]
    DuplicateInterfacePrefix {
        vrf: RouterId,
        prefix: IpPrefix,
        first: InterfaceId,
        second: InterfaceId,
    },

    #[error("backend rejected programmed state: {0}")]
    Programming(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot decode error: {0}")]
    SnapshotDecode(String),

    #[error("update thread is gone")]
    UpdateThreadGone,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

/// Coarse classification used by the RPC boundary to pick a wire status.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorCategory {
    InvalidArgument,
    NotFound,
    Conflict,
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidInput(_)
            | Error::EmptyNextHops { .. }
            | Error::NoClientNextHops
            | Error::SnapshotDecode(_) => ErrorCategory::InvalidArgument,
            Error::NoRouteTable(_)
            | Error::NoRoute { .. }
            | Error::NoInterface(_) => ErrorCategory::NotFound,
            Error::RouteHasNextHops { .. }
            | Error::DuplicateInterfacePrefix { .. } => ErrorCategory::Conflict,
            Error::Programming(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::UpdateThreadGone
            | Error::Internal(_) => ErrorCategory::Internal,
        }
    }
}
