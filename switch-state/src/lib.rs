// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Versioned switch forwarding state and the route resolver.
//!
//! The crate is organized around an immutable, generationed state tree
//! ([state::SwitchState]) published by a serializing coordinator
//! ([switch::Switch]). Route registrations flow through the
//! [updater::RouteUpdater], which compiles per-client advertisements
//! into forwarding decisions by recursive longest-prefix-match
//! resolution. [delta::StateDelta] diffs two snapshots for consumers
//! that program hardware, and [warmboot] carries snapshots across agent
//! restarts.

pub mod acl;
pub mod config;
pub mod delta;
pub mod error;
pub mod interface;
pub mod map;
pub mod nexthop;
pub mod port;
pub mod rib;
pub mod route;
pub mod route_table;
pub mod state;
pub mod switch;
pub mod updater;
pub mod vlan;
pub mod warmboot;

pub use error::{Error, ErrorCategory};
pub use state::SwitchState;
pub use switch::Switch;
pub use updater::RouteUpdater;

use switch_types::ClientId;

/// Well-known route clients. Lower id wins when several clients
/// advertise the same prefix.
pub const CLIENT_BGP: ClientId = ClientId(0);
pub const CLIENT_STATIC: ClientId = ClientId(1);
pub const CLIENT_INTERFACE: ClientId = ClientId(2);

#[cfg(test)]
mod proptest;
