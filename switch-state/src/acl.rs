// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::map::{NodeMap, StateNode};
use serde::{Deserialize, Serialize};
use switch_types::{AclEntryId, IpPrefix};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AclAction {
    Permit,
    Deny,
}

/// A packet classification entry. The match surface here is the subset
/// the state model carries; the hardware layer owns the full qualifier
/// set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclEntry {
    pub id: AclEntryId,
    pub action: AclAction,
    pub src_ip: Option<IpPrefix>,
    pub dst_ip: Option<IpPrefix>,
    pub(crate) generation: u64,
}

impl AclEntry {
    pub fn new(
        id: AclEntryId,
        action: AclAction,
        src_ip: Option<IpPrefix>,
        dst_ip: Option<IpPrefix>,
    ) -> Self {
        Self { id, action, src_ip, dst_ip, generation: 0 }
    }
}

impl StateNode for AclEntry {
    type Id = AclEntryId;

    fn id(&self) -> AclEntryId {
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
            && self.action == other.action
            && self.src_ip == other.src_ip
            && self.dst_ip == other.dst_ip
    }
}

pub type AclMap = NodeMap<AclEntry>;
