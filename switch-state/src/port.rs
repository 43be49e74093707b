// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Physical and aggregated port nodes.

use crate::map::{NodeMap, StateNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use switch_types::{AggregatePortId, PortId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub name: String,
    /// Configured speed in Mb/s; 0 means unconfigured.
    pub speed_mbps: u32,
    pub enabled: bool,
    pub(crate) generation: u64,
}

impl Port {
    pub fn new(id: PortId, name: String) -> Self {
        Self { id, name, speed_mbps: 0, enabled: false, generation: 0 }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl StateNode for Port {
    type Id = PortId;

    fn id(&self) -> PortId {
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
            && self.name == other.name
            && self.speed_mbps == other.speed_mbps
            && self.enabled == other.enabled
    }
}

pub type PortMap = NodeMap<Port>;

/// A link-aggregation group over a set of member ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatePort {
    pub id: AggregatePortId,
    pub name: String,
    pub members: BTreeSet<PortId>,
    pub(crate) generation: u64,
}

impl AggregatePort {
    pub fn new(
        id: AggregatePortId,
        name: String,
        members: BTreeSet<PortId>,
    ) -> Self {
        Self { id, name, members, generation: 0 }
    }
}

impl StateNode for AggregatePort {
    type Id = AggregatePortId;

    fn id(&self) -> AggregatePortId {
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
            && self.name == other.name
            && self.members == other.members
    }
}

pub type AggregatePortMap = NodeMap<AggregatePort>;
