// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::map::{NodeMap, StateNode};
use serde::{Deserialize, Serialize};
use switch_types::VlanId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vlan {
    pub id: VlanId,
    pub name: String,
    pub(crate) generation: u64,
}

impl Vlan {
    pub fn new(id: VlanId, name: String) -> Self {
        Self { id, name, generation: 0 }
    }
}

impl StateNode for Vlan {
    type Id = VlanId;

    fn id(&self) -> VlanId {
        self.id
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    fn same_as(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

pub type VlanMap = NodeMap<Vlan>;
