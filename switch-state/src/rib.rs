// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-family routing information base.
//!
//! An ordered map from prefix to route. Longest match probes the map
//! once per mask length from most to least specific; prefixes of equal
//! length cannot both contain the same address, so the first hit is the
//! answer.

use crate::route::Route;
use std::collections::BTreeMap;
use std::sync::Arc;
use switch_types::{Af, Prefix};

#[derive(Debug, Clone)]
pub struct Rib<A: Af> {
    routes: BTreeMap<Prefix<A>, Arc<Route<A>>>,
    generation: u64,
}

impl<A: Af> Default for Rib<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Af> Rib<A> {
    pub fn new() -> Self {
        Self { routes: BTreeMap::new(), generation: 0 }
    }

    pub(crate) fn from_parts(
        routes: BTreeMap<Prefix<A>, Arc<Route<A>>>,
        generation: u64,
    ) -> Self {
        Self { routes, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn exact_match(&self, prefix: &Prefix<A>) -> Option<&Arc<Route<A>>> {
        self.routes.get(prefix)
    }

    /// The route whose prefix contains `addr` with the largest mask.
    pub fn longest_match(&self, addr: A::Addr) -> Option<&Arc<Route<A>>> {
        longest_match_in(&self.routes, addr)
    }

    pub fn insert(&mut self, route: Arc<Route<A>>) {
        self.routes.insert(*route.prefix(), route);
    }

    pub fn erase(&mut self, prefix: &Prefix<A>) -> Option<Arc<Route<A>>> {
        self.routes.remove(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route<A>>> {
        self.routes.values()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<Prefix<A>, Arc<Route<A>>> {
        &self.routes
    }

    pub fn clone_for_modify(&self) -> Self {
        Self { routes: self.routes.clone(), generation: self.generation + 1 }
    }
}

/// Longest-prefix match over any prefix-keyed map of routes. The
/// updater runs this against its working maps, the published RIB against
/// its own.
pub(crate) fn longest_match_in<A: Af>(
    routes: &BTreeMap<Prefix<A>, Arc<Route<A>>>,
    addr: A::Addr,
) -> Option<&Arc<Route<A>>> {
    for length in (0..=A::WIDTH).rev() {
        let key = Prefix::<A>::new(addr, length);
        if let Some(route) = routes.get(&key) {
            return Some(route);
        }
    }
    None
}
