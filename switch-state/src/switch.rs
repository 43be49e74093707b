// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The serializing coordinator.
//!
//! A [Switch] owns the currently published snapshot and a dedicated
//! update thread. Mutators run as closures on that thread: each one
//! receives the snapshot current at its turn, builds a successor off the
//! write path, and the thread publishes the result atomically and in
//! submission order. Readers load the published snapshot at any time and
//! keep it valid for as long as they hold the `Arc`.
//!
//! A rejected update (resolver error, conflicting config) leaves the
//! published snapshot in force; the submitter gets the error back on the
//! blocking path.

use crate::config::{apply_config, SwitchConfig};
use crate::error::Error;
use crate::interface::InterfaceAddress;
use crate::route::Route;
use crate::route_table::RibAf;
use crate::state::SwitchState;
use crate::updater::RouteUpdater;
use serde::{Deserialize, Serialize};
use slog::{error, info, Logger};
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::{Arc, RwLock};
use std::thread;
use switch_common::{read_lock, write_lock};
use switch_types::{
    ClientId, InterfaceId, IpPrefix, MacAddress, NextHop, RouterId, VlanId,
};

/// Sent to watchers after every publication.
#[derive(Clone)]
pub struct StateChangeNotification {
    pub old: Arc<SwitchState>,
    pub new: Arc<SwitchState>,
}

#[derive(Clone)]
struct Watcher {
    tag: String,
    sender: Sender<StateChangeNotification>,
}

/// What the RPC surface reports about one interface.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InterfaceDetail {
    pub interface_name: String,
    pub interface_id: InterfaceId,
    pub vlan_id: VlanId,
    pub router_id: RouterId,
    pub mac: MacAddress,
    pub addresses: Vec<InterfaceAddress>,
}

type UpdateFn = Box<
    dyn FnOnce(&Arc<SwitchState>) -> Result<Option<Arc<SwitchState>>, Error>
        + Send,
>;

struct UpdateRequest {
    update: UpdateFn,
    done: Option<SyncSender<Result<Arc<SwitchState>, Error>>>,
}

#[derive(Clone)]
pub struct Switch {
    state: Arc<RwLock<Arc<SwitchState>>>,
    watchers: Arc<RwLock<Vec<Watcher>>>,
    tx: Sender<UpdateRequest>,
    log: Logger,
}

impl Switch {
    pub fn new(log: Logger) -> Self {
        Self::with_state(Arc::new(SwitchState::new()), log)
    }

    /// Start the coordinator from an existing snapshot (warm boot).
    pub fn with_state(initial: Arc<SwitchState>, log: Logger) -> Self {
        let (tx, rx) = mpsc::channel::<UpdateRequest>();
        let state = Arc::new(RwLock::new(initial));
        let watchers: Arc<RwLock<Vec<Watcher>>> =
            Arc::new(RwLock::new(Vec::new()));

        {
            let state = state.clone();
            let watchers = watchers.clone();
            let log = log.clone();
            thread::spawn(move || {
                while let Ok(req) = rx.recv() {
                    let current = read_lock!(state).clone();
                    let reply = match (req.update)(&current) {
                        Ok(Some(next)) => {
                            if next.generation() <= current.generation() {
                                let e = Error::Internal(format!(
                                    "update produced generation {} from {}",
                                    next.generation(),
                                    current.generation(),
                                ));
                                error!(log, "{e}");
                                Err(e)
                            } else {
                                *write_lock!(state) = next.clone();
                                info!(
                                    log,
                                    "published state";
                                    "generation" => next.generation(),
                                );
                                notify(
                                    &watchers,
                                    &log,
                                    StateChangeNotification {
                                        old: current,
                                        new: next.clone(),
                                    },
                                );
                                Ok(next)
                            }
                        }
                        // No observable change; the current snapshot
                        // stands.
                        Ok(None) => Ok(current),
                        Err(e) => {
                            error!(log, "state update rejected: {e}");
                            Err(e)
                        }
                    };
                    if let Some(done) = req.done {
                        let _ = done.send(reply);
                    }
                }
            });
        }

        Self { state, watchers, tx, log }
    }

    /// The currently published snapshot.
    pub fn state(&self) -> Arc<SwitchState> {
        read_lock!(self.state).clone()
    }

    /// Register a publication watcher.
    pub fn watch(&self, tag: String, sender: Sender<StateChangeNotification>) {
        write_lock!(self.watchers).push(Watcher { tag, sender });
    }

    /// Queue an update without waiting for its outcome. Failures are
    /// logged by the update thread.
    pub fn update<F>(&self, update: F) -> Result<(), Error>
    where
        F: FnOnce(
                &Arc<SwitchState>,
            ) -> Result<Option<Arc<SwitchState>>, Error>
            + Send
            + 'static,
    {
        self.tx
            .send(UpdateRequest { update: Box::new(update), done: None })
            .map_err(|_| Error::UpdateThreadGone)
    }

    /// Queue an update and park until the update thread has processed
    /// it. Returns the snapshot in force afterwards.
    pub fn update_blocking<F>(&self, update: F) -> Result<Arc<SwitchState>, Error>
    where
        F: FnOnce(
                &Arc<SwitchState>,
            ) -> Result<Option<Arc<SwitchState>>, Error>
            + Send
            + 'static,
    {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.tx
            .send(UpdateRequest {
                update: Box::new(update),
                done: Some(done_tx),
            })
            .map_err(|_| Error::UpdateThreadGone)?;
        done_rx.recv().map_err(|_| Error::UpdateThreadGone)?
    }

    /// Apply a declarative configuration.
    pub fn apply_config(
        &self,
        config: &SwitchConfig,
    ) -> Result<Arc<SwitchState>, Error> {
        let config = config.clone();
        let log = self.log.clone();
        self.update_blocking(move |base| apply_config(base, &config, &log))
    }

    /// Register `client`'s next hops for a prefix in the default VRF.
    pub fn add_unicast_route(
        &self,
        client: ClientId,
        prefix: IpPrefix,
        next_hops: Vec<NextHop>,
    ) -> Result<(), Error> {
        let log = self.log.clone();
        self.update_blocking(move |base| {
            let mut updater =
                RouteUpdater::new(base.route_tables().clone(), log.clone());
            updater.add_route(
                RouterId::DEFAULT,
                prefix.network(),
                prefix.length(),
                client,
                next_hops.iter().copied().collect(),
            )?;
            with_route_tables(base, updater.update_done()?)
        })
        .map(|_| ())
    }

    /// Drop `client`'s contribution to a prefix in the default VRF.
    pub fn delete_unicast_route(
        &self,
        client: ClientId,
        prefix: IpPrefix,
    ) -> Result<(), Error> {
        let log = self.log.clone();
        self.update_blocking(move |base| {
            let mut updater =
                RouteUpdater::new(base.route_tables().clone(), log.clone());
            updater.del_nexthops_for_client(
                RouterId::DEFAULT,
                prefix.network(),
                prefix.length(),
                client,
            )?;
            with_route_tables(base, updater.update_done()?)
        })
        .map(|_| ())
    }

    /// Atomically replace the set of routes contributed by `client` in
    /// the default VRF. Other clients' contributions, connected routes
    /// and the link-local entries are untouched.
    pub fn sync_fib(
        &self,
        client: ClientId,
        routes: Vec<(IpPrefix, Vec<NextHop>)>,
    ) -> Result<(), Error> {
        let log = self.log.clone();
        self.update_blocking(move |base| {
            let mut updater =
                RouteUpdater::new(base.route_tables().clone(), log.clone());
            updater.remove_all_routes_for_client(RouterId::DEFAULT, client)?;
            for (prefix, next_hops) in &routes {
                updater.add_route(
                    RouterId::DEFAULT,
                    prefix.network(),
                    prefix.length(),
                    client,
                    next_hops.iter().copied().collect(),
                )?;
            }
            with_route_tables(base, updater.update_done()?)
        })
        .map(|_| ())
    }

    /// Undo the installation of one route entry after downstream
    /// programming failed for it.
    pub fn revert_new_route_entry<A: RibAf>(
        &self,
        vrf: RouterId,
        new_route: Arc<Route<A>>,
        old_route: Option<Arc<Route<A>>>,
    ) -> Result<Arc<SwitchState>, Error> {
        self.update_blocking(move |base| {
            base.revert_new_route_entry(vrf, &new_route, old_route)
                .map(Some)
        })
    }

    pub fn get_interface_detail(
        &self,
        interface: InterfaceId,
    ) -> Result<InterfaceDetail, Error> {
        let state = self.state();
        let intf = state
            .interfaces()
            .get(interface)
            .ok_or(Error::NoInterface(interface))?;
        Ok(InterfaceDetail {
            interface_name: intf.name.clone(),
            interface_id: intf.id,
            vlan_id: intf.vlan,
            router_id: intf.router_id,
            mac: intf.mac,
            addresses: intf.addresses.clone(),
        })
    }
}

fn with_route_tables(
    base: &Arc<SwitchState>,
    tables: Option<Arc<crate::route_table::RouteTableMap>>,
) -> Result<Option<Arc<SwitchState>>, Error> {
    Ok(tables.map(|t| {
        let mut next = base.clone_for_modify();
        next.reset_route_tables(t);
        Arc::new(next)
    }))
}

fn notify(
    watchers: &Arc<RwLock<Vec<Watcher>>>,
    log: &Logger,
    notification: StateChangeNotification,
) {
    let snapshot: Vec<_> = read_lock!(watchers).iter().cloned().collect();
    let mut dead = Vec::new();
    for Watcher { tag, sender } in &snapshot {
        if sender.send(notification.clone()).is_err() {
            error!(log, "watcher '{tag}' disconnected, removing");
            dead.push(tag.clone());
        }
    }
    if !dead.is_empty() {
        write_lock!(watchers).retain(|w| !dead.contains(&w.tag));
    }
}
