use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use crate::SwitchId;
use crate::config::TopologyConfig;
use crate::detector;
use crate::dispatch;
use crate::messages::{ControlMessage, SwitchStatus};
use crate::registry::SwitchRegistry;
use crate::routing;
use crate::topology::Topology;

/// Registry and topology live behind one lock: a registration racing a
/// liveness sweep must never observe half-applied state.
#[derive(Debug, Clone)]
pub struct State {
    pub registry: SwitchRegistry,
    pub topology: Topology,
}

impl State {
    pub fn from_config(config: &TopologyConfig) -> anyhow::Result<Self> {
        Ok(Self {
            registry: SwitchRegistry::new(config.switch_count),
            topology: config.build_topology()?,
        })
    }
}

pub struct Controller {
    pub(crate) socket: Arc<UdpSocket>,
    pub(crate) state: Arc<Mutex<State>>,
}

impl Controller {
    pub fn new(config: &TopologyConfig, socket: UdpSocket) -> anyhow::Result<Self> {
        Ok(Self {
            socket: Arc::new(socket),
            state: Arc::new(Mutex::new(State::from_config(config)?)),
        })
    }

    /// Serves forever: spawns the liveness sweeper, then feeds every
    /// inbound datagram through the protocol handler. Receive errors
    /// are logged and the loop keeps going.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!("controller listening on {}", self.socket.local_addr()?);

        tokio::spawn(detector::run(self.clone()));

        let mut buf = [0u8; 2048];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, addr)) => self.handle_datagram(&buf[..len], addr).await,
                Err(e) => {
                    error!("failed to receive datagram: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    pub async fn handle_datagram(&self, data: &[u8], addr: SocketAddr) {
        let message = match serde_json::from_slice::<ControlMessage>(data) {
            Ok(message) => message,
            Err(_) => {
                match serde_json::from_slice::<serde_json::Value>(data) {
                    Ok(value) => warn!(
                        "unhandled or malformed signal {:?} from {}",
                        value.get("signal").and_then(|s| s.as_str()),
                        addr
                    ),
                    Err(e) => warn!("undecodable datagram from {}: {}", addr, e),
                }
                return;
            }
        };

        match message {
            ControlMessage::RegisterRequest { id } => self.handle_register(id, addr).await,
            ControlMessage::TopologyReport { id, live_neighbors } => {
                self.handle_report(id, &live_neighbors).await
            }
            other => warn!("unexpected controller-bound message from {}: {:?}", addr, other),
        }
    }

    async fn handle_register(&self, id: SwitchId, addr: SocketAddr) {
        let (neighbors, all_active) = {
            let mut state = self.state.lock().await;
            if !state.registry.register(id, addr, Instant::now()) {
                warn!("REGISTER_REQUEST for unknown switch id {} from {}", id, addr);
                return;
            }
            info!("REGISTER_REQUEST: switch {} joins the network from {}", id, addr);
            (
                registration_snapshot(&state, id),
                state.registry.all_active(),
            )
        };

        info!("REGISTER_RESPONSE to switch {}", id);
        self.send(&ControlMessage::RegisterResponse { neighbors }, addr)
            .await;

        if all_active {
            info!("all switches registered; pushing initial routes");
            self.recompute_and_broadcast().await;
        }
    }

    async fn handle_report(&self, id: SwitchId, live_neighbors: &[SwitchId]) {
        let changed = {
            let mut state = self.state.lock().await;
            if id < 1 || id > state.topology.switch_count() {
                warn!("TOPOLOGY_UPDATE from unknown switch id {}", id);
                return;
            }
            match apply_report(&mut state, id, live_neighbors, Instant::now()) {
                Ok(changed) => changed,
                Err(e) => {
                    error!("failed to apply topology report from switch {}: {}", id, e);
                    return;
                }
            }
        };

        if changed {
            info!("TOPOLOGY_UPDATE from switch {} changed the link state", id);
            self.recompute_and_broadcast().await;
        }
    }

    /// Takes a consistent snapshot under the lock, computes the widest
    /// paths outside it, then fans the tables out and waits for the
    /// round to finish.
    pub async fn recompute_and_broadcast(&self) {
        let (topology, active, addresses) = {
            let state = self.state.lock().await;
            let active = state.registry.active_ids();
            let addresses: HashMap<SwitchId, SocketAddr> = active
                .iter()
                .filter_map(|&id| state.registry.address_of(id).map(|addr| (id, addr)))
                .collect();
            (state.topology.clone(), active, addresses)
        };

        debug!("recomputing routes for {} active switches", active.len());
        let pairs = routing::compute_pairs(&topology, &active);

        let updates: Vec<_> = active
            .iter()
            .filter_map(|&src| match addresses.get(&src) {
                Some(&addr) => Some((src, addr, dispatch::build_table(src, &active, &pairs))),
                None => {
                    error!("active switch {} has no registered address; skipping", src);
                    None
                }
            })
            .collect();

        dispatch::broadcast(&self.socket, updates).await;
    }

    async fn send(&self, message: &ControlMessage, addr: SocketAddr) {
        match serde_json::to_vec(message) {
            Ok(data) => {
                if let Err(e) = self.socket.send_to(&data, addr).await {
                    warn!("failed to send to {}: {}", addr, e);
                }
            }
            Err(e) => warn!("failed to encode message for {}: {}", addr, e),
        }
    }
}

/// Status of every structural neighbor of `id`, connected or not, so a
/// joining switch learns which peers it could reach once links come up.
pub fn registration_snapshot(state: &State, id: SwitchId) -> HashMap<SwitchId, SwitchStatus> {
    state
        .topology
        .neighbors(id)
        .into_iter()
        .filter_map(|neighbor| {
            state
                .registry
                .status_of(neighbor)
                .map(|status| (neighbor, status))
        })
        .collect()
}

/// Applies one TOPOLOGY_UPDATE: refresh the heartbeat, diff the
/// reported live set against the connected link state, and flip links
/// both ways. Returns whether anything changed; an identical repeat
/// report is a no-op and must not trigger a broadcast.
pub fn apply_report(
    state: &mut State,
    id: SwitchId,
    live_neighbors: &[SwitchId],
    now: Instant,
) -> anyhow::Result<bool> {
    state.registry.touch(id, now);

    let structural: HashSet<SwitchId> = state.topology.neighbors(id).into_iter().collect();
    let old: HashSet<SwitchId> = state.topology.connected_neighbors(id).into_iter().collect();

    let mut new = HashSet::new();
    for &neighbor in live_neighbors {
        if structural.contains(&neighbor) {
            new.insert(neighbor);
        } else {
            warn!(
                "switch {} reported {} as a live neighbor, but no such link exists",
                id, neighbor
            );
        }
    }

    if old == new {
        return Ok(false);
    }

    for &neighbor in new.difference(&old) {
        state.topology.set_connected(id, neighbor, true)?;
    }
    for &neighbor in old.difference(&new) {
        state.topology.set_connected(id, neighbor, false)?;
        info!("link {}-{} is down", id, neighbor);
    }

    Ok(true)
}
