use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use tokio::time::interval;

use crate::SwitchId;
use crate::controller::{Controller, State};

/// How often the liveness sweep runs (the switches' heartbeat period).
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// A switch is declared dead after this many missed heartbeats.
pub const MISS_MULTIPLIER: u32 = 3;

/// One liveness sweep: every active switch whose heartbeat is older
/// than `MISS_MULTIPLIER` periods is marked dead and all of its links
/// are disconnected, connected or not. Returns the ids that died.
pub fn sweep(state: &mut State, now: Instant) -> anyhow::Result<Vec<SwitchId>> {
    let timeout = HEARTBEAT_PERIOD * MISS_MULTIPLIER;
    let stale = state.registry.stale_ids(now, timeout);

    for &id in &stale {
        state.registry.mark_dead(id);
        for neighbor in state.topology.neighbors(id) {
            state.topology.set_connected(id, neighbor, false)?;
        }
        warn!("switch {} is down: no report for over {:?}", id, timeout);
    }

    Ok(stale)
}

/// Periodic sweep task. A tick that kills at least one switch triggers
/// exactly one recompute-and-broadcast over the shrunken active set;
/// a quiet tick does nothing.
pub async fn run(controller: Arc<Controller>) {
    let mut ticker = interval(HEARTBEAT_PERIOD);

    loop {
        ticker.tick().await;

        let swept = {
            let mut state = controller.state.lock().await;
            sweep(&mut state, Instant::now())
        };

        match swept {
            Ok(dead) if !dead.is_empty() => controller.recompute_and_broadcast().await,
            Ok(_) => debug!("liveness sweep: all switches ok"),
            Err(e) => error!("liveness sweep failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopologyConfig;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn triangle_state() -> State {
        let config = TopologyConfig::parse("3\n1 2 10 1\n2 3 5 1\n1 3 3 1\n").unwrap();
        State::from_config(&config).unwrap()
    }

    #[test]
    fn stale_switch_dies_and_links_drop() {
        let mut state = triangle_state();
        let start = Instant::now();
        for (id, port) in [(1, 9001), (2, 9002), (3, 9003)] {
            state.registry.register(id, addr(port), start);
        }
        state.topology.set_connected(1, 2, true).unwrap();
        state.topology.set_connected(2, 3, true).unwrap();

        // Only switch 2 goes quiet.
        let later = start + Duration::from_secs(16);
        state.registry.touch(1, later);
        state.registry.touch(3, later);

        let dead = sweep(&mut state, later).unwrap();
        assert_eq!(dead, vec![2]);
        assert!(!state.registry.is_active(2));
        assert!(!state.topology.is_connected(1, 2));
        assert!(!state.topology.is_connected(2, 3));
        assert_eq!(state.registry.active_ids(), vec![1, 3]);
    }

    #[test]
    fn dead_switch_is_not_swept_twice() {
        let mut state = triangle_state();
        let start = Instant::now();
        state.registry.register(2, addr(9002), start);

        let later = start + Duration::from_secs(16);
        assert_eq!(sweep(&mut state, later).unwrap(), vec![2]);
        assert!(sweep(&mut state, later).unwrap().is_empty());
    }

    #[test]
    fn fresh_heartbeats_survive_the_sweep() {
        let mut state = triangle_state();
        let start = Instant::now();
        for (id, port) in [(1, 9001), (2, 9002), (3, 9003)] {
            state.registry.register(id, addr(port), start);
        }

        // 15s is the boundary; only strictly-older heartbeats die.
        let boundary = start + Duration::from_secs(15);
        assert!(sweep(&mut state, boundary).unwrap().is_empty());
        assert_eq!(state.registry.active_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn routes_after_death_exclude_the_dead_switch() {
        let mut state = triangle_state();
        let start = Instant::now();
        for (id, port) in [(1, 9001), (2, 9002), (3, 9003)] {
            state.registry.register(id, addr(port), start);
        }
        state.topology.set_connected(1, 2, true).unwrap();
        state.topology.set_connected(2, 3, true).unwrap();
        state.topology.set_connected(1, 3, true).unwrap();

        let later = start + Duration::from_secs(16);
        state.registry.touch(1, later);
        state.registry.touch(3, later);
        sweep(&mut state, later).unwrap();

        let active = state.registry.active_ids();
        let pairs = crate::routing::compute_pairs(&state.topology, &active);
        let table = crate::dispatch::build_table(1, &active, &pairs);
        assert!(table.iter().all(|entry| entry.dest != 2));
        // 1-3 stays reachable over its direct link.
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].dest, 3);
        assert_eq!(table[0].next_hop, 3);
    }
}
