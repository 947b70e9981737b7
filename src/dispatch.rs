use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;

use crate::SwitchId;
use crate::messages::{ControlMessage, ForwardingEntry};
use crate::routing::{RoutePair, pair_for};

/// Cap on concurrent ROUTE_UPDATE sends within one broadcast round.
pub const NUM_SENDERS: usize = 4;

/// Builds one switch's forwarding table from the pairwise routing
/// results. Pairs recorded in the reverse orientation walk the path
/// from the far end, so the next hop is the second-to-last node.
pub fn build_table(
    src: SwitchId,
    active: &[SwitchId],
    pairs: &HashMap<(SwitchId, SwitchId), RoutePair>,
) -> Vec<ForwardingEntry> {
    let mut table = Vec::new();

    for &dest in active {
        if dest == src {
            continue;
        }
        let Some((pair, forward)) = pair_for(pairs, src, dest) else {
            error!(
                "routing result missing pair {}-{}; skipping destination",
                src, dest
            );
            continue;
        };
        match pair {
            RoutePair::Path { bandwidth, path } => {
                let next_hop = if forward {
                    path.get(1)
                } else {
                    path.len().checked_sub(2).and_then(|i| path.get(i))
                };
                match next_hop {
                    Some(&next_hop) => table.push(ForwardingEntry {
                        dest,
                        next_hop,
                        bandwidth: *bandwidth,
                    }),
                    None => error!(
                        "degenerate path {:?} for pair {}-{}; skipping destination",
                        path, src, dest
                    ),
                }
            }
            RoutePair::Unreachable => {
                debug!("switch {} has no path to {}; omitting entry", src, dest);
            }
        }
    }

    table
}

/// Pushes one ROUTE_UPDATE per active switch, at most `NUM_SENDERS`
/// in flight at a time. Individual send failures are logged and do
/// not disturb the rest of the round; the caller gets control back
/// once every send has finished.
pub async fn broadcast(
    socket: &Arc<UdpSocket>,
    updates: Vec<(SwitchId, SocketAddr, Vec<ForwardingEntry>)>,
) {
    let semaphore = Arc::new(Semaphore::new(NUM_SENDERS));
    let mut tasks = Vec::with_capacity(updates.len());

    for (id, addr, table) in updates {
        let semaphore = semaphore.clone();
        let socket = socket.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let message = ControlMessage::RouteUpdate { table };
            match serde_json::to_vec(&message) {
                Ok(data) => match socket.send_to(&data, addr).await {
                    Ok(_) => info!("ROUTE_UPDATE to switch {} at {}", id, addr),
                    Err(e) => warn!("failed to send ROUTE_UPDATE to switch {}: {}", id, e),
                },
                Err(e) => warn!("failed to encode ROUTE_UPDATE for switch {}: {}", id, e),
            }
        }));
    }

    futures::future::join_all(tasks).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs_fixture() -> HashMap<(SwitchId, SwitchId), RoutePair> {
        let mut pairs = HashMap::new();
        pairs.insert(
            (1, 3),
            RoutePair::Path {
                bandwidth: 5,
                path: vec![1, 2, 3],
            },
        );
        pairs.insert(
            (1, 2),
            RoutePair::Path {
                bandwidth: 10,
                path: vec![1, 2],
            },
        );
        pairs.insert((2, 3), RoutePair::Unreachable);
        pairs
    }

    #[test]
    fn forward_pair_uses_second_node_as_next_hop() {
        let table = build_table(1, &[1, 2, 3], &pairs_fixture());
        assert!(table.contains(&ForwardingEntry {
            dest: 3,
            next_hop: 2,
            bandwidth: 5,
        }));
    }

    #[test]
    fn reverse_pair_uses_second_to_last_node() {
        // Pair (1, 3) was computed from 1; switch 3's next hop toward
        // 1 is read off the far end of the same path.
        let table = build_table(3, &[1, 2, 3], &pairs_fixture());
        assert_eq!(
            table,
            vec![ForwardingEntry {
                dest: 1,
                next_hop: 2,
                bandwidth: 5,
            }]
        );
    }

    #[test]
    fn unreachable_destination_is_omitted() {
        let table = build_table(2, &[1, 2, 3], &pairs_fixture());
        assert_eq!(
            table,
            vec![ForwardingEntry {
                dest: 1,
                next_hop: 1,
                bandwidth: 10,
            }]
        );
        assert!(table.iter().all(|entry| entry.dest != 3));
    }

    #[test]
    fn missing_pair_is_skipped_not_fatal() {
        let mut pairs = pairs_fixture();
        pairs.remove(&(1, 2));
        let table = build_table(1, &[1, 2, 3], &pairs);
        assert_eq!(
            table,
            vec![ForwardingEntry {
                dest: 3,
                next_hop: 2,
                bandwidth: 5,
            }]
        );
    }
}
