use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::SwitchId;
use crate::topology::Topology;

/// Result of one routing run for an unordered pair of active switches.
/// Unreachable pairs are recorded explicitly so dispatch can tell
/// "no path" apart from a bookkeeping bug.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutePair {
    Path {
        bandwidth: u64,
        path: Vec<SwitchId>,
    },
    Unreachable,
}

#[derive(Debug)]
struct Candidate {
    bandwidth: u64,
    switch: SwitchId,
    path: Vec<SwitchId>,
}

impl Eq for Candidate {}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.bandwidth == other.bandwidth && self.switch == other.switch
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on bottleneck bandwidth; ties go to the lower id.
        self.bandwidth
            .cmp(&other.bandwidth)
            .then_with(|| other.switch.cmp(&self.switch))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Computes the widest (maximum bottleneck bandwidth) path for every
/// unordered pair of active switches, each pair recorded exactly once.
///
/// The search walks connected links only and never consults the
/// registry, so a switch that lost its controller session but still
/// has connected links keeps relaying traffic.
pub fn compute_pairs(
    topology: &Topology,
    active: &[SwitchId],
) -> HashMap<(SwitchId, SwitchId), RoutePair> {
    let mut sources: Vec<SwitchId> = active.to_vec();
    sources.sort_unstable();

    let active_set: HashSet<SwitchId> = sources.iter().copied().collect();
    let mut pairs = HashMap::new();

    for &src in &sources {
        widest_from(topology, src, &active_set, &mut pairs);
    }

    // Anything still missing has no connected path; record it so the
    // dispatcher can skip it knowingly.
    for (i, &u) in sources.iter().enumerate() {
        for &v in &sources[i + 1..] {
            if !pairs.contains_key(&(u, v)) && !pairs.contains_key(&(v, u)) {
                pairs.insert((u, v), RoutePair::Unreachable);
            }
        }
    }

    pairs
}

/// Best-first search from one source. A node's bottleneck and path are
/// final on its first pop because extending a path can only shrink the
/// minimum edge bandwidth along it.
fn widest_from(
    topology: &Topology,
    src: SwitchId,
    active: &HashSet<SwitchId>,
    pairs: &mut HashMap<(SwitchId, SwitchId), RoutePair>,
) {
    let mut heap = BinaryHeap::new();
    let mut seen: HashSet<SwitchId> = HashSet::new();

    heap.push(Candidate {
        bandwidth: u64::MAX,
        switch: src,
        path: Vec::new(),
    });

    while let Some(Candidate {
        bandwidth,
        switch,
        mut path,
    }) = heap.pop()
    {
        if !seen.insert(switch) {
            continue;
        }
        path.push(switch);

        if switch != src
            && active.contains(&switch)
            && !pairs.contains_key(&(src, switch))
            && !pairs.contains_key(&(switch, src))
        {
            pairs.insert(
                (src, switch),
                RoutePair::Path {
                    bandwidth,
                    path: path.clone(),
                },
            );
        }

        for neighbor in topology.connected_neighbors(switch) {
            if seen.contains(&neighbor) {
                continue;
            }
            if let Some(link) = topology.link(switch, neighbor) {
                heap.push(Candidate {
                    bandwidth: bandwidth.min(link.bandwidth),
                    switch: neighbor,
                    path: path.clone(),
                });
            }
        }
    }
}

/// Looks up the pair in whichever orientation it was recorded.
pub fn pair_for(
    pairs: &HashMap<(SwitchId, SwitchId), RoutePair>,
    src: SwitchId,
    dest: SwitchId,
) -> Option<(&RoutePair, bool)> {
    if let Some(pair) = pairs.get(&(src, dest)) {
        Some((pair, true))
    } else {
        pairs.get(&(dest, src)).map(|pair| (pair, false))
    }
}
