use anyhow::bail;

use crate::SwitchId;

/// A potential connection between two switches. The pair and its
/// bandwidth/delay come from the startup configuration and never
/// change; only `connected` varies over the run.
#[derive(Debug, Clone)]
pub struct Link {
    pub a: SwitchId,
    pub b: SwitchId,
    pub bandwidth: u64,
    pub delay: u64,
    pub connected: bool,
}

impl Link {
    fn joins(&self, a: SwitchId, b: SwitchId) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }

    fn other_end(&self, id: SwitchId) -> Option<SwitchId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

/// The static link graph. Each unordered pair is stored once, so the
/// connected flag is symmetric by construction.
#[derive(Debug, Clone)]
pub struct Topology {
    switch_count: u32,
    links: Vec<Link>,
}

impl Topology {
    pub fn new(switch_count: u32) -> Self {
        Self {
            switch_count,
            links: Vec::new(),
        }
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    /// Adds a link at startup. Links start out disconnected until the
    /// switches on both ends report each other live.
    pub fn set_link(&mut self, a: SwitchId, b: SwitchId, bandwidth: u64, delay: u64) -> anyhow::Result<()> {
        if a == b {
            bail!("link {}-{} is a self-loop", a, b);
        }
        for id in [a, b] {
            if id < 1 || id > self.switch_count {
                bail!("link {}-{} references switch {} outside 1..={}", a, b, id, self.switch_count);
            }
        }
        if self.link(a, b).is_some() {
            bail!("duplicate link {}-{}", a, b);
        }
        self.links.push(Link {
            a,
            b,
            bandwidth,
            delay,
            connected: false,
        });
        Ok(())
    }

    /// Flips the connected flag on an existing link. Idempotent.
    pub fn set_connected(&mut self, a: SwitchId, b: SwitchId, connected: bool) -> anyhow::Result<()> {
        match self.links.iter_mut().find(|link| link.joins(a, b)) {
            Some(link) => {
                link.connected = connected;
                Ok(())
            }
            None => bail!("no link between switches {} and {}", a, b),
        }
    }

    pub fn link(&self, a: SwitchId, b: SwitchId) -> Option<&Link> {
        self.links.iter().find(|link| link.joins(a, b))
    }

    pub fn is_connected(&self, a: SwitchId, b: SwitchId) -> bool {
        self.link(a, b).map(|link| link.connected).unwrap_or(false)
    }

    /// Every switch with a link to `id`, connected or not. Used for
    /// registration responses and for tearing down a dead switch.
    pub fn neighbors(&self, id: SwitchId) -> Vec<SwitchId> {
        self.links
            .iter()
            .filter_map(|link| link.other_end(id))
            .collect()
    }

    /// Only the neighbors reachable over a currently connected link.
    pub fn connected_neighbors(&self, id: SwitchId) -> Vec<SwitchId> {
        self.links
            .iter()
            .filter(|link| link.connected)
            .filter_map(|link| link.other_end(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Topology {
        let mut topology = Topology::new(3);
        topology.set_link(1, 2, 10, 1).unwrap();
        topology.set_link(2, 3, 5, 1).unwrap();
        topology.set_link(1, 3, 3, 1).unwrap();
        topology
    }

    #[test]
    fn connected_flag_is_symmetric() {
        let mut topology = triangle();
        topology.set_connected(2, 1, true).unwrap();
        assert!(topology.is_connected(1, 2));
        assert!(topology.is_connected(2, 1));

        topology.set_connected(1, 2, false).unwrap();
        assert!(!topology.is_connected(1, 2));
        assert!(!topology.is_connected(2, 1));
    }

    #[test]
    fn neighbors_ignore_connected_state() {
        let mut topology = triangle();
        let mut ids = topology.neighbors(1);
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);

        topology.set_connected(1, 2, true).unwrap();
        assert_eq!(topology.connected_neighbors(1), vec![2]);

        let mut ids = topology.neighbors(1);
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn set_link_rejects_bad_input() {
        let mut topology = Topology::new(3);
        assert!(topology.set_link(1, 1, 10, 1).is_err());
        assert!(topology.set_link(1, 4, 10, 1).is_err());
        assert!(topology.set_link(0, 2, 10, 1).is_err());
        topology.set_link(1, 2, 10, 1).unwrap();
        assert!(topology.set_link(2, 1, 8, 2).is_err());
    }

    #[test]
    fn set_connected_requires_existing_link() {
        let mut topology = Topology::new(3);
        topology.set_link(1, 2, 10, 1).unwrap();
        assert!(topology.set_connected(1, 3, true).is_err());
    }
}
