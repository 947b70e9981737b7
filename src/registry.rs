use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::SwitchId;
use crate::messages::SwitchStatus;

#[derive(Debug, Clone, Default)]
struct SwitchEntry {
    active: bool,
    addr: Option<SocketAddr>,
    last_heartbeat: Option<Instant>,
}

/// Liveness and address bookkeeping for the fixed switch set. Ids are
/// permanent slots; a switch that dies keeps its slot and may
/// re-register later.
#[derive(Debug, Clone)]
pub struct SwitchRegistry {
    entries: Vec<SwitchEntry>,
}

impl SwitchRegistry {
    pub fn new(switch_count: u32) -> Self {
        Self {
            entries: vec![SwitchEntry::default(); switch_count as usize],
        }
    }

    pub fn switch_count(&self) -> u32 {
        self.entries.len() as u32
    }

    fn slot(&self, id: SwitchId) -> Option<&SwitchEntry> {
        id.checked_sub(1).and_then(|i| self.entries.get(i as usize))
    }

    fn slot_mut(&mut self, id: SwitchId) -> Option<&mut SwitchEntry> {
        id.checked_sub(1)
            .and_then(|i| self.entries.get_mut(i as usize))
    }

    /// Activates a switch and records where it can be reached. Returns
    /// false for an id outside the configured range.
    pub fn register(&mut self, id: SwitchId, addr: SocketAddr, now: Instant) -> bool {
        match self.slot_mut(id) {
            Some(entry) => {
                entry.active = true;
                entry.addr = Some(addr);
                entry.last_heartbeat = Some(now);
                true
            }
            None => false,
        }
    }

    /// Refreshes the heartbeat timestamp. Called on every valid
    /// topology report from the switch.
    pub fn touch(&mut self, id: SwitchId, now: Instant) {
        if let Some(entry) = self.slot_mut(id) {
            entry.last_heartbeat = Some(now);
        }
    }

    pub fn mark_dead(&mut self, id: SwitchId) {
        if let Some(entry) = self.slot_mut(id) {
            entry.active = false;
            entry.addr = None;
            entry.last_heartbeat = None;
        }
    }

    pub fn is_active(&self, id: SwitchId) -> bool {
        self.slot(id).map(|entry| entry.active).unwrap_or(false)
    }

    /// True once every configured switch has registered. Gates the
    /// first full broadcast after network bring-up.
    pub fn all_active(&self) -> bool {
        self.entries.iter().all(|entry| entry.active)
    }

    pub fn active_ids(&self) -> Vec<SwitchId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.active)
            .map(|(i, _)| i as SwitchId + 1)
            .collect()
    }

    pub fn address_of(&self, id: SwitchId) -> Option<SocketAddr> {
        self.slot(id).and_then(|entry| entry.addr)
    }

    pub fn status_of(&self, id: SwitchId) -> Option<SwitchStatus> {
        self.slot(id).map(|entry| SwitchStatus {
            active: entry.active,
            host: entry.addr.map(|addr| addr.ip().to_string()),
            port: entry.addr.map(|addr| addr.port()),
        })
    }

    /// Active switches whose last heartbeat is older than `timeout`.
    pub fn stale_ids(&self, now: Instant, timeout: Duration) -> Vec<SwitchId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.active
                    && entry
                        .last_heartbeat
                        .map(|hb| now.duration_since(hb) > timeout)
                        .unwrap_or(false)
            })
            .map(|(i, _)| i as SwitchId + 1)
            .collect()
    }
}
