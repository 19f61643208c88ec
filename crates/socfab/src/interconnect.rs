//! Shared interconnect: routes simple-bus masters to slaves by address and
//! arbitrates round-robin per slave.

use crate::address_map::AddressMap;
use crate::bus::{SimpleLink, SimpleResponse};
use crate::port::PortId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Order in which requesting masters are scanned after the last grant
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum TieBreak {
    #[default]
    Ascending,
    Descending,
}

/// Ownership of one slave's channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    /// Request forwarded, waiting for the slave
    Granted(PortId),
    /// Slave answered, response registered for delivery
    Completing(PortId),
}

#[derive(Debug, Clone)]
pub struct ArbitrationSlot {
    pub slave: PortId,
    state: SlotState,
    owner: Option<usize>,
    response: Option<SimpleResponse>,
    /// Rank of the master granted last
    last_rank: Option<usize>,
}

impl ArbitrationSlot {
    fn new(slave: PortId) -> Self {
        Self {
            slave,
            state: SlotState::Idle,
            owner: None,
            response: None,
            last_rank: None,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }
}

/// A grant made this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub cycle: u64,
    pub slave: PortId,
    pub master: PortId,
}

pub struct SharedInterconnect {
    map: Arc<AddressMap>,
    masters: Vec<PortId>,
    /// Arbitration rank of each master link
    rank: Vec<usize>,
    slaves: Vec<PortId>,
    slots: Vec<ArbitrationSlot>,
    /// Master has a request forwarded to some slave
    in_service: Vec<bool>,
    decode_errors: u64,
}

impl SharedInterconnect {
    /// `masters` and `slaves` give the port behind each link index passed to
    /// [`tick`](Self::tick).
    pub fn new(
        map: Arc<AddressMap>,
        masters: Vec<PortId>,
        slaves: Vec<PortId>,
        tie_break: TieBreak,
    ) -> Self {
        let mut order: Vec<usize> = (0..masters.len()).collect();
        order.sort_by_key(|&m| masters[m]);
        if tie_break == TieBreak::Descending {
            order.reverse();
        }
        let mut rank = vec![0; masters.len()];
        for (r, &m) in order.iter().enumerate() {
            rank[m] = r;
        }

        Self {
            map,
            rank,
            in_service: vec![false; masters.len()],
            slots: slaves.iter().map(|&s| ArbitrationSlot::new(s)).collect(),
            masters,
            slaves,
            decode_errors: 0,
        }
    }

    pub fn masters(&self) -> &[PortId] {
        &self.masters
    }

    pub fn slaves(&self) -> &[PortId] {
        &self.slaves
    }

    pub fn slot(&self, slave: PortId) -> Option<&ArbitrationSlot> {
        self.slots.iter().find(|s| s.slave == slave)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| s.state == SlotState::Idle)
    }

    /// Advance one cycle. Returns the grants made.
    pub fn tick(
        &mut self,
        masters: &mut [SimpleLink],
        slaves: &mut [SimpleLink],
        cycle: u64,
    ) -> Vec<Grant> {
        let _span = tracing::error_span!("interconnect").entered();

        for (s, slot) in self.slots.iter_mut().enumerate() {
            match slot.state {
                SlotState::Idle => {}
                SlotState::Granted(master) => {
                    if let Some(resp) = slaves[s].complete() {
                        slot.state = SlotState::Completing(master);
                        slot.response = Some(resp);
                    }
                }
                SlotState::Completing(master) => {
                    if let (Some(m), Some(resp)) = (slot.owner.take(), slot.response.take()) {
                        let delivered = masters[m].acknowledge(resp);
                        debug_assert!(delivered, "{master} dropped its request mid-transaction");
                        if !delivered {
                            error!(slave = %slot.slave, %master, "acknowledge refused; response lost");
                        }
                        self.in_service[m] = false;
                    }
                    trace!(slave = %slot.slave, %master, "response delivered");
                    slot.state = SlotState::Idle;
                }
            }
        }

        // Decode every waiting request into per-slave candidate lists
        let mut candidates: Vec<Vec<usize>> = vec![Vec::new(); self.slots.len()];
        for (m, link) in masters.iter_mut().enumerate() {
            if self.in_service[m] {
                continue;
            }
            let Some(req) = link.awaiting_ack().copied() else {
                continue;
            };
            let target = self
                .map
                .decode(req.adr)
                .and_then(|owner| self.slaves.iter().position(|&s| s == owner));
            match target {
                Some(s) => candidates[s].push(m),
                None => {
                    warn!(
                        master = %self.masters[m],
                        "No slave decodes {:#X}; answering with error",
                        req.adr
                    );
                    self.decode_errors += 1;
                    let answered = link.acknowledge(SimpleResponse::error());
                    debug_assert!(answered);
                }
            }
        }

        let mut grants = Vec::new();
        for (s, slot) in self.slots.iter_mut().enumerate() {
            if slot.state != SlotState::Idle || candidates[s].is_empty() {
                continue;
            }
            let Some(m) = pick(&candidates[s], &self.rank, slot.last_rank) else {
                continue;
            };
            let Some(req) = masters[m].awaiting_ack().copied() else {
                continue;
            };
            if !slaves[s].issue(req) {
                continue;
            }
            let master = self.masters[m];
            slot.state = SlotState::Granted(master);
            slot.owner = Some(m);
            slot.last_rank = Some(self.rank[m]);
            self.in_service[m] = true;
            trace!(slave = %slot.slave, %master, adr = format_args!("{:#x}", req.adr), "grant");
            grants.push(Grant {
                cycle,
                slave: slot.slave,
                master,
            });
        }
        grants
    }
}

/// Round-robin choice: the first candidate ranked after `last`, wrapping
fn pick(candidates: &[usize], rank: &[usize], last: Option<usize>) -> Option<usize> {
    let after = |m: &&usize| last.is_none_or(|l| rank[**m] > l);
    candidates
        .iter()
        .filter(after)
        .min_by_key(|&&m| rank[m])
        .or_else(|| candidates.iter().min_by_key(|&&m| rank[m]))
        .copied()
}
