//! Scripted bus masters.
//!
//! Each master plays a queue of operations one at a time and records what
//! came back, so tests and the CLI smoke run can check the fabric end to end.

use crate::bus::{
    full_strobe, mask_data, AddrBeat, AxiLink, Burst, Resp, SimpleLink, SimpleRequest,
    SimpleResponse, WriteBeat,
};
use socfab_hw::specs::bus::MAX_BURST_BEATS;
use std::collections::VecDeque;
use tracing::{trace, warn};

/// One split-transaction operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxiOp {
    Write { aw: AddrBeat, beats: Vec<WriteBeat> },
    Read { ar: AddrBeat },
}

impl AxiOp {
    /// Incrementing write. `data` holds each beat's `1 << size` bytes
    /// unshifted; they are placed on the lanes the beat address selects.
    pub fn write(id: u32, addr: u64, size: u8, data: &[u128], bus_bytes: u32) -> Self {
        Self::write_burst(id, addr, size, Burst::Incr, data, bus_bytes)
    }

    pub fn write_burst(
        id: u32,
        addr: u64,
        size: u8,
        burst: Burst,
        data: &[u128],
        bus_bytes: u32,
    ) -> Self {
        if data.len() > MAX_BURST_BEATS as usize {
            warn!(
                "write burst of {} beats truncated to {}",
                data.len(),
                MAX_BURST_BEATS
            );
        }
        let data = &data[..data.len().min(MAX_BURST_BEATS as usize)];
        let aw = AddrBeat {
            burst,
            ..AddrBeat::incr(id, addr, size, data.len() as u32)
        };
        let bytes = aw.beat_bytes();
        let beats = data
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let base = beat_lane(&aw, i as u32, bus_bytes);
                WriteBeat {
                    data: mask_data(d, bytes) << (8 * base),
                    strb: full_strobe(bytes) << base,
                    last: i + 1 == data.len(),
                }
            })
            .collect();
        AxiOp::Write { aw, beats }
    }

    pub fn read(id: u32, addr: u64, size: u8, beats: u32) -> Self {
        AxiOp::Read {
            ar: AddrBeat::incr(id, addr, size, beats),
        }
    }

    pub fn read_burst(id: u32, addr: u64, size: u8, burst: Burst, beats: u32) -> Self {
        AxiOp::Read {
            ar: AddrBeat {
                burst,
                ..AddrBeat::incr(id, addr, size, beats)
            },
        }
    }
}

/// First data lane of beat `beat`
fn beat_lane(addr: &AddrBeat, beat: u32, bus_bytes: u32) -> u32 {
    let bytes = u64::from(addr.beat_bytes());
    ((addr.beat_address(beat) & !(bytes - 1)) % u64::from(bus_bytes)) as u32
}

/// Result of one split-transaction operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxiCompletion {
    Write {
        id: u32,
        resp: Resp,
        cycle: u64,
    },
    Read {
        id: u32,
        /// Each beat's bytes, shifted down from their lanes
        data: Vec<u128>,
        resp: Resp,
        cycle: u64,
    },
}

impl AxiCompletion {
    pub fn resp(&self) -> Resp {
        match self {
            AxiCompletion::Write { resp, .. } | AxiCompletion::Read { resp, .. } => *resp,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    op: AxiOp,
    addr_sent: bool,
    next_beat: usize,
    data: Vec<u128>,
    resp: Resp,
}

/// Scripted split-transaction master
#[derive(Debug, Default)]
pub struct AxiMaster {
    bus_bytes: u32,
    queue: VecDeque<AxiOp>,
    current: Option<InFlight>,
    completions: Vec<AxiCompletion>,
}

impl AxiMaster {
    pub fn new(data_width: u32) -> Self {
        Self {
            bus_bytes: data_width / 8,
            ..Self::default()
        }
    }

    pub fn push(&mut self, op: AxiOp) {
        self.queue.push_back(op);
    }

    pub fn completions(&self) -> &[AxiCompletion] {
        &self.completions
    }

    /// Queue empty and nothing outstanding
    pub fn is_done(&self) -> bool {
        self.queue.is_empty() && self.current.is_none()
    }

    pub fn tick(&mut self, axi: &mut AxiLink, cycle: u64) {
        if self.current.is_none() {
            self.current = self.queue.pop_front().map(|op| InFlight {
                op,
                addr_sent: false,
                next_beat: 0,
                data: Vec::new(),
                resp: Resp::Okay,
            });
        }
        let Some(cur) = self.current.as_mut() else {
            return;
        };

        let finished = match &cur.op {
            AxiOp::Write { aw, beats } => {
                if !cur.addr_sent {
                    cur.addr_sent = axi.aw.send(*aw).is_ok();
                }
                if let Some(beat) = beats.get(cur.next_beat)
                    && axi.w.send(*beat).is_ok()
                {
                    cur.next_beat += 1;
                }
                match axi.b.take() {
                    Some(b) if cur.addr_sent => Some(AxiCompletion::Write {
                        id: b.id,
                        resp: b.resp,
                        cycle,
                    }),
                    _ => None,
                }
            }
            AxiOp::Read { ar } => {
                if !cur.addr_sent {
                    cur.addr_sent = axi.ar.send(*ar).is_ok();
                }
                match axi.r.take() {
                    Some(r) if cur.addr_sent => {
                        let lane = beat_lane(ar, cur.data.len() as u32, self.bus_bytes);
                        cur.data.push(mask_data(r.data >> (8 * lane), ar.beat_bytes()));
                        cur.resp = cur.resp.merge(r.resp);
                        r.last.then(|| AxiCompletion::Read {
                            id: r.id,
                            data: std::mem::take(&mut cur.data),
                            resp: cur.resp,
                            cycle,
                        })
                    }
                    _ => None,
                }
            }
        };

        if let Some(done) = finished {
            trace!(?done, "axi op complete");
            self.completions.push(done);
            self.current = None;
        }
    }
}

/// Result of one simple-bus operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleCompletion {
    pub req: SimpleRequest,
    pub resp: SimpleResponse,
    pub cycle: u64,
}

/// Scripted simple-bus master
#[derive(Debug, Default)]
pub struct SimpleMaster {
    queue: VecDeque<SimpleRequest>,
    outstanding: Option<SimpleRequest>,
    completions: Vec<SimpleCompletion>,
}

impl SimpleMaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, req: SimpleRequest) {
        self.queue.push_back(req);
    }

    pub fn completions(&self) -> &[SimpleCompletion] {
        &self.completions
    }

    pub fn is_done(&self) -> bool {
        self.queue.is_empty() && self.outstanding.is_none()
    }

    pub fn tick(&mut self, link: &mut SimpleLink, cycle: u64) {
        if let Some(resp) = link.complete()
            && let Some(req) = self.outstanding.take()
        {
            self.completions.push(SimpleCompletion { req, resp, cycle });
        }
        if self.outstanding.is_none()
            && let Some(req) = self.queue.front().copied()
            && link.issue(req)
        {
            self.queue.pop_front();
            self.outstanding = Some(req);
        }
    }
}
