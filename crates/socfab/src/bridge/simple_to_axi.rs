//! Simple fabric slave port onto a split-transaction slave.

use super::BridgeSpec;
use crate::bus::{
    lane, set_lane, AddrBeat, AxiLink, Resp, SimpleLink, SimpleRequest, SimpleResponse,
    WriteBeat,
};
use crate::error::{FaultKind, ProtocolFault};
use crate::port::PortId;
use std::collections::VecDeque;
use tracing::{debug, error, instrument};

#[derive(Debug)]
struct Outbound {
    write: bool,
    addr: AddrBeat,
    addr_sent: bool,
    /// Write beats not yet accepted
    beats: VecDeque<WriteBeat>,
    /// (beat, split lane, simple lane) for each byte of the simple word
    lanes: Vec<(u32, u32, u32)>,
    received: u32,
    data: u128,
    resp: Resp,
}

/// Turns each simple-bus word transaction into one incrementing
/// full-width burst covering the bytes it translates to.
#[derive(Debug)]
pub struct SimpleToAxi {
    port: PortId,
    spec: BridgeSpec,
    /// Base of the window this bridge decodes on the fabric
    window_base: u64,
    next_id: u32,
    active: Option<Outbound>,
    halted: bool,
}

impl SimpleToAxi {
    pub fn new(port: PortId, spec: BridgeSpec, window_base: u64) -> Self {
        Self {
            port,
            spec,
            window_base,
            next_id: 0,
            active: None,
            halted: false,
        }
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Advance one cycle.
    ///
    /// A halted bridge answers every request with an error acknowledge so the
    /// masters behind it are not left waiting.
    #[instrument(level = "trace", skip(self, simple, axi), fields(port = %self.port))]
    pub fn tick(
        &mut self,
        simple: &mut SimpleLink,
        axi: &mut AxiLink,
        cycle: u64,
    ) -> Result<(), ProtocolFault> {
        if self.halted {
            if simple.awaiting_ack().is_some() {
                simple.acknowledge(SimpleResponse::error());
            }
            return Ok(());
        }

        if let Some(channel) = self.unexpected_response(axi) {
            return Err(self.fault(FaultKind::UnexpectedResponse { channel }, cycle, simple));
        }

        if self.active.is_none()
            && let Some(req) = simple.awaiting_ack().copied()
        {
            self.active = Some(self.plan(req));
        }
        let Some(out) = self.active.as_mut() else {
            return Ok(());
        };

        if !out.addr_sent {
            let channel = if out.write { &mut axi.aw } else { &mut axi.ar };
            out.addr_sent = channel.send(out.addr).is_ok();
        }

        if out.write {
            if let Some(beat) = out.beats.front().copied()
                && axi.w.send(beat).is_ok()
            {
                out.beats.pop_front();
            }
            if out.addr_sent
                && out.beats.is_empty()
                && let Some(b) = axi.b.take()
            {
                let err = !b.resp.is_ok();
                simple.acknowledge(SimpleResponse { dat_r: 0, err });
                self.active = None;
            }
            return Ok(());
        }

        if !out.addr_sent {
            return Ok(());
        }
        let Some(r) = axi.r.take() else {
            return Ok(());
        };
        let beat = out.received;
        out.received += 1;
        let expected = out.addr.beats();
        let final_beat = out.received == expected;
        if out.received > expected || r.last != final_beat {
            let kind = FaultKind::ReadLength {
                received: out.received,
                beats: expected,
            };
            return Err(self.fault(kind, cycle, simple));
        }
        out.resp = out.resp.merge(r.resp);
        for &(_, split_lane, simple_lane) in out.lanes.iter().filter(|(b, _, _)| *b == beat) {
            set_lane(&mut out.data, simple_lane, lane(r.data, split_lane));
        }
        if final_beat {
            let resp = SimpleResponse {
                dat_r: out.data,
                err: !out.resp.is_ok(),
            };
            simple.acknowledge(resp);
            self.active = None;
        }
        Ok(())
    }

    fn unexpected_response(&self, axi: &AxiLink) -> Option<&'static str> {
        let (expect_b, expect_r) = match &self.active {
            Some(out) if out.write => (out.addr_sent && out.beats.is_empty(), false),
            Some(out) => (false, out.addr_sent),
            None => (false, false),
        };
        if axi.b.is_valid() && !expect_b {
            Some("write")
        } else if axi.r.is_valid() && !expect_r {
            Some("read")
        } else {
            None
        }
    }

    fn plan(&mut self, req: SimpleRequest) -> Outbound {
        let split_bytes = self.spec.split_bytes();
        let simple_bytes = self.spec.simple_bytes();
        let start = self.spec.translate(req.adr.wrapping_sub(self.window_base));
        let first = start & !(split_bytes - 1);
        let last = start.wrapping_add(simple_bytes - 1) & !(split_bytes - 1);
        let beats = (last.wrapping_sub(first) / split_bytes + 1) as u32;

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let addr = AddrBeat::incr(id, first, split_bytes.trailing_zeros() as u8, beats);

        let lanes: Vec<(u32, u32, u32)> = (0..simple_bytes)
            .map(|j| {
                let offset = start.wrapping_add(j).wrapping_sub(first);
                (
                    (offset / split_bytes) as u32,
                    (offset % split_bytes) as u32,
                    j as u32,
                )
            })
            .collect();

        let mut write_beats: Vec<WriteBeat> = Vec::new();
        if req.we {
            write_beats = (0..beats)
                .map(|beat| WriteBeat {
                    data: 0,
                    strb: 0,
                    last: beat + 1 == beats,
                })
                .collect();
            for &(beat, split_lane, simple_lane) in &lanes {
                if req.sel & (1 << simple_lane) != 0 {
                    let w = &mut write_beats[beat as usize];
                    set_lane(&mut w.data, split_lane, lane(req.dat_w, simple_lane));
                    w.strb |= 1 << split_lane;
                }
            }
        }

        debug!(
            we = req.we,
            adr = format_args!("{:#x}", req.adr),
            addr = format_args!("{:#x}", first),
            beats,
            "outbound burst"
        );
        Outbound {
            write: req.we,
            addr,
            addr_sent: false,
            beats: write_beats.into(),
            lanes,
            received: 0,
            data: 0,
            resp: Resp::Okay,
        }
    }

    fn fault(&mut self, kind: FaultKind, cycle: u64, simple: &mut SimpleLink) -> ProtocolFault {
        self.halted = true;
        self.active = None;
        if simple.awaiting_ack().is_some() {
            simple.acknowledge(SimpleResponse::error());
        }
        let fault = ProtocolFault {
            port: self.port,
            cycle,
            kind,
        };
        error!(port = %self.port, "{fault}; bridge halted");
        fault
    }
}
