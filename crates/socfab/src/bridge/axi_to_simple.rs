//! Split-transaction master port into the simple fabric.

use super::{group_words, load_read, load_write, BridgeSpec, WordOp};
use crate::bus::{
    set_lane, lane, AddrBeat, AxiLink, Burst, ReadBeat, Resp, SimpleLink, SimpleResponse,
    WriteResp,
};
use crate::error::{FaultKind, ProtocolFault};
use crate::port::PortId;
use std::collections::VecDeque;
use tracing::{debug, error, instrument, trace};

/// One accepted burst
#[derive(Debug)]
struct Transfer {
    addr: AddrBeat,
    write: bool,
    /// Beats fully handled so far
    beat: u32,
    /// Words of the current beat still to issue
    words: VecDeque<WordOp>,
    /// Read beat being assembled
    data: u128,
    beat_resp: Resp,
    burst_resp: Resp,
}

/// Converts split-transaction bursts from one master into simple-bus word
/// transactions.
///
/// One burst is handled at a time, so responses leave in the order the
/// addresses were accepted. When write and read addresses are both waiting
/// the bridge alternates between them.
#[derive(Debug)]
pub struct AxiToSimple {
    port: PortId,
    spec: BridgeSpec,
    /// Subtracted from incoming addresses
    origin: u64,
    /// Single-beat port: `last` is implied and bursts are faults
    lite: bool,
    active: Option<Transfer>,
    inflight: Option<WordOp>,
    pending_b: Option<WriteResp>,
    pending_r: Option<ReadBeat>,
    prefer_read: bool,
    halted: bool,
}

impl AxiToSimple {
    pub fn new(port: PortId, spec: BridgeSpec, origin: u64) -> Self {
        Self {
            port,
            lite: spec.source_protocol == crate::port::Protocol::WideSplitLite,
            spec,
            origin,
            active: None,
            inflight: None,
            pending_b: None,
            pending_r: None,
            prefer_read: false,
            halted: false,
        }
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn spec(&self) -> &BridgeSpec {
        &self.spec
    }

    /// Master address that maps to fabric offset zero
    pub fn origin(&self) -> u64 {
        self.origin
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Nothing accepted and nothing owed to the master
    pub fn is_idle(&self) -> bool {
        self.active.is_none()
            && self.inflight.is_none()
            && self.pending_b.is_none()
            && self.pending_r.is_none()
    }

    /// Advance one cycle.
    ///
    /// Returns the fault that halted the bridge, the cycle it happens. A
    /// halted bridge only drains the simple-side acknowledge it was waiting
    /// for and otherwise ignores both links.
    #[instrument(level = "trace", skip(self, axi, simple), fields(port = %self.port))]
    pub fn tick(
        &mut self,
        axi: &mut AxiLink,
        simple: &mut SimpleLink,
        cycle: u64,
    ) -> Result<(), ProtocolFault> {
        if self.halted {
            if simple.complete().is_some() {
                self.inflight = None;
            }
            return Ok(());
        }

        self.flush_responses(axi);
        if let Some(resp) = simple.complete() {
            self.absorb(resp);
            self.flush_responses(axi);
        }

        if self.active.is_none() && self.pending_b.is_none() && self.pending_r.is_none() {
            self.accept_address(axi, cycle)?;
        }

        if self.inflight.is_none() {
            self.issue_next(axi, simple, cycle)?;
        }
        Ok(())
    }

    fn flush_responses(&mut self, axi: &mut AxiLink) {
        if let Some(b) = self.pending_b.take()
            && let Err(b) = axi.b.send(b)
        {
            self.pending_b = Some(b);
        }
        if let Some(r) = self.pending_r.take()
            && let Err(r) = axi.r.send(r)
        {
            self.pending_r = Some(r);
        }
    }

    fn accept_address(&mut self, axi: &mut AxiLink, cycle: u64) -> Result<(), ProtocolFault> {
        let take_read = if axi.aw.is_valid() && axi.ar.is_valid() {
            self.prefer_read
        } else {
            axi.ar.is_valid()
        };
        let addr = if take_read { axi.ar.take() } else { axi.aw.take() };
        let Some(addr) = addr else {
            return Ok(());
        };
        self.prefer_read = !take_read;

        if let Some(kind) = self.check_burst(&addr) {
            return Err(self.fault(kind, cycle));
        }

        let start = addr.addr.wrapping_sub(self.origin) & !(u64::from(addr.beat_bytes()) - 1);
        let target = self.spec.translate(start);
        debug!(
            write = !take_read,
            id = addr.id,
            addr = format_args!("{:#x}", addr.addr),
            target = format_args!("{:#x}", target),
            beats = addr.beats(),
            size = addr.beat_bytes(),
            "accepted burst"
        );
        self.active = Some(Transfer {
            addr,
            write: !take_read,
            beat: 0,
            words: VecDeque::new(),
            data: 0,
            beat_resp: Resp::Okay,
            burst_resp: Resp::Okay,
        });
        Ok(())
    }

    fn check_burst(&self, addr: &AddrBeat) -> Option<FaultKind> {
        let beats = addr.beats();
        let bus_bytes = self.spec.split_bytes() as u32;
        if self.lite && beats > 1 {
            Some(FaultKind::BurstOnLitePort { beats })
        } else if u32::from(addr.size) > bus_bytes.trailing_zeros() {
            Some(FaultKind::OversizedBeat {
                bytes: addr.beat_bytes(),
                bus_bytes,
            })
        } else if addr.burst == Burst::Wrap && !matches!(beats, 2 | 4 | 8 | 16) {
            Some(FaultKind::BadWrapLength { beats })
        } else {
            None
        }
    }

    fn issue_next(
        &mut self,
        axi: &mut AxiLink,
        simple: &mut SimpleLink,
        cycle: u64,
    ) -> Result<(), ProtocolFault> {
        let Some(transfer) = self.active.as_ref() else {
            return Ok(());
        };

        if transfer.words.is_empty() {
            let words = if transfer.write {
                let Some(beat) = axi.w.peek().copied() else {
                    return Ok(());
                };
                let beats = transfer.addr.beats();
                let last_expected = transfer.beat + 1 == beats;
                if !self.lite && beat.last && !last_expected {
                    let kind = FaultKind::EarlyLast {
                        beat: transfer.beat,
                        beats,
                    };
                    return Err(self.fault(kind, cycle));
                }
                if !self.lite && !beat.last && last_expected {
                    let kind = FaultKind::MissingLast {
                        beat: transfer.beat,
                    };
                    return Err(self.fault(kind, cycle));
                }
                axi.w.take();
                let mut words = self.plan_beat(transfer);
                for word in &mut words {
                    load_write(word, beat.data, beat.strb);
                }
                words
            } else {
                if self.pending_r.is_some() {
                    return Ok(());
                }
                let mut words = self.plan_beat(transfer);
                for word in &mut words {
                    load_read(word);
                }
                words
            };
            if let Some(transfer) = self.active.as_mut() {
                transfer.words = words.into();
            }
        }

        let Some(word) = self.active.as_mut().and_then(|t| t.words.pop_front()) else {
            return Ok(());
        };
        trace!(
            adr = format_args!("{:#x}", word.req.adr),
            we = word.req.we,
            sel = format_args!("{:#x}", word.req.sel),
            "simple request"
        );
        if !simple.issue(word.req) {
            trace!("simple link busy, request held");
            if let Some(transfer) = self.active.as_mut() {
                transfer.words.push_front(word);
            }
            return Ok(());
        }
        self.inflight = Some(word);
        Ok(())
    }

    /// Simple-bus words touched by the current beat of `transfer`
    fn plan_beat(&self, transfer: &Transfer) -> Vec<WordOp> {
        let bytes = u64::from(transfer.addr.beat_bytes());
        let beat_addr = transfer
            .addr
            .beat_address(transfer.beat)
            .wrapping_sub(self.origin)
            & !(bytes - 1);
        let lane_base = (beat_addr % self.spec.split_bytes()) as u32;
        let first = self.spec.translate(beat_addr);
        group_words(
            (0..bytes).map(|j| (first.wrapping_add(j), lane_base + j as u32)),
            self.spec.simple_bytes(),
        )
    }

    fn absorb(&mut self, resp: SimpleResponse) {
        let Some(word) = self.inflight.take() else {
            return;
        };
        let Some(transfer) = self.active.as_mut() else {
            return;
        };

        if resp.err {
            transfer.beat_resp = transfer.beat_resp.merge(Resp::SlvErr);
        }
        if !transfer.write {
            for &(simple_lane, split_lane) in &word.lanes {
                set_lane(&mut transfer.data, split_lane, lane(resp.dat_r, simple_lane));
            }
        }
        if !transfer.words.is_empty() {
            return;
        }

        // Beat finished
        let beats = transfer.addr.beats();
        let id = transfer.addr.id;
        transfer.burst_resp = transfer.burst_resp.merge(transfer.beat_resp);
        transfer.beat += 1;
        let done = transfer.beat == beats;
        if transfer.write {
            if done {
                self.pending_b = Some(WriteResp {
                    id,
                    resp: transfer.burst_resp,
                });
            }
        } else {
            self.pending_r = Some(ReadBeat {
                id,
                data: transfer.data,
                resp: transfer.beat_resp,
                last: done,
            });
            transfer.data = 0;
        }
        transfer.beat_resp = Resp::Okay;

        if done {
            trace!(id, "burst complete");
            self.active = None;
        }
    }

    fn fault(&mut self, kind: FaultKind, cycle: u64) -> ProtocolFault {
        self.halted = true;
        self.active = None;
        let fault = ProtocolFault {
            port: self.port,
            cycle,
            kind,
        };
        error!(port = %self.port, "{fault}; bridge halted");
        fault
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{SimpleRequest, WriteBeat};
    use crate::port::Protocol;

    fn bridge(source: u32, target: u32) -> AxiToSimple {
        let spec = BridgeSpec::new(Protocol::WideSplit, source, Protocol::SimpleSync, target)
            .unwrap();
        AxiToSimple::new(PortId(0), spec, 0)
    }

    /// Run the bridge against an always-ready simple slave, returning the
    /// requests it saw. Reads return the word address as data.
    fn drive(
        bridge: &mut AxiToSimple,
        axi: &mut AxiLink,
        w_beats: &mut VecDeque<WriteBeat>,
        cycles: u64,
    ) -> Vec<SimpleRequest> {
        let mut simple = SimpleLink::new();
        let mut seen = Vec::new();
        for cycle in 0..cycles {
            if let Some(beat) = w_beats.front().copied()
                && axi.w.send(beat).is_ok()
            {
                w_beats.pop_front();
            }
            bridge.tick(axi, &mut simple, cycle).unwrap();
            if let Some(req) = simple.awaiting_ack().copied() {
                seen.push(req);
                simple.acknowledge(SimpleResponse::ack(u128::from(req.adr)));
            }
        }
        seen
    }

    #[test]
    fn narrow_beats_land_on_consecutive_words() {
        let mut bridge = bridge(64, 32);
        let mut axi = AxiLink::new();
        axi.aw.send(AddrBeat::incr(3, 0x100, 2, 2)).unwrap();
        let mut beats = VecDeque::from(vec![
            WriteBeat {
                data: 0xD0D0_D0D0,
                strb: 0x0F,
                last: false,
            },
            WriteBeat {
                data: 0xD1D1_D1D1 << 32,
                strb: 0xF0,
                last: true,
            },
        ]);

        let seen = drive(&mut bridge, &mut axi, &mut beats, 20);
        assert_eq!(
            seen,
            vec![
                SimpleRequest::write(0x200, 0xD0D0_D0D0, 0xF),
                SimpleRequest::write(0x204, 0xD1D1_D1D1, 0xF),
            ]
        );
        assert_eq!(
            axi.b.take(),
            Some(WriteResp {
                id: 3,
                resp: Resp::Okay
            })
        );
        assert!(bridge.is_idle());
    }

    #[test]
    fn full_width_beat_splits_into_words() {
        let mut bridge = bridge(64, 32);
        let mut axi = AxiLink::new();
        axi.ar.send(AddrBeat::single(9, 0x100, 3)).unwrap();

        let seen = drive(&mut bridge, &mut axi, &mut VecDeque::new(), 20);
        let adrs: Vec<u64> = seen.iter().map(|r| r.adr).collect();
        assert_eq!(adrs, vec![0x200, 0x204]);
        assert!(seen.iter().all(|r| !r.we && r.sel == 0xF));

        let r = axi.r.take().unwrap();
        assert_eq!(r.id, 9);
        assert!(r.last);
        assert_eq!(r.data, (0x204u128 << 32) | 0x200);
    }

    #[test]
    fn read_data_waits_for_ready() {
        let mut bridge = bridge(32, 32);
        let mut axi = AxiLink::new();
        axi.ar.send(AddrBeat::incr(1, 0x40, 2, 3)).unwrap();
        let mut simple = SimpleLink::new();

        // Never drain R: only the first beat may leave, the rest are held
        let mut issued = 0;
        for cycle in 0..30 {
            bridge.tick(&mut axi, &mut simple, cycle).unwrap();
            if let Some(req) = simple.awaiting_ack().copied() {
                issued += 1;
                simple.acknowledge(SimpleResponse::ack(u128::from(req.adr)));
            }
        }
        assert_eq!(axi.r.peek().map(|r| r.data), Some(0x40));
        assert!(issued <= 2);

        let mut collected = Vec::new();
        for cycle in 30..60 {
            if let Some(r) = axi.r.take() {
                collected.push(r);
            }
            bridge.tick(&mut axi, &mut simple, cycle).unwrap();
            if let Some(req) = simple.awaiting_ack().copied() {
                simple.acknowledge(SimpleResponse::ack(u128::from(req.adr)));
            }
        }
        let data: Vec<u128> = collected.iter().map(|r| r.data).collect();
        assert_eq!(data, vec![0x40, 0x44, 0x48]);
        assert_eq!(collected.iter().filter(|r| r.last).count(), 1);
        assert!(collected[2].last);
    }

    #[test]
    fn busy_link_holds_the_request() {
        let mut bridge = bridge(32, 32);
        let mut axi = AxiLink::new();
        let mut simple = SimpleLink::new();
        simple.issue(SimpleRequest::read(0xFFF0, 0xF));
        axi.ar.send(AddrBeat::single(4, 0x20, 2)).unwrap();

        bridge.tick(&mut axi, &mut simple, 0).unwrap();
        assert_eq!(simple.request().map(|r| r.adr), Some(0xFFF0));
        assert!(!bridge.is_idle());

        // Once the link frees up the held word goes out
        simple.acknowledge(SimpleResponse::ack(0));
        bridge.tick(&mut axi, &mut simple, 1).unwrap();
        assert_eq!(simple.awaiting_ack().map(|r| r.adr), Some(0x20));
        simple.acknowledge(SimpleResponse::ack(0x1234));
        bridge.tick(&mut axi, &mut simple, 2).unwrap();
        let r = axi.r.take().unwrap();
        assert_eq!((r.id, r.data, r.last), (4, 0x1234, true));
    }

    #[test]
    fn oversized_beat_is_a_fault() {
        let mut huge = bridge(64, 32);
        let mut axi = AxiLink::new();
        let mut simple = SimpleLink::new();
        axi.ar.send(AddrBeat::single(0, 0x0, 40)).unwrap();
        assert_eq!(
            huge.tick(&mut axi, &mut simple, 3),
            Err(ProtocolFault {
                port: PortId(0),
                cycle: 3,
                kind: FaultKind::OversizedBeat {
                    bytes: u32::MAX,
                    bus_bytes: 8
                },
            })
        );
        assert!(huge.is_halted());

        let mut wide = bridge(64, 32);
        axi.aw.send(AddrBeat::single(0, 0x0, 4)).unwrap();
        assert!(matches!(
            wide.tick(&mut axi, &mut simple, 0),
            Err(ProtocolFault {
                kind: FaultKind::OversizedBeat {
                    bytes: 16,
                    bus_bytes: 8
                },
                ..
            })
        ));
    }

    #[test]
    fn early_last_halts_the_bridge() {
        let mut bridge = bridge(32, 32);
        let mut axi = AxiLink::new();
        let mut simple = SimpleLink::new();
        axi.aw.send(AddrBeat::incr(0, 0, 2, 4)).unwrap();
        axi.w
            .send(WriteBeat {
                data: 1,
                strb: 0xF,
                last: true,
            })
            .unwrap();

        let fault = bridge.tick(&mut axi, &mut simple, 0).unwrap_err();
        assert_eq!(fault.port, PortId(0));
        assert_eq!(fault.kind, FaultKind::EarlyLast { beat: 0, beats: 4 });
        assert!(bridge.is_halted());
        assert!(simple.is_idle());

        // Halted: further traffic is ignored
        bridge.tick(&mut axi, &mut simple, 1).unwrap();
        assert!(simple.is_idle());
    }

    #[test]
    fn missing_last_is_a_fault() {
        let mut bridge = bridge(32, 32);
        let mut axi = AxiLink::new();
        let mut simple = SimpleLink::new();
        axi.aw.send(AddrBeat::single(0, 0, 2)).unwrap();
        axi.w
            .send(WriteBeat {
                data: 1,
                strb: 0xF,
                last: false,
            })
            .unwrap();
        assert!(matches!(
            bridge.tick(&mut axi, &mut simple, 0),
            Err(ProtocolFault {
                kind: FaultKind::MissingLast { beat: 0 },
                ..
            })
        ));
    }

    #[test]
    fn lite_port_rejects_bursts() {
        let spec =
            BridgeSpec::new(Protocol::WideSplitLite, 32, Protocol::SimpleSync, 32).unwrap();
        let mut bridge = AxiToSimple::new(PortId(1), spec, 0xFF20_0000);
        let mut axi = AxiLink::new();
        let mut simple = SimpleLink::new();
        axi.ar.send(AddrBeat::incr(0, 0xFF20_0000, 2, 2)).unwrap();
        assert!(matches!(
            bridge.tick(&mut axi, &mut simple, 0),
            Err(ProtocolFault {
                kind: FaultKind::BurstOnLitePort { beats: 2 },
                ..
            })
        ));
    }

    #[test]
    fn lite_port_subtracts_origin() {
        let spec =
            BridgeSpec::new(Protocol::WideSplitLite, 32, Protocol::SimpleSync, 32).unwrap();
        let mut bridge = AxiToSimple::new(PortId(1), spec, 0xFF20_0000);
        let mut axi = AxiLink::new();
        axi.ar.send(AddrBeat::single(0, 0xFF20_0010, 2)).unwrap();
        let seen = drive(&mut bridge, &mut axi, &mut VecDeque::new(), 10);
        assert_eq!(seen, vec![SimpleRequest::read(0x10, 0xF)]);
    }

    #[test]
    fn error_acknowledge_becomes_slave_error() {
        let mut bridge = bridge(32, 32);
        let mut axi = AxiLink::new();
        let mut simple = SimpleLink::new();
        axi.aw.send(AddrBeat::single(5, 0x10, 2)).unwrap();
        axi.w
            .send(WriteBeat {
                data: 1,
                strb: 0xF,
                last: true,
            })
            .unwrap();
        for cycle in 0..10 {
            bridge.tick(&mut axi, &mut simple, cycle).unwrap();
            if simple.awaiting_ack().is_some() {
                simple.acknowledge(SimpleResponse::error());
            }
        }
        assert_eq!(
            axi.b.take(),
            Some(WriteResp {
                id: 5,
                resp: Resp::SlvErr
            })
        );
    }

    #[test]
    fn responses_follow_address_order() {
        let mut bridge = bridge(32, 32);
        let mut axi = AxiLink::new();
        let mut simple = SimpleLink::new();
        axi.aw.send(AddrBeat::single(1, 0x0, 2)).unwrap();
        axi.ar.send(AddrBeat::single(2, 0x4, 2)).unwrap();
        axi.w
            .send(WriteBeat {
                data: 0xAB,
                strb: 0xF,
                last: true,
            })
            .unwrap();

        let mut order = Vec::new();
        for cycle in 0..20 {
            bridge.tick(&mut axi, &mut simple, cycle).unwrap();
            if simple.awaiting_ack().is_some() {
                simple.acknowledge(SimpleResponse::ack(0));
            }
            if let Some(b) = axi.b.take() {
                order.push(b.id);
            }
            if let Some(r) = axi.r.take() {
                order.push(r.id);
            }
        }
        assert_eq!(order, vec![1, 2]);
    }
}
