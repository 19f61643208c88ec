use crate::bus::{AddrBeat, AxiLink, ReadBeat, Resp, WriteResp};
use crate::memory::SparseMemory;
use tracing::{instrument, trace};

#[derive(Debug)]
struct Burst {
    addr: AddrBeat,
    beat: u32,
}

/// Split-transaction RAM responder standing in for the HPS side of an
/// FPGA-to-HPS bridge.
///
/// Write and read channels run independently. Each read beat waits `latency`
/// cycles before it is driven.
#[derive(Debug)]
pub struct AxiRam {
    name: String,
    bus_bytes: u32,
    latency: u32,
    mem: SparseMemory,
    write: Option<Burst>,
    pending_b: Option<WriteResp>,
    read: Option<Burst>,
    waited: u32,
}

impl AxiRam {
    pub fn new(name: impl Into<String>, data_width: u32, latency: u32) -> Self {
        Self {
            name: name.into(),
            bus_bytes: data_width / 8,
            latency,
            mem: SparseMemory::new(),
            write: None,
            pending_b: None,
            read: None,
            waited: 0,
        }
    }

    pub fn memory(&self) -> &SparseMemory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.mem
    }

    pub fn is_idle(&self) -> bool {
        self.write.is_none() && self.pending_b.is_none() && self.read.is_none()
    }

    fn lane_address(&self, addr: u64) -> u64 {
        addr & !u64::from(self.bus_bytes - 1)
    }

    #[instrument(level = "trace", skip(self, axi), fields(ram = %self.name))]
    pub fn tick(&mut self, axi: &mut AxiLink) {
        self.tick_write(axi);
        self.tick_read(axi);
    }

    fn tick_write(&mut self, axi: &mut AxiLink) {
        if let Some(b) = self.pending_b.take()
            && let Err(b) = axi.b.send(b)
        {
            self.pending_b = Some(b);
            return;
        }

        if self.write.is_none() {
            self.write = axi.aw.take().map(|addr| Burst { addr, beat: 0 });
        }
        let Some(burst) = self.write.as_mut() else {
            return;
        };
        let Some(w) = axi.w.take() else {
            return;
        };

        let addr = burst.addr.beat_address(burst.beat) & !u64::from(self.bus_bytes - 1);
        trace!("write {:#X} data={:#X} strb={:#X}", addr, w.data, w.strb);
        self.mem.write_word(addr, w.data, w.strb, self.bus_bytes);
        burst.beat += 1;
        if burst.beat == burst.addr.beats() {
            let b = WriteResp {
                id: burst.addr.id,
                resp: Resp::Okay,
            };
            self.write = None;
            if let Err(b) = axi.b.send(b) {
                self.pending_b = Some(b);
            }
        }
    }

    fn tick_read(&mut self, axi: &mut AxiLink) {
        if self.read.is_none() {
            self.read = axi.ar.take().map(|addr| Burst { addr, beat: 0 });
            self.waited = 0;
        }
        let Some(burst) = self.read.as_ref() else {
            return;
        };
        if self.waited < self.latency {
            self.waited += 1;
            return;
        }
        let addr = self.lane_address(burst.addr.beat_address(burst.beat));
        let beat = ReadBeat {
            id: burst.addr.id,
            data: self.mem.read_word(addr, self.bus_bytes),
            resp: Resp::Okay,
            last: burst.beat + 1 == burst.addr.beats(),
        };
        if axi.r.send(beat).is_err() {
            return;
        }
        trace!("read {:#X} data={:#X}", addr, beat.data);
        self.waited = 0;
        if beat.last {
            self.read = None;
        } else if let Some(burst) = self.read.as_mut() {
            burst.beat += 1;
        }
    }
}
