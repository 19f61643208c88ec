//! Split-transaction (AXI) channel beats.

use super::Channel;
use serde::{Deserialize, Serialize};
use socfab_hw::specs::bus::MAX_BURST_BEATS;

/// Burst addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Burst {
    Fixed,
    Incr,
    Wrap,
}

/// Transfer response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resp {
    Okay,
    SlvErr,
    DecErr,
}

impl Resp {
    pub fn is_ok(self) -> bool {
        self == Resp::Okay
    }

    /// Keep the first error seen across the beats of a burst
    pub fn merge(self, other: Resp) -> Resp {
        if self.is_ok() { other } else { self }
    }
}

/// Address-phase beat (AW or AR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrBeat {
    /// Transaction identifier, passed through untouched
    pub id: u32,
    pub addr: u64,
    /// Beats in the burst minus one
    pub len: u8,
    /// log2 of the bytes moved per beat
    pub size: u8,
    pub burst: Burst,
}

impl AddrBeat {
    /// Incrementing burst of `beats` beats of `1 << size` bytes, clamped to
    /// 1..=256 beats
    pub fn incr(id: u32, addr: u64, size: u8, beats: u32) -> Self {
        Self {
            id,
            addr,
            len: (beats.clamp(1, MAX_BURST_BEATS) - 1) as u8,
            size,
            burst: Burst::Incr,
        }
    }

    /// Single beat of `1 << size` bytes
    pub fn single(id: u32, addr: u64, size: u8) -> Self {
        Self::incr(id, addr, size, 1)
    }

    pub fn beats(&self) -> u32 {
        u32::from(self.len) + 1
    }

    /// Bytes per beat; saturates for sizes no bus can carry
    pub fn beat_bytes(&self) -> u32 {
        1u32.checked_shl(u32::from(self.size)).unwrap_or(u32::MAX)
    }

    /// Address of beat `beat`, per the burst mode
    pub fn beat_address(&self, beat: u32) -> u64 {
        let bytes = u64::from(self.beat_bytes());
        let aligned = self.addr & !(bytes - 1);
        match self.burst {
            Burst::Fixed => self.addr,
            Burst::Incr => {
                if beat == 0 {
                    self.addr
                } else {
                    aligned.wrapping_add(u64::from(beat) * bytes)
                }
            }
            Burst::Wrap => {
                let wrap = bytes * u64::from(self.beats());
                let lower = aligned & !(wrap - 1);
                lower + ((aligned - lower) + u64::from(beat) * bytes) % wrap
            }
        }
    }
}

/// Write-data beat (W)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBeat {
    pub data: u128,
    pub strb: u16,
    pub last: bool,
}

/// Write-response beat (B)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResp {
    pub id: u32,
    pub resp: Resp,
}

/// Read-data beat (R)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBeat {
    pub id: u32,
    pub data: u128,
    pub resp: Resp,
    pub last: bool,
}

/// The five channels between one AXI master and one AXI slave
#[derive(Debug, Clone, Default)]
pub struct AxiLink {
    pub aw: Channel<AddrBeat>,
    pub w: Channel<WriteBeat>,
    pub b: Channel<WriteResp>,
    pub ar: Channel<AddrBeat>,
    pub r: Channel<ReadBeat>,
}

impl AxiLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// No beat is being driven on any channel
    pub fn is_quiet(&self) -> bool {
        !(self.aw.is_valid()
            || self.w.is_valid()
            || self.b.is_valid()
            || self.ar.is_valid()
            || self.r.is_valid())
    }
}
