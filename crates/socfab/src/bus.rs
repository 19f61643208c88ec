//! Cycle-level bus signal models.
//!
//! Every run-time connection in the fabric is one of two link types:
//! - [`axi::AxiLink`]: five independent valid/ready channels
//! - [`simple::SimpleLink`]: one request held until acknowledged
//!
//! A [`Channel`] is a one-deep slot. A producer may only drive a beat into an
//! empty slot (valid); the consumer taking it is the ready/valid handshake.
//! A producer that finds the slot occupied is stalled for the cycle and
//! retries on the next one.
//!
//! Data words are carried in a `u128` with byte lane `n` in bits
//! `8n..8n+8`, which covers every data width up to 128 bits. Byte enables
//! are a `u16` with bit `n` selecting lane `n`.

pub mod axi;
pub mod simple;

pub use axi::{AddrBeat, AxiLink, Burst, ReadBeat, Resp, WriteBeat, WriteResp};
pub use simple::{SimpleLink, SimpleRequest, SimpleResponse};

/// One-deep valid/ready channel
#[derive(Debug, Clone)]
pub struct Channel<T> {
    slot: Option<T>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A beat is being driven
    pub fn is_valid(&self) -> bool {
        self.slot.is_some()
    }

    /// The consumer can accept a new beat
    pub fn is_ready(&self) -> bool {
        self.slot.is_none()
    }

    /// Drive a beat. Hands the beat back if the channel is stalled.
    pub fn send(&mut self, beat: T) -> Result<(), T> {
        if self.slot.is_some() {
            return Err(beat);
        }
        self.slot = Some(beat);
        Ok(())
    }

    pub fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    /// Complete the handshake and consume the beat
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }
}

/// Read byte lane `lane` of a data word
pub fn lane(data: u128, lane: u32) -> u8 {
    (data >> (lane * 8)) as u8
}

/// Replace byte lane `lane` of a data word
pub fn set_lane(data: &mut u128, lane: u32, byte: u8) {
    let shift = lane * 8;
    *data = (*data & !(0xFFu128 << shift)) | (u128::from(byte) << shift);
}

/// Byte enables covering every lane of a `bytes`-wide bus
pub fn full_strobe(bytes: u32) -> u16 {
    if bytes >= 16 {
        u16::MAX
    } else {
        (1u16 << bytes) - 1
    }
}

/// Keep only the bytes of `bytes`-wide data
pub fn mask_data(data: u128, bytes: u32) -> u128 {
    if bytes >= 16 {
        data
    } else {
        data & ((1u128 << (bytes * 8)) - 1)
    }
}
