//! Simulated bus endpoints.
//!
//! Simple-bus slaves implement [`BusDevice`] and sit behind a [`DevicePort`],
//! which owns the handshake and the response latency. Split-transaction
//! slaves speak the channels directly (see [`axi_ram`]).

use crate::bus::{SimpleLink, SimpleResponse};
use crate::error::DeviceError;
use tracing::{instrument, trace, warn};

pub mod axi_ram;
pub mod csr_bank;
pub mod sram;

pub use axi_ram::AxiRam;
pub use csr_bank::CsrBankDevice;
pub use sram::Sram;

/// Word-level access to a simulated device. Offsets are relative to the
/// device's decode base and word aligned.
pub trait BusDevice: std::fmt::Debug {
    fn name(&self) -> &str;

    fn read(&mut self, offset: u64, sel: u16) -> Result<u128, DeviceError>;

    fn write(&mut self, offset: u64, data: u128, sel: u16) -> Result<(), DeviceError>;
}

/// Simple-bus slave wrapper around a device
#[derive(Debug)]
pub struct DevicePort {
    device: Box<dyn BusDevice>,
    base: u64,
    /// Cycles a request waits before it is acknowledged
    latency: u32,
    waited: u32,
    accesses: u64,
}

impl DevicePort {
    pub fn new(device: Box<dyn BusDevice>, base: u64, latency: u32) -> Self {
        Self {
            device,
            base,
            latency,
            waited: 0,
            accesses: 0,
        }
    }

    pub fn device(&self) -> &dyn BusDevice {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn BusDevice {
        self.device.as_mut()
    }

    /// Completed accesses
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    #[instrument(level = "trace", skip(self, link), fields(device = self.device.name()))]
    pub fn tick(&mut self, link: &mut SimpleLink) {
        let Some(req) = link.awaiting_ack().copied() else {
            return;
        };
        if self.waited < self.latency {
            self.waited += 1;
            return;
        }
        self.waited = 0;

        let offset = req.adr.wrapping_sub(self.base);
        let result = if req.we {
            trace!("write offset={:#X} data={:#X} sel={:#X}", offset, req.dat_w, req.sel);
            self.device.write(offset, req.dat_w, req.sel).map(|()| 0)
        } else {
            self.device.read(offset, req.sel)
        };
        let resp = match result {
            Ok(dat_r) => SimpleResponse::ack(dat_r),
            Err(e) => {
                warn!("{}: {}", self.device.name(), e);
                SimpleResponse::error()
            }
        };
        self.accesses += 1;
        link.acknowledge(resp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimpleRequest;

    #[test]
    fn latency_delays_acknowledge() {
        let mut port = DevicePort::new(Box::new(Sram::new("ram", 0x100, 4)), 0x1000, 3);
        let mut link = SimpleLink::new();
        link.issue(SimpleRequest::write(0x1004, 0xCAFE, 0xF));

        for _ in 0..3 {
            port.tick(&mut link);
            assert!(!link.has_response());
        }
        port.tick(&mut link);
        assert_eq!(link.complete(), Some(SimpleResponse::ack(0)));

        link.issue(SimpleRequest::read(0x1004, 0xF));
        for _ in 0..4 {
            port.tick(&mut link);
        }
        assert_eq!(link.complete(), Some(SimpleResponse::ack(0xCAFE)));
        assert_eq!(port.accesses(), 2);
    }

    #[test]
    fn device_errors_become_error_acknowledge() {
        let mut port = DevicePort::new(Box::new(Sram::new("ram", 0x100, 4)), 0x1000, 0);
        let mut link = SimpleLink::new();
        link.issue(SimpleRequest::read(0x1100, 0xF));
        port.tick(&mut link);
        assert_eq!(link.complete(), Some(SimpleResponse::error()));
    }
}
