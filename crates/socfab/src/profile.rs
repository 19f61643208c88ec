//! Platform profiles.
//!
//! A profile names the bridge width variant of the hard processor system and
//! the set of optional peripherals a board wires up. Builders query the set
//! with [`PlatformProfile::require`] instead of probing for pins.

use crate::error::ConfigError;
use crate::port::{PortDescriptor, Protocol};
use serde::{Deserialize, Serialize};
use socfab_hw::memory_map::{csr, f2h, fabric, h2f};
use socfab_hw::specs::variants;
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

/// Optional HPS peripherals a board may route to pins
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Peripheral {
    Usb,
    SdCard,
    Spi,
    Uart,
    I2c0,
    I2c1,
    Ethernet,
    QspiFlash,
}

impl fmt::Display for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Peripherals every Cyclone V board routes
pub const BASE_PERIPHERALS: [Peripheral; 6] = [
    Peripheral::Usb,
    Peripheral::SdCard,
    Peripheral::Spi,
    Peripheral::Uart,
    Peripheral::I2c0,
    Peripheral::I2c1,
];

/// Port ids used by [`PlatformProfile::default_ports`]
pub mod ports {
    pub const H2F_AXI: u32 = 0;
    pub const H2F_LW: u32 = 1;
    pub const F2H_AXI: u32 = 2;
    pub const F2H_SDRAM: u32 = 3;
    pub const SRAM: u32 = 4;
    pub const CSR: u32 = 5;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub name: String,
    pub variant: String,
    /// HPS-to-FPGA AXI data width
    pub h2f_width: u32,
    /// FPGA-to-HPS AXI data width
    pub f2h_width: u32,
    peripherals: BTreeSet<Peripheral>,
}

impl PlatformProfile {
    /// Cyclone V HPS with the widths of `variant` and the base peripherals
    pub fn cyclone_v(variant: &str) -> Result<Self, ConfigError> {
        let (h2f_width, f2h_width) = variants::lookup(variant)
            .ok_or_else(|| ConfigError::UnknownVariant(variant.to_string()))?;
        Ok(Self {
            name: "cyclone_v".to_string(),
            variant: variant.to_string(),
            h2f_width,
            f2h_width,
            peripherals: BASE_PERIPHERALS.into_iter().collect(),
        })
    }

    pub fn with_peripheral(mut self, peripheral: Peripheral) -> Self {
        self.peripherals.insert(peripheral);
        self
    }

    pub fn without_peripheral(mut self, peripheral: Peripheral) -> Self {
        self.peripherals.remove(&peripheral);
        self
    }

    pub fn has(&self, peripheral: Peripheral) -> bool {
        self.peripherals.contains(&peripheral)
    }

    pub fn peripherals(&self) -> impl Iterator<Item = Peripheral> + '_ {
        self.peripherals.iter().copied()
    }

    /// Fail the build unless the board provides `peripheral`
    pub fn require(&self, peripheral: Peripheral) -> Result<(), ConfigError> {
        if self.has(peripheral) {
            return Ok(());
        }
        Err(ConfigError::MissingPeripheral {
            profile: format!("{}/{}", self.name, self.variant),
            peripheral: peripheral.to_string(),
        })
    }

    /// The HPS bridges, an on-chip SRAM and the CSR bus
    pub fn default_ports(&self) -> Vec<PortDescriptor> {
        info!(
            "Profile {}/{}: h2f {} bits, f2h {} bits",
            self.name, self.variant, self.h2f_width, self.f2h_width
        );
        let csr_bus = PortDescriptor {
            base_address: None,
            size: None,
            ..PortDescriptor::slave(
                ports::CSR,
                "csr",
                Protocol::RegisterBus,
                csr::DATA_WIDTH,
                14,
                csr::ORIGIN,
                0,
            )
        };
        vec![
            PortDescriptor::master(
                ports::H2F_AXI,
                "h2f_axi",
                Protocol::WideSplit,
                self.h2f_width,
                h2f::axi::ADDRESS_WIDTH,
            ),
            PortDescriptor::master(
                ports::H2F_LW,
                "h2f_lw",
                Protocol::WideSplitLite,
                h2f::lw::DATA_WIDTH,
                h2f::lw::ADDRESS_WIDTH,
            ),
            PortDescriptor::slave(
                ports::F2H_AXI,
                "f2h_axi",
                Protocol::WideSplit,
                self.f2h_width,
                f2h::axi::ADDRESS_WIDTH,
                f2h::axi::BASE,
                f2h::axi::SIZE,
            ),
            PortDescriptor::slave(
                ports::F2H_SDRAM,
                "f2h_sdram",
                Protocol::WideSplit,
                self.f2h_width,
                f2h::sdram::ADDRESS_WIDTH,
                f2h::sdram::BASE,
                f2h::sdram::SIZE,
            ),
            PortDescriptor::slave(
                ports::SRAM,
                "sram",
                Protocol::SimpleSync,
                32,
                30,
                fabric::sram::BASE,
                fabric::sram::SIZE,
            ),
            csr_bus,
        ]
    }
}
