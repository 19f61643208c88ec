//! Bus port declarations
//!
//! A [`PortDescriptor`] is the only thing the fabric learns about the world
//! outside it: which protocol a port speaks, which side of the transaction it
//! is on, how wide it is and (for slaves) where it lives.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use socfab_hw::specs::bus;
use std::fmt;

/// Identifier of a declared port; arbitration ties break on this ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub u32);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bus protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Split-transaction burst bus (AXI)
    WideSplit,
    /// Split-transaction bus limited to single beats (AXI-Lite)
    WideSplitLite,
    /// Single-channel request/acknowledge bus (Wishbone)
    SimpleSync,
    /// Register-bank bus (CSR)
    RegisterBus,
}

impl Protocol {
    /// Separate address/data/response channels
    pub fn is_split(self) -> bool {
        matches!(self, Protocol::WideSplit | Protocol::WideSplitLite)
    }
}

/// Which end of a transaction the port sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Master,
    Slave,
}

/// Static declaration of a bus endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub id: PortId,
    pub name: String,
    pub protocol: Protocol,
    pub role: Role,
    /// Data path width in bits
    pub data_width: u32,
    /// Address width in bits
    pub address_width: u32,
    /// Slaves: window origin. Masters: origin subtracted from incoming addresses.
    #[serde(default)]
    pub base_address: Option<u64>,
    /// Slaves: window size in bytes
    #[serde(default)]
    pub size: Option<u64>,
}

impl PortDescriptor {
    pub fn master(
        id: u32,
        name: impl Into<String>,
        protocol: Protocol,
        data_width: u32,
        address_width: u32,
    ) -> Self {
        Self {
            id: PortId(id),
            name: name.into(),
            protocol,
            role: Role::Master,
            data_width,
            address_width,
            base_address: None,
            size: None,
        }
    }

    pub fn slave(
        id: u32,
        name: impl Into<String>,
        protocol: Protocol,
        data_width: u32,
        address_width: u32,
        base_address: u64,
        size: u64,
    ) -> Self {
        Self {
            id: PortId(id),
            name: name.into(),
            protocol,
            role: Role::Slave,
            data_width,
            address_width,
            base_address: Some(base_address),
            size: Some(size),
        }
    }

    /// Set the origin a master port subtracts from its addresses
    pub fn with_origin(mut self, origin: u64) -> Self {
        self.base_address = Some(origin);
        self
    }

    /// Bytes per data word
    pub fn word_bytes(&self) -> u64 {
        u64::from(self.data_width / 8)
    }

    /// Smallest window this port can decode: one data word
    pub fn natural_alignment(&self) -> u64 {
        self.word_bytes().max(1)
    }

    /// Largest window this port's address lines can reach, in bytes
    ///
    /// Split buses carry byte addresses; the simple and register buses carry
    /// word addresses.
    pub fn addressable_bytes(&self) -> u64 {
        let span_bits = if self.protocol.is_split() {
            self.address_width
        } else {
            self.address_width + self.word_bytes().trailing_zeros()
        };
        1u64.checked_shl(span_bits).unwrap_or(u64::MAX)
    }

    /// Check the declared widths against what the protocol allows
    pub fn validate(&self) -> Result<(), ConfigError> {
        let allowed: &[u32] = match self.protocol {
            Protocol::RegisterBus => &bus::CSR_DATA_WIDTHS,
            _ => &bus::PORT_DATA_WIDTHS,
        };
        if !allowed.contains(&self.data_width) {
            return Err(ConfigError::PortWidth {
                port: self.id,
                protocol: self.protocol,
                width: self.data_width,
            });
        }
        if self.role == Role::Slave
            && self.protocol != Protocol::RegisterBus
            && (self.base_address.is_none() || self.size.is_none())
        {
            return Err(ConfigError::MissingWindow { port: self.id });
        }
        Ok(())
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({:?} {:?}, {} bits)",
            self.id, self.name, self.protocol, self.role, self.data_width
        )
    }
}
