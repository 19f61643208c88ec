//! Register bank allocation.
//!
//! Every bank gets one window of `granularity` bytes at
//! `origin + granularity * index`. Indices follow declaration order unless a
//! bank is pinned with [`RegisterBankAllocator::allocate_at`]. Each register
//! word occupies one fabric word (`stride` bytes) with the register bus data
//! in its low lanes.

use crate::address_map::AddressWindow;
use crate::error::{BuildError, ConfigError, MapError};
use crate::port::{PortDescriptor, PortId};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsrRegister {
    pub name: String,
    /// Width in bits
    pub width: u32,
    pub access: Access,
    /// Value after reset
    pub reset: u64,
}

impl CsrRegister {
    pub fn rw(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
            access: Access::ReadWrite,
            reset: 0,
        }
    }

    pub fn ro(name: impl Into<String>, width: u32) -> Self {
        Self {
            access: Access::ReadOnly,
            ..Self::rw(name, width)
        }
    }

    pub fn with_reset(mut self, reset: u64) -> Self {
        self.reset = reset;
        self
    }

    /// Bus words this register spans
    pub fn words(&self, bus_width: u32) -> u64 {
        u64::from(self.width.max(1).div_ceil(bus_width))
    }
}

/// What a bank holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankContents {
    Registers(Vec<CsrRegister>),
    Memory { words: u64 },
}

impl BankContents {
    pub fn word_count(&self, bus_width: u32) -> u64 {
        match self {
            BankContents::Registers(regs) => regs
                .iter()
                .map(|r| r.words(bus_width))
                .fold(0, u64::saturating_add),
            BankContents::Memory { words } => *words,
        }
    }
}

/// A register placed inside its bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedRegister {
    pub name: String,
    /// Word offset from the bank base
    pub offset: u64,
    pub address: u64,
    pub width: u32,
    pub words: u64,
    pub access: Access,
    pub reset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BankMap {
    Registers { registers: Vec<PlacedRegister> },
    Memory { words: u64 },
}

/// One allocated bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterBank {
    pub name: String,
    pub index: u64,
    pub base: u64,
    /// Window size, always the allocator granularity
    pub size: u64,
    pub word_count: u64,
    #[serde(flatten)]
    pub map: BankMap,
}

impl RegisterBank {
    pub fn register(&self, name: &str) -> Option<&PlacedRegister> {
        match &self.map {
            BankMap::Registers { registers } => registers.iter().find(|r| r.name == name),
            BankMap::Memory { .. } => None,
        }
    }
}

/// Banks in declaration order, as published to header generators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterBankLayout {
    pub origin: u64,
    pub granularity: u64,
    /// Bytes between consecutive register words
    pub stride: u64,
    /// Register bus data width in bits
    pub data_width: u32,
    banks: Vec<RegisterBank>,
}

impl RegisterBankLayout {
    /// Layout of a fabric without a register bus
    pub fn empty(origin: u64, granularity: u64, stride: u64, data_width: u32) -> Self {
        Self {
            origin,
            granularity,
            stride,
            data_width,
            banks: Vec::new(),
        }
    }

    pub fn banks(&self) -> &[RegisterBank] {
        &self.banks
    }

    pub fn bank(&self, name: &str) -> Option<&RegisterBank> {
        self.banks.iter().find(|b| b.name == name)
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}

pub struct RegisterBankAllocator {
    owner: PortId,
    origin: u64,
    granularity: u64,
    stride: u64,
    data_width: u32,
    max_banks: u64,
    taken: BTreeMap<u64, String>,
    banks: Vec<RegisterBank>,
}

impl RegisterBankAllocator {
    /// Allocator for banks served by register bus `bus`, with register words
    /// `stride` bytes apart on the fabric
    pub fn new(
        bus: &PortDescriptor,
        origin: u64,
        granularity: u64,
        stride: u64,
        max_banks: u64,
    ) -> Result<Self, ConfigError> {
        if !granularity.is_power_of_two() || granularity < stride {
            return Err(ConfigError::BadGranularity {
                granularity,
                word_bytes: stride,
            });
        }
        Ok(Self {
            owner: bus.id,
            origin,
            granularity,
            stride,
            data_width: bus.data_width,
            max_banks,
            taken: BTreeMap::new(),
            banks: Vec::new(),
        })
    }

    /// Allocate the next free bank index
    pub fn allocate(
        &mut self,
        name: &str,
        contents: BankContents,
    ) -> Result<AddressWindow, BuildError> {
        let index = (0..)
            .find(|i| !self.taken.contains_key(i))
            .unwrap_or(self.max_banks);
        self.place(name, index, contents)
    }

    /// Allocate a bank at a fixed index
    pub fn allocate_at(
        &mut self,
        name: &str,
        index: u64,
        contents: BankContents,
    ) -> Result<AddressWindow, BuildError> {
        if let Some(owner) = self.taken.get(&index) {
            return Err(MapError::IndexTaken {
                index,
                owner: owner.clone(),
            }
            .into());
        }
        self.place(name, index, contents)
    }

    fn place(
        &mut self,
        name: &str,
        index: u64,
        contents: BankContents,
    ) -> Result<AddressWindow, BuildError> {
        if self.banks.iter().any(|b| b.name == name) {
            return Err(MapError::DuplicateName(name.to_string()).into());
        }
        if index >= self.max_banks {
            return Err(ConfigError::BankIndexOutOfRange {
                index,
                max: self.max_banks,
            }
            .into());
        }

        let word_count = contents.word_count(self.data_width);
        let bytes = word_count.saturating_mul(self.stride);
        if bytes > self.granularity {
            return Err(ConfigError::BankOverflow {
                name: name.to_string(),
                bytes,
                granularity: self.granularity,
            }
            .into());
        }

        // The whole bank window must sit below the top of the address space
        let Some(base) = self
            .granularity
            .checked_mul(index)
            .and_then(|offset| self.origin.checked_add(offset))
            .filter(|base| base.checked_add(self.granularity).is_some())
        else {
            return Err(ConfigError::BankIndexOutOfRange {
                index,
                max: self.max_banks,
            }
            .into());
        };
        let map = match contents {
            BankContents::Registers(regs) => {
                let mut offset = 0;
                let mut registers = Vec::with_capacity(regs.len());
                for reg in regs {
                    let words = reg.words(self.data_width);
                    registers.push(PlacedRegister {
                        address: base + offset * self.stride,
                        offset,
                        words,
                        name: reg.name,
                        width: reg.width,
                        access: reg.access,
                        reset: reg.reset,
                    });
                    offset += words;
                }
                BankMap::Registers { registers }
            }
            BankContents::Memory { words } => BankMap::Memory { words },
        };

        debug!(
            "CSR bank {} #{} at {:#X} ({} words)",
            name, index, base, word_count
        );
        self.taken.insert(index, name.to_string());
        self.banks.push(RegisterBank {
            name: name.to_string(),
            index,
            base,
            size: self.granularity,
            word_count,
            map,
        });
        Ok(AddressWindow {
            name: name.to_string(),
            base,
            size: self.granularity,
            owner: self.owner,
            data_width: self.data_width,
        })
    }

    pub fn finish(self) -> RegisterBankLayout {
        RegisterBankLayout {
            origin: self.origin,
            granularity: self.granularity,
            stride: self.stride,
            data_width: self.data_width,
            banks: self.banks,
        }
    }
}
