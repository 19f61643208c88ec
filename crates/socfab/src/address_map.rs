//! Global address map.
//!
//! Windows are kept in an ordered map keyed by base address. Since windows
//! never overlap, the window with the greatest base not above an address is
//! the only one that can contain it.

use crate::csr::RegisterBankLayout;
use crate::error::{BuildError, ConfigError, MapError};
use crate::port::{PortDescriptor, PortId};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// One decoded address range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressWindow {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub owner: PortId,
    pub data_width: u32,
}

impl AddressWindow {
    /// Exclusive end
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

/// `{name, base, size, width}` record of the published map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub width: u32,
    pub owner: PortId,
}

#[derive(Debug, Clone, Default)]
pub struct AddressMap {
    windows: BTreeMap<u64, AddressWindow>,
    frozen: bool,
}

impl AddressMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window for `slave` at `base`
    pub fn register(&mut self, slave: &PortDescriptor, base: u64, size: u64) -> Result<(), MapError> {
        self.insert(
            AddressWindow {
                name: slave.name.clone(),
                base,
                size,
                owner: slave.id,
                data_width: slave.data_width,
            },
            slave.natural_alignment(),
            slave.addressable_bytes(),
        )
    }

    /// Register a slave at the window its descriptor declares
    pub fn register_port(&mut self, slave: &PortDescriptor) -> Result<(), BuildError> {
        let (Some(base), Some(size)) = (slave.base_address, slave.size) else {
            return Err(ConfigError::MissingWindow { port: slave.id }.into());
        };
        Ok(self.register(slave, base, size)?)
    }

    /// Register every bank of `layout` as a window owned by the register bus
    pub fn register_bank(
        &mut self,
        bus: &PortDescriptor,
        layout: &RegisterBankLayout,
    ) -> Result<(), MapError> {
        for bank in layout.banks() {
            self.insert(
                AddressWindow {
                    name: bank.name.clone(),
                    base: bank.base,
                    size: bank.size,
                    owner: bus.id,
                    data_width: bus.data_width,
                },
                layout.stride(),
                u64::MAX,
            )?;
        }
        Ok(())
    }

    fn insert(&mut self, window: AddressWindow, alignment: u64, span: u64) -> Result<(), MapError> {
        if self.frozen {
            return Err(MapError::Frozen);
        }

        if !window.size.is_power_of_two() || window.size < alignment {
            return Err(MapError::Alignment {
                name: window.name,
                base: window.base,
                size: window.size,
                alignment,
            });
        }
        if window.size > span || window.base.checked_add(window.size).is_none() {
            return Err(MapError::OutOfRange {
                name: window.name,
                size: window.size,
                span,
            });
        }

        if let Some((_, existing)) = self.windows.range(..window.end()).next_back()
            && existing.end() > window.base
        {
            return Err(MapError::Overlap {
                name: window.name.clone(),
                base: window.base,
                end: window.end(),
                existing: existing.name.clone(),
                existing_base: existing.base,
                existing_end: existing.end(),
            });
        }

        if window.base % alignment != 0 {
            return Err(MapError::Alignment {
                name: window.name,
                base: window.base,
                size: window.size,
                alignment,
            });
        }

        debug!(
            "Mapped {} at {:#X}..{:#X} -> port {}",
            window.name,
            window.base,
            window.end(),
            window.owner
        );
        self.windows.insert(window.base, window);
        Ok(())
    }

    /// Owner of the window containing `addr`
    pub fn decode(&self, addr: u64) -> Option<PortId> {
        self.window_at(addr).map(|w| w.owner)
    }

    pub fn window_at(&self, addr: u64) -> Option<&AddressWindow> {
        self.windows
            .range(..=addr)
            .next_back()
            .map(|(_, w)| w)
            .filter(|w| w.contains(addr))
    }

    /// First window owned by `owner`
    pub fn window(&self, owner: PortId) -> Option<&AddressWindow> {
        self.windows.values().find(|w| w.owner == owner)
    }

    /// Windows in address order
    pub fn windows(&self) -> impl Iterator<Item = &AddressWindow> {
        self.windows.values()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn entries(&self) -> Vec<MapEntry> {
        self.windows
            .values()
            .map(|w| MapEntry {
                name: w.name.clone(),
                base: w.base,
                size: w.size,
                width: w.data_width,
                owner: w.owner,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Protocol;

    fn slave(id: u32, name: &str) -> PortDescriptor {
        PortDescriptor::slave(id, name, Protocol::SimpleSync, 32, 30, 0, 0)
    }

    #[test]
    fn overlapping_window_is_rejected() {
        let mut map = AddressMap::new();
        map.register(&slave(1, "a"), 0x1000, 0x1000).unwrap();
        let err = map.register(&slave(2, "b"), 0x1800, 0x1000).unwrap_err();
        assert_eq!(
            err,
            MapError::Overlap {
                name: "b".into(),
                base: 0x1800,
                end: 0x2800,
                existing: "a".into(),
                existing_base: 0x1000,
                existing_end: 0x2000,
            }
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn overlap_below_is_rejected() {
        let mut map = AddressMap::new();
        map.register(&slave(1, "a"), 0x2000, 0x1000).unwrap();
        assert!(matches!(
            map.register(&slave(2, "b"), 0x1000, 0x2000),
            Err(MapError::Overlap { .. })
        ));
        // Adjacent windows are fine
        map.register(&slave(2, "b"), 0x1000, 0x1000).unwrap();
        map.register(&slave(3, "c"), 0x3000, 0x1000).unwrap();
    }

    #[test]
    fn same_owner_may_not_overlap_itself() {
        let mut map = AddressMap::new();
        let s = slave(1, "a");
        map.register(&s, 0x0, 0x100).unwrap();
        assert!(matches!(
            map.register(&s, 0x80, 0x100),
            Err(MapError::Overlap { .. })
        ));
    }

    #[test]
    fn size_and_alignment_checks() {
        let mut map = AddressMap::new();
        assert!(matches!(
            map.register(&slave(1, "odd"), 0x0, 0x300),
            Err(MapError::Alignment { size: 0x300, .. })
        ));
        assert!(matches!(
            map.register(&slave(1, "tiny"), 0x0, 2),
            Err(MapError::Alignment { alignment: 4, .. })
        ));
        assert!(matches!(
            map.register(&slave(1, "skew"), 0x2, 0x100),
            Err(MapError::Alignment { base: 0x2, .. })
        ));

        let narrow = PortDescriptor::slave(9, "narrow", Protocol::SimpleSync, 32, 8, 0, 0);
        assert!(matches!(
            map.register(&narrow, 0x0, 0x1000),
            Err(MapError::OutOfRange { span: 0x400, .. })
        ));
        assert!(map.is_empty());
    }

    #[test]
    fn frozen_map_rejects_registration() {
        let mut map = AddressMap::new();
        map.register(&slave(1, "a"), 0x0, 0x100).unwrap();
        map.freeze();
        assert_eq!(
            map.register(&slave(2, "b"), 0x1000, 0x100),
            Err(MapError::Frozen)
        );
        assert!(map.is_frozen());
    }

    #[test]
    fn decode_finds_unique_owner() {
        let mut map = AddressMap::new();
        assert_eq!(map.decode(0), None);
        map.register(&slave(1, "a"), 0x1000, 0x1000).unwrap();
        map.register(&slave(2, "b"), 0x4000, 0x100).unwrap();
        map.freeze();

        assert_eq!(map.decode(0x0FFF), None);
        assert_eq!(map.decode(0x1000), Some(PortId(1)));
        assert_eq!(map.decode(0x1FFF), Some(PortId(1)));
        assert_eq!(map.decode(0x2000), None);
        assert_eq!(map.decode(0x40FF), Some(PortId(2)));
        assert_eq!(map.decode(0x4100), None);
        assert_eq!(map.decode(0x1234), map.decode(0x1234));
    }

    #[test]
    fn register_port_uses_declared_window() {
        let mut map = AddressMap::new();
        let sram = PortDescriptor::slave(4, "sram", Protocol::SimpleSync, 32, 30, 0x1100_0000, 0x1000);
        map.register_port(&sram).unwrap();
        assert_eq!(map.window(PortId(4)).map(|w| w.end()), Some(0x1100_1000));

        let mut bare = sram.clone();
        bare.base_address = None;
        assert!(matches!(
            map.register_port(&bare),
            Err(BuildError::Config(ConfigError::MissingWindow { .. }))
        ));
    }

    #[test]
    fn entries_in_address_order() {
        let mut map = AddressMap::new();
        map.register(&slave(2, "high"), 0x8000, 0x1000).unwrap();
        map.register(&slave(1, "low"), 0x1000, 0x1000).unwrap();
        let names: Vec<String> = map.entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["low", "high"]);
    }
}
