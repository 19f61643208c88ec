//! Machine-readable description of a built fabric.
//!
//! Header and device-tree generators consume this instead of walking the
//! fabric: every address window plus the full register bank layout.

use crate::address_map::MapEntry;
use crate::csr::RegisterBankLayout;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FabricDescription {
    /// `name/variant` of the platform profile, if one was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub fabric_width: u32,
    /// Address windows in ascending base order
    pub windows: Vec<MapEntry>,
    pub csr: RegisterBankLayout,
}

impl FabricDescription {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Write the pretty-printed JSON to `path`
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::other)?;
        fs::write(path, json + "\n")?;
        info!("Wrote fabric description to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::{BankContents, CsrRegister, RegisterBankAllocator};
    use crate::port::{PortDescriptor, PortId, Protocol};

    #[test]
    fn json_names_windows_and_registers() {
        let bus = PortDescriptor {
            base_address: None,
            size: None,
            ..PortDescriptor::slave(5, "csr", Protocol::RegisterBus, 32, 14, 0, 0)
        };
        let mut alloc = RegisterBankAllocator::new(&bus, 0xE000_0000, 0x800, 4, 32).unwrap();
        alloc
            .allocate(
                "uart",
                BankContents::Registers(vec![CsrRegister::rw("rxtx", 8)]),
            )
            .unwrap();
        let desc = FabricDescription {
            profile: None,
            fabric_width: 32,
            windows: vec![MapEntry {
                name: "uart".into(),
                base: 0xE000_0000,
                size: 0x800,
                width: 32,
                owner: PortId(5),
            }],
            csr: alloc.finish(),
        };

        let v = desc.to_value().unwrap();
        assert!(v.get("profile").is_none());
        assert_eq!(v["windows"][0]["base"], 0xE000_0000u64);
        assert_eq!(v["csr"]["banks"][0]["kind"], "registers");
        assert_eq!(v["csr"]["banks"][0]["registers"][0]["name"], "rxtx");
        assert_eq!(v["csr"]["banks"][0]["registers"][0]["address"], 0xE000_0000u64);
    }
}
