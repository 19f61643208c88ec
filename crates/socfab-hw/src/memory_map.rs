//! Cyclone V HPS / FPGA fabric address layout.
//!
//! # References
//! - <https://www.intel.com/content/www/us/en/docs/programmable/683126/>
//!   (Cyclone V HPS Technical Reference Manual, "HPS-FPGA Bridges")

/// FPGA-side regions as seen by a soft SoC built around the HPS bridges
pub mod fabric {
    /// On-chip scratch RAM
    pub mod sram {
        pub const BASE: u64 = 0x11000000;
        pub const SIZE: u64 = 0x1000;
    }
}

/// HPS-to-FPGA bridges (HPS is the master)
pub mod h2f {
    /// Full-width AXI bridge
    ///
    /// The HPS sees this bridge at 0xC0000000..0xFC000000 (960 MB).
    pub mod axi {
        /// AXI address width in bits
        pub const ADDRESS_WIDTH: u32 = 30;
    }

    /// Lightweight (AXI-Lite, 32-bit) bridge
    pub mod lw {
        /// AXI address width in bits
        pub const ADDRESS_WIDTH: u32 = 21;
        /// Fixed data width in bits
        pub const DATA_WIDTH: u32 = 32;
    }
}

/// FPGA-to-HPS bridges (FPGA logic is the master, HPS is the slave)
pub mod f2h {
    /// FPGA-to-HPS AXI bridge window in the fabric address space
    pub mod axi {
        pub const BASE: u64 = 0x40000000;
        pub const SIZE: u64 = 0x20000000;
        pub const ADDRESS_WIDTH: u32 = 32;
    }

    /// FPGA-to-HPS SDRAM port window in the fabric address space
    pub mod sdram {
        pub const BASE: u64 = 0x60000000;
        pub const SIZE: u64 = 0x20000000;
        pub const ADDRESS_WIDTH: u32 = 32;
    }
}

/// Control/status register region
pub mod csr {
    /// CSR region origin
    pub const ORIGIN: u64 = 0xE0000000;

    /// Address window per CSR bank (2 KB)
    pub const BANK_GRANULARITY: u64 = 0x800;

    /// CSR bus data width in bits
    pub const DATA_WIDTH: u32 = 32;

    /// Maximum number of banks the region decodes
    pub const MAX_BANKS: u64 = 32;
}
