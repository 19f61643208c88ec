/// HPS-FPGA bridge data width variants
///
/// Each variant names the (HPS-to-FPGA, FPGA-to-HPS) AXI data widths the HPS
/// IP was generated with.
pub mod variants {
    /// `(name, h2f_width, f2h_width)`
    pub const AXI_DATA_WIDTHS: &[(&str, u32, u32)] = &[
        ("standard", 64, 64),
        ("linux", 64, 64),
        ("full", 64, 64),
        ("linuxhh", 32, 32),
        ("linuxhs", 32, 64),
        ("linuxhd", 32, 128),
        ("linuxsh", 64, 32),
        ("linuxss", 64, 64),
        ("linuxsd", 64, 128),
        ("linuxdh", 128, 32),
        ("linuxds", 128, 64),
        ("linuxdd", 128, 128),
    ];

    /// Variant used when none is requested
    pub const DEFAULT: &str = "standard";

    /// Look up the `(h2f, f2h)` widths of a variant
    pub fn lookup(name: &str) -> Option<(u32, u32)> {
        AXI_DATA_WIDTHS
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|&(_, h2f, f2h)| (h2f, f2h))
    }
}

/// Bus protocol limits
pub mod bus {
    /// Narrowest data path any bridge accepts, in bits
    pub const MIN_DATA_WIDTH: u32 = 8;

    /// Widest data path any bridge accepts, in bits
    pub const MAX_DATA_WIDTH: u32 = 128;

    /// Data widths a wide or simple port may declare
    pub const PORT_DATA_WIDTHS: [u32; 3] = [32, 64, 128];

    /// Data widths a register-bus port may declare
    pub const CSR_DATA_WIDTHS: [u32; 3] = [8, 16, 32];

    /// Longest split-transaction burst (8-bit length field)
    pub const MAX_BURST_BEATS: u32 = 256;
}

/// Clocking
pub mod clock {
    /// Fabric system clock used when none is configured (50 MHz)
    pub const SYS_HZ: u64 = 50_000_000;
}
