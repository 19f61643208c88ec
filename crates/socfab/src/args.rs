use crate::core::SimulationConfig;
use crate::csr::BankContents;
use crate::error::ConfigError;
use crate::fabric::{BankDeclaration, CsrConfig, FabricConfig};
use crate::interconnect::TieBreak;
use crate::port::PortDescriptor;
use crate::profile::{Peripheral, PlatformProfile};
use clap::Parser;
use socfab_hw::memory_map::csr;
use socfab_hw::specs::variants;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(name = "socfab-cli", about = "Compose an HPS bus fabric and emit its address map")]
pub struct Args {
    /// Bridge width variant of the Cyclone V profile (e.g. standard, linuxsd)
    #[arg(long, default_value = variants::DEFAULT)]
    pub variant: String,

    /// JSON file with an array of port descriptors. Replaces the profile's
    /// default ports.
    #[arg(long)]
    pub ports: Option<PathBuf>,

    /// Data width of the shared simple bus in bits
    #[arg(long, default_value_t = 32)]
    pub fabric_width: u32,

    /// CSR region origin (hex: 0x1234 or decimal: 1234)
    #[arg(long, value_parser = parse_hex_or_dec, default_value_t = csr::ORIGIN)]
    pub csr_origin: u64,

    /// Bytes per CSR bank window (hex or decimal)
    #[arg(long, value_parser = parse_hex_or_dec, default_value_t = csr::BANK_GRANULARITY)]
    pub csr_granularity: u64,

    /// Register bank to allocate: NAME, NAME:WORDS or NAME@INDEX:WORDS.
    /// May be repeated; banks are allocated in the order given.
    #[arg(long = "bank", value_parser = parse_bank)]
    pub banks: Vec<BankDeclaration>,

    /// Order masters are scanned in after the last grant
    #[arg(long, value_enum, default_value_t = TieBreak::Ascending)]
    pub tie_break: TieBreak,

    /// Optional peripheral the board routes, on top of the base set
    #[arg(long = "with", value_enum)]
    pub with_peripherals: Vec<Peripheral>,

    /// Peripheral the design needs; the build fails if the board lacks it
    #[arg(long = "require", value_enum)]
    pub required: Vec<Peripheral>,

    /// Write the fabric description JSON here. Printed to stdout otherwise.
    #[arg(long)]
    pub emit: Option<PathBuf>,

    /// Run a write/read-back smoke test through the fabric after building it
    #[arg(long)]
    pub simulate: bool,

    /// Stop the simulation after this many cycles
    #[arg(long, short = 'c')]
    pub max_cycles: Option<u64>,

    /// Stop the simulation after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Acknowledge latency of simple-bus devices, in cycles
    #[arg(long, default_value_t = 0)]
    pub device_latency: u32,
}

impl Args {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if !self.simulate && (self.max_cycles.is_some() || self.timeout_ms.is_some()) {
            return Err("--max-cycles and --timeout-ms require --simulate".to_string());
        }
        if self.ports.is_some() && !self.with_peripherals.is_empty() {
            return Err("--with only applies to the built-in profile, not --ports".to_string());
        }
        if self.max_cycles == Some(0) {
            return Err("--max-cycles must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn profile(&self) -> Result<PlatformProfile, ConfigError> {
        let profile = PlatformProfile::cyclone_v(&self.variant)?;
        Ok(self
            .with_peripherals
            .iter()
            .fold(profile, |p, &peripheral| p.with_peripheral(peripheral)))
    }

    /// Convert Args to FabricConfig. `ports` replaces the profile's defaults.
    pub fn to_fabric_config(
        &self,
        ports: Option<Vec<PortDescriptor>>,
    ) -> Result<FabricConfig, ConfigError> {
        let profile = self.profile()?;
        let base = FabricConfig::from_profile(profile);
        Ok(FabricConfig {
            ports: ports.unwrap_or(base.ports),
            fabric_width: self.fabric_width,
            csr: CsrConfig {
                origin: self.csr_origin,
                granularity: self.csr_granularity,
                ..CsrConfig::default()
            },
            banks: self.banks.clone(),
            tie_break: self.tie_break,
            device_latency: self.device_latency,
            required: self.required.clone(),
            ..base
        })
    }

    pub fn to_simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            max_cycles: self.max_cycles,
            timeout_ms: self.timeout_ms,
            ..SimulationConfig::default()
        }
    }
}

pub fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

/// Parse `NAME`, `NAME:WORDS`, `NAME@INDEX` or `NAME@INDEX:WORDS` into a
/// memory bank declaration
pub fn parse_bank(s: &str) -> Result<BankDeclaration, String> {
    let (head, words) = match s.split_once(':') {
        Some((head, words)) => (
            head,
            parse_hex_or_dec(words).map_err(|e| format!("bank word count {words:?}: {e}"))?,
        ),
        None => (s, 1),
    };
    let (name, index) = match head.split_once('@') {
        Some((name, index)) => (
            name,
            Some(parse_hex_or_dec(index).map_err(|e| format!("bank index {index:?}: {e}"))?),
        ),
        None => (head, None),
    };
    if name.is_empty() {
        return Err(format!("bank {s:?} has no name"));
    }
    Ok(BankDeclaration {
        name: name.to_string(),
        index,
        contents: BankContents::Memory { words },
    })
}

/// Load port descriptors from a JSON file
pub fn load_ports(path: &Path) -> Result<Vec<PortDescriptor>, Box<dyn std::error::Error>> {
    use tracing::info;

    info!("Loading ports from {:?}", path);
    let text = std::fs::read_to_string(path)?;
    let ports: Vec<PortDescriptor> = serde_json::from_str(&text)?;
    info!("Loaded {} port descriptors", ports.len());
    Ok(ports)
}
