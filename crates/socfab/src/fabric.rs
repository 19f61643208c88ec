//! Fabric composition and the per-cycle tick.
//!
//! [`FabricBuilder::build`] turns a list of port descriptors into a running
//! fabric: every master is normalized to the simple bus (through an
//! [`AxiToSimple`] bridge when it speaks the split protocol), every slave
//! gets a window in the address map and a simulated endpoint, and register
//! banks are carved out of the CSR region. Any error aborts the build; no
//! partial fabric is returned.

use crate::address_map::{AddressMap, MapEntry};
use crate::bridge::{AxiToSimple, BridgeSpec, SimpleToAxi};
use crate::bus::{AxiLink, SimpleLink, SimpleRequest};
use crate::csr::{BankContents, RegisterBankAllocator, RegisterBankLayout};
use crate::description::FabricDescription;
use crate::error::{BuildError, ConfigError, ProtocolFault};
use crate::interconnect::{Grant, SharedInterconnect, TieBreak};
use crate::mmio::{AxiRam, CsrBankDevice, DevicePort, Sram};
use crate::port::{PortDescriptor, PortId, Protocol, Role};
use crate::profile::{Peripheral, PlatformProfile};
use crate::traffic::{AxiCompletion, AxiMaster, AxiOp, SimpleCompletion, SimpleMaster};
use serde::{Deserialize, Serialize};
use socfab_hw::memory_map::csr;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error_span, info};

/// Register bank region knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrConfig {
    pub origin: u64,
    pub granularity: u64,
    pub max_banks: u64,
}

impl Default for CsrConfig {
    fn default() -> Self {
        Self {
            origin: csr::ORIGIN,
            granularity: csr::BANK_GRANULARITY,
            max_banks: csr::MAX_BANKS,
        }
    }
}

/// A register bank to allocate, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankDeclaration {
    pub name: String,
    /// Pinned bank index
    pub index: Option<u64>,
    pub contents: BankContents,
}

impl BankDeclaration {
    pub fn new(name: impl Into<String>, contents: BankContents) -> Self {
        Self {
            name: name.into(),
            index: None,
            contents,
        }
    }

    pub fn at(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }
}

/// Everything fixed at build time
#[derive(Debug, Clone)]
pub struct FabricConfig {
    pub ports: Vec<PortDescriptor>,
    /// Width of the shared simple bus
    pub fabric_width: u32,
    pub csr: CsrConfig,
    pub banks: Vec<BankDeclaration>,
    pub tie_break: TieBreak,
    /// Acknowledge latency of simple-bus devices, in cycles
    pub device_latency: u32,
    /// Read latency of split-side RAM responders, in cycles
    pub ram_latency: u32,
    pub profile: Option<PlatformProfile>,
    /// Peripherals the design needs from the profile
    pub required: Vec<Peripheral>,
    /// Keep every grant for inspection
    pub record_grants: bool,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            fabric_width: 32,
            csr: CsrConfig::default(),
            banks: Vec::new(),
            tie_break: TieBreak::default(),
            device_latency: 0,
            ram_latency: 1,
            profile: None,
            required: Vec::new(),
            record_grants: false,
        }
    }
}

impl FabricConfig {
    /// Ports and widths taken from a platform profile
    pub fn from_profile(profile: PlatformProfile) -> Self {
        Self {
            ports: profile.default_ports(),
            profile: Some(profile),
            ..Self::default()
        }
    }
}

enum MasterEndpoint {
    Split {
        port: PortDescriptor,
        traffic: AxiMaster,
        link: AxiLink,
        bridge: AxiToSimple,
    },
    Simple {
        port: PortDescriptor,
        traffic: SimpleMaster,
    },
}

impl MasterEndpoint {
    fn port(&self) -> &PortDescriptor {
        match self {
            MasterEndpoint::Split { port, .. } | MasterEndpoint::Simple { port, .. } => port,
        }
    }

    /// Nothing left to do, or stuck behind a halted bridge
    fn is_settled(&self) -> bool {
        match self {
            MasterEndpoint::Split {
                traffic, bridge, ..
            } => bridge.is_halted() || (traffic.is_done() && bridge.is_idle()),
            MasterEndpoint::Simple { traffic, .. } => traffic.is_done(),
        }
    }
}

enum SlaveEndpoint {
    Split {
        port: PortDescriptor,
        bridge: SimpleToAxi,
        link: AxiLink,
        ram: AxiRam,
    },
    Device {
        port: PortDescriptor,
        device: DevicePort,
    },
}

impl SlaveEndpoint {
    fn port(&self) -> &PortDescriptor {
        match self {
            SlaveEndpoint::Split { port, .. } | SlaveEndpoint::Device { port, .. } => port,
        }
    }

    fn is_settled(&self, link: &SimpleLink) -> bool {
        match self {
            SlaveEndpoint::Split { bridge, ram, .. } => {
                bridge.is_halted() || (bridge.is_idle() && ram.is_idle() && link.is_idle())
            }
            SlaveEndpoint::Device { .. } => link.is_idle(),
        }
    }
}

pub struct FabricBuilder {
    config: FabricConfig,
}

impl FabricBuilder {
    pub fn new(config: FabricConfig) -> Self {
        Self { config }
    }

    pub fn build(self) -> Result<Fabric, BuildError> {
        let config = self.config;
        let _span = error_span!("build").entered();

        check_requirements(&config)?;
        let fabric_width = config.fabric_width;
        BridgeSpec::new(Protocol::WideSplit, fabric_width, Protocol::SimpleSync, fabric_width)?;
        let fabric_bytes = fabric_width / 8;

        let mut seen = BTreeSet::new();
        for port in &config.ports {
            port.validate()?;
            if !seen.insert(port.id) {
                return Err(ConfigError::DuplicatePort(port.id).into());
            }
        }
        let mut ports = config.ports.clone();
        ports.sort_by_key(|p| p.id);

        let mut map = AddressMap::new();
        let mut masters = Vec::new();
        let mut slaves = Vec::new();
        let mut csr_bus: Option<PortDescriptor> = None;

        for port in ports {
            match port.role {
                Role::Master => masters.push(build_master(port, fabric_width)?),
                Role::Slave if port.protocol == Protocol::RegisterBus => {
                    if csr_bus.is_some() {
                        return Err(ConfigError::MultipleRegisterBuses(port.id).into());
                    }
                    if port.data_width > fabric_width {
                        return Err(ConfigError::WidthMismatch {
                            port: port.id,
                            width: port.data_width,
                            fabric_width,
                        }
                        .into());
                    }
                    csr_bus = Some(port);
                }
                Role::Slave => {
                    map.register_port(&port)?;
                    slaves.push(build_slave(port, &config)?);
                }
            }
        }

        let layout = match &csr_bus {
            Some(bus) => {
                let mut alloc = RegisterBankAllocator::new(
                    bus,
                    config.csr.origin,
                    config.csr.granularity,
                    u64::from(fabric_bytes),
                    config.csr.max_banks,
                )?;
                for bank in &config.banks {
                    match bank.index {
                        Some(index) => alloc.allocate_at(&bank.name, index, bank.contents.clone())?,
                        None => alloc.allocate(&bank.name, bank.contents.clone())?,
                    };
                }
                let layout = alloc.finish();
                map.register_bank(bus, &layout)?;
                let device = CsrBankDevice::new(&layout);
                slaves.push(SlaveEndpoint::Device {
                    port: bus.clone(),
                    device: DevicePort::new(
                        Box::new(device),
                        config.csr.origin,
                        config.device_latency,
                    ),
                });
                layout
            }
            None if !config.banks.is_empty() => return Err(ConfigError::NoRegisterBus.into()),
            None => RegisterBankLayout::empty(
                config.csr.origin,
                config.csr.granularity,
                u64::from(fabric_bytes),
                csr::DATA_WIDTH,
            ),
        };

        map.freeze();
        let map = Arc::new(map);
        info!(
            "Fabric: {} masters, {} slaves, {} windows, {} register banks",
            masters.len(),
            slaves.len(),
            map.len(),
            layout.banks().len()
        );

        let interconnect = SharedInterconnect::new(
            Arc::clone(&map),
            masters.iter().map(|m| m.port().id).collect(),
            slaves.iter().map(|s| s.port().id).collect(),
            config.tie_break,
        );

        Ok(Fabric {
            cycle: 0,
            fabric_width,
            master_links: vec![SimpleLink::new(); masters.len()],
            slave_links: vec![SimpleLink::new(); slaves.len()],
            map,
            layout,
            profile: config.profile,
            masters,
            interconnect,
            slaves,
            faults: Vec::new(),
            record_grants: config.record_grants,
            grants: Vec::new(),
        })
    }
}

fn check_requirements(config: &FabricConfig) -> Result<(), ConfigError> {
    for &peripheral in &config.required {
        match &config.profile {
            Some(profile) => profile.require(peripheral)?,
            None => {
                return Err(ConfigError::MissingPeripheral {
                    profile: "none".to_string(),
                    peripheral: peripheral.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn build_master(port: PortDescriptor, fabric_width: u32) -> Result<MasterEndpoint, ConfigError> {
    match port.protocol {
        Protocol::WideSplit | Protocol::WideSplitLite => {
            let spec = BridgeSpec::new(
                port.protocol,
                port.data_width,
                Protocol::SimpleSync,
                fabric_width,
            )?;
            debug!(
                "{}: bridge to simple bus, address shift {}, simple address width {}",
                port,
                spec.address_shift,
                spec.simple_address_width(port.address_width)
            );
            Ok(MasterEndpoint::Split {
                traffic: AxiMaster::new(port.data_width),
                link: AxiLink::new(),
                bridge: AxiToSimple::new(port.id, spec, port.base_address.unwrap_or(0)),
                port,
            })
        }
        Protocol::SimpleSync => {
            if port.data_width != fabric_width {
                return Err(ConfigError::WidthMismatch {
                    port: port.id,
                    width: port.data_width,
                    fabric_width,
                });
            }
            Ok(MasterEndpoint::Simple {
                port,
                traffic: SimpleMaster::new(),
            })
        }
        Protocol::RegisterBus => Err(ConfigError::UnsupportedBridge {
            from: Protocol::RegisterBus,
            target: Protocol::SimpleSync,
        }),
    }
}

fn build_slave(port: PortDescriptor, config: &FabricConfig) -> Result<SlaveEndpoint, ConfigError> {
    let base = port.base_address.unwrap_or(0);
    let size = port.size.unwrap_or(0);
    match port.protocol {
        Protocol::SimpleSync => {
            if port.data_width != config.fabric_width {
                return Err(ConfigError::WidthMismatch {
                    port: port.id,
                    width: port.data_width,
                    fabric_width: config.fabric_width,
                });
            }
            let sram = Sram::new(port.name.clone(), size, port.data_width / 8);
            Ok(SlaveEndpoint::Device {
                device: DevicePort::new(Box::new(sram), base, config.device_latency),
                port,
            })
        }
        protocol => {
            let spec = BridgeSpec::new(
                Protocol::SimpleSync,
                config.fabric_width,
                protocol,
                port.data_width,
            )?;
            debug!("{}: bridge from simple bus, address shift {}", port, spec.address_shift);
            Ok(SlaveEndpoint::Split {
                bridge: SimpleToAxi::new(port.id, spec, base),
                link: AxiLink::new(),
                ram: AxiRam::new(port.name.clone(), port.data_width, config.ram_latency),
                port,
            })
        }
    }
}

/// A built fabric with its simulated endpoints
pub struct Fabric {
    cycle: u64,
    fabric_width: u32,
    map: Arc<AddressMap>,
    layout: RegisterBankLayout,
    profile: Option<PlatformProfile>,
    masters: Vec<MasterEndpoint>,
    master_links: Vec<SimpleLink>,
    interconnect: SharedInterconnect,
    slaves: Vec<SlaveEndpoint>,
    slave_links: Vec<SimpleLink>,
    faults: Vec<ProtocolFault>,
    record_grants: bool,
    grants: Vec<Grant>,
}

impl Fabric {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn map(&self) -> &Arc<AddressMap> {
        &self.map
    }

    pub fn layout(&self) -> &RegisterBankLayout {
        &self.layout
    }

    pub fn interconnect(&self) -> &SharedInterconnect {
        &self.interconnect
    }

    /// Protocol faults seen so far, in order
    pub fn faults(&self) -> &[ProtocolFault] {
        &self.faults
    }

    /// Grants made so far, when recording is enabled
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Queue an operation on a split-transaction master
    pub fn push_axi(&mut self, port: PortId, op: AxiOp) -> Result<(), ConfigError> {
        self.masters
            .iter_mut()
            .find_map(|m| match m {
                MasterEndpoint::Split { port: p, traffic, .. } if p.id == port => Some(traffic),
                _ => None,
            })
            .map(|traffic| traffic.push(op))
            .ok_or(ConfigError::UnknownPort(port))
    }

    /// Queue a request on a simple-bus master
    pub fn push_simple(&mut self, port: PortId, req: SimpleRequest) -> Result<(), ConfigError> {
        self.masters
            .iter_mut()
            .find_map(|m| match m {
                MasterEndpoint::Simple { port: p, traffic } if p.id == port => Some(traffic),
                _ => None,
            })
            .map(|traffic| traffic.push(req))
            .ok_or(ConfigError::UnknownPort(port))
    }

    pub fn axi_completions(&self, port: PortId) -> Option<&[AxiCompletion]> {
        self.masters.iter().find_map(|m| match m {
            MasterEndpoint::Split { port: p, traffic, .. } if p.id == port => {
                Some(traffic.completions())
            }
            _ => None,
        })
    }

    pub fn simple_completions(&self, port: PortId) -> Option<&[SimpleCompletion]> {
        self.masters.iter().find_map(|m| match m {
            MasterEndpoint::Simple { port: p, traffic } if p.id == port => {
                Some(traffic.completions())
            }
            _ => None,
        })
    }

    /// Master-side bridge of a split-transaction master
    pub fn master_bridge(&self, port: PortId) -> Option<&AxiToSimple> {
        self.masters.iter().find_map(|m| match m {
            MasterEndpoint::Split { port: p, bridge, .. } if p.id == port => Some(bridge),
            _ => None,
        })
    }

    /// RAM responder behind a split-transaction slave
    pub fn axi_ram(&self, port: PortId) -> Option<&AxiRam> {
        self.slaves.iter().find_map(|s| match s {
            SlaveEndpoint::Split { port: p, ram, .. } if p.id == port => Some(ram),
            _ => None,
        })
    }

    pub fn device(&self, port: PortId) -> Option<&DevicePort> {
        self.slaves.iter().find_map(|s| match s {
            SlaveEndpoint::Device { port: p, device } if p.id == port => Some(device),
            _ => None,
        })
    }

    /// No scripted traffic left and nothing in flight
    pub fn is_idle(&self) -> bool {
        self.masters.iter().all(MasterEndpoint::is_settled)
            && self.interconnect.is_idle()
            && self
                .slaves
                .iter()
                .zip(&self.slave_links)
                .all(|(s, link)| s.is_settled(link))
    }

    /// Advance every component by one clock cycle
    pub fn tick(&mut self) {
        let cycle = self.cycle;

        for (master, link) in self.masters.iter_mut().zip(&mut self.master_links) {
            match master {
                MasterEndpoint::Split {
                    port,
                    traffic,
                    link: axi,
                    bridge,
                } => {
                    let _span = error_span!("master", port = %port.name).entered();
                    traffic.tick(axi, cycle);
                    if let Err(fault) = bridge.tick(axi, link, cycle) {
                        self.faults.push(fault);
                    }
                }
                MasterEndpoint::Simple { traffic, .. } => traffic.tick(link, cycle),
            }
        }

        let grants = self
            .interconnect
            .tick(&mut self.master_links, &mut self.slave_links, cycle);
        if self.record_grants {
            self.grants.extend(grants);
        }

        for (slave, link) in self.slaves.iter_mut().zip(&mut self.slave_links) {
            match slave {
                SlaveEndpoint::Split {
                    port,
                    bridge,
                    link: axi,
                    ram,
                } => {
                    let _span = error_span!("slave", port = %port.name).entered();
                    if let Err(fault) = bridge.tick(link, axi, cycle) {
                        self.faults.push(fault);
                    }
                    ram.tick(axi);
                }
                SlaveEndpoint::Device { device, .. } => device.tick(link),
            }
        }

        self.cycle += 1;
    }

    /// Published address map and register bank layout
    pub fn description(&self) -> FabricDescription {
        FabricDescription {
            profile: self
                .profile
                .as_ref()
                .map(|p| format!("{}/{}", p.name, p.variant)),
            fabric_width: self.fabric_width,
            windows: self.map.entries(),
            csr: self.layout.clone(),
        }
    }

    pub fn entries(&self) -> Vec<MapEntry> {
        self.map.entries()
    }
}
