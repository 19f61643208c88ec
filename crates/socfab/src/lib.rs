pub mod address_map;
pub mod args;
pub mod bridge;
pub mod bus;
pub mod core;
pub mod csr;
pub mod description;
pub mod error;
pub mod fabric;
pub mod interconnect;
pub mod memory;
pub mod mmio;
pub mod port;
pub mod profile;
pub mod scheduler;
pub mod traffic;

// Re-export commonly used types
pub use address_map::{AddressMap, AddressWindow, MapEntry};
pub use args::{Args, load_ports};
pub use bridge::{AxiToSimple, BridgeSpec, Direction, SimpleToAxi};
pub use bus::{Burst, Resp, SimpleRequest, SimpleResponse};
pub use core::{SimulationConfig, SimulationCore, StopReason};
pub use csr::{BankContents, CsrRegister, RegisterBankAllocator, RegisterBankLayout};
pub use description::FabricDescription;
pub use error::{BuildError, ConfigError, FaultKind, MapError, ProtocolFault};
pub use fabric::{BankDeclaration, CsrConfig, Fabric, FabricBuilder, FabricConfig};
pub use interconnect::{SharedInterconnect, TieBreak};
pub use port::{PortDescriptor, PortId, Protocol, Role};
pub use profile::{Peripheral, PlatformProfile};
pub use scheduler::{QuantumResult, SchedulerConfig};
pub use traffic::{AxiCompletion, AxiMaster, AxiOp, SimpleMaster};
