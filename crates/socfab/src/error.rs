//! Error types for fabric construction and simulation.
//!
//! Build-time problems ([`ConfigError`], [`MapError`]) abort construction and
//! never occur once a fabric exists. Run-time protocol violations are
//! [`ProtocolFault`]s; they halt only the bridge that observed them.

use crate::port::{PortId, Protocol};
use thiserror::Error;

/// Invalid port declarations or build knobs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("data width {width} is not a power of two")]
    WidthNotPowerOfTwo { width: u32 },

    #[error("data width {width} is outside {min}..={max}")]
    WidthOutOfRange { width: u32, min: u32, max: u32 },

    #[error("port {port}: data width {width} is not allowed for {protocol:?}")]
    PortWidth {
        port: PortId,
        protocol: Protocol,
        width: u32,
    },

    #[error("no bridge converts {from:?} to {target:?}")]
    UnsupportedBridge { from: Protocol, target: Protocol },

    #[error("port {port}: width {width} does not match fabric width {fabric_width}")]
    WidthMismatch {
        port: PortId,
        width: u32,
        fabric_width: u32,
    },

    #[error("port {port}: slave has no base address and size")]
    MissingWindow { port: PortId },

    #[error("port {0} declared twice")]
    DuplicatePort(PortId),

    #[error("port {0} is not declared")]
    UnknownPort(PortId),

    #[error("register bank granularity {granularity:#x} must be a power of two of at least {word_bytes} bytes")]
    BadGranularity { granularity: u64, word_bytes: u64 },

    #[error("register bank {name} needs {bytes:#x} bytes but the bank window is {granularity:#x}")]
    BankOverflow {
        name: String,
        bytes: u64,
        granularity: u64,
    },

    #[error("register bank index {index} is outside the {max} banks the region decodes")]
    BankIndexOutOfRange { index: u64, max: u64 },

    #[error("register banks declared but no register-bus slave port carries them")]
    NoRegisterBus,

    #[error("port {0} is a second register-bus slave")]
    MultipleRegisterBuses(PortId),

    #[error("platform profile {profile} does not provide {peripheral}")]
    MissingPeripheral {
        profile: String,
        peripheral: String,
    },

    #[error("unknown bridge width variant {0}")]
    UnknownVariant(String),
}

/// Address map and register bank allocation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error(
        "window {name} [{base:#x}, {end:#x}) overlaps {existing} [{existing_base:#x}, {existing_end:#x})"
    )]
    Overlap {
        name: String,
        base: u64,
        end: u64,
        existing: String,
        existing_base: u64,
        existing_end: u64,
    },

    #[error("window {name} at {base:#x} size {size:#x} is misaligned (natural alignment {alignment:#x})")]
    Alignment {
        name: String,
        base: u64,
        size: u64,
        alignment: u64,
    },

    #[error("window {name} of size {size:#x} does not fit the {span:#x} bytes its port can address")]
    OutOfRange { name: String, size: u64, span: u64 },

    #[error("register bank {0} is already allocated")]
    DuplicateName(String),

    #[error("register bank index {index} is already taken by {owner}")]
    IndexTaken { index: u64, owner: String },

    #[error("address map is frozen")]
    Frozen,
}

/// Anything that stops a fabric from being built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Map(#[from] MapError),
}

/// The kind of protocol violation a bridge observed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultKind {
    #[error("write data beat {beat} carried `last` before the burst length {beats}")]
    EarlyLast { beat: u32, beats: u32 },

    #[error("final write data beat {beat} is missing `last`")]
    MissingLast { beat: u32 },

    #[error("{channel} response without an outstanding request")]
    UnexpectedResponse { channel: &'static str },

    #[error("wrapping burst of {beats} beats (must be 2, 4, 8 or 16)")]
    BadWrapLength { beats: u32 },

    #[error("beat size {bytes} bytes exceeds the {bus_bytes}-byte data bus")]
    OversizedBeat { bytes: u32, bus_bytes: u32 },

    #[error("burst of {beats} beats on a single-beat port")]
    BurstOnLitePort { beats: u32 },

    #[error("read burst returned {received} beats, expected {beats}")]
    ReadLength { received: u32, beats: u32 },
}

/// A run-time protocol violation, attributed to the port that caused it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("protocol fault on port {port} at cycle {cycle}: {kind}")]
pub struct ProtocolFault {
    pub port: PortId,
    pub cycle: u64,
    pub kind: FaultKind,
}

/// A simulated device refused an access; the bus sees an error acknowledge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("offset {offset:#x} is outside the device")]
    Unmapped { offset: u64 },
    #[error("write to read-only register at offset {offset:#x}")]
    ReadOnly { offset: u64 },
}
