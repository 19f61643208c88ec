//! Hardware constants for Cyclone V HPS based SoC fabrics.

pub mod memory_map;
pub mod specs;
