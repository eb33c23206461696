mod port;
mod wire;

pub use port::{Port, PortId, PortRegistry, PortStatus};
pub use wire::{colors, WireCatalog, WireCatalogError, WireColor, STANDARD_WIRE_NAMES};
