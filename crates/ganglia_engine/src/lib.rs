pub mod catalog;
pub mod console;
pub mod panel;

pub use catalog::{
    match_requirement, presets, resolve, CatalogError, Requirement, Resolution, SequenceSlot,
    SubsystemCatalog, SubsystemDef, SubsystemId,
};
pub use console::{
    BayConfig, BayDump, BayId, BayKind, CommandSink, ConfigError, Console, ConsoleCommand,
    ConsoleConfig, ConsoleDump, ConsoleError, ConsoleEvent, CooldownPhase, Movement, PollConfig,
    PropulsionMode, RecordingSink, ServerState, ServerView, ShieldPhase, ShieldTimings,
};
pub use panel::{
    colors, Port, PortId, PortRegistry, PortStatus, WireCatalog, WireCatalogError, WireColor,
    STANDARD_WIRE_NAMES,
};

/// Milliseconds on the caller's clock. The engine never reads wall time.
pub type Millis = u64;
