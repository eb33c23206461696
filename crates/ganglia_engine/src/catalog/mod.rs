mod definition;
pub mod presets;
mod resolver;

pub use definition::{
    CatalogError, Requirement, SequenceSlot, SubsystemCatalog, SubsystemDef, SubsystemId,
};
pub use resolver::{match_requirement, resolve, Resolution};
