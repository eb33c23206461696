use crate::panel::{PortId, PortRegistry, WireColor};

use super::definition::{Requirement, SequenceSlot, SubsystemCatalog, SubsystemId};

/// Outcome of matching a port snapshot against a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Highest matching non-base subsystem; `None` is the idle state.
    pub subsystem: Option<SubsystemId>,
    /// Ports committed to `subsystem`, ascending.
    pub used_ports: Vec<PortId>,
}

impl Resolution {
    /// Registry with `Used`/`Unused` roles rewritten to this resolution.
    pub fn apply(&self, ports: &PortRegistry) -> PortRegistry {
        ports.with_usage(&self.used_ports)
    }
}

pub fn resolve(ports: &PortRegistry, catalog: &SubsystemCatalog) -> Resolution {
    let wires = ports.effective_wires();
    catalog
        .defs()
        .iter()
        .rev()
        .filter(|def| !def.is_base())
        .find_map(|def| {
            match_requirement(&def.requirement, &wires).map(|used_ports| Resolution {
                subsystem: Some(def.id),
                used_ports,
            })
        })
        .unwrap_or_default()
}

/// Ports that satisfy `requirement`, or `None` when it does not match.
/// `wires[i]` is the effective wire of port `i` (recharging ports are empty).
pub fn match_requirement(
    requirement: &Requirement,
    wires: &[Option<WireColor>],
) -> Option<Vec<PortId>> {
    match requirement {
        Requirement::Sequence(slots) => match_sequence(slots, wires),
        Requirement::Set(colors) => match_set(colors, wires),
    }
}

fn match_sequence(slots: &[SequenceSlot], wires: &[Option<WireColor>]) -> Option<Vec<PortId>> {
    let mut used = Vec::new();
    for (port, wire) in wires.iter().enumerate() {
        match slots.get(port).copied().unwrap_or(SequenceSlot::Any) {
            SequenceSlot::Any => {}
            SequenceSlot::Empty => {
                if wire.is_some() {
                    return None;
                }
            }
            SequenceSlot::Wire(required) => {
                if *wire != Some(required) {
                    return None;
                }
                used.push(port);
            }
        }
    }
    Some(used)
}

fn match_set(colors: &[WireColor], wires: &[Option<WireColor>]) -> Option<Vec<PortId>> {
    let mut used: Vec<PortId> = Vec::with_capacity(colors.len());
    for required in colors {
        let port = (0..wires.len())
            .find(|port| wires[*port] == Some(*required) && !used.contains(port))?;
        used.push(port);
    }
    used.sort_unstable();
    Some(used)
}
