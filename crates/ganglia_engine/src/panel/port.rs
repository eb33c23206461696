use serde::Serialize;

use crate::Millis;

use super::wire::{WireCatalog, WireColor};

/// Position of a port inside its bay, starting at 0.
pub type PortId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortStatus {
    Unplugged,
    Unused { wire: WireColor },
    Used { wire: WireColor },
    /// Recharging. The wire is still physically inserted but counts as
    /// empty for matching until `expiration`.
    Disabled { wire: WireColor, expiration: Millis },
}

impl PortStatus {
    pub fn wire(&self) -> Option<WireColor> {
        match *self {
            PortStatus::Unplugged => None,
            PortStatus::Unused { wire }
            | PortStatus::Used { wire }
            | PortStatus::Disabled { wire, .. } => Some(wire),
        }
    }

    /// Wire that counts toward subsystem matching.
    pub fn effective_wire(&self) -> Option<WireColor> {
        match *self {
            PortStatus::Unused { wire } | PortStatus::Used { wire } => Some(wire),
            PortStatus::Unplugged | PortStatus::Disabled { .. } => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, PortStatus::Disabled { .. })
    }

    pub fn expiration(&self) -> Option<Millis> {
        match *self {
            PortStatus::Disabled { expiration, .. } => Some(expiration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Port {
    pub id: PortId,
    pub status: PortStatus,
}

/// Ordered ports of one bay. Every transition returns a new registry and
/// leaves `self` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PortRegistry {
    ports: Vec<Port>,
}

impl PortRegistry {
    pub fn new(port_count: usize) -> Self {
        Self {
            ports: (0..port_count)
                .map(|id| Port {
                    id,
                    status: PortStatus::Unplugged,
                })
                .collect(),
        }
    }

    /// Registry whose ports hold the given wires as `Unused`.
    pub fn from_wires(wires: &[Option<WireColor>]) -> Self {
        Self {
            ports: wires
                .iter()
                .enumerate()
                .map(|(id, wire)| Port {
                    id,
                    status: match wire {
                        Some(wire) => PortStatus::Unused { wire: *wire },
                        None => PortStatus::Unplugged,
                    },
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn get(&self, id: PortId) -> Option<&Port> {
        self.ports.get(id)
    }

    pub fn status(&self, id: PortId) -> Option<PortStatus> {
        self.ports.get(id).map(|port| port.status)
    }

    pub fn effective_wires(&self) -> Vec<Option<WireColor>> {
        self.ports
            .iter()
            .map(|port| port.status.effective_wire())
            .collect()
    }

    pub fn used_ports(&self) -> Vec<PortId> {
        self.ports
            .iter()
            .filter(|port| matches!(port.status, PortStatus::Used { .. }))
            .map(|port| port.id)
            .collect()
    }

    pub fn has_disabled(&self) -> bool {
        self.ports.iter().any(|port| port.status.is_disabled())
    }

    pub fn next_expiration(&self) -> Option<Millis> {
        self.ports
            .iter()
            .filter_map(|port| port.status.expiration())
            .min()
    }

    /// True when the wire is physically inserted anywhere in this bay,
    /// recharging ports included.
    pub fn holds_wire(&self, wire: WireColor) -> bool {
        self.ports
            .iter()
            .any(|port| port.status.wire() == Some(wire))
    }

    #[must_use]
    pub fn plug(&self, id: PortId, wire: WireColor) -> Self {
        self.with_port(id, |status| match status {
            PortStatus::Disabled { .. } => status,
            _ => PortStatus::Unused { wire },
        })
    }

    #[must_use]
    pub fn unplug(&self, id: PortId) -> Self {
        self.with_port(id, |status| match status {
            PortStatus::Disabled { .. } => status,
            _ => PortStatus::Unplugged,
        })
    }

    /// Advances the port to the next color of `catalog`, or empties it after
    /// the last color. A recharging port rejects the cycle like any plug.
    #[must_use]
    pub fn cycle(&self, id: PortId, catalog: &WireCatalog) -> Self {
        let Some(status) = self.status(id) else {
            return self.clone();
        };
        if status.is_disabled() {
            return self.clone();
        }
        match catalog.next_after(status.wire()) {
            Some(wire) => self.plug(id, wire),
            None => self.unplug(id),
        }
    }

    #[must_use]
    pub fn apply_disable(&self, ids: &[PortId], duration_ms: Millis, now: Millis) -> Self {
        let expiration = now.saturating_add(duration_ms);
        let mut next = self.clone();
        for port in &mut next.ports {
            if !ids.contains(&port.id) {
                continue;
            }
            if let PortStatus::Unused { wire } | PortStatus::Used { wire } = port.status {
                port.status = PortStatus::Disabled { wire, expiration };
            }
        }
        next
    }

    /// Recharged ports come back empty: the player has to plug them again.
    #[must_use]
    pub fn apply_expiry(&self, now: Millis) -> Self {
        let mut next = self.clone();
        for port in &mut next.ports {
            if let PortStatus::Disabled { expiration, .. } = port.status {
                if expiration <= now {
                    port.status = PortStatus::Unplugged;
                }
            }
        }
        next
    }

    /// Marks exactly `used` as `Used`; every other non-disabled plugged port
    /// becomes `Unused`.
    #[must_use]
    pub fn with_usage(&self, used: &[PortId]) -> Self {
        let mut next = self.clone();
        for port in &mut next.ports {
            port.status = match port.status {
                PortStatus::Unused { wire } | PortStatus::Used { wire } => {
                    if used.contains(&port.id) {
                        PortStatus::Used { wire }
                    } else {
                        PortStatus::Unused { wire }
                    }
                }
                other => other,
            };
        }
        next
    }

    fn with_port<F>(&self, id: PortId, update: F) -> Self
    where
        F: FnOnce(PortStatus) -> PortStatus,
    {
        let mut next = self.clone();
        if let Some(port) = next.ports.get_mut(id) {
            port.status = update(port.status);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::wire::colors::{BLUE, RED, YELLOW};

    fn disabled_registry() -> PortRegistry {
        PortRegistry::new(3)
            .plug(0, RED)
            .apply_disable(&[0], 1_000, 500)
    }

    #[test]
    fn plug_overwrites_and_out_of_range_is_ignored() {
        let ports = PortRegistry::new(2).plug(0, RED).plug(0, BLUE);
        assert_eq!(ports.status(0), Some(PortStatus::Unused { wire: BLUE }));

        let unchanged = ports.plug(7, YELLOW).unplug(9);
        assert_eq!(unchanged, ports);
    }

    #[test]
    fn plug_does_not_mutate_previous_snapshot() {
        let before = PortRegistry::new(2);
        let after = before.plug(1, RED);
        assert_eq!(before.status(1), Some(PortStatus::Unplugged));
        assert_eq!(after.status(1), Some(PortStatus::Unused { wire: RED }));
    }

    #[test]
    fn disabled_port_rejects_plug_unplug_and_cycle() {
        let ports = disabled_registry();
        let expected = Some(PortStatus::Disabled {
            wire: RED,
            expiration: 1_500,
        });

        assert_eq!(ports.plug(0, BLUE).status(0), expected);
        assert_eq!(ports.unplug(0).status(0), expected);
        assert_eq!(ports.cycle(0, &WireCatalog::standard()).status(0), expected);
    }

    #[test]
    fn disable_then_expiry_at_expiration_returns_unplugged() {
        let ports = PortRegistry::new(2)
            .plug(0, RED)
            .plug(1, BLUE)
            .with_usage(&[0]);
        let disabled = ports.apply_disable(&[0, 1], 3_000, 1_000);
        assert_eq!(disabled.next_expiration(), Some(4_000));

        let early = disabled.apply_expiry(3_999);
        assert!(early.status(0).is_some_and(|status| status.is_disabled()));

        let expired = disabled.apply_expiry(4_000);
        assert_eq!(expired.status(0), Some(PortStatus::Unplugged));
        assert_eq!(expired.status(1), Some(PortStatus::Unplugged));
        assert!(!expired.has_disabled());
    }

    #[test]
    fn apply_disable_skips_empty_ports() {
        let ports = PortRegistry::new(2).plug(0, RED).apply_disable(&[0, 1], 10, 0);
        assert_eq!(ports.status(1), Some(PortStatus::Unplugged));
    }

    #[test]
    fn with_usage_demotes_previous_used_to_unused() {
        let ports = PortRegistry::new(3)
            .plug(0, RED)
            .plug(1, BLUE)
            .with_usage(&[0, 1])
            .with_usage(&[1]);
        assert_eq!(ports.status(0), Some(PortStatus::Unused { wire: RED }));
        assert_eq!(ports.status(1), Some(PortStatus::Used { wire: BLUE }));
        assert_eq!(ports.used_ports(), vec![1]);
    }

    #[test]
    fn cycle_walks_colors_then_unplugs() {
        let catalog = WireCatalog::new(["red", "blue"]).expect("catalog");
        let ports = PortRegistry::new(1).cycle(0, &catalog);
        assert_eq!(ports.status(0), Some(PortStatus::Unused { wire: WireColor(0) }));
        let ports = ports.cycle(0, &catalog);
        assert_eq!(ports.status(0), Some(PortStatus::Unused { wire: WireColor(1) }));
        let ports = ports.cycle(0, &catalog);
        assert_eq!(ports.status(0), Some(PortStatus::Unplugged));
    }

    #[test]
    fn disabled_wire_is_held_but_not_effective() {
        let ports = disabled_registry();
        assert!(ports.holds_wire(RED));
        assert_eq!(ports.effective_wires(), vec![None, None, None]);
    }
}
