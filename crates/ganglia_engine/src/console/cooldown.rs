use serde::Serialize;
use tracing::debug;

use crate::catalog::{SubsystemCatalog, SubsystemDef, SubsystemId};
use crate::panel::PortRegistry;
use crate::Millis;

use super::command::BayId;
use super::driver::ConsoleTimer;
use super::scheduler::{Scheduler, TimerId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPhase {
    #[default]
    Idle,
    Engaged,
    Cooling,
}

impl CooldownPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            CooldownPhase::Idle => "idle",
            CooldownPhase::Engaged => "engaged",
            CooldownPhase::Cooling => "cooling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CooldownState {
    Idle,
    Engaged {
        subsystem: SubsystemId,
        timer: TimerId,
    },
    Cooling {
        subsystem: SubsystemId,
        timer: TimerId,
    },
}

/// Overheat/recharge cycle of one bay. Owns the bay's timer handles.
#[derive(Debug)]
pub(crate) struct Cooldown {
    bay: BayId,
    state: CooldownState,
    /// Subsystem whose countdown ended without any port to disable. It may
    /// not engage again until the bay resolves to something else.
    spent: Option<SubsystemId>,
}

impl Cooldown {
    pub(crate) fn new(bay: BayId) -> Self {
        Self {
            bay,
            state: CooldownState::Idle,
            spent: None,
        }
    }

    pub(crate) fn phase(&self) -> CooldownPhase {
        match self.state {
            CooldownState::Idle => CooldownPhase::Idle,
            CooldownState::Engaged { .. } => CooldownPhase::Engaged,
            CooldownState::Cooling { .. } => CooldownPhase::Cooling,
        }
    }

    /// Starts the overheat countdown when the bay is idle and a subsystem is
    /// active. A running countdown is never reset by a different subsystem.
    pub(crate) fn observe(
        &mut self,
        active: Option<&SubsystemDef>,
        now: Millis,
        timers: &mut Scheduler<ConsoleTimer>,
    ) {
        let Some(def) = active else {
            self.spent = None;
            return;
        };
        if self.spent.is_some_and(|spent| spent != def.id) {
            self.spent = None;
        }
        match self.state {
            CooldownState::Idle if self.spent == Some(def.id) => {}
            CooldownState::Idle => {
                let fires_at = now.saturating_add(def.enabled_ms);
                let timer = timers.schedule(fires_at, ConsoleTimer::Overheat(self.bay));
                self.state = CooldownState::Engaged {
                    subsystem: def.id,
                    timer,
                };
                debug!(
                    bay = %self.bay,
                    subsystem = %def.id,
                    fires_at,
                    "subsystem_engaged"
                );
            }
            CooldownState::Engaged { subsystem, timer } if subsystem != def.id => {
                debug!(
                    bay = %self.bay,
                    engaged = %subsystem,
                    active = %def.id,
                    fires_at = ?timers.deadline(timer),
                    "engagement_countdown_kept"
                );
            }
            _ => {}
        }
    }

    /// Countdown elapsed: every port currently `Used` starts recharging.
    /// Returns the new registry, or `None` for a stale timer.
    pub(crate) fn overheat(
        &mut self,
        timer: TimerId,
        ports: &PortRegistry,
        catalog: &SubsystemCatalog,
        fired_at: Millis,
        timers: &mut Scheduler<ConsoleTimer>,
    ) -> Option<PortRegistry> {
        let CooldownState::Engaged {
            subsystem,
            timer: expected,
        } = self.state
        else {
            return None;
        };
        if expected != timer {
            return None;
        }

        let used = ports.used_ports();
        if used.is_empty() {
            self.state = CooldownState::Idle;
            self.spent = Some(subsystem);
            debug!(bay = %self.bay, subsystem = %subsystem, "overheat_without_used_ports");
            return Some(ports.clone());
        }

        let disabled_ms = catalog.get(subsystem).map_or(0, |def| def.disabled_ms);
        let next = ports.apply_disable(&used, disabled_ms, fired_at);
        let recharge_at = next
            .next_expiration()
            .unwrap_or_else(|| fired_at.saturating_add(disabled_ms));
        let timer = timers.schedule(recharge_at, ConsoleTimer::Recharge(self.bay));
        self.state = CooldownState::Cooling { subsystem, timer };
        debug!(
            bay = %self.bay,
            subsystem = %subsystem,
            ports = ?used,
            recharge_at,
            "subsystem_overheated"
        );
        Some(next)
    }

    /// Recharge deadline reached: expired ports come back unplugged, and
    /// the bay idles once nothing is left recharging.
    pub(crate) fn recharge(
        &mut self,
        timer: TimerId,
        ports: &PortRegistry,
        fired_at: Millis,
        timers: &mut Scheduler<ConsoleTimer>,
    ) -> Option<PortRegistry> {
        let CooldownState::Cooling {
            subsystem,
            timer: expected,
        } = self.state
        else {
            return None;
        };
        if expected != timer {
            return None;
        }

        let next = ports.apply_expiry(fired_at);
        match next.next_expiration() {
            Some(at) => {
                let timer = timers.schedule(at, ConsoleTimer::Recharge(self.bay));
                self.state = CooldownState::Cooling { subsystem, timer };
            }
            None => {
                self.state = CooldownState::Idle;
                debug!(bay = %self.bay, subsystem = %subsystem, "subsystem_recharged");
            }
        }
        Some(next)
    }

    pub(crate) fn cancel(&mut self, timers: &mut Scheduler<ConsoleTimer>) {
        match self.state {
            CooldownState::Engaged { timer, .. } | CooldownState::Cooling { timer, .. } => {
                timers.cancel(timer);
            }
            CooldownState::Idle => {}
        }
        self.state = CooldownState::Idle;
        self.spent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SubsystemDef;
    use crate::panel::colors::{BLUE, RED};
    use crate::panel::{PortStatus, WireCatalog};

    fn catalog() -> SubsystemCatalog {
        SubsystemCatalog::new(
            vec![
                SubsystemDef::base(0, "idle"),
                SubsystemDef::set(1, "laser", vec![RED], 1_000, 2_000),
                SubsystemDef::set(2, "beam", vec![RED, BLUE], 1_000, 3_000),
            ],
            3,
            &WireCatalog::standard(),
        )
        .expect("catalog")
    }

    #[test]
    fn full_cycle_idle_engaged_cooling_idle() {
        let catalog = catalog();
        let mut timers = Scheduler::new();
        let mut cooldown = Cooldown::new(BayId(0));
        let ports = PortRegistry::new(3).plug(0, RED).with_usage(&[0]);

        cooldown.observe(catalog.get(SubsystemId(1)), 100, &mut timers);
        assert_eq!(cooldown.phase(), CooldownPhase::Engaged);

        let fired = timers.pop_due(1_100).expect("overheat due");
        assert_eq!(fired.kind, ConsoleTimer::Overheat(BayId(0)));
        let ports = cooldown
            .overheat(fired.id, &ports, &catalog, fired.at, &mut timers)
            .expect("overheat applies");
        assert_eq!(cooldown.phase(), CooldownPhase::Cooling);
        assert_eq!(
            ports.status(0),
            Some(PortStatus::Disabled {
                wire: RED,
                expiration: 3_100
            })
        );

        let fired = timers.pop_due(3_100).expect("recharge due");
        let ports = cooldown
            .recharge(fired.id, &ports, fired.at, &mut timers)
            .expect("recharge applies");
        assert_eq!(cooldown.phase(), CooldownPhase::Idle);
        assert_eq!(ports.status(0), Some(PortStatus::Unplugged));
        assert!(timers.is_empty());
    }

    #[test]
    fn different_subsystem_keeps_running_countdown() {
        let catalog = catalog();
        let mut timers = Scheduler::new();
        let mut cooldown = Cooldown::new(BayId(0));

        cooldown.observe(catalog.get(SubsystemId(1)), 0, &mut timers);
        cooldown.observe(catalog.get(SubsystemId(2)), 600, &mut timers);

        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(1_000));
    }

    #[test]
    fn overheat_with_nothing_used_returns_to_idle() {
        let catalog = catalog();
        let mut timers = Scheduler::new();
        let mut cooldown = Cooldown::new(BayId(0));

        cooldown.observe(catalog.get(SubsystemId(1)), 0, &mut timers);
        let fired = timers.pop_due(1_000).expect("overheat due");
        let ports = PortRegistry::new(3);
        cooldown.overheat(fired.id, &ports, &catalog, fired.at, &mut timers);

        assert_eq!(cooldown.phase(), CooldownPhase::Idle);
        assert!(timers.is_empty());
    }

    #[test]
    fn subsystem_spent_without_used_ports_waits_for_a_change() {
        let catalog = catalog();
        let mut timers = Scheduler::new();
        let mut cooldown = Cooldown::new(BayId(0));
        let laser = catalog.get(SubsystemId(1));

        cooldown.observe(laser, 0, &mut timers);
        let fired = timers.pop_due(1_000).expect("overheat due");
        cooldown.overheat(fired.id, &PortRegistry::new(3), &catalog, fired.at, &mut timers);

        cooldown.observe(laser, 1_000, &mut timers);
        assert_eq!(cooldown.phase(), CooldownPhase::Idle);
        assert!(timers.is_empty());

        cooldown.observe(None, 1_200, &mut timers);
        cooldown.observe(laser, 1_300, &mut timers);
        assert_eq!(cooldown.phase(), CooldownPhase::Engaged);
        assert_eq!(timers.next_deadline(), Some(2_300));
    }

    #[test]
    fn cancel_drops_pending_timer() {
        let catalog = catalog();
        let mut timers = Scheduler::new();
        let mut cooldown = Cooldown::new(BayId(0));

        cooldown.observe(catalog.get(SubsystemId(1)), 0, &mut timers);
        cooldown.cancel(&mut timers);

        assert_eq!(cooldown.phase(), CooldownPhase::Idle);
        assert!(timers.is_empty());
    }
}
