use serde::Serialize;
use tracing::debug;

use crate::Millis;

use super::config::ShieldTimings;
use super::driver::ConsoleTimer;
use super::scheduler::{Scheduler, TimerId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShieldPhase {
    #[default]
    Ready,
    Active,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShieldChange {
    Raised,
    Lowered { cancelled: bool, ready_at: Millis },
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShieldState {
    Ready,
    Active { timer: TimerId },
    Disabled { timer: TimerId, ready_at: Millis },
}

/// User-toggled shield. Lowering it early earns the shorter cooldown.
#[derive(Debug)]
pub(crate) struct Shield {
    timings: ShieldTimings,
    state: ShieldState,
}

impl Shield {
    pub(crate) fn new(timings: ShieldTimings) -> Self {
        Self {
            timings,
            state: ShieldState::Ready,
        }
    }

    pub(crate) fn phase(&self) -> ShieldPhase {
        match self.state {
            ShieldState::Ready => ShieldPhase::Ready,
            ShieldState::Active { .. } => ShieldPhase::Active,
            ShieldState::Disabled { .. } => ShieldPhase::Disabled,
        }
    }

    pub(crate) fn ready_at(&self) -> Option<Millis> {
        match self.state {
            ShieldState::Disabled { ready_at, .. } => Some(ready_at),
            _ => None,
        }
    }

    pub(crate) fn toggle(
        &mut self,
        now: Millis,
        timers: &mut Scheduler<ConsoleTimer>,
    ) -> Option<ShieldChange> {
        match self.state {
            ShieldState::Ready => {
                let expires_at = now.saturating_add(self.timings.active_ms);
                let timer = timers.schedule(expires_at, ConsoleTimer::ShieldExpire);
                self.state = ShieldState::Active { timer };
                debug!(expires_at, "shield_raised");
                Some(ShieldChange::Raised)
            }
            ShieldState::Active { timer } => {
                timers.cancel(timer);
                Some(self.lower(now, self.timings.cancel_cooldown_ms, true, timers))
            }
            ShieldState::Disabled { ready_at, .. } => {
                debug!(ready_at, "shield_toggle_ignored_recharging");
                None
            }
        }
    }

    pub(crate) fn expire(
        &mut self,
        timer: TimerId,
        fired_at: Millis,
        timers: &mut Scheduler<ConsoleTimer>,
    ) -> Option<ShieldChange> {
        match self.state {
            ShieldState::Active { timer: expected } if expected == timer => Some(self.lower(
                fired_at,
                self.timings.expiry_cooldown_ms,
                false,
                timers,
            )),
            _ => None,
        }
    }

    pub(crate) fn recharge(&mut self, timer: TimerId) -> Option<ShieldChange> {
        match self.state {
            ShieldState::Disabled {
                timer: expected, ..
            } if expected == timer => {
                self.state = ShieldState::Ready;
                debug!("shield_ready");
                Some(ShieldChange::Ready)
            }
            _ => None,
        }
    }

    fn lower(
        &mut self,
        now: Millis,
        cooldown_ms: Millis,
        cancelled: bool,
        timers: &mut Scheduler<ConsoleTimer>,
    ) -> ShieldChange {
        let ready_at = now.saturating_add(cooldown_ms);
        let timer = timers.schedule(ready_at, ConsoleTimer::ShieldReady);
        self.state = ShieldState::Disabled { timer, ready_at };
        debug!(cancelled, ready_at, "shield_lowered");
        ShieldChange::Lowered {
            cancelled,
            ready_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings() -> ShieldTimings {
        ShieldTimings {
            active_ms: 4_000,
            cancel_cooldown_ms: 1_000,
            expiry_cooldown_ms: 5_000,
        }
    }

    #[test]
    fn early_cancel_uses_short_cooldown() {
        let mut timers = Scheduler::new();
        let mut shield = Shield::new(timings());

        assert_eq!(shield.toggle(0, &mut timers), Some(ShieldChange::Raised));
        assert_eq!(
            shield.toggle(2_500, &mut timers),
            Some(ShieldChange::Lowered {
                cancelled: true,
                ready_at: 3_500
            })
        );
        assert_eq!(timers.len(), 1, "expiry timer was cancelled");
        assert_eq!(shield.ready_at(), Some(3_500));
    }

    #[test]
    fn natural_expiry_uses_long_cooldown() {
        let mut timers = Scheduler::new();
        let mut shield = Shield::new(timings());
        shield.toggle(0, &mut timers);

        let fired = timers.pop_due(4_000).expect("expiry due");
        assert_eq!(fired.kind, ConsoleTimer::ShieldExpire);
        assert_eq!(
            shield.expire(fired.id, fired.at, &mut timers),
            Some(ShieldChange::Lowered {
                cancelled: false,
                ready_at: 9_000
            })
        );

        let fired = timers.pop_due(9_000).expect("ready due");
        assert_eq!(shield.recharge(fired.id), Some(ShieldChange::Ready));
        assert_eq!(shield.phase(), ShieldPhase::Ready);
    }

    #[test]
    fn toggle_while_recharging_is_ignored() {
        let mut timers = Scheduler::new();
        let mut shield = Shield::new(timings());
        shield.toggle(0, &mut timers);
        shield.toggle(100, &mut timers);

        assert_eq!(shield.toggle(200, &mut timers), None);
        assert_eq!(shield.phase(), ShieldPhase::Disabled);
    }
}
