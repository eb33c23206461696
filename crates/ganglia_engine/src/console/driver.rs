use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{resolve, CatalogError, SubsystemCatalog, SubsystemDef, SubsystemId};
use crate::panel::{PortId, PortRegistry, WireCatalog, WireColor};
use crate::Millis;

use super::command::{BayId, BayKind, CommandSink, ConsoleCommand, Movement};
use super::config::{ConfigError, ConsoleConfig};
use super::cooldown::{Cooldown, CooldownPhase};
use super::scheduler::{FiredTimer, Scheduler};
use super::shield::{Shield, ShieldChange, ShieldPhase};
use super::snapshot::{ServerState, ServerView, SnapshotPoll, SnapshotVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleTimer {
    Overheat(BayId),
    Recharge(BayId),
    ShieldExpire,
    ShieldReady,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BayConfig {
    pub id: BayId,
    pub name: String,
    pub kind: BayKind,
    pub port_count: usize,
    pub subsystems: Vec<SubsystemDef>,
}

/// Inbound events, from the player or the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    PlugWire {
        bay: BayId,
        port: PortId,
        wire: WireColor,
    },
    UnplugWire {
        bay: BayId,
        port: PortId,
    },
    CycleWire {
        bay: BayId,
        port: PortId,
    },
    ToggleShield,
    HoldMovement(Movement),
    SelectEnergy(WireColor),
    Snapshot {
        seq: u64,
        state: ServerState,
    },
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bay {bay} must have at least one port")]
    EmptyBay { bay: BayId },
    #[error("bay {bay} is already mounted")]
    DuplicateBay { bay: BayId },
    #[error("bay {bay} has an invalid subsystem catalog: {source}")]
    Catalog {
        bay: BayId,
        #[source]
        source: CatalogError,
    },
}

#[derive(Debug)]
struct Bay {
    id: BayId,
    name: String,
    kind: BayKind,
    catalog: SubsystemCatalog,
    ports: PortRegistry,
    active: Option<SubsystemId>,
    last_command: ConsoleCommand,
    cooldown: Cooldown,
}

#[derive(Debug, Clone, Serialize)]
pub struct BayDump {
    pub id: BayId,
    pub name: String,
    pub kind: BayKind,
    pub ports: PortRegistry,
    pub active: Option<SubsystemId>,
    pub active_name: Option<String>,
    pub cooldown: CooldownPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsoleDump {
    pub now: Millis,
    pub bays: Vec<BayDump>,
    pub shield: ShieldPhase,
    pub shield_ready_at: Option<Millis>,
    pub movement: Movement,
    pub energy: Option<WireColor>,
    pub server: ServerView,
}

/// Single-threaded control panel. Every mutation goes through
/// [`Console::handle`] or the queue drained by [`Console::pump`]; due timers
/// always fire, each with a full resolve-and-emit cycle, before the next
/// event is applied.
#[derive(Debug)]
pub struct Console<S> {
    wires: WireCatalog,
    config: ConsoleConfig,
    bays: Vec<Bay>,
    timers: Scheduler<ConsoleTimer>,
    shield: Shield,
    movement: Movement,
    energy: Option<WireColor>,
    server: ServerView,
    poll: SnapshotPoll,
    queue: VecDeque<ConsoleEvent>,
    sink: S,
    now: Millis,
}

impl<S: CommandSink> Console<S> {
    pub fn new(
        wires: WireCatalog,
        config: ConsoleConfig,
        sink: S,
        now: Millis,
    ) -> Result<Self, ConsoleError> {
        config.validate()?;
        Ok(Self {
            wires,
            config,
            bays: Vec::new(),
            timers: Scheduler::new(),
            shield: Shield::new(config.shield),
            movement: Movement::Stop,
            energy: None,
            server: ServerView::default(),
            poll: SnapshotPoll::new(config.poll, now),
            queue: VecDeque::new(),
            sink,
            now,
        })
    }

    pub fn mount_bay(&mut self, config: BayConfig) -> Result<BayId, ConsoleError> {
        let bay = config.id;
        if config.port_count == 0 {
            return Err(ConsoleError::EmptyBay { bay });
        }
        if self.bay_index(bay).is_some() {
            return Err(ConsoleError::DuplicateBay { bay });
        }
        let catalog = SubsystemCatalog::new(config.subsystems, config.port_count, &self.wires)
            .map_err(|source| ConsoleError::Catalog { bay, source })?;

        info!(
            bay = %bay,
            name = %config.name,
            kind = ?config.kind,
            ports = config.port_count,
            subsystems = catalog.defs().len(),
            "bay_mounted"
        );
        self.bays.push(Bay {
            id: bay,
            name: config.name,
            kind: config.kind,
            catalog,
            ports: PortRegistry::new(config.port_count),
            active: None,
            last_command: ConsoleCommand::for_bay(config.kind, bay, None),
            cooldown: Cooldown::new(bay),
        });
        Ok(bay)
    }

    /// Tears the bay down along with every timer it owns.
    pub fn remove_bay(&mut self, bay: BayId) -> bool {
        let Some(index) = self.bay_index(bay) else {
            return false;
        };
        let mut removed = self.bays.remove(index);
        removed.cooldown.cancel(&mut self.timers);
        info!(bay = %bay, name = %removed.name, "bay_removed");
        true
    }

    pub fn push(&mut self, event: ConsoleEvent) {
        self.queue.push_back(event);
    }

    /// Fires due timers, drains queued events, then issues a snapshot
    /// request if one is due.
    pub fn pump(&mut self, now: Millis) {
        self.advance(now);
        while let Some(event) = self.queue.pop_front() {
            self.apply(event);
            self.advance(now);
        }
        if let Some(seq) = self.poll.poll_due(self.now) {
            self.sink.request_snapshot(seq);
        }
    }

    pub fn handle(&mut self, event: ConsoleEvent, now: Millis) {
        self.advance(now);
        self.apply(event);
        self.advance(now);
    }

    /// Fires every timer due at or before `now`, in deadline order. Each
    /// one runs at its own deadline.
    pub fn advance(&mut self, now: Millis) {
        while let Some(fired) = self.timers.pop_due(now) {
            self.now = self.now.max(fired.at);
            self.fire(fired);
        }
        self.now = self.now.max(now);
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn wires(&self) -> &WireCatalog {
        &self.wires
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn bay_ids(&self) -> Vec<BayId> {
        self.bays.iter().map(|bay| bay.id).collect()
    }

    pub fn ports(&self, bay: BayId) -> Option<&PortRegistry> {
        self.bay(bay).map(|bay| &bay.ports)
    }

    pub fn active_subsystem(&self, bay: BayId) -> Option<SubsystemId> {
        self.bay(bay).and_then(|bay| bay.active)
    }

    pub fn cooldown_phase(&self, bay: BayId) -> Option<CooldownPhase> {
        self.bay(bay).map(|bay| bay.cooldown.phase())
    }

    pub fn shield_phase(&self) -> ShieldPhase {
        self.shield.phase()
    }

    pub fn movement(&self) -> Movement {
        self.movement
    }

    pub fn energy(&self) -> Option<WireColor> {
        self.energy
    }

    pub fn server(&self) -> &ServerView {
        &self.server
    }

    pub fn is_loading(&self) -> bool {
        !self.server.loaded
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn dump(&self) -> ConsoleDump {
        ConsoleDump {
            now: self.now,
            bays: self
                .bays
                .iter()
                .map(|bay| BayDump {
                    id: bay.id,
                    name: bay.name.clone(),
                    kind: bay.kind,
                    ports: bay.ports.clone(),
                    active: bay.active,
                    active_name: bay
                        .active
                        .and_then(|id| bay.catalog.get(id))
                        .map(|def| def.name.clone()),
                    cooldown: bay.cooldown.phase(),
                })
                .collect(),
            shield: self.shield.phase(),
            shield_ready_at: self.shield.ready_at(),
            movement: self.movement,
            energy: self.energy,
            server: self.server.clone(),
        }
    }

    fn bay(&self, bay: BayId) -> Option<&Bay> {
        self.bays.iter().find(|candidate| candidate.id == bay)
    }

    fn bay_index(&self, bay: BayId) -> Option<usize> {
        self.bays.iter().position(|candidate| candidate.id == bay)
    }

    fn apply(&mut self, event: ConsoleEvent) {
        let now = self.now;
        match event {
            ConsoleEvent::PlugWire { bay, port, wire } => self.plug(bay, port, wire, now),
            ConsoleEvent::UnplugWire { bay, port } => self.unplug(bay, port, now),
            ConsoleEvent::CycleWire { bay, port } => self.cycle(bay, port, now),
            ConsoleEvent::ToggleShield => {
                if let Some(change) = self.shield.toggle(now, &mut self.timers) {
                    self.emit_shield(change);
                }
            }
            ConsoleEvent::HoldMovement(movement) => self.hold_movement(movement),
            ConsoleEvent::SelectEnergy(wire) => self.select_energy(wire),
            ConsoleEvent::Snapshot { seq, state } => self.merge_snapshot(seq, state, now),
        }
    }

    /// Index of the bay when `port` exists and is not recharging.
    fn writable_port(&self, bay: BayId, port: PortId, action: &'static str) -> Option<usize> {
        let Some(index) = self.bay_index(bay) else {
            warn!(bay = %bay, port, action, "unknown_bay_ignored");
            return None;
        };
        match self.bays[index].ports.status(port) {
            None => {
                warn!(bay = %bay, port, action, "port_out_of_range_ignored");
                None
            }
            Some(status) if status.is_disabled() => {
                debug!(bay = %bay, port, action, "disabled_port_ignored");
                None
            }
            Some(_) => Some(index),
        }
    }

    fn wire_held_elsewhere(&self, index: usize, port: PortId, wire: WireColor) -> bool {
        self.bays.iter().enumerate().any(|(bay_index, bay)| {
            if bay_index == index {
                bay.ports.unplug(port).holds_wire(wire)
            } else {
                bay.ports.holds_wire(wire)
            }
        })
    }

    fn plug(&mut self, bay: BayId, port: PortId, wire: WireColor, now: Millis) {
        if !self.wires.contains(wire) {
            warn!(bay = %bay, port, wire = %wire, "unknown_wire_ignored");
            return;
        }
        let Some(index) = self.writable_port(bay, port, "plug") else {
            return;
        };
        if self.config.exclusive_wires && self.wire_held_elsewhere(index, port, wire) {
            debug!(bay = %bay, port, wire = %self.wires.label(wire), "wire_in_use_ignored");
            return;
        }

        let target = &mut self.bays[index];
        target.ports = target.ports.plug(port, wire);
        debug!(bay = %bay, port, wire = %self.wires.label(wire), "wire_plugged");
        self.reconcile(index, now);
    }

    fn unplug(&mut self, bay: BayId, port: PortId, now: Millis) {
        let Some(index) = self.writable_port(bay, port, "unplug") else {
            return;
        };
        let target = &mut self.bays[index];
        target.ports = target.ports.unplug(port);
        debug!(bay = %bay, port, "wire_unplugged");
        self.reconcile(index, now);
    }

    fn cycle(&mut self, bay: BayId, port: PortId, now: Millis) {
        let Some(index) = self.writable_port(bay, port, "cycle") else {
            return;
        };

        let ports = if self.config.exclusive_wires {
            let current = self.bays[index]
                .ports
                .status(port)
                .and_then(|status| status.wire());
            let mut next = self.wires.next_after(current);
            while let Some(wire) = next {
                if !self.wire_held_elsewhere(index, port, wire) {
                    break;
                }
                next = self.wires.next_after(Some(wire));
            }
            match next {
                Some(wire) => self.bays[index].ports.plug(port, wire),
                None => self.bays[index].ports.unplug(port),
            }
        } else {
            self.bays[index].ports.cycle(port, &self.wires)
        };

        self.bays[index].ports = ports;
        debug!(bay = %bay, port, "wire_cycled");
        self.reconcile(index, now);
    }

    /// Re-resolves one bay, rewrites port roles, emits on change and lets
    /// the cooldown start a countdown.
    fn reconcile(&mut self, index: usize, now: Millis) {
        let Self {
            bays, timers, sink, ..
        } = self;
        let bay = &mut bays[index];

        let resolution = resolve(&bay.ports, &bay.catalog);
        bay.ports = resolution.apply(&bay.ports);
        if resolution.subsystem != bay.active {
            debug!(
                bay = %bay.id,
                from = ?bay.active,
                to = ?resolution.subsystem,
                used_ports = ?resolution.used_ports,
                "subsystem_resolved"
            );
            bay.active = resolution.subsystem;
        }

        let command = ConsoleCommand::for_bay(bay.kind, bay.id, bay.active);
        if command != bay.last_command {
            bay.last_command = command;
            emit(sink, command);
        }

        let before = bay.cooldown.phase();
        let active_def = bay.active.and_then(|id| bay.catalog.get(id));
        bay.cooldown.observe(active_def, now, timers);
        emit_phase_change(sink, bay, before);
    }

    fn fire(&mut self, fired: FiredTimer<ConsoleTimer>) {
        debug!(timer = ?fired.kind, at = fired.at, "timer_fired");
        match fired.kind {
            ConsoleTimer::Overheat(bay) | ConsoleTimer::Recharge(bay) => {
                let Some(index) = self.bay_index(bay) else {
                    debug!(bay = %bay, "timer_for_removed_bay_dropped");
                    return;
                };
                let Self {
                    bays, timers, sink, ..
                } = self;
                let target = &mut bays[index];
                let before = target.cooldown.phase();
                let next = if matches!(fired.kind, ConsoleTimer::Overheat(_)) {
                    target.cooldown.overheat(
                        fired.id,
                        &target.ports,
                        &target.catalog,
                        fired.at,
                        timers,
                    )
                } else {
                    target
                        .cooldown
                        .recharge(fired.id, &target.ports, fired.at, timers)
                };
                let Some(ports) = next else {
                    debug!(bay = %bay, timer = ?fired.kind, "stale_timer_dropped");
                    return;
                };
                target.ports = ports;
                emit_phase_change(sink, target, before);
                self.reconcile(index, fired.at);
            }
            ConsoleTimer::ShieldExpire => {
                if let Some(change) = self.shield.expire(fired.id, fired.at, &mut self.timers) {
                    self.emit_shield(change);
                }
            }
            ConsoleTimer::ShieldReady => {
                if let Some(change) = self.shield.recharge(fired.id) {
                    self.emit_shield(change);
                }
            }
        }
    }

    fn emit_shield(&mut self, change: ShieldChange) {
        match change {
            ShieldChange::Raised => emit(&mut self.sink, ConsoleCommand::Shield { on: true }),
            ShieldChange::Lowered { .. } => {
                emit(&mut self.sink, ConsoleCommand::Shield { on: false })
            }
            // Remote shield state is still "off"; nothing to mirror.
            ShieldChange::Ready => {}
        }
    }

    fn hold_movement(&mut self, movement: Movement) {
        if self.movement == movement {
            return;
        }
        self.movement = movement;
        emit(&mut self.sink, ConsoleCommand::Movement { movement });
    }

    fn select_energy(&mut self, wire: WireColor) {
        if !self.wires.contains(wire) {
            warn!(wire = %wire, "unknown_energy_ignored");
            return;
        }
        if self.energy == Some(wire) {
            return;
        }
        self.energy = Some(wire);
        emit(&mut self.sink, ConsoleCommand::Energy { wire });
    }

    fn merge_snapshot(&mut self, seq: u64, state: ServerState, now: Millis) {
        match self.poll.accept(seq, now) {
            SnapshotVerdict::Accepted => {
                debug!(
                    seq,
                    started = state.is_game_started,
                    won = state.is_game_won,
                    lost = state.is_game_lost,
                    "snapshot_merged"
                );
                self.server.merge(state, now);
            }
            SnapshotVerdict::Late => warn!(seq, "snapshot_late_discarded"),
            SnapshotVerdict::Stale => warn!(seq, "snapshot_stale_discarded"),
        }
    }
}

fn emit<S: CommandSink>(sink: &mut S, command: ConsoleCommand) {
    debug!(command = %command, "command_emitted");
    sink.emit(&command);
}

fn emit_phase_change<S: CommandSink>(sink: &mut S, bay: &Bay, before: CooldownPhase) {
    let phase = bay.cooldown.phase();
    if phase != before {
        emit(sink, ConsoleCommand::Cooldown { bay: bay.id, phase });
    }
}
