//! Built-in catalogs for the standard six-wire console.

use crate::panel::colors::{BLUE, GREEN, ORANGE, PURPLE, RED, YELLOW};

use super::definition::{SequenceSlot, SubsystemDef};

pub const WEAPON_SEQUENCE_PORTS: usize = 6;

/// Fixed wire sequences of the first six-port weapons console. No tier
/// extends another: the first slot already tells them apart.
pub fn weapon_sequences() -> Vec<SubsystemDef> {
    use SequenceSlot::{Any, Wire};

    vec![
        SubsystemDef::sequence(
            0,
            "twin_cannon",
            vec![Wire(RED), Wire(RED), Any, Any, Any, Any],
            3_000,
            3_000,
        ),
        SubsystemDef::sequence(
            1,
            "ion_lance",
            vec![Wire(GREEN), Any, Wire(GREEN), Any, Wire(BLUE), Any],
            3_000,
            3_000,
        ),
        SubsystemDef::sequence(
            2,
            "flak_array",
            vec![Wire(ORANGE), Any, Wire(ORANGE), Wire(ORANGE), Any, Wire(ORANGE)],
            3_000,
            3_000,
        ),
    ]
}

/// Weapon tiers by colored-wire set; each tier adds one wire.
pub fn weapon_tiers() -> Vec<SubsystemDef> {
    vec![
        SubsystemDef::base(0, "weapons_offline"),
        SubsystemDef::set(1, "pulse_laser", vec![RED, BLUE], 3_000, 3_000),
        SubsystemDef::set(2, "plasma_cannon", vec![RED, BLUE, YELLOW], 4_000, 5_000),
        SubsystemDef::set(3, "torpedo_salvo", vec![RED, BLUE, YELLOW, GREEN], 5_000, 8_000),
    ]
}

pub fn propulsion_modes() -> Vec<SubsystemDef> {
    vec![
        SubsystemDef::base(0, "engines_off"),
        SubsystemDef::set(1, "cruise", vec![GREEN], 8_000, 4_000),
        SubsystemDef::set(2, "afterburner", vec![GREEN, PURPLE], 4_000, 6_000),
    ]
}

pub fn repair_levels() -> Vec<SubsystemDef> {
    vec![
        SubsystemDef::base(0, "repair_idle"),
        SubsystemDef::set(1, "patch", vec![YELLOW], 6_000, 3_000),
        SubsystemDef::set(2, "weld", vec![YELLOW, ORANGE], 5_000, 4_000),
        SubsystemDef::set(3, "rebuild", vec![YELLOW, ORANGE, PURPLE], 4_000, 6_000),
    ]
}

pub fn communications_channels() -> Vec<SubsystemDef> {
    vec![
        SubsystemDef::base(0, "comms_silent"),
        SubsystemDef::set(1, "hail", vec![BLUE], 5_000, 2_000),
        SubsystemDef::set(2, "broadcast", vec![BLUE, PURPLE], 4_000, 4_000),
    ]
}

/// Preset lookup for layout files.
pub fn preset(name: &str) -> Option<Vec<SubsystemDef>> {
    match name {
        "weapon_sequences" => Some(weapon_sequences()),
        "weapon_tiers" => Some(weapon_tiers()),
        "propulsion_modes" => Some(propulsion_modes()),
        "repair_levels" => Some(repair_levels()),
        "communications_channels" => Some(communications_channels()),
        _ => None,
    }
}

pub const PRESET_NAMES: [&str; 5] = [
    "weapon_sequences",
    "weapon_tiers",
    "propulsion_modes",
    "repair_levels",
    "communications_channels",
];
