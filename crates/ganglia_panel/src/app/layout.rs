use std::fs;
use std::path::{Path, PathBuf};

use ganglia_engine::{
    presets, BayConfig, BayId, BayKind, SequenceSlot, SubsystemDef, WireCatalog, WireCatalogError,
    WireColor,
};
use serde::Deserialize;
use thiserror::Error;

const ANY_SLOT_TOKEN: &str = "*";
const EMPTY_SLOT_TOKEN: &str = "x";

/// Wire catalog plus bay configurations the console is built from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PanelLayout {
    pub(crate) wires: WireCatalog,
    pub(crate) bays: Vec<BayConfig>,
}

#[derive(Debug, Error)]
pub(crate) enum LayoutError {
    #[error("failed to read layout file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse layout file {path} at {at}: {source}")]
    Parse {
        path: PathBuf,
        at: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid wire list in layout: {0}")]
    Wires(#[source] WireCatalogError),
    #[error("layout validation failed at {at}: {message}")]
    Invalid { at: String, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutFile {
    #[serde(default)]
    wires: Option<Vec<String>>,
    bays: Vec<BayEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BayEntry {
    id: u32,
    name: String,
    kind: BayKind,
    ports: usize,
    #[serde(default)]
    preset: Option<String>,
    #[serde(default)]
    subsystems: Vec<SubsystemEntry>,
}

/// One catalog entry. Colors are written by name; sequences also accept
/// `*` for any wire and `x` for an empty port. An entry with neither
/// `set` nor `sequence` is the base subsystem.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubsystemEntry {
    id: u32,
    name: String,
    #[serde(default)]
    set: Option<Vec<String>>,
    #[serde(default)]
    sequence: Option<Vec<String>>,
    #[serde(default)]
    enabled_ms: u64,
    #[serde(default)]
    disabled_ms: u64,
}

/// One bay per kind on the standard six-wire console.
pub(crate) fn builtin_layout() -> PanelLayout {
    PanelLayout {
        wires: WireCatalog::standard(),
        bays: vec![
            BayConfig {
                id: BayId(0),
                name: "weapons".to_string(),
                kind: BayKind::Weapons,
                port_count: presets::WEAPON_SEQUENCE_PORTS,
                subsystems: presets::weapon_sequences(),
            },
            BayConfig {
                id: BayId(1),
                name: "propulsion".to_string(),
                kind: BayKind::Propulsion,
                port_count: 4,
                subsystems: presets::propulsion_modes(),
            },
            BayConfig {
                id: BayId(2),
                name: "repair".to_string(),
                kind: BayKind::Repair,
                port_count: 4,
                subsystems: presets::repair_levels(),
            },
            BayConfig {
                id: BayId(3),
                name: "communications".to_string(),
                kind: BayKind::Communications,
                port_count: 4,
                subsystems: presets::communications_channels(),
            },
        ],
    }
}

pub(crate) fn load_layout(path: &Path) -> Result<PanelLayout, LayoutError> {
    let raw = fs::read_to_string(path).map_err(|source| LayoutError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_layout_json(&raw).map_err(|(at, source)| LayoutError::Parse {
        path: path.to_path_buf(),
        at,
        source,
    })?;
    build_layout(file)
}

fn parse_layout_json(raw: &str) -> Result<LayoutFile, (String, serde_json::Error)> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, LayoutFile>(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        let at = if at.is_empty() { ".".to_string() } else { at };
        (at, error.into_inner())
    })
}

fn build_layout(file: LayoutFile) -> Result<PanelLayout, LayoutError> {
    let wires = match file.wires {
        Some(names) => WireCatalog::new(names).map_err(LayoutError::Wires)?,
        None => WireCatalog::standard(),
    };
    if file.bays.is_empty() {
        return Err(invalid("bays", "expected at least one bay"));
    }

    let mut bays = Vec::with_capacity(file.bays.len());
    for (bay_index, entry) in file.bays.into_iter().enumerate() {
        let at = format!("bays[{bay_index}]");
        let subsystems = match (&entry.preset, entry.subsystems.is_empty()) {
            (Some(_), false) => {
                return Err(invalid(&at, "set either preset or subsystems, not both"));
            }
            (Some(name), true) => presets::preset(name).ok_or_else(|| {
                invalid(
                    &format!("{at}.preset"),
                    format!(
                        "unknown preset '{name}' (expected one of {})",
                        presets::PRESET_NAMES.join("|")
                    ),
                )
            })?,
            (None, _) => entry
                .subsystems
                .iter()
                .enumerate()
                .map(|(index, subsystem)| {
                    build_subsystem(&wires, subsystem, &format!("{at}.subsystems[{index}]"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        bays.push(BayConfig {
            id: BayId(entry.id),
            name: entry.name,
            kind: entry.kind,
            port_count: entry.ports,
            subsystems,
        });
    }

    Ok(PanelLayout { wires, bays })
}

fn build_subsystem(
    wires: &WireCatalog,
    entry: &SubsystemEntry,
    at: &str,
) -> Result<SubsystemDef, LayoutError> {
    match (&entry.set, &entry.sequence) {
        (Some(_), Some(_)) => Err(invalid(at, "set either set or sequence, not both")),
        (None, None) => Ok(SubsystemDef::base(entry.id, entry.name.clone())),
        (Some(names), None) => {
            let colors = names
                .iter()
                .enumerate()
                .map(|(index, name)| color(wires, name, &format!("{at}.set[{index}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SubsystemDef::set(
                entry.id,
                entry.name.clone(),
                colors,
                entry.enabled_ms,
                entry.disabled_ms,
            ))
        }
        (None, Some(tokens)) => {
            let slots = tokens
                .iter()
                .enumerate()
                .map(|(index, token)| match token.as_str() {
                    ANY_SLOT_TOKEN => Ok(SequenceSlot::Any),
                    EMPTY_SLOT_TOKEN => Ok(SequenceSlot::Empty),
                    name => color(wires, name, &format!("{at}.sequence[{index}]"))
                        .map(SequenceSlot::Wire),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SubsystemDef::sequence(
                entry.id,
                entry.name.clone(),
                slots,
                entry.enabled_ms,
                entry.disabled_ms,
            ))
        }
    }
}

fn color(wires: &WireCatalog, name: &str, at: &str) -> Result<WireColor, LayoutError> {
    wires
        .color_by_name(name)
        .ok_or_else(|| invalid(at, format!("unknown wire color '{name}'")))
}

fn invalid(at: &str, message: impl Into<String>) -> LayoutError {
    LayoutError::Invalid {
        at: at.to_string(),
        message: message.into(),
    }
}
