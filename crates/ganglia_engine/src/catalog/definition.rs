use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::panel::{WireCatalog, WireColor};
use crate::Millis;

/// Level of a subsystem inside its catalog. Higher levels commit more ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubsystemId(pub u32);

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceSlot {
    Wire(WireColor),
    Any,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// One slot per port index.
    Sequence(Vec<SequenceSlot>),
    /// Colors that must each sit on a distinct port, anywhere in the bay.
    Set(Vec<WireColor>),
}

impl Requirement {
    /// A requirement that every configuration satisfies.
    pub fn is_unconstrained(&self) -> bool {
        match self {
            Requirement::Sequence(slots) => slots.iter().all(|slot| *slot == SequenceSlot::Any),
            Requirement::Set(colors) => colors.is_empty(),
        }
    }

    fn wires(&self) -> Vec<WireColor> {
        match self {
            Requirement::Sequence(slots) => slots
                .iter()
                .filter_map(|slot| match slot {
                    SequenceSlot::Wire(wire) => Some(*wire),
                    _ => None,
                })
                .collect(),
            Requirement::Set(colors) => colors.clone(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Requirement::Sequence(_) => "sequence",
            Requirement::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemDef {
    pub id: SubsystemId,
    pub name: String,
    pub requirement: Requirement,
    /// How long the subsystem may stay engaged before it overheats.
    pub enabled_ms: Millis,
    /// Recharge time of the ports it used once it overheats.
    pub disabled_ms: Millis,
}

impl SubsystemDef {
    pub fn sequence(
        id: u32,
        name: impl Into<String>,
        slots: Vec<SequenceSlot>,
        enabled_ms: Millis,
        disabled_ms: Millis,
    ) -> Self {
        Self {
            id: SubsystemId(id),
            name: name.into(),
            requirement: Requirement::Sequence(slots),
            enabled_ms,
            disabled_ms,
        }
    }

    pub fn set(
        id: u32,
        name: impl Into<String>,
        colors: Vec<WireColor>,
        enabled_ms: Millis,
        disabled_ms: Millis,
    ) -> Self {
        Self {
            id: SubsystemId(id),
            name: name.into(),
            requirement: Requirement::Set(colors),
            enabled_ms,
            disabled_ms,
        }
    }

    /// Idle entry with no requirements.
    pub fn base(id: u32, name: impl Into<String>) -> Self {
        Self::set(id, name, Vec::new(), 0, 0)
    }

    pub fn is_base(&self) -> bool {
        self.requirement.is_unconstrained()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("subsystem catalog is empty")]
    Empty,
    #[error("duplicate subsystem id {id}")]
    DuplicateId { id: SubsystemId },
    #[error("subsystem {id} has {actual} sequence slots but the bay has {expected} ports")]
    SequenceLength {
        id: SubsystemId,
        expected: usize,
        actual: usize,
    },
    #[error("subsystem {id} requires {required} wires but the bay has only {ports} ports")]
    Unsatisfiable {
        id: SubsystemId,
        required: usize,
        ports: usize,
    },
    #[error("subsystem {id} references {wire}, which is not in the wire catalog")]
    UnknownWire { id: SubsystemId, wire: WireColor },
    #[error("subsystem {id} requires no wires but is not an idle entry")]
    NoWires { id: SubsystemId },
    #[error("subsystem {id} needs a non-zero enabled_ms")]
    ZeroEnabled { id: SubsystemId },
    #[error("subsystems {lower} and {higher} can match the same wiring but {higher} does not strictly extend {lower}")]
    Ambiguous {
        lower: SubsystemId,
        higher: SubsystemId,
    },
    #[error("subsystems {lower} ({lower_kind}) and {higher} ({higher_kind}) mix requirement kinds")]
    MixedRequirements {
        lower: SubsystemId,
        lower_kind: &'static str,
        higher: SubsystemId,
        higher_kind: &'static str,
    },
}

/// Validated, id-ordered subsystem definitions for one bay.
///
/// Any two definitions that can match the same configuration must be
/// nested: the higher id strictly extends the lower one's requirement.
/// That makes "highest matching id wins" equal to "most ports committed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemCatalog {
    defs: Vec<SubsystemDef>,
    port_count: usize,
}

impl SubsystemCatalog {
    pub fn new(
        mut defs: Vec<SubsystemDef>,
        port_count: usize,
        wires: &WireCatalog,
    ) -> Result<Self, CatalogError> {
        if defs.is_empty() {
            return Err(CatalogError::Empty);
        }
        defs.sort_by_key(|def| def.id);

        let mut seen = HashSet::with_capacity(defs.len());
        for def in &defs {
            if !seen.insert(def.id) {
                return Err(CatalogError::DuplicateId { id: def.id });
            }
            validate_def(def, port_count, wires)?;
        }

        for (index, lower) in defs.iter().enumerate() {
            for higher in &defs[index + 1..] {
                validate_pair(lower, higher, port_count)?;
            }
        }

        Ok(Self { defs, port_count })
    }

    pub fn port_count(&self) -> usize {
        self.port_count
    }

    /// Definitions in ascending id order.
    pub fn defs(&self) -> &[SubsystemDef] {
        &self.defs
    }

    pub fn get(&self, id: SubsystemId) -> Option<&SubsystemDef> {
        self.defs.iter().find(|def| def.id == id)
    }

    pub fn base(&self) -> Option<&SubsystemDef> {
        self.defs.iter().find(|def| def.is_base())
    }
}

fn validate_def(
    def: &SubsystemDef,
    port_count: usize,
    wires: &WireCatalog,
) -> Result<(), CatalogError> {
    match &def.requirement {
        Requirement::Sequence(slots) if slots.len() != port_count => {
            return Err(CatalogError::SequenceLength {
                id: def.id,
                expected: port_count,
                actual: slots.len(),
            });
        }
        Requirement::Set(colors) if colors.len() > port_count => {
            return Err(CatalogError::Unsatisfiable {
                id: def.id,
                required: colors.len(),
                ports: port_count,
            });
        }
        _ => {}
    }

    if !def.is_base() {
        // A requirement of only `Any`/`Empty` slots commits no port, so an
        // overheat could never take it out of play.
        if def.requirement.wires().is_empty() {
            return Err(CatalogError::NoWires { id: def.id });
        }
        if def.enabled_ms == 0 {
            return Err(CatalogError::ZeroEnabled { id: def.id });
        }
    }

    if let Some(wire) = def
        .requirement
        .wires()
        .into_iter()
        .find(|wire| !wires.contains(*wire))
    {
        return Err(CatalogError::UnknownWire { id: def.id, wire });
    }
    Ok(())
}

fn validate_pair(
    lower: &SubsystemDef,
    higher: &SubsystemDef,
    port_count: usize,
) -> Result<(), CatalogError> {
    let ambiguous = CatalogError::Ambiguous {
        lower: lower.id,
        higher: higher.id,
    };
    match (lower.is_base(), higher.is_base()) {
        (true, true) => return Err(ambiguous),
        (true, false) | (false, true) => return Ok(()),
        (false, false) => {}
    }

    match (&lower.requirement, &higher.requirement) {
        (Requirement::Set(low), Requirement::Set(high)) => {
            if !sets_can_co_match(low, high, port_count) || is_strict_submultiset(low, high) {
                Ok(())
            } else {
                Err(ambiguous)
            }
        }
        (Requirement::Sequence(low), Requirement::Sequence(high)) => {
            if !sequences_can_co_match(low, high) || sequence_strictly_extends(low, high) {
                Ok(())
            } else {
                Err(ambiguous)
            }
        }
        (low, high) => Err(CatalogError::MixedRequirements {
            lower: lower.id,
            lower_kind: low.kind_name(),
            higher: higher.id,
            higher_kind: high.kind_name(),
        }),
    }
}

/// Both sets fit the bay at once when their color union, counting repeats,
/// needs no more ports than the bay has.
fn sets_can_co_match(low: &[WireColor], high: &[WireColor], port_count: usize) -> bool {
    let mut needed: HashMap<WireColor, (usize, usize)> = HashMap::new();
    for wire in low {
        needed.entry(*wire).or_default().0 += 1;
    }
    for wire in high {
        needed.entry(*wire).or_default().1 += 1;
    }
    let ports = needed
        .values()
        .map(|(in_low, in_high)| (*in_low).max(*in_high))
        .sum::<usize>();
    ports <= port_count
}

fn is_strict_submultiset(low: &[WireColor], high: &[WireColor]) -> bool {
    if low.len() >= high.len() {
        return false;
    }
    let mut available: HashMap<WireColor, usize> = HashMap::new();
    for wire in high {
        *available.entry(*wire).or_default() += 1;
    }
    low.iter().all(|wire| match available.get_mut(wire) {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    })
}

fn sequences_can_co_match(low: &[SequenceSlot], high: &[SequenceSlot]) -> bool {
    low.iter().zip(high).all(|pair| match pair {
        (SequenceSlot::Any, _) | (_, SequenceSlot::Any) => true,
        (SequenceSlot::Wire(a), SequenceSlot::Wire(b)) => a == b,
        (SequenceSlot::Empty, SequenceSlot::Empty) => true,
        _ => false,
    })
}

fn sequence_strictly_extends(low: &[SequenceSlot], high: &[SequenceSlot]) -> bool {
    let covers = low
        .iter()
        .zip(high)
        .all(|(l, h)| *l == SequenceSlot::Any || l == h);
    let adds = low
        .iter()
        .zip(high)
        .any(|(l, h)| *l == SequenceSlot::Any && *h != SequenceSlot::Any);
    covers && adds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::colors::{BLUE, GREEN, PURPLE, RED, YELLOW};
    use SequenceSlot::{Any, Empty, Wire};

    fn wires() -> WireCatalog {
        WireCatalog::standard()
    }

    #[test]
    fn sorts_definitions_by_id() {
        let catalog = SubsystemCatalog::new(
            vec![
                SubsystemDef::set(2, "heavy", vec![RED, BLUE, YELLOW], 10, 10),
                SubsystemDef::base(0, "idle"),
                SubsystemDef::set(1, "light", vec![RED, BLUE], 10, 10),
            ],
            4,
            &wires(),
        )
        .expect("nested catalog");
        let ids = catalog.defs().iter().map(|def| def.id.0).collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(catalog.base().map(|def| def.id), Some(SubsystemId(0)));
    }

    #[test]
    fn rejects_non_nested_sets() {
        let err = SubsystemCatalog::new(
            vec![
                SubsystemDef::set(1, "a", vec![RED, BLUE], 10, 10),
                SubsystemDef::set(2, "b", vec![RED, GREEN, YELLOW], 10, 10),
            ],
            4,
            &wires(),
        )
        .expect_err("sets are not nested");
        assert_eq!(
            err,
            CatalogError::Ambiguous {
                lower: SubsystemId(1),
                higher: SubsystemId(2)
            }
        );
    }

    #[test]
    fn sets_that_cannot_share_the_bay_need_no_nesting() {
        let catalog = SubsystemCatalog::new(
            vec![
                SubsystemDef::base(0, "idle"),
                SubsystemDef::set(1, "a", vec![RED, BLUE], 10, 10),
                SubsystemDef::set(2, "b", vec![YELLOW, GREEN, PURPLE], 10, 10),
            ],
            4,
            &wires(),
        );
        assert!(catalog.is_ok());

        let roomy = SubsystemCatalog::new(
            vec![
                SubsystemDef::set(1, "a", vec![RED, BLUE], 10, 10),
                SubsystemDef::set(2, "b", vec![YELLOW, GREEN, PURPLE], 10, 10),
            ],
            5,
            &wires(),
        );
        assert!(matches!(roomy, Err(CatalogError::Ambiguous { .. })));
    }

    #[test]
    fn rejects_entries_that_commit_no_wires_or_never_engage() {
        let wireless = SubsystemCatalog::new(
            vec![
                SubsystemDef::base(0, "idle"),
                SubsystemDef::sequence(1, "gap", vec![Empty, Any, Any], 1_000, 1_000),
            ],
            3,
            &wires(),
        );
        assert_eq!(wireless, Err(CatalogError::NoWires { id: SubsystemId(1) }));

        let instant = SubsystemCatalog::new(
            vec![SubsystemDef::set(1, "flash", vec![RED], 0, 1_000)],
            3,
            &wires(),
        );
        assert_eq!(instant, Err(CatalogError::ZeroEnabled { id: SubsystemId(1) }));
    }

    #[test]
    fn disjoint_sequences_need_no_nesting() {
        let catalog = SubsystemCatalog::new(
            vec![
                SubsystemDef::sequence(0, "a", vec![Wire(RED), Wire(RED), Any], 10, 10),
                SubsystemDef::sequence(1, "b", vec![Wire(GREEN), Any, Wire(GREEN)], 10, 10),
            ],
            3,
            &wires(),
        );
        assert!(catalog.is_ok());
    }

    #[test]
    fn overlapping_sequences_must_extend() {
        let nested = SubsystemCatalog::new(
            vec![
                SubsystemDef::sequence(1, "a", vec![Wire(RED), Any, Any], 10, 10),
                SubsystemDef::sequence(2, "b", vec![Wire(RED), Wire(BLUE), Any], 10, 10),
            ],
            3,
            &wires(),
        );
        assert!(nested.is_ok());

        let crossing = SubsystemCatalog::new(
            vec![
                SubsystemDef::sequence(1, "a", vec![Wire(RED), Any, Any], 10, 10),
                SubsystemDef::sequence(2, "b", vec![Any, Wire(BLUE), Empty], 10, 10),
            ],
            3,
            &wires(),
        );
        assert!(matches!(crossing, Err(CatalogError::Ambiguous { .. })));
    }

    #[test]
    fn rejects_shape_errors() {
        let short = SubsystemCatalog::new(
            vec![SubsystemDef::sequence(1, "a", vec![Wire(RED)], 10, 10)],
            3,
            &wires(),
        );
        assert_eq!(
            short,
            Err(CatalogError::SequenceLength {
                id: SubsystemId(1),
                expected: 3,
                actual: 1
            })
        );

        let unknown = SubsystemCatalog::new(
            vec![SubsystemDef::set(1, "a", vec![WireColor(12)], 10, 10)],
            3,
            &wires(),
        );
        assert_eq!(
            unknown,
            Err(CatalogError::UnknownWire {
                id: SubsystemId(1),
                wire: WireColor(12)
            })
        );

        let too_many = SubsystemCatalog::new(
            vec![SubsystemDef::set(1, "a", vec![RED, BLUE, GREEN], 10, 10)],
            2,
            &wires(),
        );
        assert!(matches!(too_many, Err(CatalogError::Unsatisfiable { .. })));

        assert_eq!(
            SubsystemCatalog::new(Vec::new(), 3, &wires()),
            Err(CatalogError::Empty)
        );
    }

    #[test]
    fn rejects_duplicate_ids_and_mixed_kinds() {
        let duplicate = SubsystemCatalog::new(
            vec![
                SubsystemDef::set(1, "a", vec![RED], 10, 10),
                SubsystemDef::set(1, "b", vec![RED, BLUE], 10, 10),
            ],
            3,
            &wires(),
        );
        assert_eq!(
            duplicate,
            Err(CatalogError::DuplicateId { id: SubsystemId(1) })
        );

        let mixed = SubsystemCatalog::new(
            vec![
                SubsystemDef::set(1, "a", vec![RED], 10, 10),
                SubsystemDef::sequence(2, "b", vec![Wire(RED), Wire(BLUE), Any], 10, 10),
            ],
            3,
            &wires(),
        );
        assert!(matches!(mixed, Err(CatalogError::MixedRequirements { .. })));
    }

    #[test]
    fn requirement_json_uses_snake_case_tags() {
        let requirement = Requirement::Sequence(vec![Wire(RED), Any, Empty]);
        let json = serde_json::to_string(&requirement).expect("serialize");
        assert_eq!(json, r#"{"sequence":[{"wire":0},"any","empty"]}"#);
    }
}
