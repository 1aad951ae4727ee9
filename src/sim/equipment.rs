//! Positional equipment assignment for managed resources.
//!
//! Which source a resource "runs on" is policy, not physics, so the rule is a
//! swappable strategy chosen by configuration.

use serde::Deserialize;

use crate::cluster::ResourceId;
use crate::devices::SourceKind;

/// One resource and the source it is equipped with for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEquipment {
    pub resource_id: ResourceId,
    pub kind: SourceKind,
}

/// Assignments for every resource, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentMap {
    entries: Vec<ResourceEquipment>,
}

impl EquipmentMap {
    /// Source assigned to `resource_id`, if it was part of the listing.
    pub fn get(&self, resource_id: &str) -> Option<SourceKind> {
        self.entries
            .iter()
            .find(|e| e.resource_id == resource_id)
            .map(|e| e.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceEquipment> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of resources equipped with `kind`.
    pub fn count(&self, kind: SourceKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}

/// Maps a resource's position in the listing to a source.
pub trait EquipmentPolicy {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Source for the resource at `index`.
    fn kind_at(&self, index: usize) -> SourceKind;

    /// Assigns every resource. Total and deterministic: the same ordered
    /// input always yields the same map.
    fn assign(&self, resource_ids: &[ResourceId]) -> EquipmentMap {
        EquipmentMap {
            entries: resource_ids
                .iter()
                .enumerate()
                .map(|(i, id)| ResourceEquipment {
                    resource_id: id.clone(),
                    kind: self.kind_at(i),
                })
                .collect(),
        }
    }
}

/// First resource is mixed, the rest alternate solar, wind, solar, ...
#[derive(Debug, Default, Clone, Copy)]
pub struct SentinelFirst;

impl EquipmentPolicy for SentinelFirst {
    fn name(&self) -> &'static str {
        "sentinel_first"
    }

    fn kind_at(&self, index: usize) -> SourceKind {
        match index {
            0 => SourceKind::Mixed,
            i if i % 2 == 1 => SourceKind::Solar,
            _ => SourceKind::Wind,
        }
    }
}

/// Mixed, solar, wind, repeating.
#[derive(Debug, Default, Clone, Copy)]
pub struct EveryThird;

impl EquipmentPolicy for EveryThird {
    fn name(&self) -> &'static str {
        "every_third"
    }

    fn kind_at(&self, index: usize) -> SourceKind {
        match index % 3 {
            0 => SourceKind::Mixed,
            1 => SourceKind::Solar,
            _ => SourceKind::Wind,
        }
    }
}

/// Solar on even positions, wind on odd ones. Never mixed.
#[derive(Debug, Default, Clone, Copy)]
pub struct Alternating;

impl EquipmentPolicy for Alternating {
    fn name(&self) -> &'static str {
        "alternating"
    }

    fn kind_at(&self, index: usize) -> SourceKind {
        if index % 2 == 0 {
            SourceKind::Solar
        } else {
            SourceKind::Wind
        }
    }
}

/// Configuration name of an [`EquipmentPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRule {
    SentinelFirst,
    EveryThird,
    Alternating,
}

impl AssignmentRule {
    pub fn strategy(self) -> Box<dyn EquipmentPolicy> {
        match self {
            AssignmentRule::SentinelFirst => Box::new(SentinelFirst),
            AssignmentRule::EveryThird => Box::new(EveryThird),
            AssignmentRule::Alternating => Box::new(Alternating),
        }
    }
}
