use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of an entity. Identifiers are plain strings so they can travel
/// unchanged between spreadsheet cells and YAML keys.
pub type EntityId = String;

/// Raw spreadsheet row: column header → cell text (`None` for empty cells).
pub type RawRow = BTreeMap<String, Option<String>>;

/// The closed set of entity kinds the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "dc_region")]
    Region,
    #[serde(rename = "dc_az")]
    AvailabilityZone,
    #[serde(rename = "dc")]
    Dc,
    #[serde(rename = "office")]
    Office,
    #[serde(rename = "network_segment")]
    NetworkSegment,
    #[serde(rename = "network")]
    Network,
    #[serde(rename = "components.network")]
    NetworkDevice,
    #[serde(rename = "kb")]
    KbService,
    #[serde(rename = "compute_service")]
    ComputeService,
    #[serde(rename = "cluster")]
    Cluster,
    #[serde(rename = "monitoring")]
    Monitoring,
    #[serde(rename = "backup")]
    Backup,
}

impl EntityKind {
    /// Every kind, in dependency order (referenced kinds first).
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Region,
        EntityKind::AvailabilityZone,
        EntityKind::Dc,
        EntityKind::Office,
        EntityKind::NetworkSegment,
        EntityKind::Network,
        EntityKind::NetworkDevice,
        EntityKind::KbService,
        EntityKind::ComputeService,
        EntityKind::Cluster,
        EntityKind::Monitoring,
        EntityKind::Backup,
    ];

    /// Dialect-neutral name used in reports and log fields.
    pub fn canonical_name(self) -> &'static str {
        match self {
            EntityKind::Region => "dc_region",
            EntityKind::AvailabilityZone => "dc_az",
            EntityKind::Dc => "dc",
            EntityKind::Office => "office",
            EntityKind::NetworkSegment => "network_segment",
            EntityKind::Network => "network",
            EntityKind::NetworkDevice => "components.network",
            EntityKind::KbService => "kb",
            EntityKind::ComputeService => "compute_service",
            EntityKind::Cluster => "cluster",
            EntityKind::Monitoring => "monitoring",
            EntityKind::Backup => "backup",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// A single field value. Empty values are never stored on an entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Integer literal such as a VLAN number or rack count.
    Integer(i64),
    /// Free text or a single identifier.
    Text(String),
    /// Ordered list of identifiers.
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Integer(_) => false,
            FieldValue::Text(value) => value.is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }

    /// Returns the value as a list of strings; scalars become one-element lists.
    pub fn items(&self) -> Vec<String> {
        match self {
            FieldValue::Integer(value) => vec![value.to_string()],
            FieldValue::Text(value) => vec![value.clone()],
            FieldValue::List(items) => items.clone(),
        }
    }

    fn canonical(&self) -> FieldValue {
        match self {
            FieldValue::List(items) => {
                let set: BTreeSet<&String> = items.iter().collect();
                FieldValue::List(set.into_iter().cloned().collect())
            }
            other => other.clone(),
        }
    }
}

/// An inventory entity of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: EntityId,
    /// Field name → value. Nested document mappings use dotted names such as
    /// `sber.location`.
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Inserts a value, dropping it when empty.
    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        let field = field.into();
        if value.is_empty() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value);
        }
    }

    /// Builder flavour of [`Entity::set`].
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// All identifiers held by `field`, whether it is stored as a scalar or a list.
    pub fn items(&self, field: &str) -> Vec<String> {
        self.fields.get(field).map(FieldValue::items).unwrap_or_default()
    }

    /// Copy of the entity with every list sorted and deduplicated.
    pub fn canonical(&self) -> Entity {
        Entity {
            kind: self.kind,
            id: self.id.clone(),
            fields: self
                .fields
                .iter()
                .map(|(name, value)| (name.clone(), value.canonical()))
                .collect(),
        }
    }
}

/// Canonical document tree: kind → entities in document order. Namespace keys
/// are only attached when the tree is written in a concrete dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    sections: BTreeMap<EntityKind, Vec<Entity>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: Entity) {
        self.sections.entry(entity.kind).or_default().push(entity);
    }

    pub fn extend(&mut self, kind: EntityKind, entities: impl IntoIterator<Item = Entity>) {
        let section = self.sections.entry(kind).or_default();
        section.extend(entities);
    }

    /// Entities of `kind`; absent kinds yield an empty slice.
    pub fn entities(&self, kind: EntityKind) -> &[Entity] {
        self.sections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.sections
            .iter()
            .filter(|(_, entities)| !entities.is_empty())
            .map(|(kind, _)| *kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.sections.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self, kind: EntityKind) -> BTreeSet<&str> {
        self.entities(kind).iter().map(|e| e.id.as_str()).collect()
    }

    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        self.sections
            .iter()
            .filter(|(_, entities)| !entities.is_empty())
            .map(|(kind, entities)| (*kind, entities.len()))
            .collect()
    }

    /// Order- and list-insensitive form used to compare documents.
    pub fn canonical(&self) -> Document {
        let sections = self
            .sections
            .iter()
            .filter(|(_, entities)| !entities.is_empty())
            .map(|(kind, entities)| {
                let mut entities: Vec<Entity> = entities.iter().map(Entity::canonical).collect();
                entities.sort_by(|lhs, rhs| lhs.id.cmp(&rhs.id));
                (*kind, entities)
            })
            .collect();
        Document { sections }
    }
}

/// Severity attached to an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A recoverable finding. Issues never stop a conversion; they are collected
/// and surfaced in the report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum Issue {
    #[error("{kind} {entity}: malformed value {raw:?} in '{column}' was dropped")]
    MalformedScalar {
        kind: EntityKind,
        entity: String,
        column: String,
        raw: String,
    },

    #[error("{kind} {entity}: '{value}' in '{column}' has several corrections ({})", .candidates.join(", "))]
    AmbiguousCorrection {
        kind: EntityKind,
        entity: String,
        column: String,
        value: String,
        candidates: Vec<String>,
    },

    #[error("{kind} {entity}: location could not be resolved (candidates: {})", .candidates.join(", "))]
    UnresolvableLocation {
        kind: EntityKind,
        entity: String,
        candidates: Vec<String>,
    },

    #[error("{kind} {entity}: generated identifier {generated} already exists, entity dropped")]
    IdentifierCollision {
        kind: EntityKind,
        entity: String,
        generated: String,
    },

    #[error("{kind} {entity} refs missing {} {missing} via '{field}'", join_kinds(.targets))]
    MissingReference {
        kind: EntityKind,
        entity: String,
        field: String,
        targets: Vec<EntityKind>,
        missing: String,
    },

    #[error("{kind} {entity} has invalid {field}: {value}")]
    InvalidEnumValue {
        kind: EntityKind,
        entity: String,
        field: String,
        value: String,
        severity: Severity,
    },

    #[error("{kind} {entity} missing {field} ({reason})")]
    MissingConditionalField {
        kind: EntityKind,
        entity: String,
        field: String,
        reason: String,
    },

    #[error("{kind} {entity} missing required {field}")]
    MissingRequiredField {
        kind: EntityKind,
        entity: String,
        field: String,
    },

    #[error("{kind} {entity}: identifier already used by {existing}")]
    DuplicateIdentifier {
        kind: EntityKind,
        entity: String,
        existing: EntityKind,
    },

    #[error("skipped {}: {reason}", .path.display())]
    SkippedInput { path: PathBuf, reason: String },
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::MalformedScalar { .. }
            | Issue::AmbiguousCorrection { .. }
            | Issue::UnresolvableLocation { .. }
            | Issue::SkippedInput { .. } => Severity::Warning,
            Issue::InvalidEnumValue { severity, .. } => *severity,
            Issue::IdentifierCollision { .. }
            | Issue::MissingReference { .. }
            | Issue::MissingConditionalField { .. }
            | Issue::MissingRequiredField { .. }
            | Issue::DuplicateIdentifier { .. } => Severity::Error,
        }
    }
}

fn join_kinds(kinds: &[EntityKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.canonical_name())
        .collect::<Vec<_>>()
        .join("|")
}
