//! Advisory checks over a fully assembled document. Every check reports all
//! findings it encounters; none of them stop a conversion.

use std::collections::{BTreeMap, BTreeSet};

use crate::seaf::convert::model::{Document, EntityKind, Issue};
use crate::seaf::convert::schema::SchemaRegistry;

/// Runs every check and returns the combined, deduplicated issue list.
pub fn validate_document(document: &Document, registry: &SchemaRegistry) -> Vec<Issue> {
    let mut issues = validate_unique_ids(document);
    issues.extend(validate_refs(document, registry));
    issues.extend(validate_enums(document, registry));
    issues.extend(validate_conditional_fields(document, registry));
    issues.extend(validate_required(document, registry));
    dedup_issues(issues)
}

/// Reports every reference column value that does not name an existing
/// entity of one of the column's target kinds.
pub fn validate_refs(document: &Document, registry: &SchemaRegistry) -> Vec<Issue> {
    let ids: BTreeMap<EntityKind, BTreeSet<&str>> = EntityKind::ALL
        .iter()
        .map(|kind| (*kind, document.ids(*kind)))
        .collect();

    let mut issues = Vec::new();
    for schema in registry.kinds() {
        for entity in document.entities(schema.kind) {
            for column in schema.columns.iter().filter(|c| !c.references.is_empty()) {
                for value in entity.items(&column.field) {
                    let resolved = column
                        .references
                        .iter()
                        .any(|target| ids.get(target).is_some_and(|set| set.contains(value.as_str())));
                    if !resolved {
                        issues.push(Issue::MissingReference {
                            kind: schema.kind,
                            entity: entity.id.clone(),
                            field: column.field.clone(),
                            targets: column.references.clone(),
                            missing: value,
                        });
                    }
                }
            }
        }
    }
    dedup_issues(issues)
}

/// Reports enumerated fields holding values outside their vocabulary.
pub fn validate_enums(document: &Document, registry: &SchemaRegistry) -> Vec<Issue> {
    let mut issues = Vec::new();
    for schema in registry.kinds() {
        for entity in document.entities(schema.kind) {
            for column in &schema.columns {
                let Some(rule) = &column.allowed else {
                    continue;
                };
                for value in entity.items(&column.field) {
                    if !rule.values.contains(&value) {
                        issues.push(Issue::InvalidEnumValue {
                            kind: schema.kind,
                            entity: entity.id.clone(),
                            field: column.field.clone(),
                            value,
                            severity: rule.severity,
                        });
                    }
                }
            }
        }
    }
    dedup_issues(issues)
}

/// Reports columns that must be filled while their condition holds, such as
/// `lan_type` on LAN networks.
pub fn validate_conditional_fields(document: &Document, registry: &SchemaRegistry) -> Vec<Issue> {
    let mut issues = Vec::new();
    for schema in registry.kinds() {
        for entity in document.entities(schema.kind) {
            for column in schema.columns.iter().filter(|c| c.required) {
                let Some(condition) = &column.condition else {
                    continue;
                };
                if entity.get(&column.field).is_none()
                    && entity.text(&condition.field) == Some(condition.equals.as_str())
                {
                    issues.push(Issue::MissingConditionalField {
                        kind: schema.kind,
                        entity: entity.id.clone(),
                        field: column.field.clone(),
                        reason: format!("required when {} is {}", condition.field, condition.equals),
                    });
                }
            }
        }
    }
    issues
}

/// Reports unconditionally required fields that are empty.
pub fn validate_required(document: &Document, registry: &SchemaRegistry) -> Vec<Issue> {
    let mut issues = Vec::new();
    for schema in registry.kinds() {
        for entity in document.entities(schema.kind) {
            for column in schema
                .columns
                .iter()
                .filter(|c| c.required && c.condition.is_none())
            {
                if entity.get(&column.field).is_none() {
                    issues.push(Issue::MissingRequiredField {
                        kind: schema.kind,
                        entity: entity.id.clone(),
                        field: column.field.clone(),
                    });
                }
            }
        }
    }
    issues
}

/// Identifiers are global: references do not say which kind they point at,
/// so the same id under two kinds (or twice under one) is reported.
pub fn validate_unique_ids(document: &Document) -> Vec<Issue> {
    let mut seen: BTreeMap<&str, EntityKind> = BTreeMap::new();
    let mut issues = Vec::new();
    for entity in document.iter() {
        match seen.get(entity.id.as_str()) {
            Some(existing) => issues.push(Issue::DuplicateIdentifier {
                kind: entity.kind,
                entity: entity.id.clone(),
                existing: *existing,
            }),
            None => {
                seen.insert(entity.id.as_str(), entity.kind);
            }
        }
    }
    issues
}

/// Drops exact duplicates, keeping first-seen order.
pub fn dedup_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = BTreeSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seaf::convert::model::{Entity, FieldValue, Severity};

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    #[test]
    fn every_missing_reference_is_reported() {
        let registry = SchemaRegistry::standard();
        let mut document = Document::new();
        document.push(Entity::new(EntityKind::Region, "sbs.region.msk"));
        for n in 0..5 {
            document.push(
                Entity::new(EntityKind::AvailabilityZone, format!("sbs.az.{n}"))
                    .with("region", text(&format!("sbs.region.missing{n}"))),
            );
        }
        document.push(
            Entity::new(EntityKind::AvailabilityZone, "sbs.az.ok").with("region", text("sbs.region.msk")),
        );

        let issues = validate_refs(&document, &registry);
        assert_eq!(issues.len(), 5);
        assert!(issues.iter().all(|issue| matches!(issue, Issue::MissingReference { .. })));
    }

    #[test]
    fn references_may_target_several_kinds() {
        let registry = SchemaRegistry::standard();
        let mut document = Document::new();
        document.push(Entity::new(EntityKind::Office, "sbs.office.spb"));
        document.push(Entity::new(EntityKind::Dc, "sbs.dc.01"));
        document.push(
            Entity::new(EntityKind::Network, "sbs.dc01.lan")
                .with("type", text("WAN"))
                .with(
                    "location",
                    FieldValue::List(vec!["sbs.dc.01".into(), "sbs.office.spb".into(), "sbs.dc.09".into()]),
                ),
        );

        let issues = validate_refs(&document, &registry);
        assert_eq!(
            issues,
            vec![Issue::MissingReference {
                kind: EntityKind::Network,
                entity: "sbs.dc01.lan".into(),
                field: "location".into(),
                targets: vec![EntityKind::Dc, EntityKind::Office],
                missing: "sbs.dc.09".into(),
            }]
        );
    }

    #[test]
    fn enum_severity_follows_the_rule() {
        let registry = SchemaRegistry::standard();
        let mut document = Document::new();
        document.push(Entity::new(EntityKind::KbService, "kb.1").with("status", text("Архив")));
        document.push(Entity::new(EntityKind::NetworkDevice, "dev-1").with("type", text("Сервер")));

        let issues = validate_enums(&document, &registry);
        let severities: Vec<Severity> = issues.iter().map(Issue::severity).collect();
        assert_eq!(severities, vec![Severity::Error, Severity::Warning]);
    }

    #[test]
    fn lan_networks_need_lan_fields() {
        let registry = SchemaRegistry::standard();
        let mut document = Document::new();
        document.push(Entity::new(EntityKind::Network, "n.lan").with("type", text("LAN")));
        document.push(Entity::new(EntityKind::Network, "n.wan").with("type", text("WAN")));
        document.push(Entity::new(EntityKind::Network, "n.untyped"));

        let mut issues = validate_conditional_fields(&document, &registry);
        issues.extend(validate_required(&document, &registry));
        let fields: Vec<(&str, &str)> = issues
            .iter()
            .map(|issue| match issue {
                Issue::MissingConditionalField { entity, field, .. }
                | Issue::MissingRequiredField { entity, field, .. } => (entity.as_str(), field.as_str()),
                other => panic!("unexpected issue {other:?}"),
            })
            .collect();
        assert_eq!(
            fields,
            vec![("n.lan", "lan_type"), ("n.lan", "ipnetwork"), ("n.untyped", "type")]
        );
    }

    #[test]
    fn identifiers_are_unique_across_kinds() {
        let mut document = Document::new();
        document.push(Entity::new(EntityKind::Dc, "sbs.site.1"));
        document.push(Entity::new(EntityKind::Office, "sbs.site.1"));
        let issues = validate_unique_ids(&document);
        assert_eq!(
            issues,
            vec![Issue::DuplicateIdentifier {
                kind: EntityKind::Office,
                entity: "sbs.site.1".into(),
                existing: EntityKind::Dc,
            }]
        );
    }

    #[test]
    fn exact_duplicates_collapse() {
        let issue = Issue::MissingRequiredField {
            kind: EntityKind::Network,
            entity: "n".into(),
            field: "type".into(),
        };
        assert_eq!(dedup_issues(vec![issue.clone(), issue.clone()]), vec![issue]);
    }
}
