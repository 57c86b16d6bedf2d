use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::seaf::convert::error::Result;
use crate::seaf::convert::locate::{LocationResolution, NetworkIndex, SitePattern, resolve_location};
use crate::seaf::convert::model::{Document, Entity, EntityKind, FieldValue, Issue, RawRow};
use crate::seaf::convert::normalize::{
    Correction, Finding, NormalizerConfig, canonical_id, correct_homoglyphs, correct_value,
    normalize_scalar, parse_integer, parse_list,
};
use crate::seaf::convert::schema::{ColumnSpec, ColumnType, KindSchema, SchemaRegistry};
use crate::seaf::convert::split::split_by_location;
use crate::seaf::convert::validate::validate_document;

/// Knobs for the spreadsheet → document direction.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub normalizer: NormalizerConfig,
    pub site_pattern: SitePattern,
}

impl IngestOptions {
    pub fn new(normalizer: NormalizerConfig, location_prefix: Option<String>) -> Result<Self> {
        Ok(Self {
            normalizer,
            site_pattern: SitePattern::new(location_prefix)?,
        })
    }

    pub fn standard() -> Result<Self> {
        Self::new(NormalizerConfig::default(), None)
    }
}

/// Entities read from the rows of one kind, before locations are resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KindIngest {
    pub entities: Vec<Entity>,
    pub issues: Vec<Issue>,
    /// Rows holding at least one value.
    pub source_rows: usize,
}

/// Result of a spreadsheet → document conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
    pub document: Document,
    pub issues: Vec<Issue>,
    pub source_counts: BTreeMap<EntityKind, usize>,
}

/// Builds the entities of one kind from its sheet rows. Rows without an
/// identifier are skipped; a repeated identifier keeps the first row.
pub fn rows_to_entities(
    rows: &[RawRow],
    schema: &KindSchema,
    options: &IngestOptions,
) -> KindIngest {
    let config = &options.normalizer;
    let mut ingest = KindIngest::default();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for row in rows {
        if row.values().all(|cell| cell.as_deref().is_none_or(|c| c.trim().is_empty())) {
            continue;
        }
        ingest.source_rows += 1;

        let raw_id = row
            .iter()
            .find(|(header, cell)| schema.matches_id_header(header) && cell.is_some())
            .and_then(|(_, cell)| cell.as_deref());
        let Some(id) = canonical_id(raw_id, config)
            .value
            .map(|id| trim_suffix(id, schema))
            .filter(|id| !id.is_empty())
        else {
            debug!(kind = %schema.kind, "skipping row without identifier");
            continue;
        };
        if !seen.insert(id.clone()) {
            ingest.issues.push(Issue::DuplicateIdentifier {
                kind: schema.kind,
                entity: id,
                existing: schema.kind,
            });
            continue;
        }

        let mut entity = Entity::new(schema.kind, id);
        for column in &schema.columns {
            let raw = find_cell(row, column);
            let value = read_cell(raw, column, schema, config, &entity.id, &mut ingest.issues);
            entity.set(column.field.clone(), value);
        }
        drop_inapplicable(&mut entity, schema);
        if schema.hooks.derive_external_id {
            let external = entity.id.rsplit('.').next().unwrap_or_default().to_string();
            entity.set("external_id", FieldValue::Text(external));
        }
        ingest.entities.push(entity);
    }
    ingest
}

fn trim_suffix(id: String, schema: &KindSchema) -> String {
    match &schema.hooks.trim_id_suffix {
        Some(chars) => id.trim_end_matches(|ch| chars.contains(ch)).to_string(),
        None => id,
    }
}

fn find_cell<'a>(row: &'a RawRow, column: &ColumnSpec) -> Option<&'a str> {
    row.iter()
        .filter(|(header, _)| column.matches_header(header))
        .find_map(|(_, cell)| cell.as_deref().filter(|c| !c.trim().is_empty()))
}

fn read_cell(
    raw: Option<&str>,
    column: &ColumnSpec,
    schema: &KindSchema,
    config: &NormalizerConfig,
    entity: &str,
    issues: &mut Vec<Issue>,
) -> FieldValue {
    let mut report = |finding: Option<Finding>| {
        if let Some(finding) = finding {
            issues.push(finding_to_issue(finding, schema.kind, entity, &column.header));
        }
    };

    let is_site_list = schema.hooks.splittable
        && schema
            .hooks
            .location
            .as_ref()
            .is_some_and(|hooks| hooks.location_field == column.field);

    match column.column_type {
        ColumnType::IdentifierList => {
            let parsed = parse_list(raw, config);
            for finding in parsed.findings {
                report(Some(finding));
            }
            FieldValue::List(parsed.value)
        }
        ColumnType::Identifier if is_site_list => {
            let mut parsed = parse_list(raw, config);
            for finding in parsed.findings.drain(..) {
                report(Some(finding));
            }
            if parsed.value.len() == 1 {
                FieldValue::Text(parsed.value.remove(0))
            } else {
                FieldValue::List(parsed.value)
            }
        }
        ColumnType::Identifier => {
            let parsed = canonical_id(raw, config);
            report(parsed.finding);
            FieldValue::Text(parsed.value.unwrap_or_default())
        }
        ColumnType::Integer => {
            let parsed = normalize_scalar(raw, config);
            report(parsed.finding);
            match parsed.value {
                Some(text) => {
                    let number = parse_integer(&text);
                    report(number.finding);
                    number
                        .value
                        .map(FieldValue::Integer)
                        .unwrap_or_else(|| FieldValue::Text(String::new()))
                }
                None => FieldValue::Text(String::new()),
            }
        }
        ColumnType::Text => {
            let parsed = normalize_scalar(raw, config);
            report(parsed.finding);
            let Some(text) = parsed.value else {
                return FieldValue::Text(String::new());
            };
            match &column.allowed {
                Some(rule) => {
                    let corrected = correct_value(text, &rule.values, config);
                    report(corrected.finding);
                    FieldValue::Text(corrected.value)
                }
                None => FieldValue::Text(text),
            }
        }
    }
}

fn finding_to_issue(finding: Finding, kind: EntityKind, entity: &str, column: &str) -> Issue {
    match finding {
        Finding::Malformed { raw } => Issue::MalformedScalar {
            kind,
            entity: entity.to_string(),
            column: column.to_string(),
            raw,
        },
        Finding::Ambiguous { value, candidates } => Issue::AmbiguousCorrection {
            kind,
            entity: entity.to_string(),
            column: column.to_string(),
            value,
            candidates,
        },
    }
}

/// Removes fields whose condition does not hold, e.g. `vlan` on a WAN network.
fn drop_inapplicable(entity: &mut Entity, schema: &KindSchema) {
    for column in &schema.columns {
        if let Some(condition) = &column.condition {
            if entity.text(&condition.field) != Some(condition.equals.as_str()) {
                entity.fields.remove(&column.field);
            }
        }
    }
}

/// Matches a sheet name against the registry, tolerating Latin look-alike
/// letters in Cyrillic sheet names.
pub fn canonical_sheet_name(
    name: &str,
    registry: &SchemaRegistry,
    config: &NormalizerConfig,
) -> Option<String> {
    let name = name.trim();
    if registry.kind_for_sheet(name).is_some() {
        return Some(name.to_string());
    }
    match correct_homoglyphs(name, &registry.sheet_names(), config) {
        Correction::Corrected(fixed) => registry.kind_for_sheet(&fixed).map(|_| fixed),
        Correction::Ambiguous(candidates) => {
            warn!(sheet = name, ?candidates, "sheet name matches several kinds, ignoring");
            None
        }
        Correction::Exact | Correction::NoMatch => None,
    }
}

/// Kind stored on a sheet; shared sheets report their first kind.
pub fn kind_for_sheet(
    name: &str,
    registry: &SchemaRegistry,
    config: &NormalizerConfig,
) -> Option<EntityKind> {
    canonical_sheet_name(name, registry, config).and_then(|sheet| registry.kind_for_sheet(&sheet))
}

/// Converts raw sheets into the canonical document.
///
/// Phase one reads every kind. Phase two builds the read-only network index
/// and resolves or splits locatable entities. Validation runs last over the
/// finished document.
pub fn tables_to_document(
    sheets: &[(String, Vec<RawRow>)],
    registry: &SchemaRegistry,
    options: &IngestOptions,
) -> Conversion {
    let mut rows_by_kind: BTreeMap<EntityKind, Vec<RawRow>> = BTreeMap::new();
    for (name, rows) in sheets {
        let Some(sheet) = canonical_sheet_name(name, registry, &options.normalizer) else {
            debug!(sheet = %name, "ignoring sheet with no registered kind");
            continue;
        };
        for row in rows {
            if let Some(kind) = registry.kind_for_row(&sheet, row) {
                rows_by_kind.entry(kind).or_default().push(row.clone());
            }
        }
    }

    let mut conversion = Conversion::default();
    let mut staged: BTreeMap<EntityKind, Vec<Entity>> = BTreeMap::new();
    for schema in registry.kinds() {
        let Some(rows) = rows_by_kind.get(&schema.kind) else {
            continue;
        };
        let ingest = rows_to_entities(rows, schema, options);
        if ingest.source_rows > 0 {
            conversion.source_counts.insert(schema.kind, ingest.source_rows);
        }
        conversion.issues.extend(ingest.issues);
        staged.insert(schema.kind, ingest.entities);
    }

    let index = build_network_index(&staged, registry, options);
    let mut taken: BTreeSet<String> = staged.values().flatten().map(|e| e.id.clone()).collect();

    for schema in registry.kinds() {
        let Some(entities) = staged.remove(&schema.kind) else {
            continue;
        };
        let placed = place_entities(entities, schema, &index, &mut taken, &mut conversion.issues);
        conversion.document.extend(schema.kind, placed);
    }

    conversion
        .issues
        .extend(validate_document(&conversion.document, registry));
    conversion
}

fn build_network_index(
    staged: &BTreeMap<EntityKind, Vec<Entity>>,
    registry: &SchemaRegistry,
    options: &IngestOptions,
) -> NetworkIndex {
    let networks = staged
        .get(&EntityKind::Network)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    match registry
        .schema(EntityKind::Network)
        .ok()
        .and_then(|schema| schema.hooks.location.as_ref())
    {
        Some(hooks) => NetworkIndex::build(networks, hooks, options.site_pattern.clone()),
        None => NetworkIndex::new(options.site_pattern.clone()),
    }
}

fn place_entities(
    entities: Vec<Entity>,
    schema: &KindSchema,
    index: &NetworkIndex,
    taken: &mut BTreeSet<String>,
    issues: &mut Vec<Issue>,
) -> Vec<Entity> {
    let Some(hooks) = &schema.hooks.location else {
        return entities;
    };
    let Some(connections_field) = &hooks.connections_field else {
        return entities;
    };

    let mut placed = Vec::with_capacity(entities.len());
    for entity in entities {
        let connected = entity.items(connections_field);
        let resolution = resolve_location(&entity, &hooks.location_field, &connected, index);

        let sites = match (&resolution, schema.hooks.splittable) {
            (LocationResolution::Unresolved, _) | (LocationResolution::Ambiguous(_), false) => {
                issues.push(Issue::UnresolvableLocation {
                    kind: schema.kind,
                    entity: entity.id.clone(),
                    candidates: resolution.tokens().into_iter().collect(),
                });
                BTreeSet::new()
            }
            _ => resolution.tokens(),
        };

        if !schema.hooks.splittable {
            let mut entity = entity;
            if let LocationResolution::Inferred(site) = &resolution {
                let value = match schema.column(&hooks.location_field) {
                    Some(column) if column.column_type == ColumnType::IdentifierList => {
                        FieldValue::List(vec![site.clone()])
                    }
                    _ => FieldValue::Text(site.clone()),
                };
                entity.set(hooks.location_field.clone(), value);
            }
            placed.push(entity);
            continue;
        }

        match split_by_location(&entity, hooks, &sites, index, taken) {
            Ok(parts) => {
                if parts.len() > 1 {
                    debug!(kind = %schema.kind, entity = %entity.id, parts = parts.len(), "split multi-site entity");
                    taken.extend(parts.iter().map(|part| part.id.clone()));
                }
                placed.extend(parts);
            }
            Err(issue) => {
                warn!(%issue, "dropping entity");
                issues.push(issue);
            }
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(header, value)| (header.to_string(), Some(value.to_string())))
            .collect()
    }

    fn options() -> IngestOptions {
        IngestOptions::standard().expect("options")
    }

    #[test]
    fn rows_become_normalised_entities() {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema(EntityKind::Network).expect("schema");
        let rows = vec![
            row(&[
                ("ID Network", " sbs.dc01.lan.10 "),
                ("Тип сети", "LAN"),
                ("VLAN", "10.0"),
                ("VRF  ", "core"),
                ("WAN Адрес", "10.0.0.1"),
                ("Расположение", "sbs.dc.01"),
                ("Сетевой сегмент/зона", "seg.b;\nseg.a"),
            ]),
            BTreeMap::from([("ID Network".to_string(), None)]),
        ];

        let ingest = rows_to_entities(&rows, schema, &options());
        assert_eq!(ingest.source_rows, 1);
        assert_eq!(ingest.entities.len(), 1);
        let network = &ingest.entities[0];
        assert_eq!(network.id, "sbs.dc01.lan.10");
        assert_eq!(network.get("vlan"), Some(&FieldValue::Integer(10)));
        assert_eq!(network.text("VRF"), Some("core"));
        assert_eq!(network.get("wan_ip"), None);
        assert_eq!(network.items("segment"), vec!["seg.b", "seg.a"]);
    }

    #[test]
    fn duplicate_rows_keep_the_first() {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema(EntityKind::Region).expect("schema");
        let rows = vec![
            row(&[("ID Региона", "sbs.region.msk"), ("Наименование", "Москва")]),
            row(&[("ID Региона", "sbs.region.msk"), ("Наименование", "Дубль")]),
        ];
        let ingest = rows_to_entities(&rows, schema, &options());
        assert_eq!(ingest.entities.len(), 1);
        assert_eq!(ingest.entities[0].text("title"), Some("Москва"));
        assert_eq!(ingest.entities[0].text("external_id"), Some("msk"));
        assert!(matches!(ingest.issues[0], Issue::DuplicateIdentifier { .. }));
    }

    #[test]
    fn enum_values_get_homoglyph_fixes() {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema(EntityKind::NetworkDevice).expect("schema");
        // Latin 'C' inside the Cyrillic abbreviation.
        let rows = vec![row(&[("ID Устройства", "fw-1"), ("Тип", "МCЭ")])];
        let ingest = rows_to_entities(&rows, schema, &options());
        assert_eq!(ingest.entities[0].text("type"), Some("МСЭ"));
        assert!(ingest.issues.is_empty());
    }

    #[test]
    fn kb_identifiers_drop_trailing_punctuation() {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema(EntityKind::KbService).expect("schema");
        let rows = vec![row(&[
            ("ID КБ сервиса", "sbs.kb.firewall:"),
            ("Подключенные сети", "- sbs.dc01.lan\n- sbs.dc02.lan"),
        ])];
        let ingest = rows_to_entities(&rows, schema, &options());
        assert_eq!(ingest.entities[0].id, "sbs.kb.firewall");
        assert_eq!(
            ingest.entities[0].items("network_connection"),
            vec!["sbs.dc01.lan", "sbs.dc02.lan"]
        );
    }

    #[test]
    fn malformed_cells_are_dropped_with_an_issue() {
        let registry = SchemaRegistry::standard();
        let schema = registry.schema(EntityKind::Dc).expect("schema");
        let rows = vec![row(&[("ID DC", "sbs.dc.01"), ("Кол-во стоек", "много"), ("Адрес", "#REF!")])];
        let ingest = rows_to_entities(&rows, schema, &options());
        assert_eq!(ingest.entities[0].get("rack_qty"), None);
        assert_eq!(ingest.entities[0].get("address"), None);
        assert_eq!(ingest.issues.len(), 2);
    }

    #[test]
    fn sheet_names_tolerate_latin_letters() {
        let registry = SchemaRegistry::standard();
        let config = NormalizerConfig::default();
        // Latin 'C' at the start.
        assert_eq!(kind_for_sheet("Cети", &registry, &config), Some(EntityKind::Network));
        assert_eq!(kind_for_sheet(" DC ", &registry, &config), Some(EntityKind::Dc));
        assert_eq!(kind_for_sheet("Лист1", &registry, &config), None);
    }

    #[test]
    fn multi_site_device_row_is_split() {
        let registry = SchemaRegistry::standard();
        let sheets = vec![
            (
                "Сети".to_string(),
                vec![
                    row(&[("ID Network", "net.dc01.a"), ("Тип сети", "WAN"), ("Расположение", "sbs.dc.01")]),
                    row(&[("ID Network", "net.dc02.b"), ("Тип сети", "WAN"), ("Расположение", "sbs.dc.02")]),
                ],
            ),
            (
                "Сетевые устройства".to_string(),
                vec![row(&[
                    ("ID Устройства", "dev-7"),
                    ("Подключенные сети (список)", "net.dc01.a, net.dc02.b"),
                    ("Расположение", ""),
                ])],
            ),
        ];

        let conversion = tables_to_document(&sheets, &registry, &options());
        let devices = conversion.document.entities(EntityKind::NetworkDevice);
        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["dev-7-01", "dev-7-02"]);
        assert_eq!(devices[0].text("location"), Some("sbs.dc.01"));
        assert_eq!(devices[0].items("network_connection"), vec!["net.dc01.a"]);
        assert_eq!(devices[1].text("location"), Some("sbs.dc.02"));
        assert_eq!(devices[1].items("network_connection"), vec!["net.dc02.b"]);
        assert_eq!(conversion.source_counts[&EntityKind::NetworkDevice], 1);
    }

    #[test]
    fn unconnected_device_is_reported_unresolved() {
        let registry = SchemaRegistry::standard();
        let sheets = vec![(
            "Сетевые устройства".to_string(),
            vec![row(&[("ID Устройства", "dev-1")])],
        )];
        let conversion = tables_to_document(&sheets, &registry, &options());
        assert_eq!(conversion.document.entities(EntityKind::NetworkDevice).len(), 1);
        assert!(conversion.issues.contains(&Issue::UnresolvableLocation {
            kind: EntityKind::NetworkDevice,
            entity: "dev-1".into(),
            candidates: Vec::new(),
        }));
    }

    #[test]
    fn collision_drops_only_the_colliding_device() {
        let registry = SchemaRegistry::standard();
        let sheets = vec![
            (
                "Сети".to_string(),
                vec![
                    row(&[("ID Network", "net.dc01.a"), ("Тип сети", "WAN"), ("Расположение", "sbs.dc.01")]),
                    row(&[("ID Network", "net.dc02.b"), ("Тип сети", "WAN"), ("Расположение", "sbs.dc.02")]),
                ],
            ),
            (
                "Сетевые устройства".to_string(),
                vec![
                    row(&[
                        ("ID Устройства", "dev-7"),
                        ("Подключенные сети (список)", "net.dc01.a, net.dc02.b"),
                    ]),
                    row(&[
                        ("ID Устройства", "dev-7-02"),
                        ("Подключенные сети (список)", "net.dc02.b"),
                    ]),
                    row(&[
                        ("ID Устройства", "sw-1"),
                        ("Подключенные сети (список)", "net.dc01.a"),
                    ]),
                ],
            ),
        ];

        let conversion = tables_to_document(&sheets, &registry, &options());
        let ids = conversion.document.ids(EntityKind::NetworkDevice);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["dev-7-02", "sw-1"]);
        assert!(conversion.issues.iter().any(|issue| matches!(
            issue,
            Issue::IdentifierCollision { entity, generated, .. }
                if entity == "dev-7" && generated == "dev-7-02"
        )));
        let devices = conversion.document.entities(EntityKind::NetworkDevice);
        let sw = devices.iter().find(|d| d.id == "sw-1").expect("sw-1 kept");
        assert_eq!(sw.text("location"), Some("sbs.dc.01"));
    }

    #[test]
    fn tech_service_location_comes_from_its_networks() {
        let registry = SchemaRegistry::standard();
        let sheets = vec![(
            "Тех. сервисы".to_string(),
            vec![
                row(&[
                    ("Идентификатор", "svc.pg"),
                    ("Тип резервирования", "active-active"),
                    ("Подключен к сети", "sbs.dc01.lan.10\nsbs.dc01.lan.20"),
                ]),
                row(&[
                    ("Идентификатор", "svc.zabbix"),
                    ("Тип сервиса", "Мониторинг"),
                    ("Подключен к сети", "sbs.dc01.lan.10, sbs.dc02.lan.10"),
                ]),
                row(&[
                    ("Идентификатор", "svc.backup"),
                    ("Класс", "Backup"),
                    ("ЦОД", "sbs.dc.03"),
                    ("Подключен к сети", "sbs.dc01.lan.10"),
                ]),
            ],
        )];

        let conversion = tables_to_document(&sheets, &registry, &options());

        let clusters = conversion.document.entities(EntityKind::Cluster);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].items("location"), vec!["sbs.dc.01"]);

        let monitorings = conversion.document.entities(EntityKind::Monitoring);
        assert_eq!(monitorings.len(), 1);
        assert_eq!(monitorings[0].get("location"), None);
        assert!(conversion.issues.contains(&Issue::UnresolvableLocation {
            kind: EntityKind::Monitoring,
            entity: "svc.zabbix".into(),
            candidates: vec!["sbs.dc.01".into(), "sbs.dc.02".into()],
        }));

        let backups = conversion.document.entities(EntityKind::Backup);
        assert_eq!(backups[0].items("location"), vec!["sbs.dc.03"]);
        assert_eq!(conversion.source_counts[&EntityKind::Cluster], 1);
        assert_eq!(conversion.source_counts[&EntityKind::Monitoring], 1);
        assert!(conversion.document.entities(EntityKind::ComputeService).is_empty());
    }
}
