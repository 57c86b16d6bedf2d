//! Static description of every entity kind and of the two naming dialects.
//!
//! The registry is built once with [`SchemaRegistry::standard`] and handed to
//! the components that need it. It is the only place that knows namespace
//! keys, file names, sheet names, and column headers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::seaf::convert::error::{Result, ToolError};
use crate::seaf::convert::model::{EntityKind, RawRow, Severity};

/// Header of the column that names the kind of a row on a shared sheet.
pub const CLASS_HEADER: &str = "Класс";
const SERVICE_TYPE_HEADER: &str = "Тип сервиса";
const RESERVATION_HEADER: &str = "Тип резервирования";

/// Naming convention used for namespace keys and document file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Singular keys under `seaf.ta.*`.
    Seaf1,
    /// Plural keys under `seaf.company.ta.*`.
    Seaf2,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Seaf1 => write!(f, "seaf1"),
            Dialect::Seaf2 => write!(f, "seaf2"),
        }
    }
}

/// Physical workbook a sheet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum WorkbookGroup {
    Regions,
    Networks,
    KbServices,
    TechServices,
}

impl WorkbookGroup {
    pub const ALL: [WorkbookGroup; 4] = [
        WorkbookGroup::Regions,
        WorkbookGroup::Networks,
        WorkbookGroup::KbServices,
        WorkbookGroup::TechServices,
    ];

    pub fn default_file_name(self) -> &'static str {
        match self {
            WorkbookGroup::Regions => "regions_az_dc_offices.xlsx",
            WorkbookGroup::Networks => "segments_nets_netdevices.xlsx",
            WorkbookGroup::KbServices => "kb_services.xlsx",
            WorkbookGroup::TechServices => "tech_services.xlsx",
        }
    }
}

/// How raw cell text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Free text, whitespace collapsed.
    Text,
    /// Single identifier, all whitespace removed.
    Identifier,
    /// Integer literal.
    Integer,
    /// Comma/semicolon/newline separated identifiers.
    IdentifierList,
}

/// Closed vocabulary for an enumerated column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumRule {
    pub values: Vec<String>,
    pub severity: Severity,
}

/// A column is only meaningful while `field` equals `equals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub equals: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub header: String,
    pub aliases: Vec<String>,
    pub field: String,
    pub column_type: ColumnType,
    /// Kinds whose identifiers this column may hold; empty for plain data.
    pub references: Vec<EntityKind>,
    pub allowed: Option<EnumRule>,
    pub condition: Option<Condition>,
    pub required: bool,
}

impl ColumnSpec {
    pub fn new(header: &str, field: &str, column_type: ColumnType) -> Self {
        Self {
            header: header.to_string(),
            aliases: Vec::new(),
            field: field.to_string(),
            column_type,
            references: Vec::new(),
            allowed: None,
            condition: None,
            required: false,
        }
    }

    pub fn text(header: &str, field: &str) -> Self {
        Self::new(header, field, ColumnType::Text)
    }

    pub fn identifier(header: &str, field: &str) -> Self {
        Self::new(header, field, ColumnType::Identifier)
    }

    pub fn integer(header: &str, field: &str) -> Self {
        Self::new(header, field, ColumnType::Integer)
    }

    pub fn list(header: &str, field: &str) -> Self {
        Self::new(header, field, ColumnType::IdentifierList)
    }

    pub fn refs(mut self, targets: &[EntityKind]) -> Self {
        self.references = targets.to_vec();
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn one_of(mut self, values: &[&str], severity: Severity) -> Self {
        self.allowed = Some(EnumRule {
            values: values.iter().map(|value| value.to_string()).collect(),
            severity,
        });
        self
    }

    pub fn only_when(mut self, field: &str, equals: &str) -> Self {
        self.condition = Some(Condition {
            field: field.to_string(),
            equals: equals.to_string(),
        });
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// True when `header` names this column, ignoring surrounding whitespace.
    pub fn matches_header(&self, header: &str) -> bool {
        let header = header.trim();
        self.header == header || self.aliases.iter().any(|alias| alias == header)
    }
}

/// Fields used to place an entity on a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationHooks {
    pub location_field: String,
    /// Networks the entity is attached to, when locations can be inferred.
    pub connections_field: Option<String>,
    pub segment_field: Option<String>,
}

/// How rows of a sheet shared by several kinds are told apart.
///
/// The class column decides first. Rows without a known class fall back to
/// the service type, then to the reservation mode, then to the fallback kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetClass {
    /// Class column value written for this kind.
    pub label: String,
    pub service_types: Vec<String>,
    /// Lower-case reservation modes.
    pub reservations: Vec<String>,
    pub fallback: bool,
}

/// Per-kind behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindHooks {
    /// Store the last dot-separated part of the id as `external_id`.
    pub derive_external_id: bool,
    /// Characters stripped from the end of identifiers.
    pub trim_id_suffix: Option<String>,
    pub location: Option<LocationHooks>,
    /// Multi-site rows become one entity per site.
    pub splittable: bool,
    /// Document output is sharded into one file per location.
    pub shard_by_location: bool,
    /// Rows live on a sheet shared with other kinds.
    pub shared_sheet: Option<SheetClass>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSchema {
    pub kind: EntityKind,
    pub sheet: String,
    pub workbook: WorkbookGroup,
    pub id_header: String,
    pub id_aliases: Vec<String>,
    pub columns: Vec<ColumnSpec>,
    pub hooks: KindHooks,
}

impl KindSchema {
    pub fn column(&self, field: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.field == field)
    }

    pub fn matches_id_header(&self, header: &str) -> bool {
        let header = header.trim();
        self.id_header == header || self.id_aliases.iter().any(|alias| alias == header)
    }

    /// Header row as written to a sheet.
    pub fn headers(&self) -> Vec<String> {
        let class = self
            .hooks
            .shared_sheet
            .as_ref()
            .map(|_| CLASS_HEADER.to_string());
        std::iter::once(self.id_header.clone())
            .chain(self.columns.iter().map(|column| column.header.clone()))
            .chain(class)
            .collect()
    }
}

/// Namespace key and default document file of one kind in one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    pub key: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectTable {
    pub dialect: Dialect,
    pub root_file: String,
    pub namespaces: BTreeMap<EntityKind, NamespaceEntry>,
}

/// Combined view returned by [`SchemaRegistry::describe`].
#[derive(Debug, Clone, Copy)]
pub struct KindDescriptor<'a> {
    pub schema: &'a KindSchema,
    pub namespace: &'a NamespaceEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    kinds: BTreeMap<EntityKind, KindSchema>,
    dialects: BTreeMap<Dialect, DialectTable>,
}

impl SchemaRegistry {
    pub fn new(kinds: Vec<KindSchema>, dialects: Vec<DialectTable>) -> Self {
        Self {
            kinds: kinds.into_iter().map(|schema| (schema.kind, schema)).collect(),
            dialects: dialects
                .into_iter()
                .map(|table| (table.dialect, table))
                .collect(),
        }
    }

    /// Registry describing the SEAF inventory workbooks and both dialects.
    pub fn standard() -> Self {
        Self::new(
            standard_kinds(),
            vec![
                dialect_table(Dialect::Seaf1, "root.yaml", &SEAF1_NAMESPACES),
                dialect_table(Dialect::Seaf2, "_root.yaml", &SEAF2_NAMESPACES),
            ],
        )
    }

    pub fn schema(&self, kind: EntityKind) -> Result<&KindSchema> {
        self.kinds
            .get(&kind)
            .ok_or_else(|| ToolError::UnknownKind(kind.to_string()))
    }

    pub fn dialect(&self, dialect: Dialect) -> Result<&DialectTable> {
        self.dialects
            .get(&dialect)
            .ok_or_else(|| ToolError::UnknownKind(format!("dialect {dialect}")))
    }

    pub fn describe(&self, kind: EntityKind, dialect: Dialect) -> Result<KindDescriptor<'_>> {
        let schema = self.schema(kind)?;
        let namespace = self
            .dialect(dialect)?
            .namespaces
            .get(&kind)
            .ok_or_else(|| ToolError::UnknownKind(format!("{kind} in dialect {dialect}")))?;
        Ok(KindDescriptor { schema, namespace })
    }

    /// Registered kinds in dependency order.
    pub fn kinds(&self) -> impl Iterator<Item = &KindSchema> {
        EntityKind::ALL
            .iter()
            .filter_map(|kind| self.kinds.get(kind))
    }

    pub fn kinds_in(&self, workbook: WorkbookGroup) -> Vec<&KindSchema> {
        self.kinds()
            .filter(|schema| schema.workbook == workbook)
            .collect()
    }

    /// Resolves a namespace key of any registered dialect.
    pub fn kind_for_namespace(&self, key: &str) -> Option<(EntityKind, Dialect)> {
        self.dialects.values().find_map(|table| {
            table
                .namespaces
                .iter()
                .find(|(_, entry)| entry.key == key)
                .map(|(kind, _)| (*kind, table.dialect))
        })
    }

    /// First kind stored on `sheet`; see [`SchemaRegistry::kind_for_row`]
    /// for sheets shared by several kinds.
    pub fn kind_for_sheet(&self, sheet: &str) -> Option<EntityKind> {
        self.kinds_for_sheet(sheet).first().map(|schema| schema.kind)
    }

    pub fn kinds_for_sheet(&self, sheet: &str) -> Vec<&KindSchema> {
        let sheet = sheet.trim();
        self.kinds().filter(|schema| schema.sheet == sheet).collect()
    }

    /// Kind of one row of `sheet`.
    pub fn kind_for_row(&self, sheet: &str, row: &RawRow) -> Option<EntityKind> {
        let candidates = self.kinds_for_sheet(sheet);
        if let [single] = candidates.as_slice() {
            return Some(single.kind);
        }

        let cell = |header: &str| {
            row.iter()
                .find(|(name, value)| name.trim() == header && value.is_some())
                .and_then(|(_, value)| value.as_deref())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };
        let class = cell(CLASS_HEADER);
        let service = cell(SERVICE_TYPE_HEADER).or(class);
        let reservation = cell(RESERVATION_HEADER).map(str::to_lowercase);

        let rules: Vec<(EntityKind, &SheetClass)> = candidates
            .iter()
            .filter_map(|schema| {
                schema
                    .hooks
                    .shared_sheet
                    .as_ref()
                    .map(|rule| (schema.kind, rule))
            })
            .collect();
        let by_class = rules
            .iter()
            .find(|(_, rule)| class == Some(rule.label.as_str()));
        let by_service = || {
            rules.iter().find(|(_, rule)| {
                service.is_some_and(|value| rule.service_types.iter().any(|known| known == value))
            })
        };
        let by_reservation = || {
            rules.iter().find(|(_, rule)| {
                reservation
                    .as_deref()
                    .is_some_and(|value| rule.reservations.iter().any(|mode| mode == value))
            })
        };
        let fallback = || rules.iter().find(|(_, rule)| rule.fallback);

        by_class
            .or_else(by_service)
            .or_else(by_reservation)
            .or_else(fallback)
            .map(|(kind, _)| *kind)
    }

    /// Distinct sheet names, sorted.
    pub fn sheet_names(&self) -> Vec<String> {
        self.kinds()
            .map(|schema| schema.sheet.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Root document file names of every dialect.
    pub fn root_files(&self) -> Vec<&str> {
        self.dialects
            .values()
            .map(|table| table.root_file.as_str())
            .collect()
    }
}

const SEAF1_NAMESPACES: [(EntityKind, &str, &str); 12] = [
    (EntityKind::Region, "seaf.ta.services.dc_region", "dc_region.yaml"),
    (EntityKind::AvailabilityZone, "seaf.ta.services.dc_az", "dc_az.yaml"),
    (EntityKind::Dc, "seaf.ta.services.dc", "dc.yaml"),
    (EntityKind::Office, "seaf.ta.services.office", "office.yaml"),
    (
        EntityKind::NetworkSegment,
        "seaf.ta.services.network_segment",
        "network_segment.yaml",
    ),
    (EntityKind::Network, "seaf.ta.services.network", "networks.yaml"),
    (
        EntityKind::NetworkDevice,
        "seaf.ta.components.network",
        "components_network.yaml",
    ),
    (EntityKind::KbService, "seaf.ta.services.kb", "kb.yaml"),
    (
        EntityKind::ComputeService,
        "seaf.ta.services.compute_service",
        "compute_service.yaml",
    ),
    (EntityKind::Cluster, "seaf.ta.services.cluster", "cluster.yaml"),
    (
        EntityKind::Monitoring,
        "seaf.ta.services.monitoring",
        "monitoring.yaml",
    ),
    (EntityKind::Backup, "seaf.ta.services.backup", "backup.yaml"),
];

const SEAF2_NAMESPACES: [(EntityKind, &str, &str); 12] = [
    (
        EntityKind::Region,
        "seaf.company.ta.services.dc_regions",
        "dc_region.yaml",
    ),
    (
        EntityKind::AvailabilityZone,
        "seaf.company.ta.services.dc_azs",
        "dc_az.yaml",
    ),
    (EntityKind::Dc, "seaf.company.ta.services.dcs", "dc.yaml"),
    (
        EntityKind::Office,
        "seaf.company.ta.services.dc_offices",
        "dc_office.yaml",
    ),
    (
        EntityKind::NetworkSegment,
        "seaf.company.ta.services.network_segments",
        "network_segment.yaml",
    ),
    (
        EntityKind::Network,
        "seaf.company.ta.services.networks",
        "networks.yaml",
    ),
    (
        EntityKind::NetworkDevice,
        "seaf.company.ta.components.networks",
        "network_component.yaml",
    ),
    (EntityKind::KbService, "seaf.company.ta.services.kbs", "kb.yaml"),
    (
        EntityKind::ComputeService,
        "seaf.company.ta.services.compute_services",
        "compute_service.yaml",
    ),
    (
        EntityKind::Cluster,
        "seaf.company.ta.services.clusters",
        "cluster.yaml",
    ),
    (
        EntityKind::Monitoring,
        "seaf.company.ta.services.monitorings",
        "monitoring.yaml",
    ),
    (
        EntityKind::Backup,
        "seaf.company.ta.services.backups",
        "backup.yaml",
    ),
];

fn dialect_table(
    dialect: Dialect,
    root_file: &str,
    entries: &[(EntityKind, &str, &str)],
) -> DialectTable {
    DialectTable {
        dialect,
        root_file: root_file.to_string(),
        namespaces: entries
            .iter()
            .map(|(kind, key, file)| {
                (
                    *kind,
                    NamespaceEntry {
                        key: key.to_string(),
                        file_name: file.to_string(),
                    },
                )
            })
            .collect(),
    }
}

const NETWORK_TYPES: [&str; 2] = ["LAN", "WAN"];
const REALIZATION_TYPES: [&str; 2] = ["Виртуальный", "Физический"];
const DEVICE_TYPES: [&str; 7] = [
    "Маршрутизатор",
    "МСЭ",
    "Контроллер WiFi",
    "Криптошлюз",
    "VPN",
    "NAT",
    "Коммутатор",
];
const KB_STATUSES: [&str; 4] = ["Используется", "Создается", "Не используется", "Выводится"];
const MONITORING_SERVICES: [&str; 2] = ["Мониторинг", "Логгирование"];
const BACKUP_SERVICES: [&str; 2] = [
    "Резервное копирование",
    "Бекапирование и восстановление данных",
];
const SERVICE_TYPES: [&str; 13] = [
    "Управление ИТ-службой, ИТ-инфраструктурой и ИТ-активами (CMDB, ITSM и т.д.)",
    "Управление и автоматизацией (Ansible, Terraform, Jenkins и т.д.)",
    "Управление разработкой и хранения кода (Gitlab, Jira и т.д.)",
    "Управление сетевым адресным пространством (DHCP, DNS и т.д.)",
    "Виртуализация рабочих мест (ВАРМ и VDI)",
    "Шлюз, Балансировщик, прокси",
    "СУБД",
    "Распределенный кэш",
    "Интеграционная шина  (MQ, ETL, API)",
    "Файловый ресурс (FTP, NFS, SMB, S3 и т.д.)",
    "Инфраструктура удаленного доступа",
    "Коммуникации (АТС, Почта, мессенджеры, СМС шлюзы и т.д.)",
    "Серверы приложений и т.д.",
];
const CLUSTER_RESERVATIONS: [&str; 4] = ["active-active", "active-passive", "n+1", "да"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Compute services, clusters, monitorings, and backups share one sheet and
/// take their site from the networks they are attached to.
fn tech_service(kind: EntityKind, class: SheetClass) -> KindSchema {
    let service_types: Vec<&str> = SERVICE_TYPES
        .iter()
        .chain(&MONITORING_SERVICES)
        .chain(&BACKUP_SERVICES)
        .copied()
        .collect();
    KindSchema {
        kind,
        sheet: "Тех. сервисы".into(),
        workbook: WorkbookGroup::TechServices,
        id_header: "Идентификатор".into(),
        id_aliases: Vec::new(),
        columns: vec![
            ColumnSpec::text("Наименование", "title"),
            ColumnSpec::text("Описание", "description"),
            ColumnSpec::text(SERVICE_TYPE_HEADER, "service_type")
                .one_of(&service_types, Severity::Warning),
            ColumnSpec::text(RESERVATION_HEADER, "reservation_type"),
            ColumnSpec::list("ЦОД", "location").refs(&[EntityKind::Dc, EntityKind::Office]),
            ColumnSpec::list("Подключен к сети", "network_connection")
                .alias("Подключен к  сети")
                .refs(&[EntityKind::Network]),
        ],
        hooks: KindHooks {
            location: Some(LocationHooks {
                location_field: "location".into(),
                connections_field: Some("network_connection".into()),
                segment_field: None,
            }),
            shared_sheet: Some(class),
            ..KindHooks::default()
        },
    }
}

fn standard_kinds() -> Vec<KindSchema> {
    use EntityKind::*;

    let sites = [Dc, Office];
    let site_hooks = KindHooks {
        derive_external_id: true,
        ..KindHooks::default()
    };

    vec![
        KindSchema {
            kind: Region,
            sheet: "Регионы".into(),
            workbook: WorkbookGroup::Regions,
            id_header: "ID Региона".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Наименование", "title"),
                ColumnSpec::text("Описание", "description"),
            ],
            hooks: site_hooks.clone(),
        },
        KindSchema {
            kind: AvailabilityZone,
            sheet: "AZ".into(),
            workbook: WorkbookGroup::Regions,
            id_header: "ID AZ".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Наименование", "title"),
                ColumnSpec::text("Описание", "description"),
                ColumnSpec::text("Поставщик", "vendor"),
                ColumnSpec::identifier("Регион", "region").refs(&[Region]),
            ],
            hooks: site_hooks.clone(),
        },
        KindSchema {
            kind: Dc,
            sheet: "DC".into(),
            workbook: WorkbookGroup::Regions,
            id_header: "ID DC".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Наименование", "title"),
                ColumnSpec::text("Описание", "description"),
                ColumnSpec::text("Поставщик", "vendor"),
                ColumnSpec::text("Tier", "tier"),
                ColumnSpec::text("Тип", "type"),
                ColumnSpec::integer("Кол-во стоек", "rack_qty"),
                ColumnSpec::text("Адрес", "address"),
                ColumnSpec::text("Форма владения", "ownership"),
                ColumnSpec::identifier("AZ", "availabilityzone").refs(&[AvailabilityZone]),
            ],
            hooks: site_hooks.clone(),
        },
        KindSchema {
            kind: Office,
            sheet: "Офисы".into(),
            workbook: WorkbookGroup::Regions,
            id_header: "ID Офиса".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Наименование", "title"),
                ColumnSpec::text("Описание", "description"),
                ColumnSpec::text("Адрес", "address"),
                ColumnSpec::identifier("Регион", "region").refs(&[Region]),
            ],
            hooks: site_hooks,
        },
        KindSchema {
            kind: NetworkSegment,
            sheet: "Сегменты".into(),
            workbook: WorkbookGroup::Networks,
            id_header: "ID сетевые сегмента/зоны".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Наименование", "title"),
                ColumnSpec::text("Описание", "description"),
                ColumnSpec::identifier("Расположение", "sber.location").refs(&sites),
                ColumnSpec::text("Зона", "sber.zone"),
            ],
            hooks: KindHooks::default(),
        },
        KindSchema {
            kind: Network,
            sheet: "Сети".into(),
            workbook: WorkbookGroup::Networks,
            id_header: "ID Network".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Наименование", "title"),
                ColumnSpec::text("Описание", "description"),
                ColumnSpec::text("Тип сети", "type")
                    .one_of(&NETWORK_TYPES, Severity::Error)
                    .required(),
                ColumnSpec::integer("VLAN", "vlan").only_when("type", "LAN"),
                ColumnSpec::text("VRF", "VRF"),
                ColumnSpec::text("Провайдер", "provider"),
                ColumnSpec::integer("Скорость", "bandwidth"),
                ColumnSpec::text("Резервирование", "sber.reservation"),
                ColumnSpec::text("Тип сети (проводная, беспроводная)", "lan_type")
                    .alias("Тип LAN")
                    .only_when("type", "LAN")
                    .required(),
                ColumnSpec::text("Адрес сети", "ipnetwork")
                    .only_when("type", "LAN")
                    .required(),
                ColumnSpec::text("WAN Адрес", "wan_ip").only_when("type", "WAN"),
                ColumnSpec::list("Расположение", "location").refs(&sites),
                ColumnSpec::list("Сетевой сегмент/зона(ID)", "segment")
                    .alias("Сетевой сегмент/зона")
                    .refs(&[NetworkSegment]),
            ],
            hooks: KindHooks {
                location: Some(LocationHooks {
                    location_field: "location".into(),
                    connections_field: None,
                    segment_field: Some("segment".into()),
                }),
                shard_by_location: true,
                ..KindHooks::default()
            },
        },
        KindSchema {
            kind: NetworkDevice,
            sheet: "Сетевые устройства".into(),
            workbook: WorkbookGroup::Networks,
            id_header: "ID Устройства".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Наименование", "title"),
                ColumnSpec::text("Тип реализации", "realization_type")
                    .one_of(&REALIZATION_TYPES, Severity::Error),
                ColumnSpec::text("Тип", "type")
                    .alias("Тип устройства")
                    .one_of(&DEVICE_TYPES, Severity::Error),
                ColumnSpec::text("Модель", "model"),
                ColumnSpec::text("Назначение", "purpose"),
                ColumnSpec::identifier("IP адрес", "address"),
                ColumnSpec::text("Описание", "description"),
                ColumnSpec::identifier("Расположение", "location").refs(&sites),
                ColumnSpec::identifier("Расположение (ID сегмента/зоны)", "segment")
                    .alias("Сетевой сегмент/зона (ID)")
                    .refs(&[NetworkSegment]),
                ColumnSpec::list("Подключенные сети (список)", "network_connection")
                    .alias("Подключенные сети")
                    .refs(&[Network]),
            ],
            hooks: KindHooks {
                location: Some(LocationHooks {
                    location_field: "location".into(),
                    connections_field: Some("network_connection".into()),
                    segment_field: Some("segment".into()),
                }),
                splittable: true,
                ..KindHooks::default()
            },
        },
        KindSchema {
            kind: KbService,
            sheet: "Сервисы КБ".into(),
            workbook: WorkbookGroup::KbServices,
            id_header: "ID КБ сервиса".into(),
            id_aliases: Vec::new(),
            columns: vec![
                ColumnSpec::text("Название сервиса", "title").alias("Название"),
                ColumnSpec::text("Tag", "tag"),
                ColumnSpec::text("Описание", "description"),
                ColumnSpec::text("Технология", "technology"),
                ColumnSpec::text("Название ПО", "software_name"),
                ColumnSpec::text("Статус", "status").one_of(&KB_STATUSES, Severity::Warning),
                ColumnSpec::list("Подключенные сети", "network_connection").refs(&[Network]),
            ],
            hooks: KindHooks {
                trim_id_suffix: Some(":;,.".into()),
                ..KindHooks::default()
            },
        },
        tech_service(
            ComputeService,
            SheetClass {
                label: "Compute Service".into(),
                fallback: true,
                ..SheetClass::default()
            },
        ),
        tech_service(
            Cluster,
            SheetClass {
                label: "Cluster".into(),
                reservations: strings(&CLUSTER_RESERVATIONS),
                ..SheetClass::default()
            },
        ),
        tech_service(
            Monitoring,
            SheetClass {
                label: "Monitoring".into(),
                service_types: strings(&MONITORING_SERVICES),
                ..SheetClass::default()
            },
        ),
        tech_service(
            Backup,
            SheetClass {
                label: "Backup".into(),
                service_types: strings(&BACKUP_SERVICES),
                ..SheetClass::default()
            },
        ),
    ]
}
