use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use seaf_convert::flatten::{IngestOptions, SheetTable, WorkbookData};
use seaf_convert::io::{excel_write, yaml};
use seaf_convert::model::{Document, Entity, EntityKind, FieldValue, Issue};
use seaf_convert::normalize::NormalizerConfig;
use seaf_convert::schema::{Dialect, SchemaRegistry, WorkbookGroup};
use seaf_convert::sync;
use tempfile::tempdir;

fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

fn list(values: &[&str]) -> FieldValue {
    FieldValue::List(values.iter().map(|value| value.to_string()).collect())
}

fn inventory() -> Document {
    let mut document = Document::new();
    document.push(
        Entity::new(EntityKind::Region, "sbs.region.msk")
            .with("title", text("Москва"))
            .with("external_id", text("msk")),
    );
    document.push(
        Entity::new(EntityKind::AvailabilityZone, "sbs.az.msk1")
            .with("title", text("AZ 1"))
            .with("region", text("sbs.region.msk"))
            .with("external_id", text("msk1")),
    );
    document.push(
        Entity::new(EntityKind::Dc, "sbs.dc.01")
            .with("title", text("ЦОД 1"))
            .with("tier", text("3"))
            .with("rack_qty", FieldValue::Integer(40))
            .with("availabilityzone", text("sbs.az.msk1"))
            .with("external_id", text("01")),
    );
    document.push(
        Entity::new(EntityKind::Office, "sbs.office.spb")
            .with("title", text("Офис СПб"))
            .with("address", text("Невский пр., 1"))
            .with("region", text("sbs.region.msk"))
            .with("external_id", text("spb")),
    );
    document.push(
        Entity::new(EntityKind::NetworkSegment, "sbs.seg.core")
            .with("title", text("Ядро"))
            .with("sber.location", text("sbs.dc.01"))
            .with("sber.zone", text("INT")),
    );
    document.push(
        Entity::new(EntityKind::Network, "sbs.dc01.lan.10")
            .with("title", text("Серверная сеть"))
            .with("type", text("LAN"))
            .with("vlan", FieldValue::Integer(10))
            .with("lan_type", text("Проводная"))
            .with("ipnetwork", text("10.1.0.0/24"))
            .with("location", list(&["sbs.dc.01"]))
            .with("segment", list(&["sbs.seg.core"])),
    );
    document.push(
        Entity::new(EntityKind::Network, "sbs.wan.backbone")
            .with("type", text("WAN"))
            .with("wan_ip", text("192.0.2.1"))
            .with("location", list(&["sbs.dc.01", "sbs.office.spb"])),
    );
    document.push(
        Entity::new(EntityKind::NetworkDevice, "sbs.fw.01")
            .with("title", text("Межсетевой экран"))
            .with("realization_type", text("Физический"))
            .with("type", text("МСЭ"))
            .with("address", text("10.1.0.1"))
            .with("location", text("sbs.dc.01"))
            .with("segment", text("sbs.seg.core"))
            .with("network_connection", list(&["sbs.dc01.lan.10"])),
    );
    document.push(
        Entity::new(EntityKind::KbService, "sbs.kb.firewall")
            .with("title", text("Межсетевое экранирование"))
            .with("status", text("Используется"))
            .with("network_connection", list(&["sbs.dc01.lan.10", "sbs.wan.backbone"])),
    );
    document.push(
        Entity::new(EntityKind::ComputeService, "sbs.svc.dns")
            .with("title", text("DNS"))
            .with(
                "service_type",
                text("Управление сетевым адресным пространством (DHCP, DNS и т.д.)"),
            )
            .with("location", list(&["sbs.dc.01"]))
            .with("network_connection", list(&["sbs.dc01.lan.10"])),
    );
    document.push(
        Entity::new(EntityKind::Cluster, "sbs.svc.pg")
            .with("title", text("PostgreSQL"))
            .with("service_type", text("СУБД"))
            .with("reservation_type", text("active-passive"))
            .with("location", list(&["sbs.dc.01"]))
            .with("network_connection", list(&["sbs.dc01.lan.10"])),
    );
    document.push(
        Entity::new(EntityKind::Monitoring, "sbs.svc.zabbix")
            .with("title", text("Zabbix"))
            .with("location", list(&["sbs.dc.01", "sbs.office.spb"]))
            .with("network_connection", list(&["sbs.wan.backbone"])),
    );
    document
}

fn normalizer() -> NormalizerConfig {
    NormalizerConfig::default()
}

fn options() -> IngestOptions {
    IngestOptions::standard().expect("ingest options")
}

fn workbooks_in(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .expect("list directory")
        .map(|entry| entry.expect("directory entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "xlsx"))
        .collect();
    paths.sort();
    paths
}

fn file_contents(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(dir)
        .expect("list directory")
        .map(|entry| entry.expect("directory entry").path())
        .map(|path| {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .expect("file name")
                .to_string();
            (name, fs::read(&path).expect("read file"))
        })
        .collect()
}

fn sheet(name: &str, columns: &[&str], rows: &[&[&str]]) -> SheetTable {
    SheetTable {
        sheet_name: name.to_string(),
        columns: columns.iter().map(|column| column.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    }
}

#[test]
fn yaml_excel_yaml_roundtrip_preserves_document() {
    let registry = SchemaRegistry::standard();
    let source = inventory();
    let temp_dir = tempdir().expect("temporary directory");
    let yaml_in = temp_dir.path().join("yaml_in");
    let xlsx_dir = temp_dir.path().join("xlsx");
    let yaml_out = temp_dir.path().join("yaml_out");

    yaml::write_document(&source, &registry, Dialect::Seaf1, &yaml_in).expect("source written");
    let to_excel = sync::yaml_to_excel(&yaml_in, &xlsx_dir, &registry, &normalizer()).expect("YAML to Excel");
    assert!(!to_excel.has_errors(), "{:?}", to_excel.issues);
    assert!(to_excel.mismatches.is_empty());
    assert_eq!(to_excel.outputs.len(), 4);

    let to_yaml = sync::excel_to_yaml(
        &workbooks_in(&xlsx_dir),
        &yaml_out,
        Dialect::Seaf1,
        &registry,
        &options(),
    )
    .expect("Excel to YAML");
    assert!(!to_yaml.has_errors(), "{:?}", to_yaml.issues);
    assert!(to_yaml.mismatches.is_empty());

    let restored = yaml::read_document(&yaml_out, &registry).expect("restored read");
    assert_eq!(restored.document.canonical(), source.canonical());
}

#[test]
fn second_roundtrip_reproduces_the_same_files() {
    let registry = SchemaRegistry::standard();
    let temp_dir = tempdir().expect("temporary directory");
    let yaml_in = temp_dir.path().join("yaml_in");
    yaml::write_document(&inventory(), &registry, Dialect::Seaf2, &yaml_in).expect("source written");

    let mut yaml_dir = yaml_in;
    let mut generations = Vec::new();
    for generation in 0..2 {
        let xlsx_dir = temp_dir.path().join(format!("xlsx_{generation}"));
        let next_yaml = temp_dir.path().join(format!("yaml_{generation}"));
        sync::yaml_to_excel(&yaml_dir, &xlsx_dir, &registry, &normalizer()).expect("YAML to Excel");
        sync::excel_to_yaml(
            &workbooks_in(&xlsx_dir),
            &next_yaml,
            Dialect::Seaf2,
            &registry,
            &options(),
        )
        .expect("Excel to YAML");

        generations.push((file_contents(&xlsx_dir), file_contents(&next_yaml)));
        yaml_dir = next_yaml;
    }

    assert_eq!(generations[0], generations[1]);
}

#[test]
fn dialects_describe_the_same_document() {
    let registry = SchemaRegistry::standard();
    let temp_dir = tempdir().expect("temporary directory");
    let seaf1 = temp_dir.path().join("seaf1");
    let seaf2 = temp_dir.path().join("seaf2");

    yaml::write_document(&inventory(), &registry, Dialect::Seaf1, &seaf1).expect("source written");
    let report = sync::translate_yaml(&seaf1, &seaf2, Dialect::Seaf2, &registry).expect("translated");
    assert!(report.mismatches.is_empty());

    let names = file_contents(&seaf2);
    for expected in ["_root.yaml", "dc_office.yaml", "network_component.yaml", "networks_dc01.yaml"] {
        assert!(names.contains_key(expected), "missing {expected}");
    }
    let office = String::from_utf8(names["dc_office.yaml"].clone()).expect("utf-8");
    assert!(office.contains("seaf.company.ta.services.dc_offices"));

    let lhs = yaml::read_document(&seaf1, &registry).expect("SEAF1 read");
    let rhs = yaml::read_document(&seaf2, &registry).expect("SEAF2 read");
    assert_eq!(lhs.dialects.into_iter().collect::<Vec<_>>(), vec![Dialect::Seaf1]);
    assert_eq!(rhs.dialects.into_iter().collect::<Vec<_>>(), vec![Dialect::Seaf2]);
    assert_eq!(lhs.document.canonical(), rhs.document.canonical());
}

#[test]
fn device_spanning_two_sites_is_split_end_to_end() {
    let registry = SchemaRegistry::standard();
    let temp_dir = tempdir().expect("temporary directory");
    let xlsx_path = temp_dir.path().join(WorkbookGroup::Networks.default_file_name());
    let workbook = WorkbookData {
        group: WorkbookGroup::Networks,
        tables: vec![
            sheet(
                "Сети",
                &["ID Network", "Тип сети", "WAN Адрес", "Расположение"],
                &[
                    &["net.dc01.a", "WAN", "192.0.2.1", "sbs.dc.01"],
                    &["net.dc02.b", "WAN", "192.0.2.2", "sbs.dc.02"],
                ],
            ),
            sheet(
                "Сетевые устройства",
                &["ID Устройства", "Тип", "Подключенные сети (список)", "Расположение"],
                &[&["dev-7", "Маршрутизатор", "net.dc01.a,\nnet.dc02.b", ""]],
            ),
        ],
    };
    excel_write::write_workbook(&xlsx_path, &workbook).expect("workbook written");

    let out_dir = temp_dir.path().join("yaml");
    let report = sync::excel_to_yaml(&[xlsx_path], &out_dir, Dialect::Seaf1, &registry, &options())
        .expect("Excel to YAML");
    assert_eq!(report.source_counts[&EntityKind::NetworkDevice], 1);
    assert_eq!(report.dest_counts[&EntityKind::NetworkDevice], 2);

    let restored = yaml::read_document(&out_dir, &registry).expect("restored read");
    let devices = restored.document.entities(EntityKind::NetworkDevice);
    let summary: Vec<(&str, Option<&str>, Vec<String>)> = devices
        .iter()
        .map(|device| {
            (
                device.id.as_str(),
                device.text("location"),
                device.items("network_connection"),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("dev-7-01", Some("sbs.dc.01"), vec!["net.dc01.a".to_string()]),
            ("dev-7-02", Some("sbs.dc.02"), vec!["net.dc02.b".to_string()]),
        ]
    );
    assert!(fs::read_to_string(out_dir.join("networks_dc02.yaml"))
        .expect("shard written")
        .contains("net.dc02.b"));
}

#[test]
fn device_location_is_inferred_from_network_ids() {
    let registry = SchemaRegistry::standard();
    let temp_dir = tempdir().expect("temporary directory");
    let xlsx_path = temp_dir.path().join(WorkbookGroup::Networks.default_file_name());
    let workbook = WorkbookData {
        group: WorkbookGroup::Networks,
        tables: vec![
            sheet(
                "Сети",
                &["ID Network", "Тип сети", "Тип LAN", "Адрес сети"],
                &[
                    &["sbs.dc01.lan.10", "LAN", "Проводная", "10.1.0.0/24"],
                    &["sbs.dc01.lan.20", "LAN", "Проводная", "10.2.0.0/24"],
                ],
            ),
            sheet(
                "Сетевые устройства",
                &["ID Устройства", "Подключенные сети"],
                &[&["sw-1", "sbs.dc01.lan.10; sbs.dc01.lan.20"]],
            ),
        ],
    };
    excel_write::write_workbook(&xlsx_path, &workbook).expect("workbook written");

    let out_dir = temp_dir.path().join("yaml");
    sync::excel_to_yaml(&[xlsx_path], &out_dir, Dialect::Seaf1, &registry, &options())
        .expect("Excel to YAML");

    let restored = yaml::read_document(&out_dir, &registry).expect("restored read");
    let devices = restored.document.entities(EntityKind::NetworkDevice);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "sw-1");
    assert_eq!(devices[0].text("location"), Some("sbs.dc.01"));
    assert!(out_dir.join("networks_misc.yaml").exists());
}

#[test]
fn every_missing_reference_is_reported() {
    let registry = SchemaRegistry::standard();
    let temp_dir = tempdir().expect("temporary directory");
    let yaml_path = temp_dir.path().join("dc_az.yaml");
    fs::write(
        &yaml_path,
        "seaf.ta.services.dc_az:\n  sbs.az.1:\n    region: sbs.region.a\n  sbs.az.2:\n    region: sbs.region.b\n  sbs.az.3:\n    region: sbs.region.c\n",
    )
    .expect("fixture written");

    let report = sync::yaml_to_excel(&yaml_path, &temp_dir.path().join("xlsx"), &registry, &normalizer())
        .expect("YAML to Excel");
    let missing: Vec<&str> = report
        .issues
        .iter()
        .filter_map(|issue| match issue {
            Issue::MissingReference { missing, .. } => Some(missing.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(missing, vec!["sbs.region.a", "sbs.region.b", "sbs.region.c"]);
    assert!(report.has_errors());
}

#[test]
fn missing_workbook_is_skipped() {
    let registry = SchemaRegistry::standard();
    let temp_dir = tempdir().expect("temporary directory");
    let present = temp_dir.path().join(WorkbookGroup::KbServices.default_file_name());
    let absent = temp_dir.path().join("absent.xlsx");
    let workbook = WorkbookData {
        group: WorkbookGroup::KbServices,
        tables: vec![sheet(
            "Сервисы КБ",
            &["ID КБ сервиса", "Статус"],
            &[&["sbs.kb.vpn;", "Используется"]],
        )],
    };
    excel_write::write_workbook(&present, &workbook).expect("workbook written");

    let out_dir = temp_dir.path().join("yaml");
    let report = sync::excel_to_yaml(
        &[present, absent.clone()],
        &out_dir,
        Dialect::Seaf2,
        &registry,
        &options(),
    )
    .expect("Excel to YAML");

    assert!(report
        .issues
        .iter()
        .any(|issue| matches!(issue, Issue::SkippedInput { path, .. } if *path == absent)));
    assert!(!report.has_errors());
    let restored = yaml::read_document(&out_dir, &registry).expect("restored read");
    assert_eq!(restored.document.ids(EntityKind::KbService).into_iter().collect::<Vec<_>>(), vec!["sbs.kb.vpn"]);
}
