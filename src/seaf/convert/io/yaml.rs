//! Reading and writing the namespace-keyed YAML document tree.
//!
//! A document file maps one or more namespace keys to the entities of one
//! kind, either as `id → fields` or as a sequence of mappings carrying an `id`
//! field. Root files hold an `imports` list of sibling files.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::seaf::convert::error::{Result, ToolError};
use crate::seaf::convert::io::write_atomic;
use crate::seaf::convert::model::{Document, Entity, EntityKind, FieldValue, Issue};
use crate::seaf::convert::schema::{ColumnType, Dialect, KindSchema, SchemaRegistry};

const IMPORTS_KEY: &str = "imports";
const MISC_SHARD: &str = "misc";

#[derive(Debug, Serialize)]
struct RootDocument {
    imports: Vec<String>,
}

/// Everything gathered from a YAML tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedDocument {
    pub document: Document,
    /// Dialects whose namespace keys were seen.
    pub dialects: BTreeSet<Dialect>,
    pub files: Vec<PathBuf>,
    pub issues: Vec<Issue>,
}

/// Reads a document tree from a file or a directory.
///
/// A directory is read through its root file when it has one and otherwise
/// by loading every `*.yaml` file in name order. Imported files that cannot
/// be read are reported as [`Issue::SkippedInput`].
pub fn read_document(path: &Path, registry: &SchemaRegistry) -> Result<LoadedDocument> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }

    let mut reader = TreeReader::new(registry);
    if path.is_dir() {
        let root = registry
            .root_files()
            .into_iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file());
        match root {
            Some(root) => reader.read_file(&root)?,
            None => {
                for file in yaml_files(path, registry)? {
                    reader.read_file_or_skip(&file);
                }
            }
        }
    } else {
        reader.read_file(path)?;
    }
    Ok(reader.finish())
}

fn yaml_files(dir: &Path, registry: &SchemaRegistry) -> Result<Vec<PathBuf>> {
    let roots = registry.root_files();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        let is_root = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| roots.contains(&name));
        if path.is_file() && is_yaml && !is_root {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

struct TreeReader<'a> {
    registry: &'a SchemaRegistry,
    visited: BTreeSet<PathBuf>,
    sections: BTreeMap<EntityKind, Vec<Entity>>,
    loaded: LoadedDocument,
}

impl<'a> TreeReader<'a> {
    fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            visited: BTreeSet::new(),
            sections: BTreeMap::new(),
            loaded: LoadedDocument::default(),
        }
    }

    fn read_file_or_skip(&mut self, path: &Path) {
        if let Err(err) = self.read_file(path) {
            warn!(path = %path.display(), error = %err, "skipping unreadable document");
            self.loaded.issues.push(Issue::SkippedInput {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    }

    fn read_file(&mut self, path: &Path) -> Result<()> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.visited.insert(key) {
            return Ok(());
        }

        let text = fs::read_to_string(path)?;
        let value: Value = serde_yaml::from_str(&text)?;
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            _ => {
                return Err(ToolError::InvalidDocument {
                    path: path.to_path_buf(),
                    reason: "top level is not a mapping".into(),
                });
            }
        };
        self.loaded.files.push(path.to_path_buf());
        debug!(path = %path.display(), keys = mapping.len(), "read document file");

        let mut imports = Vec::new();
        for (key, body) in &mapping {
            let Some(key) = key.as_str() else {
                continue;
            };
            if key == IMPORTS_KEY {
                let listed: Vec<String> = serde_yaml::from_value(body.clone())?;
                imports.extend(listed);
                continue;
            }
            let Some((kind, dialect)) = self.registry.kind_for_namespace(key) else {
                debug!(namespace = key, "ignoring unknown namespace");
                continue;
            };
            self.loaded.dialects.insert(dialect);
            let schema = self.registry.schema(kind)?;
            let entities = section_entities(body, schema, path)?;
            self.merge(kind, entities);
        }

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for import in imports {
            self.read_file_or_skip(&base.join(import));
        }
        Ok(())
    }

    /// Adds entities of one kind. An identifier seen before with identical
    /// content is dropped silently; differing content keeps the first copy.
    fn merge(&mut self, kind: EntityKind, entities: Vec<Entity>) {
        let section = self.sections.entry(kind).or_default();
        for entity in entities {
            match section.iter().find(|existing| existing.id == entity.id) {
                Some(existing) if existing.canonical() == entity.canonical() => {}
                Some(_) => self.loaded.issues.push(Issue::DuplicateIdentifier {
                    kind,
                    entity: entity.id,
                    existing: kind,
                }),
                None => section.push(entity),
            }
        }
    }

    fn finish(mut self) -> LoadedDocument {
        for (kind, entities) in self.sections {
            self.loaded.document.extend(kind, entities);
        }
        self.loaded
    }
}

fn section_entities(body: &Value, schema: &KindSchema, path: &Path) -> Result<Vec<Entity>> {
    let invalid = |reason: String| ToolError::InvalidDocument {
        path: path.to_path_buf(),
        reason,
    };

    let mut entities = Vec::new();
    match body {
        Value::Null => {}
        Value::Mapping(items) => {
            for (id, fields) in items {
                let id = scalar_text(id)
                    .ok_or_else(|| invalid(format!("{}: non-scalar identifier", schema.kind)))?;
                let mut entity = Entity::new(schema.kind, id);
                if let Value::Mapping(fields) = fields {
                    read_fields(&mut entity, fields, "", schema);
                }
                entities.push(entity);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                let Value::Mapping(fields) = item else {
                    return Err(invalid(format!("{}: sequence item is not a mapping", schema.kind)));
                };
                let id = fields
                    .get("id")
                    .and_then(scalar_text)
                    .ok_or_else(|| invalid(format!("{}: sequence item without id", schema.kind)))?;
                let mut entity = Entity::new(schema.kind, id);
                read_fields(&mut entity, fields, "", schema);
                entity.fields.remove("id");
                entities.push(entity);
            }
        }
        _ => return Err(invalid(format!("{}: section is not a mapping", schema.kind))),
    }
    Ok(entities)
}

/// Copies a mapping into entity fields, joining nested keys with dots.
fn read_fields(entity: &mut Entity, fields: &Mapping, prefix: &str, schema: &KindSchema) {
    for (key, value) in fields {
        let Some(key) = scalar_text(key) else {
            continue;
        };
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        if let Value::Mapping(nested) = value {
            read_fields(entity, nested, &name, schema);
            continue;
        }
        let column_type = schema.column(&name).map(|column| column.column_type);
        if let Some(value) = coerce(value, column_type) {
            entity.set(name, value);
        }
    }
}

fn coerce(value: &Value, column_type: Option<ColumnType>) -> Option<FieldValue> {
    match (value, column_type) {
        (Value::Null, _) => None,
        (Value::Sequence(items), Some(ColumnType::IdentifierList) | None) => {
            Some(FieldValue::List(items.iter().filter_map(scalar_text).collect()))
        }
        (Value::Sequence(items), _) => {
            let mut items: Vec<String> = items.iter().filter_map(scalar_text).collect();
            match items.len() {
                0 => None,
                1 => Some(FieldValue::Text(items.remove(0))),
                _ => Some(FieldValue::List(items)),
            }
        }
        (scalar, Some(ColumnType::IdentifierList)) => {
            scalar_text(scalar).map(|text| FieldValue::List(vec![text]))
        }
        (Value::Number(number), Some(ColumnType::Integer) | None) => match number.as_i64() {
            Some(integer) => Some(FieldValue::Integer(integer)),
            None => Some(FieldValue::Text(number.to_string())),
        },
        (Value::String(text), Some(ColumnType::Integer)) => match text.trim().parse::<i64>() {
            Ok(integer) => Some(FieldValue::Integer(integer)),
            Err(_) => Some(FieldValue::Text(text.clone())),
        },
        (scalar, _) => scalar_text(scalar).map(FieldValue::Text),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Writes a document tree in `dialect` under `out_dir` and returns the files
/// written, root file last. Kinds without entities get no file.
pub fn write_document(
    document: &Document,
    registry: &SchemaRegistry,
    dialect: Dialect,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let table = registry.dialect(dialect)?;
    let mut files: BTreeMap<String, (EntityKind, String, Vec<&Entity>)> = BTreeMap::new();

    for schema in registry.kinds() {
        let entities = document.entities(schema.kind);
        if entities.is_empty() {
            continue;
        }
        let descriptor = registry.describe(schema.kind, dialect)?;
        let namespace = descriptor.namespace;
        for entity in entities {
            for file_name in target_files(entity, schema, &namespace.file_name) {
                files
                    .entry(file_name)
                    .or_insert_with(|| (schema.kind, namespace.key.clone(), Vec::new()))
                    .2
                    .push(entity);
            }
        }
    }

    let mut written = Vec::with_capacity(files.len() + 1);
    for (file_name, (kind, namespace, entities)) in files.iter_mut() {
        entities.sort_by(|lhs, rhs| lhs.id.cmp(&rhs.id));
        let schema = registry.schema(*kind)?;
        let mut section = Mapping::new();
        for entity in entities.iter() {
            section.insert(Value::from(entity.id.clone()), entity_value(entity, schema));
        }
        let mut root = Mapping::new();
        root.insert(Value::from(namespace.clone()), Value::Mapping(section));

        let path = out_dir.join(file_name.as_str());
        write_atomic(&path, serde_yaml::to_string(&Value::Mapping(root))?.as_bytes())?;
        debug!(path = %path.display(), entities = entities.len(), "wrote document file");
        written.push(path);
    }

    let root = RootDocument {
        imports: files.keys().cloned().collect(),
    };
    let root_path = out_dir.join(&table.root_file);
    write_atomic(&root_path, serde_yaml::to_string(&root)?.as_bytes())?;
    written.push(root_path);
    Ok(written)
}

/// File names an entity is written to. Location-sharded kinds go to one file
/// per site (`networks_dc01.yaml`) or to the `misc` shard without a site.
fn target_files(entity: &Entity, schema: &KindSchema, default_file: &str) -> Vec<String> {
    let location_field = schema
        .hooks
        .location
        .as_ref()
        .map(|hooks| hooks.location_field.as_str());
    let (true, Some(location_field)) = (schema.hooks.shard_by_location, location_field) else {
        return vec![default_file.to_string()];
    };

    let stem = default_file
        .strip_suffix(".yaml")
        .unwrap_or(default_file);
    let tokens: BTreeSet<String> = entity
        .items(location_field)
        .iter()
        .map(|site| shard_token(site))
        .collect();
    if tokens.is_empty() {
        return vec![format!("{stem}_{MISC_SHARD}.yaml")];
    }
    tokens
        .into_iter()
        .map(|token| format!("{stem}_{token}.yaml"))
        .collect()
}

/// `sbs.dc.01` → `dc01`, `sbs.office.spb` → `office_spb`, anything else has
/// runs of non-alphanumerics replaced by `_`.
pub fn shard_token(site: &str) -> String {
    let parts: Vec<&str> = site.split('.').collect();
    match parts.as_slice() {
        [_, "dc", number] if number.chars().all(|ch| ch.is_ascii_digit()) => format!("dc{number}"),
        [_, "office", rest @ ..] if !rest.is_empty() => {
            format!("office_{}", sanitize(&rest.join(".")))
        }
        _ => {
            let token = sanitize(site);
            if token.is_empty() { "loc".to_string() } else { token }
        }
    }
}

fn sanitize(raw: &str) -> String {
    let mut token = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            token.push(ch);
        } else if !token.ends_with('_') {
            token.push('_');
        }
    }
    token.trim_matches('_').to_string()
}

/// Entity fields as a YAML mapping: schema columns first, then any other
/// fields by name, with dotted names re-nested.
fn entity_value(entity: &Entity, schema: &KindSchema) -> Value {
    let mut ordered: Vec<(&str, &FieldValue)> = schema
        .columns
        .iter()
        .filter_map(|column| {
            entity
                .get(&column.field)
                .map(|value| (column.field.as_str(), value))
        })
        .collect();
    ordered.extend(
        entity
            .fields
            .iter()
            .filter(|(name, _)| schema.column(name).is_none())
            .map(|(name, value)| (name.as_str(), value)),
    );

    let mut mapping = Mapping::new();
    for (name, value) in ordered {
        insert_nested(&mut mapping, name, field_value(value));
    }
    Value::Mapping(mapping)
}

fn insert_nested(mapping: &mut Mapping, name: &str, value: Value) {
    match name.split_once('.') {
        Some((head, rest)) if !head.is_empty() && !rest.is_empty() => {
            let key = Value::from(head);
            if !matches!(mapping.get(&key), Some(Value::Mapping(_))) {
                mapping.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            if let Some(Value::Mapping(nested)) = mapping.get_mut(&key) {
                insert_nested(nested, rest, value);
            }
        }
        _ => {
            mapping.insert(Value::from(name), value);
        }
    }
}

fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Integer(integer) => Value::from(*integer),
        FieldValue::Text(text) => Value::from(text.clone()),
        FieldValue::List(items) => {
            Value::Sequence(items.iter().cloned().map(Value::from).collect())
        }
    }
}
