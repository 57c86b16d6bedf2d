//! Site inference from the networks an entity is attached to.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::seaf::convert::error::{Result, ToolError};
use crate::seaf::convert::model::Entity;
use crate::seaf::convert::schema::LocationHooks;

/// Extracts a site token from a network identifier.
///
/// `sbs.dc01.lan.10` decodes to `sbs.dc.01` and `sbs.office.spb.lan` to
/// `sbs.office.spb`. The token prefix is the first dot-separated part of the
/// network identifier unless an explicit prefix is configured.
#[derive(Debug, Clone)]
pub struct SitePattern {
    dc: Regex,
    office: Regex,
    prefix: Option<String>,
}

const OFFICE_SUFFIXES: [&str; 2] = ["lan", "wan"];

impl SitePattern {
    pub fn new(prefix: Option<String>) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|err| ToolError::Config(format!("site pattern: {err}")))
        };
        Ok(Self {
            dc: compile(r"\.dc(\d+)")?,
            office: compile(r"\.office\.([^.]+)")?,
            prefix,
        })
    }

    pub fn token(&self, network_id: &str) -> Option<String> {
        let prefix = match &self.prefix {
            Some(prefix) => prefix.as_str(),
            None => network_id
                .split_once('.')
                .map(|(head, _)| head)
                .unwrap_or("seaf"),
        };

        if let Some(captures) = self.dc.captures(network_id) {
            return Some(format!("{prefix}.dc.{}", &captures[1]));
        }
        if let Some(captures) = self.office.captures(network_id) {
            let site = &captures[1];
            if !OFFICE_SUFFIXES.contains(&site) {
                return Some(format!("{prefix}.office.{site}"));
            }
        }
        None
    }
}

/// Read-only lookup of each known network's site and segments, built once
/// all networks of a conversion have been read.
#[derive(Debug, Clone)]
pub struct NetworkIndex {
    pattern: SitePattern,
    sites: BTreeMap<String, Option<String>>,
    segments: BTreeMap<String, Vec<String>>,
}

impl NetworkIndex {
    pub fn new(pattern: SitePattern) -> Self {
        Self {
            pattern,
            sites: BTreeMap::new(),
            segments: BTreeMap::new(),
        }
    }

    /// Indexes networks using their declared location when it names exactly
    /// one site, and the identifier pattern otherwise.
    pub fn build(networks: &[Entity], hooks: &LocationHooks, pattern: SitePattern) -> Self {
        let mut index = Self::new(pattern);
        for network in networks {
            let declared = network.items(&hooks.location_field);
            let site = match declared.as_slice() {
                [single] => Some(single.clone()),
                _ => index.pattern.token(&network.id),
            };
            let segments = hooks
                .segment_field
                .as_deref()
                .map(|field| network.items(field))
                .unwrap_or_default();
            index = index.with_network(&network.id, site, segments);
        }
        index
    }

    pub fn with_network(mut self, id: &str, site: Option<String>, segments: Vec<String>) -> Self {
        self.sites.insert(id.to_string(), site);
        self.segments.insert(id.to_string(), segments);
        self
    }

    /// Site of a network; unknown networks fall back to the identifier pattern.
    pub fn site_of(&self, network_id: &str) -> Option<String> {
        match self.sites.get(network_id) {
            Some(site) => site.clone(),
            None => self.pattern.token(network_id),
        }
    }

    pub fn segments_of(&self, network_id: &str) -> &[String] {
        self.segments
            .get(network_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// How an entity's site was determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationResolution {
    /// The entity names its site(s) itself.
    Explicit(BTreeSet<String>),
    /// All connected networks agree on one site.
    Inferred(String),
    /// Connected networks point at several sites.
    Ambiguous(BTreeSet<String>),
    /// No connected network yields a site.
    Unresolved,
}

impl LocationResolution {
    /// The single resolved site, if there is one.
    pub fn token(&self) -> Option<&str> {
        match self {
            LocationResolution::Explicit(sites) if sites.len() == 1 => {
                sites.iter().next().map(String::as_str)
            }
            LocationResolution::Inferred(site) => Some(site),
            _ => None,
        }
    }

    /// Every candidate site, sorted.
    pub fn tokens(&self) -> BTreeSet<String> {
        match self {
            LocationResolution::Explicit(sites) | LocationResolution::Ambiguous(sites) => {
                sites.clone()
            }
            LocationResolution::Inferred(site) => BTreeSet::from([site.clone()]),
            LocationResolution::Unresolved => BTreeSet::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.token().is_some()
    }
}

/// Determines the site of `entity`. Explicit data always wins; otherwise the
/// distinct sites of `connected` networks decide.
pub fn resolve_location(
    entity: &Entity,
    location_field: &str,
    connected: &[String],
    index: &NetworkIndex,
) -> LocationResolution {
    let explicit: BTreeSet<String> = entity.items(location_field).into_iter().collect();
    if !explicit.is_empty() {
        return LocationResolution::Explicit(explicit);
    }

    let found: BTreeSet<String> = connected
        .iter()
        .filter_map(|network| index.site_of(network))
        .collect();
    match found.len() {
        0 => LocationResolution::Unresolved,
        1 => found
            .into_iter()
            .next()
            .map(LocationResolution::Inferred)
            .unwrap_or(LocationResolution::Unresolved),
        _ => LocationResolution::Ambiguous(found),
    }
}
