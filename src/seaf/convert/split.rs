use std::collections::BTreeSet;

use crate::seaf::convert::locate::NetworkIndex;
use crate::seaf::convert::model::{Entity, FieldValue, Issue};
use crate::seaf::convert::schema::LocationHooks;

/// Expands an entity that spans several sites into one entity per site.
///
/// With at most one site the entity is returned as is, its location filled in
/// when it was empty. With more, copies are numbered `<id>-01`, `<id>-02`, …
/// in ascending site order; each copy keeps only the networks of its own site
/// and a segment that belongs to them. A generated identifier already present
/// in `taken` drops the whole entity.
pub fn split_by_location(
    entity: &Entity,
    hooks: &LocationHooks,
    sites: &BTreeSet<String>,
    index: &NetworkIndex,
    taken: &BTreeSet<String>,
) -> Result<Vec<Entity>, Issue> {
    if sites.len() <= 1 {
        let mut single = entity.clone();
        if let Some(site) = sites.iter().next() {
            if single.get(&hooks.location_field).is_none() {
                single.set(hooks.location_field.clone(), FieldValue::Text(site.clone()));
            }
        }
        return Ok(vec![single]);
    }

    let connected = hooks
        .connections_field
        .as_deref()
        .map(|field| entity.items(field))
        .unwrap_or_default();

    let mut parts = Vec::with_capacity(sites.len());
    for (position, site) in sites.iter().enumerate() {
        let id = format!("{}-{:02}", entity.id, position + 1);
        if taken.contains(&id) {
            return Err(Issue::IdentifierCollision {
                kind: entity.kind,
                entity: entity.id.clone(),
                generated: id,
            });
        }

        let mut part = entity.clone();
        part.id = id;
        part.set(
            hooks.location_field.clone(),
            FieldValue::Text(site.clone()),
        );

        let local: Vec<String> = connected
            .iter()
            .filter(|network| index.site_of(network).as_deref() == Some(site.as_str()))
            .cloned()
            .collect();

        if let Some(segment_field) = &hooks.segment_field {
            let segment = local_segment(entity.text(segment_field), &local, index);
            part.set(
                segment_field.clone(),
                FieldValue::Text(segment.unwrap_or_default()),
            );
        }
        if let Some(connections_field) = &hooks.connections_field {
            part.set(connections_field.clone(), FieldValue::List(local));
        }
        parts.push(part);
    }
    Ok(parts)
}

/// Keeps `original` when one of the site's networks lives in it, otherwise
/// picks the only segment those networks share.
fn local_segment(original: Option<&str>, local: &[String], index: &NetworkIndex) -> Option<String> {
    let candidates: BTreeSet<&str> = local
        .iter()
        .flat_map(|network| index.segments_of(network))
        .map(String::as_str)
        .collect();

    if let Some(original) = original {
        if candidates.contains(original) {
            return Some(original.to_string());
        }
    }
    if candidates.len() == 1 {
        return candidates.into_iter().next().map(str::to_string);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seaf::convert::locate::SitePattern;
    use crate::seaf::convert::model::EntityKind;

    fn hooks() -> LocationHooks {
        LocationHooks {
            location_field: "location".into(),
            connections_field: Some("network_connection".into()),
            segment_field: Some("segment".into()),
        }
    }

    fn index() -> NetworkIndex {
        NetworkIndex::new(SitePattern::new(None).expect("site pattern"))
            .with_network("net.dc01.a", Some("sbs.dc.01".into()), vec!["seg.dc01".into()])
            .with_network("net.dc02.b", Some("sbs.dc.02".into()), vec!["seg.dc02".into()])
    }

    fn device() -> Entity {
        Entity::new(EntityKind::NetworkDevice, "dev-7")
            .with("title", FieldValue::Text("Edge router".into()))
            .with("segment", FieldValue::Text("seg.dc02".into()))
            .with(
                "network_connection",
                FieldValue::List(vec!["net.dc02.b".into(), "net.dc01.a".into()]),
            )
    }

    #[test]
    fn two_sites_produce_two_numbered_entities() {
        let sites = BTreeSet::from(["sbs.dc.02".to_string(), "sbs.dc.01".to_string()]);
        let parts = split_by_location(&device(), &hooks(), &sites, &index(), &BTreeSet::new())
            .expect("split");

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].id, "dev-7-01");
        assert_eq!(parts[0].text("location"), Some("sbs.dc.01"));
        assert_eq!(parts[0].items("network_connection"), vec!["net.dc01.a"]);
        assert_eq!(parts[0].text("segment"), Some("seg.dc01"));
        assert_eq!(parts[1].id, "dev-7-02");
        assert_eq!(parts[1].text("location"), Some("sbs.dc.02"));
        assert_eq!(parts[1].items("network_connection"), vec!["net.dc02.b"]);
        assert_eq!(parts[1].text("segment"), Some("seg.dc02"));
        assert_eq!(parts[1].text("title"), Some("Edge router"));
    }

    #[test]
    fn single_site_fills_missing_location() {
        let sites = BTreeSet::from(["sbs.dc.01".to_string()]);
        let parts = split_by_location(&device(), &hooks(), &sites, &index(), &BTreeSet::new())
            .expect("split");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].id, "dev-7");
        assert_eq!(parts[0].text("location"), Some("sbs.dc.01"));
        assert_eq!(parts[0].items("network_connection").len(), 2);
    }

    #[test]
    fn no_site_returns_entity_unchanged() {
        let parts = split_by_location(&device(), &hooks(), &BTreeSet::new(), &index(), &BTreeSet::new())
            .expect("split");
        assert_eq!(parts, vec![device()]);
    }

    #[test]
    fn collision_drops_the_entity() {
        let sites = BTreeSet::from(["sbs.dc.01".to_string(), "sbs.dc.02".to_string()]);
        let taken = BTreeSet::from(["dev-7-02".to_string()]);
        let err = split_by_location(&device(), &hooks(), &sites, &index(), &taken)
            .expect_err("collision");
        assert_eq!(
            err,
            Issue::IdentifierCollision {
                kind: EntityKind::NetworkDevice,
                entity: "dev-7".into(),
                generated: "dev-7-02".into(),
            }
        );
    }
}
