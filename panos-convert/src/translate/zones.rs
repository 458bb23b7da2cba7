use crate::objects::{CpObject, ObjectKind};
use crate::scope::ConversionScope;
use crate::source::ZoneEntry;

pub fn convert_zones(scope: &mut ConversionScope<'_>, zones: &[ZoneEntry]) {
    for zone in zones {
        let name = scope.issue_name(&zone.meta.name, "zone");
        let object = CpObject::new(name, ObjectKind::Zone)
            .with_comments(zone.meta.description.as_deref())
            .with_tags(zone.meta.tags.iter().cloned());
        let target = scope.base.insert(object);
        scope.base.zones.insert(zone.meta.name.clone(), target);
    }
}

/// Zone for `source`, created on first use when the scope does not define it.
///
/// Panorama device groups reference zones that live in templates, so a
/// missing zone is not an error.
pub fn zone_or_create(scope: &mut ConversionScope<'_>, source: &str) -> CpObject {
    if let Some(zone) = scope.base.zone(source) {
        return zone.clone();
    }
    let name = scope.issue_name(source, "zone");
    scope.warn(format!("{source} zone is not defined in {} and was created", scope.name));
    let object = CpObject::new(name, ObjectKind::Zone);
    let target = scope.base.insert(object.clone());
    scope.base.zones.insert(source.to_string(), target);
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::Catalog;
    use crate::scope::ConvertOptions;
    use crate::source::EntryMeta;
    use pretty_assertions::assert_eq;

    #[test]
    fn zones_are_sanitized_and_indexed_by_source_name() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let zones = vec![ZoneEntry {
            meta: EntryMeta {
                name: "Untrust Zone".to_string(),
                description: Some("internet".to_string()),
                tags: vec![],
            },
        }];

        convert_zones(&mut scope, &zones);
        let zone = scope.base.zone("Untrust Zone").expect("zone");
        assert_eq!(zone.name, "Untrust_Zone");
        assert_eq!(zone.comments, "internet");
        assert_eq!(scope.diagnostics.warnings.len(), 1);
    }

    #[test]
    fn undefined_zone_is_created_once() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("dg1", &catalog, &options);

        let first = zone_or_create(&mut scope, "dmz");
        let second = zone_or_create(&mut scope, "dmz");
        assert_eq!(first, second);
        assert_eq!(
            scope.diagnostics.warnings,
            vec!["dmz zone is not defined in dg1 and was created"]
        );
    }
}
