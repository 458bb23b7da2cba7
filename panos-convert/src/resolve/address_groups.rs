//! Address groups, static and tag-based dynamic.

use crate::objects::{CpObject, ObjectKind};
use crate::resolve::Worklist;
use crate::scope::ConversionScope;
use crate::source::{AddressGroupEntry, AddressGroupMembers};

struct RawGroup<'g> {
    entry: &'g AddressGroupEntry,
    members: Vec<String>,
}

/// Tag named by a dynamic group filter.
fn filter_tag(filter: &str) -> &str {
    filter.trim().trim_matches('\'').trim_matches('"').trim()
}

/// Resolve address groups against the scope's addresses and groups.
///
/// A member that resolves to nothing is dropped with a warning; the group is
/// still emitted. Dynamic groups become static groups of every address and
/// group carrying the filter tag.
pub fn convert_address_groups(
    scope: &mut ConversionScope<'_>,
    tags: &[String],
    groups: &[AddressGroupEntry],
) {
    scope.base.tags.extend(tags.iter().cloned());
    for group in groups {
        for tag in &group.meta.tags {
            let tagged = scope.base.address_tags.entry(tag.clone()).or_default();
            if !tagged.contains(&group.meta.name) {
                tagged.push(group.meta.name.clone());
            }
        }
    }

    let mut raw = Vec::new();
    for entry in groups {
        let members = match &entry.members {
            AddressGroupMembers::Static(members) => members.clone(),
            AddressGroupMembers::Dynamic { filter } => {
                let tag = filter_tag(filter);
                let tagged = scope.base.address_tags.get(tag);
                if tagged.is_none() && !scope.base.tags.contains(tag) {
                    scope.error(format!(
                        "{} dynamic network group is not converted because the filter is too complex",
                        entry.meta.name
                    ));
                    continue;
                }
                tagged
                    .into_iter()
                    .flatten()
                    .filter(|name| **name != entry.meta.name)
                    .cloned()
                    .collect()
            }
        };
        raw.push(RawGroup { entry, members });
    }

    let mut worklist = Worklist::new(raw.iter().map(|g| (g.entry.meta.name.as_str(), g)));
    for group in &raw {
        resolve(scope, &mut worklist, group);
    }
}

fn resolve(scope: &mut ConversionScope<'_>, worklist: &mut Worklist<'_, RawGroup<'_>>, group: &RawGroup<'_>) {
    let source = group.entry.meta.name.as_str();
    if !worklist.start(source) {
        return;
    }

    let mut members = Vec::new();
    for member in &group.members {
        if let Some(address) = scope.base.address(member) {
            members.push(address.name.clone());
            continue;
        }
        if worklist.is_in_progress(member) {
            scope.warn(format!(
                "{source} address group is part of a membership cycle through {member}"
            ));
            continue;
        }
        if let Some(nested) = worklist.pending(member) {
            resolve(scope, worklist, nested);
        }
        match scope.base.address_group(member) {
            Some(nested) => members.push(nested.name.clone()),
            None => scope.warn(format!(
                "{source} address group contains non-existing member: {member}"
            )),
        }
    }

    let name = scope.issue_name(source, "addresses group");
    let object = CpObject::new(name, ObjectKind::NetworkGroup { members })
        .with_comments(group.entry.meta.description.as_deref())
        .with_tags(group.entry.meta.tags.iter().cloned());
    let target = scope.base.insert(object);
    scope.base.address_groups.insert(source.to_string(), target);
    worklist.finish(source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::Catalog;
    use crate::scope::ConvertOptions;
    use crate::source::{AddressEntry, EntryMeta};
    use crate::translate::addresses::convert_addresses;
    use pretty_assertions::assert_eq;

    fn meta(name: &str, tags: &[&str]) -> EntryMeta {
        EntryMeta {
            name: name.to_string(),
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn host(name: &str, ip: &str, tags: &[&str]) -> AddressEntry {
        AddressEntry {
            meta: meta(name, tags),
            ip_netmask: Some(ip.to_string()),
            ..AddressEntry::default()
        }
    }

    fn group(name: &str, members: &[&str]) -> AddressGroupEntry {
        AddressGroupEntry {
            meta: meta(name, &[]),
            members: AddressGroupMembers::Static(members.iter().map(|m| m.to_string()).collect()),
        }
    }

    fn members<'s>(scope: &'s ConversionScope<'_>, name: &str) -> Vec<&'s str> {
        scope
            .base
            .address_group(name)
            .and_then(CpObject::members)
            .map(|m| m.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn bad_member_is_dropped_with_warning() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        convert_addresses(
            &mut scope,
            &[host("a", "10.0.0.1", &[]), host("b", "10.0.0.2", &[])],
        );

        convert_address_groups(&mut scope, &[], &[group("servers", &["a", "b", "ghost"])]);
        assert_eq!(members(&scope, "servers"), vec!["a", "b"]);
        assert_eq!(
            scope.diagnostics.warnings,
            vec!["servers address group contains non-existing member: ghost"]
        );
        assert!(scope.diagnostics.errors.is_empty());
    }

    #[test]
    fn forward_references_resolve_in_any_order() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        convert_addresses(&mut scope, &[host("a", "10.0.0.1", &[])]);

        let groups = vec![
            group("outer", &["middle"]),
            group("middle", &["inner"]),
            group("inner", &["a"]),
        ];
        convert_address_groups(&mut scope, &[], &groups);
        assert_eq!(members(&scope, "outer"), vec!["middle"]);
        assert_eq!(members(&scope, "middle"), vec!["inner"]);
        assert_eq!(members(&scope, "inner"), vec!["a"]);
        assert!(scope.diagnostics.is_clean());
    }

    #[test]
    fn cycle_terminates_with_warning() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        convert_address_groups(&mut scope, &[], &[group("x", &["y"]), group("y", &["x"])]);
        assert_eq!(members(&scope, "x"), vec!["y"]);
        assert!(members(&scope, "y").is_empty());
        assert_eq!(
            scope.diagnostics.warnings,
            vec!["y address group is part of a membership cycle through x"]
        );
    }

    #[test]
    fn dynamic_group_collects_tagged_objects() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        convert_addresses(
            &mut scope,
            &[host("web1", "10.0.0.1", &["web"]), host("db1", "10.0.0.9", &["db"])],
        );
        let dynamic = AddressGroupEntry {
            meta: meta("web-servers", &[]),
            members: AddressGroupMembers::Dynamic {
                filter: "'web'".to_string(),
            },
        };
        let complex = AddressGroupEntry {
            meta: meta("mixed", &[]),
            members: AddressGroupMembers::Dynamic {
                filter: "'web' and 'db'".to_string(),
            },
        };

        convert_address_groups(&mut scope, &["web".to_string()], &[dynamic, complex]);
        assert_eq!(members(&scope, "web-servers"), vec!["web1"]);
        assert!(scope.base.address_group("mixed").is_none());
        assert_eq!(
            scope.diagnostics.errors,
            vec!["mixed dynamic network group is not converted because the filter is too complex"]
        );
    }
}
