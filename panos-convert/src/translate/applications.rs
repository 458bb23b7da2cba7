//! Application filters and application groups.
//!
//! Group members resolve, in order, against the application match table,
//! the other groups of the same batch, groups already converted (shared
//! ones included) and the application filters. Members that map to target
//! services instead of applications are collected into a companion
//! `<group>-svc` service group.

use crate::objects::{CpObject, ObjectKind};
use crate::resolve::Worklist;
use crate::scope::ConversionScope;
use crate::source::GroupEntry;

/// Suffix of the service group that carries an application group's services.
pub const SERVICES_SUFFIX: &str = "-svc";

pub fn convert_application_filters(scope: &mut ConversionScope<'_>, filters: &[String]) {
    scope.base.app_filters.extend(filters.iter().cloned());
}

pub fn convert_application_groups(scope: &mut ConversionScope<'_>, groups: &[GroupEntry]) {
    let mut worklist = Worklist::new(groups.iter().map(|g| (g.meta.name.as_str(), g)));
    for group in groups {
        resolve_group(scope, &mut worklist, group);
    }
}

/// Make sure a predefined target name has an object behind it.
pub(crate) fn ensure_predefined(scope: &mut ConversionScope<'_>, name: &str) {
    if scope.base.object(name).is_none() {
        scope.base.insert(CpObject::predefined(name));
    }
}

fn resolve_group(
    scope: &mut ConversionScope<'_>,
    worklist: &mut Worklist<'_, GroupEntry>,
    group: &GroupEntry,
) {
    let source = group.meta.name.as_str();
    if !worklist.start(source) {
        return;
    }

    let catalog = scope.catalog;
    let mut applications = Vec::new();
    let mut services = Vec::new();

    for member in &group.members {
        if let Some(matched) = catalog.apps.lookup(member) {
            if !matched.cp_apps.is_empty() {
                for app in &matched.cp_apps {
                    ensure_predefined(scope, app);
                    applications.push(app.clone());
                }
            } else if !matched.cp_services.is_empty() {
                for service in &matched.cp_services {
                    ensure_predefined(scope, service);
                    services.push(service.clone());
                }
            } else {
                scope.warn(format!(
                    "{source} application group contains non-mapped application: {member}"
                ));
            }
            continue;
        }

        if worklist.is_in_progress(member) {
            scope.warn(format!(
                "{source} application group is part of a membership cycle through {member}"
            ));
            continue;
        }
        if let Some(nested) = worklist.pending(member) {
            resolve_group(scope, worklist, nested);
        }

        if let Some(target) = scope.base.app_groups.get(member).cloned() {
            applications.push(target);
        } else if scope.base.app_filters.contains(member) {
            scope.warn(format!(
                "{source} application group contains application filter: {member}"
            ));
        } else {
            scope.warn(format!(
                "{source} application group contains unknown application: {member}"
            ));
        }
    }

    if !services.is_empty() {
        let key = format!("{source}{SERVICES_SUFFIX}");
        let name = scope.issue_name(&key, "services group");
        let group_services = CpObject::service_group(name, services)
            .with_comments(group.meta.description.as_deref())
            .with_tags(group.meta.tags.iter().cloned());
        let target = scope.base.insert(group_services);
        scope.base.service_groups.insert(key, target);
    }

    let name = scope.issue_name(source, "application group");
    let object = CpObject::new(
        name,
        ObjectKind::ApplicationGroup {
            members: applications,
        },
    )
    .with_comments(group.meta.description.as_deref())
    .with_tags(group.meta.tags.iter().cloned());
    let target = scope.base.insert(object);
    scope.base.app_groups.insert(source.to_string(), target);

    worklist.finish(source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::Catalog;
    use crate::scope::ConvertOptions;
    use crate::source::EntryMeta;
    use pretty_assertions::assert_eq;

    fn group(name: &str, members: &[&str]) -> GroupEntry {
        GroupEntry {
            meta: EntryMeta {
                name: name.to_string(),
                ..EntryMeta::default()
            },
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn members_map_through_table_and_forward_references() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        convert_application_filters(&mut scope, &["risky".to_string()]);

        let groups = vec![
            group("office", &["web-browsing", "mail", "risky", "nonsense"]),
            group("mail", &["dns"]),
        ];
        convert_application_groups(&mut scope, &groups);

        let office = scope.base.app_group("office").expect("office");
        assert_eq!(
            office.members(),
            Some(&["HTTP Protocol".to_string(), "mail".to_string()][..])
        );
        let mail_services = scope.base.service_group("mail-svc").expect("mail-svc");
        assert_eq!(
            mail_services.members(),
            Some(&["domain-udp".to_string(), "domain-tcp".to_string()][..])
        );
        assert_eq!(
            scope.diagnostics.warnings,
            vec![
                "office application group contains application filter: risky",
                "office application group contains unknown application: nonsense",
            ]
        );
    }

    #[test]
    fn cycles_terminate_with_warning() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        let groups = vec![group("a", &["b"]), group("b", &["a"])];
        convert_application_groups(&mut scope, &groups);

        assert!(scope.base.app_group("a").is_some());
        assert!(scope.base.app_group("b").is_some());
        assert!(scope
            .diagnostics
            .warnings
            .contains(&"b application group is part of a membership cycle through a".to_string()));
    }
}
