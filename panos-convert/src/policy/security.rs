//! Security rules to a layered package.
//!
//! A scope whose rules ever use the `any` zone is converted into a single
//! flat layer. Otherwise every (from, to) zone pair gets a sub-policy layer
//! and a parent rule dispatching into it.

use std::collections::HashMap;

use tracing::debug;

use super::users::access_role;
use super::{check_members, is_any, resolve_members};
use crate::naming::safe_name;
use crate::objects::{ANY, APPLICATION_DEFAULT};
use crate::package::{Layer, Package, RuleAction, SecurityRule, Track, MAX_PACKAGE_NAME_LEN};
use crate::scope::ConversionScope;
use crate::source::SecurityRuleEntry;
use crate::translate::applications::{ensure_predefined, SERVICES_SUFFIX};
use crate::translate::zones::zone_or_create;

const LAYER_FILTERING_COMMENT: &str = "Applications and URL filtering is enabled for layer.";

/// Whether the scope's policy is converted into a single flat layer.
pub fn is_plain_policy(rules: &[SecurityRuleEntry]) -> bool {
    rules.iter().any(|rule| {
        rule.from.iter().any(|zone| zone == ANY) || rule.to.iter().any(|zone| zone == ANY)
    })
}

struct Translated {
    rule: SecurityRule,
    app_filtering: bool,
}

pub fn convert_security_rules(
    scope: &mut ConversionScope<'_>,
    rules: &[SecurityRuleEntry],
) -> Package {
    let base_name = safe_name(&scope.name);
    if base_name.chars().count() > MAX_PACKAGE_NAME_LEN {
        scope.error(format!(
            "Package {base_name} has name length more than {MAX_PACKAGE_NAME_LEN} chars"
        ));
    }
    let mut package = Package::new(format!("{base_name}_policy"));

    let plain = is_plain_policy(rules);
    debug!(scope = %scope.name, plain, rules = rules.len(), "converting security rules");

    let mut layers: HashMap<String, usize> = HashMap::new();
    for entry in rules {
        let Some(translated) = translate_rule(scope, entry, plain) else {
            continue;
        };
        if plain {
            emit_plain(scope, &mut package, translated);
        } else {
            emit_segmented(scope, &mut package, &mut layers, entry, translated);
        }
    }

    package.close();

    let referenced: Vec<String> = package
        .sub_policies
        .iter()
        .chain(std::iter::once(&package.parent_layer))
        .flat_map(|layer| &layer.rules)
        .flat_map(SecurityRule::references)
        .cloned()
        .collect();
    for name in referenced {
        scope.register_name(&name);
    }

    package
}

fn emit_plain(scope: &mut ConversionScope<'_>, package: &mut Package, translated: Translated) {
    let Translated {
        mut rule,
        app_filtering,
    } = translated;
    if rule.is_allow_any() && rule.enabled {
        scope.warn(format!(
            "{} security rule allows any traffic and was disabled",
            rule.name
        ));
        rule.enabled = false;
    }
    if app_filtering {
        package.parent_layer.applications_and_url_filtering = true;
    }
    package.parent_layer.push(rule);
}

fn emit_segmented(
    scope: &mut ConversionScope<'_>,
    package: &mut Package,
    layers: &mut HashMap<String, usize>,
    entry: &SecurityRuleEntry,
    translated: Translated,
) {
    for from in &entry.from {
        for to in &entry.to {
            if !entry.rule_type.accepts(from, to) {
                continue;
            }
            let key = format!("{from}_TK_{to}");
            let index = match layers.get(&key) {
                Some(index) => *index,
                None => {
                    let layer_name = safe_name(&key);
                    let from_zone = zone_or_create(scope, from);
                    let to_zone = zone_or_create(scope, to);
                    let mut dispatch =
                        SecurityRule::new(format!("{from}__{to}"), RuleAction::SubPolicy);
                    dispatch.source = vec![from_zone.name];
                    dispatch.destination = vec![to_zone.name];
                    dispatch.sub_policy_name = Some(layer_name.clone());
                    package.parent_layer.push(dispatch);

                    package.sub_policies.push(Layer::new(layer_name));
                    let index = package.sub_policies.len() - 1;
                    layers.insert(key, index);
                    index
                }
            };

            let layer = &mut package.sub_policies[index];
            if translated.app_filtering && !layer.applications_and_url_filtering {
                layer.applications_and_url_filtering = true;
                let layer_name = layer.name.clone();
                if let Some(dispatch) = package
                    .parent_layer
                    .rules
                    .iter_mut()
                    .find(|rule| rule.sub_policy_name.as_deref() == Some(layer_name.as_str()))
                {
                    dispatch.conversion_comments = LAYER_FILTERING_COMMENT.to_string();
                }
            }
            package.sub_policies[index].push(translated.rule.clone());
        }
    }
}

/// Translate one rule. Returns `None` after recording errors when any
/// member could not be resolved.
fn translate_rule(
    scope: &mut ConversionScope<'_>,
    entry: &SecurityRuleEntry,
    plain: bool,
) -> Option<Translated> {
    let name = entry.meta.name.as_str();
    let mut errors = Vec::new();
    let with_users = scope.options.convert_users && !is_any(&entry.source_user);

    let missing = |side: &str, member: &str| {
        format!(
            "{name} security rule is not converted because {side} object is not defined or converted: {member}"
        )
    };
    check_members(scope, &entry.source, &mut errors, |member| missing("source", member));
    check_members(scope, &entry.destination, &mut errors, |member| {
        missing("destination", member)
    });

    let mut services = Vec::new();
    let app_filtering = !is_any(&entry.application);
    let wildcard = entry
        .service
        .iter()
        .any(|service| service == ANY || service == APPLICATION_DEFAULT);
    if !app_filtering && !wildcard {
        for service in &entry.service {
            match scope.base.service_object(service) {
                Some(object) => services.push(object.name.clone()),
                None => errors.push(format!(
                    "{name} security rule is not converted because service object is not defined or converted: {service}"
                )),
            }
        }
    }

    for category in entry.category.iter().filter(|c| c.as_str() != ANY) {
        scope.warn(format!(
            "{name} access rule contains URL-category which was not converted: {category}"
        ));
    }

    if !errors.is_empty() {
        for error in errors {
            scope.error(error);
        }
        return None;
    }

    let mut source = resolve_members(scope, &entry.source);
    let mut destination = resolve_members(scope, &entry.destination);
    if plain {
        if source.is_empty() && !is_any(&entry.from) && !with_users {
            source = existing_zones(scope, &entry.from);
        }
        if destination.is_empty() && !is_any(&entry.to) {
            destination = existing_zones(scope, &entry.to);
        }
    }

    let mut applications = Vec::new();
    if app_filtering {
        resolve_applications(scope, entry, &mut services, &mut applications);
    }

    if with_users {
        let networks = std::mem::take(&mut source);
        let role = access_role(scope, name, &entry.source_user, networks);
        source = vec![role.name];
    }

    let time = match &entry.schedule {
        Some(schedule) => {
            let names: Vec<String> = scope
                .base
                .schedule(schedule)
                .into_iter()
                .map(|object| object.name.clone())
                .collect();
            if names.is_empty() {
                scope.warn(format!(
                    "{name} security rule schedule is not defined or converted: {schedule}"
                ));
            }
            names
        }
        None => Vec::new(),
    };

    let silent = entry.log_start.as_deref() == Some("no") && entry.log_end.as_deref() == Some("no");
    let mut rule = SecurityRule::new(
        name,
        if entry.action == "allow" {
            RuleAction::Accept
        } else {
            RuleAction::Drop
        },
    );
    rule.comments = entry.meta.description.clone().unwrap_or_default();
    rule.conversion_comments = format!("Matched rule: {name}");
    rule.tags = entry.meta.tags.iter().cloned().collect();
    rule.source = or_any(source);
    rule.destination = or_any(destination);
    rule.service = or_any(services);
    rule.application = applications;
    rule.time = time;
    rule.track = if silent { Track::None } else { Track::Log };
    rule.enabled = !entry.disabled;
    rule.source_negated = entry.negate_source;
    rule.destination_negated = entry.negate_destination;

    Some(Translated {
        rule,
        app_filtering,
    })
}

fn or_any(cells: Vec<String>) -> Vec<String> {
    if cells.is_empty() {
        vec![ANY.to_string()]
    } else {
        cells
    }
}

fn existing_zones(scope: &ConversionScope<'_>, zones: &[String]) -> Vec<String> {
    zones
        .iter()
        .filter_map(|zone| scope.base.zone(zone))
        .map(|zone| zone.name.clone())
        .collect()
}

fn resolve_applications(
    scope: &mut ConversionScope<'_>,
    entry: &SecurityRuleEntry,
    services: &mut Vec<String>,
    applications: &mut Vec<String>,
) {
    let name = entry.meta.name.as_str();
    let catalog = scope.catalog;

    for app in &entry.application {
        if let Some(group) = scope.base.service_groups.get(&format!("{app}{SERVICES_SUFFIX}")) {
            services.push(group.clone());
        }
        if let Some(group) = scope.base.app_groups.get(app) {
            applications.push(group.clone());
        } else if scope.base.app_filters.contains(app) {
            scope.warn(format!(
                "{name} security rule contains application filter: {app}"
            ));
        } else if let Some(matched) = catalog.apps.lookup(app) {
            if !matched.cp_apps.is_empty() {
                for target in &matched.cp_apps {
                    ensure_predefined(scope, target);
                    applications.push(target.clone());
                }
            } else if !matched.cp_services.is_empty() {
                for target in &matched.cp_services {
                    ensure_predefined(scope, target);
                    services.push(target.clone());
                }
            } else {
                scope.warn(format!(
                    "{name} security rule contains non-mapped application: {app}"
                ));
            }
        } else {
            scope.warn(format!(
                "{name} security rule contains unknown application: {app}"
            ));
        }
    }

    for service in &entry.service {
        if service != ANY && service != APPLICATION_DEFAULT {
            scope.warn(format!(
                "{name} access rule contains service which was not converted: {service}"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::Catalog;
    use crate::objects::{CpObject, ObjectKind};
    use crate::package::{CLEANUP_RULE, SUB_POLICY_CLEANUP};
    use crate::scope::ConvertOptions;
    use crate::source::{EntryMeta, RuleType};
    use pretty_assertions::assert_eq;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn rule(name: &str, from: &[&str], to: &[&str]) -> SecurityRuleEntry {
        SecurityRuleEntry {
            meta: EntryMeta {
                name: name.to_string(),
                ..EntryMeta::default()
            },
            from: list(from),
            to: list(to),
            source: list(&["any"]),
            destination: list(&["any"]),
            source_user: list(&["any"]),
            application: list(&["any"]),
            service: list(&["any"]),
            category: list(&["any"]),
            action: "allow".to_string(),
            schedule: None,
            rule_type: RuleType::Universal,
            log_start: None,
            log_end: None,
            disabled: false,
            negate_source: false,
            negate_destination: false,
        }
    }

    fn scope_with_host<'a>(catalog: &'a Catalog, options: &'a ConvertOptions) -> ConversionScope<'a> {
        let mut scope = ConversionScope::new("vsys1", catalog, options);
        scope.base.insert(CpObject::host("srv1", "10.0.0.5"));
        scope
            .base
            .addresses
            .insert("srv1".to_string(), "srv1".to_string());
        scope
    }

    #[test]
    fn any_zone_in_one_rule_makes_the_whole_policy_flat() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = scope_with_host(&catalog, &options);
        let mut first = rule("r1", &["any"], &["any"]);
        first.source = list(&["srv1"]);
        let mut second = rule("r2", &["zoneA"], &["zoneB"]);
        second.destination = list(&["srv1"]);

        let package = convert_security_rules(&mut scope, &[first, second]);
        assert!(package.sub_policies.is_empty());
        let names: Vec<_> = package
            .parent_layer
            .rules
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["r1", "r2", CLEANUP_RULE]);
        assert_eq!(package.name, "vsys1_policy");
        assert_eq!(package.parent_layer.name, "vsys1_policy Network");
    }

    #[test]
    fn zone_pairs_dispatch_into_shared_sub_policies() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = scope_with_host(&catalog, &options);
        let mut first = rule("web", &["trust"], &["untrust", "dmz"]);
        first.source = list(&["srv1"]);
        let mut second = rule("web2", &["trust"], &["untrust"]);
        second.application = list(&["web-browsing"]);

        let package = convert_security_rules(&mut scope, &[first, second]);

        let parents: Vec<_> = package
            .parent_layer
            .rules
            .iter()
            .map(|r| (r.name.as_str(), r.action))
            .collect();
        assert_eq!(
            parents,
            vec![
                ("trust__untrust", RuleAction::SubPolicy),
                ("trust__dmz", RuleAction::SubPolicy),
                (CLEANUP_RULE, RuleAction::Drop),
            ]
        );
        let layer = package.sub_policy("trust_TK_untrust").expect("layer");
        let rules: Vec<_> = layer.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(rules, vec!["web", "web2", SUB_POLICY_CLEANUP]);
        assert!(layer.applications_and_url_filtering);
        assert_eq!(layer.rules[1].application, vec!["HTTP Protocol"]);
        assert_eq!(
            package.parent_layer.rules[0].conversion_comments,
            LAYER_FILTERING_COMMENT
        );
        assert_eq!(package.parent_layer.rules[0].source, vec!["trust"]);
        assert_eq!(package.converted_rules(), 5);
        assert!(scope
            .diagnostics
            .warnings
            .iter()
            .any(|w| w == "trust zone is not defined in vsys1 and was created"));
    }

    #[test]
    fn rule_type_limits_zone_pairs() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let mut intra = rule("intra", &["a", "b"], &["a", "b"]);
        intra.rule_type = RuleType::Intrazone;

        let package = convert_security_rules(&mut scope, &[intra]);
        let layers: Vec<_> = package.sub_policies.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(layers, vec!["a_TK_a", "b_TK_b"]);
    }

    #[test]
    fn unresolved_member_drops_the_rule() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let mut broken = rule("broken", &["any"], &["any"]);
        broken.source = list(&["ghost"]);
        broken.service = list(&["nosvc"]);

        let package = convert_security_rules(&mut scope, &[broken]);
        assert_eq!(package.parent_layer.rules.len(), 1);
        assert_eq!(package.converted_rules(), 0);
        assert_eq!(
            scope.diagnostics.errors,
            vec![
                "broken security rule is not converted because source object is not defined or converted: ghost",
                "broken security rule is not converted because service object is not defined or converted: nosvc",
            ]
        );
    }

    #[test]
    fn rejected_rule_leaves_no_literal_objects() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let mut broken = rule("broken", &["any"], &["any"]);
        broken.source = list(&["10.7.7.7"]);
        broken.destination = list(&["ghost"]);

        convert_security_rules(&mut scope, &[broken]);
        assert_eq!(scope.diagnostics.errors.len(), 1);
        assert!(scope.base.address("10.7.7.7").is_none());
        assert!(scope.base.object("Host_10.7.7.7").is_none());
        assert!(scope.registry.is_empty());
    }

    #[test]
    fn attributes_and_literals_carry_over() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        let mut entry = rule("quiet", &["any"], &["any"]);
        entry.destination = list(&["10.1.0.0/16"]);
        entry.action = "deny".to_string();
        entry.log_start = Some("no".to_string());
        entry.log_end = Some("no".to_string());
        entry.disabled = true;
        entry.negate_destination = true;
        entry.meta.description = Some("block lab".to_string());

        let package = convert_security_rules(&mut scope, &[entry]);
        let converted = &package.parent_layer.rules[0];
        assert_eq!(converted.destination, vec!["Net_10.1.0.0"]);
        assert_eq!(converted.action, RuleAction::Drop);
        assert_eq!(converted.track, Track::None);
        assert!(!converted.enabled);
        assert!(converted.destination_negated);
        assert_eq!(converted.comments, "block lab");
        assert_eq!(converted.conversion_comments, "Matched rule: quiet");
        assert!(scope.registry.contains("Net_10.1.0.0"));
    }

    #[test]
    fn allow_any_rule_is_disabled_in_flat_policy() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);

        let package = convert_security_rules(&mut scope, &[rule("open", &["any"], &["any"])]);
        assert!(!package.parent_layer.rules[0].enabled);
        assert_eq!(
            scope.diagnostics.warnings,
            vec!["open security rule allows any traffic and was disabled"]
        );
    }

    #[test]
    fn flat_policy_uses_explicit_zones_for_any_addresses() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("vsys1", &catalog, &options);
        scope.base.insert(CpObject::new("trust", ObjectKind::Zone));
        scope
            .base
            .zones
            .insert("trust".to_string(), "trust".to_string());
        let mut entry = rule("out", &["trust"], &["any"]);
        entry.service = list(&["service-missing"]);
        entry.application = list(&["ssh"]);

        let package = convert_security_rules(&mut scope, &[entry]);
        let converted = &package.parent_layer.rules[0];
        assert_eq!(converted.source, vec!["trust"]);
        assert_eq!(converted.destination, vec!["any"]);
        assert_eq!(converted.application, vec!["SSH Protocol"]);
        assert!(package.parent_layer.applications_and_url_filtering);
        assert_eq!(
            scope.diagnostics.warnings,
            vec!["out access rule contains service which was not converted: service-missing"]
        );
    }

    #[test]
    fn source_users_become_an_access_role() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions {
            convert_users: true,
            ..ConvertOptions::new()
        };
        let mut scope = scope_with_host(&catalog, &options);
        let mut entry = rule("staff", &["any"], &["any"]);
        entry.source = list(&["srv1"]);
        entry.source_user = list(&[r"CORP\bob"]);

        let package = convert_security_rules(&mut scope, &[entry]);
        assert_eq!(package.parent_layer.rules[0].source, vec!["AR_staff"]);
        match scope.object_kind("AR_staff") {
            Some(ObjectKind::AccessRole { networks, .. }) => assert_eq!(networks, &vec!["srv1".to_string()]),
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(scope.registry.contains("AR_staff"));
    }

    #[test]
    fn long_scope_name_is_an_error() {
        let catalog = Catalog::embedded();
        let options = ConvertOptions::new();
        let mut scope = ConversionScope::new("branch-office-east", &catalog, &options);

        convert_security_rules(&mut scope, &[]);
        assert_eq!(
            scope.diagnostics.errors,
            vec!["Package branch-office-east has name length more than 15 chars"]
        );
    }
}
